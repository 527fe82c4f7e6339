//! Proptest generators for property-based testing.

use proptest::prelude::*;

use hongbao_core::{EnvelopeSpec, Packet};

/// Generate a valid amount: whole or fractional.
pub fn amount() -> impl Strategy<Value = f64> {
    prop_oneof![
        (1i64..=10_000_000).prop_map(|v| v as f64),
        0.01f64..10_000_000.0,
    ]
}

/// Generate an amount that must be rejected.
pub fn bad_amount() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(0.0),
        Just(-0.0),
        -1e12f64..0.0,
        Just(f64::NAN),
        Just(f64::INFINITY),
        Just(f64::NEG_INFINITY),
    ]
}

/// Generate a non-blank image id.
pub fn image_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}".prop_map(String::from)
}

/// Generate an image id that must be rejected.
pub fn blank_image_id() -> impl Strategy<Value = String> {
    "[ \t]{0,4}".prop_map(String::from)
}

/// Generate a valid envelope spec.
pub fn envelope_spec() -> impl Strategy<Value = EnvelopeSpec> {
    (amount(), image_id()).prop_map(|(amount, image_id)| EnvelopeSpec { amount, image_id })
}

/// Generate an envelope spec that must be rejected.
pub fn invalid_spec() -> impl Strategy<Value = EnvelopeSpec> {
    prop_oneof![
        (bad_amount(), image_id()).prop_map(|(amount, image_id)| EnvelopeSpec { amount, image_id }),
        (amount(), blank_image_id()).prop_map(|(amount, image_id)| EnvelopeSpec { amount, image_id }),
    ]
}

/// Generate a non-empty batch of valid specs.
pub fn valid_specs(max_len: usize) -> impl Strategy<Value = Vec<EnvelopeSpec>> {
    prop::collection::vec(envelope_spec(), 1..=max_len)
}

/// Generate a batch with exactly one invalid spec, at a random position.
pub fn invalid_batch(max_len: usize) -> impl Strategy<Value = (Vec<EnvelopeSpec>, usize)> {
    (valid_specs(max_len), invalid_spec(), any::<prop::sample::Index>()).prop_map(
        |(mut specs, bad, index)| {
            let position = index.index(specs.len() + 1);
            specs.insert(position, bad);
            (specs, position)
        },
    )
}

/// Parameters for generating a packet.
#[derive(Debug, Clone)]
pub struct PacketParams {
    pub specs: Vec<EnvelopeSpec>,
    pub created_at: i64,
}

impl Arbitrary for PacketParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (valid_specs(16), 0i64..=1_700_000_000_000i64)
            .prop_map(|(specs, created_at)| PacketParams { specs, created_at })
            .boxed()
    }
}

/// Build a packet from parameters.
pub fn packet_from_params(params: &PacketParams) -> Packet {
    Packet::from_specs(&params.specs, params.created_at).expect("generated specs are valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use hongbao_core::{project, seal_envelopes, ValidationError};

    proptest! {
        #[test]
        fn test_packet_preserves_spec_order(params: PacketParams) {
            let packet = packet_from_params(&params);

            prop_assert_eq!(packet.envelopes.len(), params.specs.len());
            for (envelope, spec) in packet.envelopes.iter().zip(&params.specs) {
                prop_assert_eq!(envelope.amount.get(), spec.amount);
                prop_assert_eq!(&envelope.image_id, &spec.image_id);
                prop_assert!(!envelope.is_opened());
            }
        }

        #[test]
        fn test_one_bad_spec_rejects_batch((specs, position) in invalid_batch(8)) {
            let index = match seal_envelopes(&specs) {
                Err(ValidationError::InvalidAmount { index, .. })
                | Err(ValidationError::MissingImage { index }) => Some(index),
                _ => None,
            };
            prop_assert_eq!(index, Some(position));
        }

        #[test]
        fn test_public_view_hides_sealed_amounts(
            params: PacketParams,
            opened in prop::collection::vec(any::<bool>(), 16),
        ) {
            let mut packet = packet_from_params(&params);
            let ids: Vec<_> = packet.envelopes.iter().map(|e| e.id).collect();
            for (id, open) in ids.iter().zip(&opened) {
                if *open {
                    prop_assert!(packet.claim(id, None, 1).is_claimed());
                }
            }

            let public = project(&packet, None);
            for (view, envelope) in public.envelopes.iter().zip(&packet.envelopes) {
                prop_assert_eq!(view.is_opened, envelope.is_opened());
                prop_assert_eq!(view.amount.is_some(), envelope.is_opened());
            }

            let creator = project(&packet, Some(packet.creator_token.as_str()));
            prop_assert!(creator.envelopes.iter().all(|e| e.amount.is_some()));
        }
    }
}
