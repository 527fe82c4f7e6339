//! Store conformance checks.
//!
//! Every [`Store`] implementation must pass all of these. Each check panics
//! with a description on failure, so they can be called straight from a
//! `#[tokio::test]`.

use std::sync::Arc;

use hongbao_core::{now_millis, seal_envelopes, ClaimOutcome, ClaimRequest, Envelope, Packet};
use hongbao_store::{Store, StoreError};

use crate::fixtures::{make_packet, specs};

/// Number of concurrent claimants used by [`single_winner`].
pub const RACE_CLAIMANTS: usize = 32;

/// Run every check against `store`.
pub async fn run_all<S: Store + 'static>(store: Arc<S>) {
    roundtrip(&*store).await;
    create_is_atomic(&*store).await;
    failed_claims_change_nothing(&*store).await;
    claims_scoped_to_packet(&*store).await;
    replace_discards_claims(&*store).await;
    replace_is_atomic(&*store).await;
    empty_sets_rejected(&*store).await;
    reset_reseals(&*store).await;
    deactivate_hides(&*store).await;
    unknown_packets(&*store).await;
    single_winner(store).await;
}

async fn create<S: Store + ?Sized>(store: &S, amounts: &[i64]) -> Packet {
    let packet = make_packet(amounts);
    store.create_packet(&packet).await.expect("create");
    packet
}

async fn load<S: Store + ?Sized>(store: &S, packet: &Packet) -> Packet {
    store
        .get_packet(&packet.id)
        .await
        .expect("get")
        .expect("packet should exist")
}

fn fresh(amounts: &[i64]) -> Vec<Envelope> {
    seal_envelopes(&specs(amounts)).expect("valid specs")
}

/// A created packet reads back identical, envelopes in order.
pub async fn roundtrip<S: Store + ?Sized>(store: &S) {
    let packet = create(store, &[3, 1, 4, 1, 5, 9, 2, 6]).await;
    assert_eq!(load(store, &packet).await, packet, "roundtrip changed the packet");
}

/// A create that conflicts on any envelope id persists nothing.
pub async fn create_is_atomic<S: Store + ?Sized>(store: &S) {
    let existing = create(store, &[10]).await;

    let mut clashing = make_packet(&[20, 30]);
    clashing.envelopes[1].id = existing.envelopes[0].id;

    let err = store.create_packet(&clashing).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)), "expected conflict, got {err:?}");
    assert!(
        store.get_packet(&clashing.id).await.expect("get").is_none(),
        "conflicting create left a packet behind"
    );

    let dup = store.create_packet(&existing).await.unwrap_err();
    assert!(matches!(dup, StoreError::Conflict(_)), "expected conflict, got {dup:?}");
    assert_eq!(load(store, &existing).await, existing);
}

/// Losing claims return `AlreadyOpened` and leave the winner's record alone.
pub async fn failed_claims_change_nothing<S: Store + ?Sized>(store: &S) {
    let packet = create(store, &[88, 99]).await;
    let target = packet.envelopes[0].id;

    let first = ClaimRequest::new(target, 1_000).in_packet(packet.id).claimant(Some("first"));
    let won = store.claim(&first).await.expect("claim");
    let claimed = won.claimed().expect("first claim should win");
    assert_eq!(claimed.amount.get(), 88.0);
    assert_eq!(claimed.opened_at, 1_000);

    let after_win = load(store, &packet).await;

    for at in [1_001, 1_002, 1_003] {
        let late = ClaimRequest::new(target, at).in_packet(packet.id).claimant(Some("late"));
        assert_eq!(store.claim(&late).await.expect("claim"), ClaimOutcome::AlreadyOpened);
    }

    let after_losses = load(store, &packet).await;
    assert_eq!(after_losses, after_win, "a failed claim mutated state");

    let opened = after_losses.envelope(&target).expect("envelope");
    assert_eq!(opened.opened_at(), Some(1_000));
    assert_eq!(opened.opened_by(), Some("first"));
    assert!(!after_losses.envelopes[1].is_opened());
}

/// A claim naming the wrong packet finds nothing, while an unscoped claim
/// resolves the envelope on its own.
pub async fn claims_scoped_to_packet<S: Store + ?Sized>(store: &S) {
    let a = create(store, &[1]).await;
    let b = create(store, &[2]).await;
    let envelope = a.envelopes[0].id;

    let misdirected = ClaimRequest::new(envelope, now_millis()).in_packet(b.id);
    assert_eq!(store.claim(&misdirected).await.expect("claim"), ClaimOutcome::NotFound);
    assert!(!load(store, &a).await.envelopes[0].is_opened());

    let unscoped = ClaimRequest::new(envelope, now_millis());
    let outcome = store.claim(&unscoped).await.expect("claim");
    assert_eq!(outcome.claimed().map(|c| c.packet_id), Some(a.id));
}

/// Replacing envelopes discards all claims and retires the old ids.
pub async fn replace_discards_claims<S: Store + ?Sized>(store: &S) {
    let packet = create(store, &[10, 20]).await;
    let old = packet.envelopes[0].id;
    let claim = ClaimRequest::new(old, now_millis()).in_packet(packet.id);
    assert!(store.claim(&claim).await.expect("claim").is_claimed());

    let replacement = fresh(&[7, 8, 9]);
    assert!(store
        .replace_envelopes(&packet.id, &replacement, 5_000)
        .await
        .expect("replace"));

    let loaded = load(store, &packet).await;
    assert_eq!(loaded.envelopes, replacement);
    assert_eq!(loaded.updated_at, 5_000);
    assert_eq!(loaded.created_at, packet.created_at);
    assert!(loaded.creator_token.matches(packet.creator_token.as_str()));

    assert_eq!(store.claim(&claim).await.expect("claim"), ClaimOutcome::NotFound);

    // Replacing with the current set again is allowed.
    assert!(store
        .replace_envelopes(&packet.id, &replacement, 6_000)
        .await
        .expect("replace"));
}

/// A replace that conflicts partway through its batch leaves the old set,
/// claims included, exactly as it was.
pub async fn replace_is_atomic<S: Store + ?Sized>(store: &S) {
    let packet = create(store, &[10, 20]).await;
    let other = create(store, &[30]).await;
    let claim = ClaimRequest::new(packet.envelopes[1].id, 2_000).in_packet(packet.id);
    assert!(store.claim(&claim).await.expect("claim").is_claimed());
    let before = load(store, &packet).await;

    let mut replacement = fresh(&[1, 2, 3]);
    replacement[1].id = other.envelopes[0].id;

    let err = store
        .replace_envelopes(&packet.id, &replacement, 9_000)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)), "expected conflict, got {err:?}");

    assert_eq!(load(store, &packet).await, before, "failed replace changed the packet");
    assert_eq!(load(store, &other).await, other);

    let stray = ClaimRequest::new(replacement[0].id, now_millis());
    assert_eq!(store.claim(&stray).await.expect("claim"), ClaimOutcome::NotFound);
}

/// A packet never ends up with zero envelopes.
pub async fn empty_sets_rejected<S: Store + ?Sized>(store: &S) {
    let packet = create(store, &[10]).await;

    let err = store.replace_envelopes(&packet.id, &[], 1).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)), "expected invalid data, got {err:?}");
    assert_eq!(load(store, &packet).await, packet);

    let mut hollow = make_packet(&[1]);
    hollow.envelopes.clear();
    let err = store.create_packet(&hollow).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)), "expected invalid data, got {err:?}");
    assert!(store.get_packet(&hollow.id).await.expect("get").is_none());
}

/// Reset re-seals envelopes in place.
pub async fn reset_reseals<S: Store + ?Sized>(store: &S) {
    let packet = create(store, &[10, 20]).await;
    for envelope in &packet.envelopes {
        let claim = ClaimRequest::new(envelope.id, now_millis()).claimant(Some("x"));
        assert!(store.claim(&claim).await.expect("claim").is_claimed());
    }

    assert!(store.reset_packet(&packet.id, 7_000).await.expect("reset"));

    let loaded = load(store, &packet).await;
    assert_eq!(loaded.opened_count(), 0);
    assert_eq!(
        loaded.envelopes.iter().map(|e| e.id).collect::<Vec<_>>(),
        packet.envelopes.iter().map(|e| e.id).collect::<Vec<_>>()
    );
    assert!(loaded.envelopes.iter().all(|e| e.opened_by().is_none()));
    assert_eq!(loaded.updated_at, 7_000);
}

/// A deactivated packet vanishes from reads, claims and further writes.
pub async fn deactivate_hides<S: Store + ?Sized>(store: &S) {
    let packet = create(store, &[10]).await;
    assert!(store.deactivate_packet(&packet.id, 1).await.expect("deactivate"));

    assert!(store.get_packet(&packet.id).await.expect("get").is_none());

    let claim = ClaimRequest::new(packet.envelopes[0].id, now_millis());
    assert_eq!(store.claim(&claim).await.expect("claim"), ClaimOutcome::NotFound);

    assert!(!store.deactivate_packet(&packet.id, 2).await.expect("deactivate"));
    assert!(!store.reset_packet(&packet.id, 2).await.expect("reset"));
    assert!(!store
        .replace_envelopes(&packet.id, &fresh(&[1]), 2)
        .await
        .expect("replace"));
}

/// Operations on packets that never existed report absence, not faults.
pub async fn unknown_packets<S: Store + ?Sized>(store: &S) {
    let ghost = make_packet(&[1]);

    assert!(store.get_packet(&ghost.id).await.expect("get").is_none());
    assert!(!store.reset_packet(&ghost.id, 1).await.expect("reset"));
    assert!(!store.deactivate_packet(&ghost.id, 1).await.expect("deactivate"));
    assert!(!store
        .replace_envelopes(&ghost.id, &ghost.envelopes, 1)
        .await
        .expect("replace"));

    let claim = ClaimRequest::new(ghost.envelopes[0].id, 1);
    assert_eq!(store.claim(&claim).await.expect("claim"), ClaimOutcome::NotFound);
}

/// Concurrent claims on one envelope produce exactly one winner.
pub async fn single_winner<S: Store + 'static>(store: Arc<S>) {
    let packet = create(&*store, &[500, 600]).await;
    let target = packet.envelopes[0].id;

    let handles: Vec<_> = (0..RACE_CLAIMANTS)
        .map(|i| {
            let store = Arc::clone(&store);
            let request = ClaimRequest::new(target, now_millis())
                .in_packet(packet.id)
                .claimant(Some(format!("claimant-{i}")));
            tokio::spawn(async move { store.claim(&request).await })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        match handle.await.expect("task").expect("claim") {
            ClaimOutcome::Claimed(envelope) => winners.push(envelope),
            ClaimOutcome::AlreadyOpened => {}
            ClaimOutcome::NotFound => panic!("envelope vanished during race"),
        }
    }
    assert_eq!(winners.len(), 1, "expected exactly one winner");

    let loaded = load(&*store, &packet).await;
    let opened = loaded.envelope(&target).expect("envelope");
    assert_eq!(opened.opened_at(), Some(winners[0].opened_at));
    assert!(!loaded.envelopes[1].is_opened());
}
