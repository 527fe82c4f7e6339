//! In-memory implementation of the Store trait.
//!
//! Same semantics as SQLite but nothing survives a restart. Each packet
//! lives behind its own mutex; the outer lock only guards the maps. Claims
//! take the outer lock just long enough to find the packet, then run the
//! check-and-open under the packet mutex, so claims on different packets
//! never wait on each other.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use hongbao_core::{ClaimOutcome, ClaimRequest, Envelope, EnvelopeId, Packet, PacketId};

use crate::error::{Result, StoreError};
use crate::traits::{ensure_envelopes, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

struct MemoryStoreInner {
    /// Packets indexed by ID.
    packets: HashMap<PacketId, Arc<Mutex<PacketSlot>>>,

    /// Envelope index: envelope_id -> owning packet_id.
    envelopes: HashMap<EnvelopeId, PacketId>,
}

struct PacketSlot {
    packet: Packet,
    active: bool,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                packets: HashMap::new(),
                envelopes: HashMap::new(),
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner.write().map_err(|_| poisoned())
    }

    /// Find a packet's slot without holding the outer lock afterwards.
    fn slot(&self, id: &PacketId) -> Result<Option<Arc<Mutex<PacketSlot>>>> {
        Ok(self.read()?.packets.get(id).cloned())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("memory store lock poisoned".into())
}

fn lock(slot: &Mutex<PacketSlot>) -> Result<MutexGuard<'_, PacketSlot>> {
    slot.lock().map_err(|_| poisoned())
}

/// Reject envelope ids that repeat within the batch or belong to a packet
/// other than `owner`.
fn check_envelope_ids(
    index: &HashMap<EnvelopeId, PacketId>,
    owner: Option<&PacketId>,
    envelopes: &[Envelope],
) -> Result<()> {
    let mut seen = HashSet::with_capacity(envelopes.len());
    for envelope in envelopes {
        if !seen.insert(envelope.id) {
            return Err(StoreError::Conflict(format!(
                "envelope {} appears twice",
                envelope.id
            )));
        }
        if let Some(existing) = index.get(&envelope.id) {
            if Some(existing) != owner {
                return Err(StoreError::Conflict(format!(
                    "envelope {} already exists",
                    envelope.id
                )));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_packet(&self, packet: &Packet) -> Result<()> {
        ensure_envelopes(&packet.envelopes)?;
        let mut inner = self.write()?;

        if inner.packets.contains_key(&packet.id) {
            return Err(StoreError::Conflict(format!(
                "packet {} already exists",
                packet.id
            )));
        }
        check_envelope_ids(&inner.envelopes, None, &packet.envelopes)?;

        for envelope in &packet.envelopes {
            inner.envelopes.insert(envelope.id, packet.id);
        }
        inner.packets.insert(
            packet.id,
            Arc::new(Mutex::new(PacketSlot {
                packet: packet.clone(),
                active: true,
            })),
        );

        Ok(())
    }

    async fn get_packet(&self, id: &PacketId) -> Result<Option<Packet>> {
        let Some(slot) = self.slot(id)? else {
            return Ok(None);
        };
        let slot = lock(&slot)?;
        Ok(slot.active.then(|| slot.packet.clone()))
    }

    async fn replace_envelopes(&self, id: &PacketId, envelopes: &[Envelope], at: i64) -> Result<bool> {
        ensure_envelopes(envelopes)?;
        // Outer write lock first, then the packet: the index and the envelope
        // set change together.
        let mut inner = self.write()?;
        let Some(slot) = inner.packets.get(id).cloned() else {
            return Ok(false);
        };
        let mut slot = lock(&slot)?;
        if !slot.active {
            return Ok(false);
        }

        check_envelope_ids(&inner.envelopes, Some(id), envelopes)?;

        for old in &slot.packet.envelopes {
            inner.envelopes.remove(&old.id);
        }
        for new in envelopes {
            inner.envelopes.insert(new.id, *id);
        }
        slot.packet.replace_envelopes(envelopes.to_vec(), at);

        Ok(true)
    }

    async fn reset_packet(&self, id: &PacketId, at: i64) -> Result<bool> {
        let Some(slot) = self.slot(id)? else {
            return Ok(false);
        };
        let mut slot = lock(&slot)?;
        if !slot.active {
            return Ok(false);
        }
        slot.packet.reset(at);
        Ok(true)
    }

    async fn deactivate_packet(&self, id: &PacketId, at: i64) -> Result<bool> {
        let Some(slot) = self.slot(id)? else {
            return Ok(false);
        };
        let mut slot = lock(&slot)?;
        if !slot.active {
            return Ok(false);
        }
        slot.active = false;
        slot.packet.updated_at = at;
        Ok(true)
    }

    async fn claim(&self, request: &ClaimRequest) -> Result<ClaimOutcome> {
        let slot = {
            let inner = self.read()?;
            let packet_id = match request.packet_id {
                Some(packet_id) => packet_id,
                None => match inner.envelopes.get(&request.envelope_id) {
                    Some(packet_id) => *packet_id,
                    None => return Ok(ClaimOutcome::NotFound),
                },
            };
            match inner.packets.get(&packet_id) {
                Some(slot) => Arc::clone(slot),
                None => return Ok(ClaimOutcome::NotFound),
            }
        };

        let mut slot = lock(&slot)?;
        if !slot.active {
            return Ok(ClaimOutcome::NotFound);
        }
        Ok(slot
            .packet
            .claim(&request.envelope_id, request.claimant.as_deref(), request.at))
    }

    async fn health_check(&self) -> Result<()> {
        self.read().map(|_| ())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
