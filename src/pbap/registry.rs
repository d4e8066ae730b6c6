//! PBAP Session Registry
//!
//! Fixed pool of [`Session`] slots. A slot is in use exactly when it holds
//! a session, and at most one slot holds a given (peer, instance) pair.
//!
//! Handles are [`SessionId`]s tagged with the generation of their slot, so
//! a handle kept after release can never reach the next session placed in
//! the same slot, and releasing twice is harmless.

use crate::{
    BluetoothAddress, PbapError,
    obex::TransportKind,
    pbap::session::{Session, SessionConfig},
};

/// Handle to a session slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionId {
    index: u8,
    generation: u16,
}

impl SessionId {
    /// Slot index in the registry
    #[must_use]
    pub const fn index(self) -> usize {
        self.index as usize
    }
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u16,
    session: Option<Session>,
}

/// Fixed-capacity session pool
#[derive(Debug)]
pub struct SessionRegistry<const N: usize> {
    slots: [Slot; N],
}

impl<const N: usize> Default for SessionRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SessionRegistry<N> {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| Slot::default()),
        }
    }

    /// Bind a free slot to `peer` and `config.instance_id`
    ///
    /// # Errors
    /// Returns `PbapError::AlreadyConnected` if a session already exists for
    /// the pair, `PbapError::NoResources` if every slot is in use
    pub fn allocate(
        &mut self,
        peer: BluetoothAddress,
        transport: TransportKind,
        config: SessionConfig,
    ) -> Result<SessionId, PbapError> {
        if self.find(peer, config.instance_id).is_some() {
            warn!("[REGISTRY] Session already exists for {}", peer);
            return Err(PbapError::AlreadyConnected);
        }

        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.session.is_none())
            .ok_or(PbapError::NoResources)?;
        let index = u8::try_from(index).map_err(|_| PbapError::NoResources)?;

        slot.session = Some(Session::new(peer, transport, config));
        debug!("[REGISTRY] Allocated slot {} for {}", index, peer);

        Ok(SessionId {
            index,
            generation: slot.generation,
        })
    }

    /// Find the session of `peer` for `instance_id`
    #[must_use]
    pub fn find(&self, peer: BluetoothAddress, instance_id: u8) -> Option<SessionId> {
        self.ids()
            .find(|(_, session)| session.matches(peer, instance_id))
            .map(|(id, _)| id)
    }

    /// Find the first session of `peer`, whatever its instance
    #[must_use]
    pub fn find_by_peer(&self, peer: BluetoothAddress) -> Option<SessionId> {
        self.ids()
            .find(|(_, session)| session.peer() == peer)
            .map(|(id, _)| id)
    }

    fn ids(&self) -> impl Iterator<Item = (SessionId, &Session)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let session = slot.session.as_ref()?;
            let index = u8::try_from(index).ok()?;
            Some((
                SessionId {
                    index,
                    generation: slot.generation,
                },
                session,
            ))
        })
    }

    fn slot(&self, id: SessionId) -> Option<&Slot> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
    }

    /// Get the session behind `id`
    ///
    /// # Errors
    /// Returns `PbapError::InvalidSession` for released or unknown handles
    pub fn get(&self, id: SessionId) -> Result<&Session, PbapError> {
        self.slot(id)
            .and_then(|slot| slot.session.as_ref())
            .ok_or(PbapError::InvalidSession)
    }

    /// Get the session behind `id` mutably
    ///
    /// # Errors
    /// Returns `PbapError::InvalidSession` for released or unknown handles
    pub fn get_mut(&mut self, id: SessionId) -> Result<&mut Session, PbapError> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.session.as_mut())
            .ok_or(PbapError::InvalidSession)
    }

    /// Free the slot behind `id`
    ///
    /// Returns the released session, or `None` if `id` was already
    /// released.
    pub fn release(&mut self, id: SessionId) -> Option<Session> {
        let slot = self
            .slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)?;
        let session = slot.session.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        debug!("[REGISTRY] Released slot {}", id.index);
        Some(session)
    }

    /// Number of sessions in use
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.session.is_some()).count()
    }

    /// Check if no session is in use
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of slots
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }
}
