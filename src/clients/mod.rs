//! Connected-client registry and role assignment

use parking_lot::RwLock;
use tracing::info;

use crate::ws::protocol::Role;

#[derive(Debug)]
struct ClientSlot {
    role: Role,
    /// True only once the `init` handshake has been written; non-ready
    /// clients are skipped by the broadcaster, not queued for.
    ready: bool,
}

/// Tracks connections and hands out roles by arrival order. Slots are
/// append-only: a disconnect leaves a hole, and later arrivals keep
/// counting past it, so a departed player's role is never given away.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    slots: RwLock<Vec<Option<ClientSlot>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. The role comes from the slot index, holes
    /// included: 0 is player 1, 1 is player 2, everyone after spectates.
    pub fn connect(&self) -> (usize, Role) {
        let mut slots = self.slots.write();
        let id = slots.len();
        let role = Role::from_slot(id);
        slots.push(Some(ClientSlot { role, ready: false }));

        info!(client_id = id, role = ?role, "client connected");
        (id, role)
    }

    /// Free a connection's slot. The slot index is retired, not reused.
    pub fn disconnect(&self, id: usize) {
        let mut slots = self.slots.write();
        if let Some(slot) = slots.get_mut(id) {
            if slot.take().is_some() {
                info!(client_id = id, "client disconnected");
            }
        }
    }

    /// Mark a client ready to receive state broadcasts.
    pub fn set_ready(&self, id: usize) {
        let mut slots = self.slots.write();
        if let Some(Some(slot)) = slots.get_mut(id) {
            slot.ready = true;
        }
    }

    pub fn is_ready(&self, id: usize) -> bool {
        let slots = self.slots.read();
        matches!(slots.get(id), Some(Some(slot)) if slot.ready)
    }

    /// Number of live connections (holes excluded).
    pub fn connected(&self) -> usize {
        let slots = self.slots.read();
        slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Live connections currently holding a player seat.
    pub fn players(&self) -> usize {
        let slots = self.slots.read();
        slots
            .iter()
            .flatten()
            .filter(|slot| slot.role.is_player())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_assigned_in_connection_order() {
        let registry = ClientRegistry::new();
        let roles: Vec<Role> = (0..4).map(|_| registry.connect().1).collect();
        assert_eq!(
            roles,
            vec![
                Role::Player1,
                Role::Player2,
                Role::Spectator,
                Role::Spectator,
            ]
        );
        assert_eq!(registry.connected(), 4);
    }

    #[test]
    fn disconnect_frees_slot_without_renumbering() {
        let registry = ClientRegistry::new();
        let (_p1, _) = registry.connect();
        let (p2, role) = registry.connect();
        assert_eq!(role, Role::Player2);
        assert_eq!(registry.players(), 2);

        // Player 2 leaves; the next arrival does not inherit the seat
        registry.disconnect(p2);
        assert_eq!(registry.connected(), 1);
        assert_eq!(registry.players(), 1);

        let (late, role) = registry.connect();
        assert_eq!(late, 2);
        assert_eq!(role, Role::Spectator);
        assert_eq!(registry.players(), 1);
    }

    #[test]
    fn readiness_gates_are_per_slot() {
        let registry = ClientRegistry::new();
        let (a, _) = registry.connect();
        let (b, _) = registry.connect();

        assert!(!registry.is_ready(a));
        registry.set_ready(a);
        assert!(registry.is_ready(a));
        assert!(!registry.is_ready(b));

        registry.disconnect(a);
        assert!(!registry.is_ready(a));

        // Marking a freed slot ready has no effect
        registry.set_ready(a);
        assert!(!registry.is_ready(a));
    }

    #[test]
    fn double_disconnect_is_harmless() {
        let registry = ClientRegistry::new();
        let (id, _) = registry.connect();
        registry.disconnect(id);
        registry.disconnect(id);
        registry.disconnect(99);
        assert_eq!(registry.connected(), 0);
    }
}
