//! Goal detection and score keeping

use tracing::info;

use crate::game::physics::{ContactEvent, EntityTag};
use crate::ws::protocol::Role;

/// Per-player goal counts. Incremented only by [`GoalResolver`]; never
/// decremented, and a world reset leaves them alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Score {
    pub player1: u32,
    pub player2: u32,
}

impl Score {
    fn increment(&mut self, role: Role) {
        match role {
            Role::Player1 => self.player1 += 1,
            Role::Player2 => self.player2 += 1,
            Role::Spectator => {}
        }
    }
}

/// Interprets raw contact events as scoring. Resetting the world from
/// inside the engine's contact handling is unsafe, so a goal only raises
/// `pending_reset`; the session loop performs the reset after the step.
#[derive(Debug, Default)]
pub struct GoalResolver {
    score: Score,
    pending_reset: bool,
}

impl GoalResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(&self) -> Score {
        self.score
    }

    /// Consume one step's contact events. At most one goal is counted per
    /// step: the puck cannot score twice before the pending reset runs.
    pub fn observe(&mut self, contacts: &[ContactEvent]) {
        for contact in contacts {
            if self.pending_reset {
                break;
            }
            if let Some(scorer) = goal_scored_by(contact) {
                self.score.increment(scorer);
                self.pending_reset = true;
                info!(
                    scorer = ?scorer,
                    player1 = self.score.player1,
                    player2 = self.score.player2,
                    "goal"
                );
            }
        }
    }

    /// Hand the deferred-reset flag to the session loop, clearing it.
    pub fn take_pending_reset(&mut self) -> bool {
        std::mem::take(&mut self.pending_reset)
    }
}

/// A contact scores iff one side is the puck and the other a goal mouth;
/// the goal's tag names the player the point goes to.
fn goal_scored_by(contact: &ContactEvent) -> Option<Role> {
    match (contact.a, contact.b) {
        (EntityTag::Puck, EntityTag::Goal(scorer)) => Some(scorer),
        (EntityTag::Goal(scorer), EntityTag::Puck) => Some(scorer),
        _ => None,
    }
}
