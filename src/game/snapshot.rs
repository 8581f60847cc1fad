//! Per-tick snapshots and the per-role perspective transform

use crate::game::score::Score;
use crate::ws::protocol::{EntityState, PlayerView, Role, TableDims, ViewState};

/// Value copy of the authoritative state, produced once per tick by the
/// session loop. Consumers receive their own copy and can never alias the
/// live simulation buffers.
#[derive(Debug, Clone, Copy)]
pub struct MatchSnapshot {
    pub tick: u64,
    pub puck: EntityState,
    pub player1: EntityState,
    pub player2: EntityState,
    pub score: Score,
}

/// Mirror a point through the table center. Applying it twice returns the
/// original point, which is what lets player 2's inbound and outbound
/// transforms share this one function.
pub fn mirror_point(table: &TableDims, x: f32, y: f32) -> (f32, f32) {
    (table.width - x, table.height - y)
}

fn mirror_entity(table: &TableDims, entity: EntityState) -> EntityState {
    let (x, y) = mirror_point(table, entity.x, entity.y);
    EntityState { x, y, r: entity.r }
}

/// Clamp a paddle target, already in canonical coordinates, to the owning
/// player's half of the table. Player 1 defends the bottom goal line.
pub fn clamp_target(role: Role, table: &TableDims, x: f32, y: f32) -> (f32, f32) {
    let x = x.clamp(0.0, table.width);
    let y = match role {
        Role::Player1 => y.clamp(0.0, table.half_height()),
        Role::Player2 => y.clamp(table.half_height(), table.height),
        Role::Spectator => y,
    };
    (x, y)
}

/// Map the canonical snapshot into one client's view. Player 2 sees the
/// whole table mirrored; everyone gets `player`/`opponent` labels, with
/// spectators viewing from player 1's side by convention.
pub fn view_for(role: Role, table: &TableDims, snapshot: &MatchSnapshot) -> ViewState {
    match role {
        Role::Player2 => ViewState {
            puck: mirror_entity(table, snapshot.puck),
            player: PlayerView::new(
                mirror_entity(table, snapshot.player2),
                snapshot.score.player2,
            ),
            opponent: PlayerView::new(
                mirror_entity(table, snapshot.player1),
                snapshot.score.player1,
            ),
        },
        Role::Player1 | Role::Spectator => ViewState {
            puck: snapshot.puck,
            player: PlayerView::new(snapshot.player1, snapshot.score.player1),
            opponent: PlayerView::new(snapshot.player2, snapshot.score.player2),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::physics::standard_table;
    use assert_approx_eq::assert_approx_eq;

    fn snapshot() -> MatchSnapshot {
        MatchSnapshot {
            tick: 42,
            puck: EntityState {
                x: 0.4,
                y: 1.9,
                r: 0.08,
            },
            player1: EntityState {
                x: 0.5,
                y: 0.3,
                r: 0.1,
            },
            player2: EntityState {
                x: 0.9,
                y: 2.2,
                r: 0.1,
            },
            score: Score {
                player1: 3,
                player2: 1,
            },
        }
    }

    #[test]
    fn mirroring_is_an_involution() {
        let table = standard_table();
        for &(x, y) in &[(0.0, 0.0), (0.66, 1.27), (1.32, 2.54), (0.2, 1.9)] {
            let (mx, my) = mirror_point(&table, x, y);
            let (rx, ry) = mirror_point(&table, mx, my);
            assert_approx_eq!(rx, x, 1e-6);
            assert_approx_eq!(ry, y, 1e-6);
        }
    }

    #[test]
    fn player1_sees_canonical_orientation() {
        let table = standard_table();
        let snap = snapshot();
        let view = view_for(Role::Player1, &table, &snap);

        assert_eq!(view.puck, snap.puck);
        assert_eq!(view.player, PlayerView::new(snap.player1, 3));
        assert_eq!(view.opponent, PlayerView::new(snap.player2, 1));
    }

    #[test]
    fn spectator_sees_player1_perspective() {
        let table = standard_table();
        let snap = snapshot();
        assert_eq!(
            view_for(Role::Spectator, &table, &snap),
            view_for(Role::Player1, &table, &snap)
        );
    }

    #[test]
    fn player2_sees_everything_mirrored_and_relabeled() {
        let table = standard_table();
        let snap = snapshot();
        let view = view_for(Role::Player2, &table, &snap);

        assert_approx_eq!(view.puck.x, table.width - snap.puck.x, 1e-6);
        assert_approx_eq!(view.puck.y, table.height - snap.puck.y, 1e-6);

        assert_approx_eq!(view.player.x, table.width - snap.player2.x, 1e-6);
        assert_approx_eq!(view.player.y, table.height - snap.player2.y, 1e-6);
        assert_eq!(view.player.score, 1);

        assert_approx_eq!(view.opponent.x, table.width - snap.player1.x, 1e-6);
        assert_eq!(view.opponent.score, 3);
    }

    #[test]
    fn player1_target_is_clamped_to_bottom_half() {
        let table = standard_table();
        let (x, y) = clamp_target(Role::Player1, &table, 0.66, 2.0);
        assert_approx_eq!(x, 0.66, 1e-6);
        assert_approx_eq!(y, 1.27, 1e-6);

        // In-bounds input passes through untouched
        let (x, y) = clamp_target(Role::Player1, &table, 0.66, 0.8);
        assert_approx_eq!(x, 0.66, 1e-6);
        assert_approx_eq!(y, 0.8, 1e-6);
    }

    #[test]
    fn player2_target_is_clamped_to_top_half() {
        let table = standard_table();
        // A mirrored player-2 input that lands below the centerline
        let (mx, my) = mirror_point(&table, 0.2, 2.0);
        let (x, y) = clamp_target(Role::Player2, &table, mx, my);
        assert_approx_eq!(x, 1.12, 1e-6);
        assert_approx_eq!(y, 1.27, 1e-6);
    }

    #[test]
    fn x_is_clamped_to_table_width() {
        let table = standard_table();
        let (x, _) = clamp_target(Role::Player1, &table, -0.5, 0.5);
        assert_approx_eq!(x, 0.0, 1e-6);
        let (x, _) = clamp_target(Role::Player1, &table, 5.0, 0.5);
        assert_approx_eq!(x, table.width, 1e-6);
    }
}
