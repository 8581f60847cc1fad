//! Table simulation on top of the rapier2d rigid-body engine

use std::collections::HashMap;
use std::num::NonZeroUsize;

use parking_lot::Mutex;
use rapier2d::prelude::*;

use crate::ws::protocol::{EntityState, Role, TableDims};

// Tournament tables are 2.54m by 1.32m; the goal mouth is half the width.
pub const TABLE_WIDTH: f32 = 1.32;
pub const TABLE_HEIGHT: f32 = 2.54;

pub const PUCK_RADIUS: f32 = 0.08;
pub const PUCK_MASS: f32 = 1.0;
const PUCK_FRICTION: f32 = 0.1;
const PUCK_RESTITUTION: f32 = 0.95;

pub const PADDLE_RADIUS: f32 = 0.1;
pub const PADDLE_MASS: f32 = 0.8;
const PADDLE_FRICTION: f32 = 0.0;
const PADDLE_RESTITUTION: f32 = 0.0;

const SIDE_HALF_THICKNESS: f32 = 0.1;
const MIDFIELD_HALF_THICKNESS: f32 = 0.01;

// Paddle drive: critically-damped spring toward the current target with a
// hard force ceiling, so the paddle snaps toward the cursor without
// teleporting or transferring unbounded momentum.
const DRIVE_FREQUENCY_HZ: f32 = 8.0;
const DRIVE_DAMPING_RATIO: f32 = 1.0;
const MAX_DRIVE_FORCE_PER_KG: f32 = 10_000.0;

// Everything lives in the play group; the midfield wall is in its own group
// so paddles collide with it and the puck slides through.
const GROUP_PLAY: Group = Group::GROUP_1;
const GROUP_MIDFIELD: Group = Group::GROUP_2;

/// The canonical table geometry
pub fn standard_table() -> TableDims {
    TableDims {
        width: TABLE_WIDTH,
        height: TABLE_HEIGHT,
        goal: TABLE_WIDTH / 2.0,
    }
}

/// What a collider is, for interpreting contacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityTag {
    Puck,
    Paddle(Role),
    Wall,
    /// A goal mouth; the tagged role is the player who scores on contact
    Goal(Role),
}

/// A recorded contact between two tagged colliders during one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEvent {
    pub a: EntityTag,
    pub b: EntityTag,
}

/// Read-only positions of the three moving entities
#[derive(Debug, Clone, Copy)]
pub struct WorldState {
    pub puck: EntityState,
    pub player1: EntityState,
    pub player2: EntityState,
}

struct Paddle {
    body: RigidBodyHandle,
    target: Vector<Real>,
}

/// Collision-event collector handed to the physics step. It only records
/// which tagged colliders started touching; interpretation and any world
/// mutation happen after the step returns.
#[derive(Default)]
struct ContactTap {
    started: Mutex<Vec<(ColliderHandle, ColliderHandle)>>,
}

impl EventHandler for ContactTap {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if let CollisionEvent::Started(a, b, _) = event {
            self.started.lock().push((a, b));
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

/// Owns the rapier world: table boundaries, goals, puck, and paddles.
/// All mutation goes through the session loop; nothing in here is shared.
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    gravity: Vector<Real>,
    tags: HashMap<ColliderHandle, EntityTag>,
    table: TableDims,
    puck: RigidBodyHandle,
    paddles: [Paddle; 2],
}

impl PhysicsWorld {
    pub fn new() -> Self {
        let table = standard_table();
        let half_width = table.half_width();

        let mut world = Self {
            pipeline: PhysicsPipeline::new(),
            integration_parameters: IntegrationParameters::default(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            // The camera looks straight down at the table
            gravity: vector![0.0, 0.0],
            tags: HashMap::new(),
            table,
            puck: RigidBodyHandle::invalid(),
            paddles: [
                Paddle {
                    body: RigidBodyHandle::invalid(),
                    target: vector![half_width, PADDLE_RADIUS],
                },
                Paddle {
                    body: RigidBodyHandle::invalid(),
                    target: vector![half_width, table.height - PADDLE_RADIUS],
                },
            ],
        };

        world.create_boundaries();
        world.spawn_entities();
        world
    }

    pub fn table(&self) -> TableDims {
        self.table
    }

    /// Advance the simulation by one fixed increment and return the contacts
    /// recorded during it.
    pub fn step(&mut self, dt: f32, iterations: usize) -> Vec<ContactEvent> {
        self.integration_parameters.dt = dt;
        self.integration_parameters.num_solver_iterations =
            NonZeroUsize::new(iterations).unwrap_or(NonZeroUsize::MIN);

        self.drive_paddles();

        let tap = ContactTap::default();
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &tap,
        );

        tap.started
            .into_inner()
            .into_iter()
            .filter_map(|(a, b)| {
                let a = *self.tags.get(&a)?;
                let b = *self.tags.get(&b)?;
                Some(ContactEvent { a, b })
            })
            .collect()
    }

    /// Destroy the puck and paddles and recreate them at their start
    /// positions. Only the session loop calls this, strictly between steps;
    /// the goal counters live elsewhere and are untouched.
    pub fn reset(&mut self) {
        for handle in [self.puck, self.paddles[0].body, self.paddles[1].body] {
            self.bodies.remove(
                handle,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            );
        }
        self.tags
            .retain(|_, tag| matches!(tag, EntityTag::Wall | EntityTag::Goal(_)));

        self.spawn_entities();
    }

    /// Retarget a paddle's drive. The caller has already mirrored and
    /// clamped the coordinates into this paddle's half of the table.
    pub fn set_paddle_target(&mut self, role: Role, x: f32, y: f32) {
        let index = match role {
            Role::Player1 => 0,
            Role::Player2 => 1,
            Role::Spectator => return,
        };

        self.paddles[index].target = vector![x, y];
        let handle = self.paddles[index].body;
        if let Some(body) = self.bodies.get_mut(handle) {
            body.wake_up(true);
        }
    }

    pub fn state(&self) -> WorldState {
        WorldState {
            puck: self.entity_state(self.puck, PUCK_RADIUS),
            player1: self.entity_state(self.paddles[0].body, PADDLE_RADIUS),
            player2: self.entity_state(self.paddles[1].body, PADDLE_RADIUS),
        }
    }

    fn entity_state(&self, handle: RigidBodyHandle, r: f32) -> EntityState {
        let (x, y) = self
            .bodies
            .get(handle)
            .map_or((0.0, 0.0), |b| (b.translation().x, b.translation().y));
        EntityState { x, y, r }
    }

    /// Apply the spring-damper drive pulling each paddle toward its target.
    fn drive_paddles(&mut self) {
        for paddle in &self.paddles {
            let Some(body) = self.bodies.get_mut(paddle.body) else {
                continue;
            };

            let mass = body.mass();
            let omega = std::f32::consts::TAU * DRIVE_FREQUENCY_HZ;
            let stiffness = mass * omega * omega;
            let damping = 2.0 * DRIVE_DAMPING_RATIO * mass * omega;

            let position = *body.translation();
            let velocity = *body.linvel();
            let mut force = (paddle.target - position) * stiffness - velocity * damping;

            let max_force = MAX_DRIVE_FORCE_PER_KG * mass;
            let magnitude = force.norm();
            if magnitude > max_force {
                force *= max_force / magnitude;
            }

            body.reset_forces(true);
            body.add_force(force, true);
        }
    }

    fn create_boundaries(&mut self) {
        let table = self.table;
        let half_width = table.half_width();
        let half_height = table.half_height();

        // Walls sit just outside the playfield
        self.add_static_box(
            EntityTag::Wall,
            vector![half_width, table.height + SIDE_HALF_THICKNESS],
            half_width,
            SIDE_HALF_THICKNESS,
            None,
        );
        self.add_static_box(
            EntityTag::Wall,
            vector![half_width, -SIDE_HALF_THICKNESS],
            half_width,
            SIDE_HALF_THICKNESS,
            None,
        );
        self.add_static_box(
            EntityTag::Wall,
            vector![table.width + SIDE_HALF_THICKNESS, half_height],
            SIDE_HALF_THICKNESS,
            half_height,
            None,
        );
        self.add_static_box(
            EntityTag::Wall,
            vector![-SIDE_HALF_THICKNESS, half_height],
            SIDE_HALF_THICKNESS,
            half_height,
            None,
        );

        // Midfield wall: blocks paddles, lets the puck through
        self.add_static_box(
            EntityTag::Wall,
            vector![half_width, half_height],
            half_width,
            MIDFIELD_HALF_THICKNESS,
            Some(InteractionGroups::new(GROUP_MIDFIELD, Group::ALL)),
        );

        // Goal sensors straddle the goal lines. Scoring at the top goal
        // belongs to player 1, at the bottom to player 2.
        let goal_half_width = table.goal / 2.0;
        self.add_goal_sensor(
            Role::Player1,
            vector![half_width, table.height + SIDE_HALF_THICKNESS / 2.0],
            goal_half_width,
        );
        self.add_goal_sensor(
            Role::Player2,
            vector![half_width, -SIDE_HALF_THICKNESS / 2.0],
            goal_half_width,
        );
    }

    fn add_static_box(
        &mut self,
        tag: EntityTag,
        center: Vector<Real>,
        half_width: f32,
        half_height: f32,
        groups: Option<InteractionGroups>,
    ) {
        let body = RigidBodyBuilder::fixed().translation(center).build();
        let handle = self.bodies.insert(body);

        let mut collider = ColliderBuilder::cuboid(half_width, half_height);
        if let Some(groups) = groups {
            collider = collider.collision_groups(groups);
        }
        let collider_handle = self
            .colliders
            .insert_with_parent(collider.build(), handle, &mut self.bodies);
        self.tags.insert(collider_handle, tag);
    }

    fn add_goal_sensor(&mut self, scorer: Role, center: Vector<Real>, half_width: f32) {
        let body = RigidBodyBuilder::fixed().translation(center).build();
        let handle = self.bodies.insert(body);

        let collider = ColliderBuilder::cuboid(half_width, SIDE_HALF_THICKNESS)
            .sensor(true)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        let collider_handle = self
            .colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        self.tags.insert(collider_handle, EntityTag::Goal(scorer));
    }

    fn spawn_entities(&mut self) {
        let table = self.table;
        let half_width = table.half_width();

        let puck_start = vector![half_width, table.half_height()];
        let player1_start = vector![half_width, PADDLE_RADIUS];
        let player2_start = vector![half_width, table.height - PADDLE_RADIUS];

        self.puck = self.spawn_circle(EntityTag::Puck, puck_start);
        let player1 = self.spawn_circle(EntityTag::Paddle(Role::Player1), player1_start);
        let player2 = self.spawn_circle(EntityTag::Paddle(Role::Player2), player2_start);

        self.paddles = [
            Paddle {
                body: player1,
                target: player1_start,
            },
            Paddle {
                body: player2,
                target: player2_start,
            },
        ];
    }

    fn spawn_circle(&mut self, tag: EntityTag, position: Vector<Real>) -> RigidBodyHandle {
        let is_puck = tag == EntityTag::Puck;
        let (radius, mass, friction, restitution) = if is_puck {
            (PUCK_RADIUS, PUCK_MASS, PUCK_FRICTION, PUCK_RESTITUTION)
        } else {
            (PADDLE_RADIUS, PADDLE_MASS, PADDLE_FRICTION, PADDLE_RESTITUTION)
        };

        let body = RigidBodyBuilder::dynamic()
            .translation(position)
            .ccd_enabled(is_puck)
            .build();
        let handle = self.bodies.insert(body);

        let groups = if is_puck {
            InteractionGroups::new(GROUP_PLAY, GROUP_PLAY)
        } else {
            InteractionGroups::new(GROUP_PLAY, GROUP_PLAY | GROUP_MIDFIELD)
        };

        let density = mass / (std::f32::consts::PI * radius * radius);
        let mut collider = ColliderBuilder::ball(radius)
            .density(density)
            .friction(friction)
            .restitution(restitution)
            .collision_groups(groups)
            .active_events(ActiveEvents::COLLISION_EVENTS);
        if is_puck {
            // Keep the lively bounce against dead walls
            collider = collider.restitution_combine_rule(CoefficientCombineRule::Max);
        }

        let collider_handle =
            self.colliders
                .insert_with_parent(collider.build(), handle, &mut self.bodies);
        self.tags.insert(collider_handle, tag);
        handle
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl PhysicsWorld {
    /// Test-only: drop the puck somewhere specific with a given velocity.
    pub(crate) fn place_puck(&mut self, x: f32, y: f32, velocity: (f32, f32)) {
        if let Some(body) = self.bodies.get_mut(self.puck) {
            body.set_translation(vector![x, y], true);
            body.set_linvel(vector![velocity.0, velocity.1], true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    const DT: f32 = 1.0 / 60.0;
    const ITERATIONS: usize = 10;

    #[test]
    fn entities_start_at_canonical_positions() {
        let world = PhysicsWorld::new();
        let state = world.state();

        assert_approx_eq!(state.puck.x, 0.66, 1e-5);
        assert_approx_eq!(state.puck.y, 1.27, 1e-5);
        assert_approx_eq!(state.puck.r, PUCK_RADIUS, 1e-6);

        assert_approx_eq!(state.player1.x, 0.66, 1e-5);
        assert_approx_eq!(state.player1.y, 0.1, 1e-5);
        assert_approx_eq!(state.player2.y, 2.44, 1e-5);
    }

    #[test]
    fn paddle_moves_toward_target() {
        let mut world = PhysicsWorld::new();
        world.set_paddle_target(Role::Player1, 0.3, 0.5);

        for _ in 0..120 {
            world.step(DT, ITERATIONS);
        }

        let paddle = world.state().player1;
        let dx = paddle.x - 0.3;
        let dy = paddle.y - 0.5;
        assert!(
            (dx * dx + dy * dy).sqrt() < 0.05,
            "paddle did not settle near its target: ({}, {})",
            paddle.x,
            paddle.y
        );
    }

    #[test]
    fn midfield_blocks_paddles_but_not_puck() {
        let mut world = PhysicsWorld::new();

        // Paddle 1 aims deep into the opponent half; the wall stops it
        world.set_paddle_target(Role::Player1, 0.66, 2.0);
        for _ in 0..240 {
            world.step(DT, ITERATIONS);
        }
        let paddle = world.state().player1;
        assert!(
            paddle.y < 1.27 + PADDLE_RADIUS + 0.05,
            "paddle crossed the midfield wall: y = {}",
            paddle.y
        );

        // The puck sails through the same line
        world.place_puck(0.3, 1.0, (0.0, 1.5));
        for _ in 0..30 {
            world.step(DT, ITERATIONS);
        }
        assert!(
            world.state().puck.y > 1.4,
            "puck was blocked at midfield: y = {}",
            world.state().puck.y
        );
    }

    #[test]
    fn puck_reaching_bottom_goal_reports_contact() {
        let mut world = PhysicsWorld::new();
        // Inside the goal mouth but clear of paddle 1's start position
        world.place_puck(0.45, 0.4, (0.0, -2.0));

        let mut saw_goal = false;
        for _ in 0..60 {
            let contacts = world.step(DT, ITERATIONS);
            for contact in &contacts {
                let pair = (contact.a, contact.b);
                if matches!(
                    pair,
                    (EntityTag::Puck, EntityTag::Goal(Role::Player2))
                        | (EntityTag::Goal(Role::Player2), EntityTag::Puck)
                ) {
                    saw_goal = true;
                }
            }
            if saw_goal {
                break;
            }
        }
        assert!(saw_goal, "no puck/goal contact was recorded");
    }

    #[test]
    fn puck_outside_goal_mouth_bounces_without_goal_contact() {
        let mut world = PhysicsWorld::new();
        // Aim at the bottom wall near the left corner, outside the mouth
        world.place_puck(0.15, 0.4, (0.0, -2.0));

        for _ in 0..60 {
            let contacts = world.step(DT, ITERATIONS);
            for contact in &contacts {
                assert!(
                    !matches!(contact.a, EntityTag::Goal(_))
                        && !matches!(contact.b, EntityTag::Goal(_)),
                    "corner shot should not reach a goal sensor"
                );
            }
        }

        // Restitution sent it back up the table
        assert!(world.state().puck.y > 0.2);
    }

    #[test]
    fn reset_restores_start_positions() {
        let mut world = PhysicsWorld::new();
        world.place_puck(0.2, 2.0, (1.0, 1.0));
        world.set_paddle_target(Role::Player1, 1.0, 1.0);
        for _ in 0..30 {
            world.step(DT, ITERATIONS);
        }

        world.reset();
        let state = world.state();
        assert_approx_eq!(state.puck.x, 0.66, 1e-5);
        assert_approx_eq!(state.puck.y, 1.27, 1e-5);
        assert_approx_eq!(state.player1.y, 0.1, 1e-5);
        assert_approx_eq!(state.player2.y, 2.44, 1e-5);

        // Drive targets were re-anchored too: stepping keeps everyone home
        for _ in 0..30 {
            world.step(DT, ITERATIONS);
        }
        let settled = world.state();
        assert_approx_eq!(settled.player1.x, 0.66, 0.01);
        assert_approx_eq!(settled.player1.y, 0.1, 0.01);
    }
}
