//! Authoritative session loop: fixed-timestep driver and snapshot fan-out

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::Config;
use crate::game::physics::PhysicsWorld;
use crate::game::score::GoalResolver;
use crate::game::snapshot::MatchSnapshot;
use crate::ws::protocol::{Role, TableDims};

/// External mutations, serialized with stepping by the session task
#[derive(Debug)]
pub enum SessionCommand {
    /// Retarget a paddle; already mirrored and clamped by the caller
    PaddleTarget { role: Role, x: f32, y: f32 },
    /// Resume ticking; a no-op if already running
    Start,
    /// Stop ticking without touching world state or scores
    Pause,
}

#[derive(Debug, thiserror::Error)]
#[error("game session is no longer running")]
pub struct SessionClosed;

/// Cheap clonable handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
    snapshot_tx: broadcast::Sender<MatchSnapshot>,
    table: TableDims,
}

impl SessionHandle {
    pub fn table(&self) -> TableDims {
        self.table
    }

    /// Subscribe to the per-tick snapshot broadcast. Each receiver gets its
    /// own copy of every snapshot from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<MatchSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub async fn set_paddle_target(&self, role: Role, x: f32, y: f32) -> Result<(), SessionClosed> {
        self.send(SessionCommand::PaddleTarget { role, x, y }).await
    }

    pub async fn start(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Start).await
    }

    pub async fn pause(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Pause).await
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionClosed> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| SessionClosed)
    }
}

/// The authoritative game session. Owns the physics world and the score
/// exclusively; every mutation happens on its task, so stepping can never
/// race with paddle updates or resets.
pub struct GameSession {
    world: PhysicsWorld,
    resolver: GoalResolver,
    tick: u64,
    running: bool,
    tick_interval: Duration,
    time_step: f32,
    iterations: usize,
    command_rx: mpsc::Receiver<SessionCommand>,
    snapshot_tx: broadcast::Sender<MatchSnapshot>,
}

impl GameSession {
    pub fn new(config: &Config) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (snapshot_tx, _) = broadcast::channel(64);

        let world = PhysicsWorld::new();
        let handle = SessionHandle {
            command_tx,
            snapshot_tx: snapshot_tx.clone(),
            table: world.table(),
        };

        let session = Self {
            world,
            resolver: GoalResolver::new(),
            tick: 0,
            // Ticking begins on the first Start command
            running: false,
            tick_interval: Duration::from_millis(config.tick_interval_ms),
            time_step: config.simulation_time_step,
            iterations: config.simulation_iterations,
            command_rx,
            snapshot_tx,
        };

        (session, handle)
    }

    /// Run the session until every handle is dropped. Ticks never overlap:
    /// a tick that runs long makes the interval skip, not double-step.
    pub async fn run(mut self) {
        info!(
            tick_ms = self.tick_interval.as_millis() as u64,
            time_step = self.time_step,
            iterations = self.iterations,
            "game session started"
        );

        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.apply(command),
                    None => {
                        info!("all session handles dropped, stopping session");
                        break;
                    }
                },
                _ = ticker.tick(), if self.running => self.run_tick(),
            }
        }
    }

    /// Commands are applied the moment they arrive, between ticks; the
    /// effect becomes visible in the next step's snapshot.
    fn apply(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::PaddleTarget { role, x, y } => {
                self.world.set_paddle_target(role, x, y);
            }
            SessionCommand::Start => {
                if !self.running {
                    self.running = true;
                    info!("session resumed");
                }
            }
            SessionCommand::Pause => {
                if self.running {
                    self.running = false;
                    info!("session paused");
                }
            }
        }
    }

    /// One tick: step, settle any pending goal reset, snapshot, publish.
    /// The snapshot is taken after the reset so clients never see a scored
    /// puck still sitting in the goal mouth.
    fn run_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);

        let contacts = self.world.step(self.time_step, self.iterations);
        self.resolver.observe(&contacts);
        if self.resolver.take_pending_reset() {
            self.world.reset();
            debug!(tick = self.tick, "world reset after goal");
        }

        // No receivers just means nobody is watching this tick
        let _ = self.snapshot_tx.send(self.snapshot());
    }

    fn snapshot(&self) -> MatchSnapshot {
        let state = self.world.state();
        MatchSnapshot {
            tick: self.tick,
            puck: state.puck,
            player1: state.player1,
            player2: state.player2,
            score: self.resolver.score(),
        }
    }
}
