//! Round state machine and the timers that drive it

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, info};

use crate::util::time::{
    CLOCK_PERIOD, FIRST_ROUND_DELAY, GAME_OVER_DELAY, GAME_START_DELAY, NEXT_ROUND_DELAY,
    SIMULATION_PERIOD,
};
use crate::ws::protocol::{Role, ServerMsg};

use super::combat::simulate_tick;
use super::snapshot;
use super::state::{GameState, SpawnError, Unit};

/// Where a room is in its match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// One player, no game state yet
    Waiting,
    /// Both players present, waiting out the settle delays
    Starting,
    /// Round clock and simulation running
    RoundActive,
    /// Between rounds
    InterRound,
    /// Deciding round is over, final result pending
    Concluding,
    /// Terminal
    GameOver,
    /// A player left mid-match, terminal
    Halted,
}

/// Delayed one-shot step of the match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    AnnounceGame,
    StartRound,
    FinishGame,
}

/// A timer that fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEvent {
    ClockTick,
    SimulationTick,
    Transition(Transition),
}

/// Timer handles owned by one room. Dropping a handle cancels it.
#[derive(Default)]
struct RoundTimers {
    clock: Option<Interval>,
    simulation: Option<Interval>,
    pending: Option<(Pin<Box<Sleep>>, Transition)>,
}

impl RoundTimers {
    fn start_round(&mut self) {
        self.cancel();
        // Every second of the round clock is counted, late or not
        self.clock = Some(periodic(CLOCK_PERIOD, MissedTickBehavior::Delay));
        self.simulation = Some(periodic(SIMULATION_PERIOD, MissedTickBehavior::Skip));
    }

    fn stop_round(&mut self) {
        self.clock = None;
        self.simulation = None;
    }

    fn schedule(&mut self, delay: Duration, transition: Transition) {
        self.pending = Some((Box::pin(sleep(delay)), transition));
    }

    fn cancel(&mut self) {
        self.stop_round();
        self.pending = None;
    }

    fn round_running(&self) -> bool {
        self.clock.is_some() || self.simulation.is_some()
    }

    fn is_idle(&self) -> bool {
        !self.round_running() && self.pending.is_none()
    }

    async fn next(&mut self) -> RoundEvent {
        tokio::select! {
            biased;
            _ = tick(&mut self.clock) => RoundEvent::ClockTick,
            _ = tick(&mut self.simulation) => RoundEvent::SimulationTick,
            transition = fire(&mut self.pending) => RoundEvent::Transition(transition),
        }
    }
}

/// Interval whose first tick is one full period away
fn periodic(period: Duration, behavior: MissedTickBehavior) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(behavior);
    interval
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn fire(slot: &mut Option<(Pin<Box<Sleep>>, Transition)>) -> Transition {
    let Some((delay, transition)) = slot.as_mut() else {
        return std::future::pending().await;
    };
    delay.as_mut().await;
    let transition = *transition;
    *slot = None;
    transition
}

/// Drives one room's match: settle delays, rounds, scoring and game over.
///
/// All mutation happens through `&mut self`, so the owning room task is the
/// only writer. Timer expiry is surfaced by [`RoundController::next_event`] and
/// fed back through [`RoundController::handle`] on that same task.
pub struct RoundController {
    room: String,
    phase: RoundPhase,
    state: Option<GameState>,
    p1_name: String,
    p2_name: String,
    timers: RoundTimers,
}

impl RoundController {
    pub fn new(room: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            phase: RoundPhase::Waiting,
            state: None,
            p1_name: String::new(),
            p2_name: String::new(),
            timers: RoundTimers::default(),
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    #[cfg(test)]
    pub fn state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    #[cfg(test)]
    pub fn timers_running(&self) -> bool {
        self.timers.round_running()
    }

    /// Create the game state and schedule `GAME_START`. Only valid once.
    pub fn begin_match(&mut self, p1_name: &str, p2_name: &str) -> bool {
        if self.phase != RoundPhase::Waiting {
            return false;
        }
        self.p1_name = p1_name.to_string();
        self.p2_name = p2_name.to_string();
        self.state = Some(GameState::new());
        self.phase = RoundPhase::Starting;
        self.timers.schedule(GAME_START_DELAY, Transition::AnnounceGame);
        info!(room = %self.room, "Match starting");
        true
    }

    /// Wait for the next timer. Pends forever when nothing is scheduled.
    pub async fn next_event(&mut self) -> RoundEvent {
        self.timers.next().await
    }

    /// Apply a fired timer, returning the messages to broadcast
    pub fn handle(&mut self, event: RoundEvent) -> Vec<ServerMsg> {
        match event {
            RoundEvent::ClockTick => self.clock_tick(),
            RoundEvent::SimulationTick => self.simulate().into_iter().collect(),
            RoundEvent::Transition(Transition::AnnounceGame) => self.announce_game(),
            RoundEvent::Transition(Transition::StartRound) => self.start_round(),
            RoundEvent::Transition(Transition::FinishGame) => self.finish_game(),
        }
    }

    fn announce_game(&mut self) -> Vec<ServerMsg> {
        if self.phase != RoundPhase::Starting {
            return Vec::new();
        }
        self.timers.schedule(FIRST_ROUND_DELAY, Transition::StartRound);
        vec![ServerMsg::GameStart {
            p1_name: self.p1_name.clone(),
            p2_name: self.p2_name.clone(),
        }]
    }

    /// Enter a fresh round. Any running or pending timer is replaced, so a
    /// repeated call never leaves two tick streams behind.
    pub fn start_round(&mut self) -> Vec<ServerMsg> {
        if !matches!(
            self.phase,
            RoundPhase::Starting | RoundPhase::InterRound | RoundPhase::RoundActive
        ) {
            return Vec::new();
        }
        let Some(state) = self.state.as_mut() else {
            return Vec::new();
        };

        self.timers.start_round();
        state.begin_round();
        self.phase = RoundPhase::RoundActive;

        info!(room = %self.room, round = state.round_number, "Round started");
        vec![snapshot::round_start(state)]
    }

    fn clock_tick(&mut self) -> Vec<ServerMsg> {
        if self.phase != RoundPhase::RoundActive {
            return Vec::new();
        }
        let Some(state) = self.state.as_mut() else {
            return Vec::new();
        };

        state.time_left = state.time_left.saturating_sub(1);
        let time_left = state.time_left;

        let mut out = vec![ServerMsg::Timer { time_left }];
        if time_left == 0 {
            out.extend(self.end_round());
        }
        out
    }

    /// Run one combat step if a round is live
    pub fn simulate(&mut self) -> Option<ServerMsg> {
        if self.phase != RoundPhase::RoundActive {
            return None;
        }
        let state = self.state.as_mut().filter(|s| s.round_active)?;

        let events = simulate_tick(&mut state.units);
        if !events.is_empty() {
            debug!(room = %self.room, events = events.len(), units = state.units.len(), "Simulation step");
        }
        Some(snapshot::tick(state, events))
    }

    /// Stop the round, score it, and schedule whatever comes next
    pub fn end_round(&mut self) -> Vec<ServerMsg> {
        if self.phase != RoundPhase::RoundActive {
            return Vec::new();
        }
        let Some(state) = self.state.as_mut() else {
            return Vec::new();
        };

        self.timers.stop_round();
        let result = state.close_round();
        let msg = snapshot::round_end(state, &result);

        info!(
            room = %self.room,
            round = result.round,
            winner = ?result.winner,
            p1_count = result.p1_count,
            p2_count = result.p2_count,
            game_over = result.game_over,
            "Round ended"
        );

        if result.game_over {
            self.phase = RoundPhase::Concluding;
            self.timers.schedule(GAME_OVER_DELAY, Transition::FinishGame);
        } else {
            state.round_number += 1;
            self.phase = RoundPhase::InterRound;
            self.timers.schedule(NEXT_ROUND_DELAY, Transition::StartRound);
        }

        vec![msg]
    }

    fn finish_game(&mut self) -> Vec<ServerMsg> {
        if self.phase != RoundPhase::Concluding {
            return Vec::new();
        }
        let Some(state) = self.state.as_ref() else {
            return Vec::new();
        };

        self.timers.cancel();
        self.phase = RoundPhase::GameOver;

        info!(
            room = %self.room,
            p1_stars = state.p1_stars,
            p2_stars = state.p2_stars,
            "Game over"
        );
        vec![snapshot::game_over(state)]
    }

    pub fn try_spawn(
        &mut self,
        role: Role,
        archetype_id: &str,
        row: i32,
        col: i32,
    ) -> Result<Unit, SpawnError> {
        if self.phase != RoundPhase::RoundActive {
            return Err(SpawnError::RoundInactive);
        }
        let state = self.state.as_mut().ok_or(SpawnError::RoundInactive)?;
        state.try_spawn(role, archetype_id, row, col)
    }

    /// Freeze the match after a player leaves. A game already decided still
    /// delivers its `GAME_OVER`; every other timer is cancelled.
    pub fn halt(&mut self) {
        match self.phase {
            RoundPhase::GameOver | RoundPhase::Halted => {}
            RoundPhase::Concluding => self.timers.stop_round(),
            _ => {
                self.timers.cancel();
                self.phase = RoundPhase::Halted;
            }
        }
        if let Some(state) = self.state.as_mut() {
            state.round_active = false;
        }
        debug_assert!(self.phase != RoundPhase::Halted || self.timers.is_idle());
    }

    /// Drop every timer, a pending result included
    pub fn shutdown(&mut self) {
        self.timers.cancel();
    }
}
