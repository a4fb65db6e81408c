//! Authoritative per-room game state

use crate::util::time::ROUND_SECONDS;
use crate::ws::protocol::Role;

use super::catalog::archetype;
use super::grid::{in_spawn_zone, Cell};

/// Rounds played at most per game
pub const MAX_ROUNDS: u32 = 3;

/// Stars needed to win the game outright
pub const STARS_TO_WIN: u32 = 2;

/// A unit on the board (authoritative)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub id: u32,
    pub archetype_id: &'static str,
    pub row: i32,
    pub col: i32,
    pub hp: u32,
    pub max_hp: u32,
    pub damage: u32,
    pub team: Role,
}

impl Unit {
    pub fn cell(&self) -> Cell {
        Cell::new(self.row, self.col)
    }
}

/// Why a spawn request did not produce a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SpawnError {
    #[error("Round not active")]
    RoundInactive,

    #[error("Unknown archetype")]
    UnknownArchetype,

    #[error("Wrong zone")]
    WrongZone,

    #[error("Occupied")]
    Occupied,
}

impl SpawnError {
    /// Reason reported back to the client, if this failure is reported at all
    pub fn denial_reason(self) -> Option<String> {
        match self {
            SpawnError::WrongZone | SpawnError::Occupied => Some(self.to_string()),
            SpawnError::RoundInactive | SpawnError::UnknownArchetype => None,
        }
    }
}

/// Outcome of a finished round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundResult {
    pub round: u32,
    pub winner: Option<Role>,
    pub p1_count: u32,
    pub p2_count: u32,
    pub game_over: bool,
}

/// Game state for one room, scores persist across rounds
#[derive(Debug, Clone)]
pub struct GameState {
    pub round_number: u32,
    pub max_rounds: u32,
    pub time_left: u32,
    pub p1_stars: u32,
    pub p2_stars: u32,
    /// Insertion order is simulation order
    pub units: Vec<Unit>,
    pub next_unit_id: u32,
    pub round_active: bool,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            round_number: 1,
            max_rounds: MAX_ROUNDS,
            time_left: ROUND_SECONDS,
            p1_stars: 0,
            p2_stars: 0,
            units: Vec::new(),
            next_unit_id: 0,
            round_active: false,
        }
    }

    /// Clear the board and rearm the clock. Scores and unit ids carry over.
    pub fn begin_round(&mut self) {
        self.time_left = ROUND_SECONDS;
        self.units.clear();
        self.round_active = true;
    }

    pub fn is_occupied(&self, cell: Cell) -> bool {
        self.units.iter().any(|u| u.cell() == cell)
    }

    pub fn survivors(&self, team: Role) -> u32 {
        self.units.iter().filter(|u| u.team == team).count() as u32
    }

    pub fn is_game_over(&self) -> bool {
        self.p1_stars >= STARS_TO_WIN
            || self.p2_stars >= STARS_TO_WIN
            || self.round_number >= self.max_rounds
    }

    /// Validate and place a unit for `team`
    pub fn try_spawn(
        &mut self,
        team: Role,
        archetype_id: &str,
        row: i32,
        col: i32,
    ) -> Result<Unit, SpawnError> {
        if !self.round_active {
            return Err(SpawnError::RoundInactive);
        }
        let archetype = archetype(archetype_id).ok_or(SpawnError::UnknownArchetype)?;

        let cell = Cell::new(row, col);
        if !in_spawn_zone(team, cell) {
            return Err(SpawnError::WrongZone);
        }
        if self.is_occupied(cell) {
            return Err(SpawnError::Occupied);
        }

        let unit = Unit {
            id: self.next_unit_id,
            archetype_id: archetype.id,
            row,
            col,
            hp: archetype.max_hp,
            max_hp: archetype.max_hp,
            damage: archetype.damage,
            team,
        };
        self.next_unit_id += 1;
        self.units.push(unit.clone());
        Ok(unit)
    }

    /// Stop the round and award at most one star to the team with more survivors
    pub fn close_round(&mut self) -> RoundResult {
        self.round_active = false;

        let p1_count = self.survivors(Role::P1);
        let p2_count = self.survivors(Role::P2);
        let winner = if p1_count > p2_count {
            self.p1_stars += 1;
            Some(Role::P1)
        } else if p2_count > p1_count {
            self.p2_stars += 1;
            Some(Role::P2)
        } else {
            None
        };

        RoundResult {
            round: self.round_number,
            winner,
            p1_count,
            p2_count,
            game_over: self.is_game_over(),
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
