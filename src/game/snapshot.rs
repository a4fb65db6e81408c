//! Snapshot building for network transmission

use crate::ws::protocol::{ServerMsg, SimEvent, UnitSnapshot};

use super::state::{GameState, RoundResult, Unit};

impl From<&Unit> for UnitSnapshot {
    fn from(unit: &Unit) -> Self {
        Self {
            id: unit.id,
            archetype_id: unit.archetype_id.to_string(),
            row: unit.row,
            col: unit.col,
            hp: unit.hp,
            max_hp: unit.max_hp,
            team: unit.team,
        }
    }
}

pub fn unit_snapshots(units: &[Unit]) -> Vec<UnitSnapshot> {
    units.iter().map(UnitSnapshot::from).collect()
}

/// Full board state after a simulation step
pub fn tick(state: &GameState, events: Vec<SimEvent>) -> ServerMsg {
    ServerMsg::Tick {
        units: unit_snapshots(&state.units),
        events,
        time_left: state.time_left,
    }
}

pub fn round_start(state: &GameState) -> ServerMsg {
    ServerMsg::RoundStart {
        round: state.round_number,
        time_left: state.time_left,
        p1_stars: state.p1_stars,
        p2_stars: state.p2_stars,
    }
}

pub fn round_end(state: &GameState, result: &RoundResult) -> ServerMsg {
    ServerMsg::RoundEnd {
        round: result.round,
        winner: result.winner,
        p1_count: result.p1_count,
        p2_count: result.p2_count,
        p1_stars: state.p1_stars,
        p2_stars: state.p2_stars,
    }
}

pub fn game_over(state: &GameState) -> ServerMsg {
    ServerMsg::GameOver {
        p1_stars: state.p1_stars,
        p2_stars: state.p2_stars,
    }
}
