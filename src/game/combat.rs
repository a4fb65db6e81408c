//! Combat simulation - one deterministic step over a room's units

use crate::ws::protocol::SimEvent;

use super::grid::Cell;
use super::state::Unit;

/// Advances all units by one tick.
///
/// Units act in the order they appear in `units` at the start of the call. A
/// unit killed earlier in the same tick does not act; positions and hit points
/// changed earlier in the tick are visible to later units.
pub fn simulate_tick(units: &mut Vec<Unit>) -> Vec<SimEvent> {
    let mut events = Vec::new();
    let order: Vec<u32> = units.iter().map(|u| u.id).collect();

    for id in order {
        let Some(idx) = units.iter().position(|u| u.id == id) else {
            continue;
        };
        let Some(target_idx) = nearest_enemy(units, idx) else {
            continue;
        };

        let attacker = units[idx].cell();
        let target = units[target_idx].cell();

        if attacker.is_adjacent(target) {
            attack(units, idx, target_idx, &mut events);
        } else if let Some(step) = first_free_step(units, attacker, target) {
            let unit = &mut units[idx];
            unit.row = step.row;
            unit.col = step.col;
            events.push(SimEvent::Move {
                unit_id: unit.id,
                row: step.row,
                col: step.col,
            });
        }
    }

    events
}

/// Closest enemy by Manhattan distance, first in sequence order on ties
fn nearest_enemy(units: &[Unit], idx: usize) -> Option<usize> {
    let me = &units[idx];
    let origin = me.cell();

    let mut best: Option<(usize, i32)> = None;
    for (i, other) in units.iter().enumerate() {
        if other.team == me.team {
            continue;
        }
        let dist = origin.manhattan(other.cell());
        if best.map_or(true, |(_, d)| dist < d) {
            best = Some((i, dist));
        }
    }
    best.map(|(i, _)| i)
}

fn attack(units: &mut Vec<Unit>, attacker_idx: usize, target_idx: usize, events: &mut Vec<SimEvent>) {
    let attacker_id = units[attacker_idx].id;
    let dmg = units[attacker_idx].damage;

    let target = &mut units[target_idx];
    target.hp = target.hp.saturating_sub(dmg);
    let target_id = target.id;
    let new_hp = target.hp;

    events.push(SimEvent::Attack {
        attacker_id,
        target_id,
        new_hp,
        dmg,
    });

    if new_hp == 0 {
        units.remove(target_idx);
        events.push(SimEvent::Death { unit_id: target_id });
    }
}

fn first_free_step(units: &[Unit], from: Cell, towards: Cell) -> Option<Cell> {
    from.steps_towards(towards)
        .into_iter()
        .find(|step| step.in_bounds() && !units.iter().any(|u| u.cell() == *step))
}
