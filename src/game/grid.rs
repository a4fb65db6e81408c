//! Board geometry

use std::ops::Range;

use crate::ws::protocol::Role;

pub const ROWS: i32 = 10;
pub const COLS: i32 = 10;

/// A board position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub row: i32,
    pub col: i32,
}

impl Cell {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn in_bounds(self) -> bool {
        (0..ROWS).contains(&self.row) && (0..COLS).contains(&self.col)
    }

    pub fn manhattan(self, other: Cell) -> i32 {
        (self.row - other.row).abs() + (self.col - other.col).abs()
    }

    /// True for the eight neighbours of `self`, never for `self` itself
    pub fn is_adjacent(self, other: Cell) -> bool {
        self != other && (self.row - other.row).abs() <= 1 && (self.col - other.col).abs() <= 1
    }

    /// Candidate single steps towards `target`, in the order they must be tried:
    /// along the row axis, along the column axis, then diagonally.
    pub fn steps_towards(self, target: Cell) -> Vec<Cell> {
        let dr = (target.row - self.row).signum();
        let dc = (target.col - self.col).signum();

        let mut steps = Vec::with_capacity(3);
        if dr != 0 {
            steps.push(Cell::new(self.row + dr, self.col));
        }
        if dc != 0 {
            steps.push(Cell::new(self.row, self.col + dc));
        }
        if dr != 0 && dc != 0 {
            steps.push(Cell::new(self.row + dr, self.col + dc));
        }
        steps
    }
}

/// Rows a team may spawn into
pub fn spawn_rows(role: Role) -> Range<i32> {
    let half = ROWS / 2;
    match role {
        Role::P1 => half..ROWS,
        Role::P2 => 0..half,
    }
}

/// Whether `cell` is on the board and inside `role`'s half
pub fn in_spawn_zone(role: Role, cell: Cell) -> bool {
    cell.in_bounds() && spawn_rows(role).contains(&cell.row)
}
