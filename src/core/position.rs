use std::fmt::{Display, Formatter};

use super::error::GameError;
use super::BOARD_SIZE;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldRow {
    R1,
    R2,
    R3,
}

impl TryFrom<usize> for FieldRow {
    type Error = GameError;

    /// Rows are numbered from 1, the way players name them.
    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::R1),
            2 => Ok(Self::R2),
            3 => Ok(Self::R3),
            _ => Err(GameError::invalid_position(value, 0)),
        }
    }
}

impl From<FieldRow> for usize {
    fn from(value: FieldRow) -> Self {
        match value {
            FieldRow::R1 => 1,
            FieldRow::R2 => 2,
            FieldRow::R3 => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldCol {
    C1,
    C2,
    C3,
}

impl TryFrom<usize> for FieldCol {
    type Error = GameError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::C1),
            2 => Ok(Self::C2),
            3 => Ok(Self::C3),
            _ => Err(GameError::invalid_position(0, value)),
        }
    }
}

impl From<FieldCol> for usize {
    fn from(value: FieldCol) -> Self {
        match value {
            FieldCol::C1 => 1,
            FieldCol::C2 => 2,
            FieldCol::C3 => 3,
        }
    }
}

/// A checked board coordinate. Converts between the 1-based (row, col) pair and the
/// flat cell index `(row - 1) * 3 + (col - 1)` used on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    row: FieldRow,
    col: FieldCol,
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row(), self.col())
    }
}

impl Position {
    pub const fn new(row: FieldRow, col: FieldCol) -> Self {
        Self { row, col }
    }

    /// Builds a position from 1-based coordinates.
    pub fn try_new(row: usize, col: usize) -> Result<Self, GameError> {
        let checked_row =
            FieldRow::try_from(row).map_err(|_| GameError::invalid_position(row, col))?;
        let checked_col =
            FieldCol::try_from(col).map_err(|_| GameError::invalid_position(row, col))?;
        Ok(Self::new(checked_row, checked_col))
    }

    /// Builds a position from a flat cell index. Anything outside `0..9` is rejected.
    pub fn from_index(index: isize) -> Result<Self, GameError> {
        let flat = usize::try_from(index)
            .ok()
            .filter(|&i| i < BOARD_SIZE)
            .ok_or(GameError::invalid_index(index))?;
        Self::try_new(flat / 3 + 1, flat % 3 + 1)
    }

    pub fn row(&self) -> usize {
        self.row.into()
    }

    pub fn col(&self) -> usize {
        self.col.into()
    }

    pub fn index(&self) -> usize {
        (self.row() - 1) * 3 + (self.col() - 1)
    }
}

pub(crate) fn winning_combinations() -> [(Position, Position, Position); 8] {
    use FieldCol::*;
    use FieldRow::*;
    [
        (Position::new(R1, C1), Position::new(R1, C2), Position::new(R1, C3)),
        (Position::new(R2, C1), Position::new(R2, C2), Position::new(R2, C3)),
        (Position::new(R3, C1), Position::new(R3, C2), Position::new(R3, C3)),
        (Position::new(R1, C1), Position::new(R2, C1), Position::new(R3, C1)),
        (Position::new(R1, C2), Position::new(R2, C2), Position::new(R3, C2)),
        (Position::new(R1, C3), Position::new(R2, C3), Position::new(R3, C3)),
        (Position::new(R1, C1), Position::new(R2, C2), Position::new(R3, C3)),
        (Position::new(R3, C1), Position::new(R2, C2), Position::new(R1, C3)),
    ]
}
