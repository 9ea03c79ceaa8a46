#[derive(thiserror::Error, Debug, PartialEq)]
pub enum GameError {
    #[error("cell index out of range (expected: 0-8, found: {index})")]
    InvalidIndex { index: isize },
    #[error("invalid position ({row}, {col}), expected 1-3 for both")]
    InvalidPosition { row: usize, col: usize },
    #[error("cell ({row}, {col}) is occupied")]
    CellIsOccupied { row: usize, col: usize },
    #[error("can't make turn on a finished game")]
    GameIsFinished,
    #[error("unknown cell value: {0}")]
    InvalidCell(u8),
    #[error("unknown status code: {0}")]
    InvalidStatus(u8),
}

impl GameError {
    pub fn invalid_index(index: isize) -> Self {
        Self::InvalidIndex { index }
    }

    pub fn invalid_position(row: usize, col: usize) -> Self {
        Self::InvalidPosition { row, col }
    }

    pub fn cell_is_occupied(row: usize, col: usize) -> Self {
        Self::CellIsOccupied { row, col }
    }
}
