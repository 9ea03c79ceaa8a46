mod error;
mod position;
mod rules;

use std::fmt::{Display, Formatter};

pub use error::GameError;
pub use position::{FieldCol, FieldRow, Position};
pub use rules::{evaluate, is_valid_move, render};

pub type GameResult<T> = Result<T, GameError>;

pub const BOARD_SIZE: usize = 9;

/// Size of a board snapshot on the wire: one byte per cell plus the status byte.
pub const SNAPSHOT_SIZE: usize = BOARD_SIZE + 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Cell {
    #[default]
    Empty,
    Player1,
    Player2,
}

impl Cell {
    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Empty => f.write_str(" "),
            Cell::Player1 => f.write_str("X"),
            Cell::Player2 => f.write_str("O"),
        }
    }
}

impl From<Cell> for u8 {
    fn from(value: Cell) -> Self {
        match value {
            Cell::Empty => 0,
            Cell::Player1 => 1,
            Cell::Player2 => 2,
        }
    }
}

impl TryFrom<u8> for Cell {
    type Error = GameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Cell::Empty),
            1 => Ok(Cell::Player1),
            2 => Ok(Cell::Player2),
            _ => Err(GameError::InvalidCell(value)),
        }
    }
}

pub type Board = [Cell; BOARD_SIZE];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Status {
    #[default]
    InProgress,
    Draw,
    Player1Won,
    Player2Won,
    Disconnected,
}

impl Status {
    /// Any status other than `InProgress` ends the round.
    pub fn is_terminal(self) -> bool {
        self != Status::InProgress
    }

    /// Won-status for the owner of `cell`, `None` for an empty cell.
    pub fn won_by(cell: Cell) -> Option<Self> {
        match cell {
            Cell::Empty => None,
            Cell::Player1 => Some(Status::Player1Won),
            Cell::Player2 => Some(Status::Player2Won),
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Status::InProgress => "in progress",
            Status::Draw => "draw",
            Status::Player1Won => "player 1 won",
            Status::Player2Won => "player 2 won",
            Status::Disconnected => "disconnected",
        };
        f.write_str(text)
    }
}

impl From<Status> for u8 {
    fn from(value: Status) -> Self {
        match value {
            Status::InProgress => 0,
            Status::Draw => 1,
            Status::Player1Won => 2,
            Status::Player2Won => 3,
            Status::Disconnected => 4,
        }
    }
}

impl TryFrom<u8> for Status {
    type Error = GameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Status::InProgress),
            1 => Ok(Status::Draw),
            2 => Ok(Status::Player1Won),
            3 => Ok(Status::Player2Won),
            4 => Ok(Status::Disconnected),
            _ => Err(GameError::InvalidStatus(value)),
        }
    }
}

/// Pure board rules consumed by the session. Implementations hold no shared state.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, board: &Board) -> Status;
    fn is_valid_move(&self, board: &Board, row: usize, col: usize) -> bool;
    fn render(&self, board: &Board) -> String;
}

/// Standard 3x3 rules: three in a row wins, a full board without a line is a draw.
#[derive(Clone, Copy, Debug, Default)]
pub struct Classic;

impl Evaluator for Classic {
    fn evaluate(&self, board: &Board) -> Status {
        rules::evaluate(board)
    }

    fn is_valid_move(&self, board: &Board, row: usize, col: usize) -> bool {
        rules::is_valid_move(board, row, col)
    }

    fn render(&self, board: &Board) -> String {
        rules::render(board)
    }
}

/// Board plus status of the round being played.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GameState {
    board: Board,
    status: Status,
}

impl Display for GameState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}status: {}", render(&self.board), self.status)
    }
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Overrides the status. Only `Disconnected` is expected here, everything else is
    /// derived from the board by [`GameState::place`].
    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    pub fn reset(&mut self) {
        self.board = Board::default();
        self.status = Status::InProgress;
    }

    /// Puts `mark` at `position` and re-evaluates the status.
    pub fn place<E>(&mut self, position: Position, mark: Cell, evaluator: &E) -> GameResult<Status>
    where
        E: Evaluator + ?Sized,
    {
        if self.status.is_terminal() {
            return Err(GameError::GameIsFinished);
        }
        if !evaluator.is_valid_move(&self.board, position.row(), position.col()) {
            return Err(GameError::cell_is_occupied(position.row(), position.col()));
        }
        self.board[position.index()] = mark;
        self.status = evaluator.evaluate(&self.board);
        Ok(self.status)
    }

    /// Wire form: nine cell bytes followed by the status byte.
    pub fn to_bytes(&self) -> [u8; SNAPSHOT_SIZE] {
        let mut bytes = [0; SNAPSHOT_SIZE];
        for (byte, cell) in bytes.iter_mut().zip(self.board.iter()) {
            *byte = (*cell).into();
        }
        bytes[BOARD_SIZE] = self.status.into();
        bytes
    }

    pub fn from_bytes(bytes: &[u8; SNAPSHOT_SIZE]) -> GameResult<Self> {
        let mut board = Board::default();
        for (cell, byte) in board.iter_mut().zip(bytes.iter()) {
            *cell = Cell::try_from(*byte)?;
        }
        Ok(Self {
            board,
            status: Status::try_from(bytes[BOARD_SIZE])?,
        })
    }
}
