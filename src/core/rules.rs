use super::position::{winning_combinations, Position};
use super::{Board, Cell, Status};

const ROW_SEPARATOR: &str = "-----------";

pub fn evaluate(board: &Board) -> Status {
    for (idx1, idx2, idx3) in winning_combinations() {
        let (c1, c2, c3) = (board[idx1.index()], board[idx2.index()], board[idx3.index()]);
        if c1 == c2 && c2 == c3 {
            if let Some(status) = Status::won_by(c1) {
                return status;
            }
        }
    }

    if board.iter().all(|cell| !cell.is_empty()) {
        return Status::Draw;
    }

    Status::InProgress
}

/// `row` and `col` are 1-based. A move is valid when it is on the board and the cell is
/// still empty.
pub fn is_valid_move(board: &Board, row: usize, col: usize) -> bool {
    match Position::try_new(row, col) {
        Ok(position) => board[position.index()].is_empty(),
        Err(_) => false,
    }
}

/// Draws the board with X for player 1 and O for player 2.
pub fn render(board: &Board) -> String {
    let mut out = String::with_capacity(80);
    out.push_str(ROW_SEPARATOR);
    out.push('\n');
    for row in board.chunks(3) {
        let cells: Vec<String> = row.iter().map(Cell::to_string).collect();
        out.push(' ');
        out.push_str(&cells.join(" | "));
        out.push_str(" \n");
        out.push_str(ROW_SEPARATOR);
        out.push('\n');
    }
    out
}
