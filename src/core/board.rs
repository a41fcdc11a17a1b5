use super::types::{Color, Move};

pub const BOARD_SIZE: usize = 15;

/// 盤面: the 15x15 grid plus the ordered move log.
///
/// The log is the undo stack and the replay source at the same time; it is
/// appended by `place` and popped only by `undo_last`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: [[Option<Color>; BOARD_SIZE]; BOARD_SIZE],
    moves: Vec<Move>,
    turn: Color,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Board {
            cells: [[None; BOARD_SIZE]; BOARD_SIZE],
            moves: Vec::new(),
            turn: Color::Black,
        }
    }

    pub fn in_bounds(x: usize, y: usize) -> bool {
        x < BOARD_SIZE && y < BOARD_SIZE
    }

    /// Out-of-bounds reads are empty, not an error. The display layer
    /// hit-tests with this without pre-validating.
    pub fn at(&self, x: usize, y: usize) -> Option<Color> {
        if Self::in_bounds(x, y) {
            self.cells[y][x]
        } else {
            None
        }
    }

    pub fn turn(&self) -> Color {
        self.turn
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    /// Places a stone. Returns false without mutating anything when the
    /// cell is out of bounds or occupied. Turn order is not validated here;
    /// that is the session's job.
    pub fn place(&mut self, x: usize, y: usize, color: Color) -> bool {
        if !Self::in_bounds(x, y) || self.cells[y][x].is_some() {
            return false;
        }
        self.cells[y][x] = Some(color);
        self.moves.push(Move::new(x, y, color));
        self.turn = color.opponent();
        true
    }

    /// Pops the most recent move. The turn reverts to the undone move's
    /// color, since it is that player's move again.
    pub fn undo_last(&mut self) -> bool {
        let Some(last) = self.moves.pop() else {
            return false;
        };
        self.cells[last.y][last.x] = None;
        self.turn = last.color;
        true
    }

    /// Clears cells and log. The board identity is reused across new games
    /// and replays.
    pub fn reset(&mut self) {
        self.cells = [[None; BOARD_SIZE]; BOARD_SIZE];
        self.moves.clear();
        self.turn = Color::Black;
    }

    /// Five-in-a-row test through (x, y) only, along the four line
    /// directions. Only meaningful immediately after placing at (x, y):
    /// a new win can only extend a line through the newest stone, so a
    /// full-board scan is never needed.
    pub fn check_win(&self, x: usize, y: usize) -> bool {
        let Some(color) = self.at(x, y) else {
            return false;
        };
        const DIRS: [(isize, isize); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];
        DIRS.iter().any(|&(dx, dy)| {
            let run =
                1 + self.count_run(x, y, dx, dy, color) + self.count_run(x, y, -dx, -dy, color);
            run >= 5
        })
    }

    /// Consecutive same-color stones from (x, y) exclusive, stepping (dx, dy).
    fn count_run(&self, x: usize, y: usize, dx: isize, dy: isize, color: Color) -> usize {
        let mut n = 0;
        let (mut cx, mut cy) = (x as isize + dx, y as isize + dy);
        while cx >= 0 && cy >= 0 && self.at(cx as usize, cy as usize) == Some(color) {
            n += 1;
            cx += dx;
            cy += dy;
        }
        n
    }
}
