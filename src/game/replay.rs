use crate::core::Move;

/// Fixed cadence between replayed moves. The sessions stay clock-free; the
/// driver loop ticks them at this interval.
pub const REPLAY_STEP_MILLIS: u64 = 500;

/// A snapshot of the move log taken before the board was reset for replay.
/// The cursor only reads the snapshot; the board log regrows as each move
/// is re-applied.
#[derive(Debug, Clone)]
pub struct ReplayCursor {
    moves: Vec<Move>,
    next: usize,
}

impl ReplayCursor {
    pub fn new(moves: Vec<Move>) -> Self {
        ReplayCursor { moves, next: 0 }
    }

    pub fn next_move(&mut self) -> Option<Move> {
        let mv = self.moves.get(self.next).copied()?;
        self.next += 1;
        Some(mv)
    }

    pub fn is_done(&self) -> bool {
        self.next >= self.moves.len()
    }
}
