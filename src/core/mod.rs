pub mod board;
pub mod types;

pub use board::{Board, BOARD_SIZE};
pub use types::{Color, Move};
