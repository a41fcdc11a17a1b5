use crate::core::Color;
use std::fmt;

/// State-change notifications emitted by the sessions. The display layer
/// consumes these from a channel; the core never calls into rendering code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    GameStarted { color: Color },
    ChatReceived(String),
    /// Local echo of a chat we sent online.
    ChatSent(String),
    /// Offline chat, labeled with whoever's turn it is.
    ChatLocal { color: Color, text: String },
    BoardChanged,
    IWon,
    OpponentWon,
    /// Offline win.
    GameWon { winner: Color },
    /// The opponent asked to undo; answer with `respond_undo`.
    UndoRequested,
    UndoApplied,
    UndoRefused,
    GameEnded { winner: Color },
    BoardReset,
    ReplayStarted,
    ReplayFinished,
    OpponentReplayStarted,
    UnknownMessage { line: String },
    Disconnected,
}

impl SessionEvent {
    /// Whether the board contents changed and the view should redraw.
    pub fn redraws_board(&self) -> bool {
        matches!(
            self,
            SessionEvent::GameStarted { .. }
                | SessionEvent::BoardChanged
                | SessionEvent::UndoApplied
                | SessionEvent::BoardReset
        )
    }
}

/// Why a local intent was refused. These are user-facing messages, not
/// errors; nothing was sent and nothing was mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentError {
    NotConnected,
    NoColorAssigned,
    NotYourTurn,
    OutOfBounds,
    CellOccupied,
    GameOver,
    ReplayActive,
    NothingToUndo,
    NoUndoOffered,
    NothingToReplay,
}

impl fmt::Display for IntentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            IntentError::NotConnected => "not connected to a server",
            IntentError::NoColorAssigned => "no color assigned yet, waiting for the match to start",
            IntentError::NotYourTurn => "it is not your turn",
            IntentError::OutOfBounds => "that point is off the board",
            IntentError::CellOccupied => "that point is already occupied",
            IntentError::GameOver => "the game is over, reset to play again",
            IntentError::ReplayActive => "a replay is in progress",
            IntentError::NothingToUndo => "there is no move to undo",
            IntentError::NoUndoOffered => "no undo request is waiting for an answer",
            IntentError::NothingToReplay => "there are no moves to replay",
        };
        write!(f, "{}", msg)
    }
}

impl std::error::Error for IntentError {}
