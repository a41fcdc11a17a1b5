use crate::core::Board;
use crate::game::events::{IntentError, SessionEvent};
use crate::game::replay::ReplayCursor;
use tokio::sync::mpsc::UnboundedSender;

/// Local two-player session, no networking. The board's own turn tracker is
/// the only turn authority: whoever's turn it is places, undo is immediate
/// and unconditional, chat is a local echo labeled with the turn color.
pub struct OfflineSession {
    board: Board,
    game_over: bool,
    replay: Option<ReplayCursor>,
    events: UnboundedSender<SessionEvent>,
}

impl OfflineSession {
    pub fn new(events: UnboundedSender<SessionEvent>) -> Self {
        OfflineSession {
            board: Board::new(),
            game_over: false,
            replay: None,
            events,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn is_replaying(&self) -> bool {
        self.replay.is_some()
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    pub fn place_stone(&mut self, x: usize, y: usize) -> Result<(), IntentError> {
        if self.replay.is_some() {
            return Err(IntentError::ReplayActive);
        }
        if self.game_over {
            return Err(IntentError::GameOver);
        }
        if !Board::in_bounds(x, y) {
            return Err(IntentError::OutOfBounds);
        }
        if self.board.at(x, y).is_some() {
            return Err(IntentError::CellOccupied);
        }
        let color = self.board.turn();
        self.board.place(x, y, color);
        self.emit(SessionEvent::BoardChanged);
        if self.board.check_win(x, y) {
            self.game_over = true;
            self.emit(SessionEvent::GameWon { winner: color });
        }
        Ok(())
    }

    /// No negotiation offline. Undoing the winning stone reopens the game.
    pub fn undo(&mut self) -> Result<(), IntentError> {
        if self.replay.is_some() {
            return Err(IntentError::ReplayActive);
        }
        if !self.board.undo_last() {
            return Err(IntentError::NothingToUndo);
        }
        self.game_over = false;
        self.emit(SessionEvent::UndoApplied);
        Ok(())
    }

    pub fn send_chat(&mut self, text: &str) {
        self.emit(SessionEvent::ChatLocal {
            color: self.board.turn(),
            text: text.to_string(),
        });
    }

    pub fn reset(&mut self) {
        self.board.reset();
        self.game_over = false;
        self.replay = None;
        self.emit(SessionEvent::BoardReset);
    }

    pub fn start_replay(&mut self) -> Result<(), IntentError> {
        if self.replay.is_some() {
            return Err(IntentError::ReplayActive);
        }
        if self.board.moves().is_empty() {
            return Err(IntentError::NothingToReplay);
        }
        let snapshot = self.board.moves().to_vec();
        self.board.reset();
        self.replay = Some(ReplayCursor::new(snapshot));
        self.emit(SessionEvent::ReplayStarted);
        Ok(())
    }

    pub fn replay_tick(&mut self) {
        let Some(cursor) = &mut self.replay else {
            return;
        };
        if let Some(mv) = cursor.next_move() {
            self.board.place(mv.x, mv.y, mv.color);
            self.emit(SessionEvent::BoardChanged);
        }
        if self.replay.as_ref().is_some_and(|c| c.is_done()) {
            self.replay = None;
            self.emit(SessionEvent::ReplayFinished);
        }
    }
}
