use crate::core::{Board, Color};
use crate::game::events::{IntentError, SessionEvent};
use crate::game::replay::ReplayCursor;
use crate::network::protocol::WireMessage;
use log::{debug, warn};
use tokio::sync::mpsc::UnboundedSender;

/// Client-side protocol state machine for an online game.
///
/// Owns the board; every mutation goes through `&mut self`, so the driver
/// loop dispatching inbound lines and local intents one at a time is the
/// single-writer exclusion region the board needs. The session talks to the
/// outside world only through its two channels: `events` toward the view,
/// `outgoing` toward the network writer.
///
/// Turn enforcement, undo negotiation and win detection happen here. The
/// board itself never validates turn order, and incoming moves are applied
/// without legality re-checks beyond occupancy: a misbehaving peer can
/// desynchronize the boards, which is an accepted trust assumption of the
/// relay design.
pub struct OnlineSession {
    board: Board,
    my_color: Option<Color>,
    my_turn: bool,
    game_over: bool,
    /// We sent `UNDO_REQUEST` and await the verdict.
    undo_sent: bool,
    /// The opponent sent `UNDO_REQUEST` and awaits our verdict.
    undo_offered: bool,
    replay: Option<ReplayCursor>,
    connected: bool,
    events: UnboundedSender<SessionEvent>,
    outgoing: UnboundedSender<WireMessage>,
}

impl OnlineSession {
    pub fn new(
        events: UnboundedSender<SessionEvent>,
        outgoing: UnboundedSender<WireMessage>,
    ) -> Self {
        OnlineSession {
            board: Board::new(),
            my_color: None,
            my_turn: false,
            game_over: false,
            undo_sent: false,
            undo_offered: false,
            replay: None,
            connected: true,
            events,
            outgoing,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn my_color(&self) -> Option<Color> {
        self.my_color
    }

    pub fn is_my_turn(&self) -> bool {
        self.my_turn
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn is_replaying(&self) -> bool {
        self.replay.is_some()
    }

    /// True while an undo request (ours or theirs) awaits a verdict.
    pub fn undo_in_flight(&self) -> bool {
        self.undo_sent || self.undo_offered
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn send(&self, msg: WireMessage) {
        let _ = self.outgoing.send(msg);
    }

    /// Dispatches one line received from the relay. Malformed or unexpected
    /// input never errors: it is surfaced as `UnknownMessage` or ignored
    /// with a log line, per the tolerate-and-continue contract.
    pub fn handle_line(&mut self, line: &str) {
        let Some(msg) = WireMessage::parse(line) else {
            self.emit(SessionEvent::UnknownMessage { line: line.into() });
            return;
        };
        match msg {
            WireMessage::Start(color) => {
                self.my_color = Some(color);
                self.my_turn = color == Color::Black;
                self.game_over = false;
                self.undo_sent = false;
                self.undo_offered = false;
                self.replay = None;
                self.board.reset();
                self.emit(SessionEvent::GameStarted { color });
            }
            WireMessage::Chat(text) => self.emit(SessionEvent::ChatReceived(text)),
            WireMessage::Move { x, y } => self.handle_remote_move(x, y),
            WireMessage::UndoRequest => {
                self.undo_offered = true;
                self.emit(SessionEvent::UndoRequested);
            }
            WireMessage::UndoAccept => {
                if !self.undo_sent {
                    debug!("unsolicited UNDO_ACCEPT ignored");
                    return;
                }
                self.undo_sent = false;
                if self.board.undo_last() {
                    self.emit(SessionEvent::UndoApplied);
                } else {
                    warn!("opponent accepted an undo but our log is empty");
                }
            }
            WireMessage::UndoDeny => {
                if !self.undo_sent {
                    debug!("unsolicited UNDO_DENY ignored");
                    return;
                }
                self.undo_sent = false;
                self.emit(SessionEvent::UndoRefused);
            }
            WireMessage::GameOver(winner) => {
                self.game_over = true;
                self.emit(SessionEvent::GameEnded { winner });
            }
            WireMessage::Reset => {
                self.apply_reset();
                self.emit(SessionEvent::BoardReset);
            }
            WireMessage::ReplayStart => self.emit(SessionEvent::OpponentReplayStarted),
            // NAME is consumed by the server before a session exists; seeing
            // it here means a confused peer. Report, don't act.
            WireMessage::Name(_) => self.emit(SessionEvent::UnknownMessage { line: line.into() }),
        }
    }

    fn handle_remote_move(&mut self, x: usize, y: usize) {
        let Some(my_color) = self.my_color else {
            warn!("MOVE:{},{} before color assignment, ignored", x, y);
            return;
        };
        let opponent = my_color.opponent();
        // The placed color is always the opponent's, so it becomes our turn.
        self.my_turn = true;
        if !self.board.place(x, y, opponent) {
            warn!("opponent move {},{} was illegal here, boards may differ", x, y);
            return;
        }
        self.emit(SessionEvent::BoardChanged);
        if self.board.check_win(x, y) {
            self.game_over = true;
            self.emit(SessionEvent::OpponentWon);
        }
    }

    /// Place a stone as a local intent. All guards are local; nothing is
    /// sent unless the placement succeeds.
    pub fn place_stone(&mut self, x: usize, y: usize) -> Result<(), IntentError> {
        if !self.connected {
            return Err(IntentError::NotConnected);
        }
        let Some(color) = self.my_color else {
            return Err(IntentError::NoColorAssigned);
        };
        if self.replay.is_some() {
            return Err(IntentError::ReplayActive);
        }
        if self.game_over {
            return Err(IntentError::GameOver);
        }
        if !self.my_turn {
            return Err(IntentError::NotYourTurn);
        }
        if !Board::in_bounds(x, y) {
            return Err(IntentError::OutOfBounds);
        }
        if self.board.at(x, y).is_some() {
            return Err(IntentError::CellOccupied);
        }
        self.board.place(x, y, color);
        self.send(WireMessage::Move { x, y });
        self.my_turn = false;
        self.emit(SessionEvent::BoardChanged);
        if self.board.check_win(x, y) {
            self.game_over = true;
            self.send(WireMessage::GameOver(color));
            self.emit(SessionEvent::IWon);
        }
        Ok(())
    }

    pub fn send_chat(&mut self, text: &str) -> Result<(), IntentError> {
        if !self.connected {
            return Err(IntentError::NotConnected);
        }
        self.send(WireMessage::Chat(text.to_string()));
        self.emit(SessionEvent::ChatSent(text.to_string()));
        Ok(())
    }

    /// Ask the opponent to undo. Deliberately unguarded beyond connectivity:
    /// the server does not police undo, and the opponent answers.
    pub fn request_undo(&mut self) -> Result<(), IntentError> {
        if !self.connected {
            return Err(IntentError::NotConnected);
        }
        self.send(WireMessage::UndoRequest);
        self.undo_sent = true;
        Ok(())
    }

    /// Answer the opponent's undo request. The accepter rewinds first and
    /// only then confirms; with nothing to rewind it denies instead, so the
    /// two logs cannot drift apart by one.
    pub fn respond_undo(&mut self, accept: bool) -> Result<(), IntentError> {
        if !self.undo_offered {
            return Err(IntentError::NoUndoOffered);
        }
        self.undo_offered = false;
        if !accept {
            self.send(WireMessage::UndoDeny);
            return Ok(());
        }
        if self.board.undo_last() {
            self.send(WireMessage::UndoAccept);
            self.emit(SessionEvent::UndoApplied);
        } else {
            self.send(WireMessage::UndoDeny);
        }
        Ok(())
    }

    /// New game: tell the opponent, then reset locally right away without
    /// waiting for any acknowledgement. The remote side resets independently
    /// when the message arrives. Color and turn flags survive; a reset is a
    /// new game, not a new handshake.
    pub fn request_reset(&mut self) -> Result<(), IntentError> {
        if !self.connected {
            return Err(IntentError::NotConnected);
        }
        self.send(WireMessage::Reset);
        self.apply_reset();
        self.emit(SessionEvent::BoardReset);
        Ok(())
    }

    fn apply_reset(&mut self) {
        self.board.reset();
        self.replay = None;
        self.undo_sent = false;
        self.undo_offered = false;
        self.game_over = false;
    }

    /// Snapshot the log, clear the board and start stepping through the
    /// recorded moves. Playback is driven by `replay_tick` on the caller's
    /// clock; the snapshot itself is never mutated.
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
        self.send(WireMessage::ReplayStart);
        self.emit(SessionEvent::ReplayStarted);
        Ok(())
    }

    /// Re-applies the next snapshot move, if a replay is running.
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

    /// The read loop observed EOF or an error. Idempotent; no reconnect.
    pub fn connection_lost(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        self.emit(SessionEvent::Disconnected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn session() -> (
        OnlineSession,
        UnboundedReceiver<SessionEvent>,
        UnboundedReceiver<WireMessage>,
    ) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        (OnlineSession::new(events_tx, out_tx), events_rx, out_rx)
    }

    fn drain<T>(rx: &mut UnboundedReceiver<T>) -> Vec<T> {
        let mut out = Vec::new();
        while let Ok(v) = rx.try_recv() {
            out.push(v);
        }
        out
    }

    fn started(color: &str) -> (
        OnlineSession,
        UnboundedReceiver<SessionEvent>,
        UnboundedReceiver<WireMessage>,
    ) {
        let (mut s, mut events, out) = session();
        s.handle_line(&format!("START:COLOR:{}", color));
        drain(&mut events);
        (s, events, out)
    }

    #[test]
    fn start_assigns_color_and_black_moves_first() {
        let (mut s, mut events, _out) = session();
        s.handle_line("START:COLOR:BLACK");
        assert_eq!(s.my_color(), Some(Color::Black));
        assert!(s.is_my_turn());
        assert_eq!(
            drain(&mut events),
            vec![SessionEvent::GameStarted { color: Color::Black }]
        );

        let (mut s, _, _out) = session();
        s.handle_line("START:COLOR:WHITE");
        assert_eq!(s.my_color(), Some(Color::White));
        assert!(!s.is_my_turn());
    }

    #[test]
    fn place_stone_sends_move_and_yields_turn() {
        let (mut s, mut events, mut out) = started("BLACK");
        s.place_stone(7, 7).unwrap();
        assert!(!s.is_my_turn());
        assert_eq!(s.board().at(7, 7), Some(Color::Black));
        assert_eq!(drain(&mut out), vec![WireMessage::Move { x: 7, y: 7 }]);
        assert_eq!(drain(&mut events), vec![SessionEvent::BoardChanged]);
    }

    #[test]
    fn place_stone_guards() {
        let (mut s, _events, mut out) = session();
        assert_eq!(s.place_stone(7, 7), Err(IntentError::NoColorAssigned));

        let (mut s, _events, mut out2) = started("WHITE");
        assert_eq!(s.place_stone(7, 7), Err(IntentError::NotYourTurn));

        let (mut s3, _events, mut out3) = started("BLACK");
        assert_eq!(s3.place_stone(99, 0), Err(IntentError::OutOfBounds));
        s3.place_stone(7, 7).unwrap();
        s3.handle_line("MOVE:8,8");
        assert_eq!(s3.place_stone(8, 8), Err(IntentError::CellOccupied));
        drain(&mut out3);

        s3.connection_lost();
        assert_eq!(s3.place_stone(9, 9), Err(IntentError::NotConnected));

        assert!(drain(&mut out).is_empty(), "rejected intents send nothing");
        assert!(drain(&mut out2).is_empty());
        assert!(drain(&mut out3).is_empty());
    }

    #[test]
    fn remote_move_places_opponent_color_and_grants_turn() {
        // Mirrors the A-is-Black scenario from B's side: B is White, the
        // incoming stone is Black, and B's turn flag comes up.
        let (mut s, mut events, _out) = started("WHITE");
        s.handle_line("MOVE:7,7");
        assert_eq!(s.board().at(7, 7), Some(Color::Black));
        assert!(s.is_my_turn());
        assert_eq!(drain(&mut events), vec![SessionEvent::BoardChanged]);
    }

    #[test]
    fn move_before_start_is_ignored() {
        let (mut s, mut events, _out) = session();
        s.handle_line("MOVE:7,7");
        assert_eq!(s.board().moves().len(), 0);
        assert!(drain(&mut events).is_empty());
    }

    #[test]
    fn winning_placement_sends_game_over() {
        let (mut s, mut events, mut out) = started("BLACK");
        for x in 0..4 {
            s.place_stone(x, 0).unwrap();
            s.handle_line(&format!("MOVE:{},1", x));
        }
        drain(&mut events);
        drain(&mut out);

        s.place_stone(4, 0).unwrap();
        assert!(s.is_game_over());
        assert_eq!(
            drain(&mut out),
            vec![
                WireMessage::Move { x: 4, y: 0 },
                WireMessage::GameOver(Color::Black)
            ]
        );
        assert_eq!(
            drain(&mut events),
            vec![SessionEvent::BoardChanged, SessionEvent::IWon]
        );
        assert_eq!(s.place_stone(10, 10), Err(IntentError::GameOver));
    }

    #[test]
    fn losing_line_is_detected_on_receive() {
        let (mut s, mut events, _out) = started("WHITE");
        s.handle_line("MOVE:0,0");
        for x in 1..5 {
            s.place_stone(x, 10).unwrap();
            s.handle_line(&format!("MOVE:{},0", x));
        }
        assert!(s.is_game_over());
        let events = drain(&mut events);
        assert_eq!(events.last(), Some(&SessionEvent::OpponentWon));
    }

    #[test]
    fn undo_negotiation_requester_side() {
        let (mut s, mut events, mut out) = started("BLACK");
        s.place_stone(7, 7).unwrap();
        drain(&mut out);
        drain(&mut events);

        s.request_undo().unwrap();
        assert!(s.undo_in_flight());
        assert_eq!(drain(&mut out), vec![WireMessage::UndoRequest]);

        s.handle_line("UNDO_ACCEPT");
        assert!(!s.undo_in_flight());
        assert_eq!(s.board().moves().len(), 0);
        assert_eq!(drain(&mut events), vec![SessionEvent::UndoApplied]);
    }

    #[test]
    fn undo_denied_changes_nothing() {
        let (mut s, mut events, _out) = started("BLACK");
        s.place_stone(7, 7).unwrap();
        drain(&mut events);
        s.request_undo().unwrap();
        s.handle_line("UNDO_DENY");
        assert!(!s.undo_in_flight());
        assert_eq!(s.board().moves().len(), 1);
        assert_eq!(drain(&mut events), vec![SessionEvent::UndoRefused]);
    }

    #[test]
    fn unsolicited_undo_verdicts_are_ignored() {
        let (mut s, mut events, _out) = started("BLACK");
        s.place_stone(7, 7).unwrap();
        drain(&mut events);
        s.handle_line("UNDO_ACCEPT");
        assert_eq!(s.board().moves().len(), 1, "no request in flight, no undo");
        s.handle_line("UNDO_DENY");
        assert!(drain(&mut events).is_empty());
    }

    #[test]
    fn undo_negotiation_accepter_side() {
        let (mut s, mut events, mut out) = started("WHITE");
        s.handle_line("MOVE:7,7");
        drain(&mut events);

        s.handle_line("UNDO_REQUEST");
        assert!(s.undo_in_flight());
        assert_eq!(drain(&mut events), vec![SessionEvent::UndoRequested]);

        s.respond_undo(true).unwrap();
        assert_eq!(s.board().moves().len(), 0);
        assert_eq!(drain(&mut out), vec![WireMessage::UndoAccept]);
        assert_eq!(drain(&mut events), vec![SessionEvent::UndoApplied]);
    }

    #[test]
    fn accepting_with_an_empty_log_denies_instead() {
        let (mut s, _events, mut out) = started("WHITE");
        s.handle_line("UNDO_REQUEST");
        s.respond_undo(true).unwrap();
        assert_eq!(drain(&mut out), vec![WireMessage::UndoDeny]);
    }

    #[test]
    fn rejecting_an_undo_sends_deny() {
        let (mut s, _events, mut out) = started("WHITE");
        s.handle_line("MOVE:7,7");
        s.handle_line("UNDO_REQUEST");
        s.respond_undo(false).unwrap();
        assert_eq!(s.board().moves().len(), 1);
        assert_eq!(drain(&mut out), vec![WireMessage::UndoDeny]);
        assert_eq!(s.respond_undo(true), Err(IntentError::NoUndoOffered));
    }

    #[test]
    fn reset_is_optimistic_and_keeps_color() {
        let (mut s, mut events, mut out) = started("BLACK");
        s.place_stone(7, 7).unwrap();
        s.handle_line("MOVE:8,8");
        drain(&mut out);
        drain(&mut events);

        s.request_reset().unwrap();
        assert_eq!(drain(&mut out), vec![WireMessage::Reset]);
        assert_eq!(s.board().moves().len(), 0);
        assert_eq!(s.my_color(), Some(Color::Black), "reset is not a handshake");
        assert_eq!(drain(&mut events), vec![SessionEvent::BoardReset]);
    }

    #[test]
    fn remote_reset_clears_the_board_and_game_over() {
        let (mut s, mut events, _out) = started("WHITE");
        s.handle_line("MOVE:7,7");
        s.handle_line("GAME_OVER:BLACK");
        drain(&mut events);

        s.handle_line("RESET");
        assert_eq!(s.board().moves().len(), 0);
        assert!(!s.is_game_over());
        assert_eq!(drain(&mut events), vec![SessionEvent::BoardReset]);
    }

    #[test]
    fn replay_steps_through_a_snapshot_and_regrows_the_log() {
        let (mut s, mut events, mut out) = started("BLACK");
        s.place_stone(7, 7).unwrap();
        s.handle_line("MOVE:8,8");
        let log_before = s.board().moves().to_vec();
        drain(&mut events);
        drain(&mut out);

        s.start_replay().unwrap();
        assert!(s.is_replaying());
        assert_eq!(s.board().moves().len(), 0);
        assert_eq!(drain(&mut out), vec![WireMessage::ReplayStart]);
        assert_eq!(drain(&mut events), vec![SessionEvent::ReplayStarted]);
        assert_eq!(s.place_stone(0, 0), Err(IntentError::ReplayActive));

        s.replay_tick();
        assert_eq!(s.board().at(7, 7), Some(Color::Black));
        s.replay_tick();
        assert!(!s.is_replaying());
        assert_eq!(s.board().moves(), log_before.as_slice());
        assert_eq!(
            drain(&mut events),
            vec![
                SessionEvent::BoardChanged,
                SessionEvent::BoardChanged,
                SessionEvent::ReplayFinished
            ]
        );
        // Ticking with no replay running is a no-op.
        s.replay_tick();
        assert!(drain(&mut events).is_empty());
    }

    #[test]
    fn replay_requires_moves() {
        let (mut s, _events, _out) = started("BLACK");
        assert_eq!(s.start_replay(), Err(IntentError::NothingToReplay));
    }

    #[test]
    fn unknown_lines_surface_once_and_change_nothing() {
        let (mut s, mut events, _out) = started("BLACK");
        s.handle_line("BOGUS:stuff");
        assert_eq!(
            drain(&mut events),
            vec![SessionEvent::UnknownMessage { line: "BOGUS:stuff".into() }]
        );
        assert!(s.is_my_turn());
        assert_eq!(s.board().moves().len(), 0);
    }

    #[test]
    fn game_over_line_ends_the_game() {
        let (mut s, mut events, _out) = started("BLACK");
        s.handle_line("GAME_OVER:WHITE");
        assert!(s.is_game_over());
        assert_eq!(
            drain(&mut events),
            vec![SessionEvent::GameEnded { winner: Color::White }]
        );
    }

    #[test]
    fn disconnect_fires_exactly_once() {
        let (mut s, mut events, _out) = started("BLACK");
        s.connection_lost();
        s.connection_lost();
        assert_eq!(drain(&mut events), vec![SessionEvent::Disconnected]);
        assert_eq!(s.send_chat("hi"), Err(IntentError::NotConnected));
        assert_eq!(s.request_undo(), Err(IntentError::NotConnected));
        assert_eq!(s.request_reset(), Err(IntentError::NotConnected));
    }

    #[test]
    fn chat_flows_both_ways() {
        let (mut s, mut events, mut out) = started("BLACK");
        s.send_chat("hello").unwrap();
        assert_eq!(drain(&mut out), vec![WireMessage::Chat("hello".into())]);
        assert_eq!(drain(&mut events), vec![SessionEvent::ChatSent("hello".into())]);

        s.handle_line("CHAT:hi back");
        assert_eq!(
            drain(&mut events),
            vec![SessionEvent::ChatReceived("hi back".into())]
        );
    }

    #[test]
    fn opponent_replay_notice_is_informational() {
        let (mut s, mut events, _out) = started("BLACK");
        s.handle_line("REPLAY_START");
        assert_eq!(drain(&mut events), vec![SessionEvent::OpponentReplayStarted]);
        assert!(s.is_my_turn());
    }
}
