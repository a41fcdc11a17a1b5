use crate::core::Color;
use std::fmt;

/// One protocol line. The wire format is newline-delimited UTF-8 text with a
/// literal tag prefix and `,`-separated fields; no escaping. The server never
/// parses these (it relays lines verbatim) except for the one-time `NAME:`
/// handshake; everything else is client-to-client through the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// `NAME:<name>` - client to server, first line only.
    Name(String),
    /// `START:COLOR:<BLACK|WHITE>` - server to client, once per match.
    Start(Color),
    /// `CHAT:<text>`
    Chat(String),
    /// `MOVE:<x>,<y>` - 0-based board coordinates.
    Move { x: usize, y: usize },
    UndoRequest,
    UndoAccept,
    UndoDeny,
    /// `GAME_OVER:<BLACK|WHITE>` - winner color.
    GameOver(Color),
    Reset,
    /// Informational only; the receiver just reports it.
    ReplayStart,
}

impl WireMessage {
    /// Strict parse of one line (no trailing newline). Anything that does
    /// not match the grammar yields `None`; callers surface that as an
    /// unknown message, never as an error.
    pub fn parse(line: &str) -> Option<WireMessage> {
        if let Some(name) = line.strip_prefix("NAME:") {
            return Some(WireMessage::Name(name.to_string()));
        }
        if let Some(color) = line.strip_prefix("START:COLOR:") {
            return parse_color(color).map(WireMessage::Start);
        }
        if let Some(text) = line.strip_prefix("CHAT:") {
            return Some(WireMessage::Chat(text.to_string()));
        }
        if let Some(body) = line.strip_prefix("MOVE:") {
            let mut fields = body.split(',');
            let x = fields.next()?.parse().ok()?;
            let y = fields.next()?.parse().ok()?;
            if fields.next().is_some() {
                return None;
            }
            return Some(WireMessage::Move { x, y });
        }
        if let Some(winner) = line.strip_prefix("GAME_OVER:") {
            return parse_color(winner).map(WireMessage::GameOver);
        }
        match line {
            "UNDO_REQUEST" => Some(WireMessage::UndoRequest),
            "UNDO_ACCEPT" => Some(WireMessage::UndoAccept),
            "UNDO_DENY" => Some(WireMessage::UndoDeny),
            "RESET" => Some(WireMessage::Reset),
            "REPLAY_START" => Some(WireMessage::ReplayStart),
            _ => None,
        }
    }
}

fn parse_color(s: &str) -> Option<Color> {
    if s.eq_ignore_ascii_case("BLACK") {
        Some(Color::Black)
    } else if s.eq_ignore_ascii_case("WHITE") {
        Some(Color::White)
    } else {
        None
    }
}

/// Serializes back to the exact line grammar (no trailing newline).
impl fmt::Display for WireMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WireMessage::Name(name) => write!(f, "NAME:{}", name),
            WireMessage::Start(color) => write!(f, "START:COLOR:{}", color),
            WireMessage::Chat(text) => write!(f, "CHAT:{}", text),
            WireMessage::Move { x, y } => write!(f, "MOVE:{},{}", x, y),
            WireMessage::UndoRequest => write!(f, "UNDO_REQUEST"),
            WireMessage::UndoAccept => write!(f, "UNDO_ACCEPT"),
            WireMessage::UndoDeny => write!(f, "UNDO_DENY"),
            WireMessage::GameOver(winner) => write!(f, "GAME_OVER:{}", winner),
            WireMessage::Reset => write!(f, "RESET"),
            WireMessage::ReplayStart => write!(f, "REPLAY_START"),
        }
    }
}
