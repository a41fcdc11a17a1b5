use crate::core::{Board, Color, BOARD_SIZE};
use crate::game::SessionEvent;
use crossterm::style::Stylize;

/// Console rendering of the board plus one line of text per session event.
/// This is deliberately thin: it only reads the board and formats events,
/// the sessions never call into it.

fn stone(color: Color) -> crossterm::style::StyledContent<&'static str> {
    match color {
        Color::Black => "x".cyan(),
        Color::White => "o".magenta(),
    }
}

pub fn render_board(board: &Board) {
    let last = board.moves().last().copied();

    print!("   ");
    for x in 0..BOARD_SIZE {
        print!("{:>3}", x);
    }
    println!();

    for y in 0..BOARD_SIZE {
        print!("{:>3}", y);
        for x in 0..BOARD_SIZE {
            let is_last = last.map(|m| m.x == x && m.y == y).unwrap_or(false);
            let (open, close) = if is_last { ("[", "]") } else { (" ", " ") };
            match board.at(x, y) {
                Some(color) => print!("{}{}{}", open, stone(color), close),
                None => print!("{}.{}", open, close),
            }
        }
        println!();
    }

    match last {
        Some(m) => println!(
            "move {}: {} at {},{} - {} to play",
            board.moves().len(),
            m.color,
            m.x,
            m.y,
            board.turn()
        ),
        None => println!("empty board - {} to play", board.turn()),
    }
}

/// One console line per event, in the spirit of the chat pane.
pub fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::GameStarted { color } => {
            let order = match color {
                Color::Black => "you move first",
                Color::White => "opponent moves first",
            };
            println!("{}", format!("game started, you are {} ({})", color, order).bold());
        }
        SessionEvent::ChatReceived(text) => println!("opponent: {}", text),
        SessionEvent::ChatSent(text) => println!("you: {}", text),
        SessionEvent::ChatLocal { color, text } => println!("{}: {}", color, text),
        SessionEvent::BoardChanged => {}
        SessionEvent::IWon => println!("{}", "you win!".bold().green()),
        SessionEvent::OpponentWon => println!("{}", "opponent wins.".bold().red()),
        SessionEvent::GameWon { winner } => {
            println!("{}", format!("game over, {} wins", winner).bold())
        }
        SessionEvent::UndoRequested => {
            println!("opponent requests an undo - answer with 'yes' or 'no'")
        }
        SessionEvent::UndoApplied => println!("one move undone"),
        SessionEvent::UndoRefused => println!("opponent refused the undo"),
        SessionEvent::GameEnded { winner } => {
            println!("{}", format!("game over, winner: {}", winner).bold())
        }
        SessionEvent::BoardReset => println!("board reset, new game"),
        SessionEvent::ReplayStarted => println!("replay started"),
        SessionEvent::ReplayFinished => println!("replay finished"),
        SessionEvent::OpponentReplayStarted => println!("opponent entered replay mode"),
        SessionEvent::UnknownMessage { line } => println!("unrecognized message: {}", line),
        SessionEvent::Disconnected => println!("{}", "disconnected from server".bold().red()),
    }
}

pub fn print_help(online: bool) {
    println!("commands:");
    println!("  move <x> <y>   place a stone (0-based coordinates)");
    println!("  chat <text>    say something");
    if online {
        println!("  undo           ask the opponent to undo the last move");
        println!("  yes / no       answer an undo request");
    } else {
        println!("  undo           undo the last move");
    }
    println!("  replay         replay the game so far");
    println!("  reset          start a new game");
    println!("  board          redraw the board");
    println!("  quit           exit");
}
