use anyhow::Context;
use clap::{arg, crate_version, value_parser, Command};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::{self, MissedTickBehavior};

use gomoku_net::config::ServerConfig;
use gomoku_net::core::Board;
use gomoku_net::display;
use gomoku_net::game::{IntentError, OfflineSession, OnlineSession, SessionEvent, REPLAY_STEP_MILLIS};
use gomoku_net::network;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::new()
        .target(env_logger::Target::Stdout)
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let matches = Command::new("gomoku-net")
        .version(crate_version!())
        .about("Networked five-in-a-row: matchmaking server, console client, hot-seat mode")
        .subcommand_required(true)
        .subcommand(
            Command::new("server").about("Run the matchmaking/relay server").arg(
                arg!([port] "Listen port (overrides gomoku-server.json, default 5000)")
                    .value_parser(value_parser!(u16)),
            ),
        )
        .subcommand(
            Command::new("client")
                .about("Connect to a server and play")
                .arg(arg!(<host> "Server host"))
                .arg(arg!(<port> "Server port").value_parser(value_parser!(u16)))
                .arg(arg!(<name> "Display name")),
        )
        .subcommand(
            Command::new("offline")
                .about("Local two-player game, no server")
                .arg(arg!([name] "Display name (informational)")),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("server", sub)) => {
            let mut config = ServerConfig::load_or_default();
            if let Some(port) = sub.get_one::<u16>("port") {
                config.port = *port;
            }
            network::server::run(config).await
        }
        Some(("client", sub)) => {
            let host: &String = sub.get_one("host").context("missing host")?;
            let port: u16 = *sub.get_one("port").context("missing port")?;
            let name: &String = sub.get_one("name").context("missing name")?;
            run_client(host, port, name).await
        }
        Some(("offline", sub)) => {
            let name = sub
                .get_one::<String>("name")
                .cloned()
                .unwrap_or_else(|| "Local".to_string());
            run_offline(&name).await
        }
        _ => unreachable!("subcommand is required"),
    }
}

/// Online driver loop: one task, dispatching server lines, stdin commands
/// and replay ticks to the session one at a time. That sequencing is what
/// keeps board mutations single-writer.
async fn run_client(host: &str, port: u16, name: &str) -> anyhow::Result<()> {
    let addr = format!("{}:{}", host, port);
    println!("connecting to {}...", addr);
    let mut link = network::client::connect(&addr, name).await?;
    println!("connected as {}, waiting for an opponent", name);
    display::print_help(true);

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut session = OnlineSession::new(events_tx, link.outgoing.clone());

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut replay_clock = time::interval(Duration::from_millis(REPLAY_STEP_MILLIS));
    replay_clock.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut net_open = true;

    loop {
        tokio::select! {
            line = link.incoming.recv(), if net_open => match line {
                Some(line) => session.handle_line(&line),
                None => {
                    net_open = false;
                    session.connection_lost();
                }
            },
            line = stdin.next_line() => match line? {
                Some(input) => {
                    if !online_command(&mut session, input.trim()) {
                        break;
                    }
                }
                None => break,
            },
            _ = replay_clock.tick(), if session.is_replaying() => session.replay_tick(),
        }
        drain_events(session.board(), &mut events_rx);
    }
    Ok(())
}

/// Returns false when the user wants to quit.
fn online_command(session: &mut OnlineSession, input: &str) -> bool {
    let (cmd, rest) = split_command(input);
    let result = match cmd {
        "" => Ok(()),
        "move" => match parse_coords(rest) {
            Some((x, y)) => session.place_stone(x, y),
            None => {
                println!("usage: move <x> <y>");
                Ok(())
            }
        },
        "chat" => session.send_chat(rest),
        "undo" => session.request_undo(),
        "yes" => session.respond_undo(true),
        "no" => session.respond_undo(false),
        "reset" => session.request_reset(),
        "replay" => session.start_replay(),
        "board" => {
            display::render_board(session.board());
            Ok(())
        }
        "help" => {
            display::print_help(true);
            Ok(())
        }
        "quit" | "exit" => return false,
        _ => {
            println!("unknown command '{}', try 'help'", cmd);
            Ok(())
        }
    };
    if let Err(e) = result {
        println!("{}", e);
    }
    true
}

async fn run_offline(name: &str) -> anyhow::Result<()> {
    println!("offline mode, local two-player game ({})", name);
    display::print_help(false);

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut session = OfflineSession::new(events_tx);
    display::render_board(session.board());

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut replay_clock = time::interval(Duration::from_millis(REPLAY_STEP_MILLIS));
    replay_clock.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            line = stdin.next_line() => match line? {
                Some(input) => {
                    if !offline_command(&mut session, input.trim()) {
                        break;
                    }
                }
                None => break,
            },
            _ = replay_clock.tick(), if session.is_replaying() => session.replay_tick(),
        }
        drain_events(session.board(), &mut events_rx);
    }
    Ok(())
}

fn offline_command(session: &mut OfflineSession, input: &str) -> bool {
    let (cmd, rest) = split_command(input);
    let result: Result<(), IntentError> = match cmd {
        "" => Ok(()),
        "move" => match parse_coords(rest) {
            Some((x, y)) => session.place_stone(x, y),
            None => {
                println!("usage: move <x> <y>");
                Ok(())
            }
        },
        "chat" => {
            session.send_chat(rest);
            Ok(())
        }
        "undo" => session.undo(),
        "reset" => {
            session.reset();
            Ok(())
        }
        "replay" => session.start_replay(),
        "board" => {
            display::render_board(session.board());
            Ok(())
        }
        "help" => {
            display::print_help(false);
            Ok(())
        }
        "quit" | "exit" => return false,
        _ => {
            println!("unknown command '{}', try 'help'", cmd);
            Ok(())
        }
    };
    if let Err(e) = result {
        println!("{}", e);
    }
    true
}

fn split_command(input: &str) -> (&str, &str) {
    match input.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (input, ""),
    }
}

fn parse_coords(rest: &str) -> Option<(usize, usize)> {
    let mut parts = rest.split_whitespace();
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((x, y))
}

fn drain_events(board: &Board, events: &mut UnboundedReceiver<SessionEvent>) {
    let mut redraw = false;
    while let Ok(event) = events.try_recv() {
        if event.redraws_board() {
            redraw = true;
        }
        display::print_event(&event);
    }
    if redraw {
        display::render_board(board);
    }
}
