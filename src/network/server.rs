use crate::config::ServerConfig;
use crate::core::Color;
use crate::network::protocol::WireMessage;
use anyhow::Context;
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time;

/// FIFO queue of peers awaiting an opponent.
///
/// The pairing rule is positional and deliberately simple: the peer passed
/// to `offer` pairs with the front waiter if there is one, and the offered
/// peer always plays Black while the popped waiter plays White. The
/// convention is arbitrary but fixed, so clients can rely on it.
pub struct Matchmaker<P> {
    waiting: VecDeque<P>,
}

impl<P> Default for Matchmaker<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Matchmaker<P> {
    pub fn new() -> Self {
        Matchmaker {
            waiting: VecDeque::new(),
        }
    }

    /// Returns `Some((black, white))` when the arriving peer found an
    /// opponent, else enqueues it.
    pub fn offer(&mut self, peer: P) -> Option<(P, P)> {
        match self.waiting.pop_front() {
            Some(waiter) => Some((peer, waiter)),
            None => {
                self.waiting.push_back(peer);
                None
            }
        }
    }

    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }
}

/// A matched connection: declared name plus the two halves of its socket.
/// The buffered reader is carried from the handshake so no bytes that
/// arrived behind the `NAME:` line are lost.
struct Peer {
    name: String,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// Binds the configured port and serves forever.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    serve(listener, config).await
}

/// Accept loop on an already-bound listener. Split out from `run` so tests
/// can bind port 0 themselves.
pub async fn serve(listener: TcpListener, config: ServerConfig) -> anyhow::Result<()> {
    info!("server listening on {}", listener.local_addr()?);
    let matchmaker: Arc<Mutex<Matchmaker<Peer>>> = Arc::new(Mutex::new(Matchmaker::new()));
    let handshake_timeout = Duration::from_secs(config.handshake_timeout_secs);

    loop {
        let (socket, addr) = listener.accept().await?;
        debug!("connection from {}", addr);
        let matchmaker = Arc::clone(&matchmaker);

        tokio::spawn(async move {
            match handshake(socket, handshake_timeout).await {
                Ok(peer) => {
                    let paired = matchmaker.lock().await.offer(peer);
                    match paired {
                        Some((black, white)) => run_session(black, white).await,
                        None => info!("peer from {} waiting for an opponent", addr),
                    }
                }
                Err(e) => warn!("dropping connection from {}: {:#}", addr, e),
            }
        });
    }
}

/// Reads the one-line `NAME:` handshake, bounded by the configured timeout.
/// A peer that sends some other line first is still admitted, named by its
/// remote address; a peer that sends nothing in time is dropped.
async fn handshake(socket: TcpStream, timeout: Duration) -> anyhow::Result<Peer> {
    let addr = socket.peer_addr()?;
    let (read_half, writer) = socket.into_split();
    let mut reader = BufReader::new(read_half);

    let mut line = String::new();
    let n = time::timeout(timeout, reader.read_line(&mut line))
        .await
        .context("handshake timed out")?
        .context("handshake read failed")?;
    if n == 0 {
        anyhow::bail!("closed before handshake");
    }

    let line = line.trim_end_matches(['\r', '\n']);
    let name = match WireMessage::parse(line) {
        Some(WireMessage::Name(name)) => name,
        _ => addr.to_string(),
    };
    info!("client connected: {} ({})", name, addr);
    Ok(Peer {
        name,
        reader,
        writer,
    })
}

/// One game session: assign colors, then relay lines verbatim in both
/// directions until either peer drops.
async fn run_session(black: Peer, white: Peer) {
    info!("new game session: {} vs {}", black.name, white.name);
    let Peer {
        name: black_name,
        reader: black_reader,
        writer: black_writer,
    } = black;
    let Peer {
        name: white_name,
        reader: white_reader,
        writer: white_writer,
    } = white;

    let black_writer = Arc::new(Mutex::new(black_writer));
    let white_writer = Arc::new(Mutex::new(white_writer));

    if send_line(&black_writer, &WireMessage::Start(Color::Black).to_string())
        .await
        .is_err()
        || send_line(&white_writer, &WireMessage::Start(Color::White).to_string())
            .await
            .is_err()
    {
        warn!(
            "session {} vs {} died during color assignment",
            black_name, white_name
        );
        return;
    }

    // One forwarding loop per direction; each is an independent failure
    // domain. Whichever stops first wins the select and triggers teardown.
    let forward_bw = forward(black_reader, &black_name, &white_writer, &white_name);
    let forward_wb = forward(white_reader, &white_name, &black_writer, &black_name);
    tokio::select! {
        _ = forward_bw => {}
        _ = forward_wb => {}
    }

    // Best-effort disconnect notice to both sides (the dead one no-ops),
    // then shut both sockets so the surviving reader sees EOF.
    let notice = WireMessage::Chat("Opponent disconnected.".into()).to_string();
    let _ = send_line(&black_writer, &notice).await;
    let _ = send_line(&white_writer, &notice).await;
    let _ = black_writer.lock().await.shutdown().await;
    let _ = white_writer.lock().await.shutdown().await;
    info!("session closed: {} vs {}", black_name, white_name);
}

/// Forwards every line from one peer to the other, verbatim, until EOF or
/// an I/O error on either end. The server never inspects the content.
async fn forward(
    mut reader: BufReader<OwnedReadHalf>,
    from: &str,
    dest: &Arc<Mutex<OwnedWriteHalf>>,
    to: &str,
) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                info!("{} disconnected", from);
                return;
            }
            Ok(_) => {
                let line = line.trim_end_matches(['\r', '\n']);
                debug!("[{} -> {}] {}", from, to, line);
                if send_line(dest, line).await.is_err() {
                    info!("{} unreachable, stopping forward from {}", to, from);
                    return;
                }
            }
            Err(e) => {
                warn!("read from {} failed: {}", from, e);
                return;
            }
        }
    }
}

async fn send_line(writer: &Arc<Mutex<OwnedWriteHalf>>, line: &str) -> std::io::Result<()> {
    let mut w = writer.lock().await;
    w.write_all(line.as_bytes()).await?;
    w.write_all(b"\n").await?;
    Ok(())
}
