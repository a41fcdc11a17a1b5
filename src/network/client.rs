use crate::network::protocol::WireMessage;
use anyhow::Context;
use log::{debug, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// The client side of one server connection after the `NAME:` handshake.
///
/// The socket is split into two background tasks: a reader that pushes every
/// received line onto `incoming` (the channel closes on EOF or a read error,
/// which is the disconnect signal), and a writer that drains `WireMessage`s
/// queued through `outgoing`. The session state machine only ever touches
/// these channels, never the socket.
pub struct ServerLink {
    pub outgoing: mpsc::UnboundedSender<WireMessage>,
    pub incoming: mpsc::UnboundedReceiver<String>,
}

pub async fn connect(addr: &str, name: &str) -> anyhow::Result<ServerLink> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;
    let (read_half, mut write_half) = stream.into_split();

    // Handshake before anything else is queued.
    let hello = WireMessage::Name(name.to_string()).to_string() + "\n";
    write_half.write_all(hello.as_bytes()).await?;

    let (incoming_tx, incoming_rx) = mpsc::unbounded_channel::<String>();
    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<WireMessage>();

    tokio::spawn(async move {
        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    debug!("recv: {}", line);
                    if incoming_tx.send(line).is_err() {
                        return;
                    }
                }
                Ok(None) => return, // EOF; dropping the sender closes the channel
                Err(e) => {
                    warn!("connection read failed: {}", e);
                    return;
                }
            }
        }
    });

    tokio::spawn(async move {
        while let Some(msg) = outgoing_rx.recv().await {
            let line = msg.to_string() + "\n";
            debug!("send: {}", line.trim_end());
            if let Err(e) = write_half.write_all(line.as_bytes()).await {
                warn!("connection write failed: {}", e);
                return;
            }
        }
    });

    Ok(ServerLink {
        outgoing: outgoing_tx,
        incoming: incoming_rx,
    })
}
