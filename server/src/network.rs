//! WebSocket transport layer
//!
//! Thin I/O wrapper around the engine: accepts connections, decodes inbound
//! JSON frames into typed messages, and drains each connection's outbound
//! queue onto its socket. All room and player state lives behind the engine
//! event channel; nothing in this module touches it directly.

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::{ClientMessage, ServerMessage};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::accept_async;

use crate::registry::generate_player_id;
use crate::router::{EngineEvent, Router};

/// WebSocket relay server: one listener, one engine task, and a
/// reader/writer task pair per connection.
pub struct RelayServer {
    listener: TcpListener,
}

impl RelayServer {
    /// Binds the listener. The server does not accept until [`run`] is
    /// called.
    ///
    /// [`run`]: RelayServer::run
    pub async fn bind(addr: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    /// The bound address; useful when binding to port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop forever. Spawns the engine task and a handler
    /// per connection; a failed handshake or a broken connection never
    /// affects other rooms or connections.
    pub async fn run(self) -> std::io::Result<()> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let router = Router::new(events_tx.clone());
        tokio::spawn(router.run(events_rx));

        loop {
            let (stream, addr) = self.listener.accept().await?;
            let events = events_tx.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, events).await {
                    debug!("Connection from {} ended with error: {}", addr, e);
                }
            });
        }
    }
}

/// Drives one connection: handshake, identity assignment, then the
/// read/decode/forward loop until the peer goes away.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    events: mpsc::UnboundedSender<EngineEvent>,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let socket = accept_async(stream).await?;
    let (mut sink, mut source) = socket.split();

    let player_id = generate_player_id();
    info!("New client {} connected from {}", player_id, addr);

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();
    if events
        .send(EngineEvent::Connected {
            player_id: player_id.clone(),
            sender: outbound_tx,
        })
        .is_err()
    {
        // Engine already gone; nothing to relay to.
        return Ok(());
    }

    // Writer task: encode and push queued messages to the peer.
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to encode outbound message: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    // Reader loop: decode text frames, drop anything unintelligible
    // without closing the connection.
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(message) => {
                    if events
                        .send(EngineEvent::Inbound {
                            player_id: player_id.clone(),
                            message,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Client {}: dropping undecodable message: {}", player_id, e);
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // binary, ping, pong: nothing to relay
            Err(e) => {
                debug!("Client {}: read error: {}", player_id, e);
                break;
            }
        }
    }

    info!("Client {} disconnected", player_id);
    let _ = events.send(EngineEvent::Disconnected { player_id });
    writer.abort();
    Ok(())
}
