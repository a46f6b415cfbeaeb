//! The connection driver.
//!
//! One task owns the socket, the pending-call table, and the discovered
//! peer address. Client handles reach it through a command channel, and
//! each turn of the loop handles exactly one command, inbound frame, or
//! sweep tick, so none of that state needs a lock.

use crate::client::ClientConfig;
use crate::error::{CallError, ClientError};
use crate::registry::{PendingTable, ReplySender};
use futures_util::{SinkExt, StreamExt};
use rundown_core::{Envelope, Inbound, types};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Work enqueued by `Client` handles.
pub(crate) enum Command {
    /// An ordinary correlated call.
    Call {
        message_type: String,
        payload: Map<String, Value>,
        reply_tx: ReplySender,
    },
    /// The discovery handshake.
    Ping { reply_tx: ReplySender },
}

/// Drives one connection until it ends.
///
/// Returned by [`Client::connect`](crate::Client::connect) alongside the
/// handle; spawn [`run`](Driver::run) and keep the join handle, since its
/// result is where transport failures surface.
pub struct Driver {
    socket: Socket,
    commands: mpsc::UnboundedReceiver<Command>,
    table: PendingTable,
    peer: Option<String>,
    config: ClientConfig,
}

impl Driver {
    pub(crate) fn new(
        socket: Socket,
        commands: mpsc::UnboundedReceiver<Command>,
        config: ClientConfig,
    ) -> Self {
        Self {
            socket,
            commands,
            table: PendingTable::new(),
            peer: None,
            config,
        }
    }

    /// Run until the peer closes, the transport fails, or every `Client`
    /// handle is dropped. A close from either side returns `Ok`; pending
    /// calls are rejected in every case.
    pub async fn run(mut self) -> Result<(), ClientError> {
        let mut sweep = tokio::time::interval(self.config.sweep_interval);
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if let Err(error) = handle_command(
                            &mut self.socket,
                            &mut self.table,
                            &self.peer,
                            &self.config,
                            command,
                        )
                        .await
                        {
                            self.table.reject_all(CallError::Transport(error.to_string()));
                            return Err(error);
                        }
                    }
                    // Every handle is gone.
                    None => break,
                },
                frame = self.socket.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&mut self.table, &mut self.peer, &text);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!(
                            "connection closed by peer, rejecting {} pending calls",
                            self.table.len()
                        );
                        self.table.reject_all(CallError::ConnectionClosed);
                        return Ok(());
                    }
                    // Binary payloads and control frames are not part of
                    // the protocol.
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        tracing::warn!("websocket error: {}", error);
                        self.table.reject_all(CallError::Transport(error.to_string()));
                        return Err(ClientError::Transport(error));
                    }
                },
                _ = sweep.tick() => self.table.reject_expired(now_secs()),
            }
        }

        tracing::debug!(
            "all client handles dropped, closing with {} pending calls",
            self.table.len()
        );
        let _ = self.socket.close(None).await;
        self.table.reject_all(CallError::ConnectionClosed);
        Ok(())
    }
}

/// Send one request and register it. A transport failure here is fatal to
/// the connection and is returned to the driver loop.
async fn handle_command(
    socket: &mut Socket,
    table: &mut PendingTable,
    peer: &Option<String>,
    config: &ClientConfig,
    command: Command,
) -> Result<(), ClientError> {
    let (message_type, payload, reply_tx, handshake) = match command {
        Command::Call {
            message_type,
            payload,
            reply_tx,
        } => (message_type, payload, reply_tx, false),
        Command::Ping { reply_tx } => {
            let mut payload = Map::new();
            payload.insert("bAuto".to_string(), Value::Bool(false));
            (types::PING.to_string(), payload, reply_tx, true)
        }
    };

    let request_id = table.next_request_id();
    let recipients: Vec<String> = peer.iter().cloned().collect();
    let envelope = Envelope::request(
        message_type,
        payload,
        &config.sender_id,
        recipients,
        request_id,
        now_secs(),
        config.reply_timeout_secs,
    );

    let text = match envelope.encode() {
        Ok(text) => text,
        Err(error) => {
            // Nothing went out; only this call fails.
            let _ = reply_tx.send(Err(CallError::Encoding(error.to_string())));
            return Ok(());
        }
    };

    if let Err(error) = socket.send(Message::Text(text.into())).await {
        let _ = reply_tx.send(Err(CallError::Transport(error.to_string())));
        return Err(ClientError::Transport(error));
    }

    tracing::debug!("sent {} as request {}", envelope.message_type, request_id);
    if handshake {
        table.register_handshake(envelope, reply_tx);
    } else {
        table.register(request_id, envelope, reply_tx);
    }
    Ok(())
}

/// Decode, classify, and route one inbound text frame, then run the
/// reactive expiration sweep. Malformed frames are dropped before any side
/// effect.
fn handle_frame(table: &mut PendingTable, peer: &mut Option<String>, text: &str) {
    match Envelope::decode(text) {
        Ok(envelope) => match Inbound::classify(envelope) {
            Inbound::Pong(envelope) => {
                let sender = envelope.sender.clone();
                if table.resolve_handshake(envelope) {
                    tracing::info!("discovered peer {}", sender);
                    *peer = Some(sender);
                } else {
                    tracing::debug!("pong from {} with no handshake pending", sender);
                }
            }
            Inbound::Reply {
                request_id,
                envelope,
            } => {
                if !table.resolve(request_id, envelope) {
                    tracing::debug!("ignoring reply for unknown request {}", request_id);
                }
            }
            Inbound::Opaque(envelope) => {
                tracing::trace!("ignoring unroutable {}", envelope.message_type);
            }
        },
        Err(error) => tracing::debug!("dropping malformed frame: {}", error),
    }

    table.reject_expired(now_secs());
}

/// Wall-clock seconds since the Unix epoch, the protocol's time base.
fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}
