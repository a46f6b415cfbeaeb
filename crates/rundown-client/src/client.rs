//! The client handle and its typed call surface.

use crate::driver::{Command, Driver};
use crate::error::{CallError, ClientError};
use rundown_core::{Envelope, PageList, TextReply, types};
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Default identity presented to the bridge as `Sender`.
pub const DEFAULT_SENDER_ID: &str = "E56E345DE28A44BFBFBE218AB6AEE3EF";

/// Tunables for one connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Identity stamped on outbound envelopes as `Sender`.
    pub sender_id: String,
    /// Seconds a call may wait for its reply.
    pub reply_timeout_secs: u64,
    /// How often the expiration sweep runs while the peer is quiet.
    pub sweep_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            sender_id: DEFAULT_SENDER_ID.to_string(),
            reply_timeout_secs: 3,
            sweep_interval: Duration::from_secs(1),
        }
    }
}

/// Handle to a running connection.
///
/// Cheap to clone; every clone feeds the same driver. Dropping the last
/// clone closes the connection.
#[derive(Clone)]
pub struct Client {
    commands: mpsc::UnboundedSender<Command>,
}

impl Client {
    /// Connect to the bridge, pairing a handle with the driver for the new
    /// connection. Spawn the driver; the connection lives as long as it
    /// runs.
    pub async fn connect(url: &str, config: ClientConfig) -> Result<(Client, Driver), ClientError> {
        let (socket, _response) = tokio_tungstenite::connect_async(url).await?;
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let client = Client {
            commands: command_tx,
        };
        Ok((client, Driver::new(socket, command_rx, config)))
    }

    /// Issue a correlated call and wait for its reply envelope.
    ///
    /// Never fails synchronously: timeouts, transport trouble, and encoding
    /// problems all arrive as the returned [`CallError`]. Any number of
    /// calls may be in flight at once; replies match up regardless of
    /// arrival order.
    pub async fn call(
        &self,
        message_type: impl Into<String>,
        payload: Map<String, Value>,
    ) -> Result<Envelope, CallError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = Command::Call {
            message_type: message_type.into(),
            payload,
            reply_tx,
        };
        self.commands
            .send(command)
            .map_err(|_| CallError::ConnectionClosed)?;
        reply_rx.await.map_err(|_| CallError::ConnectionClosed)?
    }

    /// Run the discovery handshake: broadcast a ping and wait for the pong
    /// naming the peer. Until a pong arrives, calls go out unaddressed.
    pub async fn ping(&self) -> Result<Envelope, CallError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Ping { reply_tx })
            .map_err(|_| CallError::ConnectionClosed)?;
        reply_rx.await.map_err(|_| CallError::ConnectionClosed)?
    }

    /// Load a rundown asset; returns the bridge's confirmation text.
    pub async fn load_rundown(&self, rundown: &str) -> Result<String, CallError> {
        let mut payload = Map::new();
        payload.insert("rundown".to_string(), Value::from(rundown));
        let reply = self.call(types::LOAD_RUNDOWN, payload).await?;
        let body: TextReply = decode_body(&reply)?;
        Ok(body.text)
    }

    /// List the loaded rundown's pages.
    pub async fn list_pages(&self) -> Result<PageList, CallError> {
        let reply = self.call(types::GET_PAGES, Map::new()).await?;
        decode_body(&reply)
    }

    /// Run `action` (e.g. `Play`) against a page; returns the confirmation
    /// text.
    pub async fn page_action(&self, page_id: i64, action: &str) -> Result<String, CallError> {
        let mut payload = Map::new();
        payload.insert("pageId".to_string(), Value::from(page_id));
        payload.insert("action".to_string(), Value::from(action));
        let reply = self.call(types::PAGE_ACTION, payload).await?;
        let body: TextReply = decode_body(&reply)?;
        Ok(body.text)
    }
}

/// Interpret a matched reply's body, reporting shape mismatches as the
/// caller-visible error.
fn decode_body<T: serde::de::DeserializeOwned>(reply: &Envelope) -> Result<T, CallError> {
    reply.body_as().map_err(|error| CallError::UnexpectedReply {
        message_type: reply.message_type.clone(),
        detail: error.to_string(),
    })
}
