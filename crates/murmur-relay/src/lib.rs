//! Murmur relay server.
//!
//! The relay is an untrusted router: it assigns peer ids, tracks room
//! membership and forwards key announcements and sealed frames. It never sees
//! a private key, a session key or a plaintext, and does not decode the
//! payloads it forwards.
//!
//! ## Architecture
//!
//! ```text
//! murmur-relay
//!   ├─ Relay          (TCP accept loop, one task per connection)
//!   ├─ Hub            (RoomManager + per-connection outboxes, one mutex)
//!   └─ RoomManager    (sans-IO membership and routing)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod room_manager;

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use bytes::BytesMut;
pub use error::{RoomError, ServerError};
use murmur_core::SystemEnv;
use murmur_proto::{
    ClientMessage, MAX_PAYLOAD_SIZE, PeerId, ServerMessage, encode_packet,
    try_decode_packet_with_limit,
};
pub use room_manager::{Membership, RoomAction, RoomManager};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream, tcp::OwnedWriteHalf},
    sync::{Mutex, mpsc},
};

/// Default listen address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:5174";

/// Relay configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address to bind to (e.g., "0.0.0.0:5174")
    pub bind_address: String,
    /// Maximum concurrent connections
    pub max_connections: usize,
    /// Largest accepted packet payload; capped at the protocol maximum
    pub max_payload_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            max_connections: 10_000,
            max_payload_size: MAX_PAYLOAD_SIZE,
        }
    }
}

impl RelayConfig {
    /// Reject unusable settings.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.max_connections == 0 {
            return Err(ServerError::Config("max_connections must be positive".to_string()));
        }
        if self.max_payload_size == 0 || self.max_payload_size > MAX_PAYLOAD_SIZE {
            return Err(ServerError::Config(format!(
                "max_payload_size must be in 1..={MAX_PAYLOAD_SIZE}"
            )));
        }
        Ok(())
    }
}

type Outbox = mpsc::UnboundedSender<Vec<u8>>;

/// Room state plus the write queue of every connection.
struct Hub {
    rooms: RoomManager<SystemEnv>,
    outboxes: HashMap<PeerId, Outbox>,
}

impl Hub {
    fn execute(&self, actions: Vec<RoomAction>) {
        for action in actions {
            match action {
                RoomAction::Deliver { to, message } => self.deliver(&to, &message),
            }
        }
    }

    fn deliver(&self, to: &PeerId, message: &ServerMessage) {
        let Some(outbox) = self.outboxes.get(to) else {
            tracing::debug!(peer_id = %to, "recipient already gone");
            return;
        };

        let mut packet = Vec::new();
        match encode_packet(message, &mut packet) {
            Ok(()) => {
                let _ = outbox.send(packet);
            },
            Err(e) => tracing::error!(peer_id = %to, error = %e, "failed to encode message"),
        }
    }
}

/// Production Murmur relay.
pub struct Relay {
    listener: TcpListener,
    hub: Arc<Mutex<Hub>>,
    max_payload_size: usize,
}

impl Relay {
    /// Validate `config` and bind the listener.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or binding fails.
    pub async fn bind(config: RelayConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let listener = TcpListener::bind(&config.bind_address).await?;
        let hub = Hub {
            rooms: RoomManager::new(SystemEnv::new(), config.max_connections),
            outboxes: HashMap::new(),
        };

        Ok(Self {
            listener,
            hub: Arc::new(Mutex::new(hub)),
            max_payload_size: config.max_payload_size,
        })
    }

    /// Get the local address the relay is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Relay listening on {}", self.local_addr()?);

        loop {
            let (stream, addr) = self.listener.accept().await?;
            let hub = Arc::clone(&self.hub);
            let max_payload_size = self.max_payload_size;

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, hub, max_payload_size).await {
                    tracing::debug!(%addr, "Connection error: {}", e);
                }
            });
        }
    }
}

/// Serve one participant until it disconnects or misbehaves.
async fn handle_connection(
    stream: TcpStream,
    hub: Arc<Mutex<Hub>>,
    max_payload_size: usize,
) -> Result<(), ServerError> {
    stream.set_nodelay(true)?;
    let (mut reader, mut writer) = stream.into_split();
    let (outbox, inbox) = mpsc::unbounded_channel();

    let registered = {
        let mut hub = hub.lock().await;
        let registered = hub.rooms.connect();
        if let Ok(peer_id) = &registered {
            hub.outboxes.insert(peer_id.clone(), outbox);
        }
        registered
    };

    let peer_id = match registered {
        Ok(peer_id) => peer_id,
        Err(e) => {
            tracing::warn!("Rejecting connection: {}", e);
            let mut packet = Vec::new();
            encode_packet(&ServerMessage::Error { reason: e.to_string() }, &mut packet)?;
            writer.write_all(&packet).await?;
            let _ = writer.shutdown().await;
            return Err(e.into());
        },
    };

    let writer_task = tokio::spawn(write_loop(writer, inbox));
    let result = read_loop(&peer_id, &mut reader, &hub, max_payload_size).await;

    {
        let mut hub = hub.lock().await;
        hub.outboxes.remove(&peer_id);
        let actions = hub.rooms.disconnect(&peer_id);
        hub.execute(actions);
    }

    // The writer drains what is queued, then sees the closed channel.
    let _ = writer_task.await;
    result
}

async fn read_loop(
    peer_id: &PeerId,
    reader: &mut tokio::net::tcp::OwnedReadHalf,
    hub: &Mutex<Hub>,
    max_payload_size: usize,
) -> Result<(), ServerError> {
    let mut buf = BytesMut::with_capacity(8192);

    loop {
        if reader.read_buf(&mut buf).await? == 0 {
            return Ok(());
        }

        while let Some(message) =
            try_decode_packet_with_limit::<ClientMessage>(&mut buf, max_payload_size)?
        {
            let mut guard = hub.lock().await;
            let actions = guard.rooms.handle(peer_id, message)?;
            guard.execute(actions);
        }
    }
}

async fn write_loop(mut writer: OwnedWriteHalf, mut inbox: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(packet) = inbox.recv().await {
        if let Err(e) = writer.write_all(&packet).await {
            tracing::debug!("Write error: {}", e);
            break;
        }
    }
    let _ = writer.shutdown().await;
}
