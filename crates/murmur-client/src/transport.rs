//! Tokio driver connecting a [`Client`] to a relay over TCP.
//!
//! One task owns the client and the socket. Application sends and relay
//! packets are processed strictly one at a time, so an announcement is always
//! applied before any later frame from the same peer.

use bytes::BytesMut;
use murmur_proto::{
    ClientMessage, PeerId, ProtocolError, ServerMessage, encode_packet, try_decode_packet,
};
use thiserror::Error;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpStream, tcp::OwnedWriteHalf},
    sync::mpsc,
    task::JoinHandle,
};

use crate::{Client, ClientAction, ClientConfig, ClientError, ClientEvent, Environment};

/// Errors that end a relay session.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket failure.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// The relay sent bytes that are not a valid packet.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The client hit a fatal error.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// The relay closed the connection.
    #[error("relay closed the connection")]
    ConnectionClosed,

    /// The session task is gone.
    #[error("session closed")]
    Closed,

    /// The session task panicked or was cancelled.
    #[error("session task failed: {0}")]
    Task(String),
}

/// What the session reports to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A peer's message was decrypted.
    Message {
        /// Sending peer.
        from: PeerId,
        /// Decrypted bytes.
        plaintext: Vec<u8>,
    },
    /// A participant entered the room; keying follows.
    PeerJoined {
        /// The newcomer.
        peer_id: PeerId,
        /// The newcomer's display name.
        name: String,
    },
    /// A session key with the peer is ready.
    PeerKeyed {
        /// The keyed peer.
        peer_id: PeerId,
    },
    /// A peer left and its keys were destroyed.
    PeerRemoved {
        /// The departed peer.
        peer_id: PeerId,
    },
    /// The relay refused a request.
    Rejected {
        /// Relay's reason.
        reason: String,
    },
    /// A non-fatal failure concerning one peer or one message.
    Error(ClientError),
}

enum Command {
    Send(Vec<u8>),
    Close,
}

/// Handle to a running relay session.
pub struct Session {
    commands: mpsc::UnboundedSender<Command>,
    notifications: mpsc::UnboundedReceiver<Notification>,
    task: JoinHandle<Result<(), TransportError>>,
}

impl Session {
    /// Generate an identity, connect to the relay and join the room.
    ///
    /// # Errors
    ///
    /// Fails if the key pair cannot be generated or the relay is unreachable.
    pub async fn connect<E: Environment>(
        env: E,
        config: ClientConfig,
    ) -> Result<Self, TransportError> {
        let client = Client::new(env, config.room, config.display_name)?;

        let stream = TcpStream::connect(&config.relay_address).await?;
        stream.set_nodelay(true)?;
        tracing::info!(relay = %config.relay_address, room = %client.room(), "connected to relay");

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(client, stream, command_rx, notify_tx));

        Ok(Self { commands: command_tx, notifications: notify_rx, task })
    }

    /// Encrypt and send `plaintext` to every keyed peer.
    ///
    /// Plaintext over [`crate::MAX_PLAINTEXT_SIZE`] is refused with a
    /// [`Notification::Error`]; the session keeps running.
    pub fn send(&self, plaintext: impl Into<Vec<u8>>) -> Result<(), TransportError> {
        self.commands.send(Command::Send(plaintext.into())).map_err(|_| TransportError::Closed)
    }

    /// Next notification; `None` once the session task has ended.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.notifications.recv().await
    }

    /// Leave the room, destroy keys and wait for the task to finish.
    pub async fn close(self) -> Result<(), TransportError> {
        let _ = self.commands.send(Command::Close);
        self.task.await.map_err(|e| TransportError::Task(e.to_string()))?
    }
}

async fn run<E: Environment>(
    mut client: Client<E>,
    stream: TcpStream,
    mut commands: mpsc::UnboundedReceiver<Command>,
    notify: mpsc::UnboundedSender<Notification>,
) -> Result<(), TransportError> {
    let (mut reader, mut writer) = stream.into_split();
    let mut buf = BytesMut::with_capacity(8192);

    step(&mut client, ClientEvent::Connected, &mut writer, &notify).await?;

    loop {
        tokio::select! {
            read = reader.read_buf(&mut buf) => {
                if read? == 0 {
                    tracing::info!("relay closed the connection");
                    return Err(TransportError::ConnectionClosed);
                }

                while let Some(message) = try_decode_packet::<ServerMessage>(&mut buf)? {
                    match ClientEvent::try_from(message) {
                        Ok(event) => step(&mut client, event, &mut writer, &notify).await?,
                        Err(reason) => {
                            tracing::warn!(%reason, "relay rejected request");
                            let _ = notify.send(Notification::Rejected { reason });
                        },
                    }
                }
            },
            command = commands.recv() => match command {
                Some(Command::Send(plaintext)) => {
                    let event = ClientEvent::SendMessage { plaintext };
                    step(&mut client, event, &mut writer, &notify).await?;
                },
                Some(Command::Close) | None => {
                    step(&mut client, ClientEvent::Close, &mut writer, &notify).await?;
                    writer.shutdown().await?;
                    return Ok(());
                },
            },
        }
    }
}

/// Feed one event to the client and execute its actions.
async fn step<E: Environment>(
    client: &mut Client<E>,
    event: ClientEvent,
    writer: &mut OwnedWriteHalf,
    notify: &mpsc::UnboundedSender<Notification>,
) -> Result<(), TransportError> {
    let actions = match client.handle(event) {
        Ok(actions) => actions,
        Err(e) if e.is_fatal() => return Err(e.into()),
        Err(e) => {
            tracing::debug!(error = %e, "event rejected");
            let _ = notify.send(Notification::Error(e));
            return Ok(());
        },
    };

    for action in actions {
        match action {
            ClientAction::Send(message) => write_message(writer, &message).await?,
            ClientAction::DeliverMessage { from, plaintext } => {
                let _ = notify.send(Notification::Message { from, plaintext });
            },
            ClientAction::PeerJoined { peer_id, name } => {
                let _ = notify.send(Notification::PeerJoined { peer_id, name });
            },
            ClientAction::PeerKeyed { peer_id } => {
                let _ = notify.send(Notification::PeerKeyed { peer_id });
            },
            ClientAction::PeerRemoved { peer_id } => {
                let _ = notify.send(Notification::PeerRemoved { peer_id });
            },
        }
    }

    Ok(())
}

async fn write_message(
    writer: &mut OwnedWriteHalf,
    message: &ClientMessage,
) -> Result<(), TransportError> {
    let mut packet = Vec::new();
    encode_packet(message, &mut packet)?;
    writer.write_all(&packet).await?;
    Ok(())
}
