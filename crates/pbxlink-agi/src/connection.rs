use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use pbxlink_frame::{AgiCodec, FrameEvent, HeaderBlock};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::channel::{CommandChannel, LineOutcome};
use crate::error::{AgiError, Result};
use crate::reply::{DecodedReply, Reply};

/// Greeting variable used to pick a menu tree.
pub const NETWORK_SCRIPT_VARIABLE: &str = "agi_network_script";

/// One accepted AGI session.
///
/// Created by [`AgiConnection::accept`] once the peer's greeting block has
/// arrived. Commands are issued one at a time; each call waits for its reply.
pub struct AgiConnection<T> {
    /// `None` once closed; the stream is dropped at that point.
    framed: Option<Framed<T, AgiCodec>>,
    channel: CommandChannel,
    greeting: HeaderBlock,
    peer: Option<SocketAddr>,
    hung_up: bool,
}

impl<T> AgiConnection<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a fresh stream and read the greeting.
    pub async fn accept(io: T, peer: Option<SocketAddr>) -> Result<Self> {
        Self::accept_with_codec(io, peer, AgiCodec::new()).await
    }

    pub async fn accept_with_codec(
        io: T,
        peer: Option<SocketAddr>,
        codec: AgiCodec,
    ) -> Result<Self> {
        let mut framed = Framed::new(io, codec);
        let greeting = loop {
            match framed.next().await {
                Some(Ok(FrameEvent::Headers(block))) => break block,
                Some(Ok(FrameEvent::Line(line))) => {
                    debug!(?peer, %line, "dropping line before greeting");
                }
                Some(Err(err)) => return Err(err.into()),
                None => return Err(AgiError::ConnectionClosed),
            }
        };

        info!(
            ?peer,
            script = greeting.get(NETWORK_SCRIPT_VARIABLE).unwrap_or(""),
            variables = greeting.len(),
            "AGI session started"
        );

        Ok(Self {
            framed: Some(framed),
            channel: CommandChannel::new(),
            greeting,
            peer,
            hung_up: false,
        })
    }

    /// Variables the peer sent in its greeting.
    pub fn variables(&self) -> &HeaderBlock {
        &self.greeting
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.greeting.get(name)
    }

    /// Selector value (`agi_network_script`), if the peer sent a non-empty one.
    pub fn network_script(&self) -> Option<&str> {
        self.greeting
            .get(NETWORK_SCRIPT_VARIABLE)
            .filter(|script| !script.is_empty())
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// True once the peer reported a hangup.
    pub fn hung_up(&self) -> bool {
        self.hung_up
    }

    pub fn is_closed(&self) -> bool {
        self.framed.is_none()
    }

    fn framed(&mut self) -> Result<&mut Framed<T, AgiCodec>> {
        self.framed.as_mut().ok_or(AgiError::ConnectionClosed)
    }

    /// Issue one command and wait for its decoded reply.
    ///
    /// Non-200 and malformed replies are returned as [`Reply`] values, not
    /// errors. A hangup closes the connection and returns [`AgiError::Hangup`].
    pub async fn command(&mut self, command: &str) -> Result<Reply> {
        if self.hung_up {
            return Err(AgiError::Hangup);
        }
        if self.is_closed() {
            return Err(AgiError::ConnectionClosed);
        }

        self.channel.begin(command)?;
        debug!(peer = ?self.peer, command, "sending AGI command");
        let sent = self.framed()?.send(command).await;
        if let Err(err) = sent {
            self.channel.abandon();
            return Err(err.into());
        }

        loop {
            let next = self.framed()?.next().await;
            let line = match next {
                Some(Ok(FrameEvent::Line(line))) => line,
                Some(Ok(FrameEvent::Headers(_))) => continue,
                Some(Err(err)) => {
                    self.channel.abandon();
                    return Err(err.into());
                }
                None => {
                    self.channel.abandon();
                    self.framed = None;
                    return Err(AgiError::ConnectionClosed);
                }
            };

            match self.channel.on_line(&line) {
                LineOutcome::Continue => {}
                LineOutcome::Reply { command, reply } => {
                    debug!(
                        peer = ?self.peer,
                        command = %command,
                        code = ?reply.code(),
                        "AGI reply"
                    );
                    return Ok(reply);
                }
                LineOutcome::Hangup => {
                    info!(peer = ?self.peer, "AGI channel hung up");
                    self.hung_up = true;
                    self.close().await;
                    return Err(AgiError::Hangup);
                }
                LineOutcome::Unsolicited(line) => {
                    warn!(peer = ?self.peer, %line, "dropping unsolicited AGI line");
                }
            }
        }
    }

    /// Like [`command`](Self::command), but non-200 and malformed replies become errors.
    pub async fn execute(&mut self, command: &str) -> Result<DecodedReply> {
        match self.command(command).await? {
            Reply::Success(decoded) => Ok(decoded),
            Reply::Failure(code) => Err(AgiError::CommandFailed {
                command: command.to_string(),
                code,
            }),
            Reply::Malformed(raw) => Err(AgiError::MalformedReply {
                command: command.to_string(),
                raw,
            }),
        }
    }

    /// Shut down and drop the stream. Any pending command is abandoned.
    pub async fn close(&mut self) {
        let Some(mut framed) = self.framed.take() else {
            return;
        };
        if let Some(pending) = self.channel.abandon() {
            debug!(peer = ?self.peer, command = pending.command(), "abandoning pending command");
        }
        if let Err(err) = framed.get_mut().shutdown().await {
            if err.kind() != std::io::ErrorKind::NotConnected {
                debug!(peer = ?self.peer, error = %err, "error shutting down AGI stream");
            }
        }
        drop(framed);
        info!(peer = ?self.peer, "AGI session closed");
    }
}

impl<T> std::fmt::Debug for AgiConnection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgiConnection")
            .field("peer", &self.peer)
            .field("greeting", &self.greeting)
            .field("hung_up", &self.hung_up)
            .field("closed", &self.framed.is_none())
            .finish_non_exhaustive()
    }
}
