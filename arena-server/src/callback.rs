//! The arena's side of the agent callback endpoints.
//!
//! For every registered agent the arena dials the agent's callback endpoint and spawns one task
//! that owns the socket. The rest of the arena only holds an [`AgentHandle`], which talks to that
//! task over an internal channel. Dropping the last handle ends the task.

use futures_util::{SinkExt, StreamExt};
use protocol::codec::decode_frame;
use protocol::{AgentRequest, CHANNEL_BUFFER_SIZE, CallbackAddress, FrameError, Neighbors, TURN_DONE};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type CallbackStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("callback connection closed")]
    Closed,
    #[error("callback transport failed: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("agent sent an illegal frame: {0}")]
    Frame(#[from] FrameError),
}

/// The commands the callback task understands.
pub enum CallbackCommand {
    /// Hands the turn to the agent. The reply fires once the agent reported back.
    ExecuteTurn {
        neighbors: Neighbors,
        reply: oneshot::Sender<Result<(), CallbackError>>,
    },
    /// Tells the agent it got disconnected and closes the socket.
    Shutdown { reason: String },
}

/// Cheap, clonable handle on an agent's callback endpoint.
#[derive(Clone, Debug)]
pub struct AgentHandle {
    sender: mpsc::Sender<CallbackCommand>,
    address: String,
}

impl AgentHandle {
    /// A handle whose commands end up in the returned receiver instead of a socket.
    /// Used for agents living inside the arena process, mostly in tests.
    pub fn in_process(address: impl Into<String>) -> (Self, mpsc::Receiver<CallbackCommand>) {
        let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        (
            AgentHandle {
                sender,
                address: address.into(),
            },
            receiver,
        )
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Runs one turn on the agent and waits until it is done. Not cancellable on the agent side:
    /// dropping the future only stops waiting for the answer.
    pub async fn execute_turn(&self, neighbors: Neighbors) -> Result<(), CallbackError> {
        let (reply, answer) = oneshot::channel();
        self.sender
            .send(CallbackCommand::ExecuteTurn { neighbors, reply })
            .await
            .map_err(|_| CallbackError::Closed)?;
        answer.await.map_err(|_| CallbackError::Closed)?
    }

    /// Best effort disconnect notice.
    pub async fn shutdown(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if self
            .sender
            .send(CallbackCommand::Shutdown { reason })
            .await
            .is_err()
        {
            tracing::debug!(address = %self.address, "Callback task already gone.");
        }
    }
}

/// Connects to the agent's callback endpoint and spawns the task owning the socket.
pub async fn dial(address: &CallbackAddress) -> Result<AgentHandle, CallbackError> {
    let (stream, _) = connect_async(address.url()).await?;
    let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let label = address.to_string();
    tokio::spawn(callback_task(stream, receiver, label.clone()));
    Ok(AgentHandle {
        sender,
        address: label,
    })
}

/// Processes the commands one after another, so an agent never sees overlapping turns.
async fn callback_task(
    mut stream: CallbackStream,
    mut commands: mpsc::Receiver<CallbackCommand>,
    address: String,
) {
    while let Some(command) = commands.recv().await {
        match command {
            CallbackCommand::ExecuteTurn { neighbors, reply } => {
                let result = run_turn(&mut stream, neighbors).await;
                let failed = result.is_err();
                if let Err(error) = &result {
                    tracing::warn!(%address, %error, "Turn callback failed.");
                }
                // The coordinator may have given up waiting already.
                let _ = reply.send(result);
                if failed {
                    break;
                }
            }
            CallbackCommand::Shutdown { reason } => {
                match AgentRequest::Shutdown(reason).to_frame() {
                    Ok(frame) => {
                        let _ = stream.send(Message::Binary(frame)).await;
                    }
                    Err(error) => tracing::error!(?error, "Could not encode shutdown notice."),
                }
                break;
            }
        }
    }
    let _ = stream.close(None).await;
    tracing::debug!(%address, "Callback task finished.");
}

async fn run_turn(stream: &mut CallbackStream, neighbors: Neighbors) -> Result<(), CallbackError> {
    let frame = AgentRequest::ExecuteTurn(neighbors).to_frame()?;
    stream.send(Message::Binary(frame)).await?;
    loop {
        match stream.next().await {
            None | Some(Ok(Message::Close(_))) => return Err(CallbackError::Closed),
            Some(Err(error)) => return Err(error.into()),
            Some(Ok(Message::Binary(bytes))) => {
                decode_frame::<()>(TURN_DONE, &bytes)?;
                return Ok(());
            }
            // Ping and pong are handled by tungstenite.
            Some(Ok(_)) => {}
        }
    }
}
