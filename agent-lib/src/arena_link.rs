//! The outbound half of an agent: remote calls on the arena.
//!
//! One websocket to the arena's `/ws` route carries all calls. A call sends one `ARENA_CALL`
//! frame and waits for the matching `ARENA_REPLY`; the link is locked for the whole exchange, so
//! calls from different tasks never interleave. A `SERVER_ERROR` frame means the arena closed the
//! session and carries its reason as text.

use crate::error::AgentError;
use futures_util::{SinkExt, StreamExt};
use protocol::codec::frame_kind;
use protocol::{
    ARENA_CALL, ARENA_REPLY, ARENA_ROUTE, ArenaRequest, ArenaResponse, CallbackAddress, Entity,
    Neighbors, PendingPotion, Point, SERVER_ERROR, decode_frame, encode_frame,
};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type ArenaStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Clonable handle on the session with the arena.
#[derive(Clone)]
pub struct ArenaLink {
    stream: Arc<Mutex<ArenaStream>>,
}

/// The websocket url of the arena.
pub fn arena_url(host: &str, port: u16) -> String {
    format!("ws://{host}:{port}{ARENA_ROUTE}")
}

fn unexpected(request: &'static str, response: ArenaResponse) -> AgentError {
    tracing::error!(request, ?response, "Unexpected reply.");
    AgentError::UnexpectedReply(request)
}

impl ArenaLink {
    pub async fn connect(host: &str, port: u16) -> Result<Self, AgentError> {
        let url = arena_url(host, port);
        let connected = connect_async(url.as_str()).await;
        let (stream, _) = connected.map_err(|source| AgentError::Connect { url, source })?;
        Ok(ArenaLink {
            stream: Arc::new(Mutex::new(stream)),
        })
    }

    /// Sends one request and waits for its reply. A refused call comes back as
    /// [`AgentError::Rejected`].
    pub async fn call(&self, request: ArenaRequest) -> Result<ArenaResponse, AgentError> {
        let frame = encode_frame(ARENA_CALL, &request)?;
        let mut stream = self.stream.lock().await;
        stream.send(Message::Binary(frame)).await?;
        loop {
            match stream.next().await {
                None | Some(Ok(Message::Close(_))) => {
                    return Err(AgentError::Closed("Connection lost.".to_string()));
                }
                Some(Err(error)) => return Err(error.into()),
                Some(Ok(Message::Binary(bytes))) => {
                    if frame_kind(&bytes)? == SERVER_ERROR {
                        let reason = String::from_utf8_lossy(&bytes[1..]).into_owned();
                        return Err(AgentError::Closed(reason));
                    }
                    return match decode_frame::<ArenaResponse>(ARENA_REPLY, &bytes)? {
                        ArenaResponse::Failed(error) => Err(error.into()),
                        response => Ok(response),
                    };
                }
                // Ping and pong are handled by tungstenite.
                Some(Ok(_)) => {}
            }
        }
    }

    async fn call_done(&self, request: ArenaRequest) -> Result<(), AgentError> {
        let name = request.name();
        match self.call(request).await? {
            ArenaResponse::Done => Ok(()),
            other => Err(unexpected(name, other)),
        }
    }

    async fn call_accepted(&self, request: ArenaRequest) -> Result<bool, AgentError> {
        let name = request.name();
        match self.call(request).await? {
            ArenaResponse::Accepted(accepted) => Ok(accepted),
            other => Err(unexpected(name, other)),
        }
    }

    async fn call_reference(&self, request: ArenaRequest) -> Result<u32, AgentError> {
        let name = request.name();
        match self.call(request).await? {
            ArenaResponse::Reference(reference) => Ok(reference),
            other => Err(unexpected(name, other)),
        }
    }

    pub async fn allocate_reference(&self) -> Result<u32, AgentError> {
        self.call_reference(ArenaRequest::AllocateReference).await
    }

    /// Registers the character. A refused registration is logged and reported as `false`.
    pub async fn connect_character(
        &self,
        reference: u32,
        callback: CallbackAddress,
        entity: Entity,
        turn_budget: Option<u32>,
        position: Point,
    ) -> Result<bool, AgentError> {
        let request = ArenaRequest::Connect {
            reference,
            callback,
            entity,
            turn_budget,
            position,
        };
        match self.call_accepted(request).await {
            Err(AgentError::Rejected(error)) => {
                tracing::warn!(reference, %error, "Registration refused.");
                Ok(false)
            }
            other => other,
        }
    }

    pub async fn position(&self, reference: u32) -> Result<Point, AgentError> {
        match self.call(ArenaRequest::GetPosition { reference }).await? {
            ArenaResponse::Position(position) => Ok(position),
            other => Err(unexpected("get_position", other)),
        }
    }

    pub async fn neighbors(&self, reference: u32) -> Result<Neighbors, AgentError> {
        match self.call(ArenaRequest::GetNeighbors { reference }).await? {
            ArenaResponse::Neighbors(neighbors) => Ok(neighbors),
            other => Err(unexpected("get_neighbors", other)),
        }
    }

    pub async fn element_from_ref(&self, reference: u32) -> Result<Entity, AgentError> {
        match self.call(ArenaRequest::ElementFromRef { reference }).await? {
            ArenaResponse::Element(entity) => Ok(entity),
            other => Err(unexpected("element_from_ref", other)),
        }
    }

    /// `target == None` wanders.
    pub async fn move_toward(&self, reference: u32, target: Option<u32>) -> Result<(), AgentError> {
        self.call_done(ArenaRequest::Move { reference, target }).await
    }

    pub async fn attack(&self, reference: u32, target: u32) -> Result<(), AgentError> {
        self.call_done(ArenaRequest::Attack { reference, target }).await
    }

    pub async fn slow(&self, reference: u32, target: u32) -> Result<(), AgentError> {
        self.call_done(ArenaRequest::Slow { reference, target }).await
    }

    pub async fn pickup_potion(&self, reference: u32, potion: u32) -> Result<(), AgentError> {
        self.call_done(ArenaRequest::PickupPotion { reference, potion })
            .await
    }

    pub async fn set_status_text(
        &self,
        reference: u32,
        text: impl Into<String>,
    ) -> Result<(), AgentError> {
        let text = text.into();
        self.call_done(ArenaRequest::SetStatusText { reference, text })
            .await
    }

    pub async fn is_game_started(&self) -> Result<bool, AgentError> {
        self.call_accepted(ArenaRequest::IsGameStarted).await
    }

    pub async fn check_secret(&self, secret: &str) -> Result<bool, AgentError> {
        let secret = secret.to_string();
        self.call_accepted(ArenaRequest::CheckSecret { secret }).await
    }

    pub async fn start_game(&self, secret: &str) -> Result<bool, AgentError> {
        let secret = secret.to_string();
        self.call_accepted(ArenaRequest::StartGame { secret }).await
    }

    pub async fn evict(&self, target: u32, secret: &str) -> Result<bool, AgentError> {
        let secret = secret.to_string();
        self.call_accepted(ArenaRequest::Evict { target, secret })
            .await
    }

    /// Returns the reference of the hidden potion.
    pub async fn stage_potion(
        &self,
        potion: Entity,
        position: Point,
        secret: &str,
    ) -> Result<u32, AgentError> {
        let secret = secret.to_string();
        self.call_reference(ArenaRequest::StagePotion {
            potion,
            position,
            secret,
        })
        .await
    }

    pub async fn release_potion(&self, reference: u32, secret: &str) -> Result<(), AgentError> {
        let secret = secret.to_string();
        self.call_done(ArenaRequest::ReleasePotion { reference, secret })
            .await
    }

    pub async fn add_potion(
        &self,
        potion: Entity,
        position: Point,
        secret: &str,
    ) -> Result<u32, AgentError> {
        let secret = secret.to_string();
        self.call_reference(ArenaRequest::AddPotion {
            potion,
            position,
            secret,
        })
        .await
    }

    pub async fn pending_potions(&self, secret: &str) -> Result<Vec<PendingPotion>, AgentError> {
        let secret = secret.to_string();
        match self.call(ArenaRequest::PendingPotions { secret }).await? {
            ArenaResponse::PendingPotions(potions) => Ok(potions),
            other => Err(unexpected("pending_potions", other)),
        }
    }

    /// Closes the session. The arena disconnects a registered character in turn.
    pub async fn close(&self) {
        let mut stream = self.stream.lock().await;
        let _ = stream.close(None).await;
    }
}
