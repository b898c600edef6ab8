//! Websocket sessions of agents and administrators.
//!
//! Every session is served by its own task. The agent sends an `ARENA_CALL` frame and waits for
//! the `ARENA_REPLY` before sending the next one, so requests and replies strictly alternate and
//! need no ids. Once a session registered a character it acts for that character only, and when
//! the session ends the character gets disconnected.

use crate::arena::Arena;
use crate::hand_shake::{ConnectRequest, connect, send_closing_message};
use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use protocol::{
    ARENA_CALL, ARENA_REPLY, ARENA_ROUTE, ArenaError, ArenaRequest, ArenaResponse, Violation,
    decode_frame, encode_frame,
};
use std::sync::Arc;

/// The routes the arena serves.
pub fn router(arena: Arc<Arena>) -> Router {
    Router::new()
        .route(ARENA_ROUTE, get(websocket_handler))
        .with_state(arena)
}

/// What we know about the peer of one websocket.
#[derive(Debug, Default)]
pub struct Session {
    bound: Option<u32>,
}

impl Session {
    pub fn bound(&self) -> Option<u32> {
        self.bound
    }

    pub(crate) fn bind(&mut self, reference: u32) {
        self.bound = Some(reference);
    }

    /// Actions may only be issued for the session's own character.
    fn own(&self, reference: u32) -> Result<(), ArenaError> {
        if self.bound == Some(reference) {
            Ok(())
        } else {
            Err(Violation::ForeignReference {
                bound: self.bound,
                requested: reference,
            }
            .into())
        }
    }
}

/// This function gets immediately called and upgrades the web response to a web socket.
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(arena): State<Arc<Arena>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| websocket(socket, arena))
}

/// Does the whole handling from start to finish: serving requests -> disconnecting the bound
/// character -> closing message.
async fn websocket(stream: WebSocket, arena: Arc<Arena>) {
    let (mut sender, receiver) = stream.split();
    let mut session = Session::default();

    let reason = serve_requests(&mut sender, receiver, &arena, &mut session).await;

    if let Some(reference) = session.bound() {
        arena.disconnect(reference, reason).await;
    }
    tracing::debug!(bound = ?session.bound(), reason, "Session closed.");
    send_closing_message(&mut sender, reason).await;
}

/// Answers requests until the connection ends. Returns why it ended.
async fn serve_requests(
    sender: &mut SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    arena: &Arena,
    session: &mut Session,
) -> &'static str {
    while let Some(state) = receiver.next().await {
        match state {
            Ok(Message::Binary(bytes)) => {
                let request = match decode_frame::<ArenaRequest>(ARENA_CALL, &bytes) {
                    Ok(request) => request,
                    Err(error) => {
                        tracing::error!(%error, "Illegal frame from agent.");
                        return "Illegal frame received.";
                    }
                };
                let response = handle_request(arena, session, request).await;
                let frame = match encode_frame(ARENA_REPLY, &response) {
                    Ok(frame) => frame,
                    Err(error) => {
                        tracing::error!(%error, "Could not encode reply.");
                        return "Internal error.";
                    }
                };
                if sender.send(Message::Binary(frame)).await.is_err() {
                    return "Connection lost.";
                }
            }
            Ok(Message::Close(_)) => return "Session closed by the agent.",
            // Ping and pong are handled by axum.
            Ok(_) => {}
            Err(_) => return "Connection lost.",
        }
    }
    "Connection lost."
}

/// Executes one request. Refused requests are logged here and never end the session.
pub async fn handle_request(
    arena: &Arena,
    session: &mut Session,
    request: ArenaRequest,
) -> ArenaResponse {
    let name = request.name();
    let response = dispatch(arena, session, request).await;
    if let ArenaResponse::Failed(error) = &response {
        if error.is_benign() {
            tracing::debug!(request = name, bound = ?session.bound(), %error, "Request refused.");
        } else {
            tracing::warn!(request = name, bound = ?session.bound(), %error, "Request refused.");
        }
    }
    response
}

async fn dispatch(arena: &Arena, session: &mut Session, request: ArenaRequest) -> ArenaResponse {
    let registry = arena.registry();
    match request {
        ArenaRequest::AllocateReference => {
            let allocated = registry.allocate_reference().await;
            if let Ok(reference) = allocated {
                tracing::debug!(reference, "Reference allocated.");
            }
            allocated.map(ArenaResponse::Reference).into()
        }
        ArenaRequest::Connect {
            reference,
            callback,
            entity,
            turn_budget,
            position,
        } => {
            let request = ConnectRequest {
                reference,
                callback,
                entity,
                turn_budget,
                position,
            };
            connect(arena, session, request).await.into()
        }
        ArenaRequest::GetPosition { reference } => registry.position(reference).await.into(),
        ArenaRequest::GetNeighbors { reference } => registry
            .neighbors(reference, registry.rules().vision_radius)
            .await
            .into(),
        ArenaRequest::ElementFromRef { reference } => {
            registry.element_from_ref(reference).await.into()
        }
        ArenaRequest::Move { reference, target } => {
            act(session, reference, arena.resolver().move_toward(reference, target)).await
        }
        ArenaRequest::Attack { reference, target } => {
            act(session, reference, arena.resolver().attack(reference, target)).await
        }
        ArenaRequest::Slow { reference, target } => {
            act(session, reference, arena.resolver().slow(reference, target)).await
        }
        ArenaRequest::PickupPotion { reference, potion } => {
            act(session, reference, arena.resolver().pickup_potion(reference, potion)).await
        }
        ArenaRequest::SetStatusText { reference, text } => {
            act(session, reference, registry.set_status_text(reference, &text)).await
        }
        ArenaRequest::IsGameStarted => ArenaResponse::Accepted(arena.is_game_started()),
        ArenaRequest::CheckSecret { secret } => ArenaResponse::Accepted(arena.check_secret(&secret)),
        ArenaRequest::StartGame { secret } => arena.start_game(&secret).into(),
        ArenaRequest::Evict { target, secret } => arena.evict(target, &secret).await.into(),
        ArenaRequest::StagePotion {
            potion,
            position,
            secret,
        } => arena
            .stage_potion(potion, position, &secret)
            .await
            .map(ArenaResponse::Reference)
            .into(),
        ArenaRequest::ReleasePotion { reference, secret } => {
            arena.release_potion(reference, &secret).await.into()
        }
        ArenaRequest::AddPotion {
            potion,
            position,
            secret,
        } => arena
            .add_potion(potion, position, &secret)
            .await
            .map(ArenaResponse::Reference)
            .into(),
        ArenaRequest::PendingPotions { secret } => arena
            .pending_potions(&secret)
            .await
            .map(ArenaResponse::PendingPotions)
            .into(),
    }
}

/// Runs an action of the session's own character. The outcome itself is only logged.
async fn act<T>(
    session: &Session,
    reference: u32,
    action: impl Future<Output = Result<T, ArenaError>>,
) -> ArenaResponse {
    if let Err(error) = session.own(reference) {
        return ArenaResponse::Failed(error);
    }
    action.await.map(|_| ()).into()
}
