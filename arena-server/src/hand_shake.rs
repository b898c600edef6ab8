//! This module does the registration part of the handshake and the closing of sessions.
//! The general protocol of connecting is:
//! Agent -> Arena: `AllocateReference`, answered with the new reference id.
//! Agent: opens its callback endpoint on base port + reference.
//! Agent -> Arena: `Connect`, the arena dials the callback endpoint and registers the character.

use crate::arena::Arena;
use crate::callback::dial;
use crate::session::Session;
use axum::extract::ws::{Message, WebSocket};
use futures_util::sink::SinkExt;
use futures_util::stream::SplitSink;
use protocol::{ArenaError, CallbackAddress, Entity, Point, SERVER_ERROR, Violation, encode_text_frame};
use std::time::Duration;

/// How long we try to reach a callback endpoint before giving up on the registration.
const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Is called on error and on regular session end. Sends a text message as a binary frame, so
/// agents see the reason even if their websocket layer hides closing frames.
pub async fn send_closing_message(sender: &mut SplitSink<WebSocket, Message>, closing_message: &str) {
    let frame = encode_text_frame(SERVER_ERROR, closing_message);
    let _ = sender.send(Message::Binary(frame)).await;
    let _ = sender.send(Message::Close(None)).await;
}

/// The registration request of an agent.
pub struct ConnectRequest {
    pub reference: u32,
    pub callback: CallbackAddress,
    pub entity: Entity,
    pub turn_budget: Option<u32>,
    pub position: Point,
}

/// Validates the registration, dials the callback endpoint and registers the character.
/// On success the session acts for the new character from now on.
pub async fn connect(
    arena: &Arena,
    session: &mut Session,
    request: ConnectRequest,
) -> Result<bool, ArenaError> {
    if let Some(bound) = session.bound() {
        return Err(Violation::SessionAlreadyBound(bound).into());
    }
    let ConnectRequest {
        reference,
        callback,
        entity,
        turn_budget,
        position,
    } = request;
    let address = callback.to_string();
    let registry = arena.registry();

    // Cheap checks first, nobody gets dialed for a registration we would refuse anyway.
    registry
        .validate_attach(reference, &entity, position, turn_budget, &address)
        .await?;

    let handle = match tokio::time::timeout(DIAL_TIMEOUT, dial(&callback)).await {
        Ok(Ok(handle)) => handle,
        Ok(Err(error)) => {
            tracing::warn!(reference, %address, %error, "Callback endpoint not reachable.");
            return Err(Violation::CallbackUnreachable(address).into());
        }
        Err(_) => {
            tracing::warn!(reference, %address, "Callback endpoint timed out.");
            return Err(Violation::CallbackUnreachable(address).into());
        }
    };

    // Someone else may have registered in the meantime, so the insert validates again.
    if let Err(error) = registry
        .attach_character(reference, entity, handle.clone(), position, turn_budget)
        .await
    {
        handle.shutdown("Registration rejected.").await;
        return Err(error);
    }

    session.bind(reference);
    arena.character_joined().await;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArenaConfig;
    use axum::Router;
    use axum::extract::WebSocketUpgrade;
    use axum::routing::get;
    use protocol::{AgentRequest, CALLBACK_ROUTE, CharacterKind, DEFAULT_HOST};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// A callback endpoint that only reports the shutdown notices it receives.
    async fn callback_endpoint() -> (CallbackAddress, mpsc::Receiver<String>) {
        let listener = TcpListener::bind((DEFAULT_HOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (notices, received) = mpsc::channel(4);
        let route = get(move |ws: WebSocketUpgrade| {
            let notices = notices.clone();
            async move {
                ws.on_upgrade(move |mut socket| async move {
                    while let Some(Ok(message)) = socket.recv().await {
                        if let Message::Binary(bytes) = message {
                            if let Ok(AgentRequest::Shutdown(reason)) = AgentRequest::from_frame(&bytes) {
                                let _ = notices.send(reason).await;
                            }
                        }
                    }
                })
            }
        });
        tokio::spawn(axum::serve(listener, Router::new().route(CALLBACK_ROUTE, route)).into_future());
        let address = CallbackAddress {
            host: DEFAULT_HOST.to_string(),
            port,
        };
        (address, received)
    }

    fn request(reference: u32, callback: CallbackAddress) -> ConnectRequest {
        ConnectRequest {
            reference,
            callback,
            entity: Entity::character("Hero", "G1", CharacterKind::Fighter, []),
            turn_budget: None,
            position: Point::new(4, 4),
        }
    }

    #[tokio::test]
    async fn unreachable_callback_rejects_the_registration() {
        let arena = Arena::new(&ArenaConfig::default());
        let reference = arena.registry().allocate_reference().await.unwrap();
        // Nobody listens on a port we just gave back.
        let port = {
            let listener = TcpListener::bind((DEFAULT_HOST, 0)).await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let callback = CallbackAddress {
            host: DEFAULT_HOST.to_string(),
            port,
        };
        let address = callback.to_string();
        let mut session = Session::default();

        let result = connect(&arena, &mut session, request(reference, callback)).await;
        assert_eq!(result, Err(Violation::CallbackUnreachable(address).into()));
        assert_eq!(session.bound(), None);
        assert_eq!(arena.registry().live_count().await, 0);
    }

    #[tokio::test]
    async fn session_registers_only_once() {
        let arena = Arena::new(&ArenaConfig::default());
        let (callback, _notices) = callback_endpoint().await;
        let first = arena.registry().allocate_reference().await.unwrap();
        let mut session = Session::default();
        assert_eq!(
            connect(&arena, &mut session, request(first, callback)).await,
            Ok(true)
        );
        assert_eq!(session.bound(), Some(first));

        let (other, _other_notices) = callback_endpoint().await;
        let second = arena.registry().allocate_reference().await.unwrap();
        assert_eq!(
            connect(&arena, &mut session, request(second, other)).await,
            Err(Violation::SessionAlreadyBound(first).into())
        );
        assert_eq!(session.bound(), Some(first));
        assert!(!arena.registry().is_live(second).await);
    }

    #[tokio::test]
    async fn racing_registrations_have_one_winner() {
        let arena = Arena::new(&ArenaConfig::default());
        let reference = arena.registry().allocate_reference().await.unwrap();
        let (left, mut left_notices) = callback_endpoint().await;
        let (right, mut right_notices) = callback_endpoint().await;
        let mut left_session = Session::default();
        let mut right_session = Session::default();

        let (left_result, right_result) = tokio::join!(
            connect(&arena, &mut left_session, request(reference, left)),
            connect(&arena, &mut right_session, request(reference, right)),
        );

        let duplicate = Err(Violation::DuplicateRegistration(reference).into());
        let (loser_session, loser_notices) = match (left_result, right_result) {
            (Ok(true), lost) => {
                assert_eq!(lost, duplicate);
                (&right_session, &mut right_notices)
            }
            (lost, Ok(true)) => {
                assert_eq!(lost, duplicate);
                (&left_session, &mut left_notices)
            }
            other => panic!("expected exactly one winner, got {other:?}"),
        };
        assert_eq!(loser_session.bound(), None);
        assert_eq!(arena.registry().live_count().await, 1);

        // Both endpoints got dialed, the losing one is told so and hung up on.
        let notice = tokio::time::timeout(Duration::from_secs(5), loser_notices.recv())
            .await
            .unwrap();
        assert_eq!(notice.as_deref(), Some("Registration rejected."));
    }
}
