//! The inbound half of an agent: the endpoint the arena dials to hand out turns.
//!
//! Turn requests arrive one at a time on a single websocket. Each is answered with `TURN_DONE`
//! once the strategy finished the turn. A `SHUTDOWN` frame ends the agent.

use crate::error::AgentError;
use crate::strategy::{AgentContext, Strategy};
use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use protocol::{AgentRequest, CALLBACK_ROUTE, TURN_DONE, encode_frame};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// The final word of the callback endpoint: the shutdown reason or why it broke down.
pub type Outcome = Result<String, AgentError>;

pub struct CallbackState<S> {
    strategy: Mutex<S>,
    context: AgentContext,
    finished: mpsc::Sender<Outcome>,
}

impl<S: Strategy> CallbackState<S> {
    pub fn new(strategy: S, context: AgentContext, finished: mpsc::Sender<Outcome>) -> Self {
        CallbackState {
            strategy: Mutex::new(strategy),
            context,
            finished,
        }
    }
}

pub fn router<S: Strategy>(state: Arc<CallbackState<S>>) -> Router {
    Router::new()
        .route(CALLBACK_ROUTE, get(callback_handler::<S>))
        .with_state(state)
}

async fn callback_handler<S: Strategy>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<CallbackState<S>>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_turns(socket, state))
}

async fn serve_turns<S: Strategy>(mut socket: WebSocket, state: Arc<CallbackState<S>>) {
    let outcome = turn_loop(&mut socket, &state).await;
    if let Err(error) = &outcome {
        tracing::error!(%error, "Callback endpoint failed.");
    }
    let _ = socket.send(Message::Close(None)).await;
    let _ = state.finished.send(outcome).await;
}

async fn turn_loop<S: Strategy>(socket: &mut WebSocket, state: &CallbackState<S>) -> Outcome {
    while let Some(message) = socket.recv().await {
        match message {
            Ok(Message::Binary(bytes)) => match AgentRequest::from_frame(&bytes)? {
                AgentRequest::ExecuteTurn(neighbors) => {
                    play_turn(state, neighbors).await?;
                    let done = encode_frame(TURN_DONE, &())?;
                    if socket.send(Message::Binary(done)).await.is_err() {
                        return Err(AgentError::Closed("Connection lost.".to_string()));
                    }
                }
                AgentRequest::Shutdown(reason) => {
                    state.strategy.lock().await.shutdown(&reason);
                    return Ok(reason);
                }
            },
            Ok(Message::Close(_)) | Err(_) => break,
            // Ping and pong are handled by axum.
            Ok(_) => {}
        }
    }
    Err(AgentError::Closed("Callback connection lost.".to_string()))
}

async fn play_turn<S: Strategy>(
    state: &CallbackState<S>,
    neighbors: protocol::Neighbors,
) -> Result<(), AgentError> {
    let mut strategy = state.strategy.lock().await;
    match strategy.execute_turn(&state.context, neighbors).await {
        Err(error) if error.is_fatal() => Err(error),
        Err(error) => {
            tracing::debug!(%error, "Call refused during the turn.");
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}
