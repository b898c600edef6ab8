//! Drives an agent through its whole life: handshake, turns, shutdown.
//!
//! The handshake goes:
//! 1. connect to the arena and get a reference id,
//! 2. open the callback endpoint on arena port + reference,
//! 3. register the character, at which point the arena dials the endpoint.
//!
//! From then on the arena calls us, and we only wait for the shutdown notice.

use crate::arena_link::ArenaLink;
use crate::callback_listener::{self, CallbackState};
use crate::error::AgentError;
use crate::strategy::{AgentContext, Strategy};
use protocol::{CallbackAddress, DEFAULT_HOST, DEFAULT_PORT, Entity, Point};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Where the agent finds the arena and what it brings into it.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub arena_host: String,
    pub arena_port: u16,
    /// The host the callback endpoint binds to and the arena dials.
    pub callback_host: String,
    pub entity: Entity,
    pub position: Point,
    /// Turns before the arena disconnects us, `None` for unlimited.
    pub turn_budget: Option<u32>,
}

impl AgentSettings {
    pub fn new(entity: Entity, position: Point) -> Self {
        AgentSettings {
            arena_host: DEFAULT_HOST.to_string(),
            arena_port: DEFAULT_PORT,
            callback_host: DEFAULT_HOST.to_string(),
            entity,
            position,
            turn_budget: None,
        }
    }
}

/// Runs the agent until the arena disconnects it. Returns the reason the arena gave.
pub async fn run_agent<S: Strategy>(settings: AgentSettings, strategy: S) -> Result<String, AgentError> {
    let link = ArenaLink::connect(&settings.arena_host, settings.arena_port).await?;
    let reference = link.allocate_reference().await?;
    let callback =
        CallbackAddress::derive(settings.callback_host.as_str(), settings.arena_port, reference)
            .ok_or(AgentError::PortOverflow(reference))?;

    let listener = TcpListener::bind((callback.host.as_str(), callback.port))
        .await
        .map_err(|source| AgentError::Bind {
            address: callback.to_string(),
            source,
        })?;
    tracing::info!(reference, %callback, "Callback endpoint open.");

    let (finished, mut outcome) = mpsc::channel(1);
    let context = AgentContext {
        reference,
        link: link.clone(),
    };
    let state = Arc::new(CallbackState::new(strategy, context, finished));
    let server = tokio::spawn(axum::serve(listener, callback_listener::router(state)).into_future());

    let result = match link
        .connect_character(
            reference,
            callback,
            settings.entity,
            settings.turn_budget,
            settings.position,
        )
        .await
    {
        Ok(true) => {
            tracing::info!(reference, "Registered, waiting for turns.");
            outcome
                .recv()
                .await
                .unwrap_or_else(|| Err(AgentError::Closed("Callback endpoint stopped.".to_string())))
        }
        Ok(false) => Err(AgentError::RegistrationRefused),
        Err(error) => Err(error),
    };

    server.abort();
    link.close().await;
    result
}
