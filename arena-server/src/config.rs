//! The arena configuration. It is read once at start up from `ArenaConfig.json`; every field has a
//! default, so a missing file simply means a default arena.

use protocol::{
    DEFAULT_HOST, DEFAULT_INTERACTION_DISTANCE, DEFAULT_PORT, DEFAULT_VISION_RADIUS,
    DEFAULT_WORLD_SIZE,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

/// The environment variable that overrides the administrative secret.
pub const SECRET_ENV: &str = "ARENA_ADMIN_SECRET";

/// The game rules the resolver and registry enforce.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    pub world_width: i32,
    pub world_height: i32,
    /// Chebyshev radius of the neighbour snapshot.
    pub vision_radius: i32,
    /// Chebyshev distance up to which attack, slow and pickup work.
    pub interaction_distance: i32,
    /// Initiative lost per slow.
    pub slow_amount: i32,
    /// Maximum number of live characters.
    pub max_characters: usize,
}

impl Default for Rules {
    fn default() -> Self {
        Rules {
            world_width: DEFAULT_WORLD_SIZE,
            world_height: DEFAULT_WORLD_SIZE,
            vision_radius: DEFAULT_VISION_RADIUS,
            interaction_distance: DEFAULT_INTERACTION_DISTANCE,
            slow_amount: 10,
            max_characters: 64,
        }
    }
}

/// Settings of the turn loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// How long one turn callback may take before the agent counts as disconnected.
    pub turn_timeout_ms: u64,
    /// Pause between two rounds.
    pub round_pause_ms: u64,
    /// Optional limit on the number of rounds.
    pub max_rounds: Option<u64>,
    /// Without a tournament secret the game starts once this many characters are live.
    pub min_characters: usize,
}

impl CoordinatorConfig {
    pub fn turn_timeout(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_ms)
    }

    pub fn round_pause(&self) -> Duration {
        Duration::from_millis(self.round_pause_ms)
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            turn_timeout_ms: 2_000,
            round_pause_ms: 500,
            max_rounds: None,
            min_characters: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub host: String,
    pub port: u16,
    /// Shared secret of the tournament variant. `None` runs the plain arena.
    pub admin_secret: Option<String>,
    pub rules: Rules,
    pub coordinator: CoordinatorConfig,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        ArenaConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            admin_secret: None,
            rules: Rules::default(),
            coordinator: CoordinatorConfig::default(),
        }
    }
}

impl ArenaConfig {
    /// Parses a configuration from its json text.
    pub fn from_json(json_content: &str) -> Result<Self, String> {
        serde_json::from_str(json_content).map_err(|e| format!("Failed to parse JSON: {}", e))
    }

    /// Replaces the secret with the one from the environment, if set. Empty secrets are dropped.
    pub fn with_secret_override(mut self, secret: Option<String>) -> Self {
        if let Some(secret) = secret {
            self.admin_secret = Some(secret);
        }
        if self.admin_secret.as_deref().is_some_and(str::is_empty) {
            tracing::warn!("Ignoring empty administrative secret.");
            self.admin_secret = None;
        }
        self
    }
}

/// Loads the configuration file. A missing file yields the defaults, a broken one is an error.
pub async fn load_config(path: &Path) -> Result<ArenaConfig, String> {
    let json_content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "No config file, using defaults.");
            return Ok(ArenaConfig::default());
        }
        Err(e) => return Err(format!("Failed to read file: {}", e)),
    };
    ArenaConfig::from_json(&json_content)
}
