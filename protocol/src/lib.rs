//! The ids for frames that we use. They will be used consistent across the arena and the agents.
//! Also contains the shared entity model, the request and reply structures and the error taxonomy.

pub mod address;
pub mod codec;
pub mod entity;
pub mod error;
pub mod geometry;
pub mod messages;

pub use address::{CallbackAddress, callback_port};
pub use codec::{FrameError, decode_frame, encode_frame, encode_text_frame};
pub use entity::{CharacterKind, Characteristic, Characteristics, Entity, EntityKind};
pub use error::{ArenaError, Violation};
pub use geometry::{Direction, Point};
pub use messages::{AgentRequest, ArenaRequest, ArenaResponse, Neighbors, PendingPotion};

/// The buffer sizes for the channels between the arena tasks.
pub const CHANNEL_BUFFER_SIZE: usize = 32;

/// The port the arena listens on if nothing else is configured.
pub const DEFAULT_PORT: u16 = 5099;

/// The default host of the arena.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// The route the arena serves agent sessions on.
pub const ARENA_ROUTE: &str = "/ws";

/// The route every agent serves its turn callbacks on.
pub const CALLBACK_ROUTE: &str = "/turn";

/// Width and height of the arena, unless configured otherwise.
pub const DEFAULT_WORLD_SIZE: i32 = 100;

/// Chebyshev distance up to which two entities may interact, unless configured otherwise.
pub const DEFAULT_INTERACTION_DISTANCE: i32 = 2;

/// Chebyshev radius an agent can see, unless configured otherwise.
pub const DEFAULT_VISION_RADIUS: i32 = 10;

/// Maximum length of a transient status text.
pub const MAX_STATUS_LENGTH: usize = 128;

// Agent -> Arena.

/// A remote call on the arena, followed by a postcard encoded [`ArenaRequest`].
pub const ARENA_CALL: u8 = 0;

/// The answer to the remote call that just came in, followed by a postcard encoded [`ArenaResponse`].
pub const ARENA_REPLY: u8 = 1;

// Arena -> Agent callback endpoint.

/// The arena hands the turn to an agent, followed by postcard encoded [`Neighbors`].
pub const EXECUTE_TURN: u8 = 2;

/// The agent reports its turn as finished. No payload.
pub const TURN_DONE: u8 = 3;

/// The arena disconnects the agent, followed by a postcard encoded reason string.
pub const SHUTDOWN: u8 = 4;

/// The closing message we send before closing a socket. Followed by raw utf8 text.
pub const SERVER_ERROR: u8 = 5;
