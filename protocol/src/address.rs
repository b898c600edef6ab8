//! Derivation of the callback endpoint every agent has to open.
//!
//! Agents on the same host are told apart by their reference id: the callback port is the
//! arena's base port plus the reference. Reference ids start at 1 and are never reused, so no
//! two agents of one arena derive the same port and no agent derives the arena's own port.

use crate::CALLBACK_ROUTE;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the arena reaches an agent's turn callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallbackAddress {
    pub host: String,
    pub port: u16,
}

impl CallbackAddress {
    /// Derives the address for `reference`. `None` if the port would overflow.
    pub fn derive(host: impl Into<String>, base_port: u16, reference: u32) -> Option<Self> {
        Some(CallbackAddress {
            host: host.into(),
            port: callback_port(base_port, reference)?,
        })
    }

    /// The websocket url the arena dials.
    pub fn url(&self) -> String {
        format!("ws://{}:{}{}", self.host, self.port, CALLBACK_ROUTE)
    }
}

impl fmt::Display for CallbackAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// base_port + reference, `None` on overflow or for the never allocated reference 0.
pub fn callback_port(base_port: u16, reference: u32) -> Option<u16> {
    if reference == 0 {
        return None;
    }
    let offset = u16::try_from(reference).ok()?;
    base_port.checked_add(offset)
}
