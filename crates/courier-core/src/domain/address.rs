//! NetworkAddress - `user@server` 形式の宛先

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::AddressError;

pub const GROUP_SERVER: &str = "g.us";
pub const BROADCAST_SERVER: &str = "broadcast";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkAddress {
    user: String,
    server: String,
}

impl NetworkAddress {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            server: server.into(),
        }
    }

    /// Parse `user@server`. Both halves must be present and the server may
    /// not carry a second `@`.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AddressError::Empty);
        }
        let Some((user, server)) = s.split_once('@') else {
            return Err(AddressError::Malformed(s.to_string()));
        };
        if user.is_empty() || server.is_empty() || server.contains('@') {
            return Err(AddressError::Malformed(s.to_string()));
        }
        Ok(Self::new(user, server))
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn is_group_or_broadcast(&self) -> bool {
        self.server == GROUP_SERVER || self.server == BROADCAST_SERVER
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.server)
    }
}

/// Does the raw destination already name a group or broadcast list?
pub fn denotes_group_or_broadcast(raw: &str) -> bool {
    raw.contains(&format!("@{GROUP_SERVER}")) || raw.contains(&format!("@{BROADCAST_SERVER}"))
}
