//! Chat-platform identifiers
//!
//! Guilds and voice channels are addressed by 64-bit snowflakes. They travel
//! as decimal strings in URLs and JSON, so both newtypes parse from and
//! serialize to their plain numeric form.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of an independent group (one queue, one player per guild)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuildId(pub u64);

/// Identifier of a voice channel within a guild
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GuildId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(GuildId)
            .map_err(|e| Error::InvalidInput(format!("invalid guild id '{}': {}", s, e)))
    }
}

impl FromStr for ChannelId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(ChannelId)
            .map_err(|e| Error::InvalidInput(format!("invalid channel id '{}': {}", s, e)))
    }
}

impl From<u64> for GuildId {
    fn from(value: u64) -> Self {
        GuildId(value)
    }
}

impl From<u64> for ChannelId {
    fn from(value: u64) -> Self {
        ChannelId(value)
    }
}
