//! Interactive search selection
//!
//! A search returns ranked results as an offer. The requesting user may pick
//! one result by index until the offer's window closes; after that nothing is
//! added. Expired offers are purged lazily whenever a new offer is made.

use encore_common::{GuildId, Track};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

/// Why a pick was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Selection window has closed")]
    Expired,

    #[error("No such selection")]
    Unknown,

    #[error("Only the user who searched may pick a result")]
    NotRequester,

    #[error("Choice {index} is out of range (offer has {available} results)")]
    OutOfRange { index: usize, available: usize },
}

struct Offer {
    guild_id: GuildId,
    requester: Option<String>,
    tracks: Vec<Track>,
    expires_at: Instant,
}

/// Pending search offers across all guilds
pub struct SelectionOffers {
    window: Duration,
    offers: Mutex<HashMap<Uuid, Offer>>,
}

impl SelectionOffers {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            offers: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Offer>> {
        self.offers.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Register ranked results, returning the offer id
    pub fn offer(&self, guild_id: GuildId, requester: Option<String>, tracks: Vec<Track>) -> Uuid {
        let now = Instant::now();
        let mut offers = self.lock();
        offers.retain(|_, offer| offer.expires_at > now);

        let id = Uuid::new_v4();
        offers.insert(
            id,
            Offer {
                guild_id,
                requester,
                tracks,
                expires_at: now + self.window,
            },
        );
        tracing::debug!(guild_id = %guild_id, offer_id = %id, "Search offer registered");
        id
    }

    /// Pick result `index` (0-based), consuming the offer on success
    pub fn take(
        &self,
        guild_id: GuildId,
        offer_id: Uuid,
        requester: Option<&str>,
        index: usize,
    ) -> Result<Track, SelectionError> {
        let mut offers = self.lock();

        let offer = match offers.get(&offer_id) {
            Some(offer) if offer.guild_id == guild_id => offer,
            _ => return Err(SelectionError::Unknown),
        };

        if Instant::now() >= offer.expires_at {
            offers.remove(&offer_id);
            return Err(SelectionError::Expired);
        }

        if let Some(expected) = offer.requester.as_deref() {
            if requester != Some(expected) {
                return Err(SelectionError::NotRequester);
            }
        }

        if index >= offer.tracks.len() {
            return Err(SelectionError::OutOfRange {
                index,
                available: offer.tracks.len(),
            });
        }

        let mut offer = offers
            .remove(&offer_id)
            .ok_or(SelectionError::Unknown)?;
        Ok(offer.tracks.swap_remove(index))
    }

    /// Offers not yet taken or purged
    pub fn pending(&self) -> usize {
        self.lock().len()
    }
}
