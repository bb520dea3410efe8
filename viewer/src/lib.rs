//! Viewer-side engines for live case openings and crowdfunding campaigns.
//!
//! The authority decides every outcome; this crate only reconciles those
//! decisions with local presentation: the reveal reel, rarity effects and
//! deduplicated campaign notifications.

pub mod audio;
pub mod authority;
pub mod catalog;
pub mod config;
pub mod reveal;
pub mod sync;
mod viewer;

pub use audio::{AudioBackend, AudioEffectPlayer, Clip, Overlay, PlaybackError};
pub use authority::Authority;
pub use catalog::CatalogIndex;
pub use config::Config;
pub use reveal::{Effect, Phase, RevealEngine, RevealOutcome, RevealSequence, RevealSession};
pub use sync::{CampaignDisplay, CampaignSyncEngine, Notification, SyncState};
pub use viewer::{Bootstrap, Sale, Viewer};
use thiserror::Error;

/// Error type for viewer operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Client(#[from] livedrop_client::Error),
    #[error("Donation amount must be positive")]
    InvalidAmount,
    #[error("No active campaign")]
    NoActiveCampaign,
    #[error("not logged in")]
    NotAuthenticated,
    #[error("a reveal is already in progress")]
    RevealInProgress,
    #[error("reveal {0} was superseded by a newer open")]
    RevealSuperseded(u64),
    #[error("item {0} is not an unopened case")]
    NotOpenable(i64),
}

impl Error {
    /// The single status line shown to the viewer.
    pub fn status_message(&self) -> String {
        match self {
            Error::Client(livedrop_client::Error::Forbidden { message }) => {
                format!("permission denied: {message}")
            }
            Error::Client(livedrop_client::Error::Rejected { message, .. }) => message.clone(),
            other => other.to_string(),
        }
    }

    /// Whether the authority refused the action because of the viewer's role.
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            Error::Client(livedrop_client::Error::Forbidden { .. })
        )
    }
}

/// Result type for viewer operations.
pub type Result<T> = std::result::Result<T, Error>;
