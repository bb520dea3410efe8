pub mod api;
pub mod campaign;
pub mod catalog;
pub mod item;
pub mod money;

pub use campaign::{CampaignCase, CampaignFigures, CampaignStatus, CampaignView};
pub use catalog::CatalogEntry;
pub use item::{Item, RarityLabel, RarityTier};

/// Number of cards on the reveal reel.
pub const TOTAL_CARDS: usize = 50;

/// Reel slot holding the authority's winning item.
pub const WINNER_INDEX: usize = 40;

/// Width of one reel card in pixels.
pub const CARD_WIDTH: f64 = 192.0;
