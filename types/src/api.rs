//! Request and response envelopes of the authority API.

use crate::{
    campaign::{CampaignCase, CampaignView},
    item::{RarityLabel, RarityTier},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Largest page the authority serves for inventory listings.
pub const MAX_INVENTORY_LIMIT: usize = 100;

/// Item kind of a case that can be opened.
pub const ITEM_TYPE_CASE: &str = "case";

/// Status of a case that has not been opened yet.
pub const STATUS_UNOPENED: &str = "unopened";

/// Status of a skin that can be sold.
pub const STATUS_AVAILABLE: &str = "available";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub steam_id: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub balance_cents: i64,
}

/// An item held by the viewer (or just granted to them).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub item_type: String,
    pub name: String,
    #[serde(default)]
    pub rarity: RarityLabel,
    #[serde(default)]
    pub price_cents: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl InventoryItem {
    pub fn is_unopened_case(&self) -> bool {
        self.item_type == ITEM_TYPE_CASE && self.status == STATUS_UNOPENED
    }

    pub fn is_sellable(&self) -> bool {
        self.status == STATUS_AVAILABLE || self.status == STATUS_UNOPENED
    }

    /// Tier carried by the item itself, if it has a label at all.
    pub fn own_tier(&self) -> Option<RarityTier> {
        (!self.rarity.is_empty()).then(|| self.rarity.tier())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user: User,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InventoryResponse {
    #[serde(default)]
    pub items: Vec<InventoryItem>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OpenCaseResponse {
    #[serde(default)]
    pub opened_case: Option<InventoryItem>,
    pub drop: InventoryItem,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SellResponse {
    pub item: InventoryItem,
    #[serde(default)]
    pub balance_cents: i64,
    #[serde(default)]
    pub credited_cents: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContributeRequest {
    pub amount_cents: i64,
    pub amount_dollars: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContributeResponse {
    #[serde(default)]
    pub case: Option<CampaignCase>,
    #[serde(default)]
    pub reward_item: Option<InventoryItem>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CampaignResponse {
    #[serde(default)]
    pub campaign: Option<CampaignView>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JoinResponse {
    #[serde(default)]
    pub joined: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthRequest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub identity: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Body of a non-success response.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// The most specific human-readable message in the body.
    pub fn text(&self) -> Option<&str> {
        self.error
            .as_deref()
            .filter(|text| !text.is_empty())
            .or_else(|| self.message.as_deref().filter(|text| !text.is_empty()))
    }
}
