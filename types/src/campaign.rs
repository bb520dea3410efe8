use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a crowdfunding campaign.
///
/// Closed-state labels are chosen by the authority, so anything that is not
/// `open` is kept verbatim and treated as terminal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CampaignStatus {
    Open,
    Closed,
    Fulfilled,
    Other(String),
}

impl CampaignStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, CampaignStatus::Open)
    }

    pub fn as_str(&self) -> &str {
        match self {
            CampaignStatus::Open => "open",
            CampaignStatus::Closed => "closed",
            CampaignStatus::Fulfilled => "fulfilled",
            CampaignStatus::Other(label) => label,
        }
    }
}

impl From<String> for CampaignStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "open" => CampaignStatus::Open,
            "closed" => CampaignStatus::Closed,
            "fulfilled" => CampaignStatus::Fulfilled,
            _ => CampaignStatus::Other(value),
        }
    }
}

impl From<CampaignStatus> for String {
    fn from(value: CampaignStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The campaign record itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignCase {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    pub status: CampaignStatus,
    #[serde(default)]
    pub reward_item_name: String,
    #[serde(default)]
    pub reward_item_type: String,
    #[serde(default)]
    pub target_amount_cents: i64,
}

/// Snapshot of a campaign as seen by the requesting viewer.
///
/// The derived fields (`progress_percent`, `left_cents`, `my_chance_percent`)
/// are carried for completeness but display code should use
/// [CampaignView::figures], which recomputes them from the raw totals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CampaignView {
    pub case: CampaignCase,
    #[serde(default)]
    pub total_raised_cents: i64,
    #[serde(default)]
    pub total_contributors: i64,
    #[serde(default)]
    pub my_contribution_cents: i64,
    #[serde(default)]
    pub my_chance_percent: f64,
    #[serde(default)]
    pub progress_percent: f64,
    #[serde(default)]
    pub left_cents: i64,
}

/// Derived display figures of a campaign.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CampaignFigures {
    /// Share of the target raised, clamped to `[0, 100]`.
    pub progress_percent: f64,
    /// Amount still missing, never negative.
    pub left_cents: i64,
    /// The viewer's share of all contributions.
    pub my_chance_percent: f64,
}

impl CampaignView {
    pub fn is_open(&self) -> bool {
        self.case.status.is_open()
    }

    /// Recompute the derived figures from the raw totals.
    pub fn figures(&self) -> CampaignFigures {
        let target = self.case.target_amount_cents;
        let raised = self.total_raised_cents;
        let mine = self.my_contribution_cents;

        let progress_percent = if target > 0 {
            (raised as f64 * 100.0 / target as f64).clamp(0.0, 100.0)
        } else {
            0.0
        };
        let my_chance_percent = if raised > 0 && mine > 0 {
            mine as f64 * 100.0 / raised as f64
        } else {
            0.0
        };

        CampaignFigures {
            progress_percent,
            left_cents: target.saturating_sub(raised).max(0),
            my_chance_percent,
        }
    }
}
