use crate::{authority::Authority, catalog::CatalogIndex, Error, Result};
use livedrop_types::{
    api::{ContributeResponse, InventoryItem, User},
    money::{dollars_to_cents, format_usd},
    CampaignStatus, CampaignView,
};
use std::{
    collections::HashSet,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info, trace, warn};

/// Interval between campaign polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// What has already been announced to the viewer.
///
/// Only suppresses duplicate notifications; the displayed figures always
/// come from the latest view.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncState {
    pub last_campaign_id: Option<i64>,
    pub last_campaign_status: String,
    /// Every closed `(id, status)` pair already announced.
    pub announced_closed: HashSet<(i64, CampaignStatus)>,
}

/// A toast shown to the viewer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    CampaignStarted {
        case_id: i64,
        title: String,
        reward_type: String,
    },
    CampaignClosed {
        case_id: i64,
        status: CampaignStatus,
    },
    DonationAccepted {
        amount_cents: i64,
    },
    GoalReached {
        reward: String,
    },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::CampaignStarted {
                title, reward_type, ..
            } => write!(f, "New crowdfunding event: {title} ({reward_type} reward)."),
            Notification::CampaignClosed { .. } => {
                f.write_str("Crowdfunding goal met. Reward distributed and campaign closed.")
            }
            Notification::DonationAccepted { amount_cents } => {
                write!(f, "Donation accepted: {}.", format_usd(*amount_cents))
            }
            Notification::GoalReached { reward } => {
                write!(f, "Goal reached. Winner reward: {reward}.")
            }
        }
    }
}

/// Display fields of an open campaign, derived fresh from one view.
#[derive(Clone, Debug, PartialEq)]
pub struct CampaignDisplay {
    pub case_id: i64,
    pub title: String,
    pub reward_name: String,
    pub reward_label: String,
    pub reward_icon: Option<String>,
    pub status_hint: String,
    pub progress_percent: f64,
    pub progress_text: String,
    pub chance_text: String,
    pub can_donate: bool,
}

impl CampaignDisplay {
    pub fn from_view(view: &CampaignView, catalog: &CatalogIndex) -> Self {
        let case = &view.case;
        let figures = view.figures();
        let reward_name = if case.reward_item_name.is_empty() {
            "Crowdfunding Reward".to_string()
        } else {
            case.reward_item_name.clone()
        };
        Self {
            case_id: case.id,
            title: case.title.clone(),
            reward_icon: catalog.resolve_icon(&case.reward_item_name),
            reward_name,
            reward_label: format!("{} reward", case.reward_item_type),
            status_hint: format!(
                "Status: {} | Contributors: {}",
                case.status, view.total_contributors
            ),
            progress_percent: figures.progress_percent,
            progress_text: format!(
                "{} raised / {} target | {} left",
                format_usd(view.total_raised_cents),
                format_usd(case.target_amount_cents),
                format_usd(figures.left_cents)
            ),
            chance_text: format!(
                "Your chance: {:.2}% ({} donated)",
                figures.my_chance_percent,
                format_usd(view.my_contribution_cents)
            ),
            can_donate: view.is_open(),
        }
    }
}

/// Result of rendering one poll.
#[derive(Clone, Debug, PartialEq)]
pub struct Render {
    /// `None` while no campaign is open.
    pub display: Option<CampaignDisplay>,
    pub notifications: Vec<Notification>,
    pub state: SyncState,
}

/// Render a poll result against what has been announced so far.
///
/// A closed campaign is announced once per `(id, status)` pair; an open one
/// once per id.
pub fn render(view: Option<&CampaignView>, state: &SyncState, catalog: &CatalogIndex) -> Render {
    let mut next = state.clone();
    let mut notifications = Vec::new();

    let Some(view) = view.filter(|view| view.is_open()) else {
        if let Some(view) = view {
            let key = (view.case.id, view.case.status.clone());
            if next.announced_closed.insert(key) {
                notifications.push(Notification::CampaignClosed {
                    case_id: view.case.id,
                    status: view.case.status.clone(),
                });
            }
        }
        next.last_campaign_status = view
            .map(|view| view.case.status.to_string())
            .unwrap_or_default();
        return Render {
            display: None,
            notifications,
            state: next,
        };
    };

    let case = &view.case;
    if next.last_campaign_id != Some(case.id) {
        notifications.push(Notification::CampaignStarted {
            case_id: case.id,
            title: case.title.clone(),
            reward_type: case.reward_item_type.clone(),
        });
    }
    next.last_campaign_id = Some(case.id);
    next.last_campaign_status = case.status.to_string();

    Render {
        display: Some(CampaignDisplay::from_view(view, catalog)),
        notifications,
        state: next,
    }
}

/// State refreshed after a contribution.
#[derive(Clone, Debug)]
pub struct Refresh {
    pub user: User,
    pub items: Vec<InventoryItem>,
}

#[derive(Clone, Debug)]
pub struct Contribution {
    pub amount_cents: i64,
    pub response: ContributeResponse,
    /// Profile and inventory after the contribution, if both could be read.
    pub refresh: Option<Refresh>,
    pub display: Option<CampaignDisplay>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Keeps the campaign of one invite in view and announces transitions.
pub struct CampaignSyncEngine<A: Authority> {
    authority: A,
    catalog: Arc<CatalogIndex>,
    invite: String,
    state: Mutex<SyncState>,
    current: Mutex<Option<CampaignView>>,
    notifications: mpsc::UnboundedSender<Notification>,
}

impl<A: Authority> CampaignSyncEngine<A> {
    /// Create an engine and the receiving end of its notifications.
    pub fn new(
        authority: A,
        catalog: Arc<CatalogIndex>,
        invite: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                authority,
                catalog,
                invite: invite.into(),
                state: Mutex::new(SyncState::default()),
                current: Mutex::new(None),
                notifications: sender,
            },
            receiver,
        )
    }

    pub fn invite(&self) -> &str {
        &self.invite
    }

    pub fn state(&self) -> SyncState {
        lock(&self.state).clone()
    }

    /// The open campaign from the latest poll.
    pub fn current(&self) -> Option<CampaignView> {
        lock(&self.current).clone()
    }

    /// Fetch the campaign. Any failure reads as "no campaign".
    pub async fn poll(&self) -> Option<CampaignView> {
        if self.invite.is_empty() {
            return None;
        }
        match self.authority.campaign(&self.invite).await {
            Ok(view) => view,
            Err(err) => {
                debug!(invite = %self.invite, ?err, "campaign poll failed");
                None
            }
        }
    }

    /// Render `view` and publish its notifications. The last call wins.
    pub fn apply(&self, view: Option<CampaignView>) -> Option<CampaignDisplay> {
        let rendered = {
            let mut state = lock(&self.state);
            let rendered = render(view.as_ref(), &state, &self.catalog);
            *state = rendered.state.clone();
            rendered
        };
        *lock(&self.current) = view.filter(|view| view.is_open());

        for notification in rendered.notifications {
            info!(%notification, "campaign update");
            // A closed receiver only means nobody is listening
            let _ = self.notifications.send(notification);
        }
        rendered.display
    }

    /// One poll cycle. Skipped while signed out or without an invite.
    pub async fn tick(&self) -> Option<CampaignDisplay> {
        if !self.authority.is_authenticated() || self.invite.is_empty() {
            trace!("skipping campaign poll");
            return None;
        }
        let view = self.poll().await;
        self.apply(view)
    }

    /// Poll every [POLL_INTERVAL] until the task is aborted.
    ///
    /// Each poll runs as its own task so a slow response never delays the
    /// next one.
    pub fn spawn_polling(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(POLL_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !engine.authority.is_authenticated() {
                    trace!("signed out, campaign polling suspended");
                    continue;
                }
                let engine = engine.clone();
                tokio::spawn(async move {
                    engine.tick().await;
                });
            }
        })
    }

    /// Contribute `amount_dollars` to the open campaign.
    ///
    /// The amount is validated before anything is sent. Afterwards profile,
    /// campaign and inventory are refreshed together and the invite's
    /// giveaway pool is re-joined.
    pub async fn contribute(&self, amount_dollars: f64) -> Result<Contribution> {
        let amount_cents = dollars_to_cents(amount_dollars)
            .filter(|cents| *cents > 0)
            .ok_or(Error::InvalidAmount)?;
        let campaign = self.current().ok_or(Error::NoActiveCampaign)?;

        let response = self
            .authority
            .contribute(campaign.case.id, amount_cents)
            .await?;
        info!(case_id = campaign.case.id, amount_cents, "contribution accepted");

        let _ = self
            .notifications
            .send(Notification::DonationAccepted { amount_cents });
        if let Some(reward) = &response.reward_item {
            let _ = self.notifications.send(Notification::GoalReached {
                reward: reward.name.clone(),
            });
        }

        let (user, items, display, joined) = tokio::join!(
            self.authority.profile(),
            self.authority.inventory(),
            self.tick(),
            self.rejoin(),
        );
        trace!(joined, "re-joined giveaway pool");
        let refresh = match (user, items) {
            (Ok(user), Ok(items)) => Some(Refresh { user, items }),
            (Err(err), _) | (_, Err(err)) => {
                warn!(?err, "refresh after contribution failed");
                None
            }
        };

        Ok(Contribution {
            amount_cents,
            response,
            refresh,
            display,
        })
    }

    /// Join the invite's giveaway pool. Failures are expected when already
    /// joined or when no stream is live.
    pub async fn rejoin(&self) -> bool {
        if self.invite.is_empty() {
            return false;
        }
        match self.authority.join_invite(&self.invite).await {
            Ok(joined) => joined,
            Err(err) => {
                debug!(invite = %self.invite, ?err, "join failed");
                false
            }
        }
    }
}
