use livedrop_client::{Client, Result};
use livedrop_types::{
    api::{ContributeResponse, InventoryItem, OpenCaseResponse, SellResponse, User},
    CampaignView,
};
use std::future::Future;
#[cfg(test)]
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

/// Largest inventory page requested when refreshing.
pub const INVENTORY_LIMIT: usize = 100;

/// The remote service that decides outcomes and owns persistent state.
pub trait Authority: Clone + Send + Sync + 'static {
    /// Whether a bearer credential is currently held.
    fn is_authenticated(&self) -> bool;

    /// Ask the authority to open a case and declare the drop.
    fn open_case(&self, item_id: i64) -> impl Future<Output = Result<OpenCaseResponse>> + Send;

    fn inventory(&self) -> impl Future<Output = Result<Vec<InventoryItem>>> + Send;

    fn profile(&self) -> impl Future<Output = Result<User>> + Send;

    fn sell_item(&self, item_id: i64) -> impl Future<Output = Result<SellResponse>> + Send;

    /// Current campaign bound to an invite code.
    fn campaign(&self, invite: &str) -> impl Future<Output = Result<Option<CampaignView>>> + Send;

    fn contribute(
        &self,
        case_id: i64,
        amount_cents: i64,
    ) -> impl Future<Output = Result<ContributeResponse>> + Send;

    /// Join the giveaway pool of the stream behind an invite code.
    fn join_invite(&self, invite: &str) -> impl Future<Output = Result<bool>> + Send;
}

impl Authority for Client {
    fn is_authenticated(&self) -> bool {
        Client::is_authenticated(self)
    }

    async fn open_case(&self, item_id: i64) -> Result<OpenCaseResponse> {
        Client::open_case(self, item_id).await
    }

    async fn inventory(&self) -> Result<Vec<InventoryItem>> {
        Client::inventory(self, INVENTORY_LIMIT).await
    }

    async fn profile(&self) -> Result<User> {
        Client::profile(self).await
    }

    async fn sell_item(&self, item_id: i64) -> Result<SellResponse> {
        Client::sell_item(self, item_id).await
    }

    async fn campaign(&self, invite: &str) -> Result<Option<CampaignView>> {
        Client::campaign(self, invite).await
    }

    async fn contribute(&self, case_id: i64, amount_cents: i64) -> Result<ContributeResponse> {
        Client::contribute(self, case_id, amount_cents).await
    }

    async fn join_invite(&self, invite: &str) -> Result<bool> {
        Client::join_invite(self, invite).await
    }
}

/// A request observed by the mock authority.
#[cfg(test)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    OpenCase(i64),
    Inventory,
    Profile,
    SellItem(i64),
    Campaign(String),
    Contribute { case_id: i64, amount_cents: i64 },
    JoinInvite(String),
}

/// A mock authority implementation for testing.
///
/// Responses are queued ahead of time; every request is recorded in `calls`.
#[cfg(test)]
#[derive(Clone)]
pub struct Mock {
    pub authenticated: Arc<AtomicBool>,
    pub calls: Arc<Mutex<Vec<Call>>>,
    pub drops: Arc<Mutex<VecDeque<Result<OpenCaseResponse>>>>,
    pub campaigns: Arc<Mutex<VecDeque<Result<Option<CampaignView>>>>>,
    pub contributions: Arc<Mutex<VecDeque<Result<ContributeResponse>>>>,
    pub sales: Arc<Mutex<VecDeque<Result<SellResponse>>>>,
    pub items: Arc<Mutex<Vec<InventoryItem>>>,
    pub user: Arc<Mutex<User>>,
}

#[cfg(test)]
impl Mock {
    pub fn new() -> Self {
        Self {
            authenticated: Arc::new(AtomicBool::new(true)),
            calls: Arc::new(Mutex::new(Vec::new())),
            drops: Arc::new(Mutex::new(VecDeque::new())),
            campaigns: Arc::new(Mutex::new(VecDeque::new())),
            contributions: Arc::new(Mutex::new(VecDeque::new())),
            sales: Arc::new(Mutex::new(VecDeque::new())),
            items: Arc::new(Mutex::new(Vec::new())),
            user: Arc::new(Mutex::new(User {
                id: 1,
                username: "viewer".to_string(),
                steam_id: None,
                role: "viewer".to_string(),
                balance_cents: 10_000,
            })),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.store(authenticated, Ordering::SeqCst);
    }

    pub fn push_drop(&self, drop: InventoryItem) {
        self.drops.lock().unwrap().push_back(Ok(OpenCaseResponse {
            opened_case: None,
            drop,
        }));
    }

    pub fn push_open_error(&self, err: livedrop_client::Error) {
        self.drops.lock().unwrap().push_back(Err(err));
    }

    pub fn push_campaign(&self, campaign: Option<CampaignView>) {
        self.campaigns.lock().unwrap().push_back(Ok(campaign));
    }

    pub fn push_campaign_error(&self, err: livedrop_client::Error) {
        self.campaigns.lock().unwrap().push_back(Err(err));
    }

    pub fn push_contribution(&self, response: Result<ContributeResponse>) {
        self.contributions.lock().unwrap().push_back(response);
    }

    pub fn push_sale(&self, response: Result<SellResponse>) {
        self.sales.lock().unwrap().push_back(response);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn exhausted(what: &str) -> livedrop_client::Error {
        livedrop_client::Error::Rejected {
            status: livedrop_client::StatusCode::NOT_FOUND,
            message: format!("no {what} queued"),
        }
    }
}

#[cfg(test)]
impl Authority for Mock {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn open_case(&self, item_id: i64) -> Result<OpenCaseResponse> {
        self.record(Call::OpenCase(item_id));
        self.drops
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted("drop")))
    }

    async fn inventory(&self) -> Result<Vec<InventoryItem>> {
        self.record(Call::Inventory);
        Ok(self.items.lock().unwrap().clone())
    }

    async fn profile(&self) -> Result<User> {
        self.record(Call::Profile);
        Ok(self.user.lock().unwrap().clone())
    }

    async fn sell_item(&self, item_id: i64) -> Result<SellResponse> {
        self.record(Call::SellItem(item_id));
        self.sales
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted("sale")))
    }

    async fn campaign(&self, invite: &str) -> Result<Option<CampaignView>> {
        self.record(Call::Campaign(invite.to_string()));
        self.campaigns.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    async fn contribute(&self, case_id: i64, amount_cents: i64) -> Result<ContributeResponse> {
        self.record(Call::Contribute {
            case_id,
            amount_cents,
        });
        self.contributions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted("contribution")))
    }

    async fn join_invite(&self, invite: &str) -> Result<bool> {
        self.record(Call::JoinInvite(invite.to_string()));
        Ok(true)
    }
}
