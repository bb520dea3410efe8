use crate::{
    audio::{AudioBackend, AudioEffectPlayer, Overlay},
    authority::Authority,
    catalog::CatalogIndex,
    reveal::{RevealEngine, RevealOutcome},
    sync::{CampaignDisplay, CampaignSyncEngine, Contribution, Notification, POLL_INTERVAL},
    Error, Result,
};
use livedrop_types::api::{InventoryItem, SellResponse, User};
use std::sync::Arc;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{info, warn};

/// State loaded when a signed-in viewer starts.
#[derive(Clone, Debug)]
pub struct Bootstrap {
    pub user: User,
    pub joined: bool,
    pub items: Vec<InventoryItem>,
    pub campaign: Option<CampaignDisplay>,
}

#[derive(Clone, Debug)]
pub struct Sale {
    pub response: SellResponse,
    pub user: User,
    pub items: Vec<InventoryItem>,
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Owns every engine of one viewer session.
pub struct Viewer<A: Authority, B: AudioBackend, O: Overlay> {
    authority: A,
    catalog: Arc<CatalogIndex>,
    effects: AudioEffectPlayer<B, O>,
    reveal: RevealEngine<A, B, O>,
    sync: Arc<CampaignSyncEngine<A>>,
}

impl<A: Authority, B: AudioBackend, O: Overlay> Viewer<A, B, O> {
    pub fn new(
        authority: A,
        catalog: CatalogIndex,
        effects: AudioEffectPlayer<B, O>,
        invite: impl Into<String>,
        viewport_width: f64,
    ) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let catalog = Arc::new(catalog);
        let reveal = RevealEngine::new(
            authority.clone(),
            catalog.clone(),
            effects.clone(),
            viewport_width,
        );
        let (sync, notifications) =
            CampaignSyncEngine::new(authority.clone(), catalog.clone(), invite);
        (
            Self {
                authority,
                catalog,
                effects,
                reveal,
                sync: Arc::new(sync),
            },
            notifications,
        )
    }

    pub fn authority(&self) -> &A {
        &self.authority
    }

    pub fn catalog(&self) -> &CatalogIndex {
        &self.catalog
    }

    pub fn effects(&self) -> &AudioEffectPlayer<B, O> {
        &self.effects
    }

    pub fn reveal(&self) -> &RevealEngine<A, B, O> {
        &self.reveal
    }

    pub fn sync(&self) -> &CampaignSyncEngine<A> {
        &self.sync
    }

    fn ensure_authenticated(&self) -> Result<()> {
        if self.authority.is_authenticated() {
            Ok(())
        } else {
            Err(Error::NotAuthenticated)
        }
    }

    /// Load profile, join the invite, then read inventory and campaign.
    pub async fn bootstrap(&self) -> Result<Bootstrap> {
        self.ensure_authenticated()?;
        let user = self.authority.profile().await?;
        let joined = self.sync.rejoin().await;
        let (items, campaign) = tokio::join!(self.authority.inventory(), self.sync.tick());
        let items = items?;
        info!(user = %user.username, joined, items = items.len(), "session ready");
        Ok(Bootstrap {
            user,
            joined,
            items,
            campaign,
        })
    }

    pub async fn inventory(&self) -> Result<Vec<InventoryItem>> {
        self.ensure_authenticated()?;
        Ok(self.authority.inventory().await?)
    }

    /// Open the held case `item_id` and wait for its reveal.
    pub async fn open_case(&self, item_id: i64) -> Result<RevealOutcome> {
        let items = self.inventory().await?;
        let case_item = items
            .into_iter()
            .find(|item| item.id == item_id)
            .ok_or(Error::NotOpenable(item_id))?;
        self.reveal.open_case(&case_item).await
    }

    /// Sell an item, then refresh profile and inventory in that order.
    pub async fn sell(&self, item_id: i64) -> Result<Sale> {
        self.ensure_authenticated()?;
        let response = self.authority.sell_item(item_id).await?;
        info!(
            item_id,
            credited_cents = response.credited_cents,
            balance_cents = response.balance_cents,
            "item sold"
        );
        let user = self.authority.profile().await?;
        let items = self.authority.inventory().await?;
        Ok(Sale {
            response,
            user,
            items,
        })
    }

    pub async fn contribute(&self, amount_dollars: f64) -> Result<Contribution> {
        self.ensure_authenticated()?;
        self.sync.contribute(amount_dollars).await
    }

    /// Inventory for a periodic refresh, or `None` while a reveal is running
    /// or the read failed.
    pub async fn refresh_inventory(&self) -> Option<Vec<InventoryItem>> {
        if self.reveal.is_busy() {
            return None;
        }
        match self.authority.inventory().await {
            Ok(items) => Some(items),
            Err(err) => {
                warn!(?err, "inventory refresh failed");
                None
            }
        }
    }

    /// Poll the campaign and refresh the inventory every [POLL_INTERVAL]
    /// until the returned future is dropped.
    pub async fn watch<F: FnMut(Vec<InventoryItem>)>(&self, mut on_inventory: F) {
        let _polling = AbortOnDrop(self.sync.spawn_polling());
        let mut ticker = interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !self.authority.is_authenticated() {
                continue;
            }
            if let Some(items) = self.refresh_inventory().await {
                on_inventory(items);
            }
        }
    }
}
