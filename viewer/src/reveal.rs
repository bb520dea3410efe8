use crate::{
    audio::{AudioBackend, AudioEffectPlayer, Overlay},
    authority::Authority,
    catalog::CatalogIndex,
    Error, Result,
};
use livedrop_types::{api::InventoryItem, Item, RarityTier, CARD_WIDTH, TOTAL_CARDS, WINNER_INDEX};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};

/// Length of the reel animation.
pub const REVEAL_DURATION: Duration = Duration::from_millis(6_000);

/// Largest resting misalignment of the winning card, as a share of its width.
pub const JITTER_RATIO: f64 = 0.35;

/// The cards of one reveal, with the declared winner at [WINNER_INDEX].
#[derive(Clone, Debug, PartialEq)]
pub struct RevealSequence {
    cards: Vec<Item>,
}

impl RevealSequence {
    /// Place `winner` at [WINNER_INDEX] and fill every other slot with a
    /// decoy drawn uniformly, with replacement, from `pool`.
    pub fn build(winner: Item, pool: &[Item], rng: &mut impl Rng) -> Self {
        let mut cards = Vec::with_capacity(TOTAL_CARDS);
        cards.extend((0..WINNER_INDEX).map(|_| decoy(pool, rng)));
        cards.push(winner);
        cards.extend((WINNER_INDEX + 1..TOTAL_CARDS).map(|_| decoy(pool, rng)));
        Self { cards }
    }

    pub fn cards(&self) -> &[Item] {
        &self.cards
    }

    pub fn winner(&self) -> &Item {
        &self.cards[WINNER_INDEX]
    }
}

fn decoy(pool: &[Item], rng: &mut impl Rng) -> Item {
    if pool.is_empty() {
        return Item::new("Unknown", "", RarityTier::MilSpec);
    }
    pool[rng.gen_range(0..pool.len())].clone()
}

/// Random resting misalignment, uniform in `±JITTER_RATIO * CARD_WIDTH`.
pub fn sample_jitter(rng: &mut impl Rng) -> f64 {
    let bound = JITTER_RATIO * CARD_WIDTH;
    rng.gen_range(-bound..=bound)
}

/// Final reel translation that rests the winning card under the center of a
/// viewport `viewport_width` pixels wide, shifted by `jitter`.
pub fn target_offset(viewport_width: f64, jitter: f64) -> f64 {
    -(WINNER_INDEX as f64 * CARD_WIDTH) + viewport_width / 2.0 - CARD_WIDTH / 2.0 + jitter
}

/// State of one open, from the authority's answer until the reveal.
///
/// Consumed by [RevealEngine::finish], so each session reveals at most once.
#[derive(Debug)]
pub struct RevealSession {
    pub serial: u64,
    pub case_item: InventoryItem,
    pub drop: InventoryItem,
    pub sequence: RevealSequence,
    pub target_offset: f64,
    pub started_at: Instant,
    pub duration: Duration,
}

impl RevealSession {
    pub fn deadline(&self) -> Instant {
        self.started_at + self.duration
    }

    pub fn is_elapsed(&self) -> bool {
        Instant::now() >= self.deadline()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Requesting,
    Animating,
    Revealed,
}

/// What fired when the winner was revealed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    Jackpot,
    Tier(RarityTier),
}

impl Effect {
    pub fn for_tier(tier: RarityTier) -> Self {
        if tier.is_top_tier() {
            Effect::Jackpot
        } else {
            Effect::Tier(tier)
        }
    }
}

#[derive(Clone, Debug)]
pub struct RevealOutcome {
    pub drop: InventoryItem,
    pub winner: Item,
    pub effect: Effect,
    /// Inventory after the reveal, if it could be refreshed.
    pub inventory: Option<Vec<InventoryItem>>,
}

/// The session currently owning the reel.
struct Active {
    serial: u64,
    deadline: Instant,
}

impl Active {
    fn is_elapsed(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

struct State {
    phase: Phase,
    active: Option<Active>,
    next_serial: u64,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Returns the engine to [Phase::Idle] if a request is abandoned midway.
struct RequestGuard<'a> {
    state: &'a Mutex<State>,
    armed: bool,
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = lock(self.state);
            if state.phase == Phase::Requesting {
                state.phase = Phase::Idle;
            }
        }
    }
}

/// Drives case opens: `Idle -> Requesting -> Animating -> Revealed`.
///
/// The authority's drop is fixed before any card is sampled; the reel only
/// presents it.
pub struct RevealEngine<A: Authority, B: AudioBackend, O: Overlay> {
    authority: A,
    catalog: Arc<CatalogIndex>,
    effects: AudioEffectPlayer<B, O>,
    viewport_width: f64,
    state: Mutex<State>,
    rng: Mutex<StdRng>,
}

impl<A: Authority, B: AudioBackend, O: Overlay> RevealEngine<A, B, O> {
    pub fn new(
        authority: A,
        catalog: Arc<CatalogIndex>,
        effects: AudioEffectPlayer<B, O>,
        viewport_width: f64,
    ) -> Self {
        Self {
            authority,
            catalog,
            effects,
            viewport_width,
            state: Mutex::new(State {
                phase: Phase::Idle,
                active: None,
                next_serial: 0,
            }),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Use a fixed seed for decoys and jitter.
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    pub fn phase(&self) -> Phase {
        lock(&self.state).phase
    }

    /// Whether an open is waiting on the authority or still animating.
    pub fn is_busy(&self) -> bool {
        let state = lock(&self.state);
        match state.phase {
            Phase::Requesting => true,
            Phase::Animating => state.active.as_ref().is_some_and(|active| !active.is_elapsed()),
            Phase::Idle | Phase::Revealed => false,
        }
    }

    /// Open `case_item` and reveal the drop once the animation has run.
    pub async fn open_case(&self, case_item: &InventoryItem) -> Result<RevealOutcome> {
        let session = self.begin(case_item).await?;
        self.finish(session).await
    }

    /// Ask the authority for the drop and start the animation.
    ///
    /// On failure the engine returns to [Phase::Idle] and the authority's
    /// error is returned unchanged.
    pub async fn begin(&self, case_item: &InventoryItem) -> Result<RevealSession> {
        if !case_item.is_unopened_case() {
            return Err(Error::NotOpenable(case_item.id));
        }
        let mut guard = self.enter_requesting()?;

        info!(item_id = case_item.id, case = %case_item.name, "opening case");
        let response = match self.authority.open_case(case_item.id).await {
            Ok(response) => response,
            Err(err) => {
                warn!(item_id = case_item.id, ?err, "case open rejected");
                return Err(err.into());
            }
        };

        let winner = self.catalog.display_item(&response.drop);
        let pool = self.catalog.case_pool(&case_item.name);
        let (sequence, jitter) = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let sequence = RevealSequence::build(winner, &pool, &mut *rng);
            (sequence, sample_jitter(&mut *rng))
        };

        let session = {
            let mut state = lock(&self.state);
            let session = RevealSession {
                serial: state.next_serial,
                case_item: case_item.clone(),
                drop: response.drop,
                sequence,
                target_offset: target_offset(self.viewport_width, jitter),
                started_at: Instant::now(),
                duration: REVEAL_DURATION,
            };
            state.next_serial += 1;
            state.phase = Phase::Animating;
            state.active = Some(Active {
                serial: session.serial,
                deadline: session.deadline(),
            });
            session
        };
        guard.armed = false;

        self.effects.play_spin();
        info!(
            item_id = case_item.id,
            target_offset = session.target_offset,
            "reveal started"
        );
        Ok(session)
    }

    fn enter_requesting(&self) -> Result<RequestGuard<'_>> {
        let mut state = lock(&self.state);
        match state.phase {
            Phase::Requesting => return Err(Error::RevealInProgress),
            Phase::Animating => match &state.active {
                Some(active) if !active.is_elapsed() => return Err(Error::RevealInProgress),
                Some(active) => {
                    warn!(serial = active.serial, "abandoning unfinished reveal");
                }
                None => {}
            },
            Phase::Idle | Phase::Revealed => {}
        }
        state.phase = Phase::Requesting;
        state.active = None;
        Ok(RequestGuard {
            state: &self.state,
            armed: true,
        })
    }

    /// Wait out the animation, fire the effect for the winner, then refresh
    /// the inventory.
    ///
    /// A session that no longer owns the reel (abandoned for a newer open, or
    /// already revealed) fires nothing and returns [Error::RevealSuperseded].
    pub async fn finish(&self, session: RevealSession) -> Result<RevealOutcome> {
        sleep_until(session.deadline()).await;

        {
            let mut state = lock(&self.state);
            let current = state
                .active
                .as_ref()
                .is_some_and(|active| active.serial == session.serial);
            if state.phase != Phase::Animating || !current {
                warn!(serial = session.serial, "reveal superseded, skipping effect");
                return Err(Error::RevealSuperseded(session.serial));
            }
            state.phase = Phase::Revealed;
            state.active = None;
        }

        let winner = session.sequence.winner().clone();
        let effect = Effect::for_tier(winner.rarity);
        match effect {
            Effect::Jackpot => self.effects.play_jackpot(),
            Effect::Tier(tier) => self.effects.play(tier),
        }
        info!(drop = %winner.name, tier = %winner.rarity, "revealed");

        // The drop is already persisted by the authority
        let inventory = match self.authority.inventory().await {
            Ok(items) => Some(items),
            Err(err) => {
                warn!(?err, "inventory refresh after reveal failed");
                None
            }
        };

        Ok(RevealOutcome {
            drop: session.drop,
            winner,
            effect,
            inventory,
        })
    }
}
