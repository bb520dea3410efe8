use livedrop_client::{CatalogFeeds, Client};
use livedrop_types::{api::InventoryItem, catalog::CatalogEntry, Item, RarityTier};
use std::collections::HashMap;
use tracing::{info, warn};

/// Theme hints tried, in order, when picking artwork for a knife case.
const KNIFE_CASE_HINTS: [&str; 6] = ["gamma", "chroma", "spectrum", "danger", "fracture", "shadow"];

/// Names the authority uses for its synthetic knife cases.
const KNIFE_CASE_MARKERS: [&str; 2] = ["knife fever case", "knife case"];

/// Number of skins used as decoys when a case's contents are unknown.
const DEFAULT_POOL_SIZE: usize = 120;

/// Artwork shown for a knife case when no catalog is available at all.
pub const KNIFE_CASE_ICON: &str =
    "data:image/svg+xml;utf8,%3Csvg%20xmlns%3D'http%3A%2F%2Fwww.w3.org%2F2000%2Fsvg'%20viewBox%3D'0%200%20256%20256'%3E%3Crect%20width%3D'256'%20height%3D'256'%20rx%3D'22'%20fill%3D'%23161d26'%2F%3E%3Crect%20x%3D'14'%20y%3D'14'%20width%3D'228'%20height%3D'228'%20rx%3D'16'%20fill%3D'%231d2733'%20stroke%3D'%233e5670'%20stroke-width%3D'4'%2F%3E%3Ctext%20x%3D'128'%20y%3D'108'%20text-anchor%3D'middle'%20font-size%3D'72'%3E%F0%9F%94%AA%3C%2Ftext%3E%3Ctext%20x%3D'128'%20y%3D'164'%20text-anchor%3D'middle'%20font-size%3D'18'%20fill%3D'%23f3c56b'%20font-family%3D'Arial'%3EKNIFE%20CASE%3C%2Ftext%3E%3C%2Fsvg%3E";

/// Drop table the authority falls back to for cases it has no pool for.
const DEFAULT_DROP_TABLE: [(&str, RarityTier); 6] = [
    ("P250 | Sand Dune", RarityTier::Consumer),
    ("MP9 | Storm", RarityTier::Industrial),
    ("UMP-45 | Briefing", RarityTier::MilSpec),
    ("AK-47 | Slate", RarityTier::Restricted),
    ("M4A1-S | Cyrex", RarityTier::Classified),
    ("AWP | Wildfire", RarityTier::Covert),
];

/// Name-indexed view over the case and skin feeds.
///
/// Read-only once loaded. Lookups never fail: misses resolve through a fixed
/// fallback chain instead.
#[derive(Clone, Debug, Default)]
pub struct CatalogIndex {
    cases: Vec<CatalogEntry>,
    skins: Vec<CatalogEntry>,
    case_by_name: HashMap<String, usize>,
    skin_by_name: HashMap<String, usize>,
}

impl CatalogIndex {
    /// Build the index from already-fetched feeds.
    pub fn new(feeds: CatalogFeeds) -> Self {
        let CatalogFeeds { cases, skins } = feeds;
        let case_by_name = index_by_name(&cases);
        let skin_by_name = index_by_name(&skins);
        Self {
            cases,
            skins,
            case_by_name,
            skin_by_name,
        }
    }

    /// Fetch both feeds and index them. Any failure yields an empty index.
    pub async fn load(client: &Client, cases_url: &str, skins_url: &str) -> Self {
        match client.fetch_catalog(cases_url, skins_url).await {
            Ok(feeds) => {
                let index = Self::new(feeds);
                info!(
                    cases = index.cases.len(),
                    skins = index.skins.len(),
                    "loaded catalog"
                );
                index
            }
            Err(err) => {
                warn!(?err, "catalog unavailable, continuing without icons");
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty() && self.skins.is_empty()
    }

    pub fn cases(&self) -> &[CatalogEntry] {
        &self.cases
    }

    pub fn skins(&self) -> &[CatalogEntry] {
        &self.skins
    }

    pub fn case(&self, name: &str) -> Option<&CatalogEntry> {
        self.case_by_name
            .get(&name.to_lowercase())
            .map(|&index| &self.cases[index])
    }

    pub fn skin(&self, name: &str) -> Option<&CatalogEntry> {
        self.skin_by_name
            .get(&name.to_lowercase())
            .map(|&index| &self.skins[index])
    }

    /// Icon for an item name, or `None` when nothing matches.
    pub fn resolve_icon(&self, name: &str) -> Option<String> {
        let key = name.to_lowercase();
        if key.is_empty() {
            return None;
        }
        if KNIFE_CASE_MARKERS.iter().any(|marker| key.contains(marker)) {
            return self.resolve_knife_icon();
        }
        self.skin(&key)
            .and_then(CatalogEntry::image)
            .or_else(|| self.case(&key).and_then(CatalogEntry::image))
            .map(str::to_string)
    }

    /// Artwork for the authority's synthetic knife case.
    ///
    /// Prefers cases themed by [KNIFE_CASE_HINTS] in order, then the first
    /// case with any image. An empty catalog yields [KNIFE_CASE_ICON].
    pub fn resolve_knife_icon(&self) -> Option<String> {
        if self.cases.is_empty() {
            return Some(KNIFE_CASE_ICON.to_string());
        }
        KNIFE_CASE_HINTS
            .iter()
            .find_map(|hint| {
                self.cases
                    .iter()
                    .filter(|case| case.name.to_lowercase().contains(hint))
                    .find_map(CatalogEntry::image)
            })
            .or_else(|| self.cases.iter().find_map(CatalogEntry::image))
            .map(str::to_string)
    }

    /// Tier of an inventory item: its own label, else the skin feed's label
    /// for that name, else mil-spec.
    pub fn resolve_rarity(&self, item: &InventoryItem) -> RarityTier {
        if let Some(tier) = item.own_tier() {
            return tier;
        }
        self.skin(&item.name)
            .filter(|skin| !skin.rarity.is_empty())
            .map(|skin| skin.rarity.tier())
            .unwrap_or(RarityTier::MilSpec)
    }

    /// Displayable form of an authority-declared item.
    pub fn display_item(&self, item: &InventoryItem) -> Item {
        Item::new(
            item.name.clone(),
            self.resolve_icon(&item.name).unwrap_or_default(),
            self.resolve_rarity(item),
        )
    }

    /// Decoy pool for a case: its listed contents, else the head of the skin
    /// feed, else the authority's default drop table.
    pub fn case_pool(&self, case_name: &str) -> Vec<Item> {
        if let Some(case) = self.case(case_name).filter(|case| !case.contains.is_empty()) {
            return case.contains.iter().map(CatalogEntry::to_item).collect();
        }
        if !self.skins.is_empty() {
            return self
                .skins
                .iter()
                .take(DEFAULT_POOL_SIZE)
                .map(CatalogEntry::to_item)
                .collect();
        }
        DEFAULT_DROP_TABLE
            .iter()
            .map(|&(name, tier)| {
                Item::new(name, self.resolve_icon(name).unwrap_or_default(), tier)
            })
            .collect()
    }
}

fn index_by_name(entries: &[CatalogEntry]) -> HashMap<String, usize> {
    let mut index = HashMap::with_capacity(entries.len());
    for (position, entry) in entries.iter().enumerate() {
        // Later duplicates replace earlier ones
        index.insert(entry.name.to_lowercase(), position);
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn catalog() -> CatalogIndex {
        CatalogIndex::new(CatalogFeeds {
            cases: vec![
                CatalogEntry::new("Operation Breakout Weapon Case", "https://img/breakout.png"),
                CatalogEntry::new("Shadow Case", "https://img/shadow.png"),
                CatalogEntry::new("Chroma 2 Case", ""),
                CatalogEntry::new("Chroma 3 Case", "https://img/chroma3.png"),
                CatalogEntry::new("Gamma Case", "https://img/gamma.png").with_contains(vec![
                    CatalogEntry::new("Glock-18 | Wasteland Rebel", "https://img/glock.png")
                        .with_rarity("Covert"),
                    CatalogEntry::new("P2000 | Imperial Dragon", "https://img/p2000.png")
                        .with_rarity("Restricted"),
                ]),
            ],
            skins: vec![
                CatalogEntry::new("AK-47 | Slate", "https://img/ak.png").with_rarity("Restricted"),
                CatalogEntry::new("AWP | Wildfire", "https://img/awp.png").with_rarity("Covert"),
                CatalogEntry::new("Gamma Case", "https://img/gamma-skin.png"),
            ],
        })
    }

    fn inventory_item(name: &str, rarity: &str) -> InventoryItem {
        InventoryItem {
            id: 1,
            item_type: "skin".to_string(),
            name: name.to_string(),
            rarity: rarity.into(),
            price_cents: 0,
            status: "available".to_string(),
            source: String::new(),
            created_at: None,
        }
    }

    #[test]
    fn test_resolve_icon_prefers_skins_then_cases() {
        let catalog = catalog();
        assert_eq!(
            catalog.resolve_icon("ak-47 | SLATE").as_deref(),
            Some("https://img/ak.png")
        );
        assert_eq!(
            catalog.resolve_icon("Gamma Case").as_deref(),
            Some("https://img/gamma-skin.png")
        );
        assert_eq!(
            catalog.resolve_icon("Shadow Case").as_deref(),
            Some("https://img/shadow.png")
        );
        assert_eq!(catalog.resolve_icon("Nonexistent | Item"), None);
        assert_eq!(catalog.resolve_icon(""), None);
    }

    #[test]
    fn test_knife_case_follows_hint_order() {
        let catalog = catalog();
        assert_eq!(
            catalog.resolve_icon("Knife Case").as_deref(),
            Some("https://img/gamma.png")
        );
        assert_eq!(
            catalog.resolve_icon("Premium Knife Fever Case").as_deref(),
            Some("https://img/gamma.png")
        );

        // Without gamma, chroma wins, skipping the imageless entry
        let catalog = CatalogIndex::new(CatalogFeeds {
            cases: vec![
                CatalogEntry::new("Shadow Case", "https://img/shadow.png"),
                CatalogEntry::new("Chroma 2 Case", ""),
                CatalogEntry::new("Chroma 3 Case", "https://img/chroma3.png"),
            ],
            skins: Vec::new(),
        });
        assert_eq!(
            catalog.resolve_knife_icon().as_deref(),
            Some("https://img/chroma3.png")
        );
    }

    #[test]
    fn test_knife_case_fallbacks() {
        let unthemed = CatalogIndex::new(CatalogFeeds {
            cases: vec![
                CatalogEntry::new("Revolution Case", ""),
                CatalogEntry::new("Recoil Case", "https://img/recoil.png"),
            ],
            skins: Vec::new(),
        });
        assert_eq!(
            unthemed.resolve_knife_icon().as_deref(),
            Some("https://img/recoil.png")
        );

        let imageless = CatalogIndex::new(CatalogFeeds {
            cases: vec![CatalogEntry::new("Revolution Case", "")],
            skins: Vec::new(),
        });
        assert_eq!(imageless.resolve_knife_icon(), None);

        let empty = CatalogIndex::default();
        assert_eq!(empty.resolve_knife_icon().as_deref(), Some(KNIFE_CASE_ICON));
        assert!(KNIFE_CASE_ICON.contains("KNIFE%20CASE"));
    }

    #[test]
    fn test_knife_icon_is_stable() {
        let catalog = catalog();
        let first = catalog.resolve_knife_icon();
        for _ in 0..10 {
            assert_eq!(catalog.resolve_knife_icon(), first);
        }
    }

    #[test]
    fn test_resolve_rarity_chain() {
        let catalog = catalog();
        assert_eq!(
            catalog.resolve_rarity(&inventory_item("AK-47 | Slate", "classified")),
            RarityTier::Classified
        );
        assert_eq!(
            catalog.resolve_rarity(&inventory_item("AWP | Wildfire", "")),
            RarityTier::Covert
        );
        assert_eq!(
            catalog.resolve_rarity(&inventory_item("Unknown | Thing", "")),
            RarityTier::MilSpec
        );
        // The feed entry exists but carries no label
        assert_eq!(
            catalog.resolve_rarity(&inventory_item("Gamma Case", "")),
            RarityTier::MilSpec
        );
    }

    #[test]
    fn test_case_pool_fallbacks() {
        let catalog = catalog();
        let pool = catalog.case_pool("gamma case");
        assert_eq!(pool.len(), 2);
        assert_eq!(pool[0].rarity, RarityTier::Covert);

        let pool = catalog.case_pool("Shadow Case");
        assert_eq!(pool.len(), 3);
        assert_eq!(pool[0].name, "AK-47 | Slate");

        let pool = CatalogIndex::default().case_pool("Knife Case");
        assert_eq!(pool.len(), DEFAULT_DROP_TABLE.len());
        assert_eq!(pool[5].name, "AWP | Wildfire");
        assert_eq!(pool[5].rarity, RarityTier::Covert);
    }

    #[test]
    fn test_default_pool_is_capped() {
        let skins = (0..300)
            .map(|i| CatalogEntry::new(format!("Skin {i}"), ""))
            .collect();
        let catalog = CatalogIndex::new(CatalogFeeds {
            cases: Vec::new(),
            skins,
        });
        let pool = catalog.case_pool("Anything");
        assert_eq!(pool.len(), DEFAULT_POOL_SIZE);
        assert_eq!(pool[0].rarity, RarityTier::MilSpec);
    }

    proptest! {
        #[test]
        fn test_resolve_rarity_is_pure(label in ".{0,24}") {
            let catalog = catalog();
            let item = inventory_item("Unlisted | Item", &label);
            let first = catalog.resolve_rarity(&item);
            prop_assert_eq!(first, catalog.resolve_rarity(&item));
            if label.trim().is_empty() {
                prop_assert_eq!(first, RarityTier::MilSpec);
            } else {
                prop_assert_eq!(first, RarityTier::from_label(&label));
            }
        }
    }
}
