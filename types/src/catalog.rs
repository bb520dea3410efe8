use crate::item::{Item, RarityLabel};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One record of the case or skin feed.
///
/// Only `name` is required. Cases list their possible drops in `contains`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub rarity: RarityLabel,
    #[serde(default)]
    pub contains: Vec<CatalogEntry>,
}

impl CatalogEntry {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        let image = image.into();
        Self {
            name: name.into(),
            image: (!image.is_empty()).then_some(image),
            ..Default::default()
        }
    }

    pub fn with_rarity(mut self, label: &str) -> Self {
        self.rarity = RarityLabel::from(label);
        self
    }

    pub fn with_contains(mut self, contains: Vec<CatalogEntry>) -> Self {
        self.contains = contains;
        self
    }

    /// Image URI, if the feed supplied a non-empty one.
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref().filter(|image| !image.is_empty())
    }

    /// Convert to a displayable item, defaulting the rarity label.
    pub fn to_item(&self) -> Item {
        Item::new(
            self.name.clone(),
            self.image().unwrap_or_default(),
            self.rarity.tier(),
        )
    }
}

/// Parse a feed document into validated entries.
///
/// Anything that is not an array yields no entries. Elements that fail to
/// decode or have a blank name are dropped individually so one bad record
/// does not discard the rest of the feed.
pub fn parse_feed(document: Value) -> Vec<CatalogEntry> {
    let Value::Array(elements) = document else {
        return Vec::new();
    };
    elements
        .into_iter()
        .filter_map(|element| serde_json::from_value::<CatalogEntry>(element).ok())
        .filter(|entry| !entry.name.trim().is_empty())
        .map(|mut entry| {
            entry
                .contains
                .retain(|contained| !contained.name.trim().is_empty());
            entry
        })
        .collect()
}
