use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Coarse value/visual rank of an item.
///
/// Tiers are inferred from free-text labels (the item feeds are not consistent
/// about exact names), see [RarityTier::from_label].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RarityTier {
    Consumer,
    Industrial,
    MilSpec,
    Restricted,
    Classified,
    Covert,
    Gold,
}

impl RarityTier {
    pub const ALL: [RarityTier; 7] = [
        RarityTier::Consumer,
        RarityTier::Industrial,
        RarityTier::MilSpec,
        RarityTier::Restricted,
        RarityTier::Classified,
        RarityTier::Covert,
        RarityTier::Gold,
    ];

    /// Infer a tier from a free-text label.
    ///
    /// Matching is case-insensitive substring containment, checked in tier
    /// order from consumer upwards. Empty or unmatched labels map to
    /// [RarityTier::MilSpec].
    pub fn from_label(label: &str) -> Self {
        let label = label.to_lowercase();
        if label.contains("consumer") {
            RarityTier::Consumer
        } else if label.contains("industrial") {
            RarityTier::Industrial
        } else if label.contains("mil-spec") || label.contains("milspec") {
            RarityTier::MilSpec
        } else if label.contains("restricted") {
            RarityTier::Restricted
        } else if label.contains("classified") {
            RarityTier::Classified
        } else if label.contains("covert") || label.contains("extraordinary") {
            RarityTier::Covert
        } else if label.contains("contraband") || label.contains("gold") {
            RarityTier::Gold
        } else {
            RarityTier::MilSpec
        }
    }

    /// Tiers that get the jackpot treatment instead of a tier sound.
    pub fn is_top_tier(&self) -> bool {
        matches!(self, RarityTier::Covert | RarityTier::Gold)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RarityTier::Consumer => "consumer",
            RarityTier::Industrial => "industrial",
            RarityTier::MilSpec => "milspec",
            RarityTier::Restricted => "restricted",
            RarityTier::Classified => "classified",
            RarityTier::Covert => "covert",
            RarityTier::Gold => "gold",
        }
    }
}

impl fmt::Display for RarityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rarity as it appears on the wire.
///
/// The catalog feeds use `{"id": .., "name": "Covert", "color": ..}` while the
/// authority sends a bare string. Both collapse to the label text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RarityLabel(pub String);

impl RarityLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn tier(&self) -> RarityTier {
        RarityTier::from_label(&self.0)
    }
}

impl From<&str> for RarityLabel {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for RarityLabel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Object {
                #[serde(default)]
                name: Option<String>,
            },
            Null(()),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => RarityLabel(text),
            Raw::Object { name } => RarityLabel(name.unwrap_or_default()),
            Raw::Null(()) => RarityLabel::default(),
        })
    }
}

/// A displayable item: what a reel card or inventory tile shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    pub name: String,
    pub image_uri: String,
    pub rarity: RarityTier,
}

impl Item {
    pub fn new(name: impl Into<String>, image_uri: impl Into<String>, rarity: RarityTier) -> Self {
        Self {
            name: name.into(),
            image_uri: image_uri.into(),
            rarity,
        }
    }

    /// Split `"<weapon> | <skin>"` into its parts for the card label.
    pub fn display_parts(&self) -> (&str, &str) {
        match self.name.split_once('|') {
            Some((weapon, skin)) => (weapon.trim(), skin.trim()),
            None => ("Unknown", self.name.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label_priority() {
        assert_eq!(RarityTier::from_label("Consumer Grade"), RarityTier::Consumer);
        assert_eq!(RarityTier::from_label("Industrial Grade"), RarityTier::Industrial);
        assert_eq!(RarityTier::from_label("Mil-Spec Grade"), RarityTier::MilSpec);
        assert_eq!(RarityTier::from_label("milspec"), RarityTier::MilSpec);
        assert_eq!(RarityTier::from_label("RESTRICTED"), RarityTier::Restricted);
        assert_eq!(RarityTier::from_label("Classified"), RarityTier::Classified);
        assert_eq!(RarityTier::from_label("Covert"), RarityTier::Covert);
        assert_eq!(RarityTier::from_label("Extraordinary"), RarityTier::Covert);
        assert_eq!(RarityTier::from_label("Contraband"), RarityTier::Gold);
        assert_eq!(RarityTier::from_label("gold"), RarityTier::Gold);

        // Earlier tiers win when a label mentions several
        assert_eq!(
            RarityTier::from_label("consumer covert"),
            RarityTier::Consumer
        );
    }

    #[test]
    fn test_unknown_labels_default_to_milspec() {
        assert_eq!(RarityTier::from_label(""), RarityTier::MilSpec);
        assert_eq!(RarityTier::from_label("mythical"), RarityTier::MilSpec);
    }

    #[test]
    fn test_top_tier() {
        let top: Vec<_> = RarityTier::ALL
            .iter()
            .filter(|tier| tier.is_top_tier())
            .collect();
        assert_eq!(top, vec![&RarityTier::Covert, &RarityTier::Gold]);
    }

    #[test]
    fn test_rarity_label_accepts_string_and_object() {
        let text: RarityLabel = serde_json::from_str(r#""Covert""#).unwrap();
        assert_eq!(text.tier(), RarityTier::Covert);

        let object: RarityLabel =
            serde_json::from_str(r##"{"id":"rarity_ancient_weapon","name":"Covert","color":"#eb4b4b"}"##)
                .unwrap();
        assert_eq!(object.as_str(), "Covert");

        let null: RarityLabel = serde_json::from_str("null").unwrap();
        assert!(null.is_empty());
        assert_eq!(null.tier(), RarityTier::MilSpec);
    }

    #[test]
    fn test_display_parts() {
        let item = Item::new("AK-47 | Slate", "", RarityTier::Restricted);
        assert_eq!(item.display_parts(), ("AK-47", "Slate"));

        let case = Item::new("Revolution Case", "", RarityTier::MilSpec);
        assert_eq!(case.display_parts(), ("Unknown", "Revolution Case"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn from_label_is_pure(label in ".*") {
                prop_assert_eq!(RarityTier::from_label(&label), RarityTier::from_label(&label));
            }

            #[test]
            fn from_label_ignores_case(label in "[a-zA-Z -]{0,24}") {
                prop_assert_eq!(
                    RarityTier::from_label(&label.to_uppercase()),
                    RarityTier::from_label(&label.to_lowercase())
                );
            }

            #[test]
            fn unmatched_labels_are_milspec(label in "[0-9 _]{0,24}") {
                prop_assert_eq!(RarityTier::from_label(&label), RarityTier::MilSpec);
            }
        }
    }
}
