//! Static game content: roster, evidence catalog, reaction tables and
//! screen geometry, loaded from one JSON document.

use crate::accusation::AccusationConfig;
use crate::character::{ActorId, CharacterDef};
use crate::evidence::{EvidenceItem, EvidenceRegistry};
use crate::narrative::{Fragment, Unlock};
use crate::regions::{evidence_screen_layout, MapAction, RegionSet, ScreenAction};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Errors from loading game data.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid game data: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Actor name -> evidence id -> value.
pub type ReactionTable<T> = BTreeMap<String, BTreeMap<String, T>>;

/// Evidence granted when an actor's reply mentions any keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keywords: Vec<String>,
    pub evidence_id: String,
}

impl KeywordRule {
    /// Case-insensitive search for any keyword in `text`.
    pub fn matches(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.keywords
            .iter()
            .filter(|k| !k.trim().is_empty())
            .any(|k| text.contains(&k.to_lowercase()))
    }
}

/// One floor of the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapPage {
    pub id: String,
    pub image: String,
    #[serde(default)]
    pub regions: RegionSet<MapAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(default)]
    pub default_page: Option<String>,
    #[serde(default)]
    pub pages: Vec<MapPage>,
}

impl MapConfig {
    pub fn page(&self, id: &str) -> Option<&MapPage> {
        self.pages.iter().find(|p| p.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.pages.iter().position(|p| p.id == id)
    }

    /// The page shown when the map opens.
    pub fn first_page(&self) -> Option<&MapPage> {
        self.default_page
            .as_deref()
            .and_then(|id| self.page(id))
            .or_else(|| self.pages.first())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backgrounds {
    #[serde(default)]
    pub initial: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

fn default_countdown() -> u32 {
    658
}

fn default_present_format() -> String {
    "(Present {name})".to_string()
}

fn default_file_key() -> String {
    "v1".to_string()
}

/// Everything a game needs that never changes during play.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameData {
    pub global_story: String,
    /// Character file version reported to the endpoint.
    #[serde(default = "default_file_key")]
    pub file_key: String,
    /// The player character; investigation results are narrated by them.
    pub detective: ActorId,
    /// Template for the user line of a presentation; `{name}` is the item.
    #[serde(default = "default_present_format")]
    pub present_format: String,
    pub characters: Vec<CharacterDef>,
    pub evidence: Vec<EvidenceItem>,
    /// Scripted replies to presented evidence.
    #[serde(default)]
    pub presentations: ReactionTable<String>,
    /// Fragments unlocked by presented evidence.
    #[serde(default)]
    pub unlocks: ReactionTable<Unlock>,
    /// Evidence granted by presented evidence.
    #[serde(default)]
    pub grants: ReactionTable<String>,
    #[serde(default)]
    pub keywords: BTreeMap<String, KeywordRule>,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default = "evidence_screen_layout")]
    pub evidence_screen: RegionSet<ScreenAction>,
    #[serde(default = "default_countdown")]
    pub action_countdown: u32,
    #[serde(default)]
    pub backgrounds: Backgrounds,
    #[serde(default)]
    pub accusation: AccusationConfig,
}

impl GameData {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, DataError> {
        let data: Self = serde_json::from_str(json)?;
        data.validate()?;
        Ok(data)
    }

    /// Load and validate a JSON file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let data = Self::from_json_str(&content)?;
        tracing::info!(
            path = %path.display(),
            characters = data.characters.len(),
            evidence = data.evidence.len(),
            "loaded game data"
        );
        Ok(data)
    }

    pub fn character(&self, id: ActorId) -> Option<&CharacterDef> {
        self.characters.iter().find(|c| c.id == id.0)
    }

    pub fn character_by_name(&self, name: &str) -> Option<&CharacterDef> {
        self.characters.iter().find(|c| c.name == name)
    }

    /// Name of the player character.
    pub fn player_name(&self) -> &str {
        self.character(self.detective).map_or("", |c| c.name.as_str())
    }

    /// The catalog as it stands when a case opens. Items flagged
    /// `obtained` are already held.
    pub fn registry(&self) -> EvidenceRegistry {
        EvidenceRegistry::new(self.evidence.clone())
    }

    pub fn presentation(&self, actor: &str, evidence: &str) -> Option<&str> {
        lookup(&self.presentations, actor, evidence).map(String::as_str)
    }

    pub fn unlock(&self, actor: &str, evidence: &str) -> Option<Unlock> {
        lookup(&self.unlocks, actor, evidence).copied()
    }

    pub fn unlocked_fragment(&self, actor: &str, evidence: &str) -> Option<Fragment> {
        self.unlock(actor, evidence).and_then(Unlock::fragment)
    }

    pub fn grant(&self, actor: &str, evidence: &str) -> Option<&str> {
        lookup(&self.grants, actor, evidence).map(String::as_str)
    }

    pub fn keyword_rule(&self, actor: &str) -> Option<&KeywordRule> {
        self.keywords.get(actor)
    }

    pub fn present_line(&self, evidence_name: &str) -> String {
        self.present_format.replace("{name}", evidence_name)
    }

    /// Check cross references. Every problem is collected into one error.
    pub fn validate(&self) -> Result<(), DataError> {
        let mut problems = Vec::new();

        let mut actor_ids = HashSet::new();
        let mut actor_names = HashSet::new();
        for c in &self.characters {
            if !actor_ids.insert(c.id) {
                problems.push(format!("duplicate character id {}", c.id));
            }
            if !actor_names.insert(c.name.as_str()) {
                problems.push(format!("duplicate character name '{}'", c.name));
            }
        }
        if !actor_ids.contains(&self.detective.0) {
            problems.push(format!("detective {} is not a character", self.detective));
        }

        let mut evidence_ids = HashSet::new();
        for e in &self.evidence {
            if !evidence_ids.insert(e.id.as_str()) {
                problems.push(format!("duplicate evidence id '{}'", e.id));
            }
        }

        let mut check_table = |table: &str, actors: Vec<(&String, Vec<&String>)>| {
            for (actor, ids) in actors {
                if !actor_names.contains(actor.as_str()) {
                    problems.push(format!("{table}: unknown character '{actor}'"));
                }
                for id in ids {
                    if !evidence_ids.contains(id.as_str()) {
                        problems.push(format!("{table}: unknown evidence '{id}' for '{actor}'"));
                    }
                }
            }
        };
        check_table("presentations", table_refs(&self.presentations, |_| None));
        check_table("unlocks", table_refs(&self.unlocks, |_| None));
        check_table("grants", table_refs(&self.grants, |granted| Some(granted)));
        check_table(
            "keywords",
            self.keywords
                .iter()
                .map(|(actor, rule)| (actor, vec![&rule.evidence_id]))
                .collect(),
        );

        for name in self.evidence_screen.invalid() {
            problems.push(format!("evidence screen: inverted region '{name}'"));
        }

        let page_ids: HashSet<&str> = self.map.pages.iter().map(|p| p.id.as_str()).collect();
        if let Some(default) = &self.map.default_page {
            if !page_ids.contains(default.as_str()) {
                problems.push(format!("map: unknown default page '{default}'"));
            }
        }
        for page in &self.map.pages {
            for name in page.regions.invalid() {
                problems.push(format!("map page '{}': inverted region '{name}'", page.id));
            }
            for region in page.regions.regions() {
                match &region.action {
                    MapAction::SwitchPage { page: target } if !page_ids.contains(target.as_str()) => {
                        problems.push(format!(
                            "map page '{}': region '{}' switches to unknown page '{target}'",
                            page.id, region.name
                        ));
                    }
                    MapAction::Investigate {
                        obtain: Some(id), ..
                    } if !evidence_ids.contains(id.as_str()) => {
                        problems.push(format!(
                            "map page '{}': region '{}' grants unknown evidence '{id}'",
                            page.id, region.name
                        ));
                    }
                    _ => {}
                }
            }
        }

        if let Some(reveal) = &self.accusation.reveal {
            if !actor_ids.contains(&reveal.actor.0) {
                problems.push(format!("accusation: unknown reveal actor {}", reveal.actor));
            }
        }
        for (i, q) in self.accusation.questions.iter().enumerate() {
            if q.options.is_empty() {
                problems.push(format!("accusation: question {} has no options", i + 1));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(DataError::Invalid(problems))
        }
    }
}

fn lookup<'a, T>(table: &'a ReactionTable<T>, actor: &str, evidence: &str) -> Option<&'a T> {
    table.get(actor).and_then(|row| row.get(evidence))
}

/// Every actor of a table with the evidence ids it references: the keys, plus
/// whatever `extra` pulls out of each value.
fn table_refs<T>(
    table: &ReactionTable<T>,
    extra: impl Fn(&T) -> Option<&String>,
) -> Vec<(&String, Vec<&String>)> {
    table
        .iter()
        .map(|(actor, row)| {
            let ids = row
                .iter()
                .flat_map(|(id, value)| std::iter::once(id).chain(extra(value)))
                .collect();
            (actor, ids)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> serde_json::Value {
        json!({
            "global_story": "A storm cut the island off.",
            "detective": 1,
            "characters": [
                {"id": 1, "name": "Hiro", "context1": "I am the detective."},
                {"id": 2, "name": "Leia", "context1": "I was in the hall.", "context3": "I bought medicine."}
            ],
            "evidence": [
                {"id": "01", "name": "Sword", "image": "sword.png"},
                {"id": "09", "name": "Receipt", "image": "receipt.png"}
            ],
            "presentations": {"Leia": {"09": "That receipt is not mine!"}},
            "unlocks": {"Leia": {"09": "context3", "01": false}},
            "keywords": {"Leia": {"keywords": ["Sword"], "evidence_id": "01"}}
        })
    }

    #[test]
    fn test_defaults() {
        let data = GameData::from_json_str(&minimal().to_string()).unwrap();
        assert_eq!(data.action_countdown, 658);
        assert_eq!(data.file_key, "v1");
        assert_eq!(data.player_name(), "Hiro");
        assert_eq!(data.evidence_screen.len(), 17);
        assert_eq!(data.present_line("Receipt"), "(Present Receipt)");
    }

    #[test]
    fn test_lookups() {
        let data = GameData::from_json_str(&minimal().to_string()).unwrap();
        assert_eq!(
            data.presentation("Leia", "09"),
            Some("That receipt is not mine!")
        );
        assert_eq!(data.unlocked_fragment("Leia", "09"), Some(Fragment::Context3));
        assert_eq!(data.unlock("Leia", "01"), Some(Unlock::Flag(false)));
        assert_eq!(data.unlocked_fragment("Leia", "01"), None);
        assert!(data.presentation("Hiro", "09").is_none());
        assert!(data.keyword_rule("Leia").is_some());
    }

    #[test]
    fn test_registry_keeps_starting_items() {
        let data = GameData::from_json_str(&minimal().to_string()).unwrap();
        assert!(data.registry().list_obtained().is_empty());

        let mut value = minimal();
        value["evidence"][0]["obtained"] = json!(true);
        let data = GameData::from_json_str(&value.to_string()).unwrap();
        let registry = data.registry();
        assert!(registry.is_obtained("01"));
        assert!(!registry.is_obtained("09"));
        assert_eq!(registry.obtained_ids(), vec!["01"]);
    }

    #[test]
    fn test_keyword_matching_ignores_case() {
        let rule = KeywordRule {
            keywords: vec!["Sword".to_string(), "".to_string()],
            evidence_id: "01".to_string(),
        };
        assert!(rule.matches("the SWORD was in the lake"));
        assert!(!rule.matches("nothing here"));
    }

    #[test]
    fn test_validation_collects_problems() {
        let mut value = minimal();
        value["evidence"][1]["id"] = json!("01");
        value["grants"] = json!({"Nobody": {"01": "77"}});
        value["detective"] = json!(5);
        let err = GameData::from_json_str(&value.to_string()).unwrap_err();
        let problems = match err {
            DataError::Invalid(problems) => problems,
            other => panic!("expected validation error, got {other:?}"),
        };
        assert!(problems.iter().any(|p| p.contains("duplicate evidence id")));
        assert!(problems.iter().any(|p| p.contains("unknown character 'Nobody'")));
        assert!(problems.iter().any(|p| p.contains("unknown evidence '77'")));
        assert!(problems.iter().any(|p| p.contains("detective 5")));
    }

    #[test]
    fn test_validation_checks_map() {
        let mut value = minimal();
        value["map"] = json!({
            "default_page": "1f",
            "pages": [{
                "id": "1f",
                "image": "map_1f.png",
                "regions": [
                    {"name": "up", "rect": {"x1": 0, "y1": 0, "x2": 10, "y2": 10},
                     "action": {"type": "switch_page", "page": "roof"}},
                    {"name": "bad", "rect": {"x1": 10, "y1": 0, "x2": 0, "y2": 10},
                     "action": {"type": "close"}}
                ]
            }]
        });
        let err = GameData::from_json_str(&value.to_string()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("unknown page 'roof'"));
        assert!(message.contains("inverted region 'bad'"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.json");
        tokio::fs::write(&path, minimal().to_string()).await.unwrap();
        let data = GameData::load(&path).await.unwrap();
        assert_eq!(data.characters.len(), 2);

        let missing = GameData::load(dir.path().join("missing.json")).await;
        assert!(matches!(missing, Err(DataError::Io(_))));
    }
}
