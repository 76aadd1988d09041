//! The read-only character catalog.

use rand::Rng;
use std::collections::HashSet;

use crate::error::{GameError, GameResult};
use crate::store::{DocumentStore, CHARACTERS_DOC};
use crate::types::{Character, Suggestion};

/// Autocomplete returns at most this many entries
pub const MAX_SUGGESTIONS: usize = 50;

#[derive(Debug, Clone)]
pub struct CharacterCatalog {
    characters: Vec<Character>,
}

impl CharacterCatalog {
    /// Build a catalog, rejecting empty lists and duplicate names. Names are
    /// stored trimmed so lookups by a trimmed guess always reach them.
    pub fn new(mut characters: Vec<Character>) -> GameResult<Self> {
        if characters.is_empty() {
            return Err(GameError::Configuration(
                "Character catalog is empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for character in &mut characters {
            character.name = character.name.trim().to_string();
            if character.name.is_empty() {
                return Err(GameError::Configuration(
                    "Character with empty name in catalog".to_string(),
                ));
            }
            if !seen.insert(character.name.to_lowercase()) {
                return Err(GameError::Configuration(format!(
                    "Duplicate character name '{}' in catalog",
                    character.name
                )));
            }
        }

        Ok(Self { characters })
    }

    /// Load the catalog from the `characters` document
    pub async fn load(store: &dyn DocumentStore) -> GameResult<Self> {
        let doc = store
            .load(CHARACTERS_DOC)
            .await
            .map_err(|e| GameError::Configuration(format!("Cannot read character catalog: {}", e)))?
            .ok_or_else(|| {
                GameError::Configuration("Character catalog document is missing".to_string())
            })?;

        let characters: Vec<Character> = serde_json::from_value(doc)
            .map_err(|e| GameError::Configuration(format!("Corrupt character catalog: {}", e)))?;

        let catalog = Self::new(characters)?;
        tracing::info!("Loaded {} characters", catalog.len());
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    pub fn all(&self) -> &[Character] {
        &self.characters
    }

    /// Look up a character by name, ignoring case and surrounding whitespace
    pub fn find(&self, name: &str) -> Option<&Character> {
        let needle = name.trim().to_lowercase();
        self.characters
            .iter()
            .find(|c| c.name.to_lowercase() == needle)
    }

    /// Draw a character uniformly at random
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> GameResult<&Character> {
        if self.characters.is_empty() {
            return Err(GameError::Configuration(
                "Character catalog is empty".to_string(),
            ));
        }
        let index = rng.random_range(0..self.characters.len());
        Ok(&self.characters[index])
    }

    /// Prefix search in catalog order, skipping excluded names
    pub fn suggestions<F>(&self, prefix: &str, is_excluded: F) -> Vec<Suggestion>
    where
        F: Fn(&str) -> bool,
    {
        let prefix = prefix.trim().to_lowercase();
        self.characters
            .iter()
            .filter(|c| prefix.is_empty() || c.name.to_lowercase().starts_with(&prefix))
            .filter(|c| !is_excluded(&c.name))
            .take(MAX_SUGGESTIONS)
            .map(|c| Suggestion {
                name: c.name.clone(),
                avatar: c.avatar_url.clone(),
            })
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::store::MemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_empty_catalog_is_configuration_error() {
        assert!(matches!(
            CharacterCatalog::new(vec![]),
            Err(GameError::Configuration(_))
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut characters = roster();
        characters.push(character("kafka ", "female", "Hunt", "Ice", 4, "1.0"));
        assert!(matches!(
            CharacterCatalog::new(characters),
            Err(GameError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_load_missing_document() {
        let store = MemoryStore::new();
        assert!(matches!(
            CharacterCatalog::load(&store).await,
            Err(GameError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_load_from_store() {
        let store = MemoryStore::with_docs([(
            CHARACTERS_DOC.to_string(),
            serde_json::to_value(roster()).unwrap(),
        )]);
        let catalog = CharacterCatalog::load(&store).await.unwrap();
        assert_eq!(catalog.len(), 5);
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let catalog = CharacterCatalog::new(roster()).unwrap();
        assert_eq!(catalog.find(" kafka ").unwrap().name, "Kafka");
        assert!(catalog.find("Nobody").is_none());
    }

    #[test]
    fn test_padded_catalog_names_are_trimmed() {
        let mut characters = roster();
        characters.push(character("  Bronya ", "female", "Harmony", "Wind", 5, "1.0"));
        let catalog = CharacterCatalog::new(characters).unwrap();

        let bronya = catalog.find("bronya").unwrap();
        assert_eq!(bronya.name, "Bronya");
        assert!(catalog.suggestions("bro", |_| false).iter().any(|s| s.name == "Bronya"));
    }

    #[test]
    fn test_random_covers_catalog() {
        let catalog = CharacterCatalog::new(roster()).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = HashSet::new();
        for _ in 0..500 {
            seen.insert(catalog.random(&mut rng).unwrap().name.clone());
        }
        assert_eq!(seen.len(), catalog.len());
    }

    #[test]
    fn test_suggestions_prefix_and_order() {
        let catalog = CharacterCatalog::new(roster()).unwrap();

        let names: Vec<_> = catalog
            .suggestions("ka", |_| false)
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Kafka", "Kara"]);

        let all = catalog.suggestions("  ", |_| false);
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].name, "Kafka");
        assert_eq!(all[0].avatar, "/avatars/kafka.png");
    }

    #[test]
    fn test_suggestions_respect_exclusions() {
        let catalog = CharacterCatalog::new(roster()).unwrap();
        let names: Vec<_> = catalog
            .suggestions("", |name| name == "Kafka")
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert!(!names.contains(&"Kafka".to_string()));
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn test_suggestions_capped() {
        let characters: Vec<_> = (0..80)
            .map(|i| character(&format!("Hero {}", i), "male", "Hunt", "Ice", 4, "1.0"))
            .collect();
        let catalog = CharacterCatalog::new(characters).unwrap();
        let results = catalog.suggestions("hero", |_| false);
        assert_eq!(results.len(), MAX_SUGGESTIONS);
        assert_eq!(results[0].name, "Hero 0");
    }
}
