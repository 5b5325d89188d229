//! Word-pair corpus used to deal cards at game start.

use crate::types::Card;
use async_trait::async_trait;
use rand::seq::IndexedRandom;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("failed to read corpus file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse corpus file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[async_trait]
pub trait WordCorpus: Send + Sync {
    /// Uniformly pick one card whose language is in `languages`.
    /// An empty `languages` slice matches every card.
    async fn sample_one(&self, languages: &[String]) -> Option<Card>;
}

/// Corpus held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryCorpus {
    cards: Vec<Card>,
}

impl MemoryCorpus {
    pub fn new(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    /// Load a JSON array of `{a, b, language}` cards
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let raw = std::fs::read_to_string(path)?;
        let cards: Vec<Card> = serde_json::from_str(&raw)?;
        Ok(Self::new(cards))
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Distinct languages, in first-seen order
    pub fn languages(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for card in &self.cards {
            if !seen.contains(&card.language) {
                seen.push(card.language.clone());
            }
        }
        seen
    }
}

#[async_trait]
impl WordCorpus for MemoryCorpus {
    async fn sample_one(&self, languages: &[String]) -> Option<Card> {
        let matching: Vec<&Card> = self
            .cards
            .iter()
            .filter(|c| languages.is_empty() || languages.contains(&c.language))
            .collect();

        let mut rng = rand::rng();
        matching.choose(&mut rng).map(|c| (*c).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn card(a: &str, b: &str, language: &str) -> Card {
        Card {
            num: None,
            a: a.to_string(),
            b: b.to_string(),
            language: language.to_string(),
        }
    }

    #[tokio::test]
    async fn test_sample_filters_by_language() {
        let corpus = MemoryCorpus::new(vec![
            card("cat", "dog", "english"),
            card("猫", "狗", "chinese"),
        ]);

        for _ in 0..20 {
            let sampled = corpus.sample_one(&["chinese".to_string()]).await.unwrap();
            assert_eq!(sampled.language, "chinese");
        }
    }

    #[tokio::test]
    async fn test_sample_empty_languages_matches_all() {
        let corpus = MemoryCorpus::new(vec![card("cat", "dog", "english")]);
        assert!(corpus.sample_one(&[]).await.is_some());
    }

    #[tokio::test]
    async fn test_sample_without_match_is_none() {
        let corpus = MemoryCorpus::new(vec![card("cat", "dog", "english")]);
        assert!(corpus.sample_one(&["french".to_string()]).await.is_none());
        assert!(MemoryCorpus::default().sample_one(&[]).await.is_none());
    }

    #[test]
    fn test_load_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"num": 1, "a": "sun", "b": "moon", "language": "english"}},
                {{"a": "火", "b": "水", "language": "chinese"}}]"#
        )
        .unwrap();

        let corpus = MemoryCorpus::from_json_file(file.path()).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.languages(), vec!["english", "chinese"]);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let result = MemoryCorpus::from_json_file(file.path());
        assert!(matches!(result, Err(CorpusError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = MemoryCorpus::from_json_file("/definitely/not/here.json");
        assert!(matches!(result, Err(CorpusError::Io(_))));
    }
}
