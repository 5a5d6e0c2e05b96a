//! Keyword-based importance scoring.
//!
//! Importance is an auxiliary payload signal used for filtering and
//! reranking. It is unrelated to the similarity score of a search.

/// Base importance of every chunk.
pub const BASE_IMPORTANCE: f32 = 1.0;

/// Importance added per distinct keyword found in a chunk.
pub const KEYWORD_BONUS: f32 = 0.5;

/// Scores chunks by the configured keywords they mention.
#[derive(Debug, Clone, Default)]
pub struct ImportanceScorer {
    keywords: Vec<String>,
}

impl ImportanceScorer {
    /// Create a scorer. Keywords are lowercased and deduplicated; blank ones are dropped.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        normalized.sort();
        normalized.dedup();
        Self {
            keywords: normalized,
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// `1.0` plus `0.5` for every keyword contained (case-insensitively) in `text`.
    pub fn score(&self, text: &str) -> f32 {
        if self.keywords.is_empty() {
            return BASE_IMPORTANCE;
        }
        let lowered = text.to_lowercase();
        let hits = self
            .keywords
            .iter()
            .filter(|k| lowered.contains(k.as_str()))
            .count();
        BASE_IMPORTANCE + KEYWORD_BONUS * hits as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_keyword() {
        let scorer = ImportanceScorer::new(["tutorial"]);
        assert_eq!(scorer.score("this is a tutorial"), 1.5);
        assert_eq!(scorer.score("no match"), 1.0);
    }

    #[test]
    fn test_case_insensitive_and_distinct() {
        let scorer = ImportanceScorer::new(["Recipe", "recipe", "STEPS"]);
        assert_eq!(scorer.keywords().len(), 2);
        assert_eq!(scorer.score("The RECIPE has three steps, steps, steps"), 2.0);
    }

    #[test]
    fn test_substring_match() {
        let scorer = ImportanceScorer::new(["conclusion"]);
        assert_eq!(scorer.score("Conclusions and next steps"), 1.5);
    }

    #[test]
    fn test_no_keywords() {
        let scorer = ImportanceScorer::new(Vec::<String>::new());
        assert_eq!(scorer.score("tutorial"), BASE_IMPORTANCE);
    }
}
