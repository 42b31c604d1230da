use crate::index::SearchEntry;
use nucleo_matcher::pattern::{CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Matcher, Utf32String};

/// Fuzzy matching of search entries by name using nucleo-matcher
pub struct FuzzySearch {
    matcher: Matcher,
}

impl FuzzySearch {
    pub fn new() -> Self {
        Self {
            matcher: Matcher::new(nucleo_matcher::Config::DEFAULT),
        }
    }

    /// Score entries against `query`; every whitespace-separated term must match.
    /// Returns (entry_index, score) sorted by score descending, then by id
    pub fn search(
        &mut self,
        query: &str,
        entries: &[SearchEntry],
        limit: usize,
    ) -> Vec<(usize, f32)> {
        let pattern = Pattern::parse(query, CaseMatching::Ignore, Normalization::Smart);

        let mut scored: Vec<(usize, u32)> = entries
            .iter()
            .enumerate()
            .filter_map(|(idx, entry)| {
                let haystack = Utf32String::from(entry.name.as_str());
                let score = pattern.score(haystack.slice(..), &mut self.matcher)?;
                Some((idx, score))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| entries[a.0].id.cmp(&entries[b.0].id))
        });
        scored.truncate(limit);

        // Normalize scores to 0-1 range (nucleo scores are u32)
        let max_score = scored.first().map(|(_, s)| *s as f32).unwrap_or(1.0);

        scored
            .into_iter()
            .map(|(idx, score)| {
                let normalized = if max_score > 0.0 {
                    score as f32 / max_score
                } else {
                    0.0
                };
                (idx, normalized)
            })
            .collect()
    }
}

impl Default for FuzzySearch {
    fn default() -> Self {
        Self::new()
    }
}
