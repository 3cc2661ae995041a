//! Keyword search fanned out over the per-entity full-text indexes.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::join_all;
use tracing::warn;

use super::SearchHit;
use crate::knowledge::error::KnowledgeError;
use crate::knowledge::store::{EntityTable, GraphStore, ScoredPath};

/// Query every searchable index concurrently and merge the hits by file.
///
/// Each index gets `timeout`; a failing or slow index contributes nothing.
pub async fn keyword_search(
    store: &dyn GraphStore,
    query: &str,
    limit: usize,
    timeout: Duration,
) -> Vec<SearchHit> {
    let queries = EntityTable::SEARCHABLE.into_iter().map(|table| async move {
        let index = table.keyword_index();
        let result = tokio::time::timeout(
            timeout,
            store.query_keyword_index(table, index, query, limit),
        )
        .await
        .unwrap_or_else(|_| Err(KnowledgeError::Timeout(index.to_string())));

        match result {
            Ok(hits) => hits,
            Err(e) => {
                warn!(index, error = %e, "keyword index unavailable, skipping");
                Vec::new()
            }
        }
    });

    merge_keyword_hits(join_all(queries).await, limit)
}

/// Sum scores of the same file across indexes, rank best first.
///
/// Ties in summed score are ordered by path.
pub fn merge_keyword_hits(per_index: Vec<Vec<ScoredPath>>, limit: usize) -> Vec<SearchHit> {
    let mut merged: HashMap<String, f64> = HashMap::new();
    for hit in per_index.into_iter().flatten() {
        *merged.entry(hit.file_path).or_default() += hit.score;
    }

    let mut sorted: Vec<(String, f64)> = merged.into_iter().collect();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(limit);

    sorted
        .into_iter()
        .enumerate()
        .map(|(i, (file_path, score))| SearchHit { file_path, score, rank: i + 1 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_sums_scores_per_file() {
        let merged = merge_keyword_hits(
            vec![
                vec![ScoredPath::new("f1", 5.0)],
                vec![ScoredPath::new("f1", 3.0), ScoredPath::new("f2", 2.0)],
            ],
            10,
        );
        assert_eq!(
            merged,
            vec![
                SearchHit { file_path: "f1".into(), score: 8.0, rank: 1 },
                SearchHit { file_path: "f2".into(), score: 2.0, rank: 2 },
            ]
        );
    }

    #[test]
    fn test_merge_truncates_and_breaks_ties_by_path() {
        let merged = merge_keyword_hits(
            vec![vec![
                ScoredPath::new("b.ts", 1.0),
                ScoredPath::new("a.ts", 1.0),
                ScoredPath::new("c.ts", 0.5),
            ]],
            2,
        );
        let paths: Vec<&str> = merged.iter().map(|h| h.file_path.as_str()).collect();
        assert_eq!(paths, vec!["a.ts", "b.ts"]);
        assert_eq!(merged[1].rank, 2);
    }

    #[test]
    fn test_merge_of_nothing_is_empty() {
        assert!(merge_keyword_hits(vec![Vec::new(), Vec::new()], 5).is_empty());
    }
}
