//! Rank fusion of keyword and semantic results.

use std::collections::HashMap;

use super::SearchHit;
use crate::config::{FusionStrategy, SearchConfig};
use crate::knowledge::store::ScoredPath;

/// Combines a keyword ranking with a semantic ranking.
#[derive(Debug, Clone)]
pub struct RankFusion {
    strategy: FusionStrategy,
    keyword_weight: f64,
    semantic_weight: f64,
    /// RRF constant k (typically 60)
    k: f64,
}

impl RankFusion {
    pub fn new(strategy: FusionStrategy, keyword_weight: f64, semantic_weight: f64, k: f64) -> Self {
        Self {
            strategy,
            keyword_weight,
            semantic_weight,
            k,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(
            config.fusion,
            config.keyword_weight,
            config.semantic_weight,
            config.rrf_k,
        )
    }

    /// Fuse both rankings into one list ranked `1..=limit`.
    ///
    /// Both inputs must be ordered best first.
    pub fn fuse(&self, keyword: &[SearchHit], semantic: &[ScoredPath], limit: usize) -> Vec<SearchHit> {
        let keyword: Vec<(&str, f64)> = keyword
            .iter()
            .map(|h| (h.file_path.as_str(), h.score))
            .collect();
        let semantic = dedupe_by_path(semantic);

        let mut scores: HashMap<&str, f64> = HashMap::new();
        match self.strategy {
            FusionStrategy::Rrf => {
                // score(d) = Σ weight_i / (k + rank_i(d))
                for (list, weight) in [(&keyword, self.keyword_weight), (&semantic, self.semantic_weight)] {
                    for (rank, &(path, _)) in list.iter().enumerate() {
                        *scores.entry(path).or_default() += weight / (self.k + rank as f64 + 1.0);
                    }
                }
            }
            FusionStrategy::Weighted => {
                for (list, weight) in [(&keyword, self.keyword_weight), (&semantic, self.semantic_weight)] {
                    for (path, normalized) in min_max(list) {
                        *scores.entry(path).or_default() += weight * normalized;
                    }
                }
            }
        }

        let mut fused: Vec<(&str, f64)> = scores.into_iter().collect();
        fused.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        fused.truncate(limit);

        fused
            .into_iter()
            .enumerate()
            .map(|(i, (path, score))| SearchHit {
                file_path: path.to_string(),
                score,
                rank: i + 1,
            })
            .collect()
    }
}

/// Keep the best score per path, preserving first-seen order.
fn dedupe_by_path(hits: &[ScoredPath]) -> Vec<(&str, f64)> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut out: Vec<(&str, f64)> = Vec::new();
    for hit in hits {
        match seen.get(hit.file_path.as_str()) {
            Some(&i) => out[i].1 = out[i].1.max(hit.score),
            None => {
                seen.insert(hit.file_path.as_str(), out.len());
                out.push((hit.file_path.as_str(), hit.score));
            }
        }
    }
    out
}

/// Scale scores into `[0, 1]`; a list of equal scores maps to 1.
fn min_max<'a>(list: &[(&'a str, f64)]) -> Vec<(&'a str, f64)> {
    let min = list.iter().map(|(_, s)| *s).fold(f64::INFINITY, f64::min);
    let max = list.iter().map(|(_, s)| *s).fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    list.iter()
        .map(|&(path, score)| {
            let normalized = if span > 0.0 { (score - min) / span } else { 1.0 };
            (path, normalized)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits(paths: &[(&str, f64)]) -> Vec<SearchHit> {
        paths
            .iter()
            .enumerate()
            .map(|(i, (p, s))| SearchHit { file_path: p.to_string(), score: *s, rank: i + 1 })
            .collect()
    }

    #[test]
    fn test_rrf_prefers_documents_in_both_lists() {
        let fusion = RankFusion::new(FusionStrategy::Rrf, 1.0, 1.0, 60.0);
        let keyword = hits(&[("a.ts", 9.0), ("b.ts", 5.0)]);
        let semantic = vec![ScoredPath::new("c.ts", 0.9), ScoredPath::new("b.ts", 0.8)];

        let fused = fusion.fuse(&keyword, &semantic, 10);
        assert_eq!(fused[0].file_path, "b.ts");
        assert_eq!(fused.len(), 3);
        let ranks: Vec<usize> = fused.iter().map(|h| h.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn test_rrf_weights() {
        let keyword = hits(&[("a.ts", 1.0)]);
        let semantic = vec![ScoredPath::new("b.ts", 1.0)];

        let fused = RankFusion::new(FusionStrategy::Rrf, 0.9, 0.1, 60.0).fuse(&keyword, &semantic, 10);
        assert_eq!(fused[0].file_path, "a.ts");

        let fused = RankFusion::new(FusionStrategy::Rrf, 0.1, 0.9, 60.0).fuse(&keyword, &semantic, 10);
        assert_eq!(fused[0].file_path, "b.ts");
    }

    #[test]
    fn test_weighted_normalizes_scores() {
        let fusion = RankFusion::new(FusionStrategy::Weighted, 0.5, 0.5, 60.0);
        // Raw BM25 scores dwarf similarities; normalization evens them out.
        let keyword = hits(&[("a.ts", 40.0), ("b.ts", 10.0)]);
        let semantic = vec![ScoredPath::new("b.ts", 0.9), ScoredPath::new("a.ts", 0.2)];

        let fused = fusion.fuse(&keyword, &semantic, 10);
        assert!((fused[0].score - 0.5).abs() < 1e-9);
        assert!((fused[1].score - 0.5).abs() < 1e-9);
        // Equal scores fall back to path order.
        assert_eq!(fused[0].file_path, "a.ts");
    }

    #[test]
    fn test_semantic_duplicates_keep_best_score() {
        let fusion = RankFusion::new(FusionStrategy::Rrf, 1.0, 1.0, 60.0);
        let semantic = vec![
            ScoredPath::new("a.ts", 0.9),
            ScoredPath::new("a.ts", 0.7),
            ScoredPath::new("b.ts", 0.5),
        ];
        let fused = fusion.fuse(&[], &semantic, 10);
        assert_eq!(fused.len(), 2);
        assert!(fused[0].score > fused[1].score);
        assert!((fused[1].score - 1.0 / 62.0).abs() < 1e-12);
    }

    #[test]
    fn test_limit() {
        let fusion = RankFusion::new(FusionStrategy::Weighted, 1.0, 1.0, 60.0);
        let keyword = hits(&[("a.ts", 3.0), ("b.ts", 2.0), ("c.ts", 1.0)]);
        assert_eq!(fusion.fuse(&keyword, &[], 2).len(), 2);
    }
}
