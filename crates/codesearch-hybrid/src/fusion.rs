//! Linear position-decay rank fusion.
//!
//! A point at 0-based position `i` of the vector list contributes
//! `(1 - i * decay_step) * vector_weight`; at position `i` of the keyword list
//! it contributes `(1 - i * decay_step) * (1 - vector_weight)`. Contributions
//! are summed per id, so agreement between the two signals boosts a point.
//! Past position `1 / decay_step` the decay factor turns negative; that is
//! kept unless `clamp_negative` is set.

use std::collections::HashMap;

use codesearch_core::config::SearchSettings;
use codesearch_core::types::{PointId, ScoredPoint};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionConfig {
    pub vector_weight: f32,
    pub decay_step: f32,
    pub clamp_negative: bool,
}

impl Default for FusionConfig {
    fn default() -> Self { Self { vector_weight: 0.7, decay_step: 0.1, clamp_negative: false } }
}

impl From<&SearchSettings> for FusionConfig {
    fn from(s: &SearchSettings) -> Self {
        Self { vector_weight: s.vector_weight, decay_step: s.decay_step, clamp_negative: s.clamp_negative }
    }
}

impl FusionConfig {
    fn contribution(&self, position: usize, weight: f32) -> f32 {
        let decay = 1.0 - position as f32 * self.decay_step;
        let decay = if self.clamp_negative { decay.max(0.0) } else { decay };
        decay * weight
    }
}

/// Fuse two ranked lists and keep the best `top_n`.
///
/// Output is sorted by fused score, highest first; equal scores are ordered
/// by ascending id. The payload comes from the first list the point appears in.
pub fn fuse(vector_ranked: &[ScoredPoint], keyword_ranked: &[ScoredPoint], config: &FusionConfig, top_n: usize) -> Vec<ScoredPoint> {
    let mut combined: HashMap<PointId, ScoredPoint> = HashMap::new();
    let weighted = vector_ranked
        .iter()
        .enumerate()
        .map(|(i, p)| (p, config.contribution(i, config.vector_weight)))
        .chain(keyword_ranked.iter().enumerate().map(|(i, p)| (p, config.contribution(i, 1.0 - config.vector_weight))));
    for (point, score) in weighted {
        combined
            .entry(point.id)
            .and_modify(|acc| acc.score += score)
            .or_insert_with(|| ScoredPoint { id: point.id, score, payload: point.payload.clone() });
    }
    let mut fused: Vec<ScoredPoint> = combined.into_values().collect();
    fused.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
    fused.truncate(top_n);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesearch_core::types::{LanguageBucket, PointPayload};

    fn p(id: PointId) -> ScoredPoint {
        ScoredPoint {
            id,
            score: 0.0,
            payload: PointPayload {
                text: format!("chunk {id}"),
                source: "merged_code.txt".into(),
                lang: LanguageBucket::Code,
                file: None,
                start_line: 1,
                end_line: 1,
            },
        }
    }

    fn half() -> FusionConfig { FusionConfig { vector_weight: 0.5, ..FusionConfig::default() } }

    #[test]
    fn crossed_lists_tie_and_break_by_lowest_id() {
        let out = fuse(&[p(2), p(1)], &[p(1), p(2)], &half(), 3);
        assert_eq!(out.iter().map(|x| x.id).collect::<Vec<_>>(), vec![1, 2]);
        assert!((out[0].score - 0.95).abs() < 1e-6);
        assert!((out[1].score - 0.95).abs() < 1e-6);
    }

    #[test]
    fn agreement_outscores_a_single_signal() {
        let out = fuse(&[p(1), p(2)], &[p(1), p(3)], &FusionConfig::default(), 3);
        assert_eq!(out[0].id, 1);
        assert!((out[0].score - 1.0).abs() < 1e-6);
        let single = out.iter().find(|x| x.id == 2).map(|x| x.score).unwrap_or_default();
        assert!(out[0].score >= single);
    }

    #[test]
    fn result_count_follows_top_n() {
        let vector: Vec<ScoredPoint> = (0..8).map(p).collect();
        assert_eq!(fuse(&vector, &[], &FusionConfig::default(), 5).len(), 5);
        assert_eq!(fuse(&vector, &[], &FusionConfig::default(), 3).len(), 3);
        assert!(fuse(&[], &[], &FusionConfig::default(), 3).is_empty());
    }

    #[test]
    fn deep_positions_contribute_negatively_unless_clamped() {
        let vector: Vec<ScoredPoint> = (0..12).map(p).collect();
        let raw = fuse(&vector, &[], &FusionConfig { vector_weight: 1.0, ..FusionConfig::default() }, 12);
        let last = raw.iter().find(|x| x.id == 11).map(|x| x.score).unwrap_or_default();
        assert!((last - (-0.1)).abs() < 1e-5, "got {last}");

        let clamped = FusionConfig { vector_weight: 1.0, clamp_negative: true, ..FusionConfig::default() };
        let out = fuse(&vector, &[], &clamped, 12);
        assert!(out.iter().all(|x| x.score >= 0.0));
        // Clamped tail ties at zero and falls back to id order.
        assert_eq!(out[10..].iter().map(|x| x.id).collect::<Vec<_>>(), vec![10, 11]);
    }

    #[test]
    fn negative_keyword_tail_can_sink_a_vector_hit() {
        let keyword: Vec<ScoredPoint> = (100..111).map(p).chain(std::iter::once(p(5))).collect();
        let out = fuse(&[p(5)], &keyword, &half(), 20);
        let five = out.iter().find(|x| x.id == 5).map(|x| x.score).unwrap_or_default();
        assert!((five - (0.5 + (1.0 - 11.0 * 0.1) * 0.5)).abs() < 1e-5);
    }
}
