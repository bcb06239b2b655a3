//! Time-coherent matching.
//!
//! A genuine match shifts every anchor pair by the same offset between the
//! query clock and the song clock, while spurious hash collisions scatter
//! uniformly. Scoring therefore histograms `song_time - query_time` over
//! the matched postings per candidate and measures the mass concentrated
//! around the dominant offset.

use std::collections::HashMap;

use uuid::Uuid;

use crate::config::EngineConfig;
use crate::models::{FingerprintHash, Posting};

/// A scored candidate, before song metadata is resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub song_id: Uuid,
    pub confidence: f64,
    pub match_count: usize,
    /// The winning offset in frames (song time minus query time).
    pub offset: i64,
}

/// Rank candidate songs by temporal coherence with the query.
///
/// `matches_by_song` is the posting store's lookup result for the query's
/// hash set. Candidates with fewer than `min_matching_hashes` postings are
/// skipped; survivors are scored, filtered at `min_confidence` and sorted
/// by confidence descending (ties broken by match count, then song id, so
/// rankings are deterministic).
pub fn rank_candidates(
    query: &[FingerprintHash],
    matches_by_song: &HashMap<Uuid, Vec<Posting>>,
    config: &EngineConfig,
) -> Vec<Match> {
    if query.is_empty() {
        return Vec::new();
    }

    // Query hash -> anchor time. A hash repeating inside the query keeps
    // its last occurrence; see the release notes on repetitive audio.
    let query_times: HashMap<u64, u32> = query.iter().map(|f| (f.hash, f.anchor_time)).collect();

    let mut results = Vec::new();

    for (&song_id, postings) in matches_by_song {
        if postings.len() < config.min_matching_hashes {
            continue;
        }

        let mut histogram: HashMap<i64, usize> = HashMap::new();
        for posting in postings {
            if let Some(&tq) = query_times.get(&posting.hash) {
                let delta = posting.anchor_time as i64 - tq as i64;
                *histogram.entry(delta).or_insert(0) += 1;
            }
        }
        if histogram.is_empty() {
            continue;
        }

        // Dominant offset; ties resolve to the smallest delta.
        let (&best_delta, _) = histogram
            .iter()
            .max_by(|(da, ca), (db, cb)| ca.cmp(cb).then(db.cmp(da)))
            .expect("histogram is non-empty");

        let coherent: usize = histogram
            .iter()
            .filter(|(&delta, _)| (delta - best_delta).abs() <= config.time_delta_tolerance)
            .map(|(_, &count)| count)
            .sum();

        let confidence = (coherent as f64 / query.len() as f64).min(1.0);
        if confidence >= config.min_confidence {
            results.push(Match {
                song_id,
                confidence,
                match_count: postings.len(),
                offset: best_delta,
            });
        }
    }

    results.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then(b.match_count.cmp(&a.match_count))
            .then(a.song_id.cmp(&b.song_id))
    });

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_hash(hash: u64, anchor_time: u32) -> FingerprintHash {
        FingerprintHash { hash, anchor_time, song_id: None }
    }

    fn posting(hash: u64, anchor_time: u32) -> Posting {
        Posting { hash, anchor_time }
    }

    /// Ten query hashes at times 0..10, and a song whose postings replay
    /// `aligned` of them shifted by `offset` frames.
    fn aligned_store(song: Uuid, aligned: usize, offset: u32) -> (Vec<FingerprintHash>, HashMap<Uuid, Vec<Posting>>) {
        let query: Vec<FingerprintHash> = (0..10).map(|i| query_hash(100 + i, i as u32)).collect();
        let postings: Vec<Posting> = query[..aligned]
            .iter()
            .map(|q| posting(q.hash, q.anchor_time + offset))
            .collect();
        let mut by_song = HashMap::new();
        by_song.insert(song, postings);
        (query, by_song)
    }

    #[test]
    fn empty_query_yields_no_candidates() {
        let cfg = EngineConfig::default();
        let by_song = HashMap::new();
        assert!(rank_candidates(&[], &by_song, &cfg).is_empty());
    }

    #[test]
    fn coherent_offsets_score_and_report_the_shift() {
        let cfg = EngineConfig::default();
        let song = Uuid::new_v4();
        let (query, by_song) = aligned_store(song, 8, 50);

        let ranked = rank_candidates(&query, &by_song, &cfg);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].song_id, song);
        assert_eq!(ranked[0].offset, 50);
        assert_eq!(ranked[0].match_count, 8);
        assert!((ranked[0].confidence - 0.8).abs() < 1e-12);
    }

    #[test]
    fn too_few_matches_is_not_a_candidate() {
        let cfg = EngineConfig::default();
        let song = Uuid::new_v4();
        let (query, by_song) = aligned_store(song, 4, 50); // below min_matching_hashes

        assert!(rank_candidates(&query, &by_song, &cfg).is_empty());
    }

    #[test]
    fn incoherent_offsets_fall_below_the_floor() {
        let cfg = EngineConfig::default();
        let song = Uuid::new_v4();
        let query: Vec<FingerprintHash> = (0..50).map(|i| query_hash(100 + i, i as u32)).collect();
        // five matches, each at a wildly different offset
        let postings: Vec<Posting> = (0..5)
            .map(|i| posting(100 + i, (i as u32) * 97 + 500))
            .collect();
        let mut by_song = HashMap::new();
        by_song.insert(song, postings);

        // 1/50 coherent mass is under min_confidence
        assert!(rank_candidates(&query, &by_song, &cfg).is_empty());
    }

    #[test]
    fn tolerance_absorbs_quantization_jitter() {
        let cfg = EngineConfig::default();
        let song = Uuid::new_v4();
        let query: Vec<FingerprintHash> = (0..10).map(|i| query_hash(100 + i, i as u32)).collect();
        // offsets 48..52: all within +-2 of the dominant bin at 50
        let jitter = [0i64, 0, 0, 0, 1, 1, 2, 2, -2, -1];
        let postings: Vec<Posting> = query
            .iter()
            .zip(jitter)
            .map(|(q, j)| posting(q.hash, (q.anchor_time as i64 + 50 + j) as u32))
            .collect();
        let mut by_song = HashMap::new();
        by_song.insert(song, postings);

        let ranked = rank_candidates(&query, &by_song, &cfg);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].offset, 50);
        assert!((ranked[0].confidence - 1.0).abs() < 1e-12);
    }

    #[test]
    fn dominant_offset_ties_resolve_to_smallest_delta() {
        let cfg = EngineConfig {
            min_matching_hashes: 1,
            time_delta_tolerance: 0,
            min_confidence: 0.0,
            ..EngineConfig::default()
        };
        let song = Uuid::new_v4();
        let query: Vec<FingerprintHash> = (0..4).map(|i| query_hash(100 + i, 0)).collect();
        // two postings at delta 30, two at delta 7
        let postings = vec![posting(100, 30), posting(101, 30), posting(102, 7), posting(103, 7)];
        let mut by_song = HashMap::new();
        by_song.insert(song, postings);

        let ranked = rank_candidates(&query, &by_song, &cfg);
        assert_eq!(ranked[0].offset, 7);
    }

    #[test]
    fn duplicate_postings_cannot_push_confidence_past_one() {
        let cfg = EngineConfig::default();
        let song = Uuid::new_v4();
        let query: Vec<FingerprintHash> = (0..6).map(|i| query_hash(100 + i, i as u32)).collect();
        // every posting stored three times
        let mut postings = Vec::new();
        for q in &query {
            for _ in 0..3 {
                postings.push(posting(q.hash, q.anchor_time + 20));
            }
        }
        let mut by_song = HashMap::new();
        by_song.insert(song, postings);

        let ranked = rank_candidates(&query, &by_song, &cfg);
        assert_eq!(ranked.len(), 1);
        assert!((ranked[0].confidence - 1.0).abs() < 1e-12);
    }

    #[test]
    fn candidates_sort_by_confidence_descending() {
        let cfg = EngineConfig::default();
        let strong = Uuid::new_v4();
        let weak = Uuid::new_v4();
        let query: Vec<FingerprintHash> = (0..10).map(|i| query_hash(100 + i, i as u32)).collect();

        let mut by_song = HashMap::new();
        by_song.insert(
            strong,
            query.iter().map(|q| posting(q.hash, q.anchor_time + 5)).collect::<Vec<_>>(),
        );
        by_song.insert(
            weak,
            query[..5]
                .iter()
                .map(|q| posting(q.hash, q.anchor_time + 90))
                .collect::<Vec<_>>(),
        );

        let ranked = rank_candidates(&query, &by_song, &cfg);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].song_id, strong);
        assert_eq!(ranked[1].song_id, weak);
        assert!(ranked[0].confidence > ranked[1].confidence);
    }

    #[test]
    fn repeated_query_hash_keeps_last_occurrence() {
        let cfg = EngineConfig {
            min_matching_hashes: 1,
            min_confidence: 0.0,
            ..EngineConfig::default()
        };
        let song = Uuid::new_v4();
        // hash 100 occurs at query times 3 and 9; the map keeps 9
        let query = vec![query_hash(100, 3), query_hash(100, 9)];
        let postings = vec![posting(100, 59)];
        let mut by_song = HashMap::new();
        by_song.insert(song, postings);

        let ranked = rank_candidates(&query, &by_song, &cfg);
        assert_eq!(ranked[0].offset, 50);
    }
}
