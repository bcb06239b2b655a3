//! Landmark hashing.
//!
//! Pairs each anchor peak with targets in a forward time zone and packs
//! `(anchor freq, target freq, time delta)` into a 64-bit hash. The packing
//! is bit-exact and shared by ingest and query; the two sides must agree or
//! the index is useless.

use uuid::Uuid;

use crate::config::EngineConfig;
use crate::fingerprint::peaks::Peak;
use crate::models::FingerprintHash;

/// Pack an anchor/target frequency pair and their frame delta into a hash.
///
/// Frequencies occupy 16 bits each given the window bound, the delta fits
/// 16 bits given the zone width; no masking is applied.
pub fn pack_hash(f_anchor: usize, f_target: usize, delta: usize) -> u64 {
    ((f_anchor as u64) << 32) | ((f_target as u64) << 16) | delta as u64
}

/// Recover `(f_anchor, f_target, delta)` from a packed hash.
pub fn unpack_hash(hash: u64) -> (usize, usize, usize) {
    (
        ((hash >> 32) & 0xFFFF) as usize,
        ((hash >> 16) & 0xFFFF) as usize,
        (hash & 0xFFFF) as usize,
    )
}

/// Generate landmark hashes from a peak list.
///
/// Peaks are sorted by time (stable, preserving detector emission order on
/// ties). Each anchor scans forward: targets with
/// `zone_start <= dt <= zone_start + zone_width` are hashed, at most
/// `max_pairs_per_anchor` per anchor, and the scan stops once the sorted
/// order carries it past the zone. The anchor's frame index becomes the
/// posting's anchor time.
pub fn generate_hashes(
    peaks: &[Peak],
    song_id: Option<Uuid>,
    config: &EngineConfig,
) -> Vec<FingerprintHash> {
    let mut peaks = peaks.to_vec();
    peaks.sort_by_key(|p| p.time);

    let zone_start = config.target_zone_start;
    let zone_end = config.target_zone_start + config.target_zone_width;

    let mut hashes = Vec::new();

    for (i, anchor) in peaks.iter().enumerate() {
        let mut pairs = 0;

        for target in &peaks[i + 1..] {
            if pairs >= config.max_pairs_per_anchor {
                break;
            }

            let delta = target.time - anchor.time;
            if delta < zone_start {
                continue;
            }
            if delta > zone_end {
                break;
            }

            hashes.push(FingerprintHash {
                hash: pack_hash(anchor.freq, target.freq, delta),
                anchor_time: anchor.time as u32,
                song_id,
            });
            pairs += 1;
        }
    }

    hashes
}
