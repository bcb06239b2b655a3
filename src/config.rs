//! Engine configuration.
//!
//! Every behavior-affecting constant lives in one immutable value threaded
//! through the pipeline. Changing any of these invalidates stored postings.

/// Tuning parameters for fingerprinting and matching.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Input sample rate in Hz.
    pub sample_rate: u32,
    /// FFT window length in samples. Must be a power of two.
    pub window_size: usize,
    /// Hop between consecutive frames in samples.
    pub hop_size: usize,
    /// Frequency band edges in Hz. N edges define N-1 peak-search bands;
    /// bins outside the outermost edges are ignored.
    pub frequency_bands: Vec<u32>,
    /// Radius (frames and bins) of the local-maximum neighborhood.
    pub peak_neighborhood: usize,
    /// Absolute magnitude a spectral point must exceed to count as a peak.
    pub peak_threshold: f64,
    /// First frame after the anchor that belongs to the target zone.
    pub target_zone_start: usize,
    /// Width of the target zone in frames.
    pub target_zone_width: usize,
    /// Cap on hashes emitted per anchor peak.
    pub max_pairs_per_anchor: usize,
    /// Minimum matching postings before a song becomes a candidate.
    pub min_matching_hashes: usize,
    /// Minimum confidence for a candidate to survive ranking.
    pub min_confidence: f64,
    /// Offset-histogram bins within this distance of the dominant bin count
    /// as coherent.
    pub time_delta_tolerance: i64,
    /// How many ranked matches the surface reports.
    pub top_matches: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sample_rate: 44_100,
            window_size: 4096,
            hop_size: 1024,
            frequency_bands: vec![40, 80, 120, 180, 300, 500, 800, 1200, 2000, 3000, 5000],
            peak_neighborhood: 10,
            peak_threshold: 0.5,
            target_zone_start: 1,
            target_zone_width: 10,
            max_pairs_per_anchor: 5,
            min_matching_hashes: 5,
            min_confidence: 0.1,
            time_delta_tolerance: 2,
            top_matches: 5,
        }
    }
}

impl EngineConfig {
    /// Convert a frequency in Hz to its FFT bin index.
    pub fn freq_to_bin(&self, freq: u32) -> usize {
        (freq as f64 * self.window_size as f64 / self.sample_rate as f64).round() as usize
    }

    /// Convert an FFT bin index back to Hz.
    pub fn bin_to_freq(&self, bin: usize) -> f64 {
        bin as f64 * self.sample_rate as f64 / self.window_size as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_hop_is_quarter_window() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.hop_size, cfg.window_size / 4);
    }

    #[test]
    fn band_edges_map_to_expected_bins() {
        let cfg = EngineConfig::default();
        // round(40 * 4096 / 44100) = 4, round(5000 * 4096 / 44100) = 464
        assert_eq!(cfg.freq_to_bin(40), 4);
        assert_eq!(cfg.freq_to_bin(5000), 464);
    }

    #[test]
    fn bin_frequency_roundtrip_is_close() {
        let cfg = EngineConfig::default();
        let bin = cfg.freq_to_bin(1200);
        let hz = cfg.bin_to_freq(bin);
        assert!((hz - 1200.0).abs() < cfg.sample_rate as f64 / cfg.window_size as f64);
    }
}
