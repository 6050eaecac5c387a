//! Channel model: per-attempt frame error probability.
//!
//! The transmit simulator asks the model one question per rate slot:
//! given the link SNR, the rate index and the payload length, what is
//! the probability that the frame is not received? Implementations must
//! be pure and deterministic in their inputs so that seeded runs
//! reproduce exactly.

use crate::phy::RATE_TABLE;

/// Frame error probability oracle.
pub trait ErrorModel {
    /// Probability in [0, 1] that a `len`-byte frame sent at
    /// `rate_idx` over a link with `snr_db` is lost.
    fn error_prob(&self, snr_db: f64, rate_idx: usize, len: usize) -> f64;
}

/// Default model: each rate has a minimum workable SNR; the per-bit
/// error probability follows a logistic curve around it and the frame
/// error rate compounds over the payload bits.
#[derive(Debug, Clone)]
pub struct SnrErrorModel {
    /// Minimum workable SNR in dB per rate index.
    required_snr_db: [f64; RATE_TABLE.len()],
    /// Logistic steepness in 1/dB.
    steepness: f64,
}

impl SnrErrorModel {
    /// SNR each rate needs to run near-clean, indexed like the rate
    /// table.
    const REQUIRED_SNR_DB: [f64; RATE_TABLE.len()] =
        [5.0, 6.0, 7.0, 9.0, 12.0, 16.0, 20.0, 21.0];

    fn bit_error_prob(&self, snr_db: f64, rate_idx: usize) -> f64 {
        let margin = snr_db - self.required_snr_db[rate_idx];
        1.0 / (1.0 + (self.steepness * margin).exp())
    }
}

impl Default for SnrErrorModel {
    fn default() -> Self {
        SnrErrorModel {
            required_snr_db: Self::REQUIRED_SNR_DB,
            steepness: 1.5,
        }
    }
}

impl ErrorModel for SnrErrorModel {
    fn error_prob(&self, snr_db: f64, rate_idx: usize, len: usize) -> f64 {
        if rate_idx >= RATE_TABLE.len() {
            return 1.0;
        }
        let p_bit = self.bit_error_prob(snr_db, rate_idx);
        let n_bits = (8 * len) as f64;
        let p_frame = 1.0 - (1.0 - p_bit).powf(n_bits);
        p_frame.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probabilities_are_bounded() {
        let model = SnrErrorModel::default();
        for rate_idx in 0..RATE_TABLE.len() {
            for snr in [-20.0, 0.0, 15.0, 60.0] {
                let p = model.error_prob(snr, rate_idx, 1500);
                assert!((0.0..=1.0).contains(&p), "p={p} at snr={snr} idx={rate_idx}");
            }
        }
    }

    #[test]
    fn test_higher_rates_fail_more() {
        let model = SnrErrorModel::default();
        let low = model.error_prob(15.0, 0, 500);
        let high = model.error_prob(15.0, 7, 500);
        assert!(high > low);
    }

    #[test]
    fn test_longer_frames_fail_more() {
        let model = SnrErrorModel::default();
        let short = model.error_prob(12.0, 3, 50);
        let long = model.error_prob(12.0, 3, 1500);
        assert!(long > short);
    }

    #[test]
    fn test_extreme_snr_saturates() {
        let model = SnrErrorModel::default();
        assert!(model.error_prob(60.0, 0, 100) < 1e-6);
        assert!(model.error_prob(-30.0, 7, 100) > 0.999);
    }

    #[test]
    fn test_deterministic() {
        let model = SnrErrorModel::default();
        assert_eq!(
            model.error_prob(15.0, 4, 700).to_bits(),
            model.error_prob(15.0, 4, 700).to_bits()
        );
    }
}
