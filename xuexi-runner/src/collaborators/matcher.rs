//! Perceptual-hash similarity

use super::{ContentFingerprint, Frame, Matcher};
use image::DynamicImage;
use image_hasher::{HashAlg, Hasher, HasherConfig};

/// Hash side length; the double-gradient hash carries about twice this
/// squared in bits
pub const HASH_SIZE: u32 = 16;

/// Matcher comparing double-gradient perceptual hashes
///
/// The fingerprint is the hash bytes, computed once per crop. Similarity is
/// `1 - hamming_distance / hash_bits`, so identical crops score 1.0 and
/// unrelated ones cluster around 0.5.
pub struct PerceptualMatcher {
    hasher: Hasher,
}

impl Default for PerceptualMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PerceptualMatcher {
    pub fn new() -> Self {
        let hasher = HasherConfig::new()
            .hash_alg(HashAlg::DoubleGradient)
            .hash_size(HASH_SIZE, HASH_SIZE)
            .to_hasher();
        Self { hasher }
    }
}

impl Matcher for PerceptualMatcher {
    fn fingerprint(&self, crop: &Frame) -> ContentFingerprint {
        let hash = self
            .hasher
            .hash_image(&DynamicImage::ImageRgb8(crop.clone()));
        ContentFingerprint::from_bytes(hash.as_bytes())
    }

    fn score(&self, candidate: &ContentFingerprint, reference: &ContentFingerprint) -> f32 {
        let (a, b) = (candidate.as_bytes(), reference.as_bytes());
        if a.is_empty() || a.len() != b.len() {
            return 0.0;
        }
        let bits = (a.len() * 8) as f32;
        let dist: u32 = a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum();
        (1.0 - dist as f32 / bits).clamp(0.0, 1.0)
    }
}
