//! Time units and randomized gestures
//!
//! Stage delays are expressed in abstract units (one second in production).
//! Tests shrink the unit to a millisecond so a full dwell target runs fast.

use crate::collaborators::Point;
use rand::Rng;
use std::time::Duration;

/// Converts stage time units into wall-clock sleeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacer {
    unit: Duration,
}

impl Pacer {
    pub fn new(unit: Duration) -> Self {
        Self { unit }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn unit(&self) -> Duration {
        self.unit
    }

    pub fn duration(&self, units: f64) -> Duration {
        self.unit.mul_f64(units.max(0.0))
    }

    pub async fn sleep(&self, units: f64) {
        tokio::time::sleep(self.duration(units)).await;
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

/// One randomized swipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollGesture {
    pub from: Point,
    pub to: Point,
    pub duration_ms: u32,
}

impl ScrollGesture {
    /// Feed scroll: lower-middle of the screen up to the upper third
    pub fn feed<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            from: Point::new(rng.gen_range(200..=300), rng.gen_range(900..=1000)),
            to: Point::new(rng.gen_range(500..=600), rng.gen_range(300..=400)),
            duration_ms: rng.gen_range(1000..=1500),
        }
    }

    /// Longer scroll used on the points page and to reveal the hint link
    pub fn long<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            from: Point::new(rng.gen_range(200..=300), rng.gen_range(1000..=1100)),
            to: Point::new(rng.gen_range(500..=600), rng.gen_range(100..=200)),
            duration_ms: rng.gen_range(1000..=1500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_pacer_scales_units() {
        let pacer = Pacer::from_millis(10);
        assert_eq!(pacer.duration(3.0), Duration::from_millis(30));
        assert_eq!(pacer.duration(0.5), Duration::from_millis(5));
        assert_eq!(pacer.duration(-1.0), Duration::ZERO);
    }

    #[test]
    fn test_feed_gesture_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let g = ScrollGesture::feed(&mut rng);
            assert!((200..=300).contains(&g.from.x));
            assert!((900..=1000).contains(&g.from.y));
            assert!((500..=600).contains(&g.to.x));
            assert!((300..=400).contains(&g.to.y));
            assert!((1000..=1500).contains(&g.duration_ms));
        }
    }

    #[test]
    fn test_long_gesture_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let g = ScrollGesture::long(&mut rng);
            assert!((1000..=1100).contains(&g.from.y));
            assert!((100..=200).contains(&g.to.y));
        }
    }
}
