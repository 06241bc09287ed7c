//! Synthetic values for the exported metrics.

use rand::{
    rngs::ThreadRng,
    Rng,
};

/// Source of the synthetic metric values, one draw per metric per
/// update tick.
pub struct ValueGenerator {
    rng: ThreadRng,
}

impl ValueGenerator {
    /// Creates a generator backed by the thread local rng.
    pub fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Next gauge value, uniformly distributed in `[0, 100)`.
    pub fn next_gauge_value(&mut self) -> f64 {
        self.rng.gen::<f64>() * 100.0
    }

    /// Next counter increment, uniformly distributed in `0..=5`.
    pub fn next_counter_delta(&mut self) -> u64 {
        self.rng.gen_range(0..=5)
    }
}

impl Default for ValueGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::ValueGenerator;

    #[test]
    fn gauge_values_stay_in_domain() {
        let mut generator = ValueGenerator::new();

        for _ in 0..10_000 {
            let value = generator.next_gauge_value();
            assert!((0.0..100.0).contains(&value), "out of domain: {value}");
        }
    }

    #[test]
    fn counter_deltas_cover_inclusive_range() {
        let mut generator = ValueGenerator::new();

        let mut seen = [false; 6];

        for _ in 0..10_000 {
            let delta = generator.next_counter_delta();
            assert!(delta <= 5, "out of domain: {delta}");
            seen[delta as usize] = true;
        }

        // Ten thousand draws miss one of six buckets with probability
        // (5/6)^10000, which never happens in practice.
        assert_eq!(seen, [true; 6]);
    }
}
