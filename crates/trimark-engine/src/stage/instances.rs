use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Capacity granted on the first growth.
const INITIAL_CAPACITY: usize = 128;

/// Capacity multiplier per growth step.
const GROWTH_FACTOR: usize = 4;

/// One triangle's randomized animation parameters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Instance {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub scalar: f32,
    pub scalar_offset: f32,
}

impl Instance {
    fn random(rng: &mut StdRng) -> Self {
        Self {
            scale: rng.gen_range(0.2..0.4),
            offset_x: rng.gen_range(-0.9..0.9),
            offset_y: rng.gen_range(-0.9..0.9),
            scalar: rng.gen_range(0.5..2.0),
            scalar_offset: rng.gen_range(0.0..10.0),
        }
    }
}

/// CPU-side triangle store: live count, capacity, per-instance parameters.
///
/// Capacity never shrinks; once the live count first exceeds it, it jumps to
/// 128 and then quadruples until it covers the live count, so a count that
/// oscillates downward never causes reallocation churn.
///
/// Every growth re-rolls all parameters at the new capacity; surviving
/// instances are not preserved.
pub struct InstanceSet {
    live: usize,
    capacity: usize,
    items: Vec<Instance>,
    generation: u64,
    rng: StdRng,
}

impl InstanceSet {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic store for tests and reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            live: 0,
            capacity: 0,
            items: Vec::new(),
            generation: 0,
            rng,
        }
    }

    /// Current live triangle count.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Allocated capacity (always ≥ the live count).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Monotonic counter bumped on every reallocation.
    ///
    /// GPU-side storage re-syncs when the generation it mirrors falls behind.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Parameters for every allocated slot (`len() == capacity()`).
    pub fn items(&self) -> &[Instance] {
        &self.items
    }

    /// Adjusts the live count by `delta`, clamped at zero, growing capacity
    /// when the new count exceeds it. Returns true if a reallocation
    /// happened.
    pub fn tune(&mut self, delta: i64) -> bool {
        if delta == 0 {
            return false;
        }

        self.live = (self.live as i64 + delta).max(0) as usize;

        self.reset_if_necessary()
    }

    fn reset_if_necessary(&mut self) -> bool {
        if self.live <= self.capacity {
            return false;
        }

        if self.capacity == 0 {
            self.capacity = INITIAL_CAPACITY;
        }
        while self.live > self.capacity {
            self.capacity *= GROWTH_FACTOR;
        }

        let rng = &mut self.rng;
        self.items.clear();
        self.items.resize_with(self.capacity, || Instance::random(rng));
        self.generation += 1;

        true
    }
}

impl Default for InstanceSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> InstanceSet {
        InstanceSet::with_seed(7)
    }

    // ── growth law ────────────────────────────────────────────────────────

    #[test]
    fn fresh_set_is_empty() {
        let s = set();
        assert_eq!(s.live(), 0);
        assert_eq!(s.capacity(), 0);
        assert_eq!(s.generation(), 0);
        assert!(s.items().is_empty());
    }

    #[test]
    fn first_growth_starts_at_128() {
        let mut s = set();
        assert!(s.tune(1));
        assert_eq!(s.live(), 1);
        assert_eq!(s.capacity(), 128);
        assert_eq!(s.items().len(), 128);
    }

    #[test]
    fn growth_quadruples_until_covered() {
        // tune(500) from fresh goes 0 to 128 to 512 in a single
        // reallocation.
        let mut s = set();
        assert!(s.tune(500));
        assert_eq!(s.live(), 500);
        assert_eq!(s.capacity(), 512);
        assert_eq!(s.generation(), 1);
    }

    #[test]
    fn large_jump_lands_on_power_of_four_step() {
        let mut s = set();
        s.tune(100_000);
        // 128 * 4^5 = 131072 is the first step covering 100k.
        assert_eq!(s.capacity(), 131_072);
        assert_eq!(s.generation(), 1);
    }

    #[test]
    fn capacity_is_monotonic_and_covers_live() {
        let mut s = set();
        let mut max_capacity = 0;
        for delta in [300, -250, 4_000, -4_050, 1, 129, -10_000, 600] {
            s.tune(delta);
            assert!(s.capacity() >= s.live());
            assert!(s.capacity() >= max_capacity, "capacity shrank");
            max_capacity = s.capacity();
        }
    }

    // ── clamping ──────────────────────────────────────────────────────────

    #[test]
    fn negative_delta_clamps_to_zero_without_reallocation() {
        let mut s = set();
        s.tune(500);
        let generation = s.generation();

        assert!(!s.tune(-1000));
        assert_eq!(s.live(), 0);
        assert_eq!(s.capacity(), 512);
        assert_eq!(s.generation(), generation);
    }

    #[test]
    fn zero_delta_is_a_no_op() {
        let mut s = set();
        s.tune(500);
        let before = s.generation();
        assert!(!s.tune(0));
        assert_eq!(s.live(), 500);
        assert_eq!(s.generation(), before);
    }

    #[test]
    fn shrink_then_regrow_within_capacity_does_not_reallocate() {
        let mut s = set();
        s.tune(500);
        s.tune(-400);
        assert!(!s.tune(300));
        assert_eq!(s.live(), 400);
        assert_eq!(s.capacity(), 512);
        assert_eq!(s.generation(), 1);
    }

    // ── randomization ─────────────────────────────────────────────────────

    #[test]
    fn parameters_stay_in_range() {
        let mut s = set();
        s.tune(2_000);
        for item in s.items() {
            assert!((0.2..0.4).contains(&item.scale));
            assert!((-0.9..0.9).contains(&item.offset_x));
            assert!((-0.9..0.9).contains(&item.offset_y));
            assert!((0.5..2.0).contains(&item.scalar));
            assert!((0.0..10.0).contains(&item.scalar_offset));
        }
    }

    #[test]
    fn growth_rerolls_every_instance() {
        let mut s = set();
        s.tune(100);
        let first = s.items()[0];
        s.tune(10_000);
        // Parameters are re-randomized wholesale on growth; the odds of the
        // first slot reproducing all five values are negligible.
        assert_ne!(s.items()[0], first);
    }
}
