use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Randomness for every game. Engines never own one; callers pass it in
/// and the engines sample through `rand` on top of [`RandomSource::rng`].
pub trait RandomSource: Send {
    fn rng(&mut self) -> &mut dyn RngCore;

    /// A value in `[0, 1)`.
    fn draw_uniform(&mut self) -> f64 {
        self.rng().gen::<f64>()
    }

    /// A value in `0..len`. `len` must be non-zero.
    fn draw_index(&mut self, len: usize) -> usize {
        self.rng().gen_range(0..len)
    }
}

/// Reproducible stream for replays and tests.
#[derive(Debug, Clone)]
pub struct SeededRng {
    inner: StdRng,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRng {
    fn rng(&mut self) -> &mut dyn RngCore {
        &mut self.inner
    }
}

/// Seeded from the operating system.
#[derive(Debug, Clone)]
pub struct SystemRng {
    inner: StdRng,
}

impl SystemRng {
    pub fn new() -> Self {
        Self {
            inner: StdRng::from_entropy(),
        }
    }
}

impl Default for SystemRng {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for SystemRng {
    fn rng(&mut self) -> &mut dyn RngCore {
        &mut self.inner
    }
}

/// Picks an index with probability proportional to its weight. Returns
/// `None` when the weights cannot form a distribution (empty, negative,
/// or all zero).
pub fn weighted_index(rng: &mut dyn RandomSource, weights: &[f64]) -> Option<usize> {
    let dist = WeightedIndex::<f64>::new(weights).ok()?;
    Some(dist.sample(rng.rng()))
}

pub fn weighted_choice<'a, T>(
    rng: &mut dyn RandomSource,
    items: &'a [T],
    weights: &[f64],
) -> Option<&'a T> {
    if items.len() != weights.len() {
        return None;
    }
    weighted_index(rng, weights).map(|i| &items[i])
}

/// Replays fixed uniform draws, then falls back to a seeded stream.
///
/// Each scripted fraction is encoded so that `rand`'s float sampling
/// (both `gen::<f64>()` and uniform ranges) reads it back unchanged.
#[cfg(test)]
pub(crate) struct ScriptedRng {
    draws: std::collections::VecDeque<f64>,
    fallback: StdRng,
}

#[cfg(test)]
impl ScriptedRng {
    pub(crate) fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        Self {
            draws: draws.into_iter().collect(),
            fallback: StdRng::seed_from_u64(7),
        }
    }
}

#[cfg(test)]
impl RngCore for ScriptedRng {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        match self.draws.pop_front() {
            Some(fraction) => ((fraction * (1u64 << 53) as f64) as u64) << 11,
            None => self.fallback.next_u64(),
        }
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
impl RandomSource for ScriptedRng {
    fn rng(&mut self) -> &mut dyn RngCore {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_is_deterministic() {
        let mut a = SeededRng::new(42);
        let mut b = SeededRng::new(42);
        for _ in 0..32 {
            let x = a.draw_uniform();
            assert_eq!(x, b.draw_uniform());
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn test_scripted_draws_read_back() {
        let mut rng = ScriptedRng::new([0.0, 0.25, 0.7]);
        assert_eq!(rng.draw_uniform(), 0.0);
        assert_eq!(rng.draw_uniform(), 0.25);
        assert!((rng.draw_uniform() - 0.7).abs() < 1e-12);
        assert!((0.0..1.0).contains(&rng.draw_uniform()));
    }

    #[test]
    fn test_weighted_index_boundaries() {
        let weights = [1.0, 0.0, 3.0];
        assert_eq!(weighted_index(&mut ScriptedRng::new([0.0]), &weights), Some(0));
        assert_eq!(weighted_index(&mut ScriptedRng::new([0.2]), &weights), Some(0));
        assert_eq!(weighted_index(&mut ScriptedRng::new([0.3]), &weights), Some(2));
        assert_eq!(weighted_index(&mut ScriptedRng::new([0.999]), &weights), Some(2));
        assert_eq!(weighted_index(&mut ScriptedRng::new([0.5]), &[0.0, 0.0]), None);
        assert_eq!(weighted_index(&mut ScriptedRng::new([0.5]), &[1.0, -1.0]), None);
        assert_eq!(weighted_index(&mut ScriptedRng::new([0.5]), &[]), None);
    }

    #[test]
    fn test_weighted_choice_follows_weights() {
        let mut rng = SeededRng::new(1);
        let items = ['a', 'b'];
        let mut hits = 0;
        for _ in 0..10_000 {
            if weighted_choice(&mut rng, &items, &[3.0, 1.0]) == Some(&'a') {
                hits += 1;
            }
        }
        assert!((7_000..8_000).contains(&hits), "hits = {}", hits);
        assert_eq!(weighted_choice(&mut rng, &items, &[1.0]), None);
    }

    #[test]
    fn test_draw_index_stays_in_range() {
        let mut rng = SeededRng::new(4);
        let mut seen = [false; 6];
        for _ in 0..600 {
            seen[rng.draw_index(6)] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
