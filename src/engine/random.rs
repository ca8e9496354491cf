use rand::Rng;
use rand::rngs::SmallRng;

/// Source of uniform random choices for pattern selection and target
/// generation. Implemented for `SmallRng`; tests supply scripted sources.
pub trait RandomSource {
    /// Uniform index in `0..len`. `len` must be non-zero.
    fn next_index(&mut self, len: usize) -> usize;

    /// Uniform integer in `lo..=hi`.
    fn range_inclusive(&mut self, lo: u32, hi: u32) -> u32;

    /// Uniform float in `[0, 1)`.
    fn next_unit(&mut self) -> f64;

    /// True with probability `p`. Certain outcomes (p <= 0 or p >= 1) do not
    /// consume randomness.
    fn chance(&mut self, p: f64) -> bool {
        if p >= 1.0 {
            true
        } else if p <= 0.0 {
            false
        } else {
            self.next_unit() < p
        }
    }
}

impl RandomSource for SmallRng {
    fn next_index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0);
        self.gen_range(0..len)
    }

    fn range_inclusive(&mut self, lo: u32, hi: u32) -> u32 {
        self.gen_range(lo..=hi)
    }

    fn next_unit(&mut self) -> f64 {
        self.r#gen::<f64>()
    }
}

/// Replays a fixed script of values, cycling when exhausted. Indices are
/// reduced modulo the requested length.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRandom {
    values: Vec<u32>,
    units: Vec<f64>,
    cursor: usize,
    unit_cursor: usize,
}

impl ScriptedRandom {
    pub fn new(values: Vec<u32>) -> Self {
        Self {
            values,
            units: Vec::new(),
            cursor: 0,
            unit_cursor: 0,
        }
    }

    pub fn with_units(mut self, units: Vec<f64>) -> Self {
        self.units = units;
        self
    }

    fn next_value(&mut self) -> u32 {
        if self.values.is_empty() {
            return 0;
        }
        let v = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        v
    }
}

impl RandomSource for ScriptedRandom {
    fn next_index(&mut self, len: usize) -> usize {
        self.next_value() as usize % len.max(1)
    }

    fn range_inclusive(&mut self, lo: u32, hi: u32) -> u32 {
        let span = hi.saturating_sub(lo) + 1;
        lo + self.next_value() % span
    }

    fn next_unit(&mut self) -> f64 {
        if self.units.is_empty() {
            return 0.0;
        }
        let v = self.units[self.unit_cursor % self.units.len()];
        self.unit_cursor += 1;
        v
    }
}
