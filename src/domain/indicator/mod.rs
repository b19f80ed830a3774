//! Moving-average lines.
//!
//! A [`Line`] is an arena of optional values indexed by bar position and
//! aligned 1:1 with the source series. `None` means "not available yet":
//! warm-up is a normal state, never an error.
//!
//! - [`wma`]: weighted moving average
//! - [`ema`]: exponential moving average
//! - [`hull`]: HMA / EHMA / THMA built from the two smoothers

pub mod ema;
pub mod hull;
pub mod wma;

use std::ops::Index;

/// Direction of a line between two bar indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slope {
    Rising,
    Falling,
    Flat,
}

impl Slope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Slope::Rising => "rising",
            Slope::Falling => "falling",
            Slope::Flat => "flat",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    values: Vec<Option<f64>>,
}

impl Line {
    pub fn new(values: Vec<Option<f64>>) -> Self {
        Self { values }
    }

    /// A line defined everywhere.
    pub fn from_values(values: &[f64]) -> Self {
        Self {
            values: values.iter().copied().map(Some).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, t: usize) -> Option<f64> {
        self.values.get(t).copied().flatten()
    }

    /// `line[t - k]`, undefined when `t < k`.
    pub fn lookback(&self, t: usize, k: usize) -> Option<f64> {
        t.checked_sub(k).and_then(|i| self.get(i))
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Index of the first defined value.
    pub fn defined_from(&self) -> Option<usize> {
        self.values.iter().position(Option::is_some)
    }

    /// Compare `line[t]` against `line[t - k]`.
    pub fn slope(&self, t: usize, k: usize) -> Option<Slope> {
        let now = self.get(t)?;
        let then = self.lookback(t, k)?;
        Some(if now > then {
            Slope::Rising
        } else if now < then {
            Slope::Falling
        } else {
            Slope::Flat
        })
    }

    /// `line[t] > line[t - k]`; false if either side is undefined.
    pub fn rising(&self, t: usize, k: usize) -> bool {
        self.slope(t, k) == Some(Slope::Rising)
    }

    /// `line[t] < line[t - k]`; false if either side is undefined.
    pub fn falling(&self, t: usize, k: usize) -> bool {
        self.slope(t, k) == Some(Slope::Falling)
    }

    /// Blank out everything before index `n`.
    pub fn suppress_before(mut self, n: usize) -> Self {
        for v in self.values.iter_mut().take(n) {
            *v = None;
        }
        self
    }

    /// Element-wise combination; undefined wherever any input is undefined.
    pub(crate) fn zip_with(lines: &[&Line], f: impl Fn(&[f64]) -> f64) -> Line {
        let len = lines.iter().map(|l| l.len()).min().unwrap_or(0);
        let mut scratch = Vec::with_capacity(lines.len());
        let values = (0..len)
            .map(|t| {
                scratch.clear();
                for line in lines {
                    scratch.push(line.get(t)?);
                }
                Some(f(&scratch))
            })
            .collect();
        Line { values }
    }
}

impl Index<usize> for Line {
    type Output = Option<f64>;

    fn index(&self, t: usize) -> &Self::Output {
        &self.values[t]
    }
}

impl FromIterator<Option<f64>> for Line {
    fn from_iter<I: IntoIterator<Item = Option<f64>>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Nearest-integer `sqrt(length)`, never below 1.
pub fn round_sqrt(length: usize) -> usize {
    ((length as f64).sqrt().round() as usize).max(1)
}

/// Window lengths below 1 are treated as 1.
pub(crate) fn window(length: usize) -> usize {
    length.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_sqrt_rounds_to_nearest() {
        assert_eq!(round_sqrt(0), 1);
        assert_eq!(round_sqrt(1), 1);
        assert_eq!(round_sqrt(2), 1);
        assert_eq!(round_sqrt(3), 2);
        assert_eq!(round_sqrt(6), 2);
        assert_eq!(round_sqrt(7), 3);
        assert_eq!(round_sqrt(48), 7);
        assert_eq!(round_sqrt(1000), 32);
    }

    #[test]
    fn slope_with_offset() {
        let line = Line::new(vec![None, Some(1.0), Some(3.0), Some(2.0)]);
        assert_eq!(line.slope(2, 1), Some(Slope::Rising));
        assert_eq!(line.slope(3, 1), Some(Slope::Falling));
        assert_eq!(line.slope(3, 2), Some(Slope::Rising));
        assert_eq!(line.slope(2, 2), None);
        assert_eq!(line.slope(1, 5), None);
    }

    #[test]
    fn rising_is_false_when_undefined() {
        let line = Line::new(vec![None, Some(2.0)]);
        assert!(!line.rising(1, 1));
        assert!(!line.falling(1, 1));
    }

    #[test]
    fn flat_is_neither_rising_nor_falling() {
        let line = Line::from_values(&[5.0, 5.0]);
        assert_eq!(line.slope(1, 1), Some(Slope::Flat));
        assert!(!line.rising(1, 1));
        assert!(!line.falling(1, 1));
    }

    #[test]
    fn suppress_before_blanks_prefix() {
        let line = Line::from_values(&[1.0, 2.0, 3.0]).suppress_before(2);
        assert_eq!(line.defined_from(), Some(2));
        assert_eq!(line[2], Some(3.0));
    }

    #[test]
    fn zip_with_propagates_undefined() {
        let a = Line::new(vec![None, Some(2.0), Some(4.0)]);
        let b = Line::from_values(&[1.0, 1.0, 1.0]);
        let diff = Line::zip_with(&[&a, &b], |v| v[0] - v[1]);
        assert_eq!(diff.values(), &[None, Some(1.0), Some(3.0)]);
    }
}
