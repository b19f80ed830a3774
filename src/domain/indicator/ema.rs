//! Exponential Moving Average.
//!
//! k = 2/(n+1), seeded with the first available sample, then
//! EMA[i] = P[i]*k + EMA[i-1]*(1-k). No warmup gap: the line is defined from
//! the first defined input. An undefined input re-seeds on the next sample.

use super::{Line, window};

pub fn smoothing_factor(length: usize) -> f64 {
    2.0 / (window(length) as f64 + 1.0)
}

pub fn calculate_ema(src: &[Option<f64>], length: usize) -> Line {
    let k = smoothing_factor(length);
    let mut ema: Option<f64> = None;

    src.iter()
        .map(|sample| {
            ema = match (*sample, ema) {
                (None, _) => None,
                (Some(price), None) => Some(price),
                (Some(price), Some(prev)) => Some(price * k + prev * (1.0 - k)),
            };
            ema
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn src(prices: &[f64]) -> Vec<Option<f64>> {
        prices.iter().copied().map(Some).collect()
    }

    #[test]
    fn ema_defined_from_first_point() {
        let line = calculate_ema(&src(&[10.0, 20.0, 30.0]), 3);
        assert_eq!(line.defined_from(), Some(0));
        assert_relative_eq!(line[0].unwrap(), 10.0);
    }

    #[test]
    fn ema_recursive_calculation() {
        let line = calculate_ema(&src(&[10.0, 20.0, 30.0]), 3);
        let k = 2.0 / 4.0;
        let e1 = 20.0 * k + 10.0 * (1.0 - k);
        let e2 = 30.0 * k + e1 * (1.0 - k);
        assert_relative_eq!(line[1].unwrap(), e1);
        assert_relative_eq!(line[2].unwrap(), e2);
    }

    #[test]
    fn ema_period_1_tracks_input() {
        let line = calculate_ema(&src(&[10.0, 20.0, 30.0]), 1);
        assert_eq!(line.values(), &[Some(10.0), Some(20.0), Some(30.0)]);
    }

    #[test]
    fn ema_seeds_after_leading_undefined() {
        let line = calculate_ema(&[None, Some(5.0), Some(7.0)], 3);
        assert_eq!(line[0], None);
        assert_relative_eq!(line[1].unwrap(), 5.0);
        assert_relative_eq!(line[2].unwrap(), 6.0);
    }

    #[test]
    fn ema_equal_prices() {
        let line = calculate_ema(&src(&[100.0; 5]), 3);
        for v in line.values().iter().flatten() {
            assert_relative_eq!(*v, 100.0);
        }
    }

    #[test]
    fn ema_smoothing_factor() {
        assert_relative_eq!(smoothing_factor(10), 2.0 / 11.0);
        assert_relative_eq!(smoothing_factor(0), 1.0);
    }
}
