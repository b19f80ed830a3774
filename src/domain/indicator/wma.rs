//! Weighted Moving Average.
//!
//! O(n) sliding window using the Diophantine technique.
//! WMA(n) = (1*P[i-n+1] + 2*P[i-n+2] + ... + n*P[i]) / (n*(n+1)/2)
//! Warmup: a value needs n consecutive defined samples, so the first (n-1)
//! defined inputs produce nothing. An undefined input restarts the warmup.

use super::{Line, window};

/// WMA of a single window, oldest sample first.
pub fn weighted_average(samples: &[Option<f64>]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len();
    let divisor = (n * (n + 1)) as f64 / 2.0;
    let mut weighted_sum = 0.0;
    for (i, sample) in samples.iter().enumerate() {
        weighted_sum += (i + 1) as f64 * (*sample)?;
    }
    Some(weighted_sum / divisor)
}

pub fn calculate_wma(src: &[Option<f64>], length: usize) -> Line {
    let period = window(length);
    let divisor = (period * (period + 1)) as f64 / 2.0;
    let mut values = Vec::with_capacity(src.len());
    let mut run = 0usize;
    let mut weighted_sum: f64 = 0.0;
    let mut window_sum: f64 = 0.0;

    for (i, sample) in src.iter().enumerate() {
        let Some(price) = *sample else {
            run = 0;
            weighted_sum = 0.0;
            window_sum = 0.0;
            values.push(None);
            continue;
        };

        if run < period {
            run += 1;
            weighted_sum += run as f64 * price;
            window_sum += price;
        } else {
            // run >= period guarantees the sample leaving the window is defined
            let oldest = src[i - period].unwrap_or(0.0);
            weighted_sum += period as f64 * price - window_sum;
            window_sum += price - oldest;
        }

        values.push((run >= period).then(|| weighted_sum / divisor));
    }

    Line::new(values)
}
