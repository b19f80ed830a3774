//! Hull-style moving averages.
//!
//! HMA(L)  = WMA(2*WMA(src, L/2) - WMA(src, L), round(sqrt(L)))
//! EHMA(L) = EMA(2*EMA(src, L/2) - EMA(src, L), round(sqrt(L)))
//! THMA(L) = WMA(3*WMA(src, L/3) - WMA(src, L/2) - WMA(src, L), L)
//!
//! Integer division truncates and every window is at least 1. The variant
//! selector ([`HullVariant::build`]) hands THMA half the requested length so
//! the three variants span a comparable horizon; the raw functions take the
//! length as given.

use std::fmt;
use std::str::FromStr;

use super::ema::calculate_ema;
use super::wma::calculate_wma;
use super::{Line, round_sqrt, window};
use crate::domain::error::HulltrendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HullVariant {
    #[default]
    Hma,
    Ehma,
    Thma,
}

impl HullVariant {
    /// Build the line for a requested length, applying the THMA halving.
    pub fn build(&self, src: &[Option<f64>], length: usize) -> Line {
        match self {
            HullVariant::Hma => hma(src, length),
            HullVariant::Ehma => ehma(src, length),
            HullVariant::Thma => thma(src, self.effective_length(length)),
        }
    }

    /// Length actually handed to the underlying formula.
    pub fn effective_length(&self, length: usize) -> usize {
        match self {
            HullVariant::Hma | HullVariant::Ehma => window(length),
            HullVariant::Thma => window(length / 2),
        }
    }

    /// Samples needed before the first trustworthy value at `length`.
    ///
    /// EHMA is mathematically defined from the first sample; the first
    /// `length` points are reported as warm-up by convention.
    pub fn warmup(&self, length: usize) -> usize {
        let len = self.effective_length(length);
        match self {
            HullVariant::Hma => len + round_sqrt(len) - 1,
            HullVariant::Ehma => len,
            HullVariant::Thma => 2 * len - 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HullVariant::Hma => "hma",
            HullVariant::Ehma => "ehma",
            HullVariant::Thma => "thma",
        }
    }
}

impl fmt::Display for HullVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

impl FromStr for HullVariant {
    type Err = HulltrendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hma" => Ok(HullVariant::Hma),
            "ehma" => Ok(HullVariant::Ehma),
            "thma" => Ok(HullVariant::Thma),
            _ => Err(HulltrendError::UnknownVariant { tag: s.to_string() }),
        }
    }
}

pub fn hma(src: &[Option<f64>], length: usize) -> Line {
    let len = window(length);
    let half = calculate_wma(src, len / 2);
    let full = calculate_wma(src, len);
    let raw = Line::zip_with(&[&half, &full], |v| 2.0 * v[0] - v[1]);
    calculate_wma(raw.values(), round_sqrt(len))
}

pub fn ehma(src: &[Option<f64>], length: usize) -> Line {
    let len = window(length);
    let half = calculate_ema(src, len / 2);
    let full = calculate_ema(src, len);
    let raw = Line::zip_with(&[&half, &full], |v| 2.0 * v[0] - v[1]);
    calculate_ema(raw.values(), round_sqrt(len))
}

pub fn thma(src: &[Option<f64>], length: usize) -> Line {
    let len = window(length);
    let third = calculate_wma(src, len / 3);
    let half = calculate_wma(src, len / 2);
    let full = calculate_wma(src, len);
    let raw = Line::zip_with(&[&third, &half, &full], |v| 3.0 * v[0] - v[1] - v[2]);
    calculate_wma(raw.values(), len)
}
