//! Dual-horizon trend engine.
//!
//! Two Hull lines over the same source: HULL at the fast length and TREND at
//! the slow length. A bar is UP when TREND[t] > TREND[t-1] and
//! HULL[t] > HULL[t-2], DOWN when both are strictly reversed, and
//! unclassified otherwise. Each bar is judged from its own window only.

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

use super::error::HulltrendError;
use super::indicator::Line;
use super::indicator::hull::HullVariant;
use super::ohlcv::{Bar, PriceField, source_values, validate_series};

/// HULL is compared against its value two bars back.
pub const FAST_OFFSET: usize = 2;
/// TREND is compared against the previous bar.
pub const SLOW_OFFSET: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrendState {
    Up,
    Down,
}

impl TrendState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendState::Up => "UP",
            TrendState::Down => "DOWN",
        }
    }
}

impl fmt::Display for TrendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrendState {
    type Err = HulltrendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UP" => Ok(TrendState::Up),
            "DOWN" => Ok(TrendState::Down),
            other => Err(HulltrendError::DataIntegrity {
                series: "signal state".into(),
                reason: format!("unknown trend state '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendConfig {
    pub source: PriceField,
    pub variant: HullVariant,
    pub fast_length: usize,
    pub slow_length: usize,
    /// Blank EHMA's first `length` points, which it defines but cannot trust.
    pub suppress_ehma_warmup: bool,
}

impl Default for TrendConfig {
    fn default() -> Self {
        TrendConfig {
            source: PriceField::Close,
            variant: HullVariant::Hma,
            fast_length: 48,
            slow_length: 1000,
            suppress_ehma_warmup: true,
        }
    }
}

/// Classify bar `t` from the two lines.
pub fn classify(hull: &Line, trend: &Line, t: usize) -> Option<TrendState> {
    let trend_up = trend.rising(t, SLOW_OFFSET);
    let trend_down = trend.falling(t, SLOW_OFFSET);
    let hull_up = hull.rising(t, FAST_OFFSET);
    let hull_down = hull.falling(t, FAST_OFFSET);

    if trend_up && hull_up {
        Some(TrendState::Up)
    } else if trend_down && hull_down {
        Some(TrendState::Down)
    } else {
        None
    }
}

/// Everything one evaluation produced, indexed by bar position.
#[derive(Debug, Clone)]
pub struct TrendFrame {
    pub timestamps: Vec<NaiveDateTime>,
    pub opens: Vec<f64>,
    pub closes: Vec<f64>,
    pub hull: Line,
    pub trend: Line,
    pub states: Vec<Option<TrendState>>,
}

impl TrendFrame {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Index of the newest classified bar.
    pub fn latest_classified(&self) -> Option<usize> {
        self.states.iter().rposition(Option::is_some)
    }

    /// State of the nearest classified bar before `t`.
    pub fn classified_before(&self, t: usize) -> Option<TrendState> {
        self.states
            .get(..t)
            .and_then(|prefix| prefix.iter().rev().find_map(|s| *s))
    }

    /// Bars whose state differs from the previous classified bar.
    ///
    /// Unclassified bars are skipped, so a hold between two UP bars is not a
    /// transition. The first classified bar has no predecessor and is not
    /// listed.
    pub fn transitions(&self) -> Vec<usize> {
        let mut previous: Option<TrendState> = None;
        let mut out = Vec::new();
        for (t, state) in self.states.iter().enumerate() {
            let Some(state) = *state else { continue };
            if previous.is_some_and(|p| p != state) {
                out.push(t);
            }
            previous = Some(state);
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct TrendEngine {
    config: TrendConfig,
}

impl TrendEngine {
    pub fn new(config: TrendConfig) -> Result<Self, HulltrendError> {
        for (key, value) in [
            ("fast_length", config.fast_length),
            ("slow_length", config.slow_length),
        ] {
            if value == 0 {
                return Err(HulltrendError::ConfigInvalid {
                    section: "strategy".into(),
                    key: key.into(),
                    reason: format!("{key} must be at least 1"),
                });
            }
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrendConfig {
        &self.config
    }

    /// Build one Hull line at `length` over the configured source.
    pub fn line(&self, src: &[Option<f64>], length: usize) -> Line {
        let variant = self.config.variant;
        let line = variant.build(src, length);
        if variant == HullVariant::Ehma && self.config.suppress_ehma_warmup {
            line.suppress_before(variant.warmup(length))
        } else {
            line
        }
    }

    pub fn evaluate(&self, series: &str, bars: &[Bar]) -> Result<TrendFrame, HulltrendError> {
        validate_series(series, bars)?;

        let src = source_values(bars, self.config.source);
        let hull = self.line(&src, self.config.fast_length);
        let trend = self.line(&src, self.config.slow_length);
        let states: Vec<Option<TrendState>> =
            (0..bars.len()).map(|t| classify(&hull, &trend, t)).collect();

        let classified = states.iter().flatten().count();
        tracing::debug!(
            series,
            bars = bars.len(),
            classified,
            variant = %self.config.variant,
            fast = self.config.fast_length,
            slow = self.config.slow_length,
            "evaluated trend frame"
        );

        Ok(TrendFrame {
            timestamps: bars.iter().map(|b| b.timestamp).collect(),
            opens: bars.iter().map(|b| b.open).collect(),
            closes: bars.iter().map(|b| b.close).collect(),
            hull,
            trend,
            states,
        })
    }
}
