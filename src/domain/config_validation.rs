//! Configuration validation.
//!
//! Checks every `[strategy]` and `[backtest]` field before a run starts.

use crate::domain::backtest::{ExitPolicy, FillPolicy};
use crate::domain::error::HulltrendError;
use crate::domain::indicator::hull::HullVariant;
use crate::domain::ohlcv::{PriceField, parse_timestamp};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDateTime;

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), HulltrendError> {
    validate_variant(config)?;
    validate_source(config)?;
    validate_length(config, "fast_length")?;
    validate_length(config, "slow_length")?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), HulltrendError> {
    validate_initial_capital(config)?;
    validate_position_size(config)?;
    validate_commission(config)?;
    validate_dates(config)?;
    validate_policies(config)?;
    Ok(())
}

fn validate_variant(config: &dyn ConfigPort) -> Result<(), HulltrendError> {
    if let Some(tag) = config.get_string("strategy", "variant") {
        tag.parse::<HullVariant>()?;
    }
    Ok(())
}

fn validate_source(config: &dyn ConfigPort) -> Result<(), HulltrendError> {
    if let Some(source) = config.get_string("strategy", "source") {
        source.parse::<PriceField>()?;
    }
    Ok(())
}

fn validate_length(config: &dyn ConfigPort, key: &str) -> Result<(), HulltrendError> {
    let value = config.get_int("strategy", key, 1);
    if value < 1 {
        return Err(HulltrendError::ConfigInvalid {
            section: "strategy".to_string(),
            key: key.to_string(),
            reason: format!("{key} must be at least 1"),
        });
    }
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), HulltrendError> {
    let value = config.get_double("backtest", "initial_capital", 100_000.0);
    if value <= 0.0 {
        return Err(HulltrendError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "initial_capital".to_string(),
            reason: "initial_capital must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_position_size(config: &dyn ConfigPort) -> Result<(), HulltrendError> {
    let value = config.get_double("backtest", "position_size_pct", 100.0);
    if value <= 0.0 || value > 100.0 {
        return Err(HulltrendError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "position_size_pct".to_string(),
            reason: "position_size_pct must be in (0, 100]".to_string(),
        });
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), HulltrendError> {
    let value = config.get_double("backtest", "commission_pct", 0.0);
    if !(0.0..100.0).contains(&value) {
        return Err(HulltrendError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "commission_pct".to_string(),
            reason: "commission_pct must be in [0, 100)".to_string(),
        });
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), HulltrendError> {
    let start = parse_date(config, "start_date")?;
    let end = parse_date(config, "end_date")?;

    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(HulltrendError::ConfigInvalid {
                section: "backtest".to_string(),
                key: "start_date".to_string(),
                reason: "start_date must be before end_date".to_string(),
            });
        }
    }
    Ok(())
}

/// Optional `[backtest]` date; absent or blank means unbounded.
pub fn parse_date(
    config: &dyn ConfigPort,
    field: &str,
) -> Result<Option<NaiveDateTime>, HulltrendError> {
    match config.get_string("backtest", field) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_timestamp(s.trim())
            .map(Some)
            .ok_or_else(|| HulltrendError::ConfigInvalid {
                section: "backtest".to_string(),
                key: field.to_string(),
                reason: format!("invalid {field} format, expected YYYY-MM-DD"),
            }),
    }
}

fn validate_policies(config: &dyn ConfigPort) -> Result<(), HulltrendError> {
    if let Some(fill) = config.get_string("backtest", "fill_policy") {
        fill.parse::<FillPolicy>()?;
    }
    if let Some(exit) = config.get_string("backtest", "exit_policy") {
        exit.parse::<ExitPolicy>()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn valid_strategy_config_passes() {
        let config = make_config(
            r#"
[strategy]
source = hl2
variant = thma
fast_length = 48
slow_length = 1000
"#,
        );
        assert!(validate_strategy_config(&config).is_ok());
    }

    #[test]
    fn empty_strategy_uses_defaults() {
        let config = make_config("[strategy]\n");
        assert!(validate_strategy_config(&config).is_ok());
    }

    #[test]
    fn unknown_variant_fails() {
        let config = make_config("[strategy]\nvariant = sma\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, HulltrendError::UnknownVariant { tag } if tag == "sma"));
    }

    #[test]
    fn unknown_source_fails() {
        let config = make_config("[strategy]\nsource = vwap\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, HulltrendError::ConfigInvalid { key, .. } if key == "source"));
    }

    #[test]
    fn zero_length_fails() {
        let config = make_config("[strategy]\nfast_length = 0\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, HulltrendError::ConfigInvalid { key, .. } if key == "fast_length"));
    }

    #[test]
    fn valid_backtest_config_passes() {
        let config = make_config(
            r#"
[backtest]
initial_capital = 100000.0
position_size_pct = 50
commission_pct = 0.1
start_date = 2020-01-01
end_date = 2024-12-31
fill_policy = next-bar-open
exit_policy = fast-line
"#,
        );
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn dates_are_optional() {
        let config = make_config("[backtest]\ninitial_capital = 100\n");
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn initial_capital_zero_fails() {
        let config = make_config("[backtest]\ninitial_capital = 0\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, HulltrendError::ConfigInvalid { key, .. } if key == "initial_capital")
        );
    }

    #[test]
    fn position_size_above_hundred_fails() {
        let config = make_config("[backtest]\nposition_size_pct = 150\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, HulltrendError::ConfigInvalid { key, .. } if key == "position_size_pct")
        );
    }

    #[test]
    fn commission_negative_fails() {
        let config = make_config("[backtest]\ncommission_pct = -0.1\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, HulltrendError::ConfigInvalid { key, .. } if key == "commission_pct")
        );
    }

    #[test]
    fn invalid_start_date_format_fails() {
        let config = make_config("[backtest]\nstart_date = 2020/01/01\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, HulltrendError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn start_date_after_end_date_fails() {
        let config = make_config("[backtest]\nstart_date = 2024-12-31\nend_date = 2020-01-01\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, HulltrendError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn unknown_fill_policy_fails() {
        let config = make_config("[backtest]\nfill_policy = vwap\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, HulltrendError::ConfigInvalid { key, .. } if key == "fill_policy"));
    }
}
