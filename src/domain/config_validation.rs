//! Configuration validation.
//!
//! Validates every config field before any data is loaded or computed.

use std::str::FromStr;

use crate::domain::error::BandtraderError;
use crate::domain::strategy::{StrategyKind, StrategyParams};
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> BandtraderError {
    BandtraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Parse an optional value, failing on text that doesn't parse as `T`.
pub fn read_value<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, BandtraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("cannot parse '{}'", raw.trim()))),
    }
}

/// Parse an optional flag. Accepts `true`/`yes`/`on`/`1` and
/// `false`/`no`/`off`/`0`, case-insensitively.
pub fn read_bool(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<bool>, BandtraderError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "true" | "yes" | "on" | "1" => Ok(Some(true)),
        "false" | "no" | "off" | "0" => Ok(Some(false)),
        other => Err(invalid(section, key, format!("cannot parse '{other}' as a flag"))),
    }
}

/// Parse a comma-separated list of `T`.
pub fn read_list<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<Vec<T>>, BandtraderError> {
    let Some(items) = config.get_list(section, key) else {
        return Ok(None);
    };
    items
        .iter()
        .map(|item| {
            item.parse::<T>()
                .map_err(|_| invalid(section, key, format!("cannot parse '{item}'")))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), BandtraderError> {
    validate_data(config)?;
    validate_strategy(config)?;
    validate_stop_loss(config)?;
    validate_rebuy(config)?;
    Ok(())
}

pub fn validate_sweep_config(config: &dyn ConfigPort) -> Result<(), BandtraderError> {
    let lengths: Vec<i64> = read_list(config, "sweep", "ma_lengths")?.unwrap_or_default();
    if lengths.is_empty() {
        return Err(BandtraderError::ConfigMissing {
            section: "sweep".to_string(),
            key: "ma_lengths".to_string(),
        });
    }
    if let Some(bad) = lengths.iter().find(|&&l| l < 1) {
        return Err(invalid("sweep", "ma_lengths", format!("length {bad} must be at least 1")));
    }

    let splits: Vec<f64> = read_list(config, "sweep", "ma_splits")?.unwrap_or_default();
    if splits.is_empty() {
        return Err(BandtraderError::ConfigMissing {
            section: "sweep".to_string(),
            key: "ma_splits".to_string(),
        });
    }
    if let Some(bad) = splits.iter().find(|s| !(0.0..1.0).contains(*s)) {
        return Err(invalid("sweep", "ma_splits", format!("split {bad} must be in [0, 1)")));
    }
    read_bool(config, "sweep", "parallel")?;
    Ok(())
}

fn validate_data(config: &dyn ConfigPort) -> Result<(), BandtraderError> {
    match config.get_string("data", "directory") {
        Some(s) if !s.trim().is_empty() => {}
        _ => {
            return Err(BandtraderError::ConfigMissing {
                section: "data".to_string(),
                key: "directory".to_string(),
            });
        }
    }

    match config.get_string("data", "symbols") {
        Some(s) if !s.trim().is_empty() => {
            parse_symbols(&s)?;
            Ok(())
        }
        _ => Err(BandtraderError::ConfigMissing {
            section: "data".to_string(),
            key: "symbols".to_string(),
        }),
    }
}

fn validate_strategy(config: &dyn ConfigPort) -> Result<(), BandtraderError> {
    let kind = match config.get_string("strategy", "kind") {
        Some(raw) => raw
            .parse::<StrategyKind>()
            .map_err(|_| invalid("strategy", "kind", format!("unknown strategy '{raw}'")))?,
        None => StrategyKind::MaBand,
    };

    let defaults = StrategyParams::default();
    let length = read_value::<i64>(config, "strategy", "ma_length")?
        .unwrap_or(defaults.ma_length as i64);
    if length < 1 {
        return Err(invalid("strategy", "ma_length", "ma_length must be at least 1"));
    }

    if kind == StrategyKind::DualMa {
        let fast = read_value::<i64>(config, "strategy", "ma_length_fast")?
            .unwrap_or(defaults.ma_length_fast as i64);
        if fast < 1 || fast >= length {
            return Err(invalid(
                "strategy",
                "ma_length_fast",
                "ma_length_fast must be at least 1 and less than ma_length",
            ));
        }
    }

    let split = read_value::<f64>(config, "strategy", "ma_split")?.unwrap_or(defaults.ma_split);
    if !(0.0..1.0).contains(&split) {
        return Err(invalid("strategy", "ma_split", "ma_split must be in [0, 1)"));
    }

    let shift =
        read_value::<f64>(config, "strategy", "short_shift")?.unwrap_or(defaults.short_shift);
    if !(shift.is_finite() && shift > 0.0) {
        return Err(invalid("strategy", "short_shift", "short_shift must be positive"));
    }

    if let Some(delay) = read_value::<i64>(config, "strategy", "delay")? {
        if delay < 0 {
            return Err(invalid("strategy", "delay", "delay must be non-negative"));
        }
    }

    read_bool(config, "strategy", "ema")?;
    read_bool(config, "strategy", "allow_shorting")?;
    Ok(())
}

fn validate_stop_loss(config: &dyn ConfigPort) -> Result<(), BandtraderError> {
    if !read_bool(config, "stop_loss", "enabled")?.unwrap_or(false) {
        return Ok(());
    }
    let fraction = read_value::<f64>(config, "stop_loss", "fraction")?.unwrap_or(0.9);
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(invalid("stop_loss", "fraction", "fraction must be in (0, 1]"));
    }
    let delay = read_value::<i64>(config, "stop_loss", "delay")?.unwrap_or(15);
    if delay < 0 {
        return Err(invalid("stop_loss", "delay", "delay must be non-negative"));
    }
    Ok(())
}

fn validate_rebuy(config: &dyn ConfigPort) -> Result<(), BandtraderError> {
    if !read_bool(config, "rebuy", "enabled")?.unwrap_or(false) {
        return Ok(());
    }
    let allowed = read_value::<i64>(config, "rebuy", "allowed")?.unwrap_or(3);
    if allowed < 0 {
        return Err(invalid("rebuy", "allowed", "allowed must be non-negative"));
    }
    let days = read_value::<i64>(config, "rebuy", "consecutive_up_days")?.unwrap_or(7);
    if days < 1 {
        return Err(invalid(
            "rebuy",
            "consecutive_up_days",
            "consecutive_up_days must be at least 1",
        ));
    }
    let stop = read_value::<f64>(config, "rebuy", "stop")?.unwrap_or(0.95);
    if !(stop > 0.0 && stop <= 1.0) {
        return Err(invalid("rebuy", "stop", "stop must be in (0, 1]"));
    }
    Ok(())
}
