//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for bandtrader.
#[derive(Debug, thiserror::Error)]
pub enum BandtraderError {
    #[error("series length mismatch: expected {expected} points, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("degenerate price for {symbol} on {date}: {reason}")]
    DegeneratePrice {
        symbol: String,
        date: NaiveDate,
        reason: String,
    },

    #[error("dates for {symbol} are not strictly ascending at {date}")]
    UnorderedDates { symbol: String, date: NaiveDate },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("insufficient data for {symbol}: have {bars} periods, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BandtraderError {
    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        BandtraderError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&BandtraderError> for std::process::ExitCode {
    fn from(err: &BandtraderError) -> Self {
        let code: u8 = match err {
            BandtraderError::Io(_) => 1,
            BandtraderError::ConfigParse { .. }
            | BandtraderError::ConfigMissing { .. }
            | BandtraderError::ConfigInvalid { .. } => 2,
            BandtraderError::DataSource { .. } => 3,
            BandtraderError::LengthMismatch { .. } | BandtraderError::InvalidParameter { .. } => 4,
            BandtraderError::NoData { .. }
            | BandtraderError::InsufficientData { .. }
            | BandtraderError::DegeneratePrice { .. }
            | BandtraderError::UnorderedDates { .. } => 5,
            BandtraderError::Report { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
