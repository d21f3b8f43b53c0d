use std::fmt;
use std::str::FromStr;

/// Severity of a log entry.
///
/// Variants are declared in canonical order, most severe first, so the
/// derived `Ord` treats `Panic < Fatal < ... < Trace`. "At least as severe
/// as `min`" therefore means `level <= min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Panic,
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Severity {
    /// Every severity, in canonical order.
    pub const ALL: [Severity; 7] = [
        Severity::Panic,
        Severity::Fatal,
        Severity::Error,
        Severity::Warn,
        Severity::Info,
        Severity::Debug,
        Severity::Trace,
    ];

    /// All severities at or more severe than `min`, preserving canonical order.
    pub fn at_or_above(min: Severity) -> Vec<Severity> {
        Self::ALL.iter().copied().filter(|lev| *lev <= min).collect()
    }

    /// Name written into the `Level` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Panic => "panic",
            Severity::Fatal => "fatal",
            Severity::Error => "error",
            Severity::Warn => "warning",
            Severity::Info => "info",
            Severity::Debug => "debug",
            Severity::Trace => "trace",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<tracing::Level> for Severity {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => Severity::Error,
            tracing::Level::WARN => Severity::Warn,
            tracing::Level::INFO => Severity::Info,
            tracing::Level::DEBUG => Severity::Debug,
            tracing::Level::TRACE => Severity::Trace,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("not a valid severity: {0:?}")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "panic" => Ok(Severity::Panic),
            "fatal" => Ok(Severity::Fatal),
            "error" => Ok(Severity::Error),
            "warn" | "warning" => Ok(Severity::Warn),
            "info" => Ok(Severity::Info),
            "debug" => Ok(Severity::Debug),
            "trace" => Ok(Severity::Trace),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_or_above_keeps_canonical_order() {
        assert_eq!(
            Severity::at_or_above(Severity::Info),
            vec![
                Severity::Panic,
                Severity::Fatal,
                Severity::Error,
                Severity::Warn,
                Severity::Info
            ]
        );
        assert_eq!(Severity::at_or_above(Severity::Panic), vec![Severity::Panic]);
        assert_eq!(Severity::at_or_above(Severity::Trace), Severity::ALL.to_vec());
    }

    #[test]
    fn at_or_above_is_a_prefix_for_every_level() {
        for (idx, min) in Severity::ALL.iter().enumerate() {
            assert_eq!(Severity::at_or_above(*min), Severity::ALL[..=idx].to_vec());
        }
    }

    #[test]
    fn parses_both_spellings_of_warn() {
        assert_eq!("warn".parse::<Severity>(), Ok(Severity::Warn));
        assert_eq!("WARNING".parse::<Severity>(), Ok(Severity::Warn));
        assert_eq!(Severity::Warn.to_string(), "warning");
        assert!("loud".parse::<Severity>().is_err());
    }

    #[test]
    fn maps_tracing_levels() {
        assert_eq!(Severity::from(tracing::Level::ERROR), Severity::Error);
        assert_eq!(Severity::from(tracing::Level::TRACE), Severity::Trace);
    }
}
