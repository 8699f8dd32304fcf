use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Keyword anchoring a range to the current instant.
pub const NOW: &str = "now";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeRangeError {
    #[error("invalid time expression: {0}")]
    InvalidExpression(String),
    #[error("unknown time unit '{0}'")]
    UnknownUnit(char),
    #[error("range start {from} is after range end {to}")]
    Inverted { from: String, to: String },
}

/// Time range exactly as the user expressed it (`now-6h`, `now`, epoch millis).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTimeRange {
    pub from: String,
    pub to: String,
}

/// Resolved time range plus the raw expressions it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub raw: RawTimeRange,
}

impl TimeRange {
    /// Resolves both expressions relative to the current instant.
    pub fn parse(from: &str, to: &str) -> Result<Self, TimeRangeError> {
        Self::parse_at(from, to, Utc::now())
    }

    pub fn parse_at(from: &str, to: &str, now: DateTime<Utc>) -> Result<Self, TimeRangeError> {
        let start = parse_time_expression(from, now)?;
        let end = parse_time_expression(to, now)?;
        if start > end {
            return Err(TimeRangeError::Inverted {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        Ok(Self {
            from: start,
            to: end,
            raw: RawTimeRange {
                from: from.trim().to_string(),
                to: to.trim().to_string(),
            },
        })
    }

    /// Absolute range; the raw expressions are the epoch millis themselves.
    pub fn from_millis(from: i64, to: i64) -> Self {
        Self {
            from: millis_to_datetime(from),
            to: millis_to_datetime(to),
            raw: RawTimeRange {
                from: from.to_string(),
                to: to.to_string(),
            },
        }
    }

    /// Range ending at the current instant and reaching back `span`.
    pub fn last(span: Duration) -> Self {
        let now = Utc::now();
        Self {
            from: now - span,
            to: now,
            raw: RawTimeRange {
                from: format!("now-{}s", span.num_seconds()),
                to: NOW.to_string(),
            },
        }
    }

    /// Whether the range is anchored at "now" (rightmost live view).
    pub fn is_live(&self) -> bool {
        self.raw.to == NOW
    }

    pub fn from_millis_value(&self) -> i64 {
        self.from.timestamp_millis()
    }

    pub fn to_millis_value(&self) -> i64 {
        self.to.timestamp_millis()
    }
}

/// Parses `now`, `now-<n><unit>` (s, m, h, d, w, M, y) or epoch milliseconds.
pub fn parse_time_expression(
    expression: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, TimeRangeError> {
    let expression = expression.trim();
    if expression == NOW {
        return Ok(now);
    }

    if let Some(offset) = expression.strip_prefix("now-") {
        return Ok(now - parse_span(offset, expression)?);
    }

    if let Some(offset) = expression.strip_prefix("now+") {
        return Ok(now + parse_span(offset, expression)?);
    }

    expression
        .parse::<i64>()
        .map(millis_to_datetime)
        .map_err(|_| TimeRangeError::InvalidExpression(expression.to_string()))
}

fn parse_span(offset: &str, expression: &str) -> Result<Duration, TimeRangeError> {
    let unit = offset
        .chars()
        .last()
        .ok_or_else(|| TimeRangeError::InvalidExpression(expression.to_string()))?;
    let amount: i64 = offset[..offset.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| TimeRangeError::InvalidExpression(expression.to_string()))?;

    let span = match unit {
        's' => Duration::seconds(amount),
        'm' => Duration::minutes(amount),
        'h' => Duration::hours(amount),
        'd' => Duration::days(amount),
        'w' => Duration::weeks(amount),
        'M' => Duration::days(amount * 30),
        'y' => Duration::days(amount * 365),
        other => return Err(TimeRangeError::UnknownUnit(other)),
    };
    Ok(span)
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}
