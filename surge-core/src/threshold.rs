//! Threshold expressions: `p(95)<500`, `rate<0.01`, `count>=100` and friends.
use crate::constants::{CHECKS, HTTP_REQS, HTTP_REQ_DURATION, HTTP_REQ_FAILED, ITERATIONS};
use crate::ConfigError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Built-in metrics every iteration feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    /// Request duration in milliseconds.
    HttpReqDuration,
    /// Share of iterations which failed.
    HttpReqFailed,
    /// Number of requests sent, retries included.
    HttpReqs,
    /// Share of individual checks which passed.
    Checks,
    /// Number of completed iterations.
    Iterations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Trend,
    Rate,
    Counter,
}

impl MetricKind {
    fn name(&self) -> &'static str {
        match self {
            Self::Trend => "trend",
            Self::Rate => "rate",
            Self::Counter => "counter",
        }
    }

    fn accepts(&self, aggregation: &Aggregation) -> bool {
        matches!(
            (self, aggregation),
            (
                Self::Trend,
                Aggregation::Percentile(_)
                    | Aggregation::Avg
                    | Aggregation::Min
                    | Aggregation::Max
                    | Aggregation::Med
            ) | (Self::Rate, Aggregation::Rate)
                | (Self::Counter, Aggregation::Count)
        )
    }
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Self::HttpReqDuration => HTTP_REQ_DURATION,
            Self::HttpReqFailed => HTTP_REQ_FAILED,
            Self::HttpReqs => HTTP_REQS,
            Self::Checks => CHECKS,
            Self::Iterations => ITERATIONS,
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Self::HttpReqDuration => MetricKind::Trend,
            Self::HttpReqFailed | Self::Checks => MetricKind::Rate,
            Self::HttpReqs | Self::Iterations => MetricKind::Counter,
        }
    }
}

impl FromStr for Metric {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            HTTP_REQ_DURATION => Ok(Self::HttpReqDuration),
            HTTP_REQ_FAILED => Ok(Self::HttpReqFailed),
            HTTP_REQS => Ok(Self::HttpReqs),
            CHECKS => Ok(Self::Checks),
            ITERATIONS => Ok(Self::Iterations),
            other => Err(ConfigError::UnknownMetric(other.to_string())),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    /// `p(N)`, N in `[0, 100]`.
    Percentile(f64),
    Avg,
    Min,
    Max,
    Med,
    Rate,
    Count,
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percentile(p) => write!(f, "p({p})"),
            Self::Avg => f.write_str("avg"),
            Self::Min => f.write_str("min"),
            Self::Max => f.write_str("max"),
            Self::Med => f.write_str("med"),
            Self::Rate => f.write_str("rate"),
            Self::Count => f.write_str("count"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparator {
    pub fn compare(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }

    /// Splits a comparator off the front of `s`, returning it and the remainder.
    fn split(s: &str) -> Option<(Self, &str)> {
        // NOTE: two character operators first so `<=` is not read as `<`
        for (symbol, cmp) in [
            ("<=", Self::Le),
            (">=", Self::Ge),
            ("==", Self::Eq),
            ("!=", Self::Ne),
            ("<", Self::Lt),
            (">", Self::Gt),
        ] {
            if let Some(rest) = s.strip_prefix(symbol) {
                return Some((cmp, rest));
            }
        }
        None
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A parsed `<aggregation><comparator><value>` expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdExpr {
    pub aggregation: Aggregation,
    pub comparator: Comparator,
    pub value: f64,
}

impl ThresholdExpr {
    pub fn holds(&self, observed: f64) -> bool {
        self.comparator.compare(observed, self.value)
    }
}

impl FromStr for ThresholdExpr {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidThreshold {
            expr: s.to_string(),
            reason: reason.to_string(),
        };

        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let split_at = compact
            .find(['<', '>', '=', '!'])
            .ok_or_else(|| invalid("missing comparator"))?;
        let (aggregation, rest) = compact.split_at(split_at);
        let (comparator, value) =
            Comparator::split(rest).ok_or_else(|| invalid("bad comparator"))?;

        let value: f64 = value
            .parse()
            .map_err(|_| invalid("threshold value is not a number"))?;
        if !value.is_finite() {
            return Err(invalid("threshold value must be finite"));
        }

        let aggregation = match aggregation {
            "avg" => Aggregation::Avg,
            "min" => Aggregation::Min,
            "max" => Aggregation::Max,
            "med" => Aggregation::Med,
            "rate" => Aggregation::Rate,
            "count" => Aggregation::Count,
            "" => return Err(invalid("missing aggregation")),
            other => {
                let inner = other
                    .strip_prefix("p(")
                    .and_then(|s| s.strip_suffix(')'))
                    .ok_or_else(|| invalid("unknown aggregation"))?;
                let p: f64 = inner
                    .parse()
                    .map_err(|_| invalid("percentile is not a number"))?;
                if !(0. ..=100.).contains(&p) {
                    return Err(invalid("percentile must be within 0..=100"));
                }
                Aggregation::Percentile(p)
            }
        };

        Ok(Self {
            aggregation,
            comparator,
            value,
        })
    }
}

impl fmt::Display for ThresholdExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.aggregation, self.comparator, self.value)
    }
}

/// Restricts a threshold to outcomes tagged `key:value`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagFilter {
    pub key: String,
    pub value: String,
}

impl FromStr for TagFilter {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((key, value)) if !key.trim().is_empty() => Ok(Self {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            }),
            _ => Err(ConfigError::InvalidTag(s.to_string())),
        }
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key, self.value)
    }
}

/// A pass/fail criterion over one aggregated metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: Metric,
    pub tag: Option<TagFilter>,
    pub expr: ThresholdExpr,
    /// Stop the run as soon as this threshold is breached.
    pub abort_on_fail: bool,
    /// Grace period before `abort_on_fail` is considered.
    pub delay_abort_eval: Option<Duration>,
}

impl Threshold {
    /// Parse a threshold from its k6 style key (`metric` or `metric{key:value}`) and expression.
    pub fn parse(key: &str, expr: &str) -> Result<Self, ConfigError> {
        let key = key.trim();
        let (metric, tag) = match key.split_once('{') {
            Some((metric, tag)) => {
                let tag = tag
                    .strip_suffix('}')
                    .ok_or_else(|| ConfigError::InvalidTag(key.to_string()))?;
                (metric, Some(tag.parse::<TagFilter>()?))
            }
            None => (key, None),
        };

        let metric: Metric = metric.parse()?;
        let expr: ThresholdExpr = expr.parse()?;

        let kind = metric.kind();
        if !kind.accepts(&expr.aggregation) {
            return Err(ConfigError::AggregationMismatch {
                metric: metric.name().to_string(),
                kind: kind.name(),
                aggregation: expr.aggregation.to_string(),
            });
        }

        Ok(Self {
            metric,
            tag,
            expr,
            abort_on_fail: false,
            delay_abort_eval: None,
        })
    }

    pub fn abort_on_fail(mut self, delay: Option<Duration>) -> Self {
        self.abort_on_fail = true;
        self.delay_abort_eval = delay;
        self
    }

    /// The `metric{key:value}` half of the threshold.
    pub fn key(&self) -> String {
        match &self.tag {
            Some(tag) => format!("{}{{{tag}}}", self.metric),
            None => self.metric.to_string(),
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key(), self.expr)
    }
}

impl Serialize for Threshold {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
