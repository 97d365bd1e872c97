use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};

pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Revenue,
    NetIncome,
    Expenses,
    Eps,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Revenue,
        MetricKind::NetIncome,
        MetricKind::Expenses,
        MetricKind::Eps,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Revenue => "revenue",
            MetricKind::NetIncome => "net_income",
            MetricKind::Expenses => "expenses",
            MetricKind::Eps => "eps",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricValue {
    Found(String),
    NotAvailable,
}

impl MetricValue {
    pub fn as_str(&self) -> &str {
        match self {
            MetricValue::Found(raw) => raw,
            MetricValue::NotAvailable => NOT_AVAILABLE,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, MetricValue::Found(_))
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Extracted figures for one document. Every [`MetricKind`] is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Metrics(BTreeMap<MetricKind, MetricValue>);

impl Metrics {
    pub fn unavailable() -> Self {
        Self(
            MetricKind::ALL
                .iter()
                .map(|kind| (*kind, MetricValue::NotAvailable))
                .collect(),
        )
    }

    pub fn set(&mut self, kind: MetricKind, value: MetricValue) {
        self.0.insert(kind, value);
    }

    pub fn get(&self, kind: MetricKind) -> &MetricValue {
        self.0.get(&kind).unwrap_or(&MetricValue::NotAvailable)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricKind, &MetricValue)> {
        self.0.iter().map(|(kind, value)| (*kind, value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::unavailable()
    }
}

/// A way of pulling named figures out of raw document text.
pub trait MetricStrategy {
    fn extract(&self, text: &str) -> Metrics;
}

static PATTERNS: Lazy<Vec<(MetricKind, Regex)>> = Lazy::new(|| {
    [
        (
            MetricKind::Revenue,
            r"(?i)(?:revenue|sales)(?:\s+of)?\s*[:\-]?\s*[\$]?\s*(\d{1,3}(?:,\d{3})*(?:\.\d+)?)",
        ),
        (
            MetricKind::NetIncome,
            r"(?i)(?:net\s+income|profit)(?:\s+of)?\s*[:\-]?\s*[\$]?\s*(\d{1,3}(?:,\d{3})*(?:\.\d+)?)",
        ),
        (
            MetricKind::Expenses,
            r"(?i)(?:expenses|operating\s+costs)(?:\s+of)?\s*[:\-]?\s*[\$]?\s*(\d{1,3}(?:,\d{3})*(?:\.\d+)?)",
        ),
        (
            MetricKind::Eps,
            r"(?i)(?:eps|earnings\s+per\s+share)(?:\s+of)?\s*[:\-]?\s*[\$]?\s*(\d+(?:\.\d+)?)",
        ),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("valid regex")))
    .collect()
});

/// Label-then-number regex extraction. The leftmost match wins for each
/// metric and the captured number is kept verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternExtractor;

impl PatternExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl MetricStrategy for PatternExtractor {
    fn extract(&self, text: &str) -> Metrics {
        let mut metrics = Metrics::unavailable();
        for (kind, pattern) in PATTERNS.iter() {
            if let Some(caps) = pattern.captures(text) {
                if let Some(value) = caps.get(1) {
                    metrics.set(*kind, MetricValue::Found(value.as_str().to_string()));
                }
            }
        }
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_match_verbatim() {
        let text = "Total revenue of $12,345.67 was reported. Later, revenue: 99.\n\
                    Net income - 1,200 for the year. Operating costs: $850.5\n\
                    Earnings per share of 2.31";
        let metrics = PatternExtractor::new().extract(text);
        assert_eq!(metrics.get(MetricKind::Revenue).as_str(), "12,345.67");
        assert_eq!(metrics.get(MetricKind::NetIncome).as_str(), "1,200");
        assert_eq!(metrics.get(MetricKind::Expenses).as_str(), "850.5");
        assert_eq!(metrics.get(MetricKind::Eps).as_str(), "2.31");
    }

    #[test]
    fn label_alternatives_and_case_are_accepted() {
        let metrics = PatternExtractor::new().extract("SALES: 4,000 and PROFIT $300, EPS 1.05");
        assert_eq!(metrics.get(MetricKind::Revenue).as_str(), "4,000");
        assert_eq!(metrics.get(MetricKind::NetIncome).as_str(), "300");
        assert_eq!(metrics.get(MetricKind::Eps).as_str(), "1.05");
        assert_eq!(metrics.get(MetricKind::Expenses), &MetricValue::NotAvailable);
    }

    #[test]
    fn absent_metrics_are_all_present_as_not_available() {
        let metrics = PatternExtractor::new().extract("Nothing numeric is labelled here.");
        assert_eq!(metrics.len(), 4);
        for kind in MetricKind::ALL {
            assert_eq!(metrics.get(kind).as_str(), NOT_AVAILABLE);
        }
    }

    #[test]
    fn serializes_as_flat_string_map() {
        let metrics = PatternExtractor::new().extract("revenue 10");
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["revenue"], "10");
        assert_eq!(json["net_income"], "N/A");
        assert_eq!(json["expenses"], "N/A");
        assert_eq!(json["eps"], "N/A");
    }
}
