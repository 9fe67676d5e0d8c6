//! Format and business-rule consistency checks.
//!
//! Columns are matched against a small ordered rule table: a name fragment
//! short-circuits content sniffing, otherwise a content probe over the
//! sample head decides whether the column is email/phone/url/date-like.
//! Each recognized kind has a violation-ratio threshold; columns whose
//! name suggests a non-negative quantity additionally get a sign check.

use std::collections::HashMap;

use arrow::array::RecordBatch;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    inconsistencies::{collect_text_samples, NUMERIC_PATTERN, TEXT_SAMPLE_CAP},
    profiler::{ColumnProfile, InferredType},
    stats::{parse_datetime, parse_numeric},
};

/// Samples inspected per column when evaluating.
const EVALUATE_SAMPLES: usize = 2_000;

/// Samples inspected when content-sniffing a column's kind.
const SNIFF_SAMPLES: usize = 500;

/// Fraction of sampled values a content probe must match.
const SNIFF_RATIO: f64 = 0.5;

#[allow(clippy::unwrap_used)]
static EMAIL_HINT: Lazy<Regex> = Lazy::new(|| Regex::new(r".+@.+\..+").unwrap());
#[allow(clippy::unwrap_used)]
static EMAIL_VALID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
#[allow(clippy::unwrap_used)]
static PHONE_HINT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]{7,}").unwrap());
#[allow(clippy::unwrap_used)]
static URL_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://").unwrap());

/// The column kinds the rule table can recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormatKind {
    Email,
    Phone,
    Url,
    Date,
}

/// One sniffing rule: name fragments that decide immediately, plus a
/// content probe used when no fragment matches.
struct SniffRule {
    kind: FormatKind,
    name_markers: &'static [&'static str],
    content: fn(&[&str]) -> bool,
}

/// Ordered rule table; rules are independent, a column can match several.
const SNIFF_RULES: &[SniffRule] = &[
    SniffRule {
        kind: FormatKind::Email,
        name_markers: &["email"],
        content: |samples| sniff_ratio(samples, |v| EMAIL_HINT.is_match(v)) > SNIFF_RATIO,
    },
    SniffRule {
        kind: FormatKind::Phone,
        name_markers: &["phone", "mobile"],
        content: |samples| sniff_ratio(samples, |v| PHONE_HINT.is_match(v)) > SNIFF_RATIO,
    },
    SniffRule {
        kind: FormatKind::Url,
        name_markers: &["url", "link"],
        content: |samples| sniff_ratio(samples, |v| URL_SCHEME.is_match(v)) > SNIFF_RATIO,
    },
    SniffRule {
        kind: FormatKind::Date,
        name_markers: &["date"],
        content: |samples| sniff_ratio(samples, |v| parse_datetime(v).is_some()) > SNIFF_RATIO,
    },
];

/// Name fragments that mark a column as a non-negative quantity.
const NON_NEGATIVE_MARKERS: &[&str] = &["amount", "price", "qty", "quantity", "age"];

fn sniff_ratio(samples: &[&str], probe: impl Fn(&str) -> bool) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let hits = samples.iter().filter(|v| probe(v)).count();
    hits as f64 / samples.len() as f64
}

fn matches_kind(kind: FormatKind, column: &str, samples: &[&str]) -> bool {
    let lowered = column.to_lowercase();
    for rule in SNIFF_RULES {
        if rule.kind != kind {
            continue;
        }
        if rule.name_markers.iter().any(|m| lowered.contains(m)) {
            return true;
        }
        let head = &samples[..samples.len().min(SNIFF_SAMPLES)];
        return (rule.content)(head);
    }
    false
}

/// Streaming sample collector and format/business-rule evaluator.
///
/// # Example
///
/// ```ignore
/// let mut checker = ConsistencyChecker::new();
/// for chunk in chunks {
///     checker.process_chunk(&chunk);
/// }
/// let issues = checker.evaluate(&profiles);
/// ```
#[derive(Debug, Default)]
pub struct ConsistencyChecker {
    string_samples: HashMap<String, Vec<String>>,
}

impl ConsistencyChecker {
    /// Create an empty checker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect string samples per column, capped at `TEXT_SAMPLE_CAP` (5,000).
    pub fn process_chunk(&mut self, chunk: &RecordBatch) {
        collect_text_samples(&mut self.string_samples, chunk);
    }

    /// Evaluate consistency issues from profiles and collected samples.
    #[must_use]
    pub fn evaluate(
        &self,
        profiles: &HashMap<String, ColumnProfile>,
    ) -> HashMap<String, Vec<String>> {
        let now = Utc::now();
        let mut issues: HashMap<String, Vec<String>> = HashMap::new();

        for (column, profile) in profiles {
            let mut column_issues: Vec<String> = Vec::new();

            let stored = self.string_samples.get(column);
            let samples: Vec<&str> = stored
                .map(|s| {
                    s.iter()
                        .take(EVALUATE_SAMPLES)
                        .map(|v| v.as_str())
                        .collect()
                })
                .unwrap_or_default();

            // Type consistency: a numeric column full of non-numeric
            // representations.
            if profile.inferred_type == InferredType::Numeric && !samples.is_empty() {
                let non_numeric = samples
                    .iter()
                    .filter(|v| !NUMERIC_PATTERN.is_match(v))
                    .count();
                if non_numeric as f64 / samples.len() as f64 > 0.1 {
                    column_issues.push(
                        "Type inconsistency: many non-numeric representations in a numeric column."
                            .to_string(),
                    );
                }
            }

            if matches_kind(FormatKind::Email, column, &samples) && !samples.is_empty() {
                let invalid = samples
                    .iter()
                    .filter(|v| !EMAIL_VALID.is_match(v))
                    .count();
                let invalid_ratio = invalid as f64 / samples.len() as f64;
                if invalid_ratio > 0.0 {
                    column_issues.push(format!(
                        "Email format violations detected (~{:.1}% invalid).",
                        invalid_ratio * 100.0
                    ));
                }
            }

            if matches_kind(FormatKind::Phone, column, &samples) && !samples.is_empty() {
                let short = samples.iter().filter(|v| v.chars().count() < 7).count();
                if short as f64 / samples.len() as f64 > 0.05 {
                    column_issues.push(
                        "Phone number length inconsistencies detected (very short values present)."
                            .to_string(),
                    );
                }
            }

            if matches_kind(FormatKind::Url, column, &samples) && !samples.is_empty() {
                let invalid = samples.iter().filter(|v| !URL_SCHEME.is_match(v)).count();
                if invalid as f64 / samples.len() as f64 > 0.1 {
                    column_issues.push(
                        "URL format inconsistencies detected (values not starting with http/https)."
                            .to_string(),
                    );
                }
            }

            // Temporal consistency: future-dated values. Naive timestamps
            // are assumed UTC before comparison.
            let date_like = profile.inferred_type == InferredType::Datetime
                || matches_kind(FormatKind::Date, column, &samples);
            if date_like && !samples.is_empty() {
                let any_future = samples
                    .iter()
                    .filter_map(|v| parse_datetime(v))
                    .any(|parsed| parsed > now);
                if any_future {
                    column_issues
                        .push("Temporal inconsistency: future dates detected.".to_string());
                }
            }

            // Business rule: negative values in a non-negative quantity.
            let lowered = column.to_lowercase();
            if profile.inferred_type == InferredType::Numeric
                && NON_NEGATIVE_MARKERS.iter().any(|m| lowered.contains(m))
                && !samples.is_empty()
            {
                let negatives = samples
                    .iter()
                    .filter_map(|v| parse_numeric(v))
                    .filter(|v| *v < 0.0)
                    .count();
                if negatives as f64 / samples.len() as f64 > 0.01 {
                    column_issues.push(
                        "Business rule violation: negative values detected for a quantity/amount-like column."
                            .to_string(),
                    );
                }
            }

            if !column_issues.is_empty() {
                issues.insert(column.clone(), column_issues);
            }
        }

        issues
    }
}
