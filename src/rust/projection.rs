//! Pure transformations from remote payloads into the display model.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::RemoteError;

/// Zero-based position of the metric rendered as a percentage.
///
/// The test endpoint does not name this metric; the convention is keyed to
/// payload order only.
pub const PERCENT_METRIC_INDEX: usize = 3;

/// Decoded body of a successful preprocessing call.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PreprocessPayload {
    #[serde(rename = "Keywords")]
    pub keywords: Vec<Vec<String>>,
    #[serde(rename = "2-gram")]
    pub bigrams: Vec<String>,
    #[serde(rename = "3-gram")]
    pub trigrams: Vec<String>,
}

/// High-frequency words of one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordGroup {
    pub name: String,
    pub words: Vec<String>,
}

/// Everything a preprocessing run contributes to the display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordSets {
    pub categories: Vec<WordGroup>,
    pub bigrams: Vec<String>,
    pub trigrams: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub label: String,
    pub value: f64,
}

/// Test metrics in payload order, which is also display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestMetrics {
    entries: Vec<Metric>,
}

impl TestMetrics {
    pub fn new(entries: Vec<Metric>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[Metric] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|metric| metric.label == label)
            .map(|metric| metric.value)
    }

    /// Label and rendered value of each metric.
    pub fn display_rows(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, metric)| (metric.label.clone(), format_metric(index, metric.value)))
            .collect()
    }
}

/// Derived state owned by the controller.
///
/// The word sets and the test metrics are each replaced wholesale by the
/// operation that produces them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineResult {
    pub categories: Vec<WordGroup>,
    pub bigrams: Vec<String>,
    pub trigrams: Vec<String>,
    pub test_metrics: TestMetrics,
}

impl PipelineResult {
    pub fn replace_word_sets(&mut self, sets: WordSets) {
        self.categories = sets.categories;
        self.bigrams = sets.bigrams;
        self.trigrams = sets.trigrams;
    }

    pub fn replace_test_metrics(&mut self, metrics: TestMetrics) {
        self.test_metrics = metrics;
    }
}

pub fn category_name(index: usize) -> String {
    format!("类别 {}", index + 1)
}

pub fn project_preprocess(payload: PreprocessPayload) -> WordSets {
    let categories = payload
        .keywords
        .into_iter()
        .enumerate()
        .map(|(index, words)| WordGroup {
            name: category_name(index),
            words,
        })
        .collect();

    WordSets {
        categories,
        bigrams: payload.bigrams,
        trigrams: payload.trigrams,
    }
}

/// Coerces every value of the flat test payload to a number, keeping key order.
pub fn project_metrics(payload: Map<String, Value>) -> Result<TestMetrics, RemoteError> {
    let entries = payload
        .into_iter()
        .map(|(label, value)| {
            let value = coerce_number(&value).ok_or_else(|| {
                RemoteError::Malformed(format!("metric '{}' is not numeric: {}", label, value))
            })?;
            Ok(Metric { label, value })
        })
        .collect::<Result<Vec<_>, RemoteError>>()?;

    Ok(TestMetrics::new(entries))
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

pub fn format_metric(index: usize, value: f64) -> String {
    if index == PERCENT_METRIC_INDEX {
        format!("{:.2}%", value * 100.0)
    } else {
        format!("{:.6}", value)
    }
}
