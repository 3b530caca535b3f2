use std::num::IntErrorKind;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::FieldError;

/// Raw, unvalidated contents of the parameter inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValues {
    pub file_path: String,
    pub article_count: String,
    pub category_count: String,
    pub dimension_reduction: bool,
    pub reduction_threshold: String,
}

/// A complete, validated set of preprocessing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSnapshot {
    pub file_path: String,
    pub article_count: u64,
    pub category_count: u64,
    pub dimension_reduction: bool,
    /// Present only when `dimension_reduction` is set
    pub reduction_threshold: Option<u64>,
}

/// Holds what the user has typed so far.
///
/// The form is shared between whatever edits it and the controller that
/// reads it; clones see the same values. Snapshots are always taken fresh.
#[derive(Debug, Clone)]
pub struct ParameterForm {
    values: Arc<watch::Sender<FormValues>>,
}

impl Default for ParameterForm {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterForm {
    pub fn new() -> Self {
        Self::with_values(FormValues::default())
    }

    pub fn with_values(values: FormValues) -> Self {
        let (values, _) = watch::channel(values);
        Self {
            values: Arc::new(values),
        }
    }

    pub fn set_file_path(&self, value: impl Into<String>) {
        let value = value.into();
        self.values.send_modify(|v| v.file_path = value);
    }

    pub fn set_article_count(&self, value: impl Into<String>) {
        let value = value.into();
        self.values.send_modify(|v| v.article_count = value);
    }

    pub fn set_category_count(&self, value: impl Into<String>) {
        let value = value.into();
        self.values.send_modify(|v| v.category_count = value);
    }

    pub fn set_reduction_threshold(&self, value: impl Into<String>) {
        let value = value.into();
        self.values.send_modify(|v| v.reduction_threshold = value);
    }

    pub fn set_dimension_reduction(&self, enabled: bool) {
        self.values.send_modify(|v| v.dimension_reduction = enabled);
    }

    /// Applies the value of the two-option reduction toggle (`"yes"` / `"no"`).
    /// Anything other than `"yes"` turns reduction off.
    pub fn select_dimension_reduction(&self, choice: &str) {
        self.set_dimension_reduction(choice == "yes");
    }

    pub fn values(&self) -> FormValues {
        self.values.borrow().clone()
    }

    /// Change notification for views bound to the inputs
    pub fn subscribe(&self) -> watch::Receiver<FormValues> {
        self.values.subscribe()
    }

    pub fn snapshot(&self) -> Result<FieldSnapshot, FieldError> {
        FieldSnapshot::try_from(&*self.values.borrow())
    }
}

impl TryFrom<&FormValues> for FieldSnapshot {
    type Error = FieldError;

    fn try_from(values: &FormValues) -> Result<Self, Self::Error> {
        let file_path = values.file_path.trim();
        if file_path.is_empty() {
            return Err(FieldError::MissingFilePath);
        }

        let article_count = parse_positive(
            &values.article_count,
            "article count",
            FieldError::MissingArticleCount,
        )?;
        let category_count = parse_positive(
            &values.category_count,
            "category count",
            FieldError::MissingCategoryCount,
        )?;

        let reduction_threshold = if values.dimension_reduction {
            Some(parse_positive(
                &values.reduction_threshold,
                "reduction threshold",
                FieldError::MissingReductionThreshold,
            )?)
        } else {
            None
        };

        Ok(Self {
            file_path: file_path.to_string(),
            article_count,
            category_count,
            dimension_reduction: values.dimension_reduction,
            reduction_threshold,
        })
    }
}

fn parse_positive(raw: &str, field: &'static str, missing: FieldError) -> Result<u64, FieldError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(missing);
    }
    match raw.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        Err(err) if *err.kind() == IntErrorKind::PosOverflow => Err(FieldError::OutOfRange {
            field,
            value: raw.to_string(),
        }),
        _ => Err(FieldError::NotAPositiveInteger {
            field,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_form() -> ParameterForm {
        let form = ParameterForm::new();
        form.set_file_path("/data/corpus");
        form.set_article_count("1000");
        form.set_category_count("5");
        form
    }

    #[test]
    fn test_complete_snapshot() {
        let snapshot = filled_form().snapshot().unwrap();
        assert_eq!(snapshot.file_path, "/data/corpus");
        assert_eq!(snapshot.article_count, 1000);
        assert_eq!(snapshot.category_count, 5);
        assert!(!snapshot.dimension_reduction);
        assert_eq!(snapshot.reduction_threshold, None);
    }

    #[test]
    fn test_values_are_trimmed() {
        let form = filled_form();
        form.set_file_path("  /data/corpus ");
        form.set_article_count(" 12 ");
        let snapshot = form.snapshot().unwrap();
        assert_eq!(snapshot.file_path, "/data/corpus");
        assert_eq!(snapshot.article_count, 12);
    }

    #[test]
    fn test_missing_fields() {
        let form = filled_form();
        form.set_file_path("   ");
        assert_eq!(form.snapshot(), Err(FieldError::MissingFilePath));

        let form = filled_form();
        form.set_article_count("");
        assert_eq!(form.snapshot(), Err(FieldError::MissingArticleCount));

        let form = filled_form();
        form.set_category_count("");
        assert_eq!(form.snapshot(), Err(FieldError::MissingCategoryCount));
    }

    #[test]
    fn test_non_positive_counts() {
        for bad in ["0", "-2", "3.5", "many"] {
            let form = filled_form();
            form.set_category_count(bad);
            assert!(matches!(
                form.snapshot(),
                Err(FieldError::NotAPositiveInteger { field: "category count", .. })
            ));
        }
    }

    #[test]
    fn test_counts_beyond_32_bits() {
        let form = filled_form();
        form.set_article_count("4294967296");
        form.set_category_count("5000000000");
        let snapshot = form.snapshot().unwrap();
        assert_eq!(snapshot.article_count, 4_294_967_296);
        assert_eq!(snapshot.category_count, 5_000_000_000);

        form.set_article_count("18446744073709551616");
        assert!(matches!(
            form.snapshot(),
            Err(FieldError::OutOfRange { field: "article count", .. })
        ));
    }

    #[test]
    fn test_threshold_only_with_reduction() {
        let form = filled_form();
        form.set_reduction_threshold("not read");
        assert_eq!(form.snapshot().unwrap().reduction_threshold, None);

        form.select_dimension_reduction("yes");
        assert!(matches!(form.snapshot(), Err(FieldError::NotAPositiveInteger { .. })));

        form.set_reduction_threshold("");
        assert_eq!(form.snapshot(), Err(FieldError::MissingReductionThreshold));

        form.set_reduction_threshold("300");
        let snapshot = form.snapshot().unwrap();
        assert!(snapshot.dimension_reduction);
        assert_eq!(snapshot.reduction_threshold, Some(300));

        form.select_dimension_reduction("no");
        assert_eq!(form.snapshot().unwrap().reduction_threshold, None);
    }

    #[test]
    fn test_snapshot_is_read_fresh() {
        let form = filled_form();
        let first = form.snapshot().unwrap();
        form.set_category_count("8");
        let second = form.snapshot().unwrap();
        assert_eq!(first.category_count, 5);
        assert_eq!(second.category_count, 8);
    }

    #[tokio::test]
    async fn test_change_notification() {
        let form = ParameterForm::new();
        let mut receiver = form.subscribe();
        let editor = form.clone();
        editor.set_file_path("/tmp/x");
        receiver.changed().await.unwrap();
        assert_eq!(receiver.borrow().file_path, "/tmp/x");
    }
}
