use std::cmp::Ordering;

use crate::table::{MeasureValue, TableError};

/// One group of a summary: key values plus measure cells, positionally
/// aligned with the parent's key/measure column names.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub keys: Vec<String>,
    pub measures: Vec<MeasureValue>,
}

/// Output of one aggregation: a small table mapping group keys to
/// measures. Rows sit in first-occurrence order until a presentation
/// sort reorders them; every operation returns a new value.
#[derive(Debug, Clone)]
pub struct Summary {
    key_columns: Vec<String>,
    measure_columns: Vec<String>,
    rows: Vec<SummaryRow>,
}

impl Summary {
    pub fn new(
        key_columns: Vec<String>,
        measure_columns: Vec<String>,
        rows: Vec<SummaryRow>,
    ) -> Self {
        Self {
            key_columns,
            measure_columns,
            rows,
        }
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    pub fn measure_columns(&self) -> &[String] {
        &self.measure_columns
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn measure_index(&self, measure: &str) -> Result<usize, TableError> {
        self.measure_columns
            .iter()
            .position(|m| m == measure)
            .ok_or_else(|| TableError::MissingMeasure(measure.to_string()))
    }

    /// Test/report convenience: measure value for an exact key match
    pub fn measure_for(&self, keys: &[&str], measure: &str) -> Option<f64> {
        let idx = self.measure_index(measure).ok()?;
        self.rows
            .iter()
            .find(|row| row.keys.iter().map(String::as_str).eq(keys.iter().copied()))
            .and_then(|row| row.measures[idx].as_f64())
    }

    /// Column total across all groups; `Missing` cells contribute zero
    pub fn measure_total(&self, measure: &str) -> Result<f64, TableError> {
        let idx = self.measure_index(measure)?;
        Ok(self
            .rows
            .iter()
            .map(|row| row.measures[idx].chart_value())
            .sum())
    }

    /// Appends the elementwise quotient `numerator / denominator` as a
    /// new measure column. A zero or missing denominator yields the
    /// explicit [`MeasureValue::Missing`] sentinel, never NaN or Inf.
    pub fn derive_ratio(
        &self,
        numerator: &str,
        denominator: &str,
        alias: &str,
    ) -> Result<Summary, TableError> {
        let num_idx = self.measure_index(numerator)?;
        let den_idx = self.measure_index(denominator)?;

        let rows = self
            .rows
            .iter()
            .map(|row| {
                let quotient = match (row.measures[num_idx].as_f64(), row.measures[den_idx].as_f64())
                {
                    (Some(num), Some(den)) if den != 0.0 => MeasureValue::Float(num / den),
                    _ => MeasureValue::Missing,
                };
                let mut measures = row.measures.clone();
                measures.push(quotient);
                SummaryRow {
                    keys: row.keys.clone(),
                    measures,
                }
            })
            .collect();

        let mut measure_columns = self.measure_columns.clone();
        measure_columns.push(alias.to_string());

        Ok(Summary::new(self.key_columns.clone(), measure_columns, rows))
    }

    /// Full descending sort by `sort_key`. The sort is stable, so equal
    /// measures keep their first-occurrence order; `Missing` sinks to
    /// the end.
    pub fn sorted_desc(&self, sort_key: &str) -> Result<Summary, TableError> {
        let idx = self.measure_index(sort_key)?;
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            let av = a.measures[idx].as_f64().unwrap_or(f64::NEG_INFINITY);
            let bv = b.measures[idx].as_f64().unwrap_or(f64::NEG_INFINITY);
            bv.partial_cmp(&av).unwrap_or(Ordering::Equal)
        });
        Ok(Summary::new(
            self.key_columns.clone(),
            self.measure_columns.clone(),
            rows,
        ))
    }

    /// Stable descending sort by `sort_key`, truncated to `n` rows.
    /// Idempotent, and always a prefix of [`Summary::sorted_desc`].
    pub fn top_n(&self, n: usize, sort_key: &str) -> Result<Summary, TableError> {
        let mut sorted = self.sorted_desc(sort_key)?;
        sorted.rows.truncate(n);
        Ok(sorted)
    }

    /// Presentation reorder of single-key summaries by a fixed label
    /// order (calendar orderings). Labels absent from `order` sink to
    /// the end in their existing relative order.
    pub fn sort_by_key_order(&self, order: &[&str]) -> Summary {
        let mut rows = self.rows.clone();
        rows.sort_by_key(|row| {
            order
                .iter()
                .position(|label| Some(*label) == row.keys.first().map(String::as_str))
                .unwrap_or(usize::MAX)
        });
        Summary::new(self.key_columns.clone(), self.measure_columns.clone(), rows)
    }

    /// Narrows the summary to a single named measure, keeping the keys.
    /// Charts draw the first measure, so this picks what gets drawn.
    pub fn project_measure(&self, measure: &str) -> Result<Summary, TableError> {
        let idx = self.measure_index(measure)?;
        let rows = self
            .rows
            .iter()
            .map(|row| SummaryRow {
                keys: row.keys.clone(),
                measures: vec![row.measures[idx]],
            })
            .collect();
        Ok(Summary::new(
            self.key_columns.clone(),
            vec![measure.to_string()],
            rows,
        ))
    }

    /// Keeps only the rows matching `predicate`
    pub fn retain_rows(&self, predicate: impl Fn(&SummaryRow) -> bool) -> Summary {
        let rows = self.rows.iter().filter(|r| predicate(r)).cloned().collect();
        Summary::new(self.key_columns.clone(), self.measure_columns.clone(), rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_summary() -> Summary {
        Summary::new(
            vec!["state".into()],
            vec!["sales".into()],
            vec![
                SummaryRow {
                    keys: vec!["CA".into()],
                    measures: vec![MeasureValue::Float(150.0)],
                },
                SummaryRow {
                    keys: vec!["NY".into()],
                    measures: vec![MeasureValue::Float(30.0)],
                },
                SummaryRow {
                    keys: vec!["TX".into()],
                    measures: vec![MeasureValue::Float(30.0)],
                },
                SummaryRow {
                    keys: vec!["WA".into()],
                    measures: vec![MeasureValue::Float(75.0)],
                },
            ],
        )
    }

    #[test]
    fn top_n_truncates_the_full_sort() {
        let summary = state_summary();
        let top1 = summary.top_n(1, "sales").unwrap();
        assert_eq!(top1.len(), 1);
        assert_eq!(top1.rows()[0].keys, vec!["CA".to_string()]);
        assert_eq!(top1.measure_for(&["CA"], "sales"), Some(150.0));

        // prefix of the full descending sort
        let full = summary.sorted_desc("sales").unwrap();
        let top3 = summary.top_n(3, "sales").unwrap();
        assert_eq!(&full.rows()[..3], top3.rows());
    }

    #[test]
    fn top_n_is_idempotent() {
        let summary = state_summary();
        let once = summary.top_n(3, "sales").unwrap();
        let twice = once.top_n(3, "sales").unwrap();
        assert_eq!(once.rows(), twice.rows());
    }

    #[test]
    fn ties_keep_first_occurrence_order() {
        let sorted = state_summary().sorted_desc("sales").unwrap();
        let keys: Vec<&str> = sorted.rows().iter().map(|r| r.keys[0].as_str()).collect();
        // NY and TX are tied at 30.0; NY appeared first
        assert_eq!(keys, vec!["CA", "WA", "NY", "TX"]);
    }

    #[test]
    fn ratio_by_zero_yields_missing() {
        let summary = Summary::new(
            vec!["segment".into()],
            vec!["sales".into(), "count".into()],
            vec![
                SummaryRow {
                    keys: vec!["Consumer".into()],
                    measures: vec![MeasureValue::Float(100.0), MeasureValue::Int(4)],
                },
                SummaryRow {
                    keys: vec!["Corporate".into()],
                    measures: vec![MeasureValue::Float(10.0), MeasureValue::Int(0)],
                },
            ],
        );

        let with_ratio = summary.derive_ratio("sales", "count", "avg_sale").unwrap();
        assert_eq!(with_ratio.measure_for(&["Consumer"], "avg_sale"), Some(25.0));

        let idx = with_ratio.measure_index("avg_sale").unwrap();
        assert_eq!(with_ratio.rows()[1].measures[idx], MeasureValue::Missing);
        assert_eq!(with_ratio.rows()[1].measures[idx].to_string(), "n/a");
    }

    #[test]
    fn missing_sorts_last() {
        let summary = Summary::new(
            vec!["k".into()],
            vec!["m".into()],
            vec![
                SummaryRow {
                    keys: vec!["a".into()],
                    measures: vec![MeasureValue::Missing],
                },
                SummaryRow {
                    keys: vec!["b".into()],
                    measures: vec![MeasureValue::Float(1.0)],
                },
            ],
        );
        let sorted = summary.sorted_desc("m").unwrap();
        assert_eq!(sorted.rows()[0].keys[0], "b");
        assert_eq!(sorted.rows()[1].keys[0], "a");
    }

    #[test]
    fn key_order_sort_puts_unknown_labels_last() {
        let summary = Summary::new(
            vec!["month".into()],
            vec!["sales".into()],
            vec![
                SummaryRow {
                    keys: vec!["Mar".into()],
                    measures: vec![MeasureValue::Float(1.0)],
                },
                SummaryRow {
                    keys: vec!["Unknown".into()],
                    measures: vec![MeasureValue::Float(2.0)],
                },
                SummaryRow {
                    keys: vec!["Jan".into()],
                    measures: vec![MeasureValue::Float(3.0)],
                },
            ],
        );
        let sorted = summary.sort_by_key_order(&["Jan", "Feb", "Mar"]);
        let keys: Vec<&str> = sorted.rows().iter().map(|r| r.keys[0].as_str()).collect();
        assert_eq!(keys, vec!["Jan", "Mar", "Unknown"]);
    }

    #[test]
    fn retain_rows_filters_without_mutating() {
        let summary = state_summary();
        let big = summary.retain_rows(|row| row.measures[0].chart_value() > 50.0);
        assert_eq!(big.len(), 2);
        assert_eq!(summary.len(), 4);
    }

    #[test]
    fn project_measure_narrows_to_one_column() {
        let summary = Summary::new(
            vec!["segment".into()],
            vec!["sales".into(), "count".into()],
            vec![SummaryRow {
                keys: vec!["Consumer".into()],
                measures: vec![MeasureValue::Float(100.0), MeasureValue::Int(4)],
            }],
        );
        let projected = summary.project_measure("count").unwrap();
        assert_eq!(projected.measure_columns(), &["count".to_string()]);
        assert_eq!(projected.rows()[0].measures, vec![MeasureValue::Int(4)]);
    }

    #[test]
    fn unknown_measure_is_reported() {
        let err = state_summary().top_n(1, "profit").unwrap_err();
        assert!(matches!(err, TableError::MissingMeasure(name) if name == "profit"));
    }
}
