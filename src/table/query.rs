use crate::table::{sales_table::SalesTable, summary::Summary, Reduce, TableError};

/// Fluent specification of one grouped summary: one or two key columns,
/// one or more measures, optionally truncated to the top N groups by
/// the first measure.
///
/// This is the contract surface of the aggregation pipeline: a grouping
/// key specification plus a measure specification, executed against the
/// cleaned table.
#[derive(Debug, Clone)]
pub struct SummaryQuery<'a> {
    table: &'a SalesTable,
    group_columns: Vec<String>,
    measures: Vec<(Option<String>, Reduce, Option<String>)>,
    limit: Option<usize>,
}

impl<'a> SummaryQuery<'a> {
    pub fn new(table: &'a SalesTable) -> Self {
        Self {
            table,
            group_columns: Vec::new(),
            measures: Vec::new(),
            limit: None,
        }
    }

    /// Adds a grouping key column
    pub fn group_by(mut self, column: &str) -> Self {
        self.group_columns.push(column.to_string());
        self
    }

    /// Sum of a value column, named after the column
    pub fn sum(self, column: &str) -> Self {
        self.measure(Some(column), Reduce::Sum, None)
    }

    /// Sum of a value column under an explicit measure name
    pub fn sum_as(self, column: &str, alias: &str) -> Self {
        self.measure(Some(column), Reduce::Sum, Some(alias))
    }

    /// Partition cardinality, named `count`
    pub fn count(self) -> Self {
        self.measure(None, Reduce::Count, None)
    }

    /// Partition cardinality under an explicit measure name
    pub fn count_as(self, alias: &str) -> Self {
        self.measure(None, Reduce::Count, Some(alias))
    }

    /// Mean of a value column, named `avg_<column>`
    pub fn avg(self, column: &str) -> Self {
        self.measure(Some(column), Reduce::Avg, None)
    }

    fn measure(mut self, column: Option<&str>, op: Reduce, alias: Option<&str>) -> Self {
        self.measures
            .push((column.map(str::to_owned), op, alias.map(str::to_owned)));
        self
    }

    /// Keeps only the top `n` groups by the first measure, descending
    pub fn top(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Runs the grouped reduction and returns the summary table
    pub fn execute(self) -> Result<Summary, TableError> {
        let specs: Vec<(Option<String>, Reduce, String)> = self
            .measures
            .iter()
            .map(|(column, op, alias)| {
                let name = alias.clone().unwrap_or_else(|| match (column, op) {
                    (_, Reduce::Count) => "count".to_string(),
                    (Some(col), Reduce::Avg) => format!("avg_{}", col),
                    (Some(col), _) => col.clone(),
                    (None, _) => "measure".to_string(),
                });
                (column.clone(), *op, name)
            })
            .collect();

        let group_refs: Vec<&str> = self.group_columns.iter().map(String::as_str).collect();
        let summary = self.table.grouped(&group_refs, &specs)?;

        match self.limit {
            Some(n) => summary.top_n(n, &specs[0].2),
            None => Ok(summary),
        }
    }
}

impl SalesTable {
    /// Starts a summary specification against this table
    pub fn summarize(&self) -> SummaryQuery<'_> {
        SummaryQuery::new(self)
    }
}
