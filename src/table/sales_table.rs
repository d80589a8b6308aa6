use std::{collections::HashMap, fs::File, path::Path};

use memchr::memchr_iter;
use memmap2::Mmap;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::debug;

use crate::table::{
    column::{Column, ColumnType},
    summary::{Summary, SummaryRow},
    MeasureValue, ParseSummary, Reduce, RowDiagnostic, TableError,
};

/// Per-chunk parse output, merged in chunk order after the parallel scan
struct BatchResult {
    int64_batches: Vec<Vec<i64>>,
    float64_batches: Vec<Vec<f64>>,
    str_batches: Vec<Vec<(usize, usize)>>,
    row_count: usize,
    /// Data lines seen in this chunk, including dropped ones
    lines_seen: usize,
    /// Diagnostics with row numbers local to the chunk
    diagnostics: Vec<RowDiagnostic>,
}

/// Columnar view of the transactions file.
///
/// Owns the memory-mapped CSV bytes; loaded string columns are byte
/// offsets into that map, numeric columns are parsed eagerly. Columns
/// derived after load (calendar attributes) hold owned strings.
#[derive(Debug, Default)]
pub struct SalesTable {
    mmap: Option<Mmap>,
    columns: Vec<Column>,
    headers: Vec<String>,
    row_count: usize,
}

/// Canonical identifier form for a raw header: lowercase ASCII
/// alphanumerics with single underscores ("Order ID" -> "order_id",
/// "Sub-Category" -> "sub_category").
pub fn normalize_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

fn strip_cr(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

impl SalesTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a delimited transactions file into columnar storage.
    ///
    /// The file is memory-mapped and scanned as raw bytes; headers are
    /// normalized to canonical identifiers and the schema is inferred
    /// from the first data row. Chunks are parsed in parallel and merged
    /// in chunk order, so the resulting row order matches the file.
    ///
    /// Fields must not contain the delimiter. A row with the wrong field
    /// count is dropped and diagnosed; a numeric field that fails to
    /// parse is diagnosed and stored as zero so the row still counts.
    ///
    /// # Errors
    /// Returns a [`TableError`] if the file cannot be opened or mapped,
    /// or if it has no header or no data rows.
    pub fn load_csv(&mut self, path: &Path) -> Result<ParseSummary, TableError> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let buf: &[u8] = &mmap[..];

        let header_end = buf
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| TableError::Parse("missing header line".into()))?;
        let headers: Vec<String> = strip_cr(&buf[..header_end])
            .split(|&b| b == b',')
            .map(|s| normalize_header(&String::from_utf8_lossy(s)))
            .collect();

        let data_start = header_end + 1;
        let data = &buf[data_start..];

        let first_line_end = data
            .iter()
            .position(|&b| b == b'\n')
            .unwrap_or(data.len());
        if first_line_end == 0 && data.len() <= 1 {
            return Err(TableError::Parse("no data rows".into()));
        }
        let first_line = strip_cr(&data[..first_line_end]);
        let schema = Self::infer_schema(first_line, &headers)?;

        let num_threads = rayon::current_num_threads();
        let chunks = Self::find_chunk_boundaries(data, num_threads);

        let estimated_rows_per_chunk = {
            let avg_line_len = first_line.len() + 1;
            (data.len() / num_threads.max(1) / avg_line_len) + 1000
        };

        let batch_results: Vec<BatchResult> = chunks
            .par_iter()
            .map(|(start, end)| {
                Self::parse_chunk(
                    &data[*start..*end],
                    &schema,
                    &headers,
                    estimated_rows_per_chunk,
                    data_start + start,
                )
            })
            .collect();

        let mut columns: Vec<Column> = schema
            .iter()
            .map(|col_type| match col_type {
                ColumnType::Int64 => Column::new_int64(),
                ColumnType::Float64 => Column::new_float64(),
                ColumnType::Str => Column::new_str(),
            })
            .collect();

        let mut total_rows = 0;
        let mut lines_before = 0;
        let mut diagnostics = Vec::new();

        for mut batch in batch_results {
            total_rows += batch.row_count;
            diagnostics.extend(batch.diagnostics.drain(..).map(|mut d| {
                d.row += lines_before;
                d
            }));
            lines_before += batch.lines_seen;

            for (col_idx, column) in columns.iter_mut().enumerate() {
                match column {
                    Column::Int64(chunks) => {
                        chunks.push(std::mem::take(&mut batch.int64_batches[col_idx]));
                    }
                    Column::Float64(chunks) => {
                        chunks.push(std::mem::take(&mut batch.float64_batches[col_idx]));
                    }
                    Column::Str(chunks) => {
                        chunks.push(std::mem::take(&mut batch.str_batches[col_idx]));
                    }
                    Column::OwnedStr(_) => unreachable!("loader never infers owned strings"),
                }
            }
        }

        debug!(rows = total_rows, columns = headers.len(), "csv parsed");

        self.mmap = Some(mmap);
        self.columns = columns;
        self.headers = headers;
        self.row_count = total_rows;

        Ok(ParseSummary {
            rows_loaded: total_rows,
            diagnostics,
        })
    }

    fn infer_schema(first_line: &[u8], headers: &[String]) -> Result<Vec<ColumnType>, TableError> {
        let fields: Vec<&[u8]> = first_line.split(|&b| b == b',').collect();

        if fields.len() != headers.len() {
            return Err(TableError::Parse(format!(
                "header/data mismatch: {} vs {}",
                headers.len(),
                fields.len()
            )));
        }

        let schema: Vec<ColumnType> = fields
            .iter()
            .map(|field| {
                if atoi_simd::parse::<i64>(field).is_ok() {
                    ColumnType::Int64
                } else if fast_float::parse::<f64, _>(field).is_ok() {
                    ColumnType::Float64
                } else {
                    ColumnType::Str
                }
            })
            .collect();

        Ok(schema)
    }

    fn find_chunk_boundaries(data: &[u8], num_chunks: usize) -> Vec<(usize, usize)> {
        if data.is_empty() {
            return vec![];
        }

        let num_chunks = num_chunks.max(1);
        let chunk_size = data.len() / num_chunks;
        let mut boundaries = Vec::with_capacity(num_chunks);
        let mut start = 0;

        for i in 0..num_chunks.saturating_sub(1) {
            let mut end = (i + 1) * chunk_size;

            while end < data.len() && data[end] != b'\n' {
                end += 1;
            }

            if end < data.len() {
                end += 1; // include the newline
            }

            if start < end {
                boundaries.push((start, end));
            }
            start = end;
        }

        if start < data.len() {
            boundaries.push((start, data.len()));
        }

        boundaries
    }

    fn parse_chunk(
        chunk: &[u8],
        schema: &[ColumnType],
        headers: &[String],
        estimated_rows: usize,
        chunk_offset: usize,
    ) -> BatchResult {
        let num_cols = schema.len();

        let mut int64_cols: Vec<Vec<i64>> = (0..num_cols)
            .map(|i| {
                if matches!(schema[i], ColumnType::Int64) {
                    Vec::with_capacity(estimated_rows)
                } else {
                    Vec::new()
                }
            })
            .collect();

        let mut float64_cols: Vec<Vec<f64>> = (0..num_cols)
            .map(|i| {
                if matches!(schema[i], ColumnType::Float64) {
                    Vec::with_capacity(estimated_rows)
                } else {
                    Vec::new()
                }
            })
            .collect();

        let mut str_cols: Vec<Vec<(usize, usize)>> = (0..num_cols)
            .map(|i| {
                if matches!(schema[i], ColumnType::Str) {
                    Vec::with_capacity(estimated_rows)
                } else {
                    Vec::new()
                }
            })
            .collect();

        let mut diagnostics = Vec::new();
        let mut row_count = 0;
        let mut lines_seen = 0;
        let mut fields: Vec<&[u8]> = Vec::with_capacity(num_cols);

        let mut start = 0;
        let mut line_spans: Vec<(usize, usize)> = Vec::new();
        for newline_pos in memchr_iter(b'\n', chunk) {
            line_spans.push((start, newline_pos));
            start = newline_pos + 1;
        }
        if start < chunk.len() {
            // final line without a trailing newline
            line_spans.push((start, chunk.len()));
        }

        for (line_start, line_end) in line_spans {
            let line = strip_cr(&chunk[line_start..line_end]);

            if line.is_empty() {
                continue;
            }
            lines_seen += 1;

            let absolute_line_offset = chunk_offset + line_start;

            fields.clear();
            let mut field_start = 0;
            for comma_pos in memchr_iter(b',', line) {
                fields.push(&line[field_start..comma_pos]);
                field_start = comma_pos + 1;
            }
            fields.push(&line[field_start..]);

            if fields.len() != num_cols {
                diagnostics.push(RowDiagnostic {
                    row: lines_seen,
                    column: String::new(),
                    value: String::from_utf8_lossy(line).into_owned(),
                    reason: format!("expected {} fields, got {}", num_cols, fields.len()),
                });
                continue;
            }

            for col_idx in 0..num_cols {
                match schema[col_idx] {
                    ColumnType::Int64 => match atoi_simd::parse::<i64>(fields[col_idx]) {
                        Ok(value) => int64_cols[col_idx].push(value),
                        Err(e) => {
                            diagnostics.push(RowDiagnostic {
                                row: lines_seen,
                                column: headers[col_idx].clone(),
                                value: String::from_utf8_lossy(fields[col_idx]).into_owned(),
                                reason: e.to_string(),
                            });
                            // missing numeric counts as zero
                            int64_cols[col_idx].push(0);
                        }
                    },
                    ColumnType::Float64 => match fast_float::parse::<f64, _>(fields[col_idx]) {
                        Ok(value) => float64_cols[col_idx].push(value),
                        Err(e) => {
                            diagnostics.push(RowDiagnostic {
                                row: lines_seen,
                                column: headers[col_idx].clone(),
                                value: String::from_utf8_lossy(fields[col_idx]).into_owned(),
                                reason: e.to_string(),
                            });
                            float64_cols[col_idx].push(0.0);
                        }
                    },
                    ColumnType::Str => {
                        let field_offset_in_line =
                            fields[col_idx].as_ptr() as usize - line.as_ptr() as usize;
                        let absolute_start = absolute_line_offset + field_offset_in_line;
                        let absolute_end = absolute_start + fields[col_idx].len();
                        str_cols[col_idx].push((absolute_start, absolute_end));
                    }
                }
            }

            row_count += 1;
        }

        BatchResult {
            int64_batches: int64_cols,
            float64_batches: float64_cols,
            str_batches: str_cols,
            row_count,
            lines_seen,
            diagnostics,
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    /// Appends a derived column; its length must match the table.
    pub fn add_column(&mut self, name: &str, column: Column) -> Result<(), TableError> {
        if column.total_len() != self.row_count {
            return Err(TableError::Parse(format!(
                "derived column '{}' has {} rows, table has {}",
                name,
                column.total_len(),
                self.row_count
            )));
        }
        self.headers.push(name.to_string());
        self.columns.push(column);
        Ok(())
    }

    /// Slices the mapped file for a stored string field
    pub fn slice_bytes(&self, start: usize, end: usize) -> Result<&[u8], TableError> {
        let mmap = self.mmap.as_ref().ok_or(TableError::MmapNotLoaded)?;

        if end > mmap.len() || start > end {
            return Err(TableError::Parse("invalid byte range".into()));
        }

        Ok(&mmap[start..end])
    }

    pub fn get_col(&self, col_name: &str) -> Result<&Column, TableError> {
        let col_pos = self
            .headers
            .iter()
            .position(|cn| cn == col_name)
            .ok_or_else(|| TableError::MissingColumn(col_name.to_string()))?;

        self.columns
            .get(col_pos)
            .ok_or_else(|| TableError::MissingColumn(col_name.to_string()))
    }

    /// Materializes a column as grouping-key strings.
    ///
    /// String and derived columns group by value; integer columns group
    /// by their decimal form (years). Floats are not grouping keys.
    pub(crate) fn key_strings(&self, column: &str) -> Result<Vec<String>, TableError> {
        let col = self.get_col(column)?;
        match col {
            Column::Str(_) => col
                .iter_str_offsets()
                .map(|(s, e)| {
                    self.slice_bytes(s, e)
                        .map(|b| String::from_utf8_lossy(b).into_owned())
                })
                .collect(),
            Column::OwnedStr(_) => Ok(col.iter_owned_str().map(str::to_owned).collect()),
            Column::Int64(_) => Ok(col.iter_i64().map(|v| v.to_string()).collect()),
            Column::Float64(_) => Err(TableError::TypeMismatch {
                column: column.to_string(),
                expected: "a grouping key (string or integer)",
            }),
        }
    }

    /// Materializes a numeric column as f64 measure inputs
    fn numeric_values(&self, column: &str) -> Result<Vec<f64>, TableError> {
        let col = self.get_col(column)?;
        match col {
            Column::Float64(_) => Ok(col.iter_f64().collect()),
            Column::Int64(_) => Ok(col.iter_i64().map(|v| v as f64).collect()),
            _ => Err(TableError::TypeMismatch {
                column: column.to_string(),
                expected: "numeric",
            }),
        }
    }

    /// Table-wide reduction over one column, without grouping.
    ///
    /// This is the reference value for the partition property: grouped
    /// sums and counts must total to it.
    pub fn aggregate(&self, column: &str, op: Reduce) -> Result<MeasureValue, TableError> {
        match op {
            Reduce::Count => {
                let col = self.get_col(column)?;
                Ok(MeasureValue::Int(col.total_len() as i64))
            }
            Reduce::Sum => {
                let values = self.numeric_values(column)?;
                Ok(MeasureValue::Float(values.iter().sum()))
            }
            Reduce::Avg => {
                let values = self.numeric_values(column)?;
                if values.is_empty() {
                    return Err(TableError::Parse("empty column".into()));
                }
                Ok(MeasureValue::Float(
                    values.iter().sum::<f64>() / values.len() as f64,
                ))
            }
        }
    }

    /// Core grouped reduction shared by the named operations and the
    /// query builder. Partitions every row by equality on one or two
    /// key columns; groups materialize in first-occurrence order, which
    /// is the tie-break order for later stable sorts.
    pub(crate) fn grouped(
        &self,
        key_columns: &[&str],
        measures: &[(Option<String>, Reduce, String)],
    ) -> Result<Summary, TableError> {
        if key_columns.is_empty() || key_columns.len() > 2 {
            return Err(TableError::Parse(
                "grouping requires one or two key columns".into(),
            ));
        }
        if measures.is_empty() {
            return Err(TableError::Parse("grouping requires a measure".into()));
        }

        let key_vecs: Vec<Vec<String>> = key_columns
            .iter()
            .map(|c| self.key_strings(c))
            .collect::<Result<_, _>>()?;

        let value_vecs: Vec<Option<Vec<f64>>> = measures
            .iter()
            .map(|(col, op, _)| match (col, op) {
                (_, Reduce::Count) => Ok(None),
                (Some(col), _) => self.numeric_values(col).map(Some),
                (None, _) => Err(TableError::Parse(
                    "sum/avg measures need a value column".into(),
                )),
            })
            .collect::<Result<_, _>>()?;

        let mut index: HashMap<Vec<String>, usize> = HashMap::new();
        let mut groups: Vec<(Vec<String>, Vec<(f64, usize)>)> = Vec::new();

        for row in 0..self.row_count {
            let key: Vec<String> = key_vecs.iter().map(|k| k[row].clone()).collect();
            let slot = match index.get(&key) {
                Some(&i) => i,
                None => {
                    groups.push((key.clone(), vec![(0.0, 0); measures.len()]));
                    index.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };
            for (m, values) in value_vecs.iter().enumerate() {
                let acc = &mut groups[slot].1[m];
                if let Some(values) = values {
                    acc.0 += values[row];
                }
                acc.1 += 1;
            }
        }

        let rows = groups
            .into_iter()
            .map(|(keys, accs)| {
                let cells = measures
                    .iter()
                    .zip(accs)
                    .map(|((_, op, _), (sum, count))| match op {
                        Reduce::Sum => MeasureValue::Float(sum),
                        Reduce::Count => MeasureValue::Int(count as i64),
                        Reduce::Avg => MeasureValue::Float(sum / count as f64),
                    })
                    .collect();
                SummaryRow {
                    keys,
                    measures: cells,
                }
            })
            .collect();

        Ok(Summary::new(
            key_columns.iter().map(|s| s.to_string()).collect(),
            measures.iter().map(|(_, _, name)| name.clone()).collect(),
            rows,
        ))
    }

    /// Partitions rows by the key columns and sums `value_column` per
    /// partition. Missing values contribute zero (see `load_csv`).
    pub fn group_and_sum(
        &self,
        key_columns: &[&str],
        value_column: &str,
    ) -> Result<Summary, TableError> {
        self.grouped(
            key_columns,
            &[(
                Some(value_column.to_string()),
                Reduce::Sum,
                value_column.to_string(),
            )],
        )
    }

    /// Partitions rows by the key columns; the measure is partition
    /// cardinality, named `count`.
    pub fn group_and_count(&self, key_columns: &[&str]) -> Result<Summary, TableError> {
        self.grouped(key_columns, &[(None, Reduce::Count, "count".to_string())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_from_str(csv: &str) -> (SalesTable, ParseSummary) {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "{}", csv).unwrap();

        let mut table = SalesTable::new();
        let summary = table.load_csv(tmp.path()).unwrap();
        (table, summary)
    }

    #[test]
    fn headers_are_normalized() {
        let (table, _) = table_from_str("Order ID,Sub-Category,Sales\nCA-1,Chairs,10.5\n");
        assert_eq!(table.headers(), &["order_id", "sub_category", "sales"]);
        assert!(table.has_column("sub_category"));
    }

    #[test]
    fn row_count_excludes_header() {
        let (table, summary) = table_from_str("id,sales\na,10.5\nb,20.5\nc,30.0\n");
        assert_eq!(table.row_count(), 3);
        assert_eq!(summary.rows_loaded, 3);
        assert!(summary.diagnostics.is_empty());
    }

    #[test]
    fn final_line_without_newline_is_kept() {
        let (table, _) = table_from_str("id,sales\na,10.5\nb,20.5");
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn group_and_sum_partitions_by_state() {
        let (table, _) =
            table_from_str("state,sales\nCA,100.0\nCA,50.0\nNY,30.0\n");
        let summary = table.group_and_sum(&["state"], "sales").unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary.measure_for(&["CA"], "sales"), Some(150.0));
        assert_eq!(summary.measure_for(&["NY"], "sales"), Some(30.0));
    }

    #[test]
    fn grouped_sums_total_to_table_aggregate() {
        let (table, _) =
            table_from_str("state,sales\nCA,100.0\nNY,30.0\nCA,50.0\nTX,7.5\n");
        let summary = table.group_and_sum(&["state"], "sales").unwrap();
        let table_total = match table.aggregate("sales", Reduce::Sum).unwrap() {
            MeasureValue::Float(v) => v,
            other => panic!("expected float total, got {:?}", other),
        };
        assert!((summary.measure_total("sales").unwrap() - table_total).abs() < 1e-9);

        let counted = table.group_and_count(&["state"]).unwrap();
        assert!(
            (counted.measure_total("count").unwrap() - table.row_count() as f64).abs() < f64::EPSILON
        );
    }

    #[test]
    fn two_key_grouping_partitions_exactly() {
        let csv = "region,year,sales\nWest,2016,10.0\nWest,2017,20.0\nEast,2016,5.0\nWest,2016,2.5\n";
        let (table, _) = table_from_str(csv);
        let summary = table.group_and_sum(&["region", "year"], "sales").unwrap();
        assert_eq!(summary.len(), 3);
        assert_eq!(summary.measure_for(&["West", "2016"], "sales"), Some(12.5));
        assert!((summary.measure_total("sales").unwrap() - 37.5).abs() < 1e-9);
    }

    #[test]
    fn malformed_numeric_field_is_diagnosed_and_zeroed() {
        let (table, summary) = table_from_str("state,sales\nCA,100.5\nNY,oops\nCA,50.0\n");
        assert_eq!(table.row_count(), 3);
        assert_eq!(summary.diagnostics.len(), 1);
        assert_eq!(summary.diagnostics[0].row, 2);
        assert_eq!(summary.diagnostics[0].column, "sales");

        let grouped = table.group_and_sum(&["state"], "sales").unwrap();
        assert_eq!(grouped.measure_for(&["NY"], "sales"), Some(0.0));
    }

    #[test]
    fn short_row_is_dropped_with_diagnostic() {
        let (table, summary) = table_from_str("state,sales\nCA,100.5\nNY\nTX,25.0\n");
        assert_eq!(table.row_count(), 2);
        assert_eq!(summary.diagnostics.len(), 1);
        assert!(summary.diagnostics[0].reason.contains("expected 2 fields"));
    }

    #[test]
    fn integer_keys_group_by_decimal_form() {
        let (table, _) = table_from_str("year,sales\n2016,10.0\n2017,20.0\n2016,5.0\n");
        let summary = table.group_and_sum(&["year"], "sales").unwrap();
        assert_eq!(summary.measure_for(&["2016"], "sales"), Some(15.0));
    }

    #[test]
    fn grouping_by_float_column_is_rejected() {
        let (table, _) = table_from_str("state,sales\nCA,1.5\n");
        let err = table.group_and_sum(&["sales"], "sales").unwrap_err();
        assert!(matches!(err, TableError::TypeMismatch { .. }));
    }

    #[test]
    fn missing_column_is_reported() {
        let (table, _) = table_from_str("state,sales\nCA,1.5\n");
        let err = table.group_and_sum(&["segment"], "sales").unwrap_err();
        assert!(matches!(err, TableError::MissingColumn(name) if name == "segment"));
    }
}
