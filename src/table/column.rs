#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    Float64,
    Str,
}

/// Chunked columnar storage.
///
/// Loaded columns keep one chunk per parse batch; `Str` stores absolute
/// byte offsets into the mapped CSV, `OwnedStr` holds materialized
/// strings for columns synthesized after load (calendar attributes).
#[derive(Debug, Clone)]
pub enum Column {
    Int64(Vec<Vec<i64>>),
    Float64(Vec<Vec<f64>>),
    Str(Vec<Vec<(usize, usize)>>),
    OwnedStr(Vec<Vec<String>>),
}

impl Column {
    pub fn new_int64() -> Self {
        Column::Int64(Vec::new())
    }

    pub fn new_float64() -> Self {
        Column::Float64(Vec::new())
    }

    pub fn new_str() -> Self {
        Column::Str(Vec::new())
    }

    /// Single-chunk column of materialized strings
    pub fn from_strings(values: Vec<String>) -> Self {
        Column::OwnedStr(vec![values])
    }

    pub fn iter_i64(&self) -> impl Iterator<Item = i64> + '_ {
        if let Column::Int64(chunks) = self {
            chunks.iter().flat_map(|chunk| chunk.iter().copied())
        } else {
            panic!("Wrong type")
        }
    }

    pub fn iter_f64(&self) -> impl Iterator<Item = f64> + '_ {
        if let Column::Float64(chunks) = self {
            chunks.iter().flat_map(|chunk| chunk.iter().copied())
        } else {
            panic!("Wrong type")
        }
    }

    pub fn iter_str_offsets(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        if let Column::Str(chunks) = self {
            chunks.iter().flat_map(|chunk| chunk.iter().copied())
        } else {
            panic!("Wrong type")
        }
    }

    pub fn iter_owned_str(&self) -> impl Iterator<Item = &str> + '_ {
        if let Column::OwnedStr(chunks) = self {
            chunks.iter().flat_map(|chunk| chunk.iter().map(String::as_str))
        } else {
            panic!("Wrong type")
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Int64(_) | Column::Float64(_))
    }

    pub fn total_len(&self) -> usize {
        match self {
            Column::Int64(chunks) => chunks.iter().map(|c| c.len()).sum(),
            Column::Float64(chunks) => chunks.iter().map(|c| c.len()).sum(),
            Column::Str(chunks) => chunks.iter().map(|c| c.len()).sum(),
            Column::OwnedStr(chunks) => chunks.iter().map(|c| c.len()).sum(),
        }
    }
}
