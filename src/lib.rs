//! # salescope
//!
//! `salescope` is a one-shot exploratory-analysis tool for a retail
//! sales dataset. It loads a transactions CSV into columnar storage,
//! derives calendar attributes from the order date, computes a fixed
//! sequence of grouped summaries, and renders each one as a chart.
//!
//! - Memory-mapped CSV loading with parallel chunk parsing
//! - Header normalization to canonical snake_case identifiers
//! - Grouped sums, counts, and averages over one or two key columns
//! - Calendar derivation: month, year, weekday, season
//! - Stable top-N, ratio derivation with an explicit `n/a` sentinel
//! - Bar, line, pie, and stacked-percentage charts (plotters)
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use salescope::calendar::derive_calendar_fields;
//! use salescope::table::sales_table::SalesTable;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut table = SalesTable::new();
//!     table.load_csv(Path::new("data/superstore.csv"))?;
//!     derive_calendar_fields(&mut table, "order_date")?;
//!
//!     let by_state = table.group_and_sum(&["state"], "sales")?.top_n(10, "sales")?;
//!     for row in by_state.rows() {
//!         println!("{} => {}", row.keys[0], row.measures[0]);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod calendar;
pub mod chart;
pub mod report;
pub mod table;
