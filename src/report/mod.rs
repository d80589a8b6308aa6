//! The fixed analysis sequence. Each question computes one summary and
//! renders one chart; questions are independent, so a failure in one is
//! logged and reported without stopping the rest.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info};

use crate::chart::{self, ChartError};
use crate::table::{sales_table::SalesTable, TableError};

mod questions;

pub use questions::{questions, Question};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Chart(#[from] ChartError),

    #[error("cannot create chart directory: {0}")]
    OutputDir(std::io::Error),
}

/// What happened to one question: where its chart was meant to go and
/// whether it got there.
#[derive(Debug)]
pub struct QuestionOutcome {
    pub slug: &'static str,
    pub chart_path: PathBuf,
    pub result: Result<(), ReportError>,
}

/// Computes and renders every question against the cleaned table.
///
/// Only the output directory is shared state; each summary is computed
/// fresh from the table, in sequence, and failures stay local to their
/// question.
pub fn run_all(table: &SalesTable, out_dir: &Path) -> Result<Vec<QuestionOutcome>, ReportError> {
    fs::create_dir_all(out_dir).map_err(ReportError::OutputDir)?;

    let mut outcomes = Vec::with_capacity(questions().len());
    for question in questions() {
        let chart_path = out_dir.join(format!("{}.png", question.slug));
        let result = run_one(&question, table, &chart_path);
        match &result {
            Ok(()) => info!(
                slug = question.slug,
                chart = %chart_path.display(),
                "summary rendered"
            ),
            Err(err) => error!(slug = question.slug, %err, "summary failed"),
        }
        outcomes.push(QuestionOutcome {
            slug: question.slug,
            chart_path,
            result,
        });
    }

    Ok(outcomes)
}

fn run_one(
    question: &Question,
    table: &SalesTable,
    chart_path: &Path,
) -> Result<(), ReportError> {
    let summary = (question.build)(table)?;
    chart::render(&summary, question.kind, question.title, chart_path)?;
    Ok(())
}
