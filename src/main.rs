use std::path::Path;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use salescope::calendar::derive_calendar_fields;
use salescope::report;
use salescope::table::{sales_table::SalesTable, Reduce, RowDiagnostic};

#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

const INPUT_CSV: &str = "data/superstore.csv";
const CHART_DIR: &str = "charts";
const MAX_LOGGED_DIAGNOSTICS: usize = 20;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let input = Path::new(INPUT_CSV);
    let mut table = SalesTable::new();
    let parse = table
        .load_csv(input)
        .with_context(|| format!("loading {}", input.display()))?;
    info!(rows = parse.rows_loaded, "transactions loaded");
    log_diagnostics("load", &parse.diagnostics);

    let calendar_diagnostics =
        derive_calendar_fields(&mut table, "order_date").context("deriving calendar fields")?;
    log_diagnostics("calendar", &calendar_diagnostics);

    let total = table
        .aggregate("sales", Reduce::Sum)
        .context("totalling sales")?;
    info!(%total, "table-wide sales");

    let outcomes = report::run_all(&table, Path::new(CHART_DIR)).context("running analyses")?;
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(
        rendered = outcomes.len() - failed,
        failed, "analysis run complete"
    );

    Ok(())
}

fn log_diagnostics(stage: &str, diagnostics: &[RowDiagnostic]) {
    for diagnostic in diagnostics.iter().take(MAX_LOGGED_DIAGNOSTICS) {
        warn!(stage, %diagnostic, "row diagnostic");
    }
    if diagnostics.len() > MAX_LOGGED_DIAGNOSTICS {
        warn!(
            stage,
            suppressed = diagnostics.len() - MAX_LOGGED_DIAGNOSTICS,
            "further diagnostics suppressed"
        );
    }
}
