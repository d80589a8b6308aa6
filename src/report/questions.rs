use tracing::info;

use crate::calendar::{MONTH_LABELS, SEASON_LABELS, WEEKDAY_LABELS};
use crate::chart::ChartKind;
use crate::table::{
    sales_table::SalesTable,
    summary::{Summary, SummaryRow},
    MeasureValue, TableError,
};

/// One analysis question: a slug for the output filename, a chart
/// title, a chart type, and the summary it draws.
pub struct Question {
    pub slug: &'static str,
    pub title: &'static str,
    pub kind: ChartKind,
    pub build: fn(&SalesTable) -> Result<Summary, TableError>,
}

/// The fixed question list, in render order
pub fn questions() -> Vec<Question> {
    vec![
        Question {
            slug: "sales_by_state",
            title: "Top 10 states by sales",
            kind: ChartKind::Bar,
            build: sales_by_state,
        },
        Question {
            slug: "sales_by_city",
            title: "Top 10 cities by sales",
            kind: ChartKind::Bar,
            build: sales_by_city,
        },
        Question {
            slug: "sales_by_category",
            title: "Sales share by category",
            kind: ChartKind::Pie,
            build: sales_by_category,
        },
        Question {
            slug: "sales_by_sub_category",
            title: "Sales by sub-category",
            kind: ChartKind::Bar,
            build: sales_by_sub_category,
        },
        Question {
            slug: "segment_avg_sale",
            title: "Average sale value by segment",
            kind: ChartKind::Bar,
            build: segment_avg_sale,
        },
        Question {
            slug: "top_customers",
            title: "Top 10 customers by sales",
            kind: ChartKind::Bar,
            build: top_customers,
        },
        Question {
            slug: "orders_by_weekday",
            title: "Orders by weekday",
            kind: ChartKind::Bar,
            build: orders_by_weekday,
        },
        Question {
            slug: "monthly_sales",
            title: "Sales by month",
            kind: ChartKind::Line,
            build: monthly_sales,
        },
        Question {
            slug: "sales_by_season",
            title: "Sales by season",
            kind: ChartKind::Bar,
            build: sales_by_season,
        },
        Question {
            slug: "region_yearly_share",
            title: "Region share of sales per year",
            kind: ChartKind::StackedPercent,
            build: region_yearly_share,
        },
        Question {
            slug: "repeat_customers",
            title: "Repeat vs one-time customers",
            kind: ChartKind::Pie,
            build: repeat_customers,
        },
    ]
}

fn sales_by_state(table: &SalesTable) -> Result<Summary, TableError> {
    table.group_and_sum(&["state"], "sales")?.top_n(10, "sales")
}

fn sales_by_city(table: &SalesTable) -> Result<Summary, TableError> {
    table.group_and_sum(&["city"], "sales")?.top_n(10, "sales")
}

fn sales_by_category(table: &SalesTable) -> Result<Summary, TableError> {
    table.group_and_sum(&["category"], "sales")?.sorted_desc("sales")
}

fn sales_by_sub_category(table: &SalesTable) -> Result<Summary, TableError> {
    table
        .group_and_sum(&["sub_category"], "sales")?
        .sorted_desc("sales")
}

/// Per-segment totals with the derived average sale (sum over count);
/// the chart draws the ratio column
fn segment_avg_sale(table: &SalesTable) -> Result<Summary, TableError> {
    table
        .summarize()
        .group_by("segment")
        .sum_as("sales", "total_sales")
        .count_as("orders")
        .execute()?
        .derive_ratio("total_sales", "orders", "avg_sale")?
        .project_measure("avg_sale")
}

fn top_customers(table: &SalesTable) -> Result<Summary, TableError> {
    table
        .group_and_sum(&["customer_name"], "sales")?
        .top_n(10, "sales")
}

fn orders_by_weekday(table: &SalesTable) -> Result<Summary, TableError> {
    Ok(table
        .group_and_count(&["order_weekday"])?
        .sort_by_key_order(&WEEKDAY_LABELS))
}

fn monthly_sales(table: &SalesTable) -> Result<Summary, TableError> {
    Ok(table
        .group_and_sum(&["order_month"], "sales")?
        .sort_by_key_order(&MONTH_LABELS))
}

fn sales_by_season(table: &SalesTable) -> Result<Summary, TableError> {
    Ok(table
        .group_and_sum(&["season"], "sales")?
        .sort_by_key_order(&SEASON_LABELS))
}

fn region_yearly_share(table: &SalesTable) -> Result<Summary, TableError> {
    table.group_and_sum(&["order_year", "region"], "sales")
}

/// Splits customers into repeat (more than one transaction) and
/// one-time, and logs the repeat rate
fn repeat_customers(table: &SalesTable) -> Result<Summary, TableError> {
    let per_customer = table.group_and_count(&["customer_id"])?;
    let total = per_customer.len();
    let repeat = per_customer
        .retain_rows(|row| row.measures[0].chart_value() > 1.0)
        .len();
    let one_time = total - repeat;

    if total > 0 {
        let rate = repeat as f64 / total as f64 * 100.0;
        info!(repeat, one_time, rate_pct = rate, "repeat customer rate");
    }

    Ok(Summary::new(
        vec!["customer_type".into()],
        vec!["customers".into()],
        vec![
            SummaryRow {
                keys: vec!["Repeat".into()],
                measures: vec![MeasureValue::Int(repeat as i64)],
            },
            SummaryRow {
                keys: vec!["One-time".into()],
                measures: vec![MeasureValue::Int(one_time as i64)],
            },
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::derive_calendar_fields;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn fixture() -> SalesTable {
        let csv = "\
Order ID,Order Date,Ship Date,Customer ID,Customer Name,Region,State,City,Segment,Category,Sub-Category,Sales
CA-1,11/08/2016,11/11/2016,AA-1,Alice Anders,West,California,Los Angeles,Consumer,Furniture,Chairs,100.0
CA-2,11/09/2016,11/12/2016,AA-1,Alice Anders,West,California,San Francisco,Consumer,Technology,Phones,50.0
CA-3,06/12/2017,06/15/2017,BB-2,Bob Briggs,East,New York,New York City,Corporate,Furniture,Tables,30.0
CA-4,02/05/2017,02/08/2017,CC-3,Cara Chen,West,Washington,Seattle,Consumer,Office Supplies,Paper,20.0
CA-5,12/25/2016,12/28/2016,AA-1,Alice Anders,West,California,Los Angeles,Consumer,Furniture,Chairs,75.0
";
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "{}", csv).unwrap();

        let mut table = SalesTable::new();
        table.load_csv(tmp.path()).unwrap();
        derive_calendar_fields(&mut table, "order_date").unwrap();
        table
    }

    #[test]
    fn every_question_builds_on_a_clean_table() {
        let table = fixture();
        for question in questions() {
            let summary = (question.build)(&table)
                .unwrap_or_else(|e| panic!("{} failed: {}", question.slug, e));
            assert!(!summary.is_empty(), "{} produced no groups", question.slug);
        }
    }

    #[test]
    fn state_totals_and_order() {
        let table = fixture();
        let summary = sales_by_state(&table).unwrap();
        assert_eq!(summary.rows()[0].keys, vec!["California".to_string()]);
        assert_eq!(summary.measure_for(&["California"], "sales"), Some(225.0));
    }

    #[test]
    fn weekday_summary_is_calendar_ordered() {
        let table = fixture();
        let summary = orders_by_weekday(&table).unwrap();
        let mut last_pos = 0;
        for row in summary.rows() {
            let pos = WEEKDAY_LABELS
                .iter()
                .position(|l| *l == row.keys[0])
                .expect("weekday label");
            assert!(pos >= last_pos, "weekdays out of order");
            last_pos = pos;
        }
        assert_eq!(summary.measure_total("count").unwrap(), 5.0);
    }

    #[test]
    fn segment_average_is_a_ratio() {
        let table = fixture();
        let summary = segment_avg_sale(&table).unwrap();
        // Consumer: (100 + 50 + 20 + 75) / 4
        assert_eq!(summary.measure_for(&["Consumer"], "avg_sale"), Some(61.25));
        assert_eq!(summary.measure_columns(), &["avg_sale".to_string()]);
    }

    #[test]
    fn repeat_customer_split() {
        let table = fixture();
        let summary = repeat_customers(&table).unwrap();
        // Alice has 3 orders; Bob and Cara have 1 each
        assert_eq!(summary.measure_for(&["Repeat"], "customers"), Some(1.0));
        assert_eq!(summary.measure_for(&["One-time"], "customers"), Some(2.0));
    }

    #[test]
    fn region_year_summary_covers_both_keys() {
        let table = fixture();
        let summary = region_yearly_share(&table).unwrap();
        assert_eq!(summary.measure_for(&["2016", "West"], "sales"), Some(225.0));
        assert_eq!(summary.measure_for(&["2017", "East"], "sales"), Some(30.0));
    }
}
