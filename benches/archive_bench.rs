use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use duckdb::Connection;
use teal_archive::archive::rows::{AggregateRow, Label, LabeledRows, VisitMetrics};
use teal_archive::archive::table::{DataTable, TreeNode};
use teal_archive::query::visits::{query_visit_summary, query_visits_by_dimension, Dimension};
use teal_archive::query::DayWindow;
use teal_archive::storage::schema;
use teal_archive::Segment;

const BROWSERS: [&str; 5] = ["Firefox", "Chrome", "Safari", "Edge", "Opera"];

fn make_metrics(i: usize) -> VisitMetrics {
    #[allow(clippy::cast_precision_loss)]
    VisitMetrics {
        uniq_visitors: 1,
        visits: 1,
        actions: (i % 12 + 1) as u64,
        max_actions: (i % 12 + 1) as f64,
        sum_visit_length: (i % 600) as u64,
        bounce_count: u64::from(i % 12 == 0),
        visits_converted: u64::from(i % 20 == 0),
    }
}

fn seed_visits(conn: &Connection, count: usize) {
    let mut stmt = conn
        .prepare(
            "INSERT INTO log_visit (site_id, visitor_id, visit_last_action_time,
             visit_total_actions, visit_total_time, visit_goal_converted,
             config_browser, config_os, referer_type, referer_name,
             location_country, location_continent)
             VALUES (?, ?, CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .unwrap();
    for i in 0..count {
        let time = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(
                u32::try_from(i / 3600).unwrap_or(0) % 24,
                u32::try_from((i / 60) % 60).unwrap_or(0),
                u32::try_from(i % 60).unwrap_or(0),
            )
            .unwrap();
        stmt.execute(duckdb::params![
            "bench.example.com",
            format!("visitor-{}", i % 2000),
            time.format("%Y-%m-%d %H:%M:%S").to_string(),
            i64::try_from(i % 12 + 1).unwrap(),
            i64::try_from(i % 600).unwrap(),
            i % 20 == 0,
            BROWSERS[i % BROWSERS.len()],
            "Linux",
            "search",
            "Google",
            "nz",
            "oce",
        ])
        .unwrap();
    }
}

fn bench_accumulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("row_accumulate");

    for size in [1_000, 10_000] {
        let rows: Vec<VisitMetrics> = (0..size).map(make_metrics).collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &rows, |b, rows| {
            b.iter(|| {
                let mut labeled = LabeledRows::new();
                for (i, metrics) in rows.iter().enumerate() {
                    labeled
                        .entry(Label::from(BROWSERS[i % BROWSERS.len()]))
                        .or_default()
                        .metrics
                        .accumulate(metrics);
                }
                labeled
            });
        });
    }

    group.finish();
}

fn bench_table_from_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_from_tree");

    // 50 parents x 40 children, roughly a referrer/keyword report shape
    let tree: Vec<(Label, TreeNode)> = (0..50)
        .map(|parent| {
            let children = (0..40)
                .map(|child| {
                    (
                        Label::from(format!("keyword-{child}").as_str()),
                        TreeNode::Row(AggregateRow::from(make_metrics(parent * 40 + child))),
                    )
                })
                .collect();
            (
                Label::from(format!("referrer-{parent}").as_str()),
                TreeNode::Table(children),
            )
        })
        .collect();

    group.bench_function("2000_rows_two_levels", |b| {
        b.iter(|| DataTable::from_tree(tree.clone()));
    });

    group.finish();
}

fn bench_day_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("day_queries");

    // One-time setup, a warm connection with 10k visits loaded
    let conn = Connection::open_in_memory().unwrap();
    schema::init_schema(&conn).unwrap();
    seed_visits(&conn, 10_000);
    let window = DayWindow::new(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());

    group.bench_function("visit_summary_10k", |b| {
        b.iter(|| {
            query_visit_summary(&conn, "bench.example.com", window, &Segment::empty()).unwrap()
        });
    });

    group.bench_function("visits_by_browser_10k", |b| {
        b.iter(|| {
            query_visits_by_dimension(
                &conn,
                "bench.example.com",
                window,
                &Segment::empty(),
                Dimension::Browser,
                None,
            )
            .unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_accumulate, bench_table_from_tree, bench_day_queries);
criterion_main!(benches);
