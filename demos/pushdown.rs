/// Predicate pushdown on a wide file.
///
/// This example shows how to:
/// 1. Stream rows from a source into a strata file on disk
/// 2. Reopen it and load only the footer
/// 3. Answer `sum(value) where status = 'FAILED'` while reading only the
///    `status` and `value` chunks
///
/// Run with `RUST_LOG=strata=debug` to see row-group flushes and scan stats.
use std::{fs::File, io::BufWriter};

use strata::{
    ColumnDef, ColumnStoreWriter, ColumnType, CountingReader, QueryEngine, Row, Schema, Value,
    WriterOptions, load_metadata,
};
use tracing_subscriber::EnvFilter;

const NUM_ROWS: i64 = 200_000;
const STATUSES: [&str; 5] = ["PENDING", "PROCESSED", "FAILED", "CANCELLED", "SHIPPED"];

fn schema() -> Schema {
    let mut columns = vec![
        ColumnDef::new("id", ColumnType::Int64),
        ColumnDef::new("status", ColumnType::Utf8),
        ColumnDef::new("value", ColumnType::Float64),
        ColumnDef::new("description", ColumnType::Utf8),
    ];
    columns.extend((0..16).map(|i| ColumnDef::new(format!("col_{i}"), ColumnType::Utf8)));
    Schema::new(columns)
}

/// Rows arrive as strings, the way a CSV reader would hand them over.
fn source_rows() -> impl Iterator<Item = Row> {
    (0..NUM_ROWS).map(|i| {
        let mut row: Row = vec![
            Value::from(i.to_string()),
            Value::from(STATUSES[i as usize % STATUSES.len()]),
            Value::from(format!("{:.2}", (i % 1000) as f64 + 0.75)),
            Value::from(format!("Order number {i} details {}", "X".repeat(i as usize % 20))),
        ];
        row.extend((0..16).map(|c| Value::from(format!("data_col_{c}_{i}"))));
        row
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::temp_dir().join("strata_pushdown_demo.strata");

    // Step 1: write
    let file = BufWriter::new(File::create(&path)?);
    let options = WriterOptions::builder().rows_per_group(50_000).build();
    let mut writer = ColumnStoreWriter::try_new(file, schema(), options)?;
    writer.write_rows(source_rows())?;
    let (_, written) = writer.finish()?;
    let file_size = std::fs::metadata(&path)?.len();
    println!(
        "Wrote {} rows in {} row groups ({file_size} bytes) to {}",
        written.num_rows,
        written.num_row_groups(),
        path.display()
    );

    // Step 2: open and load the footer
    let mut file = CountingReader::new(File::open(&path)?);
    let metadata = load_metadata(&mut file)?;
    println!("Footer: {} bytes read", file.bytes_read());
    file.reset();

    // Step 3: filtered aggregation
    let result = QueryEngine::new(&metadata).scan_equality_and_sum(
        &mut file,
        "status",
        &Value::from("FAILED"),
        "value",
    )?;
    println!("\nstatus = 'FAILED':");
    println!("  matched rows: {}", result.matched_count);
    println!("  sum(value):   {:.2}", result.sum);
    if let Some(average) = result.average() {
        println!("  avg(value):   {average:.2}");
    }
    println!(
        "  bytes read:   {} of {file_size} ({:.1}%)",
        result.diagnostics.bytes_read,
        result.diagnostics.bytes_read as f64 / file_size as f64 * 100.0
    );

    std::fs::remove_file(&path)?;
    Ok(())
}
