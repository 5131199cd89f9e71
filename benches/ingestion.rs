//! Parse + aggregate throughput for equipment uploads.
//!
//! Run with: cargo bench --bench ingestion
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use equipment_data_processing::ingestion::parse_equipment_csv;
use equipment_data_processing::processing::aggregate;

const CATEGORIES: [&str; 5] = ["Pump", "Valve", "Reactor", "Heat Exchanger", "Compressor"];

fn generate_csv(rows: usize) -> Vec<u8> {
    let mut out = String::from("Equipment Name,Type,Flowrate,Pressure,Temperature\n");
    for i in 0..rows {
        // Every 20th row has a blank pressure and is dropped.
        let pressure = if i % 20 == 0 {
            String::new()
        } else {
            format!("{:.2}", 1.0 + (i % 13) as f64 * 0.5)
        };
        out.push_str(&format!(
            "EQ-{i:06},{},{:.1},{pressure},{:.1}\n",
            CATEGORIES[i % CATEGORIES.len()],
            50.0 + (i % 97) as f64,
            20.0 + (i % 180) as f64
        ));
    }
    out.into_bytes()
}

fn bench_parse_and_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("upload_pipeline");
    for rows in [1_000usize, 10_000, 100_000] {
        let input = generate_csv(rows);
        group.throughput(Throughput::Bytes(input.len() as u64));

        group.bench_with_input(BenchmarkId::new("parse", rows), &input, |b, input| {
            b.iter(|| parse_equipment_csv(black_box(input)).map(|t| t.row_count()))
        });

        let parsed = match parse_equipment_csv(&input) {
            Ok(table) => table,
            Err(e) => panic!("generated input must parse: {e}"),
        };
        group.bench_with_input(
            BenchmarkId::new("aggregate", rows),
            &parsed.records,
            |b, records| b.iter(|| aggregate(black_box(records)).count),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_parse_and_aggregate);
criterion_main!(benches);
