//! 分級與訂單組裝效能

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::NaiveDate;
use replenish_calc::{ClassificationEngine, ClassificationInput};
use replenish_core::{ClassificationConfig, EngineConfig, OrderNumbering, ReplenishmentLine};
use replenish_order::{OrderAssembler, OrderContext, VendorRebate};
use rust_decimal::Decimal;
use std::collections::HashSet;
use uuid::Uuid;

fn inputs(count: usize) -> Vec<ClassificationInput> {
    (0..count)
        .map(|i| {
            ClassificationInput::new(
                format!("{i:06}"),
                format!("{}", 50 + i % 8),
                format!("S{}", i % 25),
                format!("{}", (i * 7919) % 100_000),
            )
        })
        .collect()
}

fn bench_classification(c: &mut Criterion) {
    let engine = ClassificationEngine::new(ClassificationConfig::default());
    let mut group = c.benchmark_group("classification");

    for size in [1_000usize, 10_000, 100_000] {
        let rows = inputs(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &rows, |b, rows| {
            b.iter(|| engine.classify(Uuid::nil(), black_box(rows)))
        });
    }

    group.finish();
}

fn bench_build_order(c: &mut Criterion) {
    let config = EngineConfig::default();
    let assembler = OrderAssembler::new(&config);
    let numbering = OrderNumbering::new("13CP", "B");
    let visible: HashSet<u32> = [3, 34, 39, 40, 41, 42].into_iter().collect();
    let rebates = vec![VendorRebate::new(7, Decimal::from(2), 1)];
    let context = OrderContext {
        vendor_code: "881",
        numbering: &numbering,
        order_date: NaiveDate::from_ymd_opt(2025, 3, 12).unwrap_or_default(),
        visible_codes: &visible,
        rebates: &rebates,
        terms: &config.default_payment_terms,
    };

    let lines: Vec<ReplenishmentLine> = (0..500i64)
        .map(|i| {
            ReplenishmentLine::new(format!("{i:05}"), "50", "V01")
                .with_unit_cost(Decimal::new(1_000 + i * 37, 2))
                .with_tax_rate(if i % 3 == 0 { Decimal::ZERO } else { Decimal::from(19) })
                .with_discounts([Decimal::from(i % 15), Decimal::from(i % 5), Decimal::ZERO])
                .with_charge_rates([Decimal::new(i % 50, 2); 6])
                .with_system_quantity(Decimal::from(1 + i % 40))
        })
        .collect();
    let entries: Vec<(&ReplenishmentLine, Decimal)> =
        lines.iter().map(|l| (l, l.effective_quantity())).collect();

    c.bench_function("build_order_500_lines", |b| {
        b.iter(|| assembler.build_order(&context, "50", 1, black_box(&entries)))
    });
}

criterion_group!(benches, bench_classification, bench_build_order);
criterion_main!(benches);
