//! 補貨批次到採購訂單示例

use anyhow::{bail, Context};
use chrono::NaiveDate;
use replenish::replenish_calc::{
    apply_edits, Actor, BatchBuilder, BatchLifecycle, ClassificationEngine, ClassificationInput,
    FieldEdit, LineEdit, NoopNotifier, PermissionMatrix,
};
use replenish::replenish_core::{EngineConfig, ExtractionRow, PaymentTerms, VendorRef};
use replenish::replenish_order::{GenerationOutcome, InMemoryErp, OrderAssembler, VendorRebate};
use replenish::telemetry;
use rust_decimal::Decimal;
use uuid::Uuid;

fn main() -> anyhow::Result<()> {
    telemetry::init();
    println!("=== 補貨採購訂單示例 ===\n");

    let config = EngineConfig::from_json_str(r#"{ "jump_threshold_pct": "80" }"#)
        .context("配置解析失敗")?;

    let rows = vec![
        ExtractionRow::new("1001", "50", "V01")
            .with_classification_keys("LACTEOS", "ALIMENTOS", "VALLE")
            .with_stock(Decimal::from(12), Decimal::from(60))
            .with_pack_size(Decimal::from(12))
            .with_pricing(Decimal::new(2550, 2), Decimal::from(19))
            .with_revenue("18250.40"),
        ExtractionRow::new("1002", "50", "V01")
            .with_classification_keys("LACTEOS", "ALIMENTOS", "VALLE")
            .with_stock(Decimal::from(3), Decimal::from(24))
            .with_pack_size(Decimal::from(6))
            .with_pricing(Decimal::new(890, 2), Decimal::ZERO)
            .with_revenue("4100"),
        ExtractionRow::new("1001", "70", "V01")
            .with_classification_keys("LACTEOS", "ALIMENTOS", "VALLE")
            .with_stock(Decimal::ZERO, Decimal::from(36))
            .with_pack_size(Decimal::from(12))
            .with_pricing(Decimal::new(2550, 2), Decimal::from(19))
            .with_revenue("9800"),
    ];

    let at = NaiveDate::from_ymd_opt(2025, 3, 10)
        .and_then(|d| d.and_hms_opt(6, 0, 0))
        .context("無效日期")?;
    let (mut batch, report) = BatchBuilder::new("semana 11", at)
        .with_vendor(VendorRef::new("V01", "Lacteos del Valle").with_erp_code("881"))
        .with_config(&config)
        .build(&rows);
    println!("建立批次：{} 筆明細", report.lines);

    let engine = ClassificationEngine::new(config.classification.clone());
    let inputs: Vec<ClassificationInput> = rows.iter().map(ClassificationInput::from).collect();
    let (records, run) = engine.classify(Uuid::new_v4(), &inputs);
    ClassificationEngine::apply_to_batch(&mut batch, &records);
    println!("分級：{} 筆，{} 個分組", run.classified, run.groups);

    for line in &batch.lines {
        println!(
            "  - {} @ {}: 分級 {}, 建議 {}",
            line.article_code,
            line.warehouse_code,
            line.tier.map(|t| t.to_string()).unwrap_or_default(),
            line.system_quantity
        );
    }

    // 採購把 1002 的折扣改為 5%
    if let Some(line) = batch.lines.iter().find(|l| l.article_code == "1002") {
        let edits = [LineEdit::new(line.id).with(FieldEdit::Discount {
            index: 0,
            value: Decimal::from(5),
        })];
        let edit = apply_edits(
            &mut batch,
            Actor::Buyer { elevated: true },
            &edits,
            &PermissionMatrix::standard(),
            &config,
        );
        println!("\n編輯：套用 {} 個欄位", edit.applied_fields);
    }

    let notifier = NoopNotifier;
    let lifecycle = BatchLifecycle::new(&notifier);
    lifecycle.send_to_vendor(&mut batch)?;
    lifecycle.confirm_by_vendor(&mut batch)?;

    let erp = InMemoryErp::new()
        .with_last_number("13CP", 256034)
        .with_visible_charge_codes([3, 34])
        .with_vendor_rebates("881", vec![VendorRebate::new(7, Decimal::from(2), 1)])
        .with_payment_terms("881", PaymentTerms::new("14", 45, "10"));

    let assembler = OrderAssembler::new(&config);
    let order_date = NaiveDate::from_ymd_opt(2025, 3, 12).context("無效日期")?;
    match assembler.generate(&mut batch, &erp, order_date)? {
        GenerationOutcome::Generated { orders } => {
            println!("\n產生訂單:");
            for order in &orders {
                println!(
                    "  - {} 倉庫 {}: {} 筆明細，未稅 {}，稅額 {}，應付 {}",
                    order.order_ref,
                    order.warehouse_code,
                    order.line_count,
                    order.gross_total,
                    order.tax_total,
                    order.net_total
                );
            }
        }
        other => bail!("未產生訂單: {other:?}"),
    }

    println!("\n批次狀態: {:?}", batch.state);
    Ok(())
}
