//! 由抽取資料建立補貨批次

use chrono::NaiveDateTime;
use replenish_core::{
    EngineConfig, ExtractionRow, OrderNumbering, ReplenishmentBatch, VendorRef,
};
use rust_decimal::Decimal;

use crate::quantity::QuantityCalculator;
use crate::CalcWarning;

/// 建立結果
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    pub lines: usize,

    /// 無缺口、僅供參考的明細
    pub informational: usize,

    /// 停用分級的明細
    pub inactive: usize,
    pub warnings: Vec<CalcWarning>,
}

/// 批次建構器
pub struct BatchBuilder {
    name: String,
    extracted_at: NaiveDateTime,
    vendor: Option<VendorRef>,
    numbering: Option<OrderNumbering>,
    jump_threshold_pct: Decimal,
}

impl BatchBuilder {
    pub fn new(name: impl Into<String>, extracted_at: NaiveDateTime) -> Self {
        Self {
            name: name.into(),
            extracted_at,
            vendor: None,
            numbering: None,
            jump_threshold_pct: EngineConfig::default().jump_threshold_pct,
        }
    }

    /// 建構器模式：設置供應商
    pub fn with_vendor(mut self, vendor: VendorRef) -> Self {
        self.vendor = Some(vendor);
        self
    }

    /// 建構器模式：設置訂單編號
    pub fn with_numbering(mut self, numbering: OrderNumbering) -> Self {
        self.numbering = Some(numbering);
        self
    }

    /// 建構器模式：採用引擎配置
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.jump_threshold_pct = config.jump_threshold_pct;
        self
    }

    /// 建立批次：每列計算系統建議數量並記錄抽取時分級
    pub fn build(self, rows: &[ExtractionRow]) -> (ReplenishmentBatch, ExtractionReport) {
        let mut report = ExtractionReport::default();
        let mut lines = Vec::with_capacity(rows.len());

        for row in rows {
            if row.pack_size <= Decimal::ZERO {
                report.warnings.push(CalcWarning::warning(
                    row.article_code.clone(),
                    format!("倉庫 {} 箱規無效（{}），以 1 計算", row.warehouse_code, row.pack_size),
                ));
            }

            let tier = row.tier();
            let quantity =
                QuantityCalculator::suggest(row.current_stock, row.max_stock, row.pack_size, tier);
            let no_gap = row.max_stock <= row.current_stock;

            let mut line = row
                .to_line()
                .with_system_quantity(quantity)
                .with_informational(no_gap);
            line.flags = QuantityCalculator::evaluate_flags(&line, self.jump_threshold_pct);

            if line.is_inactive() {
                report.inactive += 1;
            }
            if no_gap {
                report.informational += 1;
            }
            lines.push(line);
        }

        report.lines = lines.len();

        let mut batch = ReplenishmentBatch::new(self.name, self.extracted_at).with_lines(lines);
        batch.vendor = self.vendor;
        batch.numbering = self.numbering;

        tracing::info!(
            "建立批次 {}：{} 筆明細（僅供參考 {}，停用 {}）",
            batch.name,
            report.lines,
            report.informational,
            report.inactive
        );

        (batch, report)
    }
}
