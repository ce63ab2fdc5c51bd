//! 營收貢獻分級（柏拉圖排序）

use rayon::prelude::*;
use replenish_core::money::try_parse_lenient;
use replenish_core::{ClassificationConfig, ExtractionRow, ReplenishmentBatch, Tier};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::CalcWarning;

/// 分級輸入（每筆 商品 × 倉庫）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationInput {
    pub article_code: String,
    pub warehouse: String,
    pub section: String,
    pub department: String,
    pub brand: String,

    /// 原始營收文字
    pub revenue_raw: String,

    /// 外部鎖定分級
    pub pinned_tier: Option<Tier>,
}

impl ClassificationInput {
    pub fn new(
        article_code: impl Into<String>,
        warehouse: impl Into<String>,
        section: impl Into<String>,
        revenue_raw: impl Into<String>,
    ) -> Self {
        Self {
            article_code: article_code.into(),
            warehouse: warehouse.into(),
            section: section.into(),
            department: String::new(),
            brand: String::new(),
            revenue_raw: revenue_raw.into(),
            pinned_tier: None,
        }
    }

    /// 建構器模式：設置部門與品牌
    pub fn with_department_brand(mut self, department: impl Into<String>, brand: impl Into<String>) -> Self {
        self.department = department.into();
        self.brand = brand.into();
        self
    }

    /// 建構器模式：設置外部鎖定分級
    pub fn with_pinned_tier(mut self, tier: Tier) -> Self {
        self.pinned_tier = Some(tier);
        self
    }
}

impl From<&ExtractionRow> for ClassificationInput {
    fn from(row: &ExtractionRow) -> Self {
        Self {
            article_code: row.article_code.clone(),
            warehouse: row.warehouse_code.clone(),
            section: row.section.clone(),
            department: row.department.clone(),
            brand: row.brand.clone(),
            revenue_raw: row.revenue_raw.clone(),
            pinned_tier: row.tier(),
        }
    }
}

/// 分級結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub run_id: Uuid,
    pub article_code: String,
    pub warehouse: String,
    pub section: String,
    pub revenue: Decimal,

    /// 貢獻百分比
    pub contribution_pct: Decimal,

    /// 累計百分比
    pub cumulative_pct: Decimal,
    pub tier: Tier,
}

impl ClassificationRecord {
    fn key(&self) -> LedgerKey {
        (self.run_id, self.article_code.clone(), self.warehouse.clone())
    }
}

/// 分級執行摘要
#[derive(Debug, Clone, Default)]
pub struct ClassificationRun {
    pub run_id: Uuid,
    pub classified: usize,
    pub excluded: usize,
    pub groups: usize,
    pub malformed_revenue: usize,
    pub warnings: Vec<CalcWarning>,
}

type LedgerKey = (Uuid, String, String);

/// 寫入結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertReport {
    pub inserted: usize,
    pub updated: usize,
}

/// 分級結果儲存（鍵：執行 × 商品 × 倉庫）
#[derive(Debug, Default)]
pub struct ClassificationLedger {
    records: HashMap<LedgerKey, ClassificationRecord>,
}

impl ClassificationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 冪等寫入：已存在則就地更新
    pub fn upsert(&mut self, records: impl IntoIterator<Item = ClassificationRecord>) -> UpsertReport {
        let mut report = UpsertReport::default();
        for record in records {
            match self.records.insert(record.key(), record) {
                Some(_) => report.updated += 1,
                None => report.inserted += 1,
            }
        }
        report
    }

    pub fn get(&self, run_id: Uuid, article_code: &str, warehouse: &str) -> Option<&ClassificationRecord> {
        self.records
            .get(&(run_id, article_code.to_string(), warehouse.to_string()))
    }

    /// 某次執行的所有結果
    pub fn records_for_run(&self, run_id: Uuid) -> Vec<&ClassificationRecord> {
        let mut records: Vec<_> = self.records.values().filter(|r| r.run_id == run_id).collect();
        records.sort_by(|a, b| {
            (&a.section, &a.warehouse, &a.article_code).cmp(&(&b.section, &b.warehouse, &b.article_code))
        });
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// 分組內解析完成的一列
struct ParsedRow<'a> {
    input: &'a ClassificationInput,
    revenue: Decimal,
}

/// 分級引擎
pub struct ClassificationEngine {
    config: ClassificationConfig,
}

impl ClassificationEngine {
    /// 創建新的分級引擎
    pub fn new(config: ClassificationConfig) -> Self {
        Self { config }
    }

    /// 執行分級並寫入 ledger
    pub fn run(
        &self,
        run_id: Uuid,
        inputs: &[ClassificationInput],
        ledger: &mut ClassificationLedger,
    ) -> ClassificationRun {
        let (records, summary) = self.classify(run_id, inputs);
        let report = ledger.upsert(records);
        tracing::info!(
            "分級結果寫入：新增 {} 筆，更新 {} 筆",
            report.inserted,
            report.updated
        );
        summary
    }

    /// 計算分級（不寫入）
    pub fn classify(
        &self,
        run_id: Uuid,
        inputs: &[ClassificationInput],
    ) -> (Vec<ClassificationRecord>, ClassificationRun) {
        tracing::info!("開始分級：輸入 {} 筆", inputs.len());

        let mut summary = ClassificationRun {
            run_id,
            ..ClassificationRun::default()
        };

        // 依 (區段, 倉庫) 分組，BTreeMap 保持輸出順序穩定
        let mut groups: BTreeMap<(&str, &str), Vec<ParsedRow<'_>>> = BTreeMap::new();
        for input in inputs {
            if self.is_excluded(input) {
                summary.excluded += 1;
                continue;
            }

            let revenue = match try_parse_lenient(&input.revenue_raw) {
                Some(value) => value,
                None => {
                    if !input.revenue_raw.trim().is_empty() {
                        summary.malformed_revenue += 1;
                        tracing::debug!(
                            "營收格式錯誤，視為 0：{} @ {} = {:?}",
                            input.article_code,
                            input.warehouse,
                            input.revenue_raw
                        );
                        summary.warnings.push(CalcWarning::warning(
                            input.article_code.clone(),
                            format!("營收格式錯誤，視為 0：{:?}", input.revenue_raw),
                        ));
                    }
                    Decimal::ZERO
                }
            };

            groups
                .entry((input.section.as_str(), input.warehouse.as_str()))
                .or_default()
                .push(ParsedRow { input, revenue });
        }

        summary.groups = groups.len();
        for rows in groups.values_mut() {
            Self::guard_group_total(rows, &mut summary);
        }

        let groups: Vec<_> = groups.into_iter().collect();
        let records: Vec<ClassificationRecord> = groups
            .into_par_iter()
            .flat_map_iter(|((section, warehouse), rows)| {
                tracing::debug!("分級分組 {} / {}：{} 筆", section, warehouse, rows.len());
                self.classify_group(run_id, rows)
            })
            .collect();

        summary.classified = records.len();
        tracing::info!(
            "分級完成：{} 筆，排除 {} 筆，分組 {} 個，營收格式錯誤 {} 筆",
            summary.classified,
            summary.excluded,
            summary.groups,
            summary.malformed_revenue
        );

        (records, summary)
    }

    /// 將分級結果套用到批次明細（依 商品 × 倉庫）
    pub fn apply_to_batch(batch: &mut ReplenishmentBatch, records: &[ClassificationRecord]) -> usize {
        let lookup: HashMap<(&str, &str), Tier> = records
            .iter()
            .map(|r| ((r.article_code.as_str(), r.warehouse.as_str()), r.tier))
            .collect();

        let mut updated = 0;
        for line in batch.lines.iter_mut().filter(|l| !l.is_ordered()) {
            if let Some(tier) = lookup.get(&(line.article_code.as_str(), line.warehouse_code.as_str())) {
                line.tier = Some(*tier);
                if tier.is_inactive() {
                    line.zero_quantities();
                }
                updated += 1;
            }
        }

        batch.recompute_totals();
        updated
    }

    fn is_excluded(&self, input: &ClassificationInput) -> bool {
        self.config.is_department_excluded(&input.department)
            || self.config.is_brand_excluded(&input.brand)
            || input
                .pinned_tier
                .map(|t| self.config.is_tier_excluded(t))
                .unwrap_or(false)
    }

    /// 分組正營收總額溢位時，造成溢位的列視為格式錯誤並歸 0
    fn guard_group_total(rows: &mut [ParsedRow<'_>], summary: &mut ClassificationRun) {
        let mut total = Decimal::ZERO;
        for row in rows.iter_mut().filter(|r| r.revenue > Decimal::ZERO) {
            match total.checked_add(row.revenue) {
                Some(sum) => total = sum,
                None => {
                    summary.malformed_revenue += 1;
                    tracing::warn!(
                        "營收總額溢位，視為 0：{} @ {} = {:?}",
                        row.input.article_code,
                        row.input.warehouse,
                        row.input.revenue_raw
                    );
                    summary.warnings.push(CalcWarning::warning(
                        row.input.article_code.clone(),
                        format!("營收總額溢位，視為 0：{:?}", row.input.revenue_raw),
                    ));
                    row.revenue = Decimal::ZERO;
                }
            }
        }
    }

    fn classify_group(&self, run_id: Uuid, mut rows: Vec<ParsedRow<'_>>) -> Vec<ClassificationRecord> {
        rows.sort_by(|a, b| {
            b.revenue
                .cmp(&a.revenue)
                .then_with(|| a.input.article_code.cmp(&b.input.article_code))
        });

        // 只以正營收計算分組總額
        let total = rows
            .iter()
            .map(|r| r.revenue)
            .filter(|r| *r > Decimal::ZERO)
            .try_fold(Decimal::ZERO, |acc, r| acc.checked_add(r))
            .unwrap_or(Decimal::MAX);

        let mut cumulative = Decimal::ZERO;
        rows.into_iter()
            .map(|row| {
                let (contribution, tier) = if total <= Decimal::ZERO || row.revenue <= Decimal::ZERO {
                    (Decimal::ZERO, Tier::E)
                } else {
                    let contribution = row
                        .revenue
                        .checked_div(total)
                        .and_then(|share| share.checked_mul(Decimal::ONE_HUNDRED))
                        .unwrap_or(Decimal::ZERO);
                    cumulative = cumulative.checked_add(contribution).unwrap_or(cumulative);
                    (contribution, self.config.bands.assign(cumulative))
                };

                ClassificationRecord {
                    run_id,
                    article_code: row.input.article_code.clone(),
                    warehouse: row.input.warehouse.clone(),
                    section: row.input.section.clone(),
                    revenue: row.revenue,
                    contribution_pct: contribution,
                    cumulative_pct: cumulative,
                    tier,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use replenish_core::ReplenishmentLine;

    fn engine() -> ClassificationEngine {
        ClassificationEngine::new(ClassificationConfig::default())
    }

    fn input(article: &str, revenue: &str) -> ClassificationInput {
        ClassificationInput::new(article, "50", "LACTEOS", revenue)
    }

    fn tier_of(records: &[ClassificationRecord], article: &str) -> Tier {
        records
            .iter()
            .find(|r| r.article_code == article)
            .map(|r| r.tier)
            .unwrap()
    }

    #[test]
    fn test_pareto_tiers() {
        let inputs = vec![
            input("1", "400"),
            input("2", "300"),
            input("3", "150"),
            input("4", "100"),
            input("5", "50"),
        ];

        let (records, run) = engine().classify(Uuid::new_v4(), &inputs);

        assert_eq!(run.classified, 5);
        assert_eq!(run.groups, 1);
        // 累計：40, 70, 85, 95, 100
        assert_eq!(tier_of(&records, "1"), Tier::A);
        assert_eq!(tier_of(&records, "2"), Tier::B);
        assert_eq!(tier_of(&records, "3"), Tier::C);
        assert_eq!(tier_of(&records, "4"), Tier::D);
        assert_eq!(tier_of(&records, "5"), Tier::D);
    }

    #[test]
    fn test_non_positive_group_all_e() {
        let inputs = vec![input("1", "0"), input("2", "-10"), input("3", "nan")];

        let (records, _) = engine().classify(Uuid::new_v4(), &inputs);

        for record in &records {
            assert_eq!(record.tier, Tier::E);
            assert_eq!(record.contribution_pct, Decimal::ZERO);
            assert_eq!(record.cumulative_pct, Decimal::ZERO);
        }
    }

    #[test]
    fn test_zero_revenue_line_does_not_advance() {
        let inputs = vec![input("1", "100"), input("2", "0"), input("3", "-5")];

        let (records, _) = engine().classify(Uuid::new_v4(), &inputs);

        let zero = records.iter().find(|r| r.article_code == "2").unwrap();
        assert_eq!(zero.tier, Tier::E);
        assert_eq!(zero.contribution_pct, Decimal::ZERO);
        assert_eq!(zero.cumulative_pct, Decimal::ONE_HUNDRED);
    }

    #[test]
    fn test_malformed_revenue_counted() {
        let inputs = vec![input("1", "1,000"), input("2", "12abc"), input("3", "")];

        let (records, run) = engine().classify(Uuid::new_v4(), &inputs);

        assert_eq!(records.len(), 3);
        assert_eq!(run.malformed_revenue, 1);
        assert_eq!(run.warnings.len(), 1);
        assert_eq!(tier_of(&records, "2"), Tier::E);
    }

    #[test]
    fn test_exclusions() {
        let config = ClassificationConfig::default()
            .with_excluded_departments(vec!["FARMACIA".to_string()])
            .with_excluded_brands(vec!["PROPIA".to_string()]);
        let engine = ClassificationEngine::new(config);

        let inputs = vec![
            input("1", "100"),
            input("2", "100").with_department_brand("farmacia", ""),
            input("3", "100").with_department_brand("", "Propia"),
            input("4", "100").with_pinned_tier(Tier::I),
            input("5", "100").with_pinned_tier(Tier::Pinned('T')),
        ];

        let (records, run) = engine.classify(Uuid::new_v4(), &inputs);

        assert_eq!(records.len(), 1);
        assert_eq!(run.excluded, 4);
    }

    #[test]
    fn test_groups_are_independent() {
        let inputs = vec![
            input("1", "100"),
            ClassificationInput::new("1", "60", "LACTEOS", "10"),
            ClassificationInput::new("2", "60", "LACTEOS", "90"),
        ];

        let (records, run) = engine().classify(Uuid::new_v4(), &inputs);

        assert_eq!(run.groups, 2);
        let solo = records
            .iter()
            .find(|r| r.warehouse == "50")
            .unwrap();
        assert_eq!(solo.contribution_pct, Decimal::ONE_HUNDRED);
    }

    #[test]
    fn test_ledger_upsert_is_idempotent() {
        let run_id = Uuid::new_v4();
        let inputs = vec![input("1", "100"), input("2", "50")];
        let mut ledger = ClassificationLedger::new();

        engine().run(run_id, &inputs, &mut ledger);
        assert_eq!(ledger.len(), 2);

        let (records, _) = engine().classify(run_id, &inputs);
        let report = ledger.upsert(records);

        assert_eq!(report, UpsertReport { inserted: 0, updated: 2 });
        assert_eq!(ledger.len(), 2);
        // 100 / 150 -> 66.67%
        assert_eq!(ledger.get(run_id, "1", "50").unwrap().tier, Tier::B);
        assert_eq!(ledger.records_for_run(run_id).len(), 2);
    }

    #[test]
    fn test_apply_to_batch() {
        let at = chrono::NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut batch = ReplenishmentBatch::new("b", at).with_lines(vec![
            ReplenishmentLine::new("1", "50", "V"),
            ReplenishmentLine::new("2", "50", "V").with_tier(Tier::C),
            ReplenishmentLine::new("9", "50", "V").with_tier(Tier::I),
        ]);

        let (records, _) = engine().classify(Uuid::new_v4(), &[input("1", "45"), input("2", "55")]);
        let updated = ClassificationEngine::apply_to_batch(&mut batch, &records);

        assert_eq!(updated, 2);
        // 商品 2 先累計 55% (B)，商品 1 累計到 100% (D)
        assert_eq!(batch.lines[0].tier, Some(Tier::D));
        assert_eq!(batch.lines[1].tier, Some(Tier::B));
        // 抽取時分級保留
        assert_eq!(batch.lines[1].tier_at_extraction, Some(Tier::C));
        assert_eq!(batch.lines[2].tier, Some(Tier::I));
    }

    #[test]
    fn test_overflowing_group_total_is_malformed() {
        let max = Decimal::MAX.to_string();
        let inputs = vec![input("1", &max), input("2", &max), input("3", "100")];

        let (records, run) = engine().classify(Uuid::new_v4(), &inputs);

        assert_eq!(records.len(), 3);
        assert_eq!(run.malformed_revenue, 2);
        assert_eq!(run.warnings.len(), 2);
        let kept = records.iter().find(|r| r.article_code == "1").unwrap();
        assert_eq!(kept.revenue, Decimal::MAX);
        assert_eq!(kept.contribution_pct, Decimal::ONE_HUNDRED);
        assert_eq!(tier_of(&records, "2"), Tier::E);
        assert_eq!(tier_of(&records, "3"), Tier::E);
    }

    proptest! {
        #[test]
        fn contributions_sum_to_100_and_cumulative_monotonic(
            revenues in proptest::collection::vec(-1_000i64..100_000, 1..40)
        ) {
            let inputs: Vec<_> = revenues
                .iter()
                .enumerate()
                .map(|(i, r)| input(&format!("{:04}", i), &r.to_string()))
                .collect();

            let (records, _) = engine().classify(Uuid::new_v4(), &inputs);
            let positive_total: i64 = revenues.iter().filter(|r| **r > 0).sum();

            let sum: Decimal = records.iter().map(|r| r.contribution_pct).sum();
            if positive_total > 0 {
                let diff = (sum - Decimal::ONE_HUNDRED).abs();
                prop_assert!(diff < Decimal::new(1, 10));
            } else {
                prop_assert!(records.iter().all(|r| r.tier == Tier::E
                    && r.contribution_pct.is_zero()
                    && r.cumulative_pct.is_zero()));
            }

            for pair in records.windows(2) {
                prop_assert!(pair[0].revenue >= pair[1].revenue);
                prop_assert!(pair[0].cumulative_pct <= pair[1].cumulative_pct);
            }
        }
    }
}
