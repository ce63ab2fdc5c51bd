//! 採購／供應商的明細編輯

use replenish_core::{EngineConfig, ReplenishmentBatch, Tier};
use rust_decimal::Decimal;
use std::collections::HashSet;
use uuid::Uuid;

use crate::permissions::{Actor, EditableField, PermissionMatrix};
use crate::quantity::QuantityCalculator;

/// 單一欄位修改
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEdit {
    BuyerQuantity(Decimal),
    VendorQuantity(Decimal),
    UnitCost(Decimal),
    /// 折扣（index 0..3）
    Discount { index: usize, value: Decimal },
    Tier(Tier),
    VendorNotes(String),
    /// 供應商是否持續供貨
    Continuity(bool),
}

impl FieldEdit {
    /// 對應的權限欄位
    pub fn field(&self) -> Option<EditableField> {
        Some(match self {
            FieldEdit::BuyerQuantity(_) => EditableField::BuyerQuantity,
            FieldEdit::VendorQuantity(_) => EditableField::VendorQuantity,
            FieldEdit::UnitCost(_) => EditableField::UnitCost,
            FieldEdit::Discount { index: 0, .. } => EditableField::Discount1,
            FieldEdit::Discount { index: 1, .. } => EditableField::Discount2,
            FieldEdit::Discount { index: 2, .. } => EditableField::Discount3,
            FieldEdit::Discount { .. } => return None,
            FieldEdit::Tier(_) => EditableField::Tier,
            FieldEdit::VendorNotes(_) => EditableField::VendorNotes,
            FieldEdit::Continuity(_) => EditableField::Continuity,
        })
    }

    /// 是否為供應商-商品層級屬性（需同步到同商品的其他倉庫明細）
    fn propagates(&self) -> bool {
        matches!(self, FieldEdit::UnitCost(_) | FieldEdit::Discount { .. })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            FieldEdit::BuyerQuantity(v) | FieldEdit::VendorQuantity(v) if v.is_sign_negative() => {
                Err(ValidationError::NegativeQuantity(*v))
            }
            FieldEdit::UnitCost(v) if v.is_sign_negative() => Err(ValidationError::NegativeCost(*v)),
            FieldEdit::Discount { index, .. } if *index >= 3 => {
                Err(ValidationError::UnknownDiscount(*index))
            }
            FieldEdit::Discount { value, .. }
                if value.is_sign_negative() || *value > Decimal::ONE_HUNDRED =>
            {
                Err(ValidationError::DiscountOutOfRange(*value))
            }
            _ => Ok(()),
        }
    }
}

/// 單一明細的修改
#[derive(Debug, Clone, PartialEq)]
pub struct LineEdit {
    pub line_id: Uuid,
    pub edits: Vec<FieldEdit>,
}

impl LineEdit {
    pub fn new(line_id: Uuid) -> Self {
        Self {
            line_id,
            edits: Vec::new(),
        }
    }

    /// 建構器模式：添加欄位修改
    pub fn with(mut self, edit: FieldEdit) -> Self {
        self.edits.push(edit);
        self
    }
}

/// 明細驗證錯誤
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("數量不可為負: {0}")]
    NegativeQuantity(Decimal),

    #[error("成本不可為負: {0}")]
    NegativeCost(Decimal),

    #[error("折扣必須介於 0 與 100: {0}")]
    DiscountOutOfRange(Decimal),

    #[error("折扣欄位不存在: {0}")]
    UnknownDiscount(usize),

    #[error("找不到明細: {0}")]
    LineNotFound(Uuid),
}

/// 編輯結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditReport {
    /// 有套用任何欄位的明細數
    pub updated_lines: usize,

    /// 套用的欄位數
    pub applied_fields: usize,

    /// 因權限略過的欄位數
    pub skipped_fields: usize,

    /// 同步成本／折扣的其他明細數
    pub propagated_lines: usize,

    /// 驗證失敗而整筆退回的明細
    pub rejected: Vec<(Uuid, ValidationError)>,
}

impl EditReport {
    pub fn has_rejections(&self) -> bool {
        !self.rejected.is_empty()
    }
}

/// 套用編輯
///
/// 驗證失敗的明細整筆退回，其他明細照常處理；無權限的欄位逐一略過並計數。
/// 最後重新計算明細成本、警示旗標與批次彙總。
pub fn apply_edits(
    batch: &mut ReplenishmentBatch,
    actor: Actor,
    edits: &[LineEdit],
    matrix: &PermissionMatrix,
    config: &EngineConfig,
) -> EditReport {
    let mut report = EditReport::default();
    let mut touched: HashSet<usize> = HashSet::new();

    for line_edit in edits {
        let Some(index) = batch.lines.iter().position(|l| l.id == line_edit.line_id) else {
            report
                .rejected
                .push((line_edit.line_id, ValidationError::LineNotFound(line_edit.line_id)));
            continue;
        };

        if let Err(err) = line_edit.edits.iter().try_for_each(FieldEdit::validate) {
            tracing::debug!("明細 {} 驗證失敗：{}", line_edit.line_id, err);
            report.rejected.push((line_edit.line_id, err));
            continue;
        }

        let mut applied_any = false;
        for edit in &line_edit.edits {
            let line = &batch.lines[index];
            let permitted = edit
                .field()
                .map(|field| matrix.allows(actor, line.tier, batch.state, line.state, field))
                .unwrap_or(false);

            if !permitted {
                report.skipped_fields += 1;
                continue;
            }

            apply_field(&mut batch.lines[index], edit);
            report.applied_fields += 1;
            applied_any = true;
            touched.insert(index);

            if edit.propagates() {
                let article = batch.lines[index].article_code.clone();
                for (sibling_index, sibling) in batch.lines.iter_mut().enumerate() {
                    if sibling_index == index || sibling.article_code != article || sibling.is_ordered() {
                        continue;
                    }
                    apply_field(sibling, edit);
                    if touched.insert(sibling_index) {
                        report.propagated_lines += 1;
                    }
                }
            }
        }

        if applied_any {
            report.updated_lines += 1;
        }
    }

    for index in touched {
        let line = &mut batch.lines[index];
        line.recompute_cost();
        line.flags = QuantityCalculator::evaluate_flags(line, config.jump_threshold_pct);
    }
    batch.recompute_totals();

    if report.skipped_fields > 0 {
        tracing::warn!(
            "批次 {}：{:?} 有 {} 個欄位因權限略過",
            batch.id,
            actor,
            report.skipped_fields
        );
    }

    report
}

fn apply_field(line: &mut replenish_core::ReplenishmentLine, edit: &FieldEdit) {
    match edit {
        FieldEdit::BuyerQuantity(v) => line.buyer_quantity = *v,
        // 供應商提案依箱規取整
        FieldEdit::VendorQuantity(v) => {
            line.vendor_quantity = QuantityCalculator::adjust_to_pack(*v, line.pack_size)
        }
        FieldEdit::UnitCost(v) => line.unit_cost = *v,
        FieldEdit::Discount { index, value } => {
            if let Some(slot) = line.discounts.get_mut(*index) {
                *slot = *value;
            }
        }
        FieldEdit::Tier(tier) => {
            line.tier = Some(*tier);
            if tier.is_inactive() {
                line.zero_quantities();
            }
        }
        FieldEdit::VendorNotes(notes) => line.vendor_notes = Some(notes.clone()),
        FieldEdit::Continuity(true) => line.continuity_active = true,
        FieldEdit::Continuity(false) => line.discontinue(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use replenish_core::{BatchState, LineState, ReplenishmentLine};

    const BUYER: Actor = Actor::Buyer { elevated: false };

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    fn batch() -> ReplenishmentBatch {
        let at = NaiveDate::from_ymd_opt(2025, 5, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        ReplenishmentBatch::new("edit", at).with_lines(vec![
            ReplenishmentLine::new("1001", "50", "V")
                .with_tier(Tier::A)
                .with_pack_size(d(6))
                .with_unit_cost(d(10))
                .with_system_quantity(d(12)),
            ReplenishmentLine::new("1001", "60", "V")
                .with_tier(Tier::A)
                .with_unit_cost(d(10))
                .with_system_quantity(d(6)),
            ReplenishmentLine::new("2002", "50", "V")
                .with_tier(Tier::C)
                .with_unit_cost(d(4))
                .with_system_quantity(d(5)),
        ])
    }

    fn apply(batch: &mut ReplenishmentBatch, actor: Actor, edits: &[LineEdit]) -> EditReport {
        apply_edits(batch, actor, edits, &PermissionMatrix::standard(), &EngineConfig::default())
    }

    #[test]
    fn test_cost_edit_propagates_to_same_article() {
        let mut batch = batch();
        let id = batch.lines[0].id;

        let report = apply(&mut batch, BUYER, &[LineEdit::new(id).with(FieldEdit::UnitCost(d(8)))]);

        assert_eq!(report.applied_fields, 1);
        assert_eq!(report.propagated_lines, 1);
        assert_eq!(batch.lines[1].unit_cost, d(8));
        assert_eq!(batch.lines[2].unit_cost, d(4));
        // 12*8 + 6*8 + 5*4
        assert_eq!(batch.total_cost, d(164));
    }

    #[test]
    fn test_propagation_skips_ordered_sibling() {
        let mut batch = batch();
        batch.lines[1].state = LineState::Ordered;
        let id = batch.lines[0].id;

        let edit = LineEdit::new(id).with(FieldEdit::Discount {
            index: 1,
            value: d(5),
        });
        let report = apply(&mut batch, BUYER, &[edit]);

        assert_eq!(report.propagated_lines, 0);
        assert_eq!(batch.lines[0].discounts[1], d(5));
        assert_eq!(batch.lines[1].discounts[1], Decimal::ZERO);
    }

    #[test]
    fn test_validation_rejects_whole_line() {
        let mut batch = batch();
        let first = batch.lines[0].id;
        let third = batch.lines[2].id;

        let report = apply(
            &mut batch,
            Actor::Buyer { elevated: true },
            &[
                LineEdit::new(first)
                    .with(FieldEdit::BuyerQuantity(d(30)))
                    .with(FieldEdit::Discount {
                        index: 0,
                        value: d(120),
                    }),
                LineEdit::new(third).with(FieldEdit::BuyerQuantity(d(7))),
            ],
        );

        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].0, first);
        assert!(matches!(report.rejected[0].1, ValidationError::DiscountOutOfRange(_)));
        // 第一筆未套用任何欄位
        assert_eq!(batch.lines[0].buyer_quantity, Decimal::ZERO);
        assert_eq!(batch.lines[2].buyer_quantity, d(7));
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let mut batch = batch();
        let id = batch.lines[0].id;

        let report = apply(&mut batch, BUYER, &[LineEdit::new(id).with(FieldEdit::BuyerQuantity(d(-1)))]);

        assert!(report.has_rejections());
        assert_eq!(batch.lines[0].buyer_quantity, Decimal::ZERO);
    }

    #[test]
    fn test_unauthorized_fields_are_skipped_and_counted() {
        let mut batch = batch();
        let a_line = batch.lines[0].id;
        let c_line = batch.lines[2].id;

        let report = apply(
            &mut batch,
            BUYER,
            &[
                // C 級需要 elevated
                LineEdit::new(c_line)
                    .with(FieldEdit::BuyerQuantity(d(10)))
                    .with(FieldEdit::UnitCost(d(3))),
                // 採購不能改供應商數量
                LineEdit::new(a_line).with(FieldEdit::VendorQuantity(d(99))),
            ],
        );

        assert_eq!(report.skipped_fields, 3);
        assert_eq!(report.applied_fields, 0);
        assert!(!report.has_rejections());
        assert_eq!(batch.lines[2].buyer_quantity, Decimal::ZERO);
    }

    #[test]
    fn test_vendor_quantity_rounded_to_pack() {
        let mut batch = batch();
        batch.state = BatchState::Sent;
        let id = batch.lines[0].id;

        // 箱規 6：13 -> 12，15 -> 18
        let report = apply(&mut batch, Actor::Vendor, &[LineEdit::new(id).with(FieldEdit::VendorQuantity(d(13)))]);
        assert_eq!(report.applied_fields, 1);
        assert_eq!(batch.lines[0].vendor_quantity, d(12));
        assert!(!batch.lines[0].flags.non_pack_multiple);

        apply(&mut batch, Actor::Vendor, &[LineEdit::new(id).with(FieldEdit::VendorQuantity(d(15)))]);
        assert_eq!(batch.lines[0].vendor_quantity, d(18));
    }

    #[test]
    fn test_buyer_quantity_off_pack_sets_flag() {
        let mut batch = batch();
        let id = batch.lines[0].id;

        apply(&mut batch, BUYER, &[LineEdit::new(id).with(FieldEdit::BuyerQuantity(d(13)))]);

        assert_eq!(batch.lines[0].buyer_quantity, d(13));
        assert!(batch.lines[0].flags.non_pack_multiple);
    }

    #[test]
    fn test_vendor_discontinues_article() {
        let mut batch = batch();
        batch.state = BatchState::Sent;
        let id = batch.lines[1].id;

        let report = apply(&mut batch, Actor::Vendor, &[LineEdit::new(id).with(FieldEdit::Continuity(false))]);

        assert_eq!(report.applied_fields, 1);
        let line = &batch.lines[1];
        assert!(!line.continuity_active);
        assert_eq!(line.tier, Some(Tier::I));
        assert!(line.tier_changed());
        assert_eq!(line.system_quantity, Decimal::ZERO);
        assert_eq!(line.line_cost, Decimal::ZERO);

        // 停用後供應商不可再編輯
        let again = apply(&mut batch, Actor::Vendor, &[LineEdit::new(id).with(FieldEdit::Continuity(true))]);
        assert_eq!(again.skipped_fields, 1);
        assert!(!batch.lines[1].continuity_active);
    }

    #[test]
    fn test_reclassify_to_inactive_zeroes_quantities() {
        let mut batch = batch();
        let id = batch.lines[2].id;

        let report = apply(&mut batch, BUYER, &[LineEdit::new(id).with(FieldEdit::Tier(Tier::I))]);

        assert_eq!(report.applied_fields, 1);
        let line = &batch.lines[2];
        assert_eq!(line.tier, Some(Tier::I));
        assert_eq!(line.system_quantity, Decimal::ZERO);
        assert_eq!(line.vendor_quantity, Decimal::ZERO);
        assert_eq!(line.line_cost, Decimal::ZERO);
        assert_eq!(batch.total_cost, d(180));
    }

    #[test]
    fn test_completed_batch_is_read_only() {
        let mut batch = batch();
        batch.state = BatchState::Completed;
        let id = batch.lines[0].id;

        let report = apply(&mut batch, Actor::Buyer { elevated: true }, &[LineEdit::new(id).with(FieldEdit::UnitCost(d(1)))]);

        assert_eq!(report.skipped_fields, 1);
        assert_eq!(batch.lines[0].unit_cost, d(10));
    }

    #[test]
    fn test_unknown_line() {
        let mut batch = batch();
        let report = apply(&mut batch, BUYER, &[LineEdit::new(Uuid::new_v4()).with(FieldEdit::UnitCost(d(1)))]);

        assert!(matches!(report.rejected[0].1, ValidationError::LineNotFound(_)));
    }
}
