//! 折扣、稅額與附加費用計算

use replenish_core::money::{pct_to_ratio, round_currency, round_percent};
use replenish_core::order::tax_type_for;
use replenish_core::{ChargeSlot, LineCharges, CHARGE_SLOTS};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};

/// 三段連續折扣的綜合百分比
///
/// `(1 − (1−d1)(1−d2)(1−d3)) × 100`，折扣依序套用在已折扣的基礎上。
pub fn composite_discount(d1: Decimal, d2: Decimal, d3: Decimal) -> Decimal {
    let remaining = (Decimal::ONE - pct_to_ratio(d1))
        * (Decimal::ONE - pct_to_ratio(d2))
        * (Decimal::ONE - pct_to_ratio(d3));
    (Decimal::ONE - remaining) * Decimal::ONE_HUNDRED
}

/// 單一明細的金額
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    pub quantity: Decimal,

    /// 單價（幣別精度）
    pub unit_price: Decimal,

    /// 綜合折扣（持久化精度）
    pub composite_discount: Decimal,
    pub tax_type: u8,
    pub tax_rate: Decimal,
    pub net: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// 折扣稅額計算器
pub struct DiscountCalculator;

impl DiscountCalculator {
    /// 計算明細金額
    pub fn compose_line(
        unit_cost: Decimal,
        discounts: &[Decimal; 3],
        tax_rate: Decimal,
        quantity: Decimal,
    ) -> LineAmounts {
        let unit_price = round_currency(unit_cost);
        let composite = round_percent(composite_discount(discounts[0], discounts[1], discounts[2]));

        let net = round_currency(unit_price * (Decimal::ONE - pct_to_ratio(composite)) * quantity);
        let tax = if tax_rate.is_zero() {
            Decimal::ZERO
        } else {
            round_currency(net * pct_to_ratio(tax_rate))
        };

        LineAmounts {
            quantity,
            unit_price,
            composite_discount: composite,
            tax_type: tax_type_for(tax_rate),
            tax_rate,
            net,
            tax,
            total: net + tax,
        }
    }

    /// 計算六欄附加費用，只有 ERP 標記為採購可見的代碼才計費
    pub fn line_charges(
        line_no: u32,
        rates: &[Decimal; CHARGE_SLOTS],
        quantity: Decimal,
        catalog: &[ChargeSlot; CHARGE_SLOTS],
        visible_codes: &HashSet<u32>,
    ) -> LineCharges {
        let mut charges = LineCharges::zeroed(line_no, catalog);
        for (entry, rate) in charges.slots.iter_mut().zip(rates.iter()) {
            if rate.is_zero() || !visible_codes.contains(&entry.code) {
                continue;
            }
            entry.rate = *rate;
            entry.amount = round_currency(*rate * quantity);
        }
        charges
    }

    /// 供應商折讓金額（負值）
    pub fn rebate_amount(percent: Decimal, base: Decimal) -> Decimal {
        -round_currency(base * pct_to_ratio(percent))
    }

    /// 彙總分錄的稅額
    pub fn entry_tax(amount: Decimal, tax_rate: Decimal) -> Decimal {
        round_currency(amount * pct_to_ratio(tax_rate))
    }
}

/// 稅別群組鍵
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaxGroupKey {
    pub tax_type: u8,
    pub tax_rate: Decimal,
}

/// 稅別群組累計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaxGroupTotals {
    /// 未稅淨額合計
    pub base: Decimal,
    pub tax: Decimal,

    /// 各附加費用欄位合計
    pub charges: [Decimal; CHARGE_SLOTS],
}

/// 依稅別群組累計訂單金額
#[derive(Debug, Clone, Default)]
pub struct TaxGroupLedger {
    groups: BTreeMap<TaxGroupKey, TaxGroupTotals>,
}

impl TaxGroupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 累計一筆明細
    pub fn add_line(&mut self, amounts: &LineAmounts, charges: &LineCharges) {
        let key = TaxGroupKey {
            tax_type: amounts.tax_type,
            tax_rate: amounts.tax_rate,
        };
        let totals = self.groups.entry(key).or_default();
        totals.base += amounts.net;
        totals.tax += amounts.tax;
        for (sum, entry) in totals.charges.iter_mut().zip(charges.slots.iter()) {
            *sum += entry.amount;
        }
    }

    /// 依鍵排序的群組
    pub fn groups(&self) -> impl Iterator<Item = (&TaxGroupKey, &TaxGroupTotals)> {
        self.groups.iter()
    }

    pub fn total_base(&self) -> Decimal {
        self.groups.values().map(|g| g.base).sum()
    }

    pub fn total_tax(&self) -> Decimal {
        self.groups.values().map(|g| g.tax).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
