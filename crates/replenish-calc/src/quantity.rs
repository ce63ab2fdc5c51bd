//! 建議數量計算（箱規取整）

use replenish_core::{LineFlags, LineState, PackRounding, QuantityPolicy, ReplenishmentLine, Tier};
use rust_decimal::Decimal;

/// 建議數量計算器
pub struct QuantityCalculator;

impl QuantityCalculator {
    /// 依庫存缺口計算建議數量
    ///
    /// 停用分級（I）一律為 0。採購單位為箱規；箱規大於最高庫存時改用半箱，
    /// 半箱仍大於最高庫存時改用四分之一箱（此時單位大於缺口則為 0）。
    /// 缺口不足半個單位為 0，餘數達半個單位時進位。
    pub fn suggest(current: Decimal, max: Decimal, pack: Decimal, tier: Option<Tier>) -> Decimal {
        if tier.map(Tier::is_inactive).unwrap_or(false) {
            return Decimal::ZERO;
        }

        let gap = (max - current).max(Decimal::ZERO);
        let pack = Self::normalize_pack(pack);

        let unit = if pack <= max {
            pack
        } else {
            let half = (pack / Decimal::TWO).floor();
            if half <= max {
                half
            } else {
                let quarter = (pack / Decimal::from(4)).floor();
                if quarter > gap {
                    return Decimal::ZERO;
                }
                quarter
            }
        };

        Self::round_to_units(gap, unit)
    }

    /// 將任意候選數量依同一 50% 規則取整到箱規倍數
    pub fn adjust_to_pack(candidate: Decimal, pack: Decimal) -> Decimal {
        if candidate <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        Self::round_to_units(candidate, Self::normalize_pack(pack))
    }

    /// 決定實際下單數量
    pub fn order_quantity(
        line: &ReplenishmentLine,
        policy: QuantityPolicy,
        rounding: PackRounding,
    ) -> Decimal {
        if line.is_inactive() {
            return Decimal::ZERO;
        }

        let quantity = match policy {
            QuantityPolicy::PreferBuyer => line.effective_quantity(),
            QuantityPolicy::PreferVendor => {
                if line.state == LineState::Approved && line.vendor_quantity > Decimal::ZERO {
                    line.vendor_quantity
                } else {
                    line.effective_quantity()
                }
            }
            QuantityPolicy::SystemOnly => line.system_quantity,
        };

        if quantity <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let pack = Self::normalize_pack(line.pack_size).floor();
        if pack <= Decimal::ONE {
            return quantity;
        }

        let down = (quantity / pack).floor() * pack;
        let up = (quantity / pack).ceil() * pack;
        match rounding {
            PackRounding::Up => up,
            PackRounding::Down => down,
            PackRounding::Nearest => {
                // 等距時向上
                if quantity - down >= up - quantity {
                    up
                } else {
                    down
                }
            }
            PackRounding::Exact => quantity,
        }
    }

    /// 計算明細警示旗標
    pub fn evaluate_flags(line: &ReplenishmentLine, jump_threshold_pct: Decimal) -> LineFlags {
        let pack = Self::normalize_pack(line.pack_size);
        let proposed = if line.vendor_quantity > Decimal::ZERO {
            line.vendor_quantity
        } else {
            line.effective_quantity()
        };

        let non_pack_multiple =
            pack > Decimal::ONE && proposed > Decimal::ZERO && !(proposed % pack).is_zero();

        let history = line.last_order_quantity;
        let large_jump = history > Decimal::ZERO
            && line.effective_quantity()
                >= history * (Decimal::ONE + jump_threshold_pct / Decimal::ONE_HUNDRED);

        LineFlags {
            non_pack_multiple,
            large_jump,
        }
    }

    /// 50% 門檻取整
    fn round_to_units(quantity: Decimal, unit: Decimal) -> Decimal {
        if unit <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let half_unit = unit / Decimal::TWO;
        if quantity < half_unit {
            return Decimal::ZERO;
        }

        let whole = (quantity / unit).floor();
        let remainder = quantity - whole * unit;
        let mut units = if remainder >= half_unit {
            whole + Decimal::ONE
        } else {
            whole
        };

        // 缺口已達半個單位，至少一個單位
        if units.is_zero() {
            units = Decimal::ONE;
        }

        units * unit
    }

    fn normalize_pack(pack: Decimal) -> Decimal {
        if pack <= Decimal::ZERO {
            Decimal::ONE
        } else {
            pack
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    #[rstest]
    #[case(80, 100, 10, 20)] // 缺口 20，整箱
    #[case(95, 100, 10, 10)] // 缺口剛好半箱 -> 進位一箱
    #[case(96, 100, 10, 0)] // 缺口不足半箱
    #[case(77, 100, 10, 20)] // 餘數 3 捨去
    #[case(74, 100, 10, 30)] // 餘數 6 進位
    #[case(0, 100, 12, 96)] // 100 = 8*12 + 4
    #[case(120, 100, 10, 0)] // 庫存高於目標
    #[case(0, 6, 10, 5)] // 箱規大於目標 -> 半箱
    #[case(0, 3, 10, 4)] // 半箱仍大於目標 -> 四分之一箱
    #[case(2, 3, 10, 0)] // 四分之一箱大於缺口
    #[case(0, 10, 0, 10)] // 箱規 0 視為 1
    #[case(3, 6, 12, 6)] // 半箱 6：缺口剛好半個單位 -> 進位
    #[case(4, 6, 12, 0)] // 半箱 6：缺口不足半個單位
    #[case(1, 7, 16, 8)] // 四分之一箱 4：餘數剛好半個單位 -> 進位
    #[case(2, 7, 16, 4)] // 四分之一箱 4：餘數 1 捨去
    #[case(5, 7, 16, 0)] // 四分之一箱 4 大於缺口 2（即使剛好半個單位）
    fn test_suggest(#[case] current: i64, #[case] max: i64, #[case] pack: i64, #[case] expected: i64) {
        assert_eq!(QuantityCalculator::suggest(d(current), d(max), d(pack), None), d(expected));
    }

    #[rstest]
    #[case("3.5", "5")] // 半箱 5：缺口 2.5 剛好半個單位 -> 進位
    #[case("3.6", "0")] // 缺口 2.4
    #[case("0", "5")] // suggest(0, 6, 10)：缺口 6 = 5 + 1
    #[case("-1.5", "10")] // 缺口 7.5：餘數 2.5 剛好半個單位 -> 進位
    fn test_half_pack_boundary(#[case] current: &str, #[case] expected: &str) {
        let current: Decimal = current.parse().unwrap();
        let expected: Decimal = expected.parse().unwrap();
        assert_eq!(QuantityCalculator::suggest(current, d(6), d(10), None), expected);
    }

    #[test]
    fn test_inactive_always_zero() {
        assert_eq!(
            QuantityCalculator::suggest(d(0), d(1000), d(10), Some(Tier::I)),
            Decimal::ZERO
        );
        assert_eq!(
            QuantityCalculator::suggest(d(0), d(1000), d(10), Some(Tier::A)),
            d(1000)
        );
    }

    #[rstest]
    #[case(5, 10, 10)] // 剛好半箱 -> 進位（與 suggest 一致）
    #[case(4, 10, 0)]
    #[case(23, 10, 20)]
    #[case(25, 10, 30)]
    #[case(7, 1, 7)]
    #[case(0, 10, 0)]
    #[case(-3, 10, 0)]
    fn test_adjust_to_pack(#[case] candidate: i64, #[case] pack: i64, #[case] expected: i64) {
        assert_eq!(QuantityCalculator::adjust_to_pack(d(candidate), d(pack)), d(expected));
    }

    fn line_with(system: i64, vendor: i64, buyer: i64, pack: i64) -> ReplenishmentLine {
        let mut line = ReplenishmentLine::new("1", "50", "V")
            .with_pack_size(d(pack))
            .with_system_quantity(d(system))
            .with_buyer_quantity(d(buyer));
        line.vendor_quantity = d(vendor);
        line
    }

    #[rstest]
    #[case(PackRounding::Up, 30)]
    #[case(PackRounding::Down, 20)]
    #[case(PackRounding::Nearest, 30)]
    #[case(PackRounding::Exact, 25)]
    fn test_order_quantity_rounding(#[case] rounding: PackRounding, #[case] expected: i64) {
        let line = line_with(25, 0, 0, 10);
        assert_eq!(
            QuantityCalculator::order_quantity(&line, QuantityPolicy::PreferBuyer, rounding),
            d(expected)
        );
    }

    #[test]
    fn test_order_quantity_policies() {
        let mut line = line_with(10, 40, 20, 1);

        assert_eq!(
            QuantityCalculator::order_quantity(&line, QuantityPolicy::PreferBuyer, PackRounding::Up),
            d(20)
        );
        assert_eq!(
            QuantityCalculator::order_quantity(&line, QuantityPolicy::SystemOnly, PackRounding::Up),
            d(10)
        );
        // 未核准時不採用供應商提案
        assert_eq!(
            QuantityCalculator::order_quantity(&line, QuantityPolicy::PreferVendor, PackRounding::Up),
            d(20)
        );

        line.state = LineState::Approved;
        assert_eq!(
            QuantityCalculator::order_quantity(&line, QuantityPolicy::PreferVendor, PackRounding::Up),
            d(40)
        );
    }

    #[test]
    fn test_order_quantity_inactive_line() {
        let line = line_with(10, 0, 20, 1).with_tier(Tier::I);
        assert_eq!(
            QuantityCalculator::order_quantity(&line, QuantityPolicy::PreferBuyer, PackRounding::Up),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_flags() {
        let line = line_with(20, 15, 0, 10).with_last_order_quantity(d(10));
        let flags = QuantityCalculator::evaluate_flags(&line, Decimal::ONE_HUNDRED);

        assert!(flags.non_pack_multiple);
        assert!(flags.large_jump); // 20 >= 10 * 2

        let calm = line_with(20, 20, 0, 10).with_last_order_quantity(d(15));
        let flags = QuantityCalculator::evaluate_flags(&calm, Decimal::ONE_HUNDRED);
        assert!(!flags.any());
    }

    #[test]
    fn test_no_history_no_jump() {
        let line = line_with(500, 0, 0, 1);
        assert!(!QuantityCalculator::evaluate_flags(&line, Decimal::ONE_HUNDRED).large_jump);
    }

    proptest! {
        #[test]
        fn suggest_is_idempotent_and_pack_aligned(
            current in 0i64..500,
            max in 0i64..500,
            pack in 1i64..48,
        ) {
            let first = QuantityCalculator::suggest(d(current), d(max), d(pack), None);
            let second = QuantityCalculator::suggest(d(current), d(max), d(pack), None);
            prop_assert_eq!(first, second);
            prop_assert!(first >= Decimal::ZERO);

            if pack <= max {
                prop_assert!((first % d(pack)).is_zero());
            }
        }

        #[test]
        fn inactive_tier_always_zero(current in 0i64..500, max in 0i64..500, pack in 0i64..48) {
            prop_assert_eq!(
                QuantityCalculator::suggest(d(current), d(max), d(pack), Some(Tier::I)),
                Decimal::ZERO
            );
        }
    }
}
