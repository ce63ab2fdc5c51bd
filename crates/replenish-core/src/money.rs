//! 金額與數值工具

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// 幣別精度（小數位）
pub const CURRENCY_DP: u32 = 2;

/// 綜合折扣持久化精度（小數位）
pub const PERCENT_DP: u32 = 14;

/// 四捨五入到幣別精度（半數進位，遠離零）
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// 四捨五入百分比到持久化精度
pub fn round_percent(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PERCENT_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// 百分比轉比例（10 -> 0.10）
pub fn pct_to_ratio(pct: Decimal) -> Decimal {
    pct / Decimal::ONE_HUNDRED
}

/// 寬鬆解析數值文字
///
/// 抽取來源的金額常為文字（含千分位逗號、`nan`、空字串），
/// 任何無法解析的內容一律視為 0，永不失敗。
pub fn parse_lenient(raw: &str) -> Decimal {
    try_parse_lenient(raw).unwrap_or(Decimal::ZERO)
}

/// 寬鬆解析，回傳是否成功（供統計格式錯誤筆數）
pub fn try_parse_lenient(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }

    match cleaned.to_ascii_lowercase().as_str() {
        "nan" | "null" | "none" | "inf" | "-inf" => return None,
        _ => {}
    }

    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

/// 負數截為 0
pub fn non_negative(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO)
}
