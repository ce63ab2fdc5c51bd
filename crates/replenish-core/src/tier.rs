//! 需求分級模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 需求分級
///
/// A~E 由累計營收貢獻（柏拉圖排序）決定；
/// `I` 為外部鎖定的停用／不補貨標記，與 A~E 區段無關。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    A,
    B,
    C,
    D,
    E,
    /// 停用（不補貨）
    I,
    /// 其他外部鎖定標記（例如 T、R），原樣保留
    Pinned(char),
}

impl Tier {
    /// 解析外部分級標記（不分大小寫，空白視為無分級）
    pub fn parse(raw: &str) -> Option<Self> {
        // 多字元標記只取第一個字元
        let first = raw.trim().chars().next()?.to_ascii_uppercase();
        Some(match first {
            'A' => Tier::A,
            'B' => Tier::B,
            'C' => Tier::C,
            'D' => Tier::D,
            'E' => Tier::E,
            'I' => Tier::I,
            other => Tier::Pinned(other),
        })
    }

    /// 是否為停用分級
    pub fn is_inactive(self) -> bool {
        self == Tier::I
    }

    /// 是否為外部鎖定（I 或其他標記）
    pub fn is_pinned(self) -> bool {
        matches!(self, Tier::I | Tier::Pinned(_))
    }

    /// 標記字元
    pub fn code(self) -> char {
        match self {
            Tier::A => 'A',
            Tier::B => 'B',
            Tier::C => 'C',
            Tier::D => 'D',
            Tier::E => 'E',
            Tier::I => 'I',
            Tier::Pinned(c) => c,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// 分級區段規則（不可變）
///
/// 累計百分比落在 `[min, max)` 時套用 `tier`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierBand {
    /// 評估順序（小者優先）
    pub order: u32,

    /// 套用的分級
    pub tier: Tier,

    /// 下限（含）
    pub min: Decimal,

    /// 上限（不含）
    pub max: Decimal,

    /// 是否啟用
    pub enabled: bool,
}

impl TierBand {
    /// 創建啟用中的區段
    pub fn new(order: u32, tier: Tier, min: Decimal, max: Decimal) -> Self {
        Self {
            order,
            tier,
            min,
            max,
            enabled: true,
        }
    }

    /// 建構器模式：設置是否啟用
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// 檢查累計百分比是否落在區段內
    pub fn contains(&self, cumulative: Decimal) -> bool {
        self.min <= cumulative && cumulative < self.max
    }
}

/// 分級規則表（每次執行載入，依 order 排序）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<TierBand>", into = "Vec<TierBand>")]
pub struct TierRuleTable {
    bands: Vec<TierBand>,
}

impl TierRuleTable {
    /// 無區段匹配時的預設分級
    pub const FALLBACK: Tier = Tier::C;

    /// 創建規則表（自動依 order 排序）
    pub fn new(mut bands: Vec<TierBand>) -> Self {
        bands.sort_by_key(|b| b.order);
        Self { bands }
    }

    /// 依累計百分比決定分級
    pub fn assign(&self, cumulative: Decimal) -> Tier {
        self.bands
            .iter()
            .filter(|b| b.enabled)
            .find(|b| b.contains(cumulative))
            .map(|b| b.tier)
            .unwrap_or(Self::FALLBACK)
    }

    /// 所有區段（含停用）
    pub fn bands(&self) -> &[TierBand] {
        &self.bands
    }
}

impl Default for TierRuleTable {
    /// 預設：A [0,50)、B [50,80)、C [80,95)、D [95,101)
    fn default() -> Self {
        Self::new(vec![
            TierBand::new(1, Tier::A, Decimal::ZERO, Decimal::from(50)),
            TierBand::new(2, Tier::B, Decimal::from(50), Decimal::from(80)),
            TierBand::new(3, Tier::C, Decimal::from(80), Decimal::from(95)),
            TierBand::new(4, Tier::D, Decimal::from(95), Decimal::from(101)),
        ])
    }
}

impl From<Vec<TierBand>> for TierRuleTable {
    fn from(bands: Vec<TierBand>) -> Self {
        Self::new(bands)
    }
}

impl From<TierRuleTable> for Vec<TierBand> {
    fn from(table: TierRuleTable) -> Self {
        table.bands
    }
}
