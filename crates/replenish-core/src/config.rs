//! 補貨引擎配置模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::tier::{Tier, TierRuleTable};
use crate::{ReplenishError, Result};

/// 每筆訂單明細固定的附加費用欄位數
pub const CHARGE_SLOTS: usize = 6;

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 預設訂單系列（批次未指定時使用）
    pub default_series: String,

    /// 預設子系列
    pub default_sub_series: String,

    /// 下單數量來源策略
    pub quantity_policy: QuantityPolicy,

    /// 下單數量的箱規取整方式
    pub pack_rounding: PackRounding,

    /// 「與歷史相比大幅跳升」警示門檻（百分比，100 表示增加一倍）
    pub jump_threshold_pct: Decimal,

    /// 六個附加費用欄位對應的 ERP 代碼
    pub charge_slots: [ChargeSlot; CHARGE_SLOTS],

    /// 供應商未設定付款條件時的預設值
    pub default_payment_terms: PaymentTerms,

    /// 分級設定
    pub classification: ClassificationConfig,
}

impl EngineConfig {
    /// 創建預設配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 由 JSON 文字載入（缺少的欄位使用預設值）
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ReplenishError::InvalidConfig(e.to_string()))
    }

    /// 建構器模式：設置預設訂單系列
    pub fn with_default_series(mut self, series: impl Into<String>, sub_series: impl Into<String>) -> Self {
        self.default_series = series.into();
        self.default_sub_series = sub_series.into();
        self
    }

    /// 建構器模式：設置數量策略
    pub fn with_quantity_policy(mut self, policy: QuantityPolicy) -> Self {
        self.quantity_policy = policy;
        self
    }

    /// 建構器模式：設置箱規取整方式
    pub fn with_pack_rounding(mut self, rounding: PackRounding) -> Self {
        self.pack_rounding = rounding;
        self
    }

    /// 建構器模式：設置跳升警示門檻
    pub fn with_jump_threshold_pct(mut self, pct: Decimal) -> Self {
        self.jump_threshold_pct = pct;
        self
    }

    /// 建構器模式：設置附加費用欄位
    pub fn with_charge_slots(mut self, slots: [ChargeSlot; CHARGE_SLOTS]) -> Self {
        self.charge_slots = slots;
        self
    }

    /// 建構器模式：設置預設付款條件
    pub fn with_default_payment_terms(mut self, terms: PaymentTerms) -> Self {
        self.default_payment_terms = terms;
        self
    }

    /// 建構器模式：設置分級設定
    pub fn with_classification(mut self, classification: ClassificationConfig) -> Self {
        self.classification = classification;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_series: "13CP".to_string(),
            default_sub_series: "B".to_string(),
            quantity_policy: QuantityPolicy::PreferBuyer,
            pack_rounding: PackRounding::Up,
            jump_threshold_pct: Decimal::ONE_HUNDRED,
            charge_slots: ChargeSlot::default_catalog(),
            default_payment_terms: PaymentTerms::default(),
            classification: ClassificationConfig::default(),
        }
    }
}

/// 下單數量來源策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantityPolicy {
    /// 採購覆寫 > 0 時優先，否則系統建議量（即有效數量）
    PreferBuyer,
    /// 供應商提案 > 0 且明細已核准時優先，其次採購覆寫，再其次系統建議量
    PreferVendor,
    /// 只使用系統建議量
    SystemOnly,
}

/// 箱規取整方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackRounding {
    /// 向上取整到箱規倍數
    Up,
    /// 向下取整到箱規倍數
    Down,
    /// 取最接近的倍數（等距時向上）
    Nearest,
    /// 不取整
    Exact,
}

/// 附加費用欄位設定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeSlot {
    /// ERP 費用／折扣代碼
    pub code: u32,

    /// ERP 彙總分錄的排序序號
    pub sequence: u32,
}

impl ChargeSlot {
    pub fn new(code: u32, sequence: u32) -> Self {
        Self { code, sequence }
    }

    /// 預設六欄代碼：3、34、39、40、41、42
    pub fn default_catalog() -> [ChargeSlot; CHARGE_SLOTS] {
        [
            ChargeSlot::new(3, 1),
            ChargeSlot::new(34, 2),
            ChargeSlot::new(39, 3),
            ChargeSlot::new(40, 4),
            ChargeSlot::new(41, 5),
            ChargeSlot::new(42, 6),
        ]
    }
}

/// 付款條件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTerms {
    /// 付款方式代碼
    pub method_code: String,

    /// 淨付款天數
    pub days: u32,

    /// 付款類型代碼
    pub payment_type: String,
}

impl PaymentTerms {
    pub fn new(method_code: impl Into<String>, days: u32, payment_type: impl Into<String>) -> Self {
        Self {
            method_code: method_code.into(),
            days,
            payment_type: payment_type.into(),
        }
    }
}

impl Default for PaymentTerms {
    fn default() -> Self {
        Self::new("14", 30, "10")
    }
}

/// 分級設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// 分級區段規則表
    pub bands: TierRuleTable,

    /// 排除的部門
    pub excluded_departments: Vec<String>,

    /// 排除的品牌
    pub excluded_brands: Vec<String>,

    /// 外部鎖定、不參與分級的標記（`I` 一律排除）
    pub pinned_tiers: Vec<Tier>,
}

impl ClassificationConfig {
    /// 建構器模式：設置區段規則表
    pub fn with_bands(mut self, bands: TierRuleTable) -> Self {
        self.bands = bands;
        self
    }

    /// 建構器模式：設置排除部門
    pub fn with_excluded_departments(mut self, departments: Vec<String>) -> Self {
        self.excluded_departments = departments;
        self
    }

    /// 建構器模式：設置排除品牌
    pub fn with_excluded_brands(mut self, brands: Vec<String>) -> Self {
        self.excluded_brands = brands;
        self
    }

    /// 部門是否在排除清單（不分大小寫）
    pub fn is_department_excluded(&self, department: &str) -> bool {
        contains_ignore_case(&self.excluded_departments, department)
    }

    /// 品牌是否在排除清單（不分大小寫）
    pub fn is_brand_excluded(&self, brand: &str) -> bool {
        contains_ignore_case(&self.excluded_brands, brand)
    }

    /// 外部鎖定標記是否排除
    pub fn is_tier_excluded(&self, tier: Tier) -> bool {
        tier.is_inactive() || self.pinned_tiers.contains(&tier)
    }
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            bands: TierRuleTable::default(),
            excluded_departments: Vec::new(),
            excluded_brands: Vec::new(),
            pinned_tiers: vec![Tier::I, Tier::Pinned('T'), Tier::Pinned('R')],
        }
    }
}

fn contains_ignore_case(list: &[String], value: &str) -> bool {
    let value = value.trim();
    list.iter().any(|v| v.trim().eq_ignore_ascii_case(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::new();

        assert_eq!(config.default_series, "13CP");
        assert_eq!(config.default_sub_series, "B");
        assert_eq!(config.quantity_policy, QuantityPolicy::PreferBuyer);
        assert_eq!(config.pack_rounding, PackRounding::Up);
        assert_eq!(config.charge_slots[0].code, 3);
        assert_eq!(config.charge_slots[5].code, 42);
        assert_eq!(config.default_payment_terms.days, 30);
    }

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::new()
            .with_default_series("20CP", "A")
            .with_quantity_policy(QuantityPolicy::SystemOnly)
            .with_pack_rounding(PackRounding::Nearest)
            .with_jump_threshold_pct(Decimal::from(50));

        assert_eq!(config.default_series, "20CP");
        assert_eq!(config.default_sub_series, "A");
        assert_eq!(config.quantity_policy, QuantityPolicy::SystemOnly);
        assert_eq!(config.pack_rounding, PackRounding::Nearest);
        assert_eq!(config.jump_threshold_pct, Decimal::from(50));
    }

    #[test]
    fn test_from_json_partial() {
        let json = r#"{
            "default_series": "99XX",
            "pack_rounding": "Down",
            "classification": {
                "excluded_brands": ["HOUSE BRAND"],
                "bands": [
                    { "order": 1, "tier": "A", "min": "0", "max": "70", "enabled": true },
                    { "order": 2, "tier": "B", "min": "70", "max": "100", "enabled": false }
                ]
            }
        }"#;

        let config = EngineConfig::from_json_str(json).unwrap();

        assert_eq!(config.default_series, "99XX");
        // 未提供的欄位保留預設
        assert_eq!(config.default_sub_series, "B");
        assert_eq!(config.pack_rounding, PackRounding::Down);
        assert!(config.classification.is_brand_excluded("house brand"));
        assert_eq!(config.classification.bands.bands().len(), 2);
        assert_eq!(config.classification.bands.assign(Decimal::from(80)), Tier::C);
    }

    #[test]
    fn test_from_json_invalid() {
        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ReplenishError::InvalidConfig(_)));
    }

    #[test]
    fn test_inactive_always_excluded() {
        let config = ClassificationConfig {
            pinned_tiers: Vec::new(),
            ..ClassificationConfig::default()
        };

        assert!(config.is_tier_excluded(Tier::I));
        assert!(!config.is_tier_excluded(Tier::Pinned('T')));
        assert!(!config.is_tier_excluded(Tier::A));
    }
}
