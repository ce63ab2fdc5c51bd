//! 抽取來源的原始資料列

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::CHARGE_SLOTS;
use crate::line::ReplenishmentLine;
use crate::tier::Tier;

/// 一筆 商品 × 倉庫 的抽取資料
///
/// 營收保留原始文字，由分級引擎寬鬆解析。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRow {
    pub article_code: String,
    pub reference: String,
    pub description: String,
    pub vendor_code: String,
    pub brand: String,
    pub section: String,
    pub department: String,
    pub warehouse_code: String,
    pub warehouse_name: String,
    pub current_stock: Decimal,
    pub min_stock: Decimal,
    pub max_stock: Decimal,
    pub safety_stock: Decimal,
    pub pack_size: Decimal,
    pub unit_cost: Decimal,
    pub tax_rate: Decimal,
    pub charge_rates: [Decimal; CHARGE_SLOTS],
    pub discounts: [Decimal; 3],

    /// 原始營收文字
    pub revenue_raw: String,

    /// 外部分級標記（可能為空）
    pub tier_raw: String,

    /// 歷史最近下單數量
    pub last_order_quantity: Decimal,
}

impl ExtractionRow {
    /// 創建新的抽取資料列
    pub fn new(
        article_code: impl Into<String>,
        warehouse_code: impl Into<String>,
        vendor_code: impl Into<String>,
    ) -> Self {
        Self {
            article_code: article_code.into(),
            reference: String::new(),
            description: String::new(),
            vendor_code: vendor_code.into(),
            brand: String::new(),
            section: String::new(),
            department: String::new(),
            warehouse_code: warehouse_code.into(),
            warehouse_name: String::new(),
            current_stock: Decimal::ZERO,
            min_stock: Decimal::ZERO,
            max_stock: Decimal::ZERO,
            safety_stock: Decimal::ZERO,
            pack_size: Decimal::ONE,
            unit_cost: Decimal::ZERO,
            tax_rate: Decimal::ZERO,
            charge_rates: [Decimal::ZERO; CHARGE_SLOTS],
            discounts: [Decimal::ZERO; 3],
            revenue_raw: String::new(),
            tier_raw: String::new(),
            last_order_quantity: Decimal::ZERO,
        }
    }

    /// 建構器模式：設置分類鍵
    pub fn with_classification_keys(
        mut self,
        section: impl Into<String>,
        department: impl Into<String>,
        brand: impl Into<String>,
    ) -> Self {
        self.section = section.into();
        self.department = department.into();
        self.brand = brand.into();
        self
    }

    /// 建構器模式：設置庫存（現有、最高）
    pub fn with_stock(mut self, current: Decimal, max: Decimal) -> Self {
        self.current_stock = current;
        self.max_stock = max;
        self
    }

    /// 建構器模式：設置箱規
    pub fn with_pack_size(mut self, pack_size: Decimal) -> Self {
        self.pack_size = pack_size;
        self
    }

    /// 建構器模式：設置成本與稅率
    pub fn with_pricing(mut self, unit_cost: Decimal, tax_rate: Decimal) -> Self {
        self.unit_cost = unit_cost;
        self.tax_rate = tax_rate;
        self
    }

    /// 建構器模式：設置營收原始文字
    pub fn with_revenue(mut self, revenue_raw: impl Into<String>) -> Self {
        self.revenue_raw = revenue_raw.into();
        self
    }

    /// 建構器模式：設置外部分級標記
    pub fn with_tier(mut self, tier_raw: impl Into<String>) -> Self {
        self.tier_raw = tier_raw.into();
        self
    }

    /// 建構器模式：設置歷史下單數量
    pub fn with_last_order_quantity(mut self, quantity: Decimal) -> Self {
        self.last_order_quantity = quantity;
        self
    }

    /// 外部分級
    pub fn tier(&self) -> Option<Tier> {
        Tier::parse(&self.tier_raw)
    }

    /// 轉為明細（數量由呼叫端計算後設置）
    pub fn to_line(&self) -> ReplenishmentLine {
        let mut line = ReplenishmentLine::new(
            self.article_code.clone(),
            self.warehouse_code.clone(),
            self.vendor_code.clone(),
        )
        .with_description(self.reference.clone(), self.description.clone())
        .with_classification_keys(self.section.clone(), self.department.clone(), self.brand.clone())
        .with_warehouse_name(self.warehouse_name.clone())
        .with_stock(self.current_stock, self.min_stock, self.max_stock, self.safety_stock)
        .with_pack_size(self.pack_size)
        .with_unit_cost(self.unit_cost)
        .with_tax_rate(self.tax_rate)
        .with_charge_rates(self.charge_rates)
        .with_discounts(self.discounts)
        .with_last_order_quantity(self.last_order_quantity);

        if let Some(tier) = self.tier() {
            line = line.with_tier(tier);
        }
        line
    }
}
