//! 補貨明細模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::CHARGE_SLOTS;
use crate::money::non_negative;
use crate::tier::Tier;
use crate::{ReplenishError, Result};

/// 明細狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineState {
    /// 待處理
    Pending,
    /// 已送供應商
    Sent,
    /// 供應商已回覆
    Responded,
    /// 已核准
    Approved,
    /// 已退回
    Rejected,
    /// 已下單（終態）
    Ordered,
}

impl LineState {
    /// 是否為終態
    pub fn is_terminal(self) -> bool {
        self == LineState::Ordered
    }

    /// 檢查狀態轉換是否合法
    pub fn can_transition_to(self, next: LineState) -> bool {
        use LineState::*;
        match (self, next) {
            (Pending, Sent) => true,
            (Sent, Responded) => true,
            (Pending | Sent | Responded, Approved | Rejected) => true,
            // 採購可改變核准／退回決定
            (Approved, Rejected) | (Rejected, Approved) => true,
            (Pending | Sent | Responded | Approved, Ordered) => true,
            _ => false,
        }
    }
}

/// 明細警示旗標
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineFlags {
    /// 數量不是箱規倍數
    pub non_pack_multiple: bool,

    /// 相較歷史下單量大幅跳升
    pub large_jump: bool,
}

impl LineFlags {
    /// 是否有任一警示
    pub fn any(&self) -> bool {
        self.non_pack_multiple || self.large_jump
    }
}

/// 補貨明細（批次內的一組 商品 × 倉庫）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplenishmentLine {
    /// 明細ID
    pub id: Uuid,

    /// 商品代碼
    pub article_code: String,

    /// 商品參考號
    pub reference: String,

    /// 商品描述
    pub description: String,

    /// 供應商代碼
    pub vendor_code: String,

    /// 品牌
    pub brand: String,

    /// 區段（分級分組用）
    pub section: String,

    /// 部門
    pub department: String,

    /// 倉庫代碼
    pub warehouse_code: String,

    /// 倉庫名稱
    pub warehouse_name: String,

    /// 現有庫存
    pub current_stock: Decimal,

    /// 最低庫存
    pub min_stock: Decimal,

    /// 最高庫存（補貨目標）
    pub max_stock: Decimal,

    /// 安全庫存
    pub safety_stock: Decimal,

    /// 箱規（最小採購倍數）
    pub pack_size: Decimal,

    /// 最近單位成本
    pub unit_cost: Decimal,

    /// 稅率（百分比）
    pub tax_rate: Decimal,

    /// 六個附加費用欄位的費率（每單位金額）
    pub charge_rates: [Decimal; CHARGE_SLOTS],

    /// 系統建議數量
    pub system_quantity: Decimal,

    /// 供應商提案數量
    pub vendor_quantity: Decimal,

    /// 採購覆寫數量（0 表示未覆寫）
    pub buyer_quantity: Decimal,

    /// 三段連續折扣（百分比）
    pub discounts: [Decimal; 3],

    /// 目前分級
    pub tier: Option<Tier>,

    /// 抽取時的分級
    pub tier_at_extraction: Option<Tier>,

    /// 明細成本（有效數量 × 單位成本）
    pub line_cost: Decimal,

    /// 明細狀態
    pub state: LineState,

    /// 警示旗標
    pub flags: LineFlags,

    /// 歷史最近下單數量
    pub last_order_quantity: Decimal,

    /// 供應商備註
    pub vendor_notes: Option<String>,

    /// 抽取時無缺口，僅供參考
    pub informational: bool,

    /// 供應商表示持續供貨（false 時轉為停用分級）
    pub continuity_active: bool,
}

impl ReplenishmentLine {
    /// 創建新的明細
    pub fn new(
        article_code: impl Into<String>,
        warehouse_code: impl Into<String>,
        vendor_code: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
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
            system_quantity: Decimal::ZERO,
            vendor_quantity: Decimal::ZERO,
            buyer_quantity: Decimal::ZERO,
            discounts: [Decimal::ZERO; 3],
            tier: None,
            tier_at_extraction: None,
            line_cost: Decimal::ZERO,
            state: LineState::Pending,
            flags: LineFlags::default(),
            last_order_quantity: Decimal::ZERO,
            vendor_notes: None,
            informational: false,
            continuity_active: true,
        }
    }

    /// 建構器模式：設置商品描述
    pub fn with_description(mut self, reference: impl Into<String>, description: impl Into<String>) -> Self {
        self.reference = reference.into();
        self.description = description.into();
        self
    }

    /// 建構器模式：設置分類（區段、部門、品牌）
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

    /// 建構器模式：設置倉庫名稱
    pub fn with_warehouse_name(mut self, name: impl Into<String>) -> Self {
        self.warehouse_name = name.into();
        self
    }

    /// 建構器模式：設置庫存水位
    pub fn with_stock(mut self, current: Decimal, min: Decimal, max: Decimal, safety: Decimal) -> Self {
        self.current_stock = current;
        self.min_stock = min;
        self.max_stock = max;
        self.safety_stock = safety;
        self
    }

    /// 建構器模式：設置箱規
    pub fn with_pack_size(mut self, pack_size: Decimal) -> Self {
        self.pack_size = pack_size;
        self
    }

    /// 建構器模式：設置單位成本
    pub fn with_unit_cost(mut self, unit_cost: Decimal) -> Self {
        self.unit_cost = non_negative(unit_cost);
        self.recompute_cost();
        self
    }

    /// 建構器模式：設置稅率
    pub fn with_tax_rate(mut self, tax_rate: Decimal) -> Self {
        self.tax_rate = non_negative(tax_rate);
        self
    }

    /// 建構器模式：設置附加費用費率
    pub fn with_charge_rates(mut self, rates: [Decimal; CHARGE_SLOTS]) -> Self {
        self.charge_rates = rates.map(non_negative);
        self
    }

    /// 建構器模式：設置三段折扣
    pub fn with_discounts(mut self, discounts: [Decimal; 3]) -> Self {
        self.discounts = discounts.map(non_negative);
        self
    }

    /// 建構器模式：設置分級（同時記錄為抽取時分級）
    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self.tier_at_extraction = Some(tier);
        self
    }

    /// 建構器模式：設置系統建議數量（供應商提案預設相同）
    pub fn with_system_quantity(mut self, quantity: Decimal) -> Self {
        let quantity = non_negative(quantity);
        self.system_quantity = quantity;
        self.vendor_quantity = quantity;
        self.recompute_cost();
        self
    }

    /// 建構器模式：設置採購覆寫數量
    pub fn with_buyer_quantity(mut self, quantity: Decimal) -> Self {
        self.buyer_quantity = non_negative(quantity);
        self.recompute_cost();
        self
    }

    /// 建構器模式：設置歷史下單數量
    pub fn with_last_order_quantity(mut self, quantity: Decimal) -> Self {
        self.last_order_quantity = non_negative(quantity);
        self
    }

    /// 建構器模式：標記為僅供參考
    pub fn with_informational(mut self, informational: bool) -> Self {
        self.informational = informational;
        self
    }

    /// 有效數量：採購覆寫 > 0 時優先，否則系統建議
    pub fn effective_quantity(&self) -> Decimal {
        if self.buyer_quantity > Decimal::ZERO {
            self.buyer_quantity
        } else {
            self.system_quantity
        }
    }

    /// 重新計算明細成本
    pub fn recompute_cost(&mut self) {
        self.line_cost = self.effective_quantity() * self.unit_cost;
    }

    /// 是否已下單
    pub fn is_ordered(&self) -> bool {
        self.state.is_terminal()
    }

    /// 分級是否為停用
    pub fn is_inactive(&self) -> bool {
        self.tier.map(Tier::is_inactive).unwrap_or(false)
    }

    /// 數量全部歸零（停用分級）
    pub fn zero_quantities(&mut self) {
        self.system_quantity = Decimal::ZERO;
        self.vendor_quantity = Decimal::ZERO;
        self.buyer_quantity = Decimal::ZERO;
        self.recompute_cost();
    }

    /// 供應商停止供貨：轉為 I 級並歸零數量
    pub fn discontinue(&mut self) {
        self.continuity_active = false;
        self.tier = Some(Tier::I);
        self.zero_quantities();
    }

    /// 目前分級是否已不同於抽取時
    pub fn tier_changed(&self) -> bool {
        self.tier_at_extraction.is_some() && self.tier != self.tier_at_extraction
    }

    /// 狀態轉換
    pub fn transition(&mut self, next: LineState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(ReplenishError::InvalidTransition {
                from: format!("{:?}", self.state),
                to: format!("{:?}", next),
            });
        }
        self.state = next;
        Ok(())
    }
}
