//! 採購訂單記錄（寫入 ERP 的固定格式）

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::{ChargeSlot, CHARGE_SLOTS};

/// 稅率為 0 時的稅別
pub const TAX_TYPE_EXEMPT: u8 = 4;

/// 一般稅別
pub const TAX_TYPE_STANDARD: u8 = 1;

/// 依稅率決定稅別
pub fn tax_type_for(tax_rate: Decimal) -> u8 {
    if tax_rate.is_zero() {
        TAX_TYPE_EXEMPT
    } else {
        TAX_TYPE_STANDARD
    }
}

/// 訂單表頭
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderHeader {
    pub series: String,
    pub number: u64,
    pub sub_series: String,

    /// ERP 供應商代碼
    pub vendor_code: String,

    /// 目的倉庫
    pub warehouse_code: String,

    /// 訂單參照文字（`-系列-編號`）
    pub order_ref: String,

    pub order_date: NaiveDate,

    /// 未稅總額（明細淨額合計）
    pub gross_total: Decimal,

    /// 稅額合計（明細稅額 + 彙總分錄稅額）
    pub tax_total: Decimal,

    /// 彙總費用／折讓合計（折讓為負）
    pub charges_total: Decimal,

    /// 應付總額
    pub net_total: Decimal,
}

impl OrderHeader {
    /// 產生訂單參照文字
    pub fn reference_for(series: &str, number: u64) -> String {
        format!("-{}-{}", series, number)
    }
}

/// 訂單明細記錄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineRecord {
    /// 明細序號（從 1 開始）
    pub line_no: u32,
    pub article_code: String,
    pub reference: String,
    pub description: String,
    pub warehouse_code: String,
    pub quantity: Decimal,

    /// 單價（折扣前，已取至幣別精度）
    pub unit_price: Decimal,

    /// 綜合折扣百分比
    pub composite_discount: Decimal,

    /// 折扣文字（`-X%` 或空白）
    pub discount_text: String,

    pub tax_type: u8,
    pub tax_rate: Decimal,

    /// 未稅淨額
    pub net_amount: Decimal,
    pub tax_amount: Decimal,

    /// 含稅總額
    pub total_amount: Decimal,
}

impl OrderLineRecord {
    /// 折扣文字：綜合折扣 > 0 時為 `-X%`，否則空白
    pub fn discount_text_for(composite: Decimal) -> String {
        if composite > Decimal::ZERO {
            format!("-{}%", composite.normalize())
        } else {
            String::new()
        }
    }
}

/// 單一附加費用欄位
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineChargeEntry {
    /// 欄位位置（1..=6）
    pub slot: u8,

    /// ERP 費用代碼
    pub code: u32,

    /// 每單位費率
    pub rate: Decimal,

    /// 金額（不適用時為 0）
    pub amount: Decimal,
}

impl LineChargeEntry {
    /// 零值欄位
    pub fn zero(slot: u8, code: u32) -> Self {
        Self {
            slot,
            code,
            rate: Decimal::ZERO,
            amount: Decimal::ZERO,
        }
    }
}

/// 每筆明細的附加費用（固定六欄）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineCharges {
    pub line_no: u32,
    pub slots: [LineChargeEntry; CHARGE_SLOTS],
}

impl LineCharges {
    /// 建立全部為零的六欄
    pub fn zeroed(line_no: u32, catalog: &[ChargeSlot; CHARGE_SLOTS]) -> Self {
        let mut position = 0u8;
        let slots = (*catalog).map(|slot| {
            position += 1;
            LineChargeEntry::zero(position, slot.code)
        });
        Self { line_no, slots }
    }

    /// 費用合計
    pub fn total(&self) -> Decimal {
        self.slots.iter().map(|s| s.amount).sum()
    }
}

/// 彙總分錄類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsolidatedKind {
    /// 附加費用
    Charge,
    /// 供應商折讓（金額為負）
    Rebate,
}

/// 訂單層級的彙總費用／折讓分錄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedEntry {
    /// 分錄位置（從 1 開始）
    pub position: u32,
    pub code: u32,
    pub sequence: u32,
    pub kind: ConsolidatedKind,
    pub tax_type: u8,
    pub tax_rate: Decimal,

    /// 百分比（費用分錄為 0）
    pub percent: Decimal,

    /// 計算基礎（該稅別群組的未稅淨額）
    pub base: Decimal,
    pub amount: Decimal,
    pub tax_amount: Decimal,
}

/// 付款排程
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEntry {
    pub order_ref: String,
    pub method_code: String,
    pub payment_type: String,
    pub due_date: NaiveDate,
    pub days: u32,
    pub amount: Decimal,
}

/// 組裝完成的採購訂單
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub header: OrderHeader,
    pub lines: Vec<OrderLineRecord>,
    pub line_charges: Vec<LineCharges>,
    pub consolidated: Vec<ConsolidatedEntry>,
    pub payment: PaymentEntry,
}

impl PurchaseOrder {
    /// 產生批次上記錄的訂單摘要
    pub fn to_ref(&self) -> OrderRef {
        OrderRef {
            warehouse_code: self.header.warehouse_code.clone(),
            series: self.header.series.clone(),
            number: self.header.number,
            sub_series: self.header.sub_series.clone(),
            order_ref: self.header.order_ref.clone(),
            line_count: self.lines.len(),
            gross_total: self.header.gross_total,
            tax_total: self.header.tax_total,
            net_total: self.header.net_total,
        }
    }
}

/// 已提交訂單的摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRef {
    pub warehouse_code: String,
    pub series: String,
    pub number: u64,
    pub sub_series: String,
    pub order_ref: String,
    pub line_count: usize,
    pub gross_total: Decimal,
    pub tax_total: Decimal,
    pub net_total: Decimal,
}
