//! ERP 寫入協作者介面

use replenish_core::{
    ConsolidatedEntry, LineCharges, OrderHeader, OrderLineRecord, PaymentEntry, PaymentTerms,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// ERP 資料表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErpTable {
    Header,
    Lines,
    LineCharges,
    Consolidated,
    Payment,
    OnOrder,
}

impl fmt::Display for ErpTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErpTable::Header => "訂單表頭",
            ErpTable::Lines => "訂單明細",
            ErpTable::LineCharges => "明細費用",
            ErpTable::Consolidated => "彙總費用折讓",
            ErpTable::Payment => "付款排程",
            ErpTable::OnOrder => "在途數量",
        };
        f.write_str(name)
    }
}

/// ERP 錯誤
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErpError {
    #[error("ERP 連線失敗: {0}")]
    Connection(String),

    #[error("ERP 寫入失敗（{table}）: {message}")]
    Write { table: ErpTable, message: String },

    #[error("訂單序號無法取得: {series}")]
    SequenceConflict { series: String },

    #[error("ERP 鎖已損毀")]
    LockPoisoned,

    #[error("ERP 提交失敗: {0}")]
    Commit(String),
}

/// 供應商層級折讓
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorRebate {
    /// ERP 折讓代碼
    pub code: u32,

    /// 百分比（套用在稅別群組的未稅淨額）
    pub percent: Decimal,

    /// 彙總分錄排序序號
    pub sequence: u32,
}

impl VendorRebate {
    pub fn new(code: u32, percent: Decimal, sequence: u32) -> Self {
        Self {
            code,
            percent,
            sequence,
        }
    }
}

/// ERP 儲存（開啟交易）
pub trait ErpStore: Send + Sync {
    fn begin(&self) -> Result<Box<dyn ErpTransaction + '_>, ErpError>;
}

/// 單一 ERP 交易，全部寫入在 commit 之前不可見
pub trait ErpTransaction {
    /// 在互斥鎖下取得系列的下一個訂單編號（鎖持有到交易結束）
    fn next_order_number(&mut self, series: &str) -> Result<u64, ErpError>;

    /// 標記為採購可見的費用代碼
    fn visible_charge_codes(&mut self) -> Result<HashSet<u32>, ErpError>;

    fn vendor_rebates(&mut self, vendor_code: &str) -> Result<Vec<VendorRebate>, ErpError>;

    fn payment_terms(&mut self, vendor_code: &str) -> Result<Option<PaymentTerms>, ErpError>;

    fn insert_header(&mut self, header: &OrderHeader) -> Result<(), ErpError>;

    fn insert_lines(&mut self, header: &OrderHeader, lines: &[OrderLineRecord]) -> Result<(), ErpError>;

    fn insert_line_charges(&mut self, header: &OrderHeader, charges: &[LineCharges]) -> Result<(), ErpError>;

    fn insert_consolidated(
        &mut self,
        header: &OrderHeader,
        entries: &[ConsolidatedEntry],
    ) -> Result<(), ErpError>;

    fn insert_payment(&mut self, header: &OrderHeader, payment: &PaymentEntry) -> Result<(), ErpError>;

    /// 累加目的倉庫的在途數量
    fn add_on_order(&mut self, warehouse: &str, article: &str, quantity: Decimal) -> Result<(), ErpError>;

    fn commit(self: Box<Self>) -> Result<(), ErpError>;

    fn rollback(self: Box<Self>) -> Result<(), ErpError>;
}
