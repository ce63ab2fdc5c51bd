//! 補貨批次模型

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::line::ReplenishmentLine;
use crate::order::OrderRef;
use crate::{ReplenishError, Result};

/// 批次狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchState {
    /// 待處理
    Pending,
    /// 已送供應商
    Sent,
    /// 已確認（供應商或採購）
    Confirmed,
    /// 已產生訂單（終態）
    Completed,
    /// 已作廢（終態）
    Voided,
}

impl BatchState {
    /// 是否為終態
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchState::Completed | BatchState::Voided)
    }

    /// 檢查狀態轉換是否合法
    pub fn can_transition_to(self, next: BatchState) -> bool {
        use BatchState::*;
        match (self, next) {
            (Pending, Sent) => true,
            (Pending | Sent, Confirmed) => true,
            (Pending | Sent | Confirmed, Completed | Voided) => true,
            _ => false,
        }
    }
}

/// 供應商參照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorRef {
    /// 抽取來源的供應商代碼（與明細 vendor_code 對應）
    pub code: String,

    /// 供應商名稱
    pub name: String,

    /// ERP 供應商代碼
    pub erp_code: Option<String>,
}

impl VendorRef {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            erp_code: None,
        }
    }

    /// 建構器模式：設置 ERP 代碼
    pub fn with_erp_code(mut self, erp_code: impl Into<String>) -> Self {
        self.erp_code = Some(erp_code.into());
        self
    }

    /// 有效的 ERP 代碼（空白視為缺少）
    pub fn usable_erp_code(&self) -> Option<&str> {
        self.erp_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty() && *code != "0")
    }
}

/// 訂單編號設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNumbering {
    /// 訂單系列
    pub series: String,

    /// 子系列
    pub sub_series: String,
}

impl OrderNumbering {
    pub fn new(series: impl Into<String>, sub_series: impl Into<String>) -> Self {
        Self {
            series: series.into(),
            sub_series: sub_series.into(),
        }
    }
}

/// 補貨批次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplenishmentBatch {
    /// 批次ID
    pub id: Uuid,

    /// 顯示名稱
    pub name: String,

    /// 所屬供應商
    pub vendor: Option<VendorRef>,

    /// 抽取時間
    pub extracted_at: NaiveDateTime,

    /// 批次狀態
    pub state: BatchState,

    /// 明細筆數
    pub line_count: usize,

    /// 總成本
    pub total_cost: Decimal,

    /// 已產生的訂單
    pub orders: Vec<OrderRef>,

    /// 訂單編號設定（未設定時使用引擎配置）
    pub numbering: Option<OrderNumbering>,

    /// 明細
    pub lines: Vec<ReplenishmentLine>,
}

impl ReplenishmentBatch {
    /// 創建空批次
    pub fn new(name: impl Into<String>, extracted_at: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            vendor: None,
            extracted_at,
            state: BatchState::Pending,
            line_count: 0,
            total_cost: Decimal::ZERO,
            orders: Vec::new(),
            numbering: None,
            lines: Vec::new(),
        }
    }

    /// 建構器模式：設置供應商
    pub fn with_vendor(mut self, vendor: VendorRef) -> Self {
        self.vendor = Some(vendor);
        self
    }

    /// 建構器模式：設置訂單編號
    pub fn with_numbering(mut self, numbering: OrderNumbering) -> Self {
        self.numbering = Some(numbering);
        self
    }

    /// 建構器模式：設置明細
    pub fn with_lines(mut self, lines: Vec<ReplenishmentLine>) -> Self {
        self.lines = lines;
        self.recompute_totals();
        self
    }

    /// 添加明細
    pub fn push_line(&mut self, line: ReplenishmentLine) {
        self.lines.push(line);
        self.recompute_totals();
    }

    /// 重新計算明細成本與批次彙總
    pub fn recompute_totals(&mut self) {
        for line in &mut self.lines {
            line.recompute_cost();
        }
        self.line_count = self.lines.len();
        self.total_cost = self.lines.iter().map(|l| l.line_cost).sum();
    }

    /// 依ID查找明細
    pub fn line(&self, id: Uuid) -> Option<&ReplenishmentLine> {
        self.lines.iter().find(|l| l.id == id)
    }

    /// 依ID查找明細（可變）
    pub fn line_mut(&mut self, id: Uuid) -> Result<&mut ReplenishmentLine> {
        self.lines
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(ReplenishError::LineNotFound(id))
    }

    /// 是否為終態
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// 狀態轉換
    pub fn transition(&mut self, next: BatchState) -> Result<()> {
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
