//! # Replenish Core
//!
//! 補貨引擎核心資料模型與類型定義

pub mod batch;
pub mod config;
pub mod extraction;
pub mod line;
pub mod money;
pub mod order;
pub mod tier;

// Re-export 主要類型
pub use batch::{BatchState, OrderNumbering, ReplenishmentBatch, VendorRef};
pub use config::{
    ChargeSlot, ClassificationConfig, EngineConfig, PackRounding, PaymentTerms, QuantityPolicy,
    CHARGE_SLOTS,
};
pub use extraction::ExtractionRow;
pub use line::{LineFlags, LineState, ReplenishmentLine};
pub use order::{
    ConsolidatedEntry, ConsolidatedKind, LineChargeEntry, LineCharges, OrderHeader,
    OrderLineRecord, OrderRef, PaymentEntry, PurchaseOrder,
};
pub use tier::{Tier, TierBand, TierRuleTable};

/// 補貨引擎錯誤類型
#[derive(Debug, thiserror::Error)]
pub enum ReplenishError {
    #[error("配置解析失敗: {0}")]
    InvalidConfig(String),

    #[error("無效的狀態轉換: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("找不到明細: {0}")]
    LineNotFound(uuid::Uuid),

    #[error("驗證失敗: {0}")]
    Validation(String),

    #[error("其他錯誤: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ReplenishError>;
