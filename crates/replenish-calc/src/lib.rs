//! # Replenish Calculation Engine
//!
//! 補貨計算：分級、建議數量、折扣稅額、編輯權限與批次生命週期

pub mod classification;
pub mod discount;
pub mod editing;
pub mod extraction;
pub mod lifecycle;
pub mod permissions;
pub mod quantity;

// Re-export 主要類型
pub use classification::{
    ClassificationEngine, ClassificationInput, ClassificationLedger, ClassificationRecord,
    ClassificationRun, UpsertReport,
};
pub use discount::{composite_discount, DiscountCalculator, LineAmounts, TaxGroupKey, TaxGroupLedger};
pub use editing::{apply_edits, EditReport, FieldEdit, LineEdit, ValidationError};
pub use extraction::{BatchBuilder, ExtractionReport};
pub use lifecycle::{BatchLifecycle, NoopNotifier, Notification, Notifier, NotifyError, RecordingNotifier};
pub use permissions::{Actor, EditableField, PermissionMatrix};
pub use quantity::QuantityCalculator;

/// 計算警告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalcWarning {
    pub article_code: String,
    pub message: String,
    pub severity: WarningSeverity,
}

impl CalcWarning {
    pub fn new(article_code: String, message: String, severity: WarningSeverity) -> Self {
        Self {
            article_code,
            message,
            severity,
        }
    }

    pub fn info(article_code: String, message: String) -> Self {
        Self::new(article_code, message, WarningSeverity::Info)
    }

    pub fn warning(article_code: String, message: String) -> Self {
        Self::new(article_code, message, WarningSeverity::Warning)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Info,
    Warning,
}
