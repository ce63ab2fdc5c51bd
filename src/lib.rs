//! # Replenish
//!
//! 補貨與採購訂單組裝引擎
//!
//! - [`replenish_core`]：批次、明細、分級、配置與訂單記錄
//! - [`replenish_calc`]：分級、建議數量、折扣稅額、編修權限與批次生命週期
//! - [`replenish_order`]：依倉庫組裝訂單並以單一交易寫入 ERP

pub use replenish_calc;
pub use replenish_core;
pub use replenish_order;

pub mod telemetry {
    //! 日誌初始化

    use tracing_subscriber::EnvFilter;

    /// 初始化 tracing（可重複呼叫，之後的呼叫不生效）
    ///
    /// 過濾條件取自 `RUST_LOG`，未設定時為 `info`。
    pub fn init() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    }
}
