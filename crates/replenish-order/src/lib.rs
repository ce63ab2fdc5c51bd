//! # Replenish Order
//!
//! 採購訂單組裝與 ERP 寫入（單一交易、序號互斥）

pub mod assembler;
pub mod erp;
pub mod memory;

// Re-export 主要類型
pub use assembler::{AssemblyError, GenerationOutcome, OrderAssembler, OrderContext};
pub use erp::{ErpError, ErpStore, ErpTable, ErpTransaction, VendorRebate};
pub use memory::{ErpTables, FailPoint, InMemoryErp, OrderKey};
