//! 記憶體 ERP（測試與示範用）
//!
//! 寫入先暫存在交易內，commit 時才套用。序號鎖以系列為單位，從第一次取號
//! 持有到交易結束：同一系列的並行產生訂單串行化，不同系列互不等待。

use replenish_core::{
    ConsolidatedEntry, LineCharges, OrderHeader, OrderLineRecord, PaymentEntry, PaymentTerms,
};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

use crate::erp::{ErpError, ErpStore, ErpTable, ErpTransaction, VendorRebate};

/// 故障注入點
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Begin,
    NextNumber,
    Header,
    Lines,
    LineCharges,
    Consolidated,
    Payment,
    OnOrder,
    Commit,
}

impl FailPoint {
    fn error(self) -> ErpError {
        let write = |table| ErpError::Write {
            table,
            message: "模擬寫入失敗".to_string(),
        };
        match self {
            FailPoint::Begin | FailPoint::NextNumber => ErpError::Connection("模擬連線中斷".to_string()),
            FailPoint::Header => write(ErpTable::Header),
            FailPoint::Lines => write(ErpTable::Lines),
            FailPoint::LineCharges => write(ErpTable::LineCharges),
            FailPoint::Consolidated => write(ErpTable::Consolidated),
            FailPoint::Payment => write(ErpTable::Payment),
            FailPoint::OnOrder => write(ErpTable::OnOrder),
            FailPoint::Commit => ErpError::Commit("模擬提交失敗".to_string()),
        }
    }
}

/// 訂單鍵（系列 + 編號）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderKey {
    pub series: String,
    pub number: u64,
}

impl From<&OrderHeader> for OrderKey {
    fn from(header: &OrderHeader) -> Self {
        Self {
            series: header.series.clone(),
            number: header.number,
        }
    }
}

/// 單一系列的序號狀態
#[derive(Debug, Default)]
struct SeriesState {
    /// 已提交的最大編號
    last: u64,
    /// 是否有交易持有此系列
    held: bool,
}

/// ERP 資料表內容
#[derive(Debug, Clone, Default)]
pub struct ErpTables {
    pub headers: Vec<OrderHeader>,
    pub lines: Vec<(OrderKey, OrderLineRecord)>,
    pub line_charges: Vec<(OrderKey, LineCharges)>,
    pub consolidated: Vec<(OrderKey, ConsolidatedEntry)>,
    pub payments: Vec<(OrderKey, PaymentEntry)>,
    /// (倉庫, 商品) -> 在途數量
    pub on_order: HashMap<(String, String), Decimal>,
}

impl ErpTables {
    fn merge(&mut self, staged: ErpTables) {
        self.headers.extend(staged.headers);
        self.lines.extend(staged.lines);
        self.line_charges.extend(staged.line_charges);
        self.consolidated.extend(staged.consolidated);
        self.payments.extend(staged.payments);
        for (key, quantity) in staged.on_order {
            *self.on_order.entry(key).or_default() += quantity;
        }
    }
}

/// 記憶體 ERP
#[derive(Debug, Default)]
pub struct InMemoryErp {
    tables: Mutex<ErpTables>,
    sequences: Mutex<HashMap<String, SeriesState>>,
    series_released: Condvar,
    visible_codes: HashSet<u32>,
    rebates: HashMap<String, Vec<VendorRebate>>,
    terms: HashMap<String, PaymentTerms>,
    armed_failures: Mutex<HashMap<FailPoint, usize>>,
    blocked_series: Mutex<HashSet<String>>,
    write_calls: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl InMemoryErp {
    pub fn new() -> Self {
        Self::default()
    }

    /// 建構器模式：設置採購可見的費用代碼
    pub fn with_visible_charge_codes(mut self, codes: impl IntoIterator<Item = u32>) -> Self {
        self.visible_codes = codes.into_iter().collect();
        self
    }

    /// 建構器模式：設置供應商折讓
    pub fn with_vendor_rebates(mut self, vendor_code: impl Into<String>, rebates: Vec<VendorRebate>) -> Self {
        self.rebates.insert(vendor_code.into(), rebates);
        self
    }

    /// 建構器模式：設置供應商付款條件
    pub fn with_payment_terms(mut self, vendor_code: impl Into<String>, terms: PaymentTerms) -> Self {
        self.terms.insert(vendor_code.into(), terms);
        self
    }

    /// 建構器模式：設置系列目前的最大編號
    pub fn with_last_number(self, series: impl Into<String>, number: u64) -> Self {
        if let Ok(mut sequences) = self.sequences.lock() {
            sequences.entry(series.into()).or_default().last = number;
        }
        self
    }

    /// 在指定注入點第 n 次經過時失敗（只觸發一次）
    pub fn fail_on(&self, point: FailPoint, occurrence: usize) {
        if let Ok(mut armed) = self.armed_failures.lock() {
            armed.insert(point, occurrence.max(1));
        }
    }

    /// 該系列取號一律回報衝突
    pub fn block_series(&self, series: impl Into<String>) {
        if let Ok(mut blocked) = self.blocked_series.lock() {
            blocked.insert(series.into());
        }
    }

    /// 已提交資料的快照
    pub fn snapshot(&self) -> ErpTables {
        self.tables.lock().map(|t| t.clone()).unwrap_or_default()
    }

    pub fn headers(&self) -> Vec<OrderHeader> {
        self.snapshot().headers
    }

    pub fn on_order(&self, warehouse: &str, article: &str) -> Decimal {
        self.snapshot()
            .on_order
            .get(&(warehouse.to_string(), article.to_string()))
            .copied()
            .unwrap_or_default()
    }

    /// 系列已提交的最大編號
    pub fn last_number(&self, series: &str) -> u64 {
        self.sequences
            .lock()
            .ok()
            .and_then(|s| s.get(series).map(|state| state.last))
            .unwrap_or(0)
    }

    /// 交易內暫存的寫入次數（含之後回滾的）
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    fn trip(&self, point: FailPoint) -> Result<(), ErpError> {
        let mut armed = self.armed_failures.lock().map_err(|_| ErpError::LockPoisoned)?;
        if let Some(remaining) = armed.get_mut(&point) {
            *remaining -= 1;
            if *remaining == 0 {
                armed.remove(&point);
                return Err(point.error());
            }
        }
        Ok(())
    }

    fn is_blocked(&self, series: &str) -> Result<bool, ErpError> {
        let blocked = self.blocked_series.lock().map_err(|_| ErpError::LockPoisoned)?;
        Ok(blocked.contains(series))
    }

    /// 取得系列鎖，已被其他交易持有時等待釋放；回傳已提交的最大編號
    fn acquire_series(&self, series: &str) -> Result<u64, ErpError> {
        let mut sequences = self.sequences.lock().map_err(|_| ErpError::LockPoisoned)?;
        loop {
            let state = sequences.entry(series.to_string()).or_default();
            if !state.held {
                state.held = true;
                return Ok(state.last);
            }
            sequences = self
                .series_released
                .wait(sequences)
                .map_err(|_| ErpError::LockPoisoned)?;
        }
    }
}

impl ErpStore for InMemoryErp {
    fn begin(&self) -> Result<Box<dyn ErpTransaction + '_>, ErpError> {
        self.trip(FailPoint::Begin)?;
        Ok(Box::new(InMemoryTransaction {
            erp: self,
            allocated: HashMap::new(),
            staged: ErpTables::default(),
        }))
    }
}

struct InMemoryTransaction<'a> {
    erp: &'a InMemoryErp,
    /// 已持有系列鎖的系列 -> 交易內最後配出的編號
    allocated: HashMap<String, u64>,
    staged: ErpTables,
}

impl InMemoryTransaction<'_> {
    fn stage(&mut self, point: FailPoint) -> Result<(), ErpError> {
        self.erp.trip(point)?;
        self.erp.write_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// 釋放持有的系列鎖；publish 為 true 時寫回配出的編號
    fn release(&mut self, publish: bool) -> Result<(), ErpError> {
        if self.allocated.is_empty() {
            return Ok(());
        }
        let mut sequences = self.erp.sequences.lock().map_err(|_| ErpError::LockPoisoned)?;
        for (series, number) in self.allocated.drain() {
            if let Some(state) = sequences.get_mut(&series) {
                if publish {
                    state.last = number;
                }
                state.held = false;
            }
        }
        drop(sequences);
        self.erp.series_released.notify_all();
        Ok(())
    }
}

impl Drop for InMemoryTransaction<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.release(false) {
            tracing::warn!("釋放序號鎖失敗: {}", e);
        }
    }
}

impl ErpTransaction for InMemoryTransaction<'_> {
    fn next_order_number(&mut self, series: &str) -> Result<u64, ErpError> {
        if self.erp.is_blocked(series)? {
            return Err(ErpError::SequenceConflict {
                series: series.to_string(),
            });
        }
        self.erp.trip(FailPoint::NextNumber)?;

        let current = match self.allocated.get(series) {
            Some(number) => *number,
            None => self.erp.acquire_series(series)?,
        };
        let next = current + 1;
        self.allocated.insert(series.to_string(), next);
        Ok(next)
    }

    fn visible_charge_codes(&mut self) -> Result<HashSet<u32>, ErpError> {
        Ok(self.erp.visible_codes.clone())
    }

    fn vendor_rebates(&mut self, vendor_code: &str) -> Result<Vec<VendorRebate>, ErpError> {
        Ok(self.erp.rebates.get(vendor_code).cloned().unwrap_or_default())
    }

    fn payment_terms(&mut self, vendor_code: &str) -> Result<Option<PaymentTerms>, ErpError> {
        Ok(self.erp.terms.get(vendor_code).cloned())
    }

    fn insert_header(&mut self, header: &OrderHeader) -> Result<(), ErpError> {
        self.stage(FailPoint::Header)?;
        self.staged.headers.push(header.clone());
        Ok(())
    }

    fn insert_lines(&mut self, header: &OrderHeader, lines: &[OrderLineRecord]) -> Result<(), ErpError> {
        self.stage(FailPoint::Lines)?;
        let key = OrderKey::from(header);
        self.staged
            .lines
            .extend(lines.iter().map(|l| (key.clone(), l.clone())));
        Ok(())
    }

    fn insert_line_charges(&mut self, header: &OrderHeader, charges: &[LineCharges]) -> Result<(), ErpError> {
        self.stage(FailPoint::LineCharges)?;
        let key = OrderKey::from(header);
        self.staged
            .line_charges
            .extend(charges.iter().map(|c| (key.clone(), c.clone())));
        Ok(())
    }

    fn insert_consolidated(
        &mut self,
        header: &OrderHeader,
        entries: &[ConsolidatedEntry],
    ) -> Result<(), ErpError> {
        self.stage(FailPoint::Consolidated)?;
        let key = OrderKey::from(header);
        self.staged
            .consolidated
            .extend(entries.iter().map(|e| (key.clone(), e.clone())));
        Ok(())
    }

    fn insert_payment(&mut self, header: &OrderHeader, payment: &PaymentEntry) -> Result<(), ErpError> {
        self.stage(FailPoint::Payment)?;
        self.staged
            .payments
            .push((OrderKey::from(header), payment.clone()));
        Ok(())
    }

    fn add_on_order(&mut self, warehouse: &str, article: &str, quantity: Decimal) -> Result<(), ErpError> {
        self.stage(FailPoint::OnOrder)?;
        *self
            .staged
            .on_order
            .entry((warehouse.to_string(), article.to_string()))
            .or_default() += quantity;
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> Result<(), ErpError> {
        self.erp.trip(FailPoint::Commit)?;

        let staged = std::mem::take(&mut self.staged);
        {
            let mut tables = self.erp.tables.lock().map_err(|_| ErpError::LockPoisoned)?;
            tables.merge(staged);
        }

        self.release(true)?;

        self.erp.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), ErpError> {
        self.erp.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn header(series: &str, number: u64) -> OrderHeader {
        OrderHeader {
            series: series.to_string(),
            number,
            sub_series: "B".to_string(),
            vendor_code: "881".to_string(),
            warehouse_code: "50".to_string(),
            order_ref: OrderHeader::reference_for(series, number),
            order_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            gross_total: Decimal::ZERO,
            tax_total: Decimal::ZERO,
            charges_total: Decimal::ZERO,
            net_total: Decimal::ZERO,
        }
    }

    #[test]
    fn test_numbers_continue_from_last() {
        let erp = InMemoryErp::new().with_last_number("13CP", 256034);

        let mut tx = erp.begin().unwrap();
        assert_eq!(tx.next_order_number("13CP").unwrap(), 256035);
        assert_eq!(tx.next_order_number("13CP").unwrap(), 256036);
        assert_eq!(tx.next_order_number("OTRO").unwrap(), 1);
        tx.commit().unwrap();

        assert_eq!(erp.last_number("13CP"), 256036);
        assert_eq!(erp.last_number("OTRO"), 1);
    }

    #[test]
    fn test_rollback_discards_writes_and_numbers() {
        let erp = InMemoryErp::new();

        let mut tx = erp.begin().unwrap();
        let number = tx.next_order_number("13CP").unwrap();
        tx.insert_header(&header("13CP", number)).unwrap();
        tx.add_on_order("50", "1001", Decimal::from(5)).unwrap();
        tx.rollback().unwrap();

        assert!(erp.headers().is_empty());
        assert_eq!(erp.on_order("50", "1001"), Decimal::ZERO);
        assert_eq!(erp.last_number("13CP"), 0);
        assert_eq!(erp.rollbacks(), 1);

        // 鎖已釋放，可再取號
        let mut tx = erp.begin().unwrap();
        assert_eq!(tx.next_order_number("13CP").unwrap(), 1);
    }

    #[test]
    fn test_different_series_do_not_wait() {
        let erp = InMemoryErp::new().with_last_number("OTRO", 9);

        let mut first = erp.begin().unwrap();
        let mut second = erp.begin().unwrap();
        assert_eq!(first.next_order_number("13CP").unwrap(), 1);
        assert_eq!(second.next_order_number("OTRO").unwrap(), 10);
        second.commit().unwrap();
        first.commit().unwrap();

        assert_eq!(erp.last_number("13CP"), 1);
        assert_eq!(erp.last_number("OTRO"), 10);
    }

    #[test]
    fn test_same_series_waits_for_holder() {
        let erp = InMemoryErp::new();

        let mut holder = erp.begin().unwrap();
        assert_eq!(holder.next_order_number("13CP").unwrap(), 1);

        let waiter = std::thread::scope(|scope| {
            let handle = scope.spawn(|| {
                let mut tx = erp.begin().unwrap();
                let number = tx.next_order_number("13CP").unwrap();
                tx.commit().unwrap();
                number
            });
            std::thread::sleep(std::time::Duration::from_millis(20));
            holder.commit().unwrap();
            handle.join().unwrap()
        });

        assert_eq!(waiter, 2);
        assert_eq!(erp.last_number("13CP"), 2);
    }

    #[test]
    fn test_dropped_transaction_releases_series() {
        let erp = InMemoryErp::new();
        {
            let mut tx = erp.begin().unwrap();
            tx.next_order_number("13CP").unwrap();
        }

        let mut tx = erp.begin().unwrap();
        assert_eq!(tx.next_order_number("13CP").unwrap(), 1);
    }

    #[test]
    fn test_fail_on_nth_occurrence() {
        let erp = InMemoryErp::new();
        erp.fail_on(FailPoint::OnOrder, 2);

        let mut tx = erp.begin().unwrap();
        assert!(tx.add_on_order("50", "1", Decimal::ONE).is_ok());
        let err = tx.add_on_order("50", "2", Decimal::ONE).unwrap_err();
        assert_eq!(
            err,
            ErpError::Write {
                table: ErpTable::OnOrder,
                message: "模擬寫入失敗".to_string()
            }
        );
        // 只觸發一次
        assert!(tx.add_on_order("50", "3", Decimal::ONE).is_ok());
    }

    #[test]
    fn test_blocked_series() {
        let erp = InMemoryErp::new();
        erp.block_series("13CP");

        let mut tx = erp.begin().unwrap();
        assert!(matches!(
            tx.next_order_number("13CP"),
            Err(ErpError::SequenceConflict { .. })
        ));
    }

    #[test]
    fn test_commit_applies_on_order_additively() {
        let erp = InMemoryErp::new();
        for _ in 0..2 {
            let mut tx = erp.begin().unwrap();
            tx.add_on_order("50", "1001", Decimal::from(6)).unwrap();
            tx.commit().unwrap();
        }

        assert_eq!(erp.on_order("50", "1001"), Decimal::from(12));
        assert_eq!(erp.commits(), 2);
        assert_eq!(erp.write_calls(), 2);
    }
}
