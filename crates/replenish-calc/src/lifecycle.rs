//! 批次與明細生命週期

use replenish_core::{BatchState, LineState, ReplenishError, ReplenishmentBatch, Result};
use std::sync::Mutex;

use crate::quantity::QuantityCalculator;
use uuid::Uuid;

/// 狀態轉換後發出的通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// 已送供應商
    SentToVendor { batch_id: Uuid, lines: usize },
    /// 供應商已回覆
    VendorResponded { batch_id: Uuid, lines: usize },
    /// 批次已確認
    Confirmed { batch_id: Uuid, by_vendor: bool },
}

/// 通知錯誤
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("通知傳送失敗: {0}")]
    Delivery(String),
}

/// 通知協作者（失敗不影響狀態轉換）
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> std::result::Result<(), NotifyError>;
}

/// 不發送任何通知
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _notification: &Notification) -> std::result::Result<(), NotifyError> {
        Ok(())
    }
}

/// 記錄通知（測試用），可設定為一律失敗
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    received: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 記錄後回傳錯誤
    pub fn failing() -> Self {
        Self {
            received: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn received(&self) -> Vec<Notification> {
        self.received
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) -> std::result::Result<(), NotifyError> {
        if let Ok(mut received) = self.received.lock() {
            received.push(notification.clone());
        }
        if self.fail {
            return Err(NotifyError::Delivery("測試通道關閉".to_string()));
        }
        Ok(())
    }
}

/// 批次生命週期操作
///
/// 「已完成」只能經由產生訂單到達，這裡不提供。
pub struct BatchLifecycle<'a> {
    notifier: &'a dyn Notifier,
}

impl<'a> BatchLifecycle<'a> {
    pub fn new(notifier: &'a dyn Notifier) -> Self {
        Self { notifier }
    }

    /// 送供應商：批次 Pending -> Sent，待處理明細一併送出
    pub fn send_to_vendor(&self, batch: &mut ReplenishmentBatch) -> Result<usize> {
        batch.transition(BatchState::Sent)?;

        let mut sent = 0;
        for line in batch.lines.iter_mut().filter(|l| l.state == LineState::Pending) {
            line.state = LineState::Sent;
            sent += 1;
        }

        tracing::info!("批次 {} 已送供應商：{} 筆明細", batch.id, sent);
        self.emit(Notification::SentToVendor {
            batch_id: batch.id,
            lines: sent,
        });
        Ok(sent)
    }

    /// 供應商回覆指定明細（空清單表示所有已送出的明細）
    pub fn vendor_respond(&self, batch: &mut ReplenishmentBatch, line_ids: &[Uuid]) -> Result<usize> {
        if batch.state != BatchState::Sent {
            return Err(invalid(batch.state, "Responded"));
        }

        let targets = Self::targets(batch, line_ids, |state| state == LineState::Sent)?;
        let responded = Self::transition_lines(batch, &targets, LineState::Responded)?;
        batch.recompute_totals();

        tracing::info!("批次 {} 供應商回覆：{} 筆明細", batch.id, responded);
        self.emit(Notification::VendorResponded {
            batch_id: batch.id,
            lines: responded,
        });
        Ok(responded)
    }

    /// 核准明細
    pub fn approve_lines(&self, batch: &mut ReplenishmentBatch, line_ids: &[Uuid]) -> Result<usize> {
        Self::decide(batch, line_ids, LineState::Approved)
    }

    /// 退回明細
    pub fn reject_lines(&self, batch: &mut ReplenishmentBatch, line_ids: &[Uuid]) -> Result<usize> {
        Self::decide(batch, line_ids, LineState::Rejected)
    }

    /// 供應商確認：Sent -> Confirmed，並將供應商提案數量帶入採購覆寫
    pub fn confirm_by_vendor(&self, batch: &mut ReplenishmentBatch) -> Result<usize> {
        if batch.state != BatchState::Sent {
            return Err(invalid(batch.state, "Confirmed"));
        }
        batch.transition(BatchState::Confirmed)?;

        let vendor_code = batch.vendor.as_ref().map(|v| v.code.clone());
        let mut copied = 0;
        for line in batch.lines.iter_mut().filter(|l| {
            !l.is_ordered()
                && l.state != LineState::Rejected
                && vendor_code.as_deref().map_or(true, |code| l.vendor_code == code)
        }) {
            if line.vendor_quantity > rust_decimal::Decimal::ZERO && !line.is_inactive() {
                line.buyer_quantity = QuantityCalculator::adjust_to_pack(line.vendor_quantity, line.pack_size);
                copied += 1;
            }
        }
        batch.recompute_totals();

        tracing::info!("批次 {} 供應商確認：{} 筆採用供應商數量", batch.id, copied);
        self.emit(Notification::Confirmed {
            batch_id: batch.id,
            by_vendor: true,
        });
        Ok(copied)
    }

    /// 採購確認
    pub fn confirm_by_buyer(&self, batch: &mut ReplenishmentBatch) -> Result<()> {
        batch.transition(BatchState::Confirmed)?;

        tracing::info!("批次 {} 採購確認", batch.id);
        self.emit(Notification::Confirmed {
            batch_id: batch.id,
            by_vendor: false,
        });
        Ok(())
    }

    /// 作廢（任何非終態）
    pub fn void(&self, batch: &mut ReplenishmentBatch) -> Result<()> {
        batch.transition(BatchState::Voided)?;
        tracing::info!("批次 {} 已作廢", batch.id);
        Ok(())
    }

    fn decide(batch: &mut ReplenishmentBatch, line_ids: &[Uuid], next: LineState) -> Result<usize> {
        if batch.is_terminal() {
            return Err(invalid(batch.state, &format!("{:?}", next)));
        }

        let targets = Self::targets(batch, line_ids, |state| state.can_transition_to(next))?;
        let changed = Self::transition_lines(batch, &targets, next)?;
        batch.recompute_totals();

        tracing::debug!("批次 {}：{} 筆明細 -> {:?}", batch.id, changed, next);
        Ok(changed)
    }

    /// 解析目標明細；指定ID時必須全部存在
    fn targets(
        batch: &ReplenishmentBatch,
        line_ids: &[Uuid],
        default_filter: impl Fn(LineState) -> bool,
    ) -> Result<Vec<usize>> {
        if line_ids.is_empty() {
            return Ok(batch
                .lines
                .iter()
                .enumerate()
                .filter(|(_, l)| default_filter(l.state))
                .map(|(i, _)| i)
                .collect());
        }

        line_ids
            .iter()
            .map(|id| {
                batch
                    .lines
                    .iter()
                    .position(|l| l.id == *id)
                    .ok_or(ReplenishError::LineNotFound(*id))
            })
            .collect()
    }

    /// 全部可轉換才套用
    fn transition_lines(batch: &mut ReplenishmentBatch, targets: &[usize], next: LineState) -> Result<usize> {
        if let Some(&bad) = targets
            .iter()
            .find(|&&i| !batch.lines[i].state.can_transition_to(next))
        {
            return Err(ReplenishError::InvalidTransition {
                from: format!("{:?}", batch.lines[bad].state),
                to: format!("{:?}", next),
            });
        }

        for &i in targets {
            batch.lines[i].state = next;
        }
        Ok(targets.len())
    }

    fn emit(&self, notification: Notification) {
        if let Err(err) = self.notifier.notify(&notification) {
            tracing::warn!("通知失敗（不影響狀態）：{:?} - {}", notification, err);
        }
    }
}

fn invalid(from: BatchState, to: &str) -> ReplenishError {
    ReplenishError::InvalidTransition {
        from: format!("{:?}", from),
        to: to.to_string(),
    }
}
