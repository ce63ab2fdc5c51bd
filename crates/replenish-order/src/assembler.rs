//! 採購訂單組裝
//!
//! 一次呼叫對應一個 ERP 交易：依倉庫分組，每組取號並寫入表頭、明細、
//! 六欄費用、彙總分錄、付款排程與在途數量。提交成功後才更新本地批次。

use chrono::{Days, NaiveDate};
use replenish_calc::{DiscountCalculator, QuantityCalculator, TaxGroupLedger};
use replenish_core::{
    BatchState, ConsolidatedEntry, ConsolidatedKind, EngineConfig, LineState, OrderHeader,
    OrderLineRecord, OrderNumbering, OrderRef, PaymentEntry, PaymentTerms, PurchaseOrder,
    ReplenishError, ReplenishmentBatch, ReplenishmentLine,
};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};

use crate::erp::{ErpError, ErpStore, ErpTransaction, VendorRebate};

/// 產生訂單的非例外結果
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// 已提交，每個倉庫一張訂單
    Generated { orders: Vec<OrderRef> },

    /// 沒有可下單的明細
    NoQualifyingLines,

    /// 供應商沒有可用的 ERP 代碼
    MissingVendorCode,

    /// 訂單序號無法取得（已回滾）
    SequenceUnavailable { series: String },
}

/// 產生訂單失敗
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("批次狀態 {0:?} 不可產生訂單")]
    InvalidState(BatchState),

    #[error("ERP 寫入失敗（倉庫 {warehouse:?}，商品 {article:?}）: {source}")]
    Erp {
        warehouse: Option<String>,
        article: Option<String>,
        #[source]
        source: ErpError,
    },

    #[error(transparent)]
    State(#[from] ReplenishError),
}

impl AssemblyError {
    fn erp(source: ErpError, warehouse: Option<&str>, article: Option<&str>) -> Self {
        AssemblyError::Erp {
            warehouse: warehouse.map(str::to_string),
            article: article.map(str::to_string),
            source,
        }
    }
}

/// 交易中止原因
enum Abort {
    Sequence(String),
    Failed(AssemblyError),
}

/// 組裝單張訂單所需的共用資料
#[derive(Debug, Clone)]
pub struct OrderContext<'a> {
    pub vendor_code: &'a str,
    pub numbering: &'a OrderNumbering,
    pub order_date: NaiveDate,
    pub visible_codes: &'a HashSet<u32>,
    pub rebates: &'a [VendorRebate],
    pub terms: &'a PaymentTerms,
}

/// 訂單組裝器
pub struct OrderAssembler {
    config: EngineConfig,
}

impl OrderAssembler {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// 下單數量（依配置的數量政策與箱規取整）
    pub fn ordered_quantity(&self, line: &ReplenishmentLine) -> Decimal {
        QuantityCalculator::order_quantity(line, self.config.quantity_policy, self.config.pack_rounding)
    }

    /// 產生採購訂單
    pub fn generate(
        &self,
        batch: &mut ReplenishmentBatch,
        erp: &dyn ErpStore,
        order_date: NaiveDate,
    ) -> Result<GenerationOutcome, AssemblyError> {
        if batch.is_terminal() {
            return Err(AssemblyError::InvalidState(batch.state));
        }

        // 倉庫 -> (明細索引, 下單數量)，倉庫與商品代碼皆排序
        let mut groups: BTreeMap<String, Vec<(usize, Decimal)>> = BTreeMap::new();
        for (index, line) in batch.lines.iter().enumerate() {
            if line.is_ordered() || line.state == LineState::Rejected {
                continue;
            }
            let quantity = self.ordered_quantity(line);
            if quantity > Decimal::ZERO {
                groups
                    .entry(line.warehouse_code.clone())
                    .or_default()
                    .push((index, quantity));
            }
        }
        if groups.is_empty() {
            tracing::info!("批次 {} 沒有可下單的明細", batch.name);
            return Ok(GenerationOutcome::NoQualifyingLines);
        }
        for entries in groups.values_mut() {
            entries.sort_by(|a, b| batch.lines[a.0].article_code.cmp(&batch.lines[b.0].article_code));
        }

        let Some(vendor_code) = batch
            .vendor
            .as_ref()
            .and_then(|v| v.usable_erp_code())
            .map(str::to_string)
        else {
            tracing::warn!("批次 {} 的供應商沒有 ERP 代碼", batch.name);
            return Ok(GenerationOutcome::MissingVendorCode);
        };

        let numbering = batch.numbering.clone().unwrap_or_else(|| {
            OrderNumbering::new(
                self.config.default_series.clone(),
                self.config.default_sub_series.clone(),
            )
        });

        let mut tx = erp.begin().map_err(|e| AssemblyError::erp(e, None, None))?;

        let orders = match self.write_orders(tx.as_mut(), batch, &groups, &vendor_code, &numbering, order_date) {
            Ok(orders) => orders,
            Err(abort) => {
                if let Err(e) = tx.rollback() {
                    tracing::warn!("ERP 回滾失敗: {}", e);
                }
                return match abort {
                    Abort::Sequence(series) => {
                        tracing::warn!("系列 {} 無法取號，批次 {} 未產生訂單", series, batch.name);
                        Ok(GenerationOutcome::SequenceUnavailable { series })
                    }
                    Abort::Failed(error) => {
                        tracing::error!("批次 {} 產生訂單失敗，已回滾: {}", batch.name, error);
                        Err(error)
                    }
                };
            }
        };

        tx.commit().map_err(|e| AssemblyError::erp(e, None, None))?;

        for entries in groups.values() {
            for (index, _) in entries {
                batch.lines[*index].transition(LineState::Ordered)?;
            }
        }
        let refs: Vec<OrderRef> = orders.iter().map(PurchaseOrder::to_ref).collect();
        batch.orders.extend(refs.iter().cloned());
        batch.transition(BatchState::Completed)?;
        batch.recompute_totals();

        tracing::info!(
            "批次 {} 已產生 {} 張訂單: {}",
            batch.name,
            refs.len(),
            refs.iter().map(|r| r.order_ref.as_str()).collect::<Vec<_>>().join(", ")
        );

        Ok(GenerationOutcome::Generated { orders: refs })
    }

    fn write_orders(
        &self,
        tx: &mut dyn ErpTransaction,
        batch: &ReplenishmentBatch,
        groups: &BTreeMap<String, Vec<(usize, Decimal)>>,
        vendor_code: &str,
        numbering: &OrderNumbering,
        order_date: NaiveDate,
    ) -> Result<Vec<PurchaseOrder>, Abort> {
        let lookup = |e: ErpError| Abort::Failed(AssemblyError::erp(e, None, None));
        let visible_codes = tx.visible_charge_codes().map_err(lookup)?;
        let rebates = tx.vendor_rebates(vendor_code).map_err(lookup)?;
        let terms = tx
            .payment_terms(vendor_code)
            .map_err(lookup)?
            .unwrap_or_else(|| self.config.default_payment_terms.clone());

        let context = OrderContext {
            vendor_code,
            numbering,
            order_date,
            visible_codes: &visible_codes,
            rebates: &rebates,
            terms: &terms,
        };

        let mut orders = Vec::with_capacity(groups.len());
        for (warehouse, entries) in groups {
            let fail = |e: ErpError, article: Option<&str>| {
                Abort::Failed(AssemblyError::erp(e, Some(warehouse.as_str()), article))
            };

            let number = match tx.next_order_number(&numbering.series) {
                Ok(number) => number,
                Err(ErpError::SequenceConflict { series }) => return Err(Abort::Sequence(series)),
                Err(e) => return Err(fail(e, None)),
            };

            let lines: Vec<(&ReplenishmentLine, Decimal)> = entries
                .iter()
                .map(|(index, quantity)| (&batch.lines[*index], *quantity))
                .collect();
            let order = self.build_order(&context, warehouse, number, &lines);

            tx.insert_header(&order.header).map_err(|e| fail(e, None))?;
            tx.insert_lines(&order.header, &order.lines).map_err(|e| fail(e, None))?;
            tx.insert_line_charges(&order.header, &order.line_charges)
                .map_err(|e| fail(e, None))?;
            tx.insert_consolidated(&order.header, &order.consolidated)
                .map_err(|e| fail(e, None))?;
            tx.insert_payment(&order.header, &order.payment)
                .map_err(|e| fail(e, None))?;
            for (line, quantity) in &lines {
                tx.add_on_order(warehouse, &line.article_code, *quantity)
                    .map_err(|e| fail(e, Some(&line.article_code)))?;
            }

            tracing::debug!(
                "訂單 {} 暫存完成（倉庫 {}，{} 筆明細，應付 {}）",
                order.header.order_ref,
                warehouse,
                order.lines.len(),
                order.header.net_total
            );
            orders.push(order);
        }

        Ok(orders)
    }

    /// 組裝單一倉庫的訂單
    pub fn build_order(
        &self,
        context: &OrderContext<'_>,
        warehouse: &str,
        number: u64,
        lines: &[(&ReplenishmentLine, Decimal)],
    ) -> PurchaseOrder {
        let catalog = &self.config.charge_slots;
        let mut ledger = TaxGroupLedger::new();
        let mut records = Vec::with_capacity(lines.len());
        let mut line_charges = Vec::with_capacity(lines.len());

        for (line_no, (line, quantity)) in (1u32..).zip(lines.iter()) {
            let amounts = DiscountCalculator::compose_line(line.unit_cost, &line.discounts, line.tax_rate, *quantity);
            let charges = DiscountCalculator::line_charges(
                line_no,
                &line.charge_rates,
                *quantity,
                catalog,
                context.visible_codes,
            );
            ledger.add_line(&amounts, &charges);

            records.push(OrderLineRecord {
                line_no,
                article_code: line.article_code.clone(),
                reference: line.reference.clone(),
                description: line.description.clone(),
                warehouse_code: warehouse.to_string(),
                quantity: amounts.quantity,
                unit_price: amounts.unit_price,
                composite_discount: amounts.composite_discount,
                discount_text: OrderLineRecord::discount_text_for(amounts.composite_discount),
                tax_type: amounts.tax_type,
                tax_rate: amounts.tax_rate,
                net_amount: amounts.net,
                tax_amount: amounts.tax,
                total_amount: amounts.total,
            });
            line_charges.push(charges);
        }

        let mut consolidated = Vec::new();
        for (key, totals) in ledger.groups() {
            for (slot, amount) in catalog.iter().zip(totals.charges.iter()) {
                if amount.is_zero() {
                    continue;
                }
                consolidated.push(ConsolidatedEntry {
                    position: 0,
                    code: slot.code,
                    sequence: slot.sequence,
                    kind: ConsolidatedKind::Charge,
                    tax_type: key.tax_type,
                    tax_rate: key.tax_rate,
                    percent: Decimal::ZERO,
                    base: totals.base,
                    amount: *amount,
                    tax_amount: DiscountCalculator::entry_tax(*amount, key.tax_rate),
                });
            }
            for rebate in context.rebates {
                let amount = DiscountCalculator::rebate_amount(rebate.percent, totals.base);
                if amount.is_zero() {
                    continue;
                }
                consolidated.push(ConsolidatedEntry {
                    position: 0,
                    code: rebate.code,
                    sequence: rebate.sequence,
                    kind: ConsolidatedKind::Rebate,
                    tax_type: key.tax_type,
                    tax_rate: key.tax_rate,
                    percent: rebate.percent,
                    base: totals.base,
                    amount,
                    tax_amount: DiscountCalculator::entry_tax(amount, key.tax_rate),
                });
            }
        }
        for (position, entry) in (1u32..).zip(consolidated.iter_mut()) {
            entry.position = position;
        }

        let gross_total = ledger.total_base();
        let charges_total: Decimal = consolidated.iter().map(|e| e.amount).sum();
        let tax_total = ledger.total_tax() + consolidated.iter().map(|e| e.tax_amount).sum::<Decimal>();
        let net_total = gross_total + charges_total + tax_total;

        let header = OrderHeader {
            series: context.numbering.series.clone(),
            number,
            sub_series: context.numbering.sub_series.clone(),
            vendor_code: context.vendor_code.to_string(),
            warehouse_code: warehouse.to_string(),
            order_ref: OrderHeader::reference_for(&context.numbering.series, number),
            order_date: context.order_date,
            gross_total,
            tax_total,
            charges_total,
            net_total,
        };

        let due_date = context
            .order_date
            .checked_add_days(Days::new(u64::from(context.terms.days)))
            .unwrap_or(context.order_date);
        let payment = PaymentEntry {
            order_ref: header.order_ref.clone(),
            method_code: context.terms.method_code.clone(),
            payment_type: context.terms.payment_type.clone(),
            due_date,
            days: context.terms.days,
            amount: net_total,
        };

        PurchaseOrder {
            header,
            lines: records,
            line_charges,
            consolidated,
            payment,
        }
    }
}
