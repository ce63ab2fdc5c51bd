//! 明細編輯權限表
//!
//! 權限以 (角色, 分級類別, 狀態閘門) -> 可編輯欄位 的靜態表表示，
//! 表中沒有的組合一律不可編輯。

use replenish_core::{BatchState, LineState, Tier};

use EditableField as F;

/// 編輯者
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// 供應商
    Vendor,
    /// 採購（elevated：可編輯 C 級）
    Buyer { elevated: bool },
    /// 未授權
    Unauthorized,
}

/// 可編輯欄位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditableField {
    BuyerQuantity,
    VendorQuantity,
    UnitCost,
    Discount1,
    Discount2,
    Discount3,
    Tier,
    VendorNotes,
    Continuity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Vendor,
    Buyer,
    ElevatedBuyer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TierClass {
    /// I
    Inactive,
    /// C
    Restricted,
    /// A、B
    Priority,
    /// D、E、其他標記或未分級
    Standard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StateGate {
    Open,
    /// 批次已確認：供應商不可再編輯
    VendorLocked,
    /// 明細已下單或批次已結束
    Closed,
}

/// 權限規則
#[derive(Debug, Clone, Copy)]
pub struct PermissionRule {
    role: Role,
    tier: TierClass,
    gate: StateGate,
    fields: &'static [EditableField],
}

const RECLASSIFY: &[EditableField] = &[F::Tier];
const VENDOR_STANDARD: &[EditableField] =
    &[F::UnitCost, F::Discount1, F::Discount2, F::Discount3, F::VendorNotes, F::Continuity];
const VENDOR_PRIORITY: &[EditableField] = &[
    F::VendorQuantity,
    F::UnitCost,
    F::Discount1,
    F::Discount2,
    F::Discount3,
    F::VendorNotes,
    F::Continuity,
];
const BUYER_FULL: &[EditableField] = &[
    F::BuyerQuantity,
    F::UnitCost,
    F::Discount1,
    F::Discount2,
    F::Discount3,
    F::Tier,
];

const fn rule(
    role: Role,
    tier: TierClass,
    gate: StateGate,
    fields: &'static [EditableField],
) -> PermissionRule {
    PermissionRule {
        role,
        tier,
        gate,
        fields,
    }
}

#[rustfmt::skip]
const STANDARD_RULES: &[PermissionRule] = &[
    rule(Role::Vendor,        TierClass::Priority,   StateGate::Open,         VENDOR_PRIORITY),
    rule(Role::Vendor,        TierClass::Standard,   StateGate::Open,         VENDOR_STANDARD),

    rule(Role::Buyer,         TierClass::Inactive,   StateGate::Open,         RECLASSIFY),
    rule(Role::Buyer,         TierClass::Inactive,   StateGate::VendorLocked, RECLASSIFY),
    rule(Role::Buyer,         TierClass::Restricted, StateGate::Open,         RECLASSIFY),
    rule(Role::Buyer,         TierClass::Restricted, StateGate::VendorLocked, RECLASSIFY),
    rule(Role::Buyer,         TierClass::Priority,   StateGate::Open,         BUYER_FULL),
    rule(Role::Buyer,         TierClass::Priority,   StateGate::VendorLocked, BUYER_FULL),
    rule(Role::Buyer,         TierClass::Standard,   StateGate::Open,         BUYER_FULL),
    rule(Role::Buyer,         TierClass::Standard,   StateGate::VendorLocked, BUYER_FULL),

    rule(Role::ElevatedBuyer, TierClass::Inactive,   StateGate::Open,         RECLASSIFY),
    rule(Role::ElevatedBuyer, TierClass::Inactive,   StateGate::VendorLocked, RECLASSIFY),
    rule(Role::ElevatedBuyer, TierClass::Restricted, StateGate::Open,         BUYER_FULL),
    rule(Role::ElevatedBuyer, TierClass::Restricted, StateGate::VendorLocked, BUYER_FULL),
    rule(Role::ElevatedBuyer, TierClass::Priority,   StateGate::Open,         BUYER_FULL),
    rule(Role::ElevatedBuyer, TierClass::Priority,   StateGate::VendorLocked, BUYER_FULL),
    rule(Role::ElevatedBuyer, TierClass::Standard,   StateGate::Open,         BUYER_FULL),
    rule(Role::ElevatedBuyer, TierClass::Standard,   StateGate::VendorLocked, BUYER_FULL),
];

/// 權限表
#[derive(Debug, Clone, Copy)]
pub struct PermissionMatrix {
    rules: &'static [PermissionRule],
}

impl Default for PermissionMatrix {
    fn default() -> Self {
        Self::standard()
    }
}

impl PermissionMatrix {
    /// 標準權限表
    pub fn standard() -> Self {
        Self {
            rules: STANDARD_RULES,
        }
    }

    /// 查詢可編輯欄位
    pub fn editable_fields(
        &self,
        actor: Actor,
        tier: Option<Tier>,
        batch_state: BatchState,
        line_state: LineState,
    ) -> &'static [EditableField] {
        let role = match actor {
            Actor::Vendor => Role::Vendor,
            Actor::Buyer { elevated: false } => Role::Buyer,
            Actor::Buyer { elevated: true } => Role::ElevatedBuyer,
            Actor::Unauthorized => return &[],
        };
        let tier = Self::tier_class(tier);
        let gate = Self::state_gate(batch_state, line_state);

        self.rules
            .iter()
            .find(|r| r.role == role && r.tier == tier && r.gate == gate)
            .map(|r| r.fields)
            .unwrap_or(&[])
    }

    /// 檢查單一欄位是否可編輯
    pub fn allows(
        &self,
        actor: Actor,
        tier: Option<Tier>,
        batch_state: BatchState,
        line_state: LineState,
        field: EditableField,
    ) -> bool {
        self.editable_fields(actor, tier, batch_state, line_state)
            .contains(&field)
    }

    fn tier_class(tier: Option<Tier>) -> TierClass {
        match tier {
            Some(Tier::I) => TierClass::Inactive,
            Some(Tier::C) => TierClass::Restricted,
            Some(Tier::A) | Some(Tier::B) => TierClass::Priority,
            _ => TierClass::Standard,
        }
    }

    fn state_gate(batch_state: BatchState, line_state: LineState) -> StateGate {
        if line_state.is_terminal() || batch_state.is_terminal() {
            StateGate::Closed
        } else if batch_state == BatchState::Confirmed {
            StateGate::VendorLocked
        } else {
            StateGate::Open
        }
    }
}
