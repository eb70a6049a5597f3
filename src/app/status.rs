//! Action availability and status labels derived from lifecycle and lookup state.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::app::coordinator::LifecycleState;
use crate::domain::ens::normalize_label;
use crate::domain::{RequestStatus, ResolutionRecord, ResolutionState};

/// What the user typed and what it normalizes to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubdomainInput {
    /// Trimmed, lowercased input
    pub entered: String,
    /// Normalized label, empty if the input is not a valid label
    pub label: String,
}

impl SubdomainInput {
    #[must_use]
    pub fn from_keystroke(raw: &str) -> Self {
        let entered = raw.trim().to_lowercase();
        let label = normalize_label(&entered).unwrap_or_default();
        Self { entered, label }
    }

    /// Input is non-empty and already in normal form
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.label.is_empty() && self.entered == self.label
    }
}

/// Result of the availability lookup of a subdomain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomainAvailability {
    pub lookup_complete: bool,
    pub available: bool,
    pub owned_by_self: bool,
}

impl DomainAvailability {
    /// A resolved domain without an owner is available
    #[must_use]
    pub fn from_record(record: Option<&ResolutionRecord>, account: Address) -> Self {
        let Some(data) = record
            .filter(|r| r.state == ResolutionState::Success)
            .and_then(ResolutionRecord::resolved_data)
        else {
            return Self::default();
        };
        Self {
            lookup_complete: true,
            available: data.owner_address == Address::ZERO,
            owned_by_self: data.owner_address == account,
        }
    }
}

/// Inputs for the purchase button and status label
#[derive(Debug, Clone, Copy)]
pub struct PurchaseContext<'a> {
    pub input: &'a SubdomainInput,
    pub availability: DomainAvailability,
    pub insufficient_balance: bool,
    pub lifecycle: &'a LifecycleState,
    pub gas_estimation: RequestStatus,
}

/// Whether the purchase action must be disabled
#[must_use]
pub fn purchase_disabled(ctx: &PurchaseContext<'_>) -> bool {
    !ctx.input.is_valid()
        || !ctx.availability.lookup_complete
        || !ctx.availability.available
        || ctx.insufficient_balance
        || ctx.lifecycle.is_armed()
        || ctx.gas_estimation == RequestStatus::Requested
}

/// Status label shown under the purchase action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    WaitingForConfirmation,
    WaitingForMine,
    InvalidInput,
    Available,
    InsufficientFunds,
    OwnedBySelf,
    Unavailable,
    Resolving,
    Empty,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WaitingForConfirmation => "waiting_for_confirmation",
            Self::WaitingForMine => "waiting_for_mine",
            Self::InvalidInput => "invalid_input",
            Self::Available => "available",
            Self::InsufficientFunds => "insufficient_funds",
            Self::OwnedBySelf => "owned_by_self",
            Self::Unavailable => "unavailable",
            Self::Resolving => "resolving",
            Self::Empty => "empty",
        }
    }
}

impl std::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[must_use]
pub fn purchase_status(ctx: &PurchaseContext<'_>) -> PurchaseStatus {
    if ctx.lifecycle.is_armed() {
        return if ctx.lifecycle.poll_armed {
            PurchaseStatus::WaitingForMine
        } else {
            PurchaseStatus::WaitingForConfirmation
        };
    }
    if ctx.input.entered != ctx.input.label {
        return PurchaseStatus::InvalidInput;
    }
    let availability = ctx.availability;
    if availability.lookup_complete {
        return match (availability.available, availability.owned_by_self) {
            (true, _) if ctx.insufficient_balance => PurchaseStatus::InsufficientFunds,
            (true, _) => PurchaseStatus::Available,
            (false, true) => PurchaseStatus::OwnedBySelf,
            (false, false) => PurchaseStatus::Unavailable,
        };
    }
    if ctx.input.label.is_empty() {
        PurchaseStatus::Empty
    } else {
        PurchaseStatus::Resolving
    }
}

/// Display state of the public (reverse) name editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicNameStatus {
    Editable,
    /// A set-name lifecycle is in flight
    Waiting,
    /// Not enough balance to pay for the transaction
    Hidden,
}

#[must_use]
pub fn public_name_status(lifecycle: &LifecycleState, insufficient_balance: bool) -> PublicNameStatus {
    if lifecycle.is_armed() {
        PublicNameStatus::Waiting
    } else if insufficient_balance {
        PublicNameStatus::Hidden
    } else {
        PublicNameStatus::Editable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Phase, ResolutionData};

    const ME: Address = Address::repeat_byte(0xaa);

    fn available() -> DomainAvailability {
        DomainAvailability {
            lookup_complete: true,
            available: true,
            owned_by_self: false,
        }
    }

    fn ctx<'a>(
        input: &'a SubdomainInput,
        lifecycle: &'a LifecycleState,
        availability: DomainAvailability,
    ) -> PurchaseContext<'a> {
        PurchaseContext {
            input,
            availability,
            insufficient_balance: false,
            lifecycle,
            gas_estimation: RequestStatus::Succeeded,
        }
    }

    #[test]
    fn test_subdomain_input_normalization() {
        let input = SubdomainInput::from_keystroke("  Alice ");
        assert_eq!(input.entered, "alice");
        assert!(input.is_valid());

        let input = SubdomainInput::from_keystroke("al ice");
        assert_eq!(input.label, "");
        assert!(!input.is_valid());
    }

    #[test]
    fn test_availability_from_record() {
        let open = ResolutionRecord::success(ResolutionData {
            name: "alice.ethsimple.eth".to_string(),
            owner_address: Address::ZERO,
        });
        assert_eq!(DomainAvailability::from_record(Some(&open), ME), available());

        let mine = ResolutionRecord::success(ResolutionData {
            name: "alice.ethsimple.eth".to_string(),
            owner_address: ME,
        });
        let availability = DomainAvailability::from_record(Some(&mine), ME);
        assert!(availability.owned_by_self);
        assert!(!availability.available);

        let pending = ResolutionRecord::pending();
        assert!(!DomainAvailability::from_record(Some(&pending), ME).lookup_complete);
    }

    #[test]
    fn test_purchase_enabled_only_when_everything_lines_up() {
        let input = SubdomainInput::from_keystroke("alice");
        let idle = LifecycleState::default();
        assert!(!purchase_disabled(&ctx(&input, &idle, available())));

        let mut c = ctx(&input, &idle, available());
        c.gas_estimation = RequestStatus::Requested;
        assert!(purchase_disabled(&c));

        let mut c = ctx(&input, &idle, available());
        c.insufficient_balance = true;
        assert!(purchase_disabled(&c));
        assert_eq!(purchase_status(&c), PurchaseStatus::InsufficientFunds);

        let armed = LifecycleState {
            phase: Phase::AwaitingSignature,
            ..Default::default()
        };
        assert!(purchase_disabled(&ctx(&input, &armed, available())));
    }

    #[test]
    fn test_purchase_status_labels() {
        let input = SubdomainInput::from_keystroke("alice");
        let idle = LifecycleState::default();
        assert_eq!(
            purchase_status(&ctx(&input, &idle, available())),
            PurchaseStatus::Available
        );
        assert_eq!(
            purchase_status(&ctx(&input, &idle, DomainAvailability::default())),
            PurchaseStatus::Resolving
        );

        let empty = SubdomainInput::default();
        assert_eq!(
            purchase_status(&ctx(&empty, &idle, DomainAvailability::default())),
            PurchaseStatus::Empty
        );

        let invalid = SubdomainInput::from_keystroke("al.ice");
        assert_eq!(
            purchase_status(&ctx(&invalid, &idle, DomainAvailability::default())),
            PurchaseStatus::InvalidInput
        );

        let mining = LifecycleState {
            phase: Phase::AwaitingReceipt,
            poll_armed: true,
            ..Default::default()
        };
        assert_eq!(
            purchase_status(&ctx(&input, &mining, available())),
            PurchaseStatus::WaitingForMine
        );
    }

    #[test]
    fn test_public_name_status() {
        let idle = LifecycleState::default();
        assert_eq!(public_name_status(&idle, false), PublicNameStatus::Editable);
        assert_eq!(public_name_status(&idle, true), PublicNameStatus::Hidden);

        let armed = LifecycleState {
            phase: Phase::AwaitingFields,
            ..Default::default()
        };
        assert_eq!(public_name_status(&armed, true), PublicNameStatus::Waiting);
    }
}
