//! Operation definitions plugged into the generic lifecycle coordinator.

use std::sync::Arc;

use crate::app::builder::{ContractRegistry, build_fields};
use crate::domain::ens::normalize_label;
use crate::domain::{
    AppError, BuilderError, GasEstimates, OperationKind, OperationRequest, ResolutionData,
    ResolutionTarget, TransactionFields,
};

/// Everything the coordinator needs to know about one kind of operation
pub trait OperationDefinition: Send + Sync {
    fn kind(&self) -> OperationKind;

    /// Whether the operation can be built on the request's network
    fn is_supported(&self, request: &OperationRequest) -> bool;

    /// Compute the expected transaction fields
    fn build_fields(
        &self,
        request: &OperationRequest,
        estimates: Option<&GasEstimates>,
    ) -> Result<TransactionFields, AppError>;

    /// Message for the success notification once the receipt is confirmed
    fn confirmed_message(&self, request: &OperationRequest) -> String;

    /// What the resolver should report once the write took effect
    fn resolution_target(&self, request: &OperationRequest) -> ResolutionTarget;
}

/// Set the reverse-resolution name of an address
#[derive(Debug, Clone)]
pub struct SetReverseName {
    registry: Arc<ContractRegistry>,
}

impl SetReverseName {
    #[must_use]
    pub fn new(registry: Arc<ContractRegistry>) -> Self {
        Self { registry }
    }
}

impl OperationDefinition for SetReverseName {
    fn kind(&self) -> OperationKind {
        OperationKind::SetReverseName
    }

    fn is_supported(&self, request: &OperationRequest) -> bool {
        self.registry.supports(self.kind(), &request.network)
    }

    fn build_fields(
        &self,
        request: &OperationRequest,
        estimates: Option<&GasEstimates>,
    ) -> Result<TransactionFields, AppError> {
        ensure_kind(self.kind(), request)?;
        build_fields(request, estimates, &self.registry)
    }

    fn confirmed_message(&self, request: &OperationRequest) -> String {
        format!(
            "Your public name has been set to {}",
            request.payload_name
        )
    }

    fn resolution_target(&self, request: &OperationRequest) -> ResolutionTarget {
        ResolutionTarget {
            key: request.target_address.to_checksum(None),
            expected: ResolutionData {
                name: request.payload_name.clone(),
                owner_address: request.target_address,
            },
        }
    }
}

/// Purchase a subdomain of the registrar's parent domain
#[derive(Debug, Clone)]
pub struct PurchaseSubdomain {
    registry: Arc<ContractRegistry>,
}

impl PurchaseSubdomain {
    #[must_use]
    pub fn new(registry: Arc<ContractRegistry>) -> Self {
        Self { registry }
    }

    fn domain(&self, request: &OperationRequest) -> String {
        let label =
            normalize_label(&request.payload_name).unwrap_or_else(|| request.payload_name.clone());
        self.registry.full_domain(&label)
    }
}

impl OperationDefinition for PurchaseSubdomain {
    fn kind(&self) -> OperationKind {
        OperationKind::PurchaseSubdomain
    }

    fn is_supported(&self, request: &OperationRequest) -> bool {
        self.registry.supports(self.kind(), &request.network)
    }

    fn build_fields(
        &self,
        request: &OperationRequest,
        estimates: Option<&GasEstimates>,
    ) -> Result<TransactionFields, AppError> {
        ensure_kind(self.kind(), request)?;
        build_fields(request, estimates, &self.registry)
    }

    fn confirmed_message(&self, request: &OperationRequest) -> String {
        format!("{} has been registered to your address", self.domain(request))
    }

    fn resolution_target(&self, request: &OperationRequest) -> ResolutionTarget {
        let domain = self.domain(request);
        ResolutionTarget {
            key: domain.clone(),
            expected: ResolutionData {
                name: domain,
                owner_address: request.target_address,
            },
        }
    }
}

/// Definition for `kind` backed by `registry`
#[must_use]
pub fn definition_for(
    kind: OperationKind,
    registry: Arc<ContractRegistry>,
) -> Arc<dyn OperationDefinition> {
    match kind {
        OperationKind::SetReverseName => Arc::new(SetReverseName::new(registry)),
        OperationKind::PurchaseSubdomain => Arc::new(PurchaseSubdomain::new(registry)),
    }
}

fn ensure_kind(expected: OperationKind, request: &OperationRequest) -> Result<(), AppError> {
    if request.kind != expected {
        return Err(BuilderError::KindMismatch {
            expected: expected.to_string(),
            actual: request.kind.to_string(),
        }
        .into());
    }
    Ok(())
}
