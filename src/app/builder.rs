//! Transaction field builder.
//!
//! Computes the five canonical transaction fields for an operation from its
//! parameters, the per-network contract registry and the latest gas estimates.
//! Pure apart from reading those inputs.

use alloy_primitives::{Address, B256, Bytes, U256, address};
use alloy_sol_types::{SolCall, sol};
use std::collections::HashMap;
use std::env;
use tracing::debug;

use crate::app::gas::gwei_to_wei;
use crate::domain::ens::{labelhash, namehash, normalize_label};
use crate::domain::{
    AppError, BuilderError, ConfigError, GasEstimates, NetworkConfig, OperationKind,
    OperationRequest, TransactionFields,
};
use crate::domain::types::{MAINNET_CHAIN_ID, ROPSTEN_CHAIN_ID};

sol! {
    function setName(string name) external returns (bytes32);

    function purchaseSubdomain(
        bytes32 _node,
        bytes32 _label,
        bytes32 _newNode,
        address _resolver,
        address _owner,
        address _resolvedAddress,
        bytes32 _contentHash
    ) external payable;
}

/// ENS reverse registrar on mainnet
pub const MAINNET_REVERSE_REGISTRAR: Address =
    address!("0x9062C0A6Dbd6108336BcBe4593a3D1cE05512069");

/// ENS public resolver on mainnet
pub const MAINNET_PUBLIC_RESOLVER: Address =
    address!("0x5FfC014343cd971B7eb70732021E26C35B744cc4");

/// ENS public resolver on Ropsten
pub const ROPSTEN_PUBLIC_RESOLVER: Address =
    address!("0x12299799a50340FB860D276805E78550cBaD3De3");

/// Gas limit of a reverse registrar `setName` call
pub const SET_NAME_GAS_LIMIT: u64 = 105_875;

/// Gas limit of a registrar `purchaseSubdomain` call
pub const PURCHASE_SUBDOMAIN_GAS_LIMIT: u64 = 150_000;

/// Gas price used when no network estimate is available (gwei)
pub const FALLBACK_GAS_PRICE_GWEI: f64 = 20.0;

/// Default subdomain price: 0.008 ETH
pub const DEFAULT_SUBDOMAIN_PRICE_WEI: u64 = 8_000_000_000_000_000;

/// Default parent domain under which subdomains are sold
pub const DEFAULT_PARENT_DOMAIN: &str = "ethsimple.eth";

/// Per-network contract addresses and protocol constants
#[derive(Debug, Clone)]
pub struct ContractRegistry {
    /// Reverse registrar by chain ID
    pub reverse_registrars: HashMap<u64, Address>,
    /// Subdomain registrar by chain ID
    pub subdomain_registrars: HashMap<u64, Address>,
    /// Public resolver by chain ID
    pub public_resolvers: HashMap<u64, Address>,
    pub parent_domain: String,
    pub subdomain_price_wei: U256,
    pub set_name_gas_limit: U256,
    pub purchase_subdomain_gas_limit: U256,
    pub fallback_gas_price_gwei: f64,
}

impl Default for ContractRegistry {
    fn default() -> Self {
        Self {
            reverse_registrars: HashMap::from([(MAINNET_CHAIN_ID, MAINNET_REVERSE_REGISTRAR)]),
            // Subdomain registrar deployments are configuration, see `from_env`.
            subdomain_registrars: HashMap::new(),
            public_resolvers: HashMap::from([
                (MAINNET_CHAIN_ID, MAINNET_PUBLIC_RESOLVER),
                (ROPSTEN_CHAIN_ID, ROPSTEN_PUBLIC_RESOLVER),
            ]),
            parent_domain: DEFAULT_PARENT_DOMAIN.to_string(),
            subdomain_price_wei: U256::from(DEFAULT_SUBDOMAIN_PRICE_WEI),
            set_name_gas_limit: U256::from(SET_NAME_GAS_LIMIT),
            purchase_subdomain_gas_limit: U256::from(PURCHASE_SUBDOMAIN_GAS_LIMIT),
            fallback_gas_price_gwei: FALLBACK_GAS_PRICE_GWEI,
        }
    }
}

impl ContractRegistry {
    /// Load registry overrides from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut registry = Self::default();

        if let Some(addr) = env_address("ENS_REVERSE_REGISTRAR_MAINNET")? {
            registry.reverse_registrars.insert(MAINNET_CHAIN_ID, addr);
        }
        if let Some(addr) = env_address("SUBDOMAIN_REGISTRAR_MAINNET")? {
            registry.subdomain_registrars.insert(MAINNET_CHAIN_ID, addr);
        }
        if let Some(addr) = env_address("SUBDOMAIN_REGISTRAR_ROPSTEN")? {
            registry.subdomain_registrars.insert(ROPSTEN_CHAIN_ID, addr);
        }
        if let Ok(domain) = env::var("SUBDOMAIN_PARENT_DOMAIN")
            && !domain.is_empty()
        {
            registry.parent_domain = domain;
        }
        if let Some(price) = env::var("SUBDOMAIN_PRICE_WEI")
            .ok()
            .and_then(|v| v.parse::<U256>().ok())
        {
            registry.subdomain_price_wei = price;
        }
        if let Some(limit) = env::var("PURCHASE_SUBDOMAIN_GAS_LIMIT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            registry.purchase_subdomain_gas_limit = U256::from(limit);
        }

        Ok(registry)
    }

    /// Register a subdomain registrar deployment (builder pattern)
    #[must_use]
    pub fn with_subdomain_registrar(mut self, chain_id: u64, registrar: Address) -> Self {
        self.subdomain_registrars.insert(chain_id, registrar);
        self
    }

    /// Fully qualified domain for a subdomain label
    #[must_use]
    pub fn full_domain(&self, label: &str) -> String {
        format!("{}.{}", label, self.parent_domain)
    }

    /// Destination contract for an operation on a network
    pub fn destination(
        &self,
        kind: OperationKind,
        network: &NetworkConfig,
    ) -> Result<Address, ConfigError> {
        let registry = match kind {
            OperationKind::SetReverseName => &self.reverse_registrars,
            OperationKind::PurchaseSubdomain => &self.subdomain_registrars,
        };
        registry
            .get(&network.chain_id)
            .copied()
            .ok_or_else(|| unsupported(kind, network))
    }

    /// Whether the operation can be built on this network
    #[must_use]
    pub fn supports(&self, kind: OperationKind, network: &NetworkConfig) -> bool {
        let destination = self.destination(kind, network).is_ok();
        match kind {
            OperationKind::SetReverseName => destination,
            OperationKind::PurchaseSubdomain => {
                destination && self.public_resolvers.contains_key(&network.chain_id)
            }
        }
    }

    /// Gas limit constant of an operation
    #[must_use]
    pub fn gas_limit(&self, kind: OperationKind) -> U256 {
        match kind {
            OperationKind::SetReverseName => self.set_name_gas_limit,
            OperationKind::PurchaseSubdomain => self.purchase_subdomain_gas_limit,
        }
    }

    /// Value sent with an operation
    #[must_use]
    pub fn value(&self, kind: OperationKind) -> U256 {
        match kind {
            OperationKind::SetReverseName => U256::ZERO,
            OperationKind::PurchaseSubdomain => self.subdomain_price_wei,
        }
    }

    /// Fast network estimate if available, static fallback otherwise
    #[must_use]
    pub fn gas_price(&self, estimates: Option<&GasEstimates>) -> U256 {
        estimates
            .and_then(|e| gwei_to_wei(e.fast))
            .or_else(|| gwei_to_wei(self.fallback_gas_price_gwei))
            .unwrap_or_default()
    }
}

/// Compute the transaction fields for `request`.
pub fn build_fields(
    request: &OperationRequest,
    estimates: Option<&GasEstimates>,
    registry: &ContractRegistry,
) -> Result<TransactionFields, AppError> {
    let to = registry.destination(request.kind, &request.network)?;
    let data = match request.kind {
        OperationKind::SetReverseName => set_name_data(&request.payload_name),
        OperationKind::PurchaseSubdomain => purchase_subdomain_data(request, registry)?,
    };

    let fields = TransactionFields {
        to,
        value: registry.value(request.kind),
        data,
        gas_price: registry.gas_price(estimates),
        gas_limit: registry.gas_limit(request.kind),
    };
    debug!(
        kind = %request.kind,
        to = %fields.to,
        gas_price = %fields.gas_price,
        "Built transaction fields"
    );
    Ok(fields)
}

fn set_name_data(name: &str) -> Bytes {
    setNameCall {
        name: name.to_string(),
    }
    .abi_encode()
    .into()
}

fn purchase_subdomain_data(
    request: &OperationRequest,
    registry: &ContractRegistry,
) -> Result<Bytes, AppError> {
    let label = normalize_label(&request.payload_name)
        .ok_or_else(|| BuilderError::InvalidLabel(request.payload_name.clone()))?;
    let resolver = registry
        .public_resolvers
        .get(&request.network.chain_id)
        .copied()
        .ok_or_else(|| unsupported(request.kind, &request.network))?;

    let call = purchaseSubdomainCall {
        _node: namehash(&registry.parent_domain),
        _label: labelhash(&label),
        _newNode: namehash(&registry.full_domain(&label)),
        _resolver: resolver,
        _owner: request.target_address,
        _resolvedAddress: request.target_address,
        _contentHash: B256::ZERO,
    };
    Ok(call.abi_encode().into())
}

fn unsupported(kind: OperationKind, network: &NetworkConfig) -> ConfigError {
    ConfigError::UnsupportedNetwork {
        operation: kind.to_string(),
        network: network.id.clone(),
    }
}

fn env_address(key: &str) -> Result<Option<Address>, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.is_empty() => {
            raw.parse::<Address>()
                .map(Some)
                .map_err(|e| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: e.to_string(),
                })
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: Address = address!("0x00000000000000000000000000000000000000aa");
    const REGISTRAR: Address = address!("0x00000000000000000000000000000000000000bb");

    fn reverse_request(network: NetworkConfig) -> OperationRequest {
        OperationRequest::new(OperationKind::SetReverseName, TARGET, "alice", network)
    }

    #[test]
    fn test_set_name_fields_on_mainnet() {
        let registry = ContractRegistry::default();
        let fields = build_fields(&reverse_request(NetworkConfig::mainnet()), None, &registry)
            .unwrap();

        assert_eq!(fields.to, MAINNET_REVERSE_REGISTRAR);
        assert_eq!(fields.value, U256::ZERO);
        assert_eq!(fields.gas_limit, U256::from(SET_NAME_GAS_LIMIT));
        assert_eq!(fields.gas_price, U256::from(20_000_000_000u64));
        assert_eq!(&fields.data[..4], setNameCall::SELECTOR.as_slice());
        let decoded = setNameCall::abi_decode(&fields.data).unwrap();
        assert_eq!(decoded.name, "alice");
    }

    #[test]
    fn test_set_name_unsupported_on_testnet() {
        let registry = ContractRegistry::default();
        let err = build_fields(&reverse_request(NetworkConfig::ropsten()), None, &registry)
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Config(ConfigError::UnsupportedNetwork { .. })
        ));
    }

    #[test]
    fn test_gas_price_prefers_fast_estimate() {
        let registry = ContractRegistry::default();
        let estimates = GasEstimates { fast: 42.5 };
        let fields = build_fields(
            &reverse_request(NetworkConfig::mainnet()),
            Some(&estimates),
            &registry,
        )
        .unwrap();
        assert_eq!(fields.gas_price, U256::from(42_500_000_000u64));
    }

    #[test]
    fn test_purchase_subdomain_fields() {
        let registry = ContractRegistry::default()
            .with_subdomain_registrar(ROPSTEN_CHAIN_ID, REGISTRAR);
        let request = OperationRequest::new(
            OperationKind::PurchaseSubdomain,
            TARGET,
            "alice",
            NetworkConfig::ropsten(),
        );
        let fields = build_fields(&request, None, &registry).unwrap();

        assert_eq!(fields.to, REGISTRAR);
        assert_eq!(fields.value, U256::from(DEFAULT_SUBDOMAIN_PRICE_WEI));
        assert_eq!(fields.gas_limit, U256::from(PURCHASE_SUBDOMAIN_GAS_LIMIT));

        let decoded = purchaseSubdomainCall::abi_decode(&fields.data).unwrap();
        assert_eq!(decoded._node, namehash("ethsimple.eth"));
        assert_eq!(decoded._label, labelhash("alice"));
        assert_eq!(decoded._newNode, namehash("alice.ethsimple.eth"));
        assert_eq!(decoded._resolver, ROPSTEN_PUBLIC_RESOLVER);
        assert_eq!(decoded._owner, TARGET);
        assert_eq!(decoded._resolvedAddress, TARGET);
        assert_eq!(decoded._contentHash, B256::ZERO);
    }

    #[test]
    fn test_purchase_subdomain_requires_registrar_deployment() {
        let registry = ContractRegistry::default();
        let request = OperationRequest::new(
            OperationKind::PurchaseSubdomain,
            TARGET,
            "alice",
            NetworkConfig::mainnet(),
        );
        assert!(!registry.supports(OperationKind::PurchaseSubdomain, &NetworkConfig::mainnet()));
        assert!(build_fields(&request, None, &registry).is_err());
    }

    #[test]
    fn test_purchase_subdomain_rejects_invalid_label() {
        let registry = ContractRegistry::default()
            .with_subdomain_registrar(MAINNET_CHAIN_ID, REGISTRAR);
        let request = OperationRequest::new(
            OperationKind::PurchaseSubdomain,
            TARGET,
            "not valid!",
            NetworkConfig::mainnet(),
        );
        let err = build_fields(&request, None, &registry).unwrap_err();
        assert!(matches!(err, AppError::Builder(BuilderError::InvalidLabel(_))));
    }

    #[test]
    fn test_builder_is_deterministic() {
        let registry = ContractRegistry::default();
        let request = reverse_request(NetworkConfig::mainnet());
        let a = build_fields(&request, None, &registry).unwrap();
        let b = build_fields(&request, None, &registry).unwrap();
        assert_eq!(a, b);
    }
}
