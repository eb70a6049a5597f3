use alloy_primitives::{U256, address};
use criterion::{Criterion, criterion_group, criterion_main};
use ens_lifecycle_coordinator::app::{ContractRegistry, build_fields, insufficient_balance};
use ens_lifecycle_coordinator::domain::types::MAINNET_CHAIN_ID;
use ens_lifecycle_coordinator::domain::{
    GasEstimates, NetworkConfig, OperationKind, OperationRequest,
};
use std::hint::black_box;

fn bench_build_fields(c: &mut Criterion) {
    let registry = ContractRegistry::default().with_subdomain_registrar(
        MAINNET_CHAIN_ID,
        address!("0x0000000000000000000000000000000000000f00"),
    );
    let owner = address!("0x00000000000000000000000000000000000000aa");
    let estimates = GasEstimates { fast: 42.5 };
    let reverse = OperationRequest::new(
        OperationKind::SetReverseName,
        owner,
        "alice",
        NetworkConfig::mainnet(),
    );
    let purchase = OperationRequest::new(
        OperationKind::PurchaseSubdomain,
        owner,
        "alice",
        NetworkConfig::mainnet(),
    );

    c.bench_function("build_fields_set_reverse_name", |b| {
        b.iter(|| build_fields(black_box(&reverse), Some(&estimates), &registry))
    });
    c.bench_function("build_fields_purchase_subdomain", |b| {
        b.iter(|| build_fields(black_box(&purchase), Some(&estimates), &registry))
    });
}

fn bench_insufficient_balance(c: &mut Criterion) {
    let gas_price = U256::from(42_500_000_000u64);
    let gas_limit = U256::from(150_000u64);
    let value = U256::from(8_000_000_000_000_000u64);
    let balance = Some(U256::from(10u64).pow(U256::from(18u64)));

    c.bench_function("insufficient_balance", |b| {
        b.iter(|| {
            insufficient_balance(
                black_box(gas_price),
                black_box(gas_limit),
                black_box(value),
                black_box(balance),
            )
        })
    });
}

criterion_group!(benches, bench_build_fields, bench_insufficient_balance);
criterion_main!(benches);
