//! Gas cost estimation against an available balance.

use alloy_primitives::U256;

/// Wei per gwei
const WEI_PER_GWEI: f64 = 1_000_000_000.0;

/// Total cost of a transaction: `extra_value_wei + gas_price_wei * gas_limit`
#[must_use]
pub fn transaction_cost(gas_price_wei: U256, gas_limit: U256, extra_value_wei: U256) -> U256 {
    extra_value_wei.saturating_add(gas_price_wei.saturating_mul(gas_limit))
}

/// Returns true iff a balance is known and the transaction cost strictly exceeds it.
///
/// An unknown balance is treated permissively.
#[must_use]
pub fn insufficient_balance(
    gas_price_wei: U256,
    gas_limit: U256,
    extra_value_wei: U256,
    available_balance_wei: Option<U256>,
) -> bool {
    available_balance_wei.is_some_and(|balance| {
        transaction_cost(gas_price_wei, gas_limit, extra_value_wei) > balance
    })
}

/// Convert a (possibly fractional) gwei estimate into wei.
///
/// Returns `None` for negative or non-finite input.
#[must_use]
pub fn gwei_to_wei(gwei: f64) -> Option<U256> {
    if !gwei.is_finite() || gwei < 0.0 {
        return None;
    }
    let wei = (gwei * WEI_PER_GWEI).round();
    if wei > u128::MAX as f64 {
        return None;
    }
    Some(U256::from(wei as u128))
}
