//! # tessera-exchange - Oracle-Priced Token Exchange Facet
//!
//! Swaps between tokens in the shared ledger at admin-set oracle prices,
//! against reserves held by the dispatcher itself. The output amount is
//! `amount_in * price_in / price_out` with the division truncating toward
//! zero.

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use tessera_core::dispatch::{CallContext, Runtime};
use tessera_core::events::DiamondEvent;
use tessera_core::module::ModuleCode;
use tessera_types::codec::{decode_call, encode_return};
use tessera_types::module::{FacetCut, ModuleError};
use tessera_types::values::{Address, Selector, U256};
use tracing::debug;

// =============================================================================
// OPERATION SIGNATURES
// =============================================================================

/// Operation signature strings (selectors derive from these).
pub mod sig {
    /// Set the oracle price of one token (admin).
    pub const SET_PRICE: &str = "setPrice(address,uint256)";
    /// Query the oracle price of one token.
    pub const PRICE_OF: &str = "priceOf(address)";
    /// Swap between two priced tokens against the dispatcher's reserves.
    pub const SWAP_TOKENS: &str = "swapTokens(address,address,uint256)";
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Arguments of [`sig::SET_PRICE`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SetPriceArgs {
    /// Token to price.
    pub token: Address,
    /// Native value per unit. Zero removes the price.
    pub price: U256,
}

/// Arguments of [`sig::PRICE_OF`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PriceOfArgs {
    /// Token to query.
    pub token: Address,
}

/// Arguments of [`sig::SWAP_TOKENS`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SwapTokensArgs {
    /// Token given by the caller.
    pub token_in: Address,
    /// Token received by the caller.
    pub token_out: Address,
    /// Amount of `token_in` to swap.
    pub amount_in: U256,
}

// =============================================================================
// FACET
// =============================================================================

/// The token exchange facet.
pub struct ExchangeFacet {
    address: Address,
}

impl ExchangeFacet {
    /// Creates the facet for its deployed address.
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// The selectors this facet contributes.
    #[must_use]
    pub fn selectors() -> Vec<Selector> {
        vec![
            Selector::of(sig::SET_PRICE),
            Selector::of(sig::PRICE_OF),
            Selector::of(sig::SWAP_TOKENS),
        ]
    }

    fn price_of_token(rt: &Runtime<'_>, token: Address) -> Result<U256, ModuleError> {
        rt.storage
            .prices
            .get(&token)
            .copied()
            .filter(|p| !p.is_zero())
            .ok_or_else(|| ModuleError::Revert(format!("no price for token {token:?}")))
    }

    fn set_price(
        &self,
        rt: &mut Runtime<'_>,
        ctx: &CallContext,
        input: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        if !rt.storage.is_admin(ctx.caller) {
            return Err(ModuleError::Unauthorized(ctx.caller));
        }
        let args: SetPriceArgs = decode_call(input)?;
        if args.price.is_zero() {
            rt.storage.prices.remove(&args.token);
        } else {
            rt.storage.prices.insert(args.token, args.price);
        }
        rt.storage.emit(DiamondEvent::module("PriceSet", &args.token));
        debug!(token = ?args.token, price = %args.price, "oracle price set");
        Ok(Vec::new())
    }

    fn price_of(&self, rt: &mut Runtime<'_>, input: &[u8]) -> Result<Vec<u8>, ModuleError> {
        let args: PriceOfArgs = decode_call(input)?;
        let price = Self::price_of_token(rt, args.token)?;
        Ok(encode_return(&price))
    }

    fn swap_tokens(
        &self,
        rt: &mut Runtime<'_>,
        ctx: &CallContext,
        input: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        let args: SwapTokensArgs = decode_call(input)?;
        rt.guarded(|rt| {
            if args.token_in == args.token_out {
                return Err(ModuleError::Revert("cannot swap a token for itself".into()));
            }
            if args.amount_in.is_zero() {
                return Err(ModuleError::Revert("cannot swap zero".into()));
            }
            let price_in = Self::price_of_token(rt, args.token_in)?;
            let price_out = Self::price_of_token(rt, args.token_out)?;
            let amount_out = args
                .amount_in
                .checked_mul(price_in)
                .ok_or(ModuleError::Overflow("swap value"))?
                / price_out;
            if amount_out.is_zero() {
                return Err(ModuleError::Revert("swap output rounds to zero".into()));
            }

            let reserve_holder = rt.self_address();
            if rt.storage.token_balance(args.token_out, reserve_holder) < amount_out {
                return Err(ModuleError::Revert("insufficient liquidity".into()));
            }
            if !rt
                .storage
                .debit_token(args.token_in, ctx.caller, args.amount_in)
            {
                return Err(ModuleError::Revert("insufficient token balance".into()));
            }
            rt.storage
                .credit_token(args.token_in, reserve_holder, args.amount_in);
            let debited = rt
                .storage
                .debit_token(args.token_out, reserve_holder, amount_out);
            debug_assert!(debited);
            rt.storage
                .credit_token(args.token_out, ctx.caller, amount_out);

            rt.storage
                .emit(DiamondEvent::module("TokensSwapped", &amount_out));
            debug!(
                token_in = ?args.token_in,
                token_out = ?args.token_out,
                amount_in = %args.amount_in,
                amount_out = %amount_out,
                "tokens swapped"
            );
            Ok(encode_return(&amount_out))
        })
    }
}

impl ModuleCode for ExchangeFacet {
    fn manifest(&self) -> Result<FacetCut, ModuleError> {
        Ok(FacetCut::add(self.address, Self::selectors()))
    }

    fn call(
        &self,
        rt: &mut Runtime<'_>,
        ctx: &CallContext,
        selector: Selector,
        input: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        if selector == Selector::of(sig::SET_PRICE) {
            self.set_price(rt, ctx, input)
        } else if selector == Selector::of(sig::PRICE_OF) {
            self.price_of(rt, input)
        } else if selector == Selector::of(sig::SWAP_TOKENS) {
            self.swap_tokens(rt, ctx, input)
        } else {
            Err(ModuleError::UnknownSelector(selector))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
