//! # tessera-market - Escrowed Marketplace Facet
//!
//! Sells asset units for native value. Listing escrows the units: the
//! seller's holdings are debited at listing time, so a listed amount can
//! never be double-spent; cancel re-credits, purchase delivers to the
//! buyer. Sale proceeds accrue to the seller's native-value credit in
//! shared storage.

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use tessera_core::dispatch::{CallContext, Runtime};
use tessera_core::events::DiamondEvent;
use tessera_core::module::ModuleCode;
use tessera_core::storage::Listing;
use tessera_types::codec::{decode_call, encode_return};
use tessera_types::module::{FacetCut, ModuleError};
use tessera_types::values::{Address, Selector, U256};
use tracing::debug;

// =============================================================================
// OPERATION SIGNATURES
// =============================================================================

/// Operation signature strings (selectors derive from these).
pub mod sig {
    /// Escrow asset units into a new listing.
    pub const LIST_ASSET: &str = "listAsset(uint256,uint256,uint256)";
    /// Buy out a listing (payable).
    pub const BUY_LISTING: &str = "buyListing(uint256)";
    /// Cancel a listing and release its escrow.
    pub const CANCEL_LISTING: &str = "cancelListing(uint256)";
    /// Query one listing.
    pub const LISTING: &str = "listing(uint256)";
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Arguments of [`sig::LIST_ASSET`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ListAssetArgs {
    /// Asset to sell.
    pub asset_id: u64,
    /// Units to escrow.
    pub amount: U256,
    /// Price per unit in native value.
    pub price_per_unit: U256,
}

/// Single-listing argument (buy, cancel, query).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ListingArgs {
    /// Listing id.
    pub listing_id: u64,
}

// =============================================================================
// FACET
// =============================================================================

/// The marketplace facet.
pub struct MarketFacet {
    address: Address,
}

impl MarketFacet {
    /// Creates the facet for its deployed address.
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// The selectors this facet contributes.
    #[must_use]
    pub fn selectors() -> Vec<Selector> {
        vec![
            Selector::of(sig::LIST_ASSET),
            Selector::of(sig::BUY_LISTING),
            Selector::of(sig::CANCEL_LISTING),
            Selector::of(sig::LISTING),
        ]
    }

    fn list_asset(
        &self,
        rt: &mut Runtime<'_>,
        ctx: &CallContext,
        input: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        let args: ListAssetArgs = decode_call(input)?;
        rt.guarded(|rt| {
            if args.amount.is_zero() {
                return Err(ModuleError::Revert("cannot list zero units".into()));
            }
            if !rt.storage.assets.contains_key(&args.asset_id) {
                return Err(ModuleError::Revert(format!(
                    "unknown asset {}",
                    args.asset_id
                )));
            }
            if !rt.storage.is_compliant(ctx.caller) {
                return Err(ModuleError::Unauthorized(ctx.caller));
            }

            // Escrow: debit the seller up front.
            let balance = rt.storage.holding(args.asset_id, ctx.caller);
            if balance < args.amount {
                return Err(ModuleError::Revert("insufficient asset balance".into()));
            }
            let key = (args.asset_id, ctx.caller);
            let remaining = balance - args.amount;
            if remaining.is_zero() {
                rt.storage.holdings.remove(&key);
            } else {
                rt.storage.holdings.insert(key, remaining);
            }

            let id = rt.storage.next_listing_id;
            rt.storage.next_listing_id += 1;
            rt.storage.listings.insert(
                id,
                Listing {
                    id,
                    asset_id: args.asset_id,
                    seller: ctx.caller,
                    amount: args.amount,
                    price_per_unit: args.price_per_unit,
                },
            );
            rt.storage.emit(DiamondEvent::module("AssetListed", &id));
            debug!(listing_id = id, asset_id = args.asset_id, seller = ?ctx.caller, "asset listed");
            Ok(encode_return(&id))
        })
    }

    fn buy_listing(
        &self,
        rt: &mut Runtime<'_>,
        ctx: &CallContext,
        input: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        let args: ListingArgs = decode_call(input)?;
        rt.guarded(|rt| {
            if !rt.storage.is_compliant(ctx.caller) {
                return Err(ModuleError::Unauthorized(ctx.caller));
            }
            let listing = rt
                .storage
                .listings
                .remove(&args.listing_id)
                .ok_or_else(|| {
                    ModuleError::Revert(format!("unknown listing {}", args.listing_id))
                })?;
            if listing.seller == ctx.caller {
                return Err(ModuleError::Revert("seller cannot buy own listing".into()));
            }

            let cost = listing
                .amount
                .checked_mul(listing.price_per_unit)
                .ok_or(ModuleError::Overflow("listing cost"))?;
            if ctx.value < cost {
                return Err(ModuleError::Revert(format!(
                    "insufficient value: need {cost}, got {}",
                    ctx.value
                )));
            }

            // Seller is paid in withdrawable credit; any excess value goes
            // back to the buyer the same way.
            let seller_credit = rt.storage.credits.entry(listing.seller).or_default();
            *seller_credit = seller_credit.saturating_add(cost);
            let excess = ctx.value - cost;
            if !excess.is_zero() {
                let buyer_credit = rt.storage.credits.entry(ctx.caller).or_default();
                *buyer_credit = buyer_credit.saturating_add(excess);
            }

            // Deliver the escrowed units.
            let key = (listing.asset_id, ctx.caller);
            let held = rt.storage.holding(listing.asset_id, ctx.caller);
            rt.storage
                .holdings
                .insert(key, held.saturating_add(listing.amount));

            rt.storage
                .emit(DiamondEvent::module("ListingSold", &listing.id));
            debug!(listing_id = listing.id, buyer = ?ctx.caller, cost = %cost, "listing sold");
            Ok(Vec::new())
        })
    }

    fn cancel_listing(
        &self,
        rt: &mut Runtime<'_>,
        ctx: &CallContext,
        input: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        let args: ListingArgs = decode_call(input)?;
        rt.guarded(|rt| {
            let listing = rt
                .storage
                .listings
                .get(&args.listing_id)
                .ok_or_else(|| {
                    ModuleError::Revert(format!("unknown listing {}", args.listing_id))
                })?
                .clone();
            if listing.seller != ctx.caller {
                return Err(ModuleError::Unauthorized(ctx.caller));
            }
            rt.storage.listings.remove(&args.listing_id);

            // Release the escrow back to the seller.
            let key = (listing.asset_id, listing.seller);
            let held = rt.storage.holding(listing.asset_id, listing.seller);
            rt.storage
                .holdings
                .insert(key, held.saturating_add(listing.amount));
            rt.storage
                .emit(DiamondEvent::module("ListingCancelled", &listing.id));
            Ok(Vec::new())
        })
    }

    fn listing(&self, rt: &mut Runtime<'_>, input: &[u8]) -> Result<Vec<u8>, ModuleError> {
        let args: ListingArgs = decode_call(input)?;
        let listing = rt
            .storage
            .listings
            .get(&args.listing_id)
            .ok_or_else(|| ModuleError::Revert(format!("unknown listing {}", args.listing_id)))?;
        Ok(encode_return(listing))
    }
}

impl ModuleCode for MarketFacet {
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
        if selector == Selector::of(sig::LIST_ASSET) {
            self.list_asset(rt, ctx, input)
        } else if selector == Selector::of(sig::BUY_LISTING) {
            self.buy_listing(rt, ctx, input)
        } else if selector == Selector::of(sig::CANCEL_LISTING) {
            self.cancel_listing(rt, ctx, input)
        } else if selector == Selector::of(sig::LISTING) {
            self.listing(rt, input)
        } else {
            Err(ModuleError::UnknownSelector(selector))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tessera_assets::AssetsFacet;
    use tessera_core::dispatch::Dispatcher;
    use tessera_types::codec::{decode_return, encode_call};

    const DEPLOYER: Address = Address([0xde; 20]);
    const ASSETS: Address = Address([0xaa; 20]);
    const MARKET: Address = Address([0xbb; 20]);
    const ALICE: Address = Address([0xa1; 20]);

    fn dispatcher() -> (Dispatcher, u64) {
        let mut d = Dispatcher::new(Address::new([0xd1; 20]), DEPLOYER);
        d.register_code(ASSETS, Arc::new(AssetsFacet::new(ASSETS)));
        d.register_code(MARKET, Arc::new(MarketFacet::new(MARKET)));
        d.install_module(DEPLOYER, ASSETS).unwrap();
        d.install_module(DEPLOYER, MARKET).unwrap();

        let input = encode_call(&tessera_assets::CreateAssetArgs {
            name: "Vineyard".into(),
            supply: U256::from(1000),
            price: U256::from(2),
        });
        let output = d
            .call(
                DEPLOYER,
                U256::zero(),
                Selector::of(tessera_assets::sig::CREATE_ASSET),
                &input,
            )
            .unwrap();
        let asset_id: u64 = decode_return(&output).unwrap();
        (d, asset_id)
    }

    fn list(d: &mut Dispatcher, asset_id: u64, amount: u64, price: u64) -> u64 {
        let input = encode_call(&ListAssetArgs {
            asset_id,
            amount: U256::from(amount),
            price_per_unit: U256::from(price),
        });
        let output = d
            .call(DEPLOYER, U256::zero(), Selector::of(sig::LIST_ASSET), &input)
            .unwrap();
        decode_return(&output).unwrap()
    }

    #[test]
    fn test_listing_escrows_units() {
        let (mut d, asset_id) = dispatcher();
        let listing_id = list(&mut d, asset_id, 100, 3);

        assert_eq!(d.storage().holding(asset_id, DEPLOYER), U256::from(900));
        let listing = &d.storage().listings[&listing_id];
        assert_eq!(listing.amount, U256::from(100));
        assert_eq!(listing.seller, DEPLOYER);
    }

    #[test]
    fn test_buy_delivers_and_credits_seller() {
        let (mut d, asset_id) = dispatcher();
        let listing_id = list(&mut d, asset_id, 100, 3);

        let input = encode_call(&ListingArgs { listing_id });
        d.call(ALICE, U256::from(320), Selector::of(sig::BUY_LISTING), &input)
            .unwrap();

        assert_eq!(d.storage().holding(asset_id, ALICE), U256::from(100));
        assert_eq!(d.storage().credits[&DEPLOYER], U256::from(300));
        // Excess value is credited back to the buyer.
        assert_eq!(d.storage().credits[&ALICE], U256::from(20));
        assert!(!d.storage().listings.contains_key(&listing_id));
        // The attached value stayed with the dispatcher.
        assert_eq!(d.storage().native_balance, U256::from(320));
    }

    #[test]
    fn test_buy_with_insufficient_value_rolls_back() {
        let (mut d, asset_id) = dispatcher();
        let listing_id = list(&mut d, asset_id, 100, 3);

        let input = encode_call(&ListingArgs { listing_id });
        let err = d
            .call(ALICE, U256::from(299), Selector::of(sig::BUY_LISTING), &input)
            .unwrap_err();
        assert!(err.to_string().contains("insufficient value"));
        // Rollback: listing still live, escrow intact, no value kept.
        assert!(d.storage().listings.contains_key(&listing_id));
        assert_eq!(d.storage().native_balance, U256::zero());
        assert_eq!(d.storage().holding(asset_id, ALICE), U256::zero());
    }

    #[test]
    fn test_denied_buyer_is_rejected() {
        let (mut d, asset_id) = dispatcher();
        let listing_id = list(&mut d, asset_id, 10, 1);
        d.storage_mut().denied.insert(ALICE);

        let input = encode_call(&ListingArgs { listing_id });
        let err = d
            .call(ALICE, U256::from(10), Selector::of(sig::BUY_LISTING), &input)
            .unwrap_err();
        assert!(err.to_string().contains("unauthorized"));
    }

    #[test]
    fn test_cancel_restores_escrow() {
        let (mut d, asset_id) = dispatcher();
        let listing_id = list(&mut d, asset_id, 100, 3);

        // Only the seller may cancel.
        let input = encode_call(&ListingArgs { listing_id });
        let err = d
            .call(ALICE, U256::zero(), Selector::of(sig::CANCEL_LISTING), &input)
            .unwrap_err();
        assert!(err.to_string().contains("unauthorized"));

        d.call(DEPLOYER, U256::zero(), Selector::of(sig::CANCEL_LISTING), &input)
            .unwrap();
        assert_eq!(d.storage().holding(asset_id, DEPLOYER), U256::from(1000));
        assert!(!d.storage().listings.contains_key(&listing_id));
    }
}
