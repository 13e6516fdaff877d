//! # tessera-assets - Asset Tokenization Facet
//!
//! Represents real-world assets as semi-fungible token balances in the
//! shared storage region: every asset id has its own fungible balance
//! space. Creation and updates are admin operations; transfers are
//! compliance-checked against the shared allow/deny lists and keep the
//! per-holder profit accounting in sync.

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use tessera_core::dispatch::{CallContext, Runtime};
use tessera_core::events::DiamondEvent;
use tessera_core::module::ModuleCode;
use tessera_core::storage::Asset;
use tessera_types::codec::{decode_call, encode_return};
use tessera_types::module::{FacetCut, ModuleError};
use tessera_types::values::{Address, Selector, U256};
use tracing::debug;

// =============================================================================
// OPERATION SIGNATURES
// =============================================================================

/// Operation signature strings (selectors derive from these).
pub mod sig {
    /// Create a new asset and mint its supply to the deployer.
    pub const CREATE_ASSET: &str = "createAsset(string,uint256,uint256)";
    /// Update an asset's reference price.
    pub const UPDATE_ASSET: &str = "updateAsset(uint256,uint256)";
    /// Query one asset record.
    pub const ASSET: &str = "asset(uint256)";
    /// Query a holder's balance for one asset.
    pub const BALANCE_OF: &str = "balanceOf(uint256,address)";
    /// Move asset units between holders.
    pub const TRANSFER_ASSET: &str = "transferAsset(uint256,address,uint256)";
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Arguments of [`sig::CREATE_ASSET`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateAssetArgs {
    /// Human-readable asset name.
    pub name: String,
    /// Total supply to mint.
    pub supply: U256,
    /// Reference unit price.
    pub price: U256,
}

/// Arguments of [`sig::UPDATE_ASSET`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct UpdateAssetArgs {
    /// Asset to update.
    pub asset_id: u64,
    /// New reference price.
    pub price: U256,
}

/// Arguments of [`sig::ASSET`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AssetArgs {
    /// Asset to query.
    pub asset_id: u64,
}

/// Arguments of [`sig::BALANCE_OF`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BalanceOfArgs {
    /// Asset to query.
    pub asset_id: u64,
    /// Holder to query.
    pub holder: Address,
}

/// Arguments of [`sig::TRANSFER_ASSET`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TransferAssetArgs {
    /// Asset to move.
    pub asset_id: u64,
    /// Recipient.
    pub to: Address,
    /// Amount to move.
    pub amount: U256,
}

// =============================================================================
// FACET
// =============================================================================

/// The asset tokenization facet.
pub struct AssetsFacet {
    address: Address,
}

impl AssetsFacet {
    /// Creates the facet for its deployed address.
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// The selectors this facet contributes.
    #[must_use]
    pub fn selectors() -> Vec<Selector> {
        vec![
            Selector::of(sig::CREATE_ASSET),
            Selector::of(sig::UPDATE_ASSET),
            Selector::of(sig::ASSET),
            Selector::of(sig::BALANCE_OF),
            Selector::of(sig::TRANSFER_ASSET),
        ]
    }

    fn create_asset(
        &self,
        rt: &mut Runtime<'_>,
        ctx: &CallContext,
        input: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        if !rt.storage.is_admin(ctx.caller) {
            return Err(ModuleError::Unauthorized(ctx.caller));
        }
        let args: CreateAssetArgs = decode_call(input)?;
        if args.supply.is_zero() {
            return Err(ModuleError::Revert("asset supply must be non-zero".into()));
        }
        rt.guarded(|rt| {
            let id = rt.storage.next_asset_id;
            rt.storage.next_asset_id += 1;
            let deployer = rt.storage.deployer;
            rt.storage.assets.insert(
                id,
                Asset {
                    id,
                    name: args.name.clone(),
                    total_supply: args.supply,
                    price: args.price,
                    issuer: ctx.caller,
                },
            );
            // Full supply mints to the deployer identity.
            rt.storage.holdings.insert((id, deployer), args.supply);
            rt.storage.emit(DiamondEvent::module("AssetCreated", &id));
            debug!(asset_id = id, supply = %args.supply, "asset created");
            Ok(encode_return(&id))
        })
    }

    fn update_asset(
        &self,
        rt: &mut Runtime<'_>,
        ctx: &CallContext,
        input: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        if !rt.storage.is_admin(ctx.caller) {
            return Err(ModuleError::Unauthorized(ctx.caller));
        }
        let args: UpdateAssetArgs = decode_call(input)?;
        rt.guarded(|rt| {
            let asset = rt
                .storage
                .assets
                .get_mut(&args.asset_id)
                .ok_or_else(|| ModuleError::Revert(format!("unknown asset {}", args.asset_id)))?;
            asset.price = args.price;
            rt.storage
                .emit(DiamondEvent::module("AssetUpdated", &args.asset_id));
            Ok(Vec::new())
        })
    }

    fn asset(&self, rt: &mut Runtime<'_>, input: &[u8]) -> Result<Vec<u8>, ModuleError> {
        let args: AssetArgs = decode_call(input)?;
        let asset = rt
            .storage
            .assets
            .get(&args.asset_id)
            .ok_or_else(|| ModuleError::Revert(format!("unknown asset {}", args.asset_id)))?;
        Ok(encode_return(asset))
    }

    fn balance_of(&self, rt: &mut Runtime<'_>, input: &[u8]) -> Result<Vec<u8>, ModuleError> {
        let args: BalanceOfArgs = decode_call(input)?;
        Ok(encode_return(&rt.storage.holding(args.asset_id, args.holder)))
    }

    fn transfer_asset(
        &self,
        rt: &mut Runtime<'_>,
        ctx: &CallContext,
        input: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        let args: TransferAssetArgs = decode_call(input)?;
        rt.guarded(|rt| {
            if !rt.storage.assets.contains_key(&args.asset_id) {
                return Err(ModuleError::Revert(format!(
                    "unknown asset {}",
                    args.asset_id
                )));
            }
            if !rt.storage.is_compliant(ctx.caller) {
                return Err(ModuleError::Unauthorized(ctx.caller));
            }
            if !rt.storage.is_compliant(args.to) {
                return Err(ModuleError::Unauthorized(args.to));
            }

            let from_key = (args.asset_id, ctx.caller);
            let balance = rt.storage.holding(args.asset_id, ctx.caller);
            if balance < args.amount {
                return Err(ModuleError::Revert("insufficient asset balance".into()));
            }
            let remaining = balance - args.amount;
            if remaining.is_zero() {
                rt.storage.holdings.remove(&from_key);
            } else {
                rt.storage.holdings.insert(from_key, remaining);
            }
            let to_key = (args.asset_id, args.to);
            let to_balance = rt.storage.holding(args.asset_id, args.to);
            rt.storage
                .holdings
                .insert(to_key, to_balance.saturating_add(args.amount));
            rt.storage
                .emit(DiamondEvent::module("AssetTransferred", &args.asset_id));
            debug!(asset_id = args.asset_id, from = ?ctx.caller, to = ?args.to, "asset transferred");
            Ok(Vec::new())
        })
    }
}

impl ModuleCode for AssetsFacet {
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
        if selector == Selector::of(sig::CREATE_ASSET) {
            self.create_asset(rt, ctx, input)
        } else if selector == Selector::of(sig::UPDATE_ASSET) {
            self.update_asset(rt, ctx, input)
        } else if selector == Selector::of(sig::ASSET) {
            self.asset(rt, input)
        } else if selector == Selector::of(sig::BALANCE_OF) {
            self.balance_of(rt, input)
        } else if selector == Selector::of(sig::TRANSFER_ASSET) {
            self.transfer_asset(rt, ctx, input)
        } else {
            Err(ModuleError::UnknownSelector(selector))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
