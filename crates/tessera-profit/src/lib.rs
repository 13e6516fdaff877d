//! # tessera-profit - Profit Distribution Facet
//!
//! Splits native value attached to a distribution pro rata over the
//! holders of one asset, recorded as claimable amounts in shared storage.
//! Claims convert to withdrawable native-value credit. The whole facet can
//! be paused by the admin.
//!
//! Remainders from integer division stay in the dispatcher's native
//! balance; they are recoverable through the admin withdraw operation.

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
    /// Distribute attached value over an asset's holders (payable).
    pub const DISTRIBUTE: &str = "distribute(uint256)";
    /// Convert the caller's claimable profit into withdrawable credit.
    pub const CLAIM: &str = "claim(uint256)";
    /// Pause or resume distributions and claims.
    pub const SET_PAUSED: &str = "setProfitsPaused(bool)";
    /// Query the caller-independent claimable amount of one holder.
    pub const CLAIMABLE: &str = "claimable(uint256,address)";
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Single-asset argument (distribute, claim).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AssetIdArgs {
    /// Asset whose profit pool is addressed.
    pub asset_id: u64,
}

/// Arguments of [`sig::SET_PAUSED`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SetPausedArgs {
    /// New paused state.
    pub paused: bool,
}

/// Arguments of [`sig::CLAIMABLE`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ClaimableArgs {
    /// Asset whose pool is queried.
    pub asset_id: u64,
    /// Holder to query.
    pub holder: Address,
}

// =============================================================================
// FACET
// =============================================================================

/// The profit distribution facet.
pub struct ProfitFacet {
    address: Address,
}

impl ProfitFacet {
    /// Creates the facet for its deployed address.
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// The selectors this facet contributes.
    #[must_use]
    pub fn selectors() -> Vec<Selector> {
        vec![
            Selector::of(sig::DISTRIBUTE),
            Selector::of(sig::CLAIM),
            Selector::of(sig::SET_PAUSED),
            Selector::of(sig::CLAIMABLE),
        ]
    }

    fn ensure_running(rt: &Runtime<'_>) -> Result<(), ModuleError> {
        if rt.storage.profits_paused {
            Err(ModuleError::Revert("profit distribution is paused".into()))
        } else {
            Ok(())
        }
    }

    fn distribute(
        &self,
        rt: &mut Runtime<'_>,
        ctx: &CallContext,
        input: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        let args: AssetIdArgs = decode_call(input)?;
        rt.guarded(|rt| {
            Self::ensure_running(rt)?;
            if ctx.value.is_zero() {
                return Err(ModuleError::Revert("nothing to distribute".into()));
            }
            let supply = rt
                .storage
                .assets
                .get(&args.asset_id)
                .map(|a| a.total_supply)
                .ok_or_else(|| ModuleError::Revert(format!("unknown asset {}", args.asset_id)))?;

            // Pro-rata split over the current holder snapshot. Integer
            // division truncates per holder; the remainder stays in the
            // native balance.
            let holders: Vec<(Address, U256)> = rt
                .storage
                .holdings
                .range((args.asset_id, Address::ZERO)..=(args.asset_id, Address([0xff; 20])))
                .map(|(&(_, holder), &amount)| (holder, amount))
                .collect();
            for (holder, held) in holders {
                let share = held
                    .checked_mul(ctx.value)
                    .ok_or(ModuleError::Overflow("profit share"))?
                    / supply;
                if share.is_zero() {
                    continue;
                }
                let claimable = rt
                    .storage
                    .claimable_profits
                    .entry((args.asset_id, holder))
                    .or_default();
                *claimable = claimable.saturating_add(share);
            }
            rt.storage
                .emit(DiamondEvent::module("ProfitDistributed", &args.asset_id));
            debug!(asset_id = args.asset_id, value = %ctx.value, "profit distributed");
            Ok(Vec::new())
        })
    }

    fn claim(
        &self,
        rt: &mut Runtime<'_>,
        ctx: &CallContext,
        input: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        let args: AssetIdArgs = decode_call(input)?;
        rt.guarded(|rt| {
            Self::ensure_running(rt)?;
            let amount = rt
                .storage
                .claimable_profits
                .remove(&(args.asset_id, ctx.caller))
                .unwrap_or_default();
            if amount.is_zero() {
                return Err(ModuleError::Revert("nothing to claim".into()));
            }
            let credit = rt.storage.credits.entry(ctx.caller).or_default();
            *credit = credit.saturating_add(amount);
            rt.storage
                .emit(DiamondEvent::module("ProfitClaimed", &args.asset_id));
            Ok(encode_return(&amount))
        })
    }

    fn set_paused(
        &self,
        rt: &mut Runtime<'_>,
        ctx: &CallContext,
        input: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        if !rt.storage.is_admin(ctx.caller) {
            return Err(ModuleError::Unauthorized(ctx.caller));
        }
        let args: SetPausedArgs = decode_call(input)?;
        rt.storage.profits_paused = args.paused;
        rt.storage
            .emit(DiamondEvent::module("ProfitsPausedSet", &args.paused));
        Ok(Vec::new())
    }

    fn claimable(&self, rt: &mut Runtime<'_>, input: &[u8]) -> Result<Vec<u8>, ModuleError> {
        let args: ClaimableArgs = decode_call(input)?;
        let amount = rt
            .storage
            .claimable_profits
            .get(&(args.asset_id, args.holder))
            .copied()
            .unwrap_or_default();
        Ok(encode_return(&amount))
    }
}

impl ModuleCode for ProfitFacet {
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
        if selector == Selector::of(sig::DISTRIBUTE) {
            self.distribute(rt, ctx, input)
        } else if selector == Selector::of(sig::CLAIM) {
            self.claim(rt, ctx, input)
        } else if selector == Selector::of(sig::SET_PAUSED) {
            self.set_paused(rt, ctx, input)
        } else if selector == Selector::of(sig::CLAIMABLE) {
            self.claimable(rt, input)
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
    const PROFIT: Address = Address([0xcc; 20]);
    const ALICE: Address = Address([0xa1; 20]);

    fn dispatcher_with_holders() -> (Dispatcher, u64) {
        let mut d = Dispatcher::new(Address::new([0xd1; 20]), DEPLOYER);
        d.register_code(ASSETS, Arc::new(AssetsFacet::new(ASSETS)));
        d.register_code(PROFIT, Arc::new(ProfitFacet::new(PROFIT)));
        d.install_module(DEPLOYER, ASSETS).unwrap();
        d.install_module(DEPLOYER, PROFIT).unwrap();

        let input = encode_call(&tessera_assets::CreateAssetArgs {
            name: "Solar Park".into(),
            supply: U256::from(1000),
            price: U256::from(1),
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

        // Move 250 units to alice: deployer 750 / alice 250.
        let input = encode_call(&tessera_assets::TransferAssetArgs {
            asset_id,
            to: ALICE,
            amount: U256::from(250),
        });
        d.call(
            DEPLOYER,
            U256::zero(),
            Selector::of(tessera_assets::sig::TRANSFER_ASSET),
            &input,
        )
        .unwrap();
        (d, asset_id)
    }

    fn claimable_of(d: &mut Dispatcher, asset_id: u64, holder: Address) -> U256 {
        let input = encode_call(&ClaimableArgs { asset_id, holder });
        let output = d
            .call(holder, U256::zero(), Selector::of(sig::CLAIMABLE), &input)
            .unwrap();
        decode_return(&output).unwrap()
    }

    #[test]
    fn test_distribute_splits_pro_rata() {
        let (mut d, asset_id) = dispatcher_with_holders();

        let input = encode_call(&AssetIdArgs { asset_id });
        d.call(DEPLOYER, U256::from(1000), Selector::of(sig::DISTRIBUTE), &input)
            .unwrap();

        assert_eq!(claimable_of(&mut d, asset_id, DEPLOYER), U256::from(750));
        assert_eq!(claimable_of(&mut d, asset_id, ALICE), U256::from(250));
    }

    #[test]
    fn test_claim_converts_to_credit() {
        let (mut d, asset_id) = dispatcher_with_holders();
        let input = encode_call(&AssetIdArgs { asset_id });
        d.call(DEPLOYER, U256::from(1000), Selector::of(sig::DISTRIBUTE), &input)
            .unwrap();

        let output = d
            .call(ALICE, U256::zero(), Selector::of(sig::CLAIM), &input)
            .unwrap();
        let claimed: U256 = decode_return(&output).unwrap();
        assert_eq!(claimed, U256::from(250));
        assert_eq!(d.storage().credits[&ALICE], U256::from(250));

        // Double claim reverts.
        let err = d
            .call(ALICE, U256::zero(), Selector::of(sig::CLAIM), &input)
            .unwrap_err();
        assert!(err.to_string().contains("nothing to claim"));
    }

    #[test]
    fn test_paused_blocks_distribution() {
        let (mut d, asset_id) = dispatcher_with_holders();

        let pause = encode_call(&SetPausedArgs { paused: true });
        d.call(DEPLOYER, U256::zero(), Selector::of(sig::SET_PAUSED), &pause)
            .unwrap();

        let input = encode_call(&AssetIdArgs { asset_id });
        let err = d
            .call(DEPLOYER, U256::from(100), Selector::of(sig::DISTRIBUTE), &input)
            .unwrap_err();
        assert!(err.to_string().contains("paused"));
        // Rollback includes the attached value.
        assert_eq!(d.storage().native_balance, U256::zero());

        // Only the admin can unpause.
        let unpause = encode_call(&SetPausedArgs { paused: false });
        let err = d
            .call(ALICE, U256::zero(), Selector::of(sig::SET_PAUSED), &unpause)
            .unwrap_err();
        assert!(err.to_string().contains("unauthorized"));
    }

    #[test]
    fn test_distribution_remainder_stays_native() {
        let (mut d, asset_id) = dispatcher_with_holders();
        // 10 over supply 1000: deployer share 7 (7.5 truncated), alice 2.
        let input = encode_call(&AssetIdArgs { asset_id });
        d.call(DEPLOYER, U256::from(10), Selector::of(sig::DISTRIBUTE), &input)
            .unwrap();
        assert_eq!(claimable_of(&mut d, asset_id, DEPLOYER), U256::from(7));
        assert_eq!(claimable_of(&mut d, asset_id, ALICE), U256::from(2));
    }
}
