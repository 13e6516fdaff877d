//! # tessera-staking - Utility Token Staking Facet
//!
//! Locks utility-token balance into per-account staking positions and
//! accrues epoch-based rewards. Staked weight doubles as governance voting
//! power, and the total staked amount is the quorum base for proposals.
//!
//! Reward settlement is lazy: a position's accrual is brought up to the
//! current epoch whenever the position is touched, then `since_epoch`
//! resets. Claiming mints the accrued amount back into the utility token
//! ledger.

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use tessera_core::dispatch::{CallContext, Runtime};
use tessera_core::events::DiamondEvent;
use tessera_core::module::ModuleCode;
use tessera_core::storage::Stake;
use tessera_types::codec::{decode_call, encode_return};
use tessera_types::module::{FacetCut, ModuleError};
use tessera_types::values::{Address, Selector, U256};
use tracing::debug;

// =============================================================================
// OPERATION SIGNATURES
// =============================================================================

/// Operation signature strings (selectors derive from these).
pub mod sig {
    /// Lock utility tokens into the caller's staking position.
    pub const STAKE: &str = "stake(uint256)";
    /// Release utility tokens from the caller's staking position.
    pub const UNSTAKE: &str = "unstake(uint256)";
    /// Mint the caller's settled rewards back into the token ledger.
    pub const CLAIM_REWARDS: &str = "claimRewards()";
    /// Advance the reward epoch (admin).
    pub const ADVANCE_EPOCH: &str = "advanceEpoch()";
    /// Query one account's staking position.
    pub const STAKE_OF: &str = "stakeOf(address)";
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Single-amount argument (stake, unstake).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AmountArgs {
    /// Utility-token amount.
    pub amount: U256,
}

/// Arguments of [`sig::STAKE_OF`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct StakeOfArgs {
    /// Account to query.
    pub account: Address,
}

// =============================================================================
// FACET
// =============================================================================

/// The staking facet.
pub struct StakingFacet {
    address: Address,
}

impl StakingFacet {
    /// Creates the facet for its deployed address.
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// The selectors this facet contributes.
    #[must_use]
    pub fn selectors() -> Vec<Selector> {
        vec![
            Selector::of(sig::STAKE),
            Selector::of(sig::UNSTAKE),
            Selector::of(sig::CLAIM_REWARDS),
            Selector::of(sig::ADVANCE_EPOCH),
            Selector::of(sig::STAKE_OF),
        ]
    }

    /// Brings a position's accrual up to `current_epoch`.
    fn settle(stake: &mut Stake, current_epoch: u64, reward_rate: U256) -> Result<(), ModuleError> {
        let elapsed = current_epoch.saturating_sub(stake.since_epoch);
        if elapsed > 0 && !stake.amount.is_zero() {
            let reward = stake
                .amount
                .checked_mul(U256::from(elapsed))
                .and_then(|v| v.checked_mul(reward_rate))
                .ok_or(ModuleError::Overflow("staking reward"))?;
            stake.accrued = stake.accrued.saturating_add(reward);
        }
        stake.since_epoch = current_epoch;
        Ok(())
    }

    fn stake(
        &self,
        rt: &mut Runtime<'_>,
        ctx: &CallContext,
        input: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        let args: AmountArgs = decode_call(input)?;
        rt.guarded(|rt| {
            if args.amount.is_zero() {
                return Err(ModuleError::Revert("cannot stake zero".into()));
            }
            let token = rt.storage.utility_token;
            if !rt.storage.debit_token(token, ctx.caller, args.amount) {
                return Err(ModuleError::Revert("insufficient token balance".into()));
            }
            let epoch = rt.storage.current_epoch;
            let rate = rt.storage.reward_rate;
            let stake = rt.storage.stakes.entry(ctx.caller).or_default();
            Self::settle(stake, epoch, rate)?;
            stake.amount = stake.amount.saturating_add(args.amount);
            rt.storage.total_staked = rt.storage.total_staked.saturating_add(args.amount);
            rt.storage.emit(DiamondEvent::module("Staked", &args.amount));
            debug!(staker = ?ctx.caller, amount = %args.amount, "stake added");
            Ok(Vec::new())
        })
    }

    fn unstake(
        &self,
        rt: &mut Runtime<'_>,
        ctx: &CallContext,
        input: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        let args: AmountArgs = decode_call(input)?;
        rt.guarded(|rt| {
            let epoch = rt.storage.current_epoch;
            let rate = rt.storage.reward_rate;
            let stake = rt
                .storage
                .stakes
                .get_mut(&ctx.caller)
                .ok_or_else(|| ModuleError::Revert("no staking position".into()))?;
            Self::settle(stake, epoch, rate)?;
            if stake.amount < args.amount {
                return Err(ModuleError::Revert("insufficient staked amount".into()));
            }
            stake.amount -= args.amount;
            let prune = stake.amount.is_zero() && stake.accrued.is_zero();
            if prune {
                rt.storage.stakes.remove(&ctx.caller);
            }
            rt.storage.total_staked = rt.storage.total_staked.saturating_sub(args.amount);
            let token = rt.storage.utility_token;
            rt.storage.credit_token(token, ctx.caller, args.amount);
            rt.storage.emit(DiamondEvent::module("Unstaked", &args.amount));
            Ok(Vec::new())
        })
    }

    fn claim_rewards(
        &self,
        rt: &mut Runtime<'_>,
        ctx: &CallContext,
    ) -> Result<Vec<u8>, ModuleError> {
        rt.guarded(|rt| {
            let epoch = rt.storage.current_epoch;
            let rate = rt.storage.reward_rate;
            let stake = rt
                .storage
                .stakes
                .get_mut(&ctx.caller)
                .ok_or_else(|| ModuleError::Revert("no staking position".into()))?;
            Self::settle(stake, epoch, rate)?;
            let reward = stake.accrued;
            if reward.is_zero() {
                return Err(ModuleError::Revert("nothing to claim".into()));
            }
            stake.accrued = U256::zero();
            let prune = stake.amount.is_zero();
            if prune {
                rt.storage.stakes.remove(&ctx.caller);
            }
            // Rewards are minted, not transferred from a pool.
            let token = rt.storage.utility_token;
            rt.storage.credit_token(token, ctx.caller, reward);
            rt.storage.emit(DiamondEvent::module("RewardsClaimed", &reward));
            Ok(encode_return(&reward))
        })
    }

    fn advance_epoch(
        &self,
        rt: &mut Runtime<'_>,
        ctx: &CallContext,
    ) -> Result<Vec<u8>, ModuleError> {
        if !rt.storage.is_admin(ctx.caller) {
            return Err(ModuleError::Unauthorized(ctx.caller));
        }
        rt.storage.current_epoch += 1;
        let epoch = rt.storage.current_epoch;
        rt.storage.emit(DiamondEvent::module("EpochAdvanced", &epoch));
        debug!(epoch, "epoch advanced");
        Ok(encode_return(&epoch))
    }

    fn stake_of(&self, rt: &mut Runtime<'_>, input: &[u8]) -> Result<Vec<u8>, ModuleError> {
        let args: StakeOfArgs = decode_call(input)?;
        let stake = rt
            .storage
            .stakes
            .get(&args.account)
            .cloned()
            .unwrap_or_default();
        Ok(encode_return(&stake))
    }
}

impl ModuleCode for StakingFacet {
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
        if selector == Selector::of(sig::STAKE) {
            self.stake(rt, ctx, input)
        } else if selector == Selector::of(sig::UNSTAKE) {
            self.unstake(rt, ctx, input)
        } else if selector == Selector::of(sig::CLAIM_REWARDS) {
            self.claim_rewards(rt, ctx)
        } else if selector == Selector::of(sig::ADVANCE_EPOCH) {
            self.advance_epoch(rt, ctx)
        } else if selector == Selector::of(sig::STAKE_OF) {
            self.stake_of(rt, input)
        } else {
            Err(ModuleError::UnknownSelector(selector))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
