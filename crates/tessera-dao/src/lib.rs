//! # tessera-dao - Stake-Weighted Governance Facet
//!
//! Proposal lifecycle over the staking positions: any staker can propose,
//! vote weight is the voter's staked amount, and a passed proposal may
//! carry one operation that execution forwards through the dispatcher. The
//! forwarded operation sees the dispatcher itself as the caller, which is
//! how governance reaches admin-gated operations without holding the
//! deployer key.
//!
//! Execution is deliberately not latch-guarded: the forwarded action is
//! usually a guarded operation itself, and the per-invocation rollback
//! already makes execution all-or-nothing.

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use tessera_core::dispatch::{CallContext, Runtime};
use tessera_core::events::DiamondEvent;
use tessera_core::module::ModuleCode;
use tessera_core::storage::{Proposal, ProposalAction};
use tessera_types::codec::{decode_call, encode_return};
use tessera_types::module::{FacetCut, ModuleError};
use tessera_types::values::{Address, Selector, U256};
use tracing::{debug, info};

// =============================================================================
// OPERATION SIGNATURES
// =============================================================================

/// Operation signature strings (selectors derive from these).
pub mod sig {
    /// Create a proposal (stakers only).
    pub const PROPOSE: &str = "propose(string,bytes4,bytes)";
    /// Vote on a proposal with the caller's staked weight.
    pub const CAST_VOTE: &str = "castVote(uint256,bool)";
    /// Execute a passed proposal, forwarding its action if it has one.
    pub const EXECUTE_PROPOSAL: &str = "executeProposal(uint256)";
    /// Query one proposal record.
    pub const PROPOSAL: &str = "proposal(uint256)";
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Arguments of [`sig::PROPOSE`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProposeArgs {
    /// Free-form proposal description.
    pub description: String,
    /// Optional operation to forward on execution.
    pub action: Option<ProposalAction>,
}

/// Arguments of [`sig::CAST_VOTE`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CastVoteArgs {
    /// Proposal to vote on.
    pub proposal_id: u64,
    /// True for, false against.
    pub support: bool,
}

/// Single-proposal argument (execute, query).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ProposalIdArgs {
    /// Proposal id.
    pub proposal_id: u64,
}

// =============================================================================
// FACET
// =============================================================================

/// The governance facet.
pub struct DaoFacet {
    address: Address,
}

impl DaoFacet {
    /// Creates the facet for its deployed address.
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// The selectors this facet contributes.
    #[must_use]
    pub fn selectors() -> Vec<Selector> {
        vec![
            Selector::of(sig::PROPOSE),
            Selector::of(sig::CAST_VOTE),
            Selector::of(sig::EXECUTE_PROPOSAL),
            Selector::of(sig::PROPOSAL),
        ]
    }

    fn staked_weight(rt: &Runtime<'_>, account: Address) -> U256 {
        rt.storage
            .stakes
            .get(&account)
            .map(|s| s.amount)
            .unwrap_or_default()
    }

    /// Passes with a strict majority of cast votes and more than half of
    /// the total staked weight in favor.
    fn passes(proposal: &Proposal, total_staked: U256) -> bool {
        proposal.votes_for > proposal.votes_against
            && proposal.votes_for.saturating_mul(U256::from(2)) > total_staked
    }

    fn propose(
        &self,
        rt: &mut Runtime<'_>,
        ctx: &CallContext,
        input: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        let args: ProposeArgs = decode_call(input)?;
        rt.guarded(|rt| {
            if Self::staked_weight(rt, ctx.caller).is_zero() {
                return Err(ModuleError::Revert("proposer has no stake".into()));
            }
            if args.description.is_empty() {
                return Err(ModuleError::Revert("empty proposal description".into()));
            }
            let id = rt.storage.next_proposal_id;
            rt.storage.next_proposal_id += 1;
            rt.storage.proposals.insert(
                id,
                Proposal {
                    id,
                    proposer: ctx.caller,
                    description: args.description.clone(),
                    votes_for: U256::zero(),
                    votes_against: U256::zero(),
                    voters: Default::default(),
                    executed: false,
                    action: args.action.clone(),
                },
            );
            rt.storage.emit(DiamondEvent::module("ProposalCreated", &id));
            debug!(proposal_id = id, proposer = ?ctx.caller, "proposal created");
            Ok(encode_return(&id))
        })
    }

    fn cast_vote(
        &self,
        rt: &mut Runtime<'_>,
        ctx: &CallContext,
        input: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        let args: CastVoteArgs = decode_call(input)?;
        rt.guarded(|rt| {
            let weight = Self::staked_weight(rt, ctx.caller);
            if weight.is_zero() {
                return Err(ModuleError::Revert("voter has no stake".into()));
            }
            let proposal = rt
                .storage
                .proposals
                .get_mut(&args.proposal_id)
                .ok_or_else(|| {
                    ModuleError::Revert(format!("unknown proposal {}", args.proposal_id))
                })?;
            if proposal.executed {
                return Err(ModuleError::Revert("proposal already executed".into()));
            }
            if !proposal.voters.insert(ctx.caller) {
                return Err(ModuleError::Revert("already voted".into()));
            }
            if args.support {
                proposal.votes_for = proposal.votes_for.saturating_add(weight);
            } else {
                proposal.votes_against = proposal.votes_against.saturating_add(weight);
            }
            rt.storage
                .emit(DiamondEvent::module("VoteCast", &args.proposal_id));
            Ok(Vec::new())
        })
    }

    fn execute_proposal(
        &self,
        rt: &mut Runtime<'_>,
        input: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        let args: ProposalIdArgs = decode_call(input)?;
        let total_staked = rt.storage.total_staked;
        let proposal = rt
            .storage
            .proposals
            .get_mut(&args.proposal_id)
            .ok_or_else(|| ModuleError::Revert(format!("unknown proposal {}", args.proposal_id)))?;
        if proposal.executed {
            return Err(ModuleError::Revert("proposal already executed".into()));
        }
        if !Self::passes(proposal, total_staked) {
            return Err(ModuleError::Revert("proposal has not passed".into()));
        }
        proposal.executed = true;
        let action = proposal.action.clone();

        if let Some(action) = action {
            // Forwarded with the dispatcher as caller; a failure here rolls
            // back the executed flag with the rest of the invocation.
            rt.forward(action.selector, action.input.as_slice())?;
        }
        rt.storage
            .emit(DiamondEvent::module("ProposalExecuted", &args.proposal_id));
        info!(proposal_id = args.proposal_id, "proposal executed");
        Ok(Vec::new())
    }

    fn proposal(&self, rt: &mut Runtime<'_>, input: &[u8]) -> Result<Vec<u8>, ModuleError> {
        let args: ProposalIdArgs = decode_call(input)?;
        let proposal = rt
            .storage
            .proposals
            .get(&args.proposal_id)
            .ok_or_else(|| ModuleError::Revert(format!("unknown proposal {}", args.proposal_id)))?;
        Ok(encode_return(proposal))
    }
}

impl ModuleCode for DaoFacet {
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
        if selector == Selector::of(sig::PROPOSE) {
            self.propose(rt, ctx, input)
        } else if selector == Selector::of(sig::CAST_VOTE) {
            self.cast_vote(rt, ctx, input)
        } else if selector == Selector::of(sig::EXECUTE_PROPOSAL) {
            self.execute_proposal(rt, input)
        } else if selector == Selector::of(sig::PROPOSAL) {
            self.proposal(rt, input)
        } else {
            Err(ModuleError::UnknownSelector(selector))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
