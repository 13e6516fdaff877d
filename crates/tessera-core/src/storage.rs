//! # Shared Storage Region
//!
//! The single application-state value every module reads and writes.
//!
//! ## Access discipline
//!
//! There is exactly one construction point (`Dispatcher::new` builds the
//! [`AppStorage`] via [`AppStorage::new`]) and the value lives for the
//! lifetime of the dispatcher. Every component - the registry, the cut
//! protocol, the router, and all facets - receives `&mut AppStorage` (never
//! a copy) through the dispatch runtime. The only copies ever made are the
//! per-invocation staging snapshots the dispatcher uses for its
//! all-or-nothing commit discipline.
//!
//! The region is identified by [`APP_STORAGE_SLOT`], a collision-resistant
//! constant derived from a namespace string; it tags serialized snapshots
//! so a foreign state blob can never be mistaken for this layout.

use crate::events::DiamondEvent;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tessera_types::hashing::keccak256;
use tessera_types::values::{Address, Bytes, Hash, Selector, U256};

/// Namespace string hashed into [`APP_STORAGE_SLOT`].
pub const APP_STORAGE_NAMESPACE: &str = "tessera.app.storage";

/// The fixed, collision-resistant identifier of the shared storage region.
#[must_use]
pub fn app_storage_slot() -> Hash {
    keccak256(APP_STORAGE_NAMESPACE.as_bytes())
}

// =============================================================================
// BUSINESS RECORDS
// =============================================================================

/// A tokenized real-world asset. Balances are semi-fungible: every asset id
/// has its own fungible balance space in [`AppStorage::holdings`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Asset id (assigned from [`AppStorage::next_asset_id`]).
    pub id: u64,
    /// Human-readable name.
    pub name: String,
    /// Total minted supply.
    pub total_supply: U256,
    /// Reference unit price (used by the marketplace as a default).
    pub price: U256,
    /// Account that created the asset.
    pub issuer: Address,
}

/// An active marketplace listing. The listed amount is held in escrow: it
/// is debited from the seller's holdings when the listing is created and
/// only re-credited on cancel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    /// Listing id.
    pub id: u64,
    /// Asset being sold.
    pub asset_id: u64,
    /// Seller account.
    pub seller: Address,
    /// Escrowed amount.
    pub amount: U256,
    /// Price per unit in native value.
    pub price_per_unit: U256,
}

/// A staking position in the utility token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stake {
    /// Currently staked amount.
    pub amount: U256,
    /// Epoch at which rewards last settled.
    pub since_epoch: u64,
    /// Rewards settled but not yet claimed.
    pub accrued: U256,
}

/// A governance proposal. Vote weight is the voter's staked amount at vote
/// time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Proposal id.
    pub id: u64,
    /// Account that created the proposal.
    pub proposer: Address,
    /// Free-form description.
    pub description: String,
    /// Accumulated stake voting in favor.
    pub votes_for: U256,
    /// Accumulated stake voting against.
    pub votes_against: U256,
    /// Accounts that have voted (double votes rejected).
    pub voters: BTreeSet<Address>,
    /// Whether the proposal has been executed.
    pub executed: bool,
    /// Optional on-execution action, forwarded through the dispatcher.
    pub action: Option<ProposalAction>,
}

/// An operation a passed proposal forwards through the dispatcher on
/// execution. The dispatcher itself is the caller the target sees, which is
/// what lets governance reach admin-gated operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalAction {
    /// Operation to invoke.
    pub selector: Selector,
    /// bincode-encoded argument payload.
    pub input: Bytes,
}

// =============================================================================
// APP STORAGE
// =============================================================================

/// The shared storage region (singleton per dispatcher).
///
/// Core bookkeeping fields are `pub(crate)` and mutated only by the
/// registry/cut/dispatch modules; business state is `pub` because facets
/// have unrestricted access to all of it (access control is each facet's
/// own responsibility).
///
/// `Clone` exists solely for the dispatcher's per-invocation staging
/// snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppStorage {
    // -------------------------------------------------------------------------
    // Dispatch core
    // -------------------------------------------------------------------------
    /// Packed selector → (module, position) binding words.
    pub(crate) bindings: HashMap<Selector, [u8; 32]>,
    /// Dense selector directory, 8 selectors per 32-byte slot.
    pub(crate) directory: Vec<[u8; 32]>,
    /// Number of live selectors (dense prefix of the directory).
    pub(crate) selector_count: u16,
    /// Set once by the construction path; never cleared.
    pub initialized: bool,
    /// Identity of the dispatcher that owns this region.
    pub self_address: Address,
    /// Account that deployed the dispatcher (administrative capability).
    pub deployer: Address,
    /// Routing target for selectors with no binding. Zero means unset.
    pub fallback_address: Address,
    /// Native value held by the dispatcher.
    pub native_balance: U256,
    /// Append-only event log (rolled back with failed invocations).
    pub events: Vec<DiamondEvent>,

    // -------------------------------------------------------------------------
    // Asset tokenization
    // -------------------------------------------------------------------------
    /// Assets by id.
    pub assets: BTreeMap<u64, Asset>,
    /// Next asset id to assign.
    pub next_asset_id: u64,
    /// Semi-fungible balances: (asset id, holder) → amount.
    pub holdings: BTreeMap<(u64, Address), U256>,

    // -------------------------------------------------------------------------
    // Marketplace
    // -------------------------------------------------------------------------
    /// Active listings by id.
    pub listings: BTreeMap<u64, Listing>,
    /// Next listing id to assign.
    pub next_listing_id: u64,
    /// Withdrawable native-value credits per account (sellers, refunds,
    /// profit claims, admin sweeps).
    pub credits: BTreeMap<Address, U256>,

    // -------------------------------------------------------------------------
    // Token ledger (utility/governance token + any stray tokens)
    // -------------------------------------------------------------------------
    /// (token, holder) → balance.
    pub token_balances: BTreeMap<(Address, Address), U256>,
    /// The platform's own utility token identity.
    pub utility_token: Address,

    // -------------------------------------------------------------------------
    // Staking
    // -------------------------------------------------------------------------
    /// Staking positions per account.
    pub stakes: BTreeMap<Address, Stake>,
    /// Sum of all staked amounts (DAO quorum base).
    pub total_staked: U256,
    /// Current reward epoch (advanced by an admin operation).
    pub current_epoch: u64,
    /// Reward per staked unit per epoch.
    pub reward_rate: U256,

    // -------------------------------------------------------------------------
    // Governance
    // -------------------------------------------------------------------------
    /// Proposals by id.
    pub proposals: BTreeMap<u64, Proposal>,
    /// Next proposal id to assign.
    pub next_proposal_id: u64,

    // -------------------------------------------------------------------------
    // Profit distribution
    // -------------------------------------------------------------------------
    /// Claimable profit per (asset id, holder).
    pub claimable_profits: BTreeMap<(u64, Address), U256>,
    /// When true, distribute/claim operations revert.
    pub profits_paused: bool,

    // -------------------------------------------------------------------------
    // Compliance
    // -------------------------------------------------------------------------
    /// Allow list. When non-empty, only listed accounts pass compliance.
    pub allowed: BTreeSet<Address>,
    /// Deny list. Listed accounts never pass compliance.
    pub denied: BTreeSet<Address>,

    // -------------------------------------------------------------------------
    // Price oracle
    // -------------------------------------------------------------------------
    /// Oracle price per token, in native value per unit.
    pub prices: BTreeMap<Address, U256>,
}

impl AppStorage {
    /// The platform utility token identity, fixed at construction.
    pub const UTILITY_TOKEN: Address = Address(*b"tessera-utility-tok\x01");

    /// Default staking reward per unit per epoch.
    pub const DEFAULT_REWARD_RATE: u64 = 1;

    /// Creates the storage region. Called exactly once, by the dispatcher's
    /// constructor.
    #[must_use]
    pub fn new(self_address: Address, deployer: Address) -> Self {
        Self {
            bindings: HashMap::new(),
            directory: Vec::new(),
            selector_count: 0,
            initialized: false,
            self_address,
            deployer,
            fallback_address: Address::ZERO,
            native_balance: U256::zero(),
            events: Vec::new(),
            assets: BTreeMap::new(),
            next_asset_id: 1,
            holdings: BTreeMap::new(),
            listings: BTreeMap::new(),
            next_listing_id: 1,
            credits: BTreeMap::new(),
            token_balances: BTreeMap::new(),
            utility_token: Self::UTILITY_TOKEN,
            stakes: BTreeMap::new(),
            total_staked: U256::zero(),
            current_epoch: 0,
            reward_rate: U256::from(Self::DEFAULT_REWARD_RATE),
            proposals: BTreeMap::new(),
            next_proposal_id: 1,
            claimable_profits: BTreeMap::new(),
            profits_paused: false,
            allowed: BTreeSet::new(),
            denied: BTreeSet::new(),
            prices: BTreeMap::new(),
        }
    }

    /// Number of live selectors in the directory.
    #[must_use]
    pub fn selector_count(&self) -> u16 {
        self.selector_count
    }

    /// Administrative capability check: the deployer, or the dispatcher
    /// itself (which is how governance-executed actions reach admin
    /// operations).
    #[must_use]
    pub fn is_admin(&self, caller: Address) -> bool {
        caller == self.deployer || caller == self.self_address
    }

    /// Compliance policy shared by assets and marketplace: denied accounts
    /// never pass; when the allow list is non-empty it is exhaustive.
    #[must_use]
    pub fn is_compliant(&self, account: Address) -> bool {
        if self.denied.contains(&account) {
            return false;
        }
        self.allowed.is_empty() || self.allowed.contains(&account)
    }

    /// Balance of `holder` for asset `asset_id` (zero if never credited).
    #[must_use]
    pub fn holding(&self, asset_id: u64, holder: Address) -> U256 {
        self.holdings
            .get(&(asset_id, holder))
            .copied()
            .unwrap_or_default()
    }

    /// Balance of `holder` in `token` (zero if never credited).
    #[must_use]
    pub fn token_balance(&self, token: Address, holder: Address) -> U256 {
        self.token_balances
            .get(&(token, holder))
            .copied()
            .unwrap_or_default()
    }

    /// Credits `amount` of `token` to `holder`.
    pub fn credit_token(&mut self, token: Address, holder: Address, amount: U256) {
        let entry = self
            .token_balances
            .entry((token, holder))
            .or_insert_with(U256::zero);
        *entry = entry.saturating_add(amount);
    }

    /// Debits `amount` of `token` from `holder`. Returns false (and leaves
    /// the balance untouched) when the balance is insufficient.
    #[must_use]
    pub fn debit_token(&mut self, token: Address, holder: Address, amount: U256) -> bool {
        match self.token_balances.get_mut(&(token, holder)) {
            Some(balance) if *balance >= amount => {
                *balance -= amount;
                if balance.is_zero() {
                    self.token_balances.remove(&(token, holder));
                }
                true
            }
            _ => false,
        }
    }

    /// Appends an event to the log.
    pub fn emit(&mut self, event: DiamondEvent) {
        self.events.push(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================
