//! # Dispatch / Fallback Router
//!
//! Resolves every inbound `(selector, argument bytes, attached value)` call
//! to a module and forwards it with delegated-execution semantics: the
//! module's code runs against the dispatcher's own storage, sees the
//! original caller, and its result or failure is relayed byte-for-byte.
//!
//! ## Transaction model
//!
//! [`Dispatcher::call`] stages a clone of the shared storage, runs the
//! whole invocation (nested forwards included) against the stage, and
//! commits only on full success. Any error discards the stage - there is
//! never an observable partial-failure state.
//!
//! ## Re-entrancy latch
//!
//! One boolean per top-level invocation. Guarded operations (cut entry
//! points, installation, and the mutating business operations) trip
//! [`DiamondError::ReentrantCall`] when a forwarded call re-enters guarded
//! logic before the first guarded frame completes.

use crate::cut;
use crate::errors::DiamondError;
use crate::events::DiamondEvent;
use crate::loupe;
use crate::module::{CodeRegistry, ModuleCode};
use crate::registry;
use crate::storage::AppStorage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tessera_types::codec::{decode_call, encode_call, encode_return};
use tessera_types::module::{FacetCut, ModuleError};
use tessera_types::values::{Address, Bytes, Selector, U256};
use tracing::{debug, warn};

/// Maximum nested forwarding depth for one top-level invocation.
pub const MAX_CALL_DEPTH: u16 = 64;

// =============================================================================
// CALL CONTEXT
// =============================================================================

/// Caller identity and attached value, preserved across forwarding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallContext {
    /// The original caller as the dispatcher saw it.
    pub caller: Address,
    /// Native value attached to the call.
    pub value: U256,
}

// =============================================================================
// NATIVE OPERATIONS
// =============================================================================

/// The dispatcher's own operations, bound to its identity at construction
/// and immutable thereafter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeOp {
    /// Apply a cut batch (admin, guarded).
    DiamondCut,
    /// Install a module via its self-description (admin, guarded).
    InstallModule,
    /// Set the unmatched-selector routing target (admin).
    SetFallbackAddress,
    /// Read the fallback routing target.
    FallbackAddress,
    /// Enumerate modules with their selector sets.
    Facets,
    /// Enumerate the selectors of one module.
    FacetFunctionSelectors,
    /// Enumerate distinct module addresses.
    FacetAddresses,
    /// Resolve one selector to its module.
    FacetAddress,
    /// Sweep the dispatcher's balance of a stray token to the deployer
    /// (admin).
    RescueTokens,
    /// Sweep the dispatcher's native balance to the deployer (admin).
    WithdrawNative,
}

impl NativeOp {
    /// All native operations, in binding order.
    pub const ALL: [NativeOp; 10] = [
        NativeOp::DiamondCut,
        NativeOp::InstallModule,
        NativeOp::SetFallbackAddress,
        NativeOp::FallbackAddress,
        NativeOp::Facets,
        NativeOp::FacetFunctionSelectors,
        NativeOp::FacetAddresses,
        NativeOp::FacetAddress,
        NativeOp::RescueTokens,
        NativeOp::WithdrawNative,
    ];

    /// The operation's signature string (selectors derive from this).
    #[must_use]
    pub const fn signature(self) -> &'static str {
        match self {
            Self::DiamondCut => "diamondCut((address,uint8,bytes4[])[],address,bytes)",
            Self::InstallModule => "installModule(address)",
            Self::SetFallbackAddress => "setFallbackAddress(address)",
            Self::FallbackAddress => "fallbackAddress()",
            Self::Facets => "facets()",
            Self::FacetFunctionSelectors => "facetFunctionSelectors(address)",
            Self::FacetAddresses => "facetAddresses()",
            Self::FacetAddress => "facetAddress(bytes4)",
            Self::RescueTokens => "rescueTokens(address)",
            Self::WithdrawNative => "withdrawNative()",
        }
    }

    /// The operation's selector.
    #[must_use]
    pub fn selector(self) -> Selector {
        Selector::of(self.signature())
    }
}

/// Selector table for the native operations, computed once per dispatcher.
#[derive(Clone, Debug)]
pub(crate) struct NativeTable {
    entries: Vec<(Selector, NativeOp)>,
}

impl NativeTable {
    fn new() -> Self {
        Self {
            entries: NativeOp::ALL.iter().map(|op| (op.selector(), *op)).collect(),
        }
    }

    fn resolve(&self, selector: Selector) -> Option<NativeOp> {
        self.entries
            .iter()
            .find(|(s, _)| *s == selector)
            .map(|(_, op)| *op)
    }
}

// -----------------------------------------------------------------------------
// Native argument payloads (bincode over the wire, like every facet op)
// -----------------------------------------------------------------------------

/// Arguments of [`NativeOp::DiamondCut`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiamondCutArgs {
    /// Cut batch to apply, in order.
    pub cuts: Vec<FacetCut>,
    /// Optional one-shot initializer target.
    pub init_target: Option<Address>,
    /// Initializer calldata (empty iff no target).
    pub init_data: Bytes,
}

/// Single-address argument (install, set-fallback, selectors-of, rescue).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AddressArg {
    /// The address argument.
    pub address: Address,
}

/// Single-selector argument (resolve selector to module).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SelectorArg {
    /// The selector argument.
    pub selector: Selector,
}

// =============================================================================
// RUNTIME
// =============================================================================

/// Per-invocation dispatch state: the staged storage, the host's code
/// space, the dispatcher identity, the re-entrancy latch, and the nesting
/// depth. Facet code receives `&mut Runtime` - that is the delegated
/// execution seam.
pub struct Runtime<'a> {
    /// The staged shared storage this invocation reads and writes.
    pub storage: &'a mut AppStorage,
    code: &'a CodeRegistry,
    natives: &'a NativeTable,
    self_address: Address,
    latch: bool,
    depth: u16,
}

impl<'a> Runtime<'a> {
    pub(crate) fn new(
        storage: &'a mut AppStorage,
        code: &'a CodeRegistry,
        natives: &'a NativeTable,
        self_address: Address,
    ) -> Self {
        Self {
            storage,
            code,
            natives,
            self_address,
            latch: false,
            depth: 0,
        }
    }

    /// The dispatcher's own identity.
    #[must_use]
    pub fn self_address(&self) -> Address {
        self.self_address
    }

    /// True when `address` has executable code (native check used by the
    /// cut protocol and the router).
    #[must_use]
    pub fn has_code(&self, address: Address) -> bool {
        self.code.has_code(address)
    }

    /// Code at `address`, if any.
    #[must_use]
    pub fn code(&self, address: Address) -> Option<Arc<dyn ModuleCode>> {
        self.code.get(address)
    }

    /// Runs `f` under the invocation's re-entrancy latch; facet flavor.
    ///
    /// The latch is cleared on both success and failure; on failure the
    /// whole invocation unwinds anyway.
    pub fn guarded<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ModuleError>,
    ) -> Result<T, ModuleError> {
        if self.latch {
            return Err(ModuleError::Reentrancy);
        }
        self.latch = true;
        let result = f(self);
        self.latch = false;
        result
    }

    /// Runs `f` under the re-entrancy latch; native-operation flavor.
    fn guarded_native<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, DiamondError>,
    ) -> Result<T, DiamondError> {
        if self.latch {
            return Err(DiamondError::ReentrantCall);
        }
        self.latch = true;
        let result = f(self);
        self.latch = false;
        result
    }

    /// Forwards a nested call through the router with the dispatcher as
    /// the caller the target sees. Used by facets (e.g. governance
    /// executing a proposal action).
    pub fn forward(&mut self, selector: Selector, input: &[u8]) -> Result<Vec<u8>, ModuleError> {
        let ctx = CallContext {
            caller: self.self_address,
            value: U256::zero(),
        };
        self.dispatch(&ctx, selector, input).map_err(|e| match e {
            DiamondError::ReentrantCall => ModuleError::Reentrancy,
            other => ModuleError::ForwardFailed(other.to_string()),
        })
    }

    /// Resolves `selector` and forwards the call, preserving `ctx`.
    pub(crate) fn dispatch(
        &mut self,
        ctx: &CallContext,
        selector: Selector,
        input: &[u8],
    ) -> Result<Vec<u8>, DiamondError> {
        if self.depth == MAX_CALL_DEPTH {
            return Err(DiamondError::CallDepthExceeded {
                depth: self.depth + 1,
                max: MAX_CALL_DEPTH,
            });
        }
        self.depth += 1;
        let result = self.dispatch_inner(ctx, selector, input);
        self.depth -= 1;
        result
    }

    fn dispatch_inner(
        &mut self,
        ctx: &CallContext,
        selector: Selector,
        input: &[u8],
    ) -> Result<Vec<u8>, DiamondError> {
        let target = match registry::binding_of(self.storage, selector) {
            Some((module, _)) => module,
            None => self.storage.fallback_address,
        };

        if target == self.self_address {
            return self.execute_native(ctx, selector, input);
        }

        let Some(code) = self.code.get(target) else {
            warn!(selector = ?selector, target = ?target, "dispatch target has no code");
            return Err(DiamondError::ImplementationIsNotContract(target));
        };

        debug!(selector = ?selector, target = ?target, caller = ?ctx.caller, "forwarding call");
        code.call(self, ctx, selector, input)
            .map_err(DiamondError::from)
    }

    // -------------------------------------------------------------------------
    // Native operation handlers
    // -------------------------------------------------------------------------

    fn require_admin(&self, ctx: &CallContext) -> Result<(), DiamondError> {
        if self.storage.is_admin(ctx.caller) {
            Ok(())
        } else {
            Err(DiamondError::Unauthorized(ctx.caller))
        }
    }

    fn execute_native(
        &mut self,
        ctx: &CallContext,
        selector: Selector,
        input: &[u8],
    ) -> Result<Vec<u8>, DiamondError> {
        let Some(op) = self.natives.resolve(selector) else {
            // A selector bound to the dispatcher identity always names a
            // native operation; reaching here means the fallback pointed
            // at the dispatcher itself.
            return Err(DiamondError::ImplementationIsNotContract(self.self_address));
        };
        debug!(op = ?op, caller = ?ctx.caller, "executing native operation");

        match op {
            NativeOp::DiamondCut => {
                self.require_admin(ctx)?;
                let args: DiamondCutArgs = decode_call(input)?;
                self.guarded_native(|rt| {
                    cut::apply_cuts(rt, &args.cuts, args.init_target, &args.init_data)
                })?;
                Ok(Vec::new())
            }
            NativeOp::InstallModule => {
                self.require_admin(ctx)?;
                let args: AddressArg = decode_call(input)?;
                let contributed =
                    self.guarded_native(|rt| cut::install_module(rt, args.address))?;
                Ok(encode_return(&contributed))
            }
            NativeOp::SetFallbackAddress => {
                self.require_admin(ctx)?;
                let args: AddressArg = decode_call(input)?;
                let previous = self.storage.fallback_address;
                self.storage.fallback_address = args.address;
                self.storage.emit(DiamondEvent::FallbackChanged {
                    previous,
                    current: args.address,
                });
                Ok(Vec::new())
            }
            NativeOp::FallbackAddress => Ok(encode_return(&self.storage.fallback_address)),
            NativeOp::Facets => {
                let facets = loupe::facets(self.storage)?;
                Ok(encode_return(&facets))
            }
            NativeOp::FacetFunctionSelectors => {
                let args: AddressArg = decode_call(input)?;
                let selectors = loupe::facet_function_selectors(self.storage, args.address)?;
                Ok(encode_return(&selectors))
            }
            NativeOp::FacetAddresses => {
                let addresses = loupe::facet_addresses(self.storage);
                Ok(encode_return(&addresses))
            }
            NativeOp::FacetAddress => {
                let args: SelectorArg = decode_call(input)?;
                let address = loupe::facet_address(self.storage, args.selector);
                Ok(encode_return(&address))
            }
            NativeOp::RescueTokens => {
                self.require_admin(ctx)?;
                let args: AddressArg = decode_call(input)?;
                let amount = self
                    .storage
                    .token_balance(args.address, self.self_address);
                let deployer = self.storage.deployer;
                if !amount.is_zero() {
                    let debited =
                        self.storage
                            .debit_token(args.address, self.self_address, amount);
                    debug_assert!(debited);
                    self.storage.credit_token(args.address, deployer, amount);
                }
                Ok(encode_return(&amount))
            }
            NativeOp::WithdrawNative => {
                self.require_admin(ctx)?;
                let amount = self.storage.native_balance;
                self.storage.native_balance = U256::zero();
                let deployer = self.storage.deployer;
                let credit = self.storage.credits.entry(deployer).or_default();
                *credit = credit.saturating_add(amount);
                Ok(encode_return(&amount))
            }
        }
    }
}

// =============================================================================
// DISPATCHER
// =============================================================================

/// The single externally-addressed entity: owns the shared storage region,
/// the native operation table, and the host code space, and routes every
/// call.
pub struct Dispatcher {
    address: Address,
    code: CodeRegistry,
    natives: NativeTable,
    storage: AppStorage,
}

impl Dispatcher {
    /// Constructs the dispatcher and its storage region, binding the native
    /// operations to the dispatcher's own identity (making them immutable
    /// to every later cut).
    ///
    /// This is the one construction point of the shared storage region.
    #[must_use]
    pub fn new(address: Address, deployer: Address) -> Self {
        let natives = NativeTable::new();
        let mut storage = AppStorage::new(address, deployer);
        for (selector, _) in &natives.entries {
            // Infallible: the native table is far below the 16-bit ceiling.
            let bound = registry::append_selector(&mut storage, *selector, address);
            debug_assert!(bound.is_ok());
        }
        storage.initialized = true;
        Self {
            address,
            code: CodeRegistry::new(),
            natives,
            storage,
        }
    }

    /// The dispatcher's external identity.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Read access to the shared storage region.
    #[must_use]
    pub fn storage(&self) -> &AppStorage {
        &self.storage
    }

    /// Direct write access to the shared storage region, bypassing the
    /// per-invocation staging. For deployment seeding and test setup only;
    /// dispatched code must never hold this.
    #[must_use]
    pub fn storage_mut(&mut self) -> &mut AppStorage {
        &mut self.storage
    }

    /// Deploys module code into the host code space. Deployment alone binds
    /// nothing; selectors appear only through the cut protocol.
    pub fn register_code(&mut self, address: Address, code: Arc<dyn ModuleCode>) {
        self.code.register(address, code);
    }

    /// Top-level invocation entry: stages the storage, dispatches, commits
    /// on success, discards on failure.
    pub fn call(
        &mut self,
        caller: Address,
        value: U256,
        selector: Selector,
        input: &[u8],
    ) -> Result<Vec<u8>, DiamondError> {
        let mut staged = self.storage.clone();
        staged.native_balance = staged.native_balance.saturating_add(value);

        let ctx = CallContext { caller, value };
        let mut rt = Runtime::new(&mut staged, &self.code, &self.natives, self.address);
        match rt.dispatch(&ctx, selector, input) {
            Ok(output) => {
                self.storage = staged;
                Ok(output)
            }
            Err(err) => {
                debug!(selector = ?selector, error = %err, "invocation rolled back");
                Err(err)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Typed administrative surface (sugar over the byte-level dispatch path)
    // -------------------------------------------------------------------------

    /// Applies a cut batch (admin, guarded).
    pub fn diamond_cut(
        &mut self,
        caller: Address,
        cuts: Vec<FacetCut>,
        init_target: Option<Address>,
        init_data: Bytes,
    ) -> Result<(), DiamondError> {
        let input = encode_call(&DiamondCutArgs {
            cuts,
            init_target,
            init_data,
        });
        self.call(caller, U256::zero(), NativeOp::DiamondCut.selector(), &input)
            .map(|_| ())
    }

    /// Installs a module through its self-description (admin, guarded).
    /// Returns the number of selectors it contributed.
    pub fn install_module(
        &mut self,
        caller: Address,
        module: Address,
    ) -> Result<usize, DiamondError> {
        let input = encode_call(&AddressArg { address: module });
        let output = self.call(
            caller,
            U256::zero(),
            NativeOp::InstallModule.selector(),
            &input,
        )?;
        tessera_types::codec::decode_return(&output).map_err(DiamondError::from)
    }

    /// Sets the unmatched-selector routing target (admin).
    pub fn set_fallback_address(
        &mut self,
        caller: Address,
        fallback: Address,
    ) -> Result<(), DiamondError> {
        let input = encode_call(&AddressArg { address: fallback });
        self.call(
            caller,
            U256::zero(),
            NativeOp::SetFallbackAddress.selector(),
            &input,
        )
        .map(|_| ())
    }

    /// Current fallback routing target (zero when unset).
    #[must_use]
    pub fn fallback_address(&self) -> Address {
        self.storage.fallback_address
    }

    /// Sweeps the dispatcher's balance of `token` to the deployer (admin).
    /// Returns the swept amount.
    pub fn rescue_tokens(&mut self, caller: Address, token: Address) -> Result<U256, DiamondError> {
        let input = encode_call(&AddressArg { address: token });
        let output = self.call(
            caller,
            U256::zero(),
            NativeOp::RescueTokens.selector(),
            &input,
        )?;
        tessera_types::codec::decode_return(&output).map_err(DiamondError::from)
    }

    /// Sweeps the native balance to the deployer's credit (admin). Returns
    /// the swept amount.
    pub fn withdraw_native(&mut self, caller: Address) -> Result<U256, DiamondError> {
        let output = self.call(
            caller,
            U256::zero(),
            NativeOp::WithdrawNative.selector(),
            &[],
        )?;
        tessera_types::codec::decode_return(&output).map_err(DiamondError::from)
    }

    // -------------------------------------------------------------------------
    // Read-side reflection
    // -------------------------------------------------------------------------

    /// Enumerates all modules with their selector sets.
    pub fn facets(&self) -> Result<Vec<loupe::FacetInfo>, DiamondError> {
        loupe::facets(&self.storage)
    }

    /// Enumerates the selectors bound to one module.
    pub fn facet_function_selectors(
        &self,
        module: Address,
    ) -> Result<Vec<Selector>, DiamondError> {
        loupe::facet_function_selectors(&self.storage, module)
    }

    /// Enumerates all distinct module addresses.
    #[must_use]
    pub fn facet_addresses(&self) -> Vec<Address> {
        loupe::facet_addresses(&self.storage)
    }

    /// Resolves one selector to its bound module (zero when unbound).
    #[must_use]
    pub fn facet_address(&self, selector: Selector) -> Address {
        loupe::facet_address(&self.storage, selector)
    }
}

// =============================================================================
// TESTS
// =============================================================================
