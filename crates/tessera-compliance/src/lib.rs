//! # tessera-compliance - Allow/Deny List Facet
//!
//! Administers the shared compliance lists every transfer-like operation
//! consults through `AppStorage::is_compliant`: denied accounts always
//! fail, and a non-empty allow list is exhaustive.

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use tessera_core::dispatch::{CallContext, Runtime};
use tessera_core::events::DiamondEvent;
use tessera_core::module::ModuleCode;
use tessera_types::codec::{decode_call, encode_return};
use tessera_types::module::{FacetCut, ModuleError};
use tessera_types::values::{Address, Selector};
use tracing::debug;

// =============================================================================
// OPERATION SIGNATURES
// =============================================================================

/// Operation signature strings (selectors derive from these).
pub mod sig {
    /// Add or drop an account on the allow list (admin).
    pub const SET_ALLOWED: &str = "setAllowed(address,bool)";
    /// Add or drop an account on the deny list (admin).
    pub const SET_DENIED: &str = "setDenied(address,bool)";
    /// Evaluate the compliance policy for one account.
    pub const CHECK_COMPLIANCE: &str = "checkCompliance(address)";
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Arguments of [`sig::SET_ALLOWED`] and [`sig::SET_DENIED`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SetListedArgs {
    /// Account to list or delist.
    pub account: Address,
    /// True to add, false to drop.
    pub listed: bool,
}

/// Arguments of [`sig::CHECK_COMPLIANCE`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CheckComplianceArgs {
    /// Account to evaluate.
    pub account: Address,
}

// =============================================================================
// FACET
// =============================================================================

/// The compliance facet.
pub struct ComplianceFacet {
    address: Address,
}

impl ComplianceFacet {
    /// Creates the facet for its deployed address.
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// The selectors this facet contributes.
    #[must_use]
    pub fn selectors() -> Vec<Selector> {
        vec![
            Selector::of(sig::SET_ALLOWED),
            Selector::of(sig::SET_DENIED),
            Selector::of(sig::CHECK_COMPLIANCE),
        ]
    }

    fn set_allowed(
        &self,
        rt: &mut Runtime<'_>,
        ctx: &CallContext,
        input: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        if !rt.storage.is_admin(ctx.caller) {
            return Err(ModuleError::Unauthorized(ctx.caller));
        }
        let args: SetListedArgs = decode_call(input)?;
        if args.listed {
            rt.storage.allowed.insert(args.account);
        } else {
            rt.storage.allowed.remove(&args.account);
        }
        rt.storage
            .emit(DiamondEvent::module("AllowListChanged", &args.account));
        debug!(account = ?args.account, listed = args.listed, "allow list updated");
        Ok(Vec::new())
    }

    fn set_denied(
        &self,
        rt: &mut Runtime<'_>,
        ctx: &CallContext,
        input: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        if !rt.storage.is_admin(ctx.caller) {
            return Err(ModuleError::Unauthorized(ctx.caller));
        }
        let args: SetListedArgs = decode_call(input)?;
        if args.listed {
            rt.storage.denied.insert(args.account);
        } else {
            rt.storage.denied.remove(&args.account);
        }
        rt.storage
            .emit(DiamondEvent::module("DenyListChanged", &args.account));
        debug!(account = ?args.account, listed = args.listed, "deny list updated");
        Ok(Vec::new())
    }

    fn check_compliance(&self, rt: &mut Runtime<'_>, input: &[u8]) -> Result<Vec<u8>, ModuleError> {
        let args: CheckComplianceArgs = decode_call(input)?;
        Ok(encode_return(&rt.storage.is_compliant(args.account)))
    }
}

impl ModuleCode for ComplianceFacet {
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
        if selector == Selector::of(sig::SET_ALLOWED) {
            self.set_allowed(rt, ctx, input)
        } else if selector == Selector::of(sig::SET_DENIED) {
            self.set_denied(rt, ctx, input)
        } else if selector == Selector::of(sig::CHECK_COMPLIANCE) {
            self.check_compliance(rt, input)
        } else {
            Err(ModuleError::UnknownSelector(selector))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
