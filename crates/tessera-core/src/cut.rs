//! # Cut Protocol
//!
//! The state-transition function over the selector registry: applies an
//! ordered batch of [`FacetCut`] instructions, emits the change
//! notification, and runs the optional one-shot initializer.
//!
//! Atomicity is provided by the dispatcher's staging snapshot: this module
//! never needs to undo anything itself - any error here (initializer
//! failures included) aborts the enclosing invocation and discards every
//! write of the batch.

use crate::errors::DiamondError;
use crate::events::{DiamondCutPayload, DiamondEvent};
use crate::registry;
use tessera_types::module::{CutAction, FacetCut};
use tessera_types::values::{Address, Bytes, Selector, U256};
use tracing::{debug, info};

use crate::dispatch::{CallContext, Runtime};

/// Applies a cut batch in order, then the optional initializer.
///
/// Precondition matrix per action:
/// - every cut must carry at least one selector;
/// - `init_target` and non-empty `init_data` must be present together;
/// - ADD: target must have code and must not be the dispatcher itself;
///   each selector must be unbound;
/// - REPLACE: target must have code; each selector must be bound, not to
///   the dispatcher, and not already to the target;
/// - REMOVE: target must be the zero address; each selector must be bound
///   and not owned by the dispatcher.
pub fn apply_cuts(
    rt: &mut Runtime<'_>,
    cuts: &[FacetCut],
    init_target: Option<Address>,
    init_data: &Bytes,
) -> Result<(), DiamondError> {
    if init_target.is_some() != !init_data.is_empty() {
        return Err(DiamondError::InvalidInitializationParameters);
    }

    for cut in cuts {
        if cut.selectors.is_empty() {
            return Err(DiamondError::SelectorNotSpecified);
        }
        match cut.action {
            CutAction::Add => add_selectors(rt, cut)?,
            CutAction::Replace => replace_selectors(rt, cut)?,
            CutAction::Remove => remove_selectors(rt, cut)?,
        }
        debug!(target = ?cut.target, action = ?cut.action, selectors = cut.selectors.len(), "applied cut");
    }

    rt.storage.emit(DiamondEvent::Cut(DiamondCutPayload {
        cuts: cuts.to_vec(),
        init_target,
        init_data: init_data.clone(),
    }));
    info!(
        cuts = cuts.len(),
        live_selectors = rt.storage.selector_count(),
        "diamond cut completed"
    );

    if let Some(target) = init_target {
        run_initializer(rt, target, init_data)?;
    }
    Ok(())
}

fn add_selectors(rt: &mut Runtime<'_>, cut: &FacetCut) -> Result<(), DiamondError> {
    for &selector in &cut.selectors {
        // The dispatcher's native operations can never be re-added.
        if cut.target == rt.self_address() {
            return Err(DiamondError::SelectorIsImmutable(selector));
        }
        if !rt.has_code(cut.target) {
            return Err(DiamondError::TargetHasNoCode(cut.target));
        }
        if registry::binding_of(rt.storage, selector).is_some() {
            return Err(DiamondError::SelectorAlreadyAdded(selector));
        }
        registry::append_selector(rt.storage, selector, cut.target)?;
    }
    Ok(())
}

fn replace_selectors(rt: &mut Runtime<'_>, cut: &FacetCut) -> Result<(), DiamondError> {
    for &selector in &cut.selectors {
        if cut.target == rt.self_address() {
            return Err(DiamondError::SelectorIsImmutable(selector));
        }
        if !rt.has_code(cut.target) {
            return Err(DiamondError::TargetHasNoCode(cut.target));
        }
        let (current, _) = registry::binding_of(rt.storage, selector)
            .ok_or(DiamondError::SelectorNotFound(selector))?;
        if current == rt.self_address() {
            return Err(DiamondError::SelectorIsImmutable(selector));
        }
        if current == cut.target {
            return Err(DiamondError::ReplaceTargetIsIdentical(selector));
        }
        registry::rebind_selector(rt.storage, selector, cut.target);
    }
    Ok(())
}

fn remove_selectors(rt: &mut Runtime<'_>, cut: &FacetCut) -> Result<(), DiamondError> {
    if !cut.target.is_zero() {
        return Err(DiamondError::RemoveTargetNotZeroAddress(cut.target));
    }
    for &selector in &cut.selectors {
        let (current, _) = registry::binding_of(rt.storage, selector)
            .ok_or(DiamondError::SelectorNotFound(selector))?;
        if current == rt.self_address() {
            return Err(DiamondError::SelectorIsImmutable(selector));
        }
        registry::remove_selector(rt.storage, selector);
    }
    Ok(())
}

/// One-shot forwarded call into the initializer target. The first four
/// bytes of `init_data` select the operation; the rest is its payload.
fn run_initializer(
    rt: &mut Runtime<'_>,
    target: Address,
    init_data: &Bytes,
) -> Result<(), DiamondError> {
    let data = init_data.as_slice();
    if data.len() < 4 {
        return Err(DiamondError::InvalidInitializationParameters);
    }
    let selector = Selector::new([data[0], data[1], data[2], data[3]]);
    let code = rt
        .code(target)
        .ok_or(DiamondError::TargetHasNoCode(target))?;
    let ctx = CallContext {
        caller: rt.self_address(),
        value: U256::zero(),
    };
    debug!(target = ?target, selector = ?selector, "running cut initializer");
    code.call(rt, &ctx, selector, &data[4..])
        .map_err(DiamondError::from)?;
    Ok(())
}

// =============================================================================
// MODULE INSTALLATION
// =============================================================================

/// Installer flow: query the module's self-description, validate that it
/// describes the module itself, and feed it to the cut protocol as a
/// one-element batch. Returns the number of selectors contributed.
pub fn install_module(rt: &mut Runtime<'_>, module: Address) -> Result<usize, DiamondError> {
    let code = rt
        .code(module)
        .ok_or_else(|| DiamondError::ModuleFacetsCallFailed {
            target: module,
            reason: "no code at address".to_string(),
        })?;
    let cut = code
        .manifest()
        .map_err(|e| DiamondError::ModuleFacetsCallFailed {
            target: module,
            reason: e.to_string(),
        })?;

    if cut.target != module {
        return Err(DiamondError::InvalidModuleManifest {
            target: module,
            reason: format!("manifest names {:?} instead of the module itself", cut.target),
        });
    }
    if cut.action != CutAction::Add {
        return Err(DiamondError::InvalidModuleManifest {
            target: module,
            reason: "manifest action must be ADD".to_string(),
        });
    }

    let contributed = cut.selectors.len();
    apply_cuts(rt, std::slice::from_ref(&cut), None, &Bytes::new())?;
    rt.storage.emit(DiamondEvent::ModuleInstalled {
        target: module,
        selectors: contributed,
    });
    info!(module = ?module, selectors = contributed, "module installed");
    Ok(contributed)
}
