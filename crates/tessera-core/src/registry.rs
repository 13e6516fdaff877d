//! # Selector Registry & Directory Codec
//!
//! Bit-exact packing between `(selector, module, position)` triples and the
//! two stored representations:
//!
//! - **Binding word** (32 bytes): module address in the high-order 160 bits
//!   (bytes 0..20), selector position as a big-endian u16 in the low-order
//!   16 bits (bytes 30..32). A zero module address means "unbound".
//! - **Directory slot** (32 bytes): 8 four-byte selectors per slot, selector
//!   `i` at byte offset `4 * (i % 8)` of slot `i / 8`. Writing one selector
//!   never disturbs its seven slot-mates.
//!
//! The codec functions are pure; the registry mutators at the bottom apply
//! them to an [`AppStorage`] while preserving the directory invariant:
//! `selector_at(i)` for `i < selector_count` is exactly the selector whose
//! binding word stores position `i`. Removal is swap-compacting, so
//! enumeration order is NOT stable across removals.

use crate::errors::DiamondError;
use crate::storage::AppStorage;
use tessera_types::values::{Address, Selector};

/// Selectors packed into one 32-byte directory slot.
pub const SELECTORS_PER_SLOT: usize = 8;

/// Maximum number of live selectors (positions are 16-bit ordinals).
pub const MAX_SELECTORS: u16 = u16::MAX;

// =============================================================================
// BINDING WORD CODEC
// =============================================================================

/// Packs a module address and directory position into one binding word.
#[must_use]
pub fn encode_binding(module: Address, position: u16) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[..20].copy_from_slice(module.as_bytes());
    word[30..].copy_from_slice(&position.to_be_bytes());
    word
}

/// Unpacks a binding word. A zero module address signals "unbound".
#[must_use]
pub fn decode_binding(word: &[u8; 32]) -> (Address, u16) {
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&word[..20]);
    let position = u16::from_be_bytes([word[30], word[31]]);
    (Address::new(addr), position)
}

// =============================================================================
// DIRECTORY SLOT CODEC
// =============================================================================

/// Reads the selector at directory index `index`.
///
/// # Panics
///
/// Panics if the backing slot does not exist; callers must keep `index`
/// below the live selector count.
#[must_use]
pub fn selector_at(slots: &[[u8; 32]], index: u16) -> Selector {
    let slot = &slots[index as usize / SELECTORS_PER_SLOT];
    let offset = (index as usize % SELECTORS_PER_SLOT) * 4;
    Selector::new([
        slot[offset],
        slot[offset + 1],
        slot[offset + 2],
        slot[offset + 3],
    ])
}

/// Writes `selector` at directory index `index`, growing the slot vector as
/// needed. Only the four bytes of that index are touched.
pub fn write_selector_at(slots: &mut Vec<[u8; 32]>, index: u16, selector: Selector) {
    let slot_index = index as usize / SELECTORS_PER_SLOT;
    while slots.len() <= slot_index {
        slots.push([0u8; 32]);
    }
    let offset = (index as usize % SELECTORS_PER_SLOT) * 4;
    slots[slot_index][offset..offset + 4].copy_from_slice(selector.as_bytes());
}

/// Shrinks the directory to `new_count` live selectors: zeroes the freed
/// sub-field and drops any fully unused trailing slot.
pub fn truncate_directory(slots: &mut Vec<[u8; 32]>, new_count: u16) {
    let needed_slots = (new_count as usize).div_ceil(SELECTORS_PER_SLOT);
    slots.truncate(needed_slots);
    if new_count as usize % SELECTORS_PER_SLOT != 0 {
        // Zero the freed four bytes of the trailing, partially-filled slot.
        let offset = (new_count as usize % SELECTORS_PER_SLOT) * 4;
        if let Some(last) = slots.last_mut() {
            last[offset..offset + 4].copy_from_slice(&[0u8; 4]);
        }
    }
}

// =============================================================================
// REGISTRY MUTATORS
// =============================================================================

/// Resolves a selector to its bound module and position. `None` when the
/// selector is unbound.
#[must_use]
pub fn binding_of(storage: &AppStorage, selector: Selector) -> Option<(Address, u16)> {
    let word = storage.bindings.get(&selector)?;
    let (module, position) = decode_binding(word);
    if module.is_zero() {
        None
    } else {
        Some((module, position))
    }
}

/// Appends an unbound selector to the end of the directory and writes its
/// binding. Fails when the 16-bit position space is exhausted.
pub fn append_selector(
    storage: &mut AppStorage,
    selector: Selector,
    module: Address,
) -> Result<(), DiamondError> {
    if storage.selector_count == MAX_SELECTORS {
        return Err(DiamondError::SelectorCapacityExceeded { max: MAX_SELECTORS });
    }
    let position = storage.selector_count;
    write_selector_at(&mut storage.directory, position, selector);
    storage
        .bindings
        .insert(selector, encode_binding(module, position));
    storage.selector_count += 1;
    Ok(())
}

/// Rebinds an existing selector to a new module, leaving its directory
/// position untouched.
pub fn rebind_selector(storage: &mut AppStorage, selector: Selector, module: Address) {
    if let Some(word) = storage.bindings.get_mut(&selector) {
        let (_, position) = decode_binding(word);
        *word = encode_binding(module, position);
    }
}

/// Removes a bound selector with swap-compacting semantics: the last live
/// directory entry moves into the freed position (its stored position is
/// updated to match), then the count shrinks by one.
pub fn remove_selector(storage: &mut AppStorage, selector: Selector) {
    let Some((_, position)) = binding_of(storage, selector) else {
        return;
    };
    let last_position = storage.selector_count - 1;
    if position != last_position {
        let moved = selector_at(&storage.directory, last_position);
        write_selector_at(&mut storage.directory, position, moved);
        if let Some(word) = storage.bindings.get_mut(&moved) {
            let (module, _) = decode_binding(word);
            *word = encode_binding(module, position);
        }
    }
    storage.bindings.remove(&selector);
    storage.selector_count -= 1;
    truncate_directory(&mut storage.directory, storage.selector_count);
}

// =============================================================================
// TESTS
// =============================================================================
