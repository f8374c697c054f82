// src/transport/entropy.rs
//! Replaceable random source of the traced thread
//!
//! The transport draws frame masking keys from the thread's random source.
//! A traced program may install its own source (e.g. a seeded generator for
//! reproducible runs); if the transport consumed values from it, tracing
//! would change what the program observes. Every send therefore draws from
//! the pristine generator inside [`with_pristine_source`], which puts the
//! program's replacement back when it returns.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::cell::RefCell;

thread_local! {
    static PRISTINE: RefCell<StdRng> = RefCell::new(StdRng::from_entropy());
    static REPLACEMENT: RefCell<Option<Box<dyn RngCore>>> = RefCell::new(None);
}

/// Install `source` as this thread's random source, returning the previous replacement
pub fn replace_source(source: Box<dyn RngCore>) -> Option<Box<dyn RngCore>> {
    REPLACEMENT.with(|slot| slot.borrow_mut().replace(source))
}

/// Remove any replacement, returning it
pub fn clear_replacement() -> Option<Box<dyn RngCore>> {
    REPLACEMENT.with(|slot| slot.borrow_mut().take())
}

/// Whether a replacement source is currently installed
pub fn is_replaced() -> bool {
    REPLACEMENT.with(|slot| slot.borrow().is_some())
}

/// Next value from whichever source is installed
pub fn next_u32() -> u32 {
    let replaced = REPLACEMENT.with(|slot| slot.borrow_mut().as_mut().map(|rng| rng.next_u32()));
    match replaced {
        Some(value) => value,
        None => PRISTINE.with(|rng| rng.borrow_mut().next_u32()),
    }
}

/// Run `f` with the pristine generator installed, then reinstate the replacement
pub fn with_pristine_source<T>(f: impl FnOnce() -> T) -> T {
    let _scope = PristineScope::enter();
    f()
}

/// Holds the program's replacement aside until dropped
struct PristineScope {
    saved: Option<Box<dyn RngCore>>,
}

impl PristineScope {
    fn enter() -> Self {
        Self {
            saved: clear_replacement(),
        }
    }
}

impl Drop for PristineScope {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            REPLACEMENT.with(|slot| *slot.borrow_mut() = Some(saved));
        }
    }
}
