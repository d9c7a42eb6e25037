//! Tracking Context
//!
//! The tracking context records which effect is currently running and
//! whether reads should subscribe it. Reads performed outside any effect,
//! reads performed by a stopped effect's manual run, and reads inside
//! [`Runtime::untracked`](crate::Runtime::untracked) must not subscribe
//! anything.
//!
//! # Implementation
//!
//! Each [`Runtime`](crate::Runtime) owns a stack of entries. Entering a
//! context pushes an entry and returns a guard; dropping the guard pops it.
//! Nested effects (a parent render effect mounting a child component, a
//! computed read inside an effect) therefore restore the outer effect when
//! they finish, even if the computation panics.

use std::rc::Rc;

use super::effect::EffectInner;
use super::runtime::RuntimeInner;

/// An entry in the tracking stack.
pub(crate) struct ContextEntry {
    /// The effect whose computation is executing, if any.
    pub(crate) effect: Option<Rc<EffectInner>>,
    /// Whether reads in this entry subscribe `effect`.
    pub(crate) should_track: bool,
}

/// Guard that pops the context entry when dropped.
pub(crate) struct ContextGuard {
    runtime: Rc<RuntimeInner>,
    depth: usize,
}

impl ContextGuard {
    /// Push a new entry.
    pub(crate) fn enter(
        runtime: &Rc<RuntimeInner>,
        effect: Option<Rc<EffectInner>>,
        should_track: bool,
    ) -> Self {
        let mut stack = runtime.stack.borrow_mut();
        stack.push(ContextEntry {
            effect,
            should_track,
        });
        let depth = stack.len();
        drop(stack);

        Self {
            runtime: Rc::clone(runtime),
            depth,
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let mut stack = self.runtime.stack.borrow_mut();

        // Guards are strictly nested; anything else is a bookkeeping bug.
        debug_assert_eq!(
            stack.len(),
            self.depth,
            "tracking context mismatch: expected depth {}, got {}",
            self.depth,
            stack.len()
        );
        stack.pop();
    }
}
