//! The run-local "current context" binding.
//!
//! A generator run activates its context for the duration of the run; code
//! deep inside the run reads [`current`] without threading the context
//! through every call. The binding is a per-thread scope stack: it is
//! visible only on the activating logical thread, so concurrently running
//! generators never observe each other's binding. Scopes nest and must drop
//! in reverse activation order, which the RAII handle guarantees for any
//! code that does not leak it.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::generator::GeneratorContext;

thread_local! {
    static CURRENT: RefCell<Vec<Arc<GeneratorContext>>> = const { RefCell::new(Vec::new()) };
}

/// Scope handle restoring the previous binding on drop. Deliberately not
/// `Send`: the binding belongs to the activating thread.
pub struct ActivationScope {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

pub(crate) fn activate(context: Arc<GeneratorContext>) -> ActivationScope {
    CURRENT.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(context);
        ActivationScope {
            depth: stack.len(),
            _not_send: PhantomData,
        }
    })
}

/// The context of the innermost active run on this thread, if any.
pub fn current() -> Option<Arc<GeneratorContext>> {
    CURRENT.with(|stack| stack.borrow().last().cloned())
}

impl Drop for ActivationScope {
    fn drop(&mut self) {
        CURRENT.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(
                stack.len(),
                self.depth,
                "activation scopes must drop in reverse activation order"
            );
            stack.truncate(self.depth - 1);
        });
    }
}
