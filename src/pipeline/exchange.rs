//! Per-request exchange state.
//!
//! An [`Exchange`] is created by the host for every response it runs through
//! the filter chain. Stages keep their private per-request state in typed
//! [`StageSlots`] and register teardown hooks that fire exactly once when the
//! exchange ends, whether it completed, was skipped or was aborted (dropped)
//! halfway through the body.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use super::RequestContext;

/// Typed per-stage state, one value per type.
#[derive(Default)]
pub struct StageSlots {
    slots: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl StageSlots {
    /// Store a value, returning the previous value of the same type.
    pub fn insert<T: Any + Send>(&mut self, value: T) -> Option<T> {
        self.slots
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T: Any + Send>(&self) -> Option<&T> {
        self.slots
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.slots
            .get_mut(&TypeId::of::<T>())
            .and_then(|slot| slot.downcast_mut::<T>())
    }

    pub fn remove<T: Any + Send>(&mut self) -> Option<T> {
        self.slots
            .remove(&TypeId::of::<T>())
            .and_then(|slot| slot.downcast::<T>().ok())
            .map(|slot| *slot)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn clear(&mut self) {
        self.slots.clear();
    }
}

type TeardownHook = Box<dyn FnOnce(&mut StageSlots) + Send>;

/// One request/response exchange as seen by the filter chain.
pub struct Exchange {
    context: RequestContext,
    slots: StageSlots,
    teardown: Vec<TeardownHook>,
    torn_down: bool,
}

impl Exchange {
    pub fn new(context: RequestContext) -> Self {
        Self {
            context,
            slots: StageSlots::default(),
            teardown: Vec::new(),
            torn_down: false,
        }
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn request_id(&self) -> &str {
        self.context.request_id()
    }

    pub fn slots(&self) -> &StageSlots {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut StageSlots {
        &mut self.slots
    }

    /// Register a hook to run when the exchange ends.
    ///
    /// Hooks run in reverse registration order. Registering after teardown
    /// runs the hook immediately.
    pub fn on_teardown<F>(&mut self, hook: F)
    where
        F: FnOnce(&mut StageSlots) + Send + 'static,
    {
        if self.torn_down {
            hook(&mut self.slots);
        } else {
            self.teardown.push(Box::new(hook));
        }
    }

    /// End the exchange: run teardown hooks and discard all stage state.
    ///
    /// Idempotent; the host calls it when the request finishes and `Drop`
    /// calls it again for aborted exchanges.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        while let Some(hook) = self.teardown.pop() {
            hook(&mut self.slots);
        }
        self.slots.clear();

        tracing::trace!(request_id = %self.context.request_id(), "Exchange torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

impl Drop for Exchange {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("request_id", &self.context.request_id())
            .field("slots", &self.slots.len())
            .field("teardown_hooks", &self.teardown.len())
            .field("torn_down", &self.torn_down)
            .finish()
    }
}
