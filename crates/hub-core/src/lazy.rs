//! Lazy component slots.
//!
//! A [`LazySlot`] is the host-side boundary around a code reference: it
//! starts in [`SlotState::Pending`] (the fallback), moves to `Ready` or
//! `Failed` once the resolver settles, and exposes its state through a
//! `watch` channel so consumers can react to the transition.
//!
//! Unmounting a slot while the load is in flight leaves the load running in
//! the resolver, but its result is never applied to the slot.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use hub_extension_sdk::code_ref::downcast_value;
use hub_extension_sdk::{ErasedCodeRef, LoadError};
use tokio::sync::watch;

use crate::resolver::CodeRefResolver;

/// Observable state of a lazy slot.
pub enum SlotState<T> {
    /// Resolution in flight; render the fallback.
    Pending,
    /// Resolved value.
    Ready(Arc<T>),
    /// Resolution failed; render an error placeholder.
    Failed(LoadError),
    /// The slot was torn down; nothing is rendered.
    Unmounted,
}

impl<T> SlotState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, SlotState::Pending)
    }

    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }

    pub fn value(&self) -> Option<&Arc<T>> {
        match self {
            SlotState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&LoadError> {
        match self {
            SlotState::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl<T> Clone for SlotState<T> {
    fn clone(&self) -> Self {
        match self {
            SlotState::Pending => SlotState::Pending,
            SlotState::Ready(value) => SlotState::Ready(Arc::clone(value)),
            SlotState::Failed(e) => SlotState::Failed(e.clone()),
            SlotState::Unmounted => SlotState::Unmounted,
        }
    }
}

impl<T> fmt::Debug for SlotState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotState::Pending => write!(f, "Pending"),
            SlotState::Ready(_) => write!(f, "Ready"),
            SlotState::Failed(e) => write!(f, "Failed({})", e),
            SlotState::Unmounted => write!(f, "Unmounted"),
        }
    }
}

/// Lazily resolved slot bound to one code reference.
pub struct LazySlot<T> {
    state: Arc<watch::Sender<SlotState<T>>>,
}

impl<T: Any + Send + Sync> LazySlot<T> {
    /// Mount a slot and start resolving `code_ref`.
    ///
    /// If the resolver already holds the value the slot starts `Ready`.
    /// Must be called from within a tokio runtime.
    pub fn mount(resolver: &CodeRefResolver, code_ref: &ErasedCodeRef) -> Self {
        let initial = match resolver.resolved(code_ref.id()).map(downcast_value::<T>) {
            Some(Ok(value)) => SlotState::Ready(value),
            Some(Err(e)) => SlotState::Failed(e),
            None => SlotState::Pending,
        };
        let already_settled = initial.is_settled();
        let (tx, _rx) = watch::channel(initial);
        let state = Arc::new(tx);

        if !already_settled {
            let resolver = resolver.clone();
            let code_ref = code_ref.clone();
            let target = Arc::clone(&state);
            tokio::spawn(async move {
                let next = match resolver.resolve_as::<T>(&code_ref).await {
                    Ok(value) => SlotState::Ready(value),
                    Err(e) => SlotState::Failed(e),
                };
                let applied = target.send_if_modified(|current| {
                    if matches!(current, SlotState::Unmounted) {
                        return false;
                    }
                    *current = next;
                    true
                });
                if !applied {
                    tracing::debug!(code_ref = %code_ref.id(), "Discarding result for unmounted slot");
                }
            });
        }

        Self { state }
    }
}

impl<T> LazySlot<T> {
    /// Current state.
    pub fn state(&self) -> SlotState<T> {
        self.state.borrow().clone()
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SlotState<T>> {
        self.state.subscribe()
    }

    /// Wait until the slot leaves `Pending`.
    pub async fn settled(&self) -> SlotState<T> {
        let mut rx = self.state.subscribe();
        loop {
            {
                let state = rx.borrow_and_update();
                if state.is_settled() {
                    return state.clone();
                }
            }
            if rx.changed().await.is_err() {
                return SlotState::Unmounted;
            }
        }
    }

    /// The resolved value, or `fallback` while pending or after failure.
    pub fn value_or(&self, fallback: Arc<T>) -> Arc<T> {
        self.state.borrow().value().cloned().unwrap_or(fallback)
    }

    /// Tear the slot down. Any later resolution is discarded.
    pub fn unmount(&self) {
        self.state.send_replace(SlotState::Unmounted);
    }

    pub fn is_mounted(&self) -> bool {
        !matches!(*self.state.borrow(), SlotState::Unmounted)
    }
}

impl<T> Drop for LazySlot<T> {
    fn drop(&mut self) {
        self.unmount();
    }
}
