//! Change notification adapter.
//!
//! Bridges a reactive value source (a `watch` channel) into imperative
//! callbacks for consumers that are not reactive themselves, such as an
//! external registry that needs to hear about every change.
//!
//! `on_notify` receives the current value right away and again after every
//! change. `on_unmount` runs exactly once, when the handle is unmounted or
//! dropped, and no `on_notify` call happens after it.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

struct Callbacks<T> {
    on_notify: Box<dyn FnMut(T) + Send>,
    on_unmount: Option<Box<dyn FnOnce() + Send>>,
}

/// Handle owning a running notifier.
pub struct NotifyHandle<T> {
    callbacks: Arc<Mutex<Callbacks<T>>>,
    task: Option<JoinHandle<()>>,
}

/// Start forwarding `source` to `on_notify`.
///
/// Must be called from within a tokio runtime.
pub fn notify_on_change<T, N, U>(
    mut source: watch::Receiver<T>,
    on_notify: N,
    on_unmount: U,
) -> NotifyHandle<T>
where
    T: Clone + Send + Sync + 'static,
    N: FnMut(T) + Send + 'static,
    U: FnOnce() + Send + 'static,
{
    let callbacks = Arc::new(Mutex::new(Callbacks {
        on_notify: Box::new(on_notify),
        on_unmount: Some(Box::new(on_unmount)),
    }));

    let shared = Arc::clone(&callbacks);
    let task = tokio::spawn(async move {
        loop {
            let value = source.borrow_and_update().clone();
            {
                let mut cb = shared.lock();
                // Unmounted: on_unmount already ran.
                if cb.on_unmount.is_none() {
                    return;
                }
                (cb.on_notify)(value);
            }
            if source.changed().await.is_err() {
                tracing::debug!("Notify source closed");
                return;
            }
        }
    });

    NotifyHandle {
        callbacks,
        task: Some(task),
    }
}

impl<T> NotifyHandle<T> {
    /// Stop forwarding and run `on_unmount`.
    pub fn unmount(mut self) {
        self.teardown();
    }

    pub fn is_mounted(&self) -> bool {
        self.callbacks.lock().on_unmount.is_some()
    }

    fn teardown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        let on_unmount = self.callbacks.lock().on_unmount.take();
        if let Some(on_unmount) = on_unmount {
            on_unmount();
        }
    }
}

impl<T> Drop for NotifyHandle<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}
