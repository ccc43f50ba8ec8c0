//! Action unit: one async operation plus its loading/error/result state.
//!
//! An [`Action`] wraps an operation `I -> Future<Result<O>>`. Calling
//! [`trigger`](Action::trigger) updates the state synchronously (loading on,
//! error cleared) and returns a future that runs the operation and settles
//! the state.
//!
//! Overlapping triggers are allowed. Each trigger takes a sequence number and
//! only the most recent one may settle the shared state; older completions
//! still resolve their own future but leave the state alone. After
//! [`unmount`](Action::unmount) no settlement touches the state.

use crate::{Error, Fields, Query, RecordId};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::Result;

/// Type-erased operation.
pub type Operation<I, O> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<O>> + Send + Sync>;

/// Callback invoked with every applied success.
pub type OnSuccess<O> = Arc<dyn Fn(&O) + Send + Sync>;

/// Input that can be completed from configured defaults.
pub trait Params: Clone + Default + Send + Sync + 'static {
    /// Fill in whatever `self` leaves unset from `defaults`. Caller input wins.
    fn merge_defaults(self, defaults: &Self) -> Self;
}

impl Params for () {
    fn merge_defaults(self, _defaults: &Self) -> Self {}
}

impl Params for Fields {
    fn merge_defaults(self, defaults: &Self) -> Self {
        let mut merged = defaults.clone();
        merged.extend(self);
        merged
    }
}

impl Params for Value {
    fn merge_defaults(self, defaults: &Self) -> Self {
        match (self, defaults) {
            (Value::Null, defaults) => defaults.clone(),
            (Value::Object(input), Value::Object(defaults)) => {
                Value::Object(input.merge_defaults(defaults))
            }
            (input, _) => input,
        }
    }
}

impl Params for RecordId {
    fn merge_defaults(self, defaults: &Self) -> Self {
        if self.is_empty() {
            defaults.clone()
        } else {
            self
        }
    }
}

impl Params for Query {
    fn merge_defaults(self, defaults: &Self) -> Self {
        self.merged_over(defaults)
    }
}

/// Observable state of an action.
///
/// `error` and `result` are never both set.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionState<O> {
    pub loading: bool,
    pub error: Option<Error>,
    pub result: Option<O>,
}

impl<O> Default for ActionState<O> {
    fn default() -> Self {
        Self {
            loading: false,
            error: None,
            result: None,
        }
    }
}

/// Options for [`Action::with_config`].
pub struct ActionConfig<I, O> {
    pub defaults: Option<I>,
    pub auto_trigger: bool,
    pub on_success: Option<OnSuccess<O>>,
}

impl<I, O> Default for ActionConfig<I, O> {
    fn default() -> Self {
        Self {
            defaults: None,
            auto_trigger: false,
            on_success: None,
        }
    }
}

impl<I, O> ActionConfig<I, O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merged under every trigger's input.
    pub fn defaults(mut self, defaults: I) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Fire once with the defaults as soon as the action is created.
    pub fn auto_trigger(mut self) -> Self {
        self.auto_trigger = true;
        self
    }

    pub fn on_success(mut self, callback: impl Fn(&O) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }
}

struct Inner<I, O> {
    label: String,
    operation: Operation<I, O>,
    defaults: Option<I>,
    on_success: Option<OnSuccess<O>>,
    state: watch::Sender<ActionState<O>>,
    seq: AtomicU64,
    alive: AtomicBool,
}

impl<I, O: Clone> Inner<I, O> {
    fn is_current(&self, seq: u64) -> bool {
        self.alive.load(Ordering::Acquire) && self.seq.load(Ordering::Acquire) == seq
    }

    fn settle(&self, seq: u64, outcome: &Result<O>) {
        if !self.alive.load(Ordering::Acquire) {
            tracing::debug!(action = %self.label, seq, "settled after unmount, ignored");
            return;
        }
        if !self.is_current(seq) {
            tracing::warn!(action = %self.label, seq, "discarding stale completion");
            return;
        }

        match outcome {
            Ok(value) => {
                self.state.send_modify(|state| {
                    state.loading = false;
                    state.error = None;
                    state.result = Some(value.clone());
                });
                tracing::debug!(action = %self.label, seq, "settled ok");
                if let Some(callback) = &self.on_success {
                    callback(value);
                }
            }
            Err(err) => {
                self.state.send_modify(|state| {
                    state.loading = false;
                    state.error = Some(err.clone());
                    state.result = None;
                });
                tracing::debug!(action = %self.label, seq, error = %err, "settled with error");
            }
        }
    }
}

/// Clears `loading` if a trigger future is dropped before it settles.
struct SettleGuard<I, O: Clone> {
    inner: Arc<Inner<I, O>>,
    seq: u64,
    armed: bool,
}

impl<I, O: Clone> Drop for SettleGuard<I, O> {
    fn drop(&mut self) {
        if self.armed && self.inner.is_current(self.seq) {
            self.inner.state.send_modify(|state| state.loading = false);
        }
    }
}

/// Handle to an async operation and its state. Clones share state.
pub struct Action<I, O> {
    inner: Arc<Inner<I, O>>,
}

impl<I, O> Clone for Action<I, O> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<I, O: fmt::Debug> fmt::Debug for Action<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("label", &self.inner.label)
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}

impl<I, O> Action<I, O>
where
    I: Params,
    O: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(label: impl Into<String>, operation: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        Self::with_config(label, operation, ActionConfig::default())
    }

    pub fn with_config<F, Fut>(
        label: impl Into<String>,
        operation: F,
        config: ActionConfig<I, O>,
    ) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        let operation: Operation<I, O> = Arc::new(move |input| operation(input).boxed());
        let (state, _) = watch::channel(ActionState::default());
        let action = Self {
            inner: Arc::new(Inner {
                label: label.into(),
                operation,
                defaults: config.defaults,
                on_success: config.on_success,
                state,
                seq: AtomicU64::new(0),
                alive: AtomicBool::new(true),
            }),
        };

        if config.auto_trigger {
            action.spawn_auto_trigger();
        }
        action
    }

    fn spawn_auto_trigger(&self) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let pending = self.trigger(I::default());
                handle.spawn(async move {
                    // The outcome lands in the state.
                    let _ = pending.await;
                });
            }
            Err(_) => {
                tracing::warn!(action = %self.inner.label, "no tokio runtime, auto trigger skipped");
            }
        }
    }

    /// Start the operation with `input` merged over the configured defaults.
    ///
    /// State moves to loading before this returns. The returned future
    /// resolves with the operation's own outcome, whether or not it was the
    /// latest trigger.
    pub fn trigger(&self, input: I) -> impl Future<Output = Result<O>> + Send + 'static {
        let input = match &self.inner.defaults {
            Some(defaults) => input.merge_defaults(defaults),
            None => input,
        };
        let seq = self.inner.seq.fetch_add(1, Ordering::AcqRel) + 1;
        if self.inner.alive.load(Ordering::Acquire) {
            self.inner.state.send_modify(|state| {
                state.loading = true;
                state.error = None;
                state.result = None;
            });
        }
        tracing::debug!(action = %self.inner.label, seq, "trigger");

        let pending = (self.inner.operation)(input);
        let mut guard = SettleGuard {
            inner: self.inner.clone(),
            seq,
            armed: true,
        };
        async move {
            let outcome = pending.await;
            guard.armed = false;
            guard.inner.settle(seq, &outcome);
            outcome
        }
    }

    pub fn state(&self) -> ActionState<O> {
        self.inner.state.borrow().clone()
    }

    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub fn error(&self) -> Option<Error> {
        self.inner.state.borrow().error.clone()
    }

    pub fn result(&self) -> Option<O> {
        self.inner.state.borrow().result.clone()
    }

    /// Receive every state change.
    pub fn subscribe(&self) -> watch::Receiver<ActionState<O>> {
        self.inner.state.subscribe()
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }
}

impl<I, O> Action<I, O> {
    /// Stop applying settlements. In-flight operations still run to completion.
    pub fn unmount(&self) {
        self.inner.alive.store(false, Ordering::Release);
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.alive.load(Ordering::Acquire)
    }
}
