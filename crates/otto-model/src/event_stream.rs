// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::VecDeque;
use std::pin::pin;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

/// An event type that can end its stream.
///
/// When [`TerminalEvent::result`] returns `Some`, the event is terminal: the
/// stream transitions to ended, the value resolves [`EventStream::result`],
/// and later pushes are ignored.
pub trait TerminalEvent: Clone + Send + 'static {
    type Result: Clone + Send + 'static;

    fn result(&self) -> Option<Self::Result>;
}

/// Single-producer / single-consumer asynchronous event queue with a typed
/// final value.
///
/// The producer pushes events without blocking (the buffer is unbounded; the
/// producer rate is bounded by the upstream model, and consumers that cannot
/// keep up must drop or buffer on their side).  The consumer drains events
/// with [`next`](EventStream::next) and may await the final value with
/// [`result`](EventStream::result) without draining every event.
///
/// At most one consumer may iterate; concurrent `next` callers race over
/// events.  Handles are cheaply cloneable — all clones share the same queue.
pub struct EventStream<T: TerminalEvent> {
    inner: Arc<Inner<T>>,
}

impl<T: TerminalEvent> Clone for EventStream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T: TerminalEvent> {
    state: Mutex<State<T>>,
    notify: Notify,
}

struct State<T: TerminalEvent> {
    queue: VecDeque<T>,
    ended: bool,
    result: Option<T::Result>,
}

impl<T: TerminalEvent> EventStream<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    ended: false,
                    result: None,
                }),
                notify: Notify::new(),
            }),
        }
    }

    /// Append an event.  Non-blocking; a no-op once the stream has ended.
    /// A terminal event (see [`TerminalEvent::result`]) is still delivered to
    /// the consumer and ends the stream.
    pub fn push(&self, event: T) {
        {
            let mut st = self.inner.state.lock().expect("event stream poisoned");
            if st.ended {
                return;
            }
            if let Some(result) = event.result() {
                st.result = Some(result);
                st.ended = true;
            }
            st.queue.push_back(event);
        }
        self.inner.notify.notify_waiters();
    }

    /// Force the stream into the ended state.  When `result` is present it
    /// resolves [`result`](EventStream::result); waiting consumers are
    /// released with end-of-sequence.
    pub fn end(&self, result: Option<T::Result>) {
        {
            let mut st = self.inner.state.lock().expect("event stream poisoned");
            if st.ended {
                return;
            }
            st.ended = true;
            if result.is_some() {
                st.result = result;
            }
        }
        self.inner.notify.notify_waiters();
    }

    pub fn is_ended(&self) -> bool {
        self.inner.state.lock().expect("event stream poisoned").ended
    }

    /// Receive the next event; `None` once the stream has ended and the
    /// buffer is drained.
    pub async fn next(&self) -> Option<T> {
        loop {
            // Register interest before checking state so a push between the
            // check and the await cannot be missed.
            let mut notified = pin!(self.inner.notify.notified());
            notified.as_mut().enable();
            {
                let mut st = self.inner.state.lock().expect("event stream poisoned");
                if let Some(event) = st.queue.pop_front() {
                    return Some(event);
                }
                if st.ended {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Await the stream's final value.  Resolves as soon as a terminal event
    /// is pushed or `end(Some(..))` is called — the consumer does not need to
    /// drain the queue first.  Fails when the stream ended without a result.
    pub async fn result(&self) -> anyhow::Result<T::Result> {
        loop {
            let mut notified = pin!(self.inner.notify.notified());
            notified.as_mut().enable();
            {
                let st = self.inner.state.lock().expect("event stream poisoned");
                if st.ended {
                    return st
                        .result
                        .clone()
                        .ok_or_else(|| anyhow::anyhow!("event stream ended without a terminal event"));
                }
            }
            notified.await;
        }
    }

    /// Drain all remaining events until end-of-sequence.  Test helper and
    /// post-hoc consumption path; the buffer retains everything pushed.
    pub async fn collect(&self) -> Vec<T> {
        let mut events = Vec::new();
        while let Some(ev) = self.next().await {
            events.push(ev);
        }
        events
    }
}

impl<T: TerminalEvent> Default for EventStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
