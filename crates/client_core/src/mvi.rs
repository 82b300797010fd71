//! Intent-processing harness shared by every feature.
//!
//! A feature is a [`Reducer`]: a closed intent enum, a cloneable state
//! snapshot, and an async transition function. [`Processor::spawn`] runs the
//! reducer on its own task, draining an unbounded intent queue strictly one
//! intent at a time; each intent is processed to completion (including any
//! awaited repository call) before the next is taken, so state updates are
//! serial and race-free without locks. Snapshots are published on a `watch`
//! channel; subscribers only ever observe whole states.

use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

#[async_trait]
pub trait Reducer: Send + 'static {
    type Intent: Send + 'static;
    type State: Clone + Send + Sync + 'static;

    fn initial_state(&self) -> Self::State;

    /// Maps the current state and one intent to the next state. Interim
    /// snapshots (loading flags while an external call is in flight) can be
    /// pushed through `publisher`; the returned state is always published
    /// last.
    async fn reduce(
        &mut self,
        state: Self::State,
        intent: Self::Intent,
        publisher: &Publisher<Self::State>,
    ) -> Self::State;
}

/// Write side of a processor's state channel, handed to the reducer.
pub struct Publisher<S> {
    tx: watch::Sender<S>,
}

impl<S: Clone> Publisher<S> {
    pub fn publish(&self, state: S) {
        let _ = self.tx.send(state);
    }

    fn current(&self) -> S {
        self.tx.borrow().clone()
    }
}

/// Cloneable dispatch handle, used by subscription pumps to feed
/// internally generated intents back into the queue.
pub struct Dispatcher<I> {
    tx: mpsc::UnboundedSender<I>,
    dispatched: Arc<AtomicU64>,
}

impl<I> Clone for Dispatcher<I> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            dispatched: self.dispatched.clone(),
        }
    }
}

impl<I> Dispatcher<I> {
    /// Returns false once the processor has shut down.
    pub fn dispatch(&self, intent: I) -> bool {
        if self.tx.send(intent).is_ok() {
            self.dispatched.fetch_add(1, Ordering::SeqCst);
            true
        } else {
            false
        }
    }
}

pub struct Processor<R: Reducer> {
    intents: mpsc::UnboundedSender<R::Intent>,
    state: watch::Receiver<R::State>,
    dispatched: Arc<AtomicU64>,
    processed: watch::Receiver<u64>,
    task: JoinHandle<()>,
    attached: Vec<JoinHandle<()>>,
}

impl<R: Reducer> Processor<R> {
    pub fn spawn(mut reducer: R) -> Self {
        let (intent_tx, mut intent_rx) = mpsc::unbounded_channel::<R::Intent>();
        let (state_tx, state_rx) = watch::channel(reducer.initial_state());
        let (processed_tx, processed_rx) = watch::channel(0u64);
        let publisher = Publisher { tx: state_tx };
        let task = tokio::spawn(async move {
            let mut processed = 0u64;
            while let Some(intent) = intent_rx.recv().await {
                let current = publisher.current();
                let next = reducer.reduce(current, intent, &publisher).await;
                publisher.publish(next);
                processed += 1;
                let _ = processed_tx.send(processed);
            }
        });
        Self {
            intents: intent_tx,
            state: state_rx,
            dispatched: Arc::new(AtomicU64::new(0)),
            processed: processed_rx,
            task,
            attached: Vec::new(),
        }
    }

    /// Fire-and-forget: enqueues the intent and returns immediately. Intents
    /// arriving while a prior one is in flight queue behind it. After
    /// shutdown this is a silent no-op.
    pub fn dispatch(&self, intent: R::Intent) {
        if self.intents.send(intent).is_ok() {
            self.dispatched.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn dispatcher(&self) -> Dispatcher<R::Intent> {
        Dispatcher {
            tx: self.intents.clone(),
            dispatched: self.dispatched.clone(),
        }
    }

    /// Waits until every intent dispatched so far has been processed. Useful
    /// for drivers that dispatch a batch and then read the settled state.
    pub async fn drained(&self) {
        let target = self.dispatched.load(Ordering::SeqCst);
        let mut rx = self.processed.clone();
        let _ = rx.wait_for(|&processed| processed >= target).await;
    }

    /// Current snapshot.
    pub fn state(&self) -> R::State {
        self.state.borrow().clone()
    }

    /// Read-only subscription to the snapshot stream.
    pub fn subscribe(&self) -> watch::Receiver<R::State> {
        self.state.clone()
    }

    /// Waits until a published snapshot satisfies the predicate and returns
    /// it. Returns the latest snapshot if the processor stops first.
    pub async fn wait_for(&self, mut predicate: impl FnMut(&R::State) -> bool) -> R::State {
        let mut rx = self.state.clone();
        let result = match rx.wait_for(|state| predicate(state)).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        result
    }

    /// Ties a helper task (e.g. a live-subscription pump) to this
    /// processor's lifetime.
    pub fn attach(&mut self, task: JoinHandle<()>) {
        self.attached.push(task);
    }

    /// Stops the processing task and any attached pumps. Queued intents are
    /// discarded.
    pub fn shutdown(&self) {
        self.task.abort();
        for task in &self.attached {
            task.abort();
        }
    }
}

impl<R: Reducer> Drop for Processor<R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    struct CounterState {
        value: i64,
        busy: bool,
    }

    enum CounterIntent {
        Add(i64),
        SlowAdd(i64),
        Set(i64),
    }

    #[derive(Default)]
    struct Counter;

    #[async_trait]
    impl Reducer for Counter {
        type Intent = CounterIntent;
        type State = CounterState;

        fn initial_state(&self) -> CounterState {
            CounterState::default()
        }

        async fn reduce(
            &mut self,
            state: CounterState,
            intent: CounterIntent,
            publisher: &Publisher<CounterState>,
        ) -> CounterState {
            match intent {
                CounterIntent::Add(n) => CounterState {
                    value: state.value + n,
                    busy: false,
                },
                CounterIntent::SlowAdd(n) => {
                    publisher.publish(CounterState {
                        busy: true,
                        ..state.clone()
                    });
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    CounterState {
                        value: state.value + n,
                        busy: false,
                    }
                }
                CounterIntent::Set(n) => CounterState {
                    value: n,
                    busy: false,
                },
            }
        }
    }

    #[tokio::test]
    async fn intents_are_processed_serially_in_dispatch_order() {
        let processor = Processor::spawn(Counter);
        // The slow intent is in flight while the others queue behind it; no
        // interleaving, no lost updates.
        processor.dispatch(CounterIntent::SlowAdd(1));
        processor.dispatch(CounterIntent::Add(10));
        processor.dispatch(CounterIntent::Add(100));

        let state = processor.wait_for(|s| s.value == 111 && !s.busy).await;
        assert_eq!(state.value, 111);
    }

    #[tokio::test]
    async fn last_update_wins_for_a_field() {
        let processor = Processor::spawn(Counter);
        for n in [1, 2, 3, 42] {
            processor.dispatch(CounterIntent::Set(n));
        }
        let state = processor.wait_for(|s| s.value == 42).await;
        assert_eq!(state.value, 42);
    }

    #[tokio::test]
    async fn interim_snapshots_are_observable() {
        let processor = Processor::spawn(Counter);
        let mut rx = processor.subscribe();
        processor.dispatch(CounterIntent::SlowAdd(5));

        rx.wait_for(|s| s.busy).await.expect("busy snapshot");
        let state = processor.wait_for(|s| s.value == 5).await;
        assert!(!state.busy);
    }

    #[tokio::test]
    async fn drained_waits_for_the_whole_batch() {
        let processor = Processor::spawn(Counter);
        processor.dispatch(CounterIntent::SlowAdd(1));
        processor.dispatch(CounterIntent::Add(10));
        processor.drained().await;
        assert_eq!(processor.state().value, 11);
    }

    #[tokio::test]
    async fn dispatch_after_shutdown_is_a_no_op() {
        let processor = Processor::spawn(Counter);
        processor.dispatch(CounterIntent::Add(1));
        processor.wait_for(|s| s.value == 1).await;

        processor.shutdown();
        // Must not panic or block.
        processor.dispatch(CounterIntent::Add(1));
        assert_eq!(processor.state().value, 1);
    }
}
