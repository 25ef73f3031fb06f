// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work queue and worker pool driving the reconciler
//!
//! A fixed number of workers pull resource ids from a [`WorkQueue`]. The
//! queue hands each id to at most one worker at a time; an id added while it
//! is in flight is parked and queued again once that pass finishes. A poll
//! loop lists the store and enqueues every workspace that needs work. Failed
//! passes back off exponentially per resource.

use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::ReconcileError;
use krec_adapters::{NotifyAdapter, ReferenceStore, TerraformAdapter, ToolInstaller, WorkspaceStore};
use krec_core::{Clock, Lifecycle, ResourceId, Workspace};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

/// Worker pool and scheduling policy
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Passes allowed to run at once
    pub workers: usize,
    /// How often the store is listed for pending work
    pub poll_interval: Duration,
    /// Delay after the first failure; doubles per consecutive failure
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            poll_interval: Duration::from_secs(10),
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(300),
        }
    }
}

/// Delay before retry number `attempt` (1-based).
pub fn backoff_delay(base: Duration, max: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(max)
}

#[derive(Default)]
struct QueueState {
    queued: VecDeque<ResourceId>,
    pending: HashSet<ResourceId>,
    in_flight: HashSet<ResourceId>,
    dirty: HashSet<ResourceId>,
}

/// FIFO of resource ids with per-id deduplication.
#[derive(Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `id` unless already queued. If in flight, it is queued again
    /// when the current pass is marked done.
    pub fn add(&self, id: ResourceId) {
        let mut state = self.state.lock();
        if state.in_flight.contains(&id) {
            state.dirty.insert(id);
            return;
        }
        if state.pending.insert(id.clone()) {
            state.queued.push_back(id);
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Wait for the next id and mark it in flight.
    pub async fn next(&self) -> ResourceId {
        loop {
            if let Some(id) = self.try_next() {
                return id;
            }
            self.notify.notified().await;
        }
    }

    fn try_next(&self) -> Option<ResourceId> {
        let mut state = self.state.lock();
        let id = state.queued.pop_front()?;
        state.pending.remove(&id);
        state.in_flight.insert(id.clone());
        let more = !state.queued.is_empty();
        drop(state);
        if more {
            self.notify.notify_one();
        }
        Some(id)
    }

    /// Finish the pass for `id`.
    pub fn done(&self, id: &ResourceId) {
        let requeue = {
            let mut state = self.state.lock();
            state.in_flight.remove(id);
            state.dirty.remove(id)
        };
        if requeue {
            self.add(id.clone());
        }
    }

    /// Ids waiting to be picked up.
    pub fn len(&self) -> usize {
        self.state.lock().queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight.len()
    }
}

struct Backoff {
    attempts: u32,
    retry_at: Instant,
}

/// Runs the reconciler for every workspace that needs it.
pub struct Controller<S, T, I, N, C: Clock> {
    reconciler: Arc<Reconciler<S, T, I, N, C>>,
    store: S,
    queue: Arc<WorkQueue>,
    backoff: Arc<Mutex<HashMap<ResourceId, Backoff>>>,
    config: ControllerConfig,
}

impl<S: Clone, T, I, N, C: Clock> Clone for Controller<S, T, I, N, C> {
    fn clone(&self) -> Self {
        Self {
            reconciler: Arc::clone(&self.reconciler),
            store: self.store.clone(),
            queue: Arc::clone(&self.queue),
            backoff: Arc::clone(&self.backoff),
            config: self.config.clone(),
        }
    }
}

/// True for workspaces a pass would act on.
pub fn needs_work(workspace: &Workspace, now_ms: u64) -> bool {
    match workspace.lifecycle() {
        Lifecycle::Live => !workspace.is_up_to_date(now_ms),
        Lifecycle::Deleting { finalized } => finalized,
    }
}

/// Resolves once `shutdown` is set or its sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

impl<S, T, I, N, C> Controller<S, T, I, N, C>
where
    S: WorkspaceStore + ReferenceStore,
    T: TerraformAdapter,
    I: ToolInstaller,
    N: NotifyAdapter,
    C: Clock,
{
    pub fn new(reconciler: Reconciler<S, T, I, N, C>, store: S, config: ControllerConfig) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
            store,
            queue: Arc::new(WorkQueue::new()),
            backoff: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    pub fn reconciler(&self) -> &Reconciler<S, T, I, N, C> {
        &self.reconciler
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    pub fn enqueue(&self, id: ResourceId) {
        self.queue.add(id);
    }

    /// List the store and enqueue every workspace needing work that is not
    /// backing off. Returns how many were enqueued.
    pub async fn enqueue_pending(&self) -> usize {
        let workspaces = match self.store.list().await {
            Ok(workspaces) => workspaces,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list workspaces");
                return 0;
            }
        };
        let now_ms = self.reconciler.clock().epoch_ms();
        let now = Instant::now();
        let mut enqueued = 0;
        for ws in workspaces.iter().filter(|ws| needs_work(ws, now_ms)) {
            let id = ws.id();
            let waiting = self
                .backoff
                .lock()
                .get(&id)
                .is_some_and(|b| b.retry_at > now);
            if !waiting {
                self.queue.add(id);
                enqueued += 1;
            }
        }
        enqueued
    }

    /// Run the workers and the poll loop until `shutdown` flips to true.
    /// In-flight passes are dropped on shutdown, which kills their processes.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let workers = self.config.workers.max(1);
        tracing::info!(workers, poll_ms = self.config.poll_interval.as_millis() as u64, "controller started");

        let mut pool = JoinSet::new();
        for worker in 0..workers {
            pool.spawn(self.clone().work(worker, shutdown.clone()));
        }

        let mut shutdown = shutdown;
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = stopped(&mut shutdown) => break,
                _ = ticker.tick() => {
                    let enqueued = self.enqueue_pending().await;
                    if enqueued > 0 {
                        tracing::debug!(enqueued, "poll enqueued workspaces");
                    }
                }
            }
        }

        while pool.join_next().await.is_some() {}
        tracing::info!("controller stopped");
    }

    async fn work(self, worker: usize, mut shutdown: watch::Receiver<bool>) {
        loop {
            let id = tokio::select! {
                _ = stopped(&mut shutdown) => break,
                id = self.queue.next() => id,
            };
            let result = tokio::select! {
                _ = stopped(&mut shutdown) => {
                    tracing::info!(worker, resource = %id, "pass cancelled by shutdown");
                    self.queue.done(&id);
                    break;
                }
                result = self.reconciler.reconcile(&id) => result,
            };
            self.queue.done(&id);
            self.settle(id, result);
        }
    }

    fn settle(&self, id: ResourceId, result: Result<ReconcileOutcome, ReconcileError>) {
        match result {
            Ok(ReconcileOutcome::Requeue) => {
                self.backoff.lock().remove(&id);
                self.queue.add(id);
            }
            Ok(_) => {
                self.backoff.lock().remove(&id);
            }
            Err(e) => {
                let delay = {
                    let mut backoff = self.backoff.lock();
                    let entry = backoff.entry(id.clone()).or_insert(Backoff {
                        attempts: 0,
                        retry_at: Instant::now(),
                    });
                    entry.attempts += 1;
                    let delay = backoff_delay(
                        self.config.backoff_base,
                        self.config.backoff_max,
                        entry.attempts,
                    );
                    entry.retry_at = Instant::now() + delay;
                    tracing::warn!(
                        resource = %id,
                        attempt = entry.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "pass failed, backing off"
                    );
                    delay
                };
                let queue = Arc::clone(&self.queue);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    queue.add(id);
                });
            }
        }
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
