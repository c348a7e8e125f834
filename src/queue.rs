// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single consumer task queue with a pause between dispatched tasks.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::{
    sync::{self, Notify, oneshot},
    task::JoinHandle,
    time,
};

/// Processes dispatched tasks.
#[async_trait]
pub trait Handler<T>: Send {
    /// Handle `task`.
    ///
    /// The next task is dispatched after `done` has been signalled (or dropped)
    /// and the pacing interval has elapsed.
    async fn handle(&mut self, task: T, done: Done);
}

/// Continuation that lets the queue advance.
#[derive(Debug)]
pub struct Done(oneshot::Sender<()>);

impl Done {
    fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    /// Signal that the task has been finished.
    pub fn done(self) {
        let _ = self.0.send(());
    }
}

#[derive(Debug)]
struct Shared<T> {
    tasks: Mutex<VecDeque<T>>,
    active: AtomicBool,
    /// Incremented by every `start`, outdated dispatch loops quit.
    generation: AtomicU64,
    /// Held by the dispatch loop that hands out tasks.
    dispatching: sync::Mutex<()>,
    wakeup: Notify,
    pacing: Duration,
}

/// FIFO queue that dispatches at most one task at a time.
#[derive(Debug)]
pub struct Queue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Queue<T>
where
    T: Send + 'static,
{
    /// Create a stopped queue that pauses for `pacing` after each task.
    #[must_use]
    pub fn new(pacing: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                tasks: Mutex::new(VecDeque::new()),
                active: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                dispatching: sync::Mutex::new(()),
                wakeup: Notify::new(),
                pacing,
            }),
        }
    }

    /// Append a task.
    pub fn push(&self, task: T) {
        self.shared.tasks.lock().push_back(task);
        self.shared.wakeup.notify_one();
    }

    /// Remove the first waiting task that matches `predicate`.
    pub fn withdraw(&self, predicate: impl FnMut(&T) -> bool) -> Option<T> {
        let mut tasks = self.shared.tasks.lock();
        let pos = tasks.iter().position(predicate)?;
        tasks.remove(pos)
    }

    /// Number of tasks waiting for dispatch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.tasks.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Start dispatching tasks to `handler` on a new tokio task.
    ///
    /// A loop of a previous start finishes its current task and pacing
    /// before the new loop dispatches anything.
    pub fn start<H>(&self, handler: H) -> JoinHandle<()>
    where
        H: Handler<T> + 'static,
    {
        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.shared.active.store(true, Ordering::Release);
        // Wake an idle loop of a previous start so it can quit.
        self.shared.wakeup.notify_one();
        tokio::spawn(self.clone().dispatch(generation, handler))
    }

    /// Stop dispatching.
    ///
    /// A task that is currently handled is not interrupted.
    pub fn stop(&self) {
        self.shared.active.store(false, Ordering::Release);
        self.shared.wakeup.notify_one();
    }

    fn is_current(&self, generation: u64) -> bool {
        self.is_active() && self.shared.generation.load(Ordering::Acquire) == generation
    }

    async fn dispatch<H>(self, generation: u64, mut handler: H)
    where
        H: Handler<T>,
    {
        let _dispatching = self.shared.dispatching.lock().await;
        while self.is_current(generation) {
            let next = self.shared.tasks.lock().pop_front();
            let Some(task) = next else {
                self.shared.wakeup.notified().await;
                continue;
            };
            let (done, finished) = Done::new();
            handler.handle(task, done).await;
            // A dropped `Done` counts as done.
            let _ = finished.await;
            time::sleep(self.shared.pacing).await;
        }
    }
}
