//! Blocking task queue with a drain barrier.
//!
//! `push_batch` enqueues a whole batch under one lock so no worker starts
//! before the batch is complete. Every `Work` message must be acknowledged
//! with `task_done`; `join` blocks until all are.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Message handed to a worker.
#[derive(Debug)]
pub enum Message<T> {
    Work(T),
    Shutdown,
}

struct QueueState<T> {
    items: VecDeque<Message<T>>,
    /// Work messages enqueued but not yet acknowledged.
    pending: usize,
}

pub struct TaskQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
    drained: Condvar,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TaskQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                pending: 0,
            }),
            available: Condvar::new(),
            drained: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue all tasks atomically. Returns how many were enqueued.
    pub fn push_batch<I>(&self, tasks: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        let mut state = self.lock();
        let before = state.items.len();
        state.items.extend(tasks.into_iter().map(Message::Work));
        let added = state.items.len() - before;
        state.pending += added;
        drop(state);
        self.available.notify_all();
        added
    }

    /// Enqueue one `Shutdown` per worker, behind any remaining work.
    pub fn shutdown(&self, workers: usize) {
        let mut state = self.lock();
        for _ in 0..workers {
            state.items.push_back(Message::Shutdown);
        }
        drop(state);
        self.available.notify_all();
    }

    /// Dequeue the next message, blocking while the queue is empty.
    pub fn pop(&self) -> Message<T> {
        let mut state = self.lock();
        loop {
            if let Some(msg) = state.items.pop_front() {
                return msg;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Acknowledge one `Work` message as finished.
    pub fn task_done(&self) {
        let mut state = self.lock();
        state.pending = state.pending.saturating_sub(1);
        if state.pending == 0 {
            self.drained.notify_all();
        }
    }

    /// Block until every enqueued `Work` message has been acknowledged.
    pub fn join(&self) {
        let mut state = self.lock();
        while state.pending > 0 {
            state = self
                .drained
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.lock().pending
    }
}
