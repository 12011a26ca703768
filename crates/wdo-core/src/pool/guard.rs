//! RAII guard that acknowledges a task when dropped.

use super::queue::TaskQueue;

/// Calls `task_done` on drop, so the drain barrier is released even if the
/// task body unwinds.
pub(super) struct TaskDoneGuard<'a, T> {
    pub(super) queue: &'a TaskQueue<T>,
}

impl<T> Drop for TaskDoneGuard<'_, T> {
    fn drop(&mut self) {
        self.queue.task_done();
    }
}
