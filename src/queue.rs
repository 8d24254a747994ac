// SPDX-License-Identifier: MIT

//! The pending-task priority queue.
//!
//! Tasks are ordered by `(SLA class ascending, target_completion
//! ascending)`, with `SLA0` (strictest) sorting ahead of `SLA3` (loosest).
//! Built on `BinaryHeap` wrapped in `Reverse` so the natural `Ord` reads as
//! a min-heap on `(sla, target_completion)`. Priority is captured once at
//! `push()` time rather than recomputed on every comparison (see the cache
//! rationale in `DESIGN.md`), and ties break on an explicit tertiary
//! `TaskId` key so ordering stays deterministic.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::host::{Host, SlaClass, TaskId};

/// One queue entry: the task id plus the priority key captured when it was
/// pushed. Caching avoids re-querying the host on every heap comparison and
/// resolves the "can task attributes change after queueing" open question in
/// favor of "no" (see `DESIGN.md`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    sla: SlaClass,
    target_completion: u64,
    task: TaskId,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sla
            .cmp(&other.sla)
            .then_with(|| self.target_completion.cmp(&other.target_completion))
            .then_with(|| self.task.cmp(&other.task))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of pending task ids, ordered `(SLA ascending, target
/// completion ascending)`.
#[derive(Debug, Default)]
pub struct TaskQueue {
    heap: BinaryHeap<Reverse<Entry>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    /// Queue `task`, capturing its SLA class and target-completion time from
    /// `host` at push time.
    pub fn push(&mut self, host: &dyn Host, task: TaskId) {
        let entry = Entry {
            sla: host.required_sla(task),
            target_completion: host.task_info(task).target_completion,
            task,
        };
        self.heap.push(Reverse(entry));
    }

    /// The task at the head of the queue, without removing it.
    pub fn peek(&self) -> Option<TaskId> {
        self.heap.peek().map(|Reverse(e)| e.task)
    }

    /// Remove and discard the head of the queue.
    ///
    /// # Panics
    /// Panics if the queue is empty — callers must check `peek()`/`size()`
    /// first.
    pub fn pop(&mut self) {
        self.heap
            .pop()
            .expect("TaskQueue::pop called on an empty queue");
    }

    pub fn size(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
