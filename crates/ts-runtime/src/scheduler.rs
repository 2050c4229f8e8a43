use std::collections::BTreeMap;

use ts_core::Delivery;

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTask {
    pub contact: String,
    pub epoch: u64,
    pub task: Delivery,
}

/// Virtual-time queue ordered by `(fire_at, sequence)`. Nothing runs on its
/// own: the engine pops due tasks when it is ticked.
///
/// Tasks for one contact keep their scheduling order: a later task is never
/// placed before an earlier one for the same contact.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BTreeMap<(u64, u64), ScheduledTask>,
    next_sequence: u64,
    latest_by_contact: BTreeMap<String, u64>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `task` and returns the time it will actually fire.
    pub fn schedule(&mut self, fire_at: u64, task: ScheduledTask) -> u64 {
        let floor = self
            .latest_by_contact
            .get(&task.contact)
            .copied()
            .unwrap_or(0);
        let fire_at = fire_at.max(floor);
        self.latest_by_contact.insert(task.contact.clone(), fire_at);

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        tracing::debug!(
            contact = task.contact.as_str(),
            fire_at,
            sequence,
            task = ?task.task,
            "task scheduled"
        );
        self.queue.insert((fire_at, sequence), task);
        fire_at
    }

    /// Removes the earliest task if it is due at `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<(u64, ScheduledTask)> {
        let (&(fire_at, _), _) = self.queue.first_key_value()?;
        if fire_at > now {
            return None;
        }
        self.pop_next()
    }

    /// Removes the earliest task regardless of time.
    pub fn pop_next(&mut self) -> Option<(u64, ScheduledTask)> {
        self.queue
            .pop_first()
            .map(|((fire_at, _), task)| (fire_at, task))
    }

    /// Queued tasks in firing order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &ScheduledTask)> {
        self.queue.iter().map(|(&(fire_at, _), task)| (fire_at, task))
    }

    pub fn next_fire_at(&self) -> Option<u64> {
        self.queue.keys().next().map(|(fire_at, _)| *fire_at)
    }

    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.queue.len();
        self.queue.clear();
        self.latest_by_contact.clear();
        cancelled
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
