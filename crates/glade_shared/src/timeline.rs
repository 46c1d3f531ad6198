use rustc_hash::FxHashSet;

/// Cancellation token for a scheduled action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

#[derive(Debug)]
struct ScheduledTask<A> {
    handle: TaskHandle,
    fire_at: f64,
    action: A,
}

/// Deferred actions keyed by absolute time in seconds. Nothing fires on its
/// own: the owner calls [`Timeline::advance`] once per frame.
#[derive(Debug)]
pub struct Timeline<A> {
    tasks: Vec<ScheduledTask<A>>,
    pending: FxHashSet<TaskHandle>,
    next_handle: u64,
}

impl<A> Default for Timeline<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Timeline<A> {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            pending: FxHashSet::default(),
            next_handle: 0,
        }
    }

    pub fn schedule(&mut self, now: f64, delay: f64, action: A) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        self.tasks.push(ScheduledTask {
            handle,
            fire_at: now + delay.max(0.0),
            action,
        });
        self.pending.insert(handle);
        handle
    }

    /// Returns `true` if the task was still pending. Cancelling a fired or
    /// already cancelled task is a no-op.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        if !self.pending.remove(&handle) {
            return false;
        }
        self.tasks.retain(|task| task.handle != handle);
        true
    }

    pub fn is_pending(&self, handle: TaskHandle) -> bool {
        self.pending.contains(&handle)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Removes and returns every action due at `now`, earliest first. Ties keep
    /// scheduling order.
    pub fn advance(&mut self, now: f64) -> Vec<A> {
        let (mut due, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|task| task.fire_at <= now);
        self.tasks = rest;

        due.sort_by(|a, b| {
            a.fire_at
                .total_cmp(&b.fire_at)
                .then(a.handle.0.cmp(&b.handle.0))
        });
        due.into_iter()
            .map(|task| {
                self.pending.remove(&task.handle);
                task.action
            })
            .collect()
    }
}
