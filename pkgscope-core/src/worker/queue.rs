/// Single-flight bundle scheduling: at most one job runs and at most one
/// waits. A newer waiting job replaces the older one.
#[derive(Debug)]
pub struct BundleQueue<T> {
    state: QueueState,
    pending: Option<T>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Running,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Submitted<T> {
    /// Run this job now.
    Start(T),
    /// Queued behind the running job; carries the job it displaced.
    Queued { superseded: Option<T> },
}

impl<T> Default for BundleQueue<T> {
    fn default() -> Self {
        BundleQueue {
            state: QueueState::Idle,
            pending: None,
        }
    }
}

impl<T> BundleQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn submit(&mut self, job: T) -> Submitted<T> {
        match self.state {
            QueueState::Idle => {
                self.state = QueueState::Running;
                Submitted::Start(job)
            }
            QueueState::Running => Submitted::Queued {
                superseded: self.pending.replace(job),
            },
        }
    }

    /// Marks the running job done and hands back the next one, if any.
    pub fn finish(&mut self) -> Option<T> {
        let next = self.pending.take();
        self.state = if next.is_some() {
            QueueState::Running
        } else {
            QueueState::Idle
        };
        next
    }
}
