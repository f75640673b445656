use std::collections::HashSet;
use tokio::time::Duration;
use uuid::Uuid;

/// What the owner of an upstream subscription should do after an observer
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharingAction {
    Nothing,
    Start,
    Stop,
    ScheduleRelease { generation: u64, after: Duration },
}

/// Keeps an upstream subscription alive while observers exist, and for a
/// grace period after the last one leaves so quick re-attachment does not
/// restart it.
#[derive(Debug)]
pub struct SubscriptionSharing {
    observers: HashSet<Uuid>,
    upstream_active: bool,
    generation: u64,
    grace: Duration,
}

impl SubscriptionSharing {
    pub fn new(grace: Duration) -> Self {
        Self {
            observers: HashSet::new(),
            upstream_active: false,
            generation: 0,
            grace,
        }
    }

    pub fn attach(&mut self, observer_id: Uuid) -> SharingAction {
        if !self.observers.insert(observer_id) {
            return SharingAction::Nothing;
        }
        // Invalidates any release scheduled before this attach.
        self.generation += 1;
        if self.upstream_active {
            return SharingAction::Nothing;
        }
        self.upstream_active = true;
        SharingAction::Start
    }

    pub fn detach(&mut self, observer_id: Uuid) -> SharingAction {
        if !self.observers.remove(&observer_id) {
            return SharingAction::Nothing;
        }
        if !self.observers.is_empty() || !self.upstream_active {
            return SharingAction::Nothing;
        }
        self.generation += 1;
        if self.grace.is_zero() {
            self.upstream_active = false;
            return SharingAction::Stop;
        }
        SharingAction::ScheduleRelease {
            generation: self.generation,
            after: self.grace,
        }
    }

    /// True when the release scheduled for `generation` should go ahead.
    pub fn release_due(&mut self, generation: u64) -> bool {
        if generation != self.generation || !self.observers.is_empty() || !self.upstream_active {
            return false;
        }
        self.upstream_active = false;
        true
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn is_upstream_active(&self) -> bool {
        self.upstream_active
    }
}

#[cfg(test)]
mod tests {
    use super::{SharingAction, SubscriptionSharing};
    use tokio::time::Duration;
    use uuid::Uuid;

    #[test]
    fn first_observer_starts_upstream_and_later_ones_share_it() {
        let mut sharing = SubscriptionSharing::new(Duration::from_secs(5));
        assert_eq!(sharing.attach(Uuid::new_v4()), SharingAction::Start);
        assert_eq!(sharing.attach(Uuid::new_v4()), SharingAction::Nothing);
        assert_eq!(sharing.observer_count(), 2);
    }

    #[test]
    fn last_detach_schedules_release_after_grace() {
        let mut sharing = SubscriptionSharing::new(Duration::from_secs(5));
        let id = Uuid::new_v4();
        sharing.attach(id);
        let SharingAction::ScheduleRelease { generation, after } = sharing.detach(id) else {
            panic!("expected a scheduled release");
        };
        assert_eq!(after, Duration::from_secs(5));
        assert!(sharing.release_due(generation));
        assert!(!sharing.is_upstream_active());
    }

    #[test]
    fn reattach_within_grace_cancels_the_release() {
        let mut sharing = SubscriptionSharing::new(Duration::from_secs(5));
        let first = Uuid::new_v4();
        sharing.attach(first);
        let SharingAction::ScheduleRelease { generation, .. } = sharing.detach(first) else {
            panic!("expected a scheduled release");
        };
        assert_eq!(sharing.attach(Uuid::new_v4()), SharingAction::Nothing);
        assert!(!sharing.release_due(generation));
        assert!(sharing.is_upstream_active());
    }

    #[test]
    fn zero_grace_stops_immediately() {
        let mut sharing = SubscriptionSharing::new(Duration::ZERO);
        let id = Uuid::new_v4();
        sharing.attach(id);
        assert_eq!(sharing.detach(id), SharingAction::Stop);
        assert_eq!(sharing.attach(id), SharingAction::Start);
    }

    #[test]
    fn unknown_detach_is_ignored() {
        let mut sharing = SubscriptionSharing::new(Duration::from_secs(5));
        sharing.attach(Uuid::new_v4());
        assert_eq!(sharing.detach(Uuid::new_v4()), SharingAction::Nothing);
        assert!(sharing.is_upstream_active());
    }
}
