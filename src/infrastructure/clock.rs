use crate::domain::job::LogicalTime;
use crate::domain::ports::Clock;
use tokio::sync::watch;

/// Logical clock advanced explicitly by its owner.
///
/// Backed by a `watch` channel so that parked workers wake up whenever time
/// moves forward.
pub struct ManualClock {
    time: watch::Sender<LogicalTime>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(start: LogicalTime) -> Self {
        let (time, _) = watch::channel(start);
        Self { time }
    }

    pub fn advance(&self, units: LogicalTime) {
        self.time.send_modify(|now| *now = now.saturating_add(units));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> LogicalTime {
        *self.time.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<LogicalTime> {
        self.time.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance() {
        let clock = ManualClock::starting_at(3);
        assert_eq!(clock.now(), 3);
        clock.advance(4);
        assert_eq!(clock.now(), 7);
    }

    #[test]
    fn test_advance_saturates() {
        let clock = ManualClock::starting_at(5);
        clock.advance(LogicalTime::MAX);
        assert_eq!(clock.now(), LogicalTime::MAX);
        clock.advance(1);
        assert_eq!(clock.now(), LogicalTime::MAX);
    }

    #[tokio::test]
    async fn test_subscribers_observe_advance() {
        let clock = ManualClock::new();
        let mut rx = clock.subscribe();

        clock.advance(2);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 2);
    }
}
