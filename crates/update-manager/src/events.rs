use crate::state::UpdateState;
use tokio::sync::mpsc;

/// Messages the manager emits while a download runs. Consumers receive
/// them over a channel instead of cross-thread callbacks, so no
/// thread-affinity marshaling is required on either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateEvent {
    /// Download progress in percent, monotonically increasing per
    /// download, bounded to `0..=100`.
    Progress(u8),
    /// Terminal state of the download (`UpdateReady` or `Error`).
    Finished(UpdateState),
}

/// Receiving half of the manager's event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<UpdateEvent>;

pub(crate) type EventSender = mpsc::UnboundedSender<UpdateEvent>;

/// Accumulates received byte counts and emits de-duplicated percentage
/// events: a value is raised only when it strictly exceeds the last one.
/// Starts at zero, so `Progress(0)` itself is never emitted.
pub(crate) struct ProgressTracker {
    total: u64,
    received: u64,
    last: u8,
    events: EventSender,
}

impl ProgressTracker {
    pub(crate) fn new(total: u64, events: EventSender) -> Self {
        ProgressTracker {
            total,
            received: 0,
            last: 0,
            events,
        }
    }

    pub(crate) fn add(&mut self, bytes: u64) {
        self.received += bytes;
        if self.total == 0 {
            return;
        }
        let pct = ((self.received * 100) / self.total).min(100) as u8;
        if pct > self.last {
            self.last = pct;
            // A dropped receiver only means nobody is listening.
            let _ = self.events.send(UpdateEvent::Progress(pct));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut EventReceiver) -> Vec<UpdateEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[test]
    fn emits_only_strict_increases() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tracker = ProgressTracker::new(1000, tx);
        tracker.add(100);
        tracker.add(1); // still 10%
        tracker.add(99); // 20%
        tracker.add(800); // 100%
        assert_eq!(
            drain(&mut rx),
            vec![
                UpdateEvent::Progress(10),
                UpdateEvent::Progress(20),
                UpdateEvent::Progress(100)
            ]
        );
    }

    #[test]
    fn zero_percent_is_never_raised() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tracker = ProgressTracker::new(1_000_000, tx);
        tracker.add(1); // rounds down to 0%
        tracker.add(100); // still 0%
        assert!(drain(&mut rx).is_empty());
        tracker.add(9_899); // 1%
        assert_eq!(drain(&mut rx), vec![UpdateEvent::Progress(1)]);
    }

    #[test]
    fn clamps_to_one_hundred() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tracker = ProgressTracker::new(10, tx);
        tracker.add(25); // actual exceeds the estimated total
        assert_eq!(drain(&mut rx), vec![UpdateEvent::Progress(100)]);
        tracker.add(25);
        assert!(drain(&mut rx).is_empty());
    }
}
