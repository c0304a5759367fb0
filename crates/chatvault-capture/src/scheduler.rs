//! Rescan scheduler.
//!
//! Pure state machine: the actor loop feeds it triggers with the current
//! instant, sleeps until [`Scheduler::next_deadline`] and runs whatever
//! [`Scheduler::poll`] returns. Bursts of triggers coalesce into one scan.

use tokio::time::Instant;

use crate::config::CaptureTimings;
use crate::page::PageEvent;

/// Work the engine should do now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Re-resolve the open chat's name.
    CheckChat,
    /// Extract, dedup and deliver.
    Scan,
}

#[derive(Debug)]
pub struct Scheduler {
    timings: CaptureTimings,
    scan_due: Option<Instant>,
    shell_due: Option<Instant>,
    tick_due: Instant,
    last_scan: Option<Instant>,
}

impl Scheduler {
    pub fn new(timings: CaptureTimings, now: Instant) -> Self {
        Self {
            timings,
            scan_due: None,
            shell_due: None,
            tick_due: now + timings.tick_interval,
            last_scan: None,
        }
    }

    /// Record a change notification. Each debounce restarts on every trigger.
    pub fn notify(&mut self, event: PageEvent, now: Instant) {
        match event {
            PageEvent::Mutation => self.scan_due = Some(now + self.timings.mutation_debounce),
            PageEvent::Scroll => self.scan_due = Some(now + self.timings.scroll_debounce),
            PageEvent::Shell => self.shell_due = Some(now + self.timings.shell_debounce),
        }
    }

    /// Request a scan after `delay`, replacing any pending one.
    pub fn schedule_scan(&mut self, delay: std::time::Duration, now: Instant) {
        self.scan_due = Some(now + delay);
    }

    /// Note a scan that ran outside `poll` (force sync).
    pub fn record_scan(&mut self, now: Instant) {
        self.scan_due = None;
        self.last_scan = Some(now);
    }

    /// When the pending scan may run, honouring the minimum interval.
    fn effective_scan_due(&self) -> Option<Instant> {
        let due = self.scan_due?;
        Some(match self.last_scan {
            Some(last) => due.max(last + self.timings.min_scan_interval),
            None => due,
        })
    }

    /// The earliest instant at which `poll` has something to return.
    pub fn next_deadline(&self) -> Instant {
        [self.effective_scan_due(), self.shell_due]
            .into_iter()
            .flatten()
            .fold(self.tick_due, Instant::min)
    }

    /// Collect due actions. A chat check always precedes a scan.
    pub fn poll(&mut self, now: Instant) -> Vec<Action> {
        let mut check_chat = false;

        if self.shell_due.is_some_and(|due| due <= now) {
            self.shell_due = None;
            check_chat = true;
        }

        if self.tick_due <= now {
            self.tick_due = now + self.timings.tick_interval;
            check_chat = true;
            // The tick scan still goes through the min-interval gate.
            self.scan_due = Some(self.scan_due.map_or(now, |d| d.min(now)));
        }

        let mut actions = Vec::new();
        if check_chat {
            actions.push(Action::CheckChat);
        }
        if self.effective_scan_due().is_some_and(|due| due <= now) {
            self.record_scan(now);
            actions.push(Action::Scan);
        }
        actions
    }

    pub fn has_pending_scan(&self) -> bool {
        self.scan_due.is_some()
    }
}
