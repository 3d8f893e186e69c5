//! Periodic and debounced saving of the live buffer.
//!
//! A background thread only keeps time. When a save is due it hands an
//! [`AutosaveTrigger`] to a sink (normally the UI event queue), and the save
//! itself runs on the UI thread between other events, so it can never observe
//! a note switch half-way through.

use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);
pub const EDIT_DEBOUNCE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveTrigger {
    Periodic,
    Debounced,
    NoteSwitch,
    Manual,
    Shutdown,
}

impl AutosaveTrigger {
    pub fn label(self) -> &'static str {
        match self {
            AutosaveTrigger::Periodic => "periodic",
            AutosaveTrigger::Debounced => "debounced",
            AutosaveTrigger::NoteSwitch => "switch",
            AutosaveTrigger::Manual => "manual",
            AutosaveTrigger::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    pub interval: Duration,
    /// Quiet time after the last edit before saving; `None` saves on the interval only.
    pub debounce: Option<Duration>,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            interval: AUTOSAVE_INTERVAL,
            debounce: Some(EDIT_DEBOUNCE),
        }
    }
}

/// Deadline bookkeeping, driven by explicit instants.
#[derive(Debug)]
pub struct AutosaveSchedule {
    config: AutosaveConfig,
    pending_deadline: Option<Instant>,
    next_periodic: Instant,
}

impl AutosaveSchedule {
    pub fn new(config: AutosaveConfig, now: Instant) -> Self {
        Self {
            config,
            pending_deadline: None,
            next_periodic: now + config.interval,
        }
    }

    pub fn note_edited(&mut self, now: Instant) {
        if let Some(debounce) = self.config.debounce {
            self.pending_deadline = Some(now + debounce);
        }
    }

    pub fn has_pending_edit(&self) -> bool {
        self.pending_deadline.is_some()
    }

    pub fn next_deadline(&self) -> Instant {
        match self.pending_deadline {
            Some(pending) => pending.min(self.next_periodic),
            None => self.next_periodic,
        }
    }

    /// Returns the save that is due at `now`, if any, and moves the deadlines on.
    pub fn poll(&mut self, now: Instant) -> Option<AutosaveTrigger> {
        if let Some(deadline) = self.pending_deadline {
            if now >= deadline {
                self.pending_deadline = None;
                self.next_periodic = now + self.config.interval;
                return Some(AutosaveTrigger::Debounced);
            }
        }

        if now >= self.next_periodic {
            self.next_periodic = now + self.config.interval;
            return Some(AutosaveTrigger::Periodic);
        }
        None
    }
}

#[derive(Debug)]
enum WorkerMessage {
    NoteEdited,
    Stop,
}

/// Cheap handle for reporting edits to the scheduler from anywhere.
#[derive(Debug, Clone)]
pub struct EditNotifier {
    sender: Sender<WorkerMessage>,
}

impl EditNotifier {
    pub fn note_edited(&self) {
        let _ = self.sender.send(WorkerMessage::NoteEdited);
    }
}

pub struct AutosaveScheduler {
    sender: Sender<WorkerMessage>,
    worker: Option<JoinHandle<()>>,
}

impl AutosaveScheduler {
    /// Starts the timer thread. `on_due` returns false once its receiver is
    /// gone, which ends the thread.
    pub fn start<F>(config: AutosaveConfig, on_due: F) -> io::Result<Self>
    where
        F: Fn(AutosaveTrigger) -> bool + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel::<WorkerMessage>();
        let worker = thread::Builder::new()
            .name("knot-autosave".to_string())
            .spawn(move || worker_loop(config, receiver, on_due))?;

        Ok(Self {
            sender,
            worker: Some(worker),
        })
    }

    pub fn edit_notifier(&self) -> EditNotifier {
        EditNotifier {
            sender: self.sender.clone(),
        }
    }

    pub fn note_edited(&self) {
        let _ = self.sender.send(WorkerMessage::NoteEdited);
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.sender.send(WorkerMessage::Stop);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("autosave worker panicked");
            }
        }
    }
}

impl Drop for AutosaveScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<F>(config: AutosaveConfig, receiver: Receiver<WorkerMessage>, on_due: F)
where
    F: Fn(AutosaveTrigger) -> bool,
{
    let mut schedule = AutosaveSchedule::new(config, Instant::now());

    loop {
        let timeout = schedule
            .next_deadline()
            .saturating_duration_since(Instant::now());
        match receiver.recv_timeout(timeout) {
            Ok(WorkerMessage::NoteEdited) => schedule.note_edited(Instant::now()),
            Ok(WorkerMessage::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        while let Some(trigger) = schedule.poll(Instant::now()) {
            debug!(trigger = trigger.label(), "autosave due");
            if !on_due(trigger) {
                debug!("autosave sink closed, stopping timer");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(interval_ms: u64, debounce_ms: Option<u64>) -> AutosaveConfig {
        AutosaveConfig {
            interval: Duration::from_millis(interval_ms),
            debounce: debounce_ms.map(Duration::from_millis),
        }
    }

    #[test]
    fn periodic_save_fires_every_interval() {
        let start = Instant::now();
        let mut schedule = AutosaveSchedule::new(config(30_000, None), start);

        assert_eq!(schedule.poll(start + Duration::from_secs(29)), None);
        assert_eq!(
            schedule.poll(start + Duration::from_secs(30)),
            Some(AutosaveTrigger::Periodic)
        );
        assert_eq!(schedule.poll(start + Duration::from_secs(31)), None);
        assert_eq!(
            schedule.poll(start + Duration::from_secs(60)),
            Some(AutosaveTrigger::Periodic)
        );
    }

    #[test]
    fn edits_debounce_until_quiet() {
        let start = Instant::now();
        let mut schedule = AutosaveSchedule::new(config(30_000, Some(2_000)), start);

        schedule.note_edited(start + Duration::from_secs(1));
        schedule.note_edited(start + Duration::from_secs(2));
        assert!(schedule.has_pending_edit());
        assert_eq!(schedule.poll(start + Duration::from_secs(3)), None);
        assert_eq!(
            schedule.poll(start + Duration::from_secs(4)),
            Some(AutosaveTrigger::Debounced)
        );
        assert!(!schedule.has_pending_edit());
        // the periodic timer restarts after a debounced save
        assert_eq!(schedule.poll(start + Duration::from_secs(30)), None);
    }

    #[test]
    fn edit_is_saved_within_one_interval_without_debounce() {
        let start = Instant::now();
        let mut schedule = AutosaveSchedule::new(config(30_000, None), start);

        schedule.note_edited(start + Duration::from_secs(10));
        assert_eq!(schedule.next_deadline(), start + Duration::from_secs(30));
        assert!(!schedule.has_pending_edit());
    }

    #[test]
    fn next_deadline_is_earliest_of_pending_and_periodic() {
        let start = Instant::now();
        let mut schedule = AutosaveSchedule::new(config(30_000, Some(2_000)), start);
        schedule.note_edited(start + Duration::from_secs(5));

        assert_eq!(schedule.next_deadline(), start + Duration::from_secs(7));
    }

    #[test]
    fn trigger_labels_name_their_trigger() {
        let labels: Vec<&str> = [
            AutosaveTrigger::Periodic,
            AutosaveTrigger::Debounced,
            AutosaveTrigger::NoteSwitch,
            AutosaveTrigger::Manual,
            AutosaveTrigger::Shutdown,
        ]
        .into_iter()
        .map(AutosaveTrigger::label)
        .collect();

        assert_eq!(labels, vec!["periodic", "debounced", "switch", "manual", "shutdown"]);
    }

    #[test]
    fn worker_posts_periodic_triggers() {
        let (tx, rx) = mpsc::channel();
        let scheduler = AutosaveScheduler::start(config(20, None), move |trigger| {
            tx.send(trigger).is_ok()
        })
        .expect("worker starts");

        let trigger = rx.recv_timeout(Duration::from_secs(5)).expect("tick");
        assert_eq!(trigger, AutosaveTrigger::Periodic);
        scheduler.stop();
    }

    #[test]
    fn worker_posts_debounced_trigger_after_edit() {
        let (tx, rx) = mpsc::channel();
        let scheduler = AutosaveScheduler::start(config(60_000, Some(10)), move |trigger| {
            tx.send(trigger).is_ok()
        })
        .expect("worker starts");

        scheduler.edit_notifier().note_edited();
        let trigger = rx.recv_timeout(Duration::from_secs(5)).expect("debounced save");
        assert_eq!(trigger, AutosaveTrigger::Debounced);
        scheduler.stop();
    }
}
