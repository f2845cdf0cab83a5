/// Main-thread reconciliation of the cached mute state.
///
/// Each [`Poller::tick`] first consumes the headset gesture flag raised by the
/// listener thread and, if it was set, performs a toggle.  Otherwise, once the
/// resync interval has elapsed, it re-reads the authoritative state and
/// re-renders the indicator if something outside the daemon changed it (volume
/// keys, the one-shot `toggle` command, System Settings).
///
/// Ticks are serialized by the caller, so at most one toggle is in flight.
use std::time::{Duration, Instant};

use crate::error::ScriptError;
use crate::indicator::Indicator;
use crate::listener::MuteSignal;
use crate::mic::{self, MuteControl};

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing pending and no drift observed (or the resync was not due).
    Idle,
    /// A gesture was consumed and the microphone is now in `muted`.
    Toggled { muted: bool },
    /// The authoritative state disagreed with the cache and was adopted.
    Resynced { muted: bool },
    /// A gesture was consumed but the toggle could not be completed.
    Failed,
}

pub struct Poller<M, I> {
    mic: M,
    indicator: I,
    signal: MuteSignal,
    resync_interval: Duration,
    next_resync: Instant,
    muted: bool,
}

impl<M: MuteControl, I: Indicator> Poller<M, I> {
    /// Reads the initial state and shows it.  An unreadable state is treated
    /// as live until the next successful resync.
    pub fn new(mic: M, mut indicator: I, signal: MuteSignal, resync_interval: Duration) -> Self {
        let muted = mic.is_muted().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not read initial mute state; assuming live");
            false
        });
        indicator.show(muted);
        Self {
            mic,
            indicator,
            signal,
            resync_interval,
            next_resync: Instant::now() + resync_interval,
            muted,
        }
    }

    /// Last confirmed mute state.
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn mic_mut(&mut self) -> &mut M {
        &mut self.mic
    }

    pub fn indicator_mut(&mut self) -> &mut I {
        &mut self.indicator
    }

    pub fn set_resync_interval(&mut self, interval: Duration) {
        self.resync_interval = interval;
        self.next_resync = self.next_resync.min(Instant::now() + interval);
    }

    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if self.signal.take() {
            // The toggle reads authoritative state itself, so it doubles as a resync.
            self.next_resync = now + self.resync_interval;
            return match self.toggle() {
                Ok(muted) => {
                    tracing::info!(muted, "headset gesture toggled microphone");
                    TickOutcome::Toggled { muted }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "headset gesture toggle failed");
                    self.indicator.report_error(&format!("toggle failed: {e}"));
                    TickOutcome::Failed
                }
            };
        }

        if now < self.next_resync {
            return TickOutcome::Idle;
        }
        self.next_resync = now + self.resync_interval;

        match self.mic.is_muted() {
            Ok(muted) if muted != self.muted => {
                tracing::info!(muted, "mute state changed externally");
                self.adopt(muted);
                TickOutcome::Resynced { muted }
            }
            Ok(_) => TickOutcome::Idle,
            Err(e) => {
                tracing::warn!(error = %e, "could not read mute state; keeping cached value");
                TickOutcome::Idle
            }
        }
    }

    /// Flips the microphone relative to its current authoritative state and
    /// returns the state confirmed afterwards.
    pub fn toggle(&mut self) -> Result<bool, ScriptError> {
        let confirmed = mic::toggle(&self.mic)?;
        self.adopt(confirmed);
        Ok(confirmed)
    }

    fn adopt(&mut self, muted: bool) {
        self.muted = muted;
        self.indicator.show(muted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Read,
        Write(bool),
    }

    /// In-memory microphone; `fail_reads` makes every read return an error.
    #[derive(Default)]
    struct FakeMic {
        muted: Cell<bool>,
        fail_reads: Cell<bool>,
        fail_writes: Cell<bool>,
        calls: RefCell<Vec<Call>>,
    }

    impl MuteControl for Rc<FakeMic> {
        fn is_muted(&self) -> Result<bool, ScriptError> {
            self.calls.borrow_mut().push(Call::Read);
            if self.fail_reads.get() {
                return Err(ScriptError::UnexpectedOutput("missing value".into()));
            }
            Ok(self.muted.get())
        }

        fn set_muted(&self, muted: bool) -> Result<(), ScriptError> {
            self.calls.borrow_mut().push(Call::Write(muted));
            if self.fail_writes.get() {
                return Err(ScriptError::Failed { code: 1, stderr: "denied".into() });
            }
            self.muted.set(muted);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeIndicator {
        shown: RefCell<Vec<bool>>,
        errors: RefCell<Vec<String>>,
    }

    impl Indicator for Rc<FakeIndicator> {
        fn show(&mut self, muted: bool) {
            self.shown.borrow_mut().push(muted);
        }

        fn report_error(&mut self, message: &str) {
            self.errors.borrow_mut().push(message.to_string());
        }
    }

    const RESYNC: Duration = Duration::from_secs(1);

    fn setup(muted: bool) -> (Poller<Rc<FakeMic>, Rc<FakeIndicator>>, Rc<FakeMic>, Rc<FakeIndicator>, MuteSignal) {
        let mic = Rc::new(FakeMic::default());
        mic.muted.set(muted);
        let ind = Rc::new(FakeIndicator::default());
        let signal = MuteSignal::new();
        let poller = Poller::new(Rc::clone(&mic), Rc::clone(&ind), signal.clone(), RESYNC);
        mic.calls.borrow_mut().clear();
        (poller, mic, ind, signal)
    }

    // ── startup ───────────────────────────────────────────────────────────────

    #[test]
    fn new_shows_initial_state() {
        let (poller, _mic, ind, _signal) = setup(true);
        assert!(poller.is_muted());
        assert_eq!(*ind.shown.borrow(), vec![true]);
    }

    #[test]
    fn new_treats_unreadable_state_as_live() {
        let mic = Rc::new(FakeMic::default());
        mic.muted.set(true);
        mic.fail_reads.set(true);
        let ind = Rc::new(FakeIndicator::default());
        let poller = Poller::new(Rc::clone(&mic), Rc::clone(&ind), MuteSignal::new(), RESYNC);
        assert!(!poller.is_muted());
        assert_eq!(*ind.shown.borrow(), vec![false]);
    }

    // ── gesture flag ──────────────────────────────────────────────────────────

    #[test]
    fn raised_flag_is_consumed_by_exactly_one_tick() {
        let (mut poller, mic, _ind, signal) = setup(false);
        let now = Instant::now();
        signal.raise();

        assert_eq!(poller.tick(now), TickOutcome::Toggled { muted: true });
        assert!(!signal.is_raised());
        assert_eq!(poller.tick(now), TickOutcome::Idle);
        assert!(mic.muted.get(), "second tick must not toggle back");
    }

    #[test]
    fn flag_raised_on_another_thread_is_observed() {
        let (mut poller, mic, _ind, signal) = setup(false);
        let producer = signal.clone();
        std::thread::spawn(move || producer.raise()).join().unwrap();

        assert_eq!(poller.tick(Instant::now()), TickOutcome::Toggled { muted: true });
        assert!(mic.muted.get());
    }

    #[test]
    fn idle_tick_without_flag_does_nothing() {
        let (mut poller, mic, ind, _signal) = setup(false);
        assert_eq!(poller.tick(Instant::now()), TickOutcome::Idle);
        assert!(mic.calls.borrow().is_empty());
        assert_eq!(ind.shown.borrow().len(), 1);
    }

    #[test]
    fn coalesced_gestures_toggle_once() {
        let (mut poller, mic, _ind, signal) = setup(false);
        signal.raise();
        signal.raise();
        poller.tick(Instant::now());
        assert!(mic.muted.get());
        let writes = mic.calls.borrow().iter().filter(|c| matches!(c, Call::Write(_))).count();
        assert_eq!(writes, 1);
    }

    // ── toggle reads before it writes ─────────────────────────────────────────

    #[test]
    fn toggle_uses_authoritative_state_not_cache() {
        let (mut poller, mic, ind, signal) = setup(false);
        // Muted behind the poller's back; cache still says live.
        mic.muted.set(true);
        signal.raise();

        assert_eq!(poller.tick(Instant::now()), TickOutcome::Toggled { muted: false });
        assert_eq!(
            *mic.calls.borrow(),
            vec![Call::Read, Call::Write(false), Call::Read]
        );
        assert_eq!(ind.shown.borrow().last(), Some(&false));
    }

    #[test]
    fn failed_pre_read_aborts_without_writing() {
        let (mut poller, mic, ind, signal) = setup(false);
        mic.fail_reads.set(true);
        signal.raise();

        assert_eq!(poller.tick(Instant::now()), TickOutcome::Failed);
        assert!(!signal.is_raised(), "a failed toggle still consumes the gesture");
        assert_eq!(*mic.calls.borrow(), vec![Call::Read]);
        assert_eq!(ind.errors.borrow().len(), 1);
        assert!(!poller.is_muted());
    }

    #[test]
    fn failed_write_keeps_cached_state() {
        let (mut poller, mic, ind, signal) = setup(true);
        mic.fail_writes.set(true);
        signal.raise();

        assert_eq!(poller.tick(Instant::now()), TickOutcome::Failed);
        assert!(poller.is_muted());
        assert_eq!(*ind.shown.borrow(), vec![true]);
        assert!(ind.errors.borrow()[0].contains("denied"));
    }

    // ── indicator follows every toggle ────────────────────────────────────────

    #[test]
    fn indicator_reflects_state_after_every_toggle() {
        let (mut poller, mic, ind, _signal) = setup(false);
        for _ in 0..4 {
            let muted = poller.toggle().unwrap();
            assert_eq!(muted, mic.muted.get());
            assert_eq!(ind.shown.borrow().last(), Some(&muted));
            assert_eq!(poller.is_muted(), muted);
        }
        assert_eq!(*ind.shown.borrow(), vec![false, true, false, true, false]);
    }

    // ── drift correction ──────────────────────────────────────────────────────

    #[test]
    fn drift_is_corrected_once_resync_is_due() {
        let (mut poller, mic, ind, _signal) = setup(false);
        let start = Instant::now();
        mic.muted.set(true);

        assert_eq!(poller.tick(start), TickOutcome::Idle, "resync not due yet");
        assert_eq!(
            poller.tick(start + RESYNC * 2),
            TickOutcome::Resynced { muted: true }
        );
        assert!(poller.is_muted());
        assert_eq!(ind.shown.borrow().last(), Some(&true));
    }

    #[test]
    fn resync_without_drift_does_not_rerender() {
        let (mut poller, _mic, ind, _signal) = setup(false);
        assert_eq!(poller.tick(Instant::now() + RESYNC * 2), TickOutcome::Idle);
        assert_eq!(ind.shown.borrow().len(), 1);
    }

    #[test]
    fn unreadable_state_during_resync_keeps_cache() {
        let (mut poller, mic, ind, _signal) = setup(true);
        mic.fail_reads.set(true);
        assert_eq!(poller.tick(Instant::now() + RESYNC * 2), TickOutcome::Idle);
        assert!(poller.is_muted());
        assert!(ind.errors.borrow().is_empty());
    }

    #[test]
    fn gesture_takes_priority_over_drift_in_the_same_tick() {
        let (mut poller, mic, _ind, signal) = setup(false);
        let due = Instant::now() + RESYNC * 2;
        mic.muted.set(true);
        signal.raise();

        // The toggle flips the authoritative (muted) state to live.
        assert_eq!(poller.tick(due), TickOutcome::Toggled { muted: false });
        // The toggle counted as a resync, so the next tick at the same instant is idle.
        assert_eq!(poller.tick(due), TickOutcome::Idle);
        assert!(!mic.muted.get());
    }

    #[test]
    fn shorter_resync_interval_takes_effect_immediately() {
        let (mut poller, mic, _ind, _signal) = setup(false);
        poller.set_resync_interval(Duration::from_millis(100));
        mic.muted.set(true);
        let outcome = poller.tick(Instant::now() + Duration::from_millis(200));
        assert_eq!(outcome, TickOutcome::Resynced { muted: true });
    }
}
