//! The step clock.
//!
//! Steps are scheduled against a [`Clock`] rather than counted from frame
//! deltas: the timer remembers when it was (re)started and how many steps it
//! has fired since, so the nominal instant of fire `n` is
//! `anchor + (n + 1) * interval` no matter how late the event loop polls.
//! Swing only shifts the trigger instant of odd steps; the grid underneath
//! never moves, which keeps the average tempo exact.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::shared::STEPS_PER_PATTERN;

pub const MIN_TEMPO: u32 = 8;
pub const MAX_TEMPO: u32 = 200;
pub const MAX_SWING: u8 = 50;

/// Source of "now", as a duration since some fixed origin.
pub trait Clock {
    fn now(&self) -> Duration;
}

pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, at: Duration) {
        self.now.set(at);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayState {
    Stopped,
    Playing,
    Paused,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    StepChanged(u8),
    StateChanged(PlayState),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransportState {
    pub play_state: PlayState,
    pub current_step: u8,
    pub tempo: u32,
    pub swing: u8,
    pub master_volume: f32,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        self.play_state == PlayState::Playing
    }
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            play_state: PlayState::Stopped,
            current_step: 0,
            tempo: 120,
            swing: 0,
            master_volume: 0.7,
        }
    }
}

// (60 / tempo) * 1000 / 4 ms
pub fn step_interval(tempo: u32) -> Duration {
    Duration::from_secs_f64(15.0 / tempo.clamp(MIN_TEMPO, MAX_TEMPO) as f64)
}

#[derive(Clone, Copy, Debug)]
struct StepTimer {
    anchor: Duration,
    fired: u32,
}

pub struct TransportClock {
    clock: Box<dyn Clock>,
    state: TransportState,
    timer: Option<StepTimer>,
    subscribers: Vec<Sender<TransportEvent>>,
    generation: u64,
}

impl TransportClock {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self::with_state(clock, TransportState::default())
    }

    // play state and step are ignored, a restored transport always starts stopped
    pub fn with_state(clock: Box<dyn Clock>, state: TransportState) -> Self {
        let mut transport = Self {
            clock,
            state: TransportState::default(),
            timer: None,
            subscribers: Vec::new(),
            generation: 0,
        };
        transport.set_tempo(state.tempo);
        transport.set_swing(state.swing);
        transport.set_master_volume(state.master_volume);
        transport
    }

    pub fn state(&self) -> &TransportState {
        &self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    pub fn current_step(&self) -> u8 {
        self.state.current_step
    }

    pub fn step_interval(&self) -> Duration {
        step_interval(self.state.tempo)
    }

    /// Bumped on every stop; work issued under an older generation is stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn subscribe(&mut self) -> Receiver<TransportEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: TransportEvent) {
        // dropped receivers unsubscribe themselves
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }

    fn set_play_state(&mut self, next: PlayState) {
        if self.state.play_state != next {
            self.state.play_state = next;
            info!(state = ?next, "transport");
            self.emit(TransportEvent::StateChanged(next));
        }
    }

    // -- transport --

    pub fn play(&mut self) {
        if self.is_playing() {
            return;
        }
        self.timer = Some(StepTimer { anchor: self.clock.now(), fired: 0 });
        self.set_play_state(PlayState::Playing);
    }

    pub fn pause(&mut self) {
        if !self.is_playing() {
            return;
        }
        self.timer = None;
        self.set_play_state(PlayState::Paused);
    }

    pub fn toggle_play(&mut self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn stop(&mut self) {
        self.timer = None;
        self.generation += 1;
        self.state.current_step = 0;
        self.emit(TransportEvent::StepChanged(0));
        self.set_play_state(PlayState::Stopped);
    }

    // back to the top without touching the timer
    pub fn rewind(&mut self) {
        self.state.current_step = 0;
        self.emit(TransportEvent::StepChanged(0));
    }

    // -- live parameters --

    pub fn set_tempo(&mut self, tempo: u32) -> u32 {
        let tempo = tempo.clamp(MIN_TEMPO, MAX_TEMPO);
        if tempo == self.state.tempo {
            return tempo;
        }
        self.state.tempo = tempo;
        if let Some(timer) = self.timer.as_mut() {
            // the pending step fires one new interval from now
            *timer = StepTimer { anchor: self.clock.now(), fired: 0 };
        }
        debug!(tempo, "tempo changed");
        tempo
    }

    pub fn set_swing(&mut self, swing: u8) -> u8 {
        self.state.swing = swing.min(MAX_SWING);
        self.state.swing
    }

    pub fn set_master_volume(&mut self, volume: f32) -> f32 {
        self.state.master_volume = volume.clamp(0.0, 1.0);
        self.state.master_volume
    }

    // -- scheduling --

    fn swing_delay(&self, step: u8) -> Duration {
        if step % 2 == 1 {
            self.step_interval().mul_f64(self.state.swing as f64 / 100.0)
        } else {
            Duration::ZERO
        }
    }

    fn due_at(&self, timer: StepTimer) -> Duration {
        timer.anchor + self.step_interval() * (timer.fired + 1) + self.swing_delay(self.state.current_step)
    }

    /// Time left until the next step fires, if playing.
    pub fn until_next_step(&self) -> Option<Duration> {
        let timer = self.timer?;
        Some(self.due_at(timer).saturating_sub(self.clock.now()))
    }

    /// Fire every step that is due. `on_step` gets the step index and must
    /// issue all of that step's triggers; the step advances after it returns.
    pub fn advance<F: FnMut(u8)>(&mut self, mut on_step: F) -> usize {
        let now = self.clock.now();
        let cycle = self.step_interval() * STEPS_PER_PATTERN as u32;
        let mut fired = 0;

        while let Some(mut timer) = self.timer {
            let mut due = self.due_at(timer);
            if now < due {
                break;
            }
            if now - due > cycle {
                // the loop was stalled for a whole bar; pick up from here instead of bursting
                warn!(behind_ms = (now - due).as_millis() as u64, "transport fell behind, re-anchoring");
                timer = StepTimer { anchor: now - self.step_interval(), fired: 0 };
                self.timer = Some(timer);
                due = self.due_at(timer);
                if now < due {
                    break;
                }
            }

            let step = self.state.current_step;
            on_step(step);

            let next = (step + 1) % STEPS_PER_PATTERN as u8;
            self.state.current_step = next;
            self.timer = Some(StepTimer { fired: timer.fired + 1, ..timer });
            self.emit(TransportEvent::StepChanged(next));
            fired += 1;
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn transport() -> (TransportClock, ManualClock) {
        let clock = ManualClock::new();
        (TransportClock::new(Box::new(clock.clone())), clock)
    }

    #[test]
    fn first_step_fires_one_interval_after_play() {
        let (mut t, clock) = transport();
        t.play();
        clock.set(ms(124));
        assert_eq!(t.advance(|_| {}), 0);
        clock.set(ms(125));
        let mut seen = vec![];
        assert_eq!(t.advance(|s| seen.push(s)), 1);
        assert_eq!(seen, vec![0]);
        assert_eq!(t.current_step(), 1);
    }

    #[test]
    fn late_polls_catch_up_in_order() {
        let (mut t, clock) = transport();
        t.play();
        clock.set(ms(500));
        let mut seen = vec![];
        t.advance(|s| seen.push(s));
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn long_stall_re_anchors() {
        let (mut t, clock) = transport();
        t.play();
        clock.set(Duration::from_secs(60));
        let mut n = 0;
        t.advance(|_| n += 1);
        assert_eq!(n, 1);
        clock.advance(ms(125));
        t.advance(|_| n += 1);
        assert_eq!(n, 2);
    }

    #[test]
    fn pause_keeps_step_and_stop_resets() {
        let (mut t, clock) = transport();
        let events = t.subscribe();
        t.play();
        clock.set(ms(250));
        t.advance(|_| {});
        t.pause();
        assert_eq!(t.current_step(), 2);
        clock.set(ms(10_000));
        assert_eq!(t.advance(|_| panic!("paused")), 0);

        t.play();
        clock.advance(ms(125));
        let mut seen = vec![];
        t.advance(|s| seen.push(s));
        assert_eq!(seen, vec![2]);

        let generation = t.generation();
        t.stop();
        assert_eq!(t.current_step(), 0);
        assert_eq!(t.generation(), generation + 1);
        assert_eq!(t.until_next_step(), None);

        let got: Vec<_> = events.try_iter().collect();
        assert_eq!(got.first(), Some(&TransportEvent::StateChanged(PlayState::Playing)));
        assert!(got.contains(&TransportEvent::StateChanged(PlayState::Paused)));
        assert_eq!(
            &got[got.len() - 2..],
            &[TransportEvent::StepChanged(0), TransportEvent::StateChanged(PlayState::Stopped)]
        );
    }

    #[test]
    fn tempo_change_neither_doubles_nor_skips() {
        let (mut t, clock) = transport();
        t.play();
        clock.set(ms(200)); // step 0 fired at 125, step 1 pending
        let mut seen = vec![];
        t.advance(|s| seen.push(s));
        t.set_tempo(60); // 250ms steps
        clock.set(ms(449));
        t.advance(|s| seen.push(s));
        assert_eq!(seen, vec![0]);
        clock.set(ms(450));
        t.advance(|s| seen.push(s));
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn rewind_keeps_playing() {
        let (mut t, clock) = transport();
        t.play();
        clock.set(ms(375));
        t.advance(|_| {});
        t.rewind();
        assert!(t.is_playing());
        clock.set(ms(500));
        let mut seen = vec![];
        t.advance(|s| seen.push(s));
        assert_eq!(seen, vec![0]);
    }

    #[test]
    fn setters_clamp() {
        let (mut t, _) = transport();
        assert_eq!(t.set_tempo(1), MIN_TEMPO);
        assert_eq!(t.set_tempo(999), MAX_TEMPO);
        assert_eq!(t.set_swing(90), MAX_SWING);
        assert_eq!(t.set_master_volume(-2.0), 0.0);
    }
}
