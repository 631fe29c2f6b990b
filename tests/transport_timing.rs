use std::time::Duration;

use beatbox::pipeline::transport::{step_interval, Clock, ManualClock, TransportClock, TransportState, MAX_TEMPO, MIN_TEMPO};

fn playing_at(tempo: u32, swing: u8) -> (TransportClock, ManualClock) {
    let clock = ManualClock::new();
    let state = TransportState { tempo, swing, ..TransportState::default() };
    let mut transport = TransportClock::with_state(Box::new(clock.clone()), state);
    transport.play();
    (transport, clock)
}

#[test]
fn average_interval_matches_tempo_across_the_range() {
    for tempo in MIN_TEMPO..=MAX_TEMPO {
        let (mut transport, clock) = playing_at(tempo, 0);
        let mut fire_times = Vec::new();
        while fire_times.len() < 17 {
            clock.advance(Duration::from_millis(1));
            let now = clock.now();
            for _ in 0..transport.advance(|_| {}) {
                fire_times.push(now);
            }
        }
        let mean_ms = (fire_times[16] - fire_times[0]).as_secs_f64() * 1000.0 / 16.0;
        let expected_ms = (60.0 / tempo as f64) * 1000.0 / 4.0;
        assert!(
            (mean_ms - expected_ms).abs() < 0.1,
            "tempo {tempo}: mean {mean_ms}ms, expected {expected_ms}ms"
        );
    }
}

#[test]
fn swing_delays_only_odd_steps() {
    for swing in [0u8, 10, 33, 50] {
        let (mut transport, clock) = playing_at(120, swing);
        let interval = step_interval(120);
        let delay = interval.mul_f64(swing as f64 / 100.0);

        let mut fired_at = Vec::new();
        for n in 0..32u32 {
            let odd = n % 2 == 1;
            let due = interval * (n + 1) + if odd { delay } else { Duration::ZERO };

            clock.set(due - Duration::from_micros(1));
            assert_eq!(transport.advance(|_| {}), 0, "swing {swing}: step {n} fired early");
            clock.set(due);
            let mut steps = Vec::new();
            transport.advance(|s| steps.push(s));
            assert_eq!(steps, vec![(n % 16) as u8], "swing {swing}: step {n} late or missing");
            fired_at.push(due);
        }

        // the grid is untouched, so a whole bar still lasts 16 intervals
        assert_eq!(fired_at[16] - fired_at[0], interval * 16);
        assert_eq!(fired_at[17] - fired_at[1], interval * 16);
    }
}

#[test]
fn tempo_change_mid_bar_keeps_the_step_sequence() {
    let (mut transport, clock) = playing_at(120, 0);
    let mut seen = Vec::new();
    for ms in (0..=3_000).step_by(5) {
        clock.set(Duration::from_millis(ms));
        if ms == 1_000 {
            transport.set_tempo(90);
        }
        if ms == 2_000 {
            transport.set_tempo(200);
        }
        transport.advance(|s| seen.push(s));
    }
    let expected: Vec<u8> = (0..seen.len()).map(|i| (i % 16) as u8).collect();
    assert_eq!(seen, expected);
}
