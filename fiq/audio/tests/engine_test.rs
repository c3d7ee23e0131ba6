//! Playback engine tests: session slot, cursor, duty, ramps, period events

use fiqmux_audio::{AudioEngine, RampDir};
use fiqmux_core::{Error, PwmSink, SharedRing, TickRate, IDLE_DUTY, MAX_VOLUME};

use std::cell::RefCell;
use std::rc::Rc;

/// Records every duty cycle it is handed; clones share the record
#[derive(Clone, Default)]
struct MockPwm {
    duties: Rc<RefCell<std::vec::Vec<u8>>>,
}

impl MockPwm {
    fn last(&self) -> Option<u8> {
        self.duties.borrow().last().copied()
    }
}

impl PwmSink for MockPwm {
    fn set_duty(&mut self, duty: u8) {
        self.duties.borrow_mut().push(duty);
    }
}

const RATE: TickRate = TickRate::hz(1000);

#[test]
fn prepare_twice_is_busy() {
    let source = [0x80u8; 8];
    let mut engine = AudioEngine::new(MockPwm::default(), RATE);

    engine.prepare(&source, MAX_VOLUME, 4).unwrap();
    assert_eq!(engine.prepare(&source, MAX_VOLUME, 4), Err(Error::Busy));

    engine.release();
    engine.prepare(&source, MAX_VOLUME, 4).unwrap();
}

#[test]
fn request_reserves_the_single_slot() {
    let mut engine: AudioEngine<'_, MockPwm> = AudioEngine::new(MockPwm::default(), RATE);
    engine.request().unwrap();
    assert_eq!(engine.request(), Err(Error::Busy));
    engine.release();
    engine.request().unwrap();
}

#[test]
fn prepare_validates_arguments() {
    let source = [0u8; 4];
    let mut engine = AudioEngine::new(MockPwm::default(), RATE);
    assert_eq!(
        engine.prepare(&source, MAX_VOLUME, 0),
        Err(Error::InvalidArgument)
    );
    assert_eq!(
        engine.prepare(&source, MAX_VOLUME + 1, 4),
        Err(Error::InvalidArgument)
    );
}

#[test]
fn duty_scales_sample_by_volume() {
    let source = [200u8; 4];
    let pwm = MockPwm::default();
    let mut engine = AudioEngine::new(pwm.clone(), RATE);
    engine.prepare(&source, 128, 100).unwrap();
    engine.tick();
    // 200 * 128 / 256
    assert_eq!(pwm.last(), Some(100));
    assert_eq!(engine.volume(), 128);
}

#[test]
fn playback_ptr_is_monotonic_and_resets_on_prepare() {
    let source = [0x80u8; 8];
    let mut engine = AudioEngine::new(MockPwm::default(), RATE);
    engine.prepare(&source, MAX_VOLUME, 100).unwrap();

    let mut last = engine.playback_ptr();
    assert_eq!(last, 0);
    for _ in 0..50 {
        engine.tick();
        let now = engine.playback_ptr();
        assert!(now >= last);
        last = now;
    }
    assert_eq!(last, 50);

    engine.release();
    engine.prepare(&source, MAX_VOLUME, 100).unwrap();
    assert_eq!(engine.playback_ptr(), 0);
}

#[test]
fn period_event_fires_every_int_period_samples() {
    let source = [0x80u8; 8];
    let mut engine = AudioEngine::new(MockPwm::default(), RATE);
    engine.prepare(&source, MAX_VOLUME, 4).unwrap();

    let mut events = std::vec::Vec::new();
    for _ in 0..12 {
        if let Some(count) = engine.tick() {
            events.push(count);
        }
    }
    assert_eq!(events, vec![4, 8, 12]);
}

#[test]
fn int_disable_freezes_events_but_not_the_cursor() {
    let source = [0x80u8; 8];
    let mut engine = AudioEngine::new(MockPwm::default(), RATE);
    engine.prepare(&source, MAX_VOLUME, 2).unwrap();

    engine.int_disable();
    for _ in 0..6 {
        assert_eq!(engine.tick(), None);
    }
    assert_eq!(engine.playback_ptr(), 6);

    engine.int_enable();
    let mut fired = None;
    for _ in 0..2 {
        if let Some(count) = engine.tick() {
            fired = Some(count);
        }
    }
    assert_eq!(fired, Some(8));
}

#[test]
fn ramp_down_reaches_zero_by_the_deadline_and_holds() {
    let source = [0xFFu8; 8];
    let mut engine = AudioEngine::new(MockPwm::default(), RATE);
    engine.prepare(&source, MAX_VOLUME, 1000).unwrap();

    // 10 ms at 1 kHz is 10 ticks; one extra tick of slack is allowed.
    engine.ramp(RampDir::Down, 10);
    for _ in 0..11 {
        engine.tick();
    }
    assert_eq!(engine.volume(), 0);
    for _ in 0..20 {
        engine.tick();
        assert_eq!(engine.volume(), 0);
    }
}

#[test]
fn ramp_up_returns_to_requested_volume() {
    let source = [0xFFu8; 8];
    let mut engine = AudioEngine::new(MockPwm::default(), RATE);
    engine.prepare(&source, 200, 1000).unwrap();

    engine.ramp(RampDir::Down, 5);
    for _ in 0..6 {
        engine.tick();
    }
    assert_eq!(engine.volume(), 0);

    engine.ramp(RampDir::Up, 5);
    for _ in 0..6 {
        engine.tick();
    }
    assert_eq!(engine.volume(), 200);
}

#[test]
fn set_volume_keeps_an_inflight_ramp_target() {
    let source = [0xFFu8; 8];
    let mut engine = AudioEngine::new(MockPwm::default(), RATE);
    engine.prepare(&source, MAX_VOLUME, 1000).unwrap();

    engine.ramp(RampDir::Down, 20);
    for _ in 0..5 {
        engine.tick();
    }
    // Jumping the volume does not cancel the ramp; it still lands on zero.
    engine.set_volume(MAX_VOLUME);
    for _ in 0..30 {
        engine.tick();
    }
    assert_eq!(engine.volume(), 0);
}

#[test]
fn ring_index_follows_cursor_modulo_length() {
    // Odd-length ring: the duty sequence must stay phase-locked to the
    // cursor across wraps.
    let source = [10u8, 20, 30];
    let pwm = MockPwm::default();
    let mut engine = AudioEngine::new(pwm.clone(), RATE);
    engine.prepare(&source, MAX_VOLUME, 100).unwrap();
    for _ in 0..7 {
        engine.tick();
    }
    assert_eq!(&*pwm.duties.borrow(), &[10, 20, 30, 10, 20, 30, 10]);
}

#[test]
fn release_silences_the_output() {
    let source = [0xFFu8; 4];
    let pwm = MockPwm::default();
    let mut engine = AudioEngine::new(pwm.clone(), RATE);
    engine.prepare(&source, MAX_VOLUME, 100).unwrap();
    engine.tick();
    assert_eq!(pwm.last(), Some(0xFF));

    engine.release();
    assert_eq!(pwm.last(), Some(IDLE_DUTY));
    assert!(!engine.is_prepared());
    assert_eq!(engine.tick(), None);
}

#[test]
fn shared_ring_feeds_the_engine() {
    let ring: SharedRing<4> = SharedRing::new();
    ring.write_at(0, &[10, 20, 30, 40]);

    let mut engine = AudioEngine::new(MockPwm::default(), RATE);
    engine.prepare(&ring, MAX_VOLUME, 100).unwrap();
    for _ in 0..4 {
        engine.tick();
    }
    // Wraps back to the start of the ring.
    assert_eq!(engine.playback_ptr(), 4);
    ring.write_at(engine.playback_ptr(), &[50]);
    engine.tick();
    assert_eq!(engine.playback_ptr(), 5);
}
