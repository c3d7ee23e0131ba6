//! End-to-end dispatcher tests: both duties on one tick context

use fiqmux::sim::{SimSlave, WireEvent};
use fiqmux::{
    CompletionBridge, CompletionSink, Error, Msg, Notification, NotifyQueue, PinId,
    PlatformConfig, PortHandle, PortId, PortPins, PwmSink, RampDir, RtMux, SharedMux, SharedRing,
    TickRate, TickSourceId, XferStatus,
};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Default)]
struct MockPwm {
    duties: Rc<RefCell<Vec<u8>>>,
}

impl PwmSink for MockPwm {
    fn set_duty(&mut self, duty: u8) {
        self.duties.borrow_mut().push(duty);
    }
}

#[derive(Default)]
struct Recorder {
    xfers: Vec<(PortId, u32, XferStatus, Vec<u8>)>,
    periods: Vec<u64>,
    overruns: Vec<u32>,
}

impl CompletionSink for Recorder {
    fn xfer_complete(&mut self, port: PortId, token: u32, status: XferStatus, read_back: &[u8]) {
        self.xfers.push((port, token, status, read_back.to_vec()));
    }

    fn period_elapsed(&mut self, sample_count: u64) {
        self.periods.push(sample_count);
    }

    fn overrun(&mut self, dropped: u32) {
        self.overruns.push(dropped);
    }
}

fn config() -> PlatformConfig {
    PlatformConfig {
        ports: [PortPins {
            data: PinId(0),
            clock: PinId(1),
        }; PortId::COUNT],
        bus_tick: TickSourceId(0),
        audio_tick: TickSourceId(1),
        status: PinId(9),
    }
}

const RATE: TickRate = TickRate::hz(1000);

fn one_write() -> heapless::Vec<Msg, 4> {
    let mut msgs = heapless::Vec::new();
    msgs.push(Msg::write(0x10, &[0x01, 0x02]).unwrap()).unwrap();
    msgs
}

#[test]
fn write_transfer_completes_through_the_bridge() {
    let mut queue = NotifyQueue::new();
    let (tx, rx) = queue.split();
    let mux = SharedMux::new(RtMux::new(tx, MockPwm::default(), RATE, config()));
    let mut bridge = CompletionBridge::new(rx);
    let mut sink = Recorder::default();

    let handle = mux.request_port(PortId::In1, SimSlave::new()).unwrap();
    mux.start_xfer(handle, one_write(), 42).unwrap();

    for _ in 0..200 {
        mux.tick();
    }
    assert_eq!(bridge.poll(&mut sink), 1);
    assert_eq!(sink.xfers.len(), 1);
    let (port, token, status, read_back) = &sink.xfers[0];
    assert_eq!(*port, PortId::In1);
    assert_eq!(*token, 42);
    assert_eq!(*status, Ok(()));
    assert!(read_back.is_empty());

    let slave = mux.release_port(handle).unwrap();
    assert_eq!(
        slave.log(),
        &[
            WireEvent::Start,
            WireEvent::Byte {
                value: 0x10 << 1,
                ack: true
            },
            WireEvent::Byte {
                value: 0x01,
                ack: true
            },
            WireEvent::Byte {
                value: 0x02,
                ack: true
            },
            WireEvent::Stop,
        ]
    );
}

#[test]
fn two_ports_share_the_context_without_starvation() {
    let mut queue = NotifyQueue::new();
    let (tx, rx) = queue.split();
    let mut mux = RtMux::new(tx, MockPwm::default(), RATE, config());
    // One step per tick forces the two transfers to interleave.
    mux.set_work_budget(1);
    let mut bridge = CompletionBridge::new(rx);
    let mut sink = Recorder::default();

    let h1 = mux.request_port(PortId::In1, SimSlave::new()).unwrap();
    let h2 = mux.request_port(PortId::In2, SimSlave::new()).unwrap();
    mux.start_xfer(h1, one_write(), 1).unwrap();
    mux.start_xfer(h2, one_write(), 2).unwrap();

    for _ in 0..500 {
        mux.tick();
    }
    bridge.poll(&mut sink);
    let mut tokens: Vec<u32> = sink.xfers.iter().map(|x| x.1).collect();
    tokens.sort_unstable();
    assert_eq!(tokens, vec![1, 2]);
    assert!(sink.xfers.iter().all(|x| x.2 == Ok(())));
}

#[test]
fn bus_work_outranks_audio_when_the_budget_is_tight() {
    let mut queue = NotifyQueue::new();
    let (tx, _rx) = queue.split();
    let source = [0x80u8; 8];
    let mut mux = RtMux::new(tx, MockPwm::default(), RATE, config());
    mux.set_work_budget(1);

    mux.audio_prepare(&source, 0, 1000).unwrap();

    let handle = mux.request_port(PortId::In1, SimSlave::new()).unwrap();
    mux.start_xfer(handle, one_write(), 0).unwrap();

    // While the transfer is in flight the lone budget unit goes to the bus.
    for _ in 0..10 {
        mux.tick();
    }
    assert_eq!(mux.audio_get_playback_ptr(), 0);

    // Once the bus is idle again the audio cursor advances.
    for _ in 0..200 {
        mux.tick();
    }
    assert!(!mux.xfer_active(PortId::In1));
    assert!(mux.audio_get_playback_ptr() > 0);
}

#[test]
fn cancel_is_visible_by_the_next_tick_and_reported_once() {
    let mut queue = NotifyQueue::new();
    let (tx, rx) = queue.split();
    let mut mux = RtMux::new(tx, MockPwm::default(), RATE, config());
    let mut bridge = CompletionBridge::new(rx);
    let mut sink = Recorder::default();

    let handle = mux.request_port(PortId::In1, SimSlave::new()).unwrap();
    mux.start_xfer(handle, one_write(), 5).unwrap();
    mux.tick();
    mux.tick();

    mux.cancel_xfer(handle);
    assert!(!mux.xfer_active(PortId::In1));
    mux.cancel_xfer(handle); // idempotent

    for _ in 0..50 {
        mux.tick();
    }
    bridge.poll(&mut sink);
    assert_eq!(sink.xfers.len(), 1);
    assert_eq!(sink.xfers[0].2, Err(Error::Cancelled));
}

#[test]
fn period_events_flow_with_ring_refill() {
    let mut queue = NotifyQueue::new();
    let (tx, rx) = queue.split();
    let ring: SharedRing<16> = SharedRing::new();
    let mux: SharedMux<'_, '_, SimSlave, MockPwm> =
        SharedMux::new(RtMux::new(tx, MockPwm::default(), RATE, config()));
    let mut bridge = CompletionBridge::new(rx);
    let mut sink = Recorder::default();

    mux.audio_request().unwrap();
    mux.audio_prepare(&ring, 256, 8).unwrap();
    assert_eq!(mux.audio_prepare(&ring, 256, 8), Err(Error::Busy));

    for _ in 0..16 {
        mux.tick();
    }
    bridge.poll(&mut sink);
    assert_eq!(sink.periods, vec![8, 16]);

    // Refill behind the cursor the way a streaming caller would.
    let ptr = mux.audio_get_playback_ptr();
    ring.write_at(ptr, &[0x42; 8]);

    mux.audio_int_disable();
    for _ in 0..8 {
        mux.tick();
    }
    bridge.poll(&mut sink);
    assert_eq!(sink.periods.len(), 2); // frozen while disabled
    assert_eq!(mux.audio_get_playback_ptr(), 24);

    mux.audio_release();
    assert!(mux.audio_request().is_ok());
}

#[test]
fn ramp_through_the_facade_reaches_silence() {
    let mut queue = NotifyQueue::new();
    let (tx, _rx) = queue.split();
    let pwm = MockPwm::default();
    let source = [0xFFu8; 8];
    let mut mux: RtMux<'_, '_, SimSlave, MockPwm> = RtMux::new(tx, pwm.clone(), RATE, config());

    mux.audio_prepare(&source, 256, 1000).unwrap();
    mux.audio_ramp(RampDir::Down, 10);
    for _ in 0..11 {
        mux.tick();
    }
    assert_eq!(mux.audio_volume(), 0);
    assert_eq!(pwm.duties.borrow().last(), Some(&0));
}

#[test]
fn saturated_queue_drops_newest_and_reports_overrun() {
    let mut queue = NotifyQueue::new();
    let (tx, rx) = queue.split();
    let mut mux = RtMux::new(tx, MockPwm::default(), RATE, config());
    let mut bridge = CompletionBridge::new(rx);
    let mut sink = Recorder::default();

    let handle = mux.request_port(PortId::In1, SimSlave::new()).unwrap();
    // The queue holds NOTIFY_DEPTH - 1 events; produce 20 without draining.
    for token in 0..20 {
        mux.start_xfer(handle, one_write(), token).unwrap();
        mux.cancel_xfer(handle);
    }
    assert_eq!(bridge.poll(&mut sink), 15);
    assert_eq!(sink.xfers.len(), 15);
    assert!(sink.overruns.is_empty());

    // The next event is preceded by the overrun report.
    mux.start_xfer(handle, one_write(), 99).unwrap();
    mux.cancel_xfer(handle);
    bridge.poll(&mut sink);
    assert_eq!(sink.overruns, vec![5]);
    assert_eq!(sink.xfers.last().map(|x| x.1), Some(99));
}

#[test]
fn try_next_pulls_single_events_without_a_sink() {
    let mut queue = NotifyQueue::new();
    let (tx, rx) = queue.split();
    let mut mux = RtMux::new(tx, MockPwm::default(), RATE, config());
    let mut bridge = CompletionBridge::new(rx);

    assert_eq!(bridge.try_next(), Err(nb::Error::WouldBlock));

    let handle = mux.request_port(PortId::In1, SimSlave::new()).unwrap();
    mux.start_xfer(handle, one_write(), 21).unwrap();
    mux.cancel_xfer(handle);

    match bridge.try_next() {
        Ok(Notification::XferComplete { token, status, .. }) => {
            assert_eq!(token, 21);
            assert_eq!(status, Err(Error::Cancelled));
        }
        other => panic!("unexpected notification {other:?}"),
    }
    assert_eq!(bridge.try_next(), Err(nb::Error::WouldBlock));
}

#[test]
fn release_port_cancels_and_returns_the_pins() {
    let mut queue = NotifyQueue::new();
    let (tx, rx) = queue.split();
    let mut mux = RtMux::new(tx, MockPwm::default(), RATE, config());
    let mut bridge = CompletionBridge::new(rx);
    let mut sink = Recorder::default();

    let handle = mux.request_port(PortId::In4, SimSlave::new()).unwrap();
    mux.start_xfer(handle, one_write(), 11).unwrap();
    mux.tick();

    assert!(mux.release_port(handle).is_some());
    assert!(mux.release_port(handle).is_none()); // stale handle, silent

    bridge.poll(&mut sink);
    assert_eq!(sink.xfers.len(), 1);
    assert_eq!(sink.xfers[0].2, Err(Error::Cancelled));

    // Slot is claimable again.
    let again = mux.request_port(PortId::In4, SimSlave::new()).unwrap();
    assert_ne!(again, handle);
}

#[test]
fn fault_paths_tear_down_only_the_affected_duty() {
    let mut queue = NotifyQueue::new();
    let (tx, rx) = queue.split();
    let source = [0x80u8; 8];
    let mut mux = RtMux::new(tx, MockPwm::default(), RATE, config());
    let mut bridge = CompletionBridge::new(rx);
    let mut sink = Recorder::default();

    let handle = mux.request_port(PortId::In1, SimSlave::new()).unwrap();
    mux.start_xfer(handle, one_write(), 0).unwrap();
    mux.audio_prepare(&source, 256, 1000).unwrap();
    mux.tick();

    mux.fault_port(PortId::In1);
    bridge.poll(&mut sink);
    assert_eq!(sink.xfers.len(), 1);
    assert_eq!(sink.xfers[0].2, Err(Error::BusTimeout));

    // The audio session kept running through the bus fault.
    let before = mux.audio_get_playback_ptr();
    mux.tick();
    assert_eq!(mux.audio_get_playback_ptr(), before + 1);

    mux.fault_audio();
    assert!(mux.audio_request().is_ok());
    // And the port remains releasable after its fault.
    assert!(mux.release_port(handle).is_some());
}

#[test]
fn status_signal_pulses_on_completions() {
    #[derive(Default)]
    struct Counting {
        hits: u32,
    }
    impl fiqmux::StatusSignal for Counting {
        fn state_changed(&mut self) {
            self.hits += 1;
        }
    }

    let mut queue = NotifyQueue::new();
    let (tx, _rx) = queue.split();
    let mut status = Counting::default();
    {
        let mut mux: RtMux<'_, '_, SimSlave, MockPwm> =
            RtMux::new(tx, MockPwm::default(), RATE, config());
        mux.set_status_signal(&mut status);

        let handle = mux.request_port(PortId::In1, SimSlave::new()).unwrap();
        mux.start_xfer(handle, one_write(), 0).unwrap();
        for _ in 0..200 {
            mux.tick();
        }
    }
    assert_eq!(status.hits, 1);
}

#[test]
fn stale_start_is_rejected() {
    let mut queue = NotifyQueue::new();
    let (tx, _rx) = queue.split();
    let mut mux = RtMux::new(tx, MockPwm::default(), RATE, config());

    let handle = mux.request_port(PortId::In2, SimSlave::new()).unwrap();
    mux.release_port(handle).unwrap();
    assert_eq!(
        mux.start_xfer(handle, one_write(), 0),
        Err(Error::InvalidArgument)
    );
    let ghost = PortHandle::new(PortId::In3, 1);
    assert_eq!(
        mux.start_xfer(ghost, one_write(), 0),
        Err(Error::InvalidArgument)
    );
}
