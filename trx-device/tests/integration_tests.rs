use std::{
    io::Write,
    sync::{atomic::Ordering, Arc},
    thread,
    time::{Duration, Instant},
};

use trx_core::{mean_power, power_dbfs};
use trx_device::{make, RadioDevice, SimConfig};
use trx_types::{
    ClockReference, DeviceConfig, InterfaceType, RadioError, ReadResult, Timestamp, WindowType,
};

fn sim() -> SimConfig {
    SimConfig {
        start_delay_ms: 100,
        io_timeout_ms: 1_000,
        ..Default::default()
    }
}

fn running(
    config: DeviceConfig,
    sim: SimConfig,
) -> Box<dyn RadioDevice> {
    let dev = make(&config, &sim).unwrap();
    dev.open("", ClockReference::Internal).unwrap();
    dev.start().unwrap();
    dev
}

fn constant(
    len: usize,
    i: i16,
) -> Vec<i16> {
    let mut v = vec![0i16; 2 * len];
    for iq in v.chunks_exact_mut(2) {
        iq[0] = i;
    }
    v
}

fn read(
    dev: &dyn RadioDevice,
    len: usize,
    ts: Option<Timestamp>,
) -> (Vec<Vec<i16>>, ReadResult) {
    let chans = dev.config().logical_channels();
    let mut store = vec![vec![0i16; 2 * len]; chans];
    let result = {
        let mut bufs: Vec<&mut [i16]> = store.iter_mut().map(|b| b.as_mut_slice()).collect();
        dev.read_samples(&mut bufs, len, ts).unwrap()
    };
    (store, result)
}

/// Индекс первой ненулевой комплексной выборки.
fn first_signal(iq: &[i16]) -> Option<usize> {
    iq.chunks_exact(2).position(|p| p[0] != 0 || p[1] != 0)
}

////////////////////////////////////////////////////////////////////////////////
// Петля TX -> RX
////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_loopback_returns_written_samples() {
    let dev = running(DeviceConfig::new(4, 1), sim());
    let t = dev.initial_write_timestamp().unwrap();

    let ramp: Vec<i16> = (0..1_000i16).flat_map(|i| [i * 10, -i * 10]).collect();
    let written = dev.write_samples(&[&ramp[..]], 1_000, t, false).unwrap();
    assert_eq!(written.samples, 1_000);
    assert!(!written.flags.any());

    let (bufs, result) = read(dev.as_ref(), 1_000, Some(t));
    assert_eq!(result.samples, 1_000);
    assert_eq!(result.timestamp, t);
    assert!(!result.flags.overrun);
    assert!(result.rssi.is_some());
    assert_eq!(bufs[0], ramp);

    assert_eq!(dev.number_written(), 1_000);
    assert_eq!(dev.number_read(), 1_000);
}

#[test]
fn test_read_timestamps_non_decreasing() {
    let dev = running(DeviceConfig::new(1, 2), sim());
    let mut last_end = 0;

    for len in [1usize, 7, 156, 625, 1_000, 3, 2_000, 64] {
        let (_, r) = read(dev.as_ref(), len, None);
        assert!(r.samples <= len);
        assert!(r.timestamp >= last_end);
        last_end = r.end();
    }

    assert!(matches!(
        dev.read_samples(&mut [&mut [0i16; 20][..], &mut [0i16; 20][..]], 10, Some(0)),
        Err(RadioError::TimestampOrder { requested: 0, .. })
    ));
}

#[test]
fn test_overrun_reported_and_stream_resumes() {
    let sim = SimConfig {
        rx_queue_depth: 4,
        ..sim()
    };
    let dev = running(DeviceConfig::new(4, 1), sim);

    let (_, first) = read(dev.as_ref(), 100, None);
    assert_eq!(first.samples, 100);
    assert!(!first.flags.overrun);

    // очередь на 4 порции не переживает 150 мс без чтения
    thread::sleep(Duration::from_millis(150));

    let (_, late) = read(dev.as_ref(), 100, Some(first.end()));
    assert!(late.flags.overrun);
    assert!(late.samples < 100);

    let (_, resumed) = read(dev.as_ref(), 100, None);
    assert!(resumed.flags.overrun);
    assert_eq!(resumed.samples, 100);
    assert!(resumed.timestamp > first.end());

    let m = dev.metrics();
    assert!(m.dropped_samples.load(Ordering::Relaxed) > 0);
    assert!(m.overruns.load(Ordering::Relaxed) >= 2);
}

#[test]
fn test_diversity_combining() {
    let dev = running(DeviceConfig::with_diversity(4, 2), sim());
    assert_eq!(dev.interface_type(), InterfaceType::Diversity);
    assert_eq!(dev.config().logical_channels(), 1);

    let tone = constant(1_000, 10_000);
    dev.write_samples(&[&tone[..]], 1_000, 0, false).unwrap();

    let (bufs, result) = read(dev.as_ref(), 1_000, Some(0));
    assert_eq!(result.samples, 1_000);

    // ветвь 0 - 0 дБ, ветвь 1 - -6 дБ (5012)
    let combined = bufs[0][0];
    assert!(combined > 5_012 && combined < 10_000, "{combined}");

    let strongest = power_dbfs(mean_power(&tone), dev.full_scale_input_value());
    assert!(result.rssi.unwrap() > strongest);
}

#[test]
fn test_retune_between_bursts() {
    let dev = running(DeviceConfig::new(4, 1), sim());
    let f0 = dev.tx_freq(0).unwrap();
    let burst = constant(500, 8_000);

    dev.write_samples(&[&burst[..]], 500, 0, false).unwrap();

    dev.set_tx_freq(f0 + 10e6, 0).unwrap();
    dev.write_samples(&[&burst[..]], 500, 1_000, false).unwrap();

    dev.set_tx_freq(f0, 0).unwrap();
    dev.write_samples(&[&burst[..]], 500, 2_000, false).unwrap();

    let (bufs, result) = read(dev.as_ref(), 3_000, Some(0));
    assert_eq!(result.samples, 3_000);

    let rx = &bufs[0];
    assert_eq!(&rx[..1_000], &burst[..]);
    assert!(rx[2_000..3_000].iter().all(|&v| v == 0));
    assert_eq!(&rx[4_000..5_000], &burst[..]);
}

////////////////////////////////////////////////////////////////////////////////
// Выравнивание
////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_alignment_cancels_clock_skew() {
    let sim = SimConfig {
        tx_clock_skew: 37,
        ..sim()
    };
    let dev = running(DeviceConfig::new(1, 1), sim);
    let burst = constant(500, 8_000);

    // без выравнивания пакет смещён на расхождение клоков
    dev.write_samples(&[&burst[..]], 500, 2_000, false).unwrap();
    let (bufs, r) = read(dev.as_ref(), 3_000, Some(0));
    assert_eq!(r.samples, 3_000);
    assert_eq!(first_signal(&bufs[0]), Some(1_963));

    let anchor = r.end() + 30_000;
    dev.update_alignment(anchor).unwrap();
    assert_eq!(dev.metrics().alignments.load(Ordering::Relaxed), 1);

    dev.write_samples(&[&burst[..]], 500, anchor, false).unwrap();
    let (bufs, r) = read(dev.as_ref(), 1_000, Some(anchor));
    assert_eq!(r.timestamp, anchor);
    assert_eq!(first_signal(&bufs[0]), Some(0));

    // повтор с тем же якорем ничего не меняет
    dev.update_alignment(anchor).unwrap();
    assert_eq!(dev.metrics().alignments.load(Ordering::Relaxed), 1);

    assert!(matches!(
        dev.update_alignment(anchor - 100),
        Err(RadioError::Unrealizable { .. })
    ));
}

#[test]
fn test_external_reference_has_no_drift() {
    let sim = SimConfig {
        tx_drift_ppm: 500.0,
        ..sim()
    };
    let dev = make(&DeviceConfig::new(1, 1), &sim).unwrap();
    dev.open("", ClockReference::External).unwrap();
    dev.start().unwrap();

    let burst = constant(100, 8_000);
    let t = 40_000;
    dev.write_samples(&[&burst[..]], 100, t, false).unwrap();

    let (bufs, r) = read(dev.as_ref(), 200, Some(t));
    assert_eq!(r.timestamp, t);
    assert_eq!(first_signal(&bufs[0]), Some(0));
}

////////////////////////////////////////////////////////////////////////////////
// Запись
////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_control_packets_do_not_advance_clock() {
    let dev = running(DeviceConfig::new(4, 1), sim());
    let payload = constant(200, 100);

    let ctl = dev.write_samples(&[&payload[..]], 100, 0, true).unwrap();
    assert_eq!(ctl.samples, 100);
    assert_eq!(dev.number_written(), 0);
    assert_eq!(dev.metrics().control_packets.load(Ordering::Relaxed), 1);

    // управляющий пакет не сдвигает курсор записи
    dev.write_samples(&[&payload[..]], 200, 0, false).unwrap();
    assert_eq!(dev.number_written(), 200);

    assert!(matches!(
        dev.write_samples(&[&payload[..]], 100, 150, false),
        Err(RadioError::TimestampOrder {
            requested: 150,
            next: 200
        })
    ));
}

#[test]
fn test_late_write_flags_underrun() {
    let dev = running(DeviceConfig::new(4, 1), sim());

    // ждём, пока оборудование уйдёт вперёд
    let (_, r) = read(dev.as_ref(), 2_000, Some(0));
    assert_eq!(r.samples, 2_000);

    let burst = constant(100, 1_000);
    let w = dev.write_samples(&[&burst[..]], 100, 500, false).unwrap();
    assert_eq!(w.samples, 100);
    assert!(w.flags.underrun);
}

#[test]
fn test_fixed_window_blocks_far_future_write() {
    let sim = SimConfig {
        io_timeout_ms: 100,
        max_io_retries: 1,
        ..sim()
    };
    let dev = running(DeviceConfig::new(4, 1), sim);
    assert_eq!(dev.window_type(), WindowType::Fixed);

    let burst = constant(100, 1_000);
    let far = 10_000_000;

    // ожидание окна не расходует бюджет повторов
    for _ in 0..4 {
        let w = dev.write_samples(&[&burst[..]], 100, far, false).unwrap();
        assert_eq!(w.samples, 0);
    }
    assert_eq!(dev.number_written(), 0);

    let (_, now) = read(dev.as_ref(), 100, None);
    let w = dev
        .write_samples(&[&burst[..]], 100, now.end() + 1_000, false)
        .unwrap();
    assert_eq!(w.samples, 100);
}

#[test]
fn test_streaming_window_accepts_future_write() {
    let sim = SimConfig {
        window: WindowType::Usrp1,
        ..sim()
    };
    let dev = running(DeviceConfig::new(4, 1), sim);

    let burst = constant(100, 1_000);
    let w = dev.write_samples(&[&burst[..]], 100, 10_000_000, false).unwrap();
    assert_eq!(w.samples, 100);
}

#[test]
fn test_streaming_window_applies_queue_back_pressure() {
    let sim = SimConfig {
        window: WindowType::Usrp1,
        tx_queue_depth: 2,
        io_timeout_ms: 100,
        ..sim()
    };
    let dev = running(DeviceConfig::new(4, 1), sim);
    let burst = constant(100, 1_000);
    let mut t = 10_000_000;

    // два пакета в работе у оборудования и два в очереди
    thread::sleep(Duration::from_millis(200));
    for _ in 0..4 {
        let w = dev.write_samples(&[&burst[..]], 100, t, false).unwrap();
        assert_eq!(w.samples, 100);
        t += 100;
    }

    let w = dev.write_samples(&[&burst[..]], 100, t, false).unwrap();
    assert_eq!(w.samples, 0);
    assert_eq!(dev.number_written(), 400);
}

////////////////////////////////////////////////////////////////////////////////
// Жизненный цикл и отказы
////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_lifecycle_misuse() {
    let dev = make(&DeviceConfig::new(4, 1), &sim()).unwrap();

    assert!(matches!(dev.start(), Err(RadioError::InvalidState(_))));
    assert!(matches!(dev.stop(), Err(RadioError::InvalidState(_))));
    assert!(matches!(
        dev.set_rx_gain(10.0, 0),
        Err(RadioError::InvalidState(_))
    ));

    dev.open("", ClockReference::Internal).unwrap();
    assert!(matches!(
        dev.open("", ClockReference::Internal),
        Err(RadioError::InvalidState(_))
    ));
    assert!(matches!(dev.stop(), Err(RadioError::InvalidState(_))));
    assert!(matches!(
        dev.read_samples(&mut [&mut [0i16; 4][..]], 2, None),
        Err(RadioError::InvalidState(_))
    ));

    dev.start().unwrap();
    assert!(matches!(dev.start(), Err(RadioError::InvalidState(_))));
    dev.stop().unwrap();
}

#[test]
fn test_busy_open_is_recoverable() {
    let dev = make(&DeviceConfig::new(4, 1), &sim()).unwrap();

    let err = dev.open("busy=1", ClockReference::Internal).unwrap_err();
    assert!(err.is_recoverable());

    assert_eq!(
        dev.open("busy=1", ClockReference::Internal).unwrap(),
        InterfaceType::Normal
    );
}

#[test]
fn test_calibration_limits() {
    let config = DeviceConfig {
        offset_hz: 1e6,
        ..DeviceConfig::new(4, 2)
    };
    let dev = make(&config, &sim()).unwrap();
    dev.open("", ClockReference::Internal).unwrap();

    assert_eq!(dev.set_rx_gain(100.0, 1).unwrap(), dev.max_rx_gain());
    assert_eq!(dev.set_tx_gain(-5.0, 0).unwrap(), dev.min_tx_gain());
    assert!(matches!(
        dev.set_tx_gain(f64::NAN, 0),
        Err(RadioError::InvalidArgument(_))
    ));
    assert!(matches!(
        dev.set_tx_gain(10.0, 2),
        Err(RadioError::InvalidArgument(_))
    ));
    assert!(matches!(
        dev.set_tx_freq(10e9, 0),
        Err(RadioError::OutOfRange { .. })
    ));

    assert_eq!(dev.set_rx_freq(1_800e6, 1).unwrap(), 1_800e6);
    assert_eq!(dev.rx_freq(1).unwrap(), 1_800e6);
    assert_eq!(dev.rx_freq(0).unwrap(), 900e6);
}

#[test]
fn test_stop_unblocks_reader() {
    let sim = SimConfig {
        io_timeout_ms: 5_000,
        ..sim()
    };
    let dev: Arc<dyn RadioDevice> = Arc::from(running(DeviceConfig::new(4, 1), sim));

    let reader = {
        let dev = dev.clone();
        thread::spawn(move || {
            let started = Instant::now();
            let mut buf = vec![0i16; 200];
            let result = dev.read_samples(&mut [&mut buf[..]], 100, Some(10_000_000));
            (result, started.elapsed())
        })
    };

    thread::sleep(Duration::from_millis(200));
    dev.stop().unwrap();

    let (result, elapsed) = reader.join().unwrap();
    assert_eq!(result.unwrap().samples, 0);
    assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
}

#[test]
fn test_restart_keeps_timestamps_monotonic() {
    let dev = running(DeviceConfig::new(4, 1), sim());

    let (_, before) = read(dev.as_ref(), 625, None);
    assert_eq!(before.samples, 625);
    dev.stop().unwrap();

    thread::sleep(Duration::from_millis(20));
    dev.start().unwrap();

    let (_, after) = read(dev.as_ref(), 625, None);
    assert!(after.samples > 0);
    assert!(after.timestamp >= before.end());
}

#[test]
fn test_hardware_fault_surfaces() {
    let sim = SimConfig {
        fail_after_samples: Some(5_000),
        ..sim()
    };
    let dev = running(DeviceConfig::new(4, 1), sim);
    let mut buf = vec![0i16; 2 * 625];

    let mut fault = None;
    for _ in 0..50 {
        match dev.read_samples(&mut [&mut buf[..]], 625, None) {
            Ok(_) => continue,
            Err(e) => {
                fault = Some(e);
                break;
            }
        }
    }

    assert!(matches!(fault, Some(RadioError::HardwareFault(_))));
    assert!(dev.number_read() <= 5_000);
    assert!(matches!(
        dev.write_samples(&[&buf[..]], 625, 1_000_000, false),
        Err(RadioError::HardwareFault(_))
    ));
    assert!(matches!(
        dev.set_tx_gain(1.0, 0),
        Err(RadioError::HardwareFault(_))
    ));
}

#[test]
fn test_profile_drives_device() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"master_clock": "mhz100", "window": "usrp1", "start_delay_ms": 10}}"#
    )
    .unwrap();

    let sim = SimConfig::load(file.path()).unwrap();
    let dev = make(&DeviceConfig::new(4, 1), &sim).unwrap();

    assert_eq!(dev.interface_type(), InterfaceType::Resamp100M);
    assert_eq!(dev.window_type(), WindowType::Usrp1);
    assert!((dev.device_sample_rate() - 4.0 * 1_625_000.0 / 6.0 * 75.0 / 52.0).abs() < 1e-6);
}

////////////////////////////////////////////////////////////////////////////////
// Границы окна чтения
////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_read_longer_than_rx_queue() {
    let sim = SimConfig {
        rx_queue_depth: 4,
        ..sim()
    };
    let dev = running(DeviceConfig::new(1, 1), sim);
    let mut next = dev.initial_read_timestamp().unwrap();

    for _ in 0..3 {
        let (_, r) = read(dev.as_ref(), 5_000, None);
        assert_eq!(r.samples, 5_000);
        assert_eq!(r.timestamp, next);
        assert!(!r.flags.overrun);
        next = r.end();
    }

    assert_eq!(dev.metrics().dropped_samples.load(Ordering::Relaxed), 0);
}

#[test]
fn test_future_read_on_healthy_stream() {
    let sim = SimConfig {
        io_timeout_ms: 50,
        max_io_retries: 2,
        ..sim()
    };
    let dev = running(DeviceConfig::new(4, 1), sim);
    let far = 10_000_000;

    // первые чтения ждут задержку старта оборудования
    thread::sleep(Duration::from_millis(150));

    for _ in 0..6 {
        let (_, r) = read(dev.as_ref(), 100, Some(far));
        assert_eq!(r.samples, 0);
        assert!(!r.flags.overrun);
    }

    let (_, r) = read(dev.as_ref(), 100, None);
    assert!(r.samples > 0);
}

#[test]
fn test_initial_timestamp_offsets_both_directions() {
    let base = 1_000_000;
    let sim = SimConfig {
        initial_timestamp: base,
        ..sim()
    };
    let dev = running(DeviceConfig::new(4, 1), sim);
    assert_eq!(dev.initial_read_timestamp().unwrap(), base);
    assert_eq!(dev.initial_write_timestamp().unwrap(), base);

    let burst = constant(200, 3_000);
    let t = base + 500;
    assert_eq!(
        dev.write_samples(&[&burst[..]], 200, t, false)
            .unwrap()
            .samples,
        200
    );

    let mut store = vec![0i16; 2 * 100];
    assert!(matches!(
        dev.read_samples(&mut [&mut store[..]], 100, Some(base - 1)),
        Err(RadioError::TimestampOrder { .. })
    ));

    let (bufs, r) = read(dev.as_ref(), 1_000, Some(base));
    assert_eq!(r.samples, 1_000);
    assert_eq!(r.timestamp, base);
    assert_eq!(first_signal(&bufs[0]), Some(500));
    assert_eq!(bufs[0][2 * 500], 3_000);
    assert_eq!(bufs[0][2 * 699], 3_000);
    assert_eq!(bufs[0][2 * 700], 0);
}

#[test]
fn test_window_overflowing_clock_is_rejected() {
    let dev = running(DeviceConfig::new(4, 1), sim());
    let near_end = u64::MAX - 10;

    let burst = constant(100, 1_000);
    assert!(matches!(
        dev.write_samples(&[&burst[..]], 100, near_end, false),
        Err(RadioError::InvalidArgument(_))
    ));

    let mut store = vec![0i16; 2 * 100];
    assert!(matches!(
        dev.read_samples(&mut [&mut store[..]], 100, Some(near_end)),
        Err(RadioError::InvalidArgument(_))
    ));
    assert_eq!(dev.number_written(), 0);
}
