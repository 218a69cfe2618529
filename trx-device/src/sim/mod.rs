//! Симулируемое радиоустройство с петлёй TX -> RX.
//!
//! То, что передано на канале, принимается на том же канале с учётом
//! усиления, расстройки частоты, расхождения и дрейфа TX клока, ограничений
//! очередей и внедрённых отказов. Оборудование работает в отдельном потоке
//! ([`hardware`]), связь с ним - ограниченные очереди crossbeam.

mod hardware;

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use log::{debug, info, warn};
use parking_lot::Mutex;
use trx_core::{
    combine_pair, mean_power, power_dbfs, Admission, AlignmentEngine, AlignmentPlan, ClockModel,
    ResampleRatio, RfState, TimestampedBuffer, WindowPolicy,
};
use trx_types::{
    host_sample_rate, ClockReference, DeviceConfig, InterfaceType, IoFlags, RadioError,
    RadioResult, ReadResult, Timestamp, WindowType, WriteResult,
};

use self::hardware::{Hardware, HardwareParams, HardwareStatus, RxChunk, TxBurst, TxMessage};
use crate::{config::OpenArgs, metrics::DeviceMetrics, RadioDevice, SimConfig};

/// Полная шкала приёма.
pub const FULL_SCALE_INPUT: f64 = 32_767.0;

/// Полная шкала передачи.
pub const FULL_SCALE_OUTPUT: f64 = 32_000.0;

/// Серийный номер по умолчанию.
const DEFAULT_SERIAL: &str = "SIM-0001";

#[derive(Debug, Clone, Copy)]
enum Lifecycle {
    Constructed,
    Opened { reference: ClockReference },
    Running { reference: ClockReference },
}

struct RxPath {
    receiver: Option<Receiver<RxChunk>>,
    /// Физические тракты
    buffer: TimestampedBuffer,
    /// Следующая непрочитанная метка
    next: Timestamp,
    empty_reads: u32,
    seen_underruns: u64,
    /// Физические тракты перед объединением пар
    scratch: Vec<Vec<i16>>,
}

struct TxPath {
    sender: Option<Sender<TxMessage>>,
    clock: ClockModel,
    engine: AlignmentEngine,
    /// Метка, до которой полезная нагрузка уже передана
    cursor: Timestamp,
    empty_writes: u32,
    seen_underruns: u64,
}

struct HardwareLink {
    stop_flag: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Симулируемое устройство.
pub struct SimulatedDevice {
    config: DeviceConfig,
    sim: SimConfig,
    iface: InterfaceType,
    ratio: ResampleRatio,
    chunk: usize,
    window: WindowPolicy,
    state: Mutex<Lifecycle>,
    open_attempts: AtomicU32,
    running: AtomicBool,
    rf: Arc<RfState>,
    rx: Mutex<RxPath>,
    tx: Mutex<TxPath>,
    status: Arc<HardwareStatus>,
    metrics: Arc<DeviceMetrics>,
    link: Mutex<Option<HardwareLink>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl SimulatedDevice {
    /// Устройство для уже проверенных конфигураций (см. [`crate::make`]).
    pub fn new(
        config: DeviceConfig,
        sim: SimConfig,
        iface: InterfaceType,
    ) -> Self {
        let ratio = ResampleRatio::for_interface(iface);
        let chunk = ratio.align_chunk(sim.chunk_samples);
        let physical = config.physical_channels();
        let capacity = (sim.rx_queue_depth * chunk).max(2 * chunk);

        let rf = RfState::new(
            sim.limits,
            config.offset_hz,
            config.logical_channels(),
            sim.initial_freq_hz,
            sim.initial_rx_gain_db,
        );

        let rx = RxPath {
            receiver: None,
            buffer: TimestampedBuffer::new(physical, capacity),
            next: sim.initial_timestamp,
            empty_reads: 0,
            seen_underruns: 0,
            scratch: vec![Vec::new(); physical],
        };

        let tx = TxPath {
            sender: None,
            clock: ClockModel::new(sim.initial_timestamp),
            engine: AlignmentEngine::new(),
            cursor: sim.initial_timestamp,
            empty_writes: 0,
            seen_underruns: 0,
        };

        Self {
            window: WindowPolicy::new(sim.window, sim.tx_window_samples),
            config,
            iface,
            ratio,
            chunk,
            state: Mutex::new(Lifecycle::Constructed),
            open_attempts: AtomicU32::new(0),
            running: AtomicBool::new(false),
            rf: Arc::new(rf),
            rx: Mutex::new(rx),
            tx: Mutex::new(tx),
            status: Arc::new(HardwareStatus::default()),
            metrics: DeviceMetrics::new(),
            link: Mutex::new(None),
            sim,
        }
    }

    /// Размер порции оборудования (выборок хоста).
    pub fn chunk_samples(&self) -> usize {
        self.chunk
    }

    fn hardware_params(
        &self,
        reference: ClockReference,
    ) -> HardwareParams {
        // внешняя опора синхронизирует TX и RX клоки
        let tx_drift_ppm = match reference {
            ClockReference::Internal => self.sim.tx_drift_ppm,
            ClockReference::External => 0.0,
        };

        HardwareParams {
            chunk: self.chunk,
            sample_rate: self.sample_rate(),
            start_delay: self.sim.start_delay(),
            poll: self.sim.poll_interval(),
            physical: self.config.physical_channels(),
            diversity: self.config.diversity,
            read_base: self.sim.initial_timestamp,
            tx_clock_skew: self.sim.tx_clock_skew,
            tx_drift_ppm,
            loopback_gain_db: self.sim.loopback_gain_db,
            branch_gain_db: self.sim.diversity_branch_gain_db,
            noise_amplitude: self.sim.noise_amplitude,
            fail_after_samples: self.sim.fail_after_samples,
            max_pending: self.sim.tx_queue_depth,
            priority: self.config.priority,
        }
    }

    fn ensure_opened(&self) -> RadioResult<()> {
        if matches!(*self.state.lock(), Lifecycle::Constructed) {
            return Err(RadioError::invalid_state("device is not open"));
        }

        Ok(())
    }

    /// Открыто и оборудование на связи.
    fn ensure_usable(&self) -> RadioResult<()> {
        self.ensure_opened()?;

        if self.status.failed.load(Ordering::Acquire) {
            return Err(RadioError::hardware_fault("device disconnected"));
        }

        Ok(())
    }

    fn ensure_running(&self) -> RadioResult<()> {
        if !self.running.load(Ordering::Acquire) {
            return Err(RadioError::invalid_state("device is not running"));
        }

        Ok(())
    }

    fn check_buffers(
        &self,
        lens: impl ExactSizeIterator<Item = usize>,
        len: usize,
    ) -> RadioResult<()> {
        let expected = self.config.logical_channels();
        let need = len
            .checked_mul(2)
            .ok_or_else(|| RadioError::invalid_argument(format!("length {len} is too large")))?;

        if lens.len() != expected {
            return Err(RadioError::invalid_argument(format!(
                "expected {expected} channel buffers, got {}",
                lens.len()
            )));
        }

        for (chan, have) in lens.enumerate() {
            if have < need {
                return Err(RadioError::invalid_argument(format!(
                    "buffer for channel {chan} holds {have} values, need {need}"
                )));
            }
        }

        Ok(())
    }

    /// Новые события опустошения TX с прошлого вызова.
    fn take_underruns(
        &self,
        seen: &mut u64,
    ) -> bool {
        let current = self.status.underruns.load(Ordering::Acquire);
        let fresh = current > *seen;
        *seen = current;

        fresh
    }

    fn ingest(
        rx: &mut RxPath,
        chunk: RxChunk,
    ) {
        let outcome = rx.buffer.push(chunk.timestamp, &chunk.data);

        if outcome.gap > 0 {
            debug!(
                "RX gap of {} samples before {}",
                outcome.gap, chunk.timestamp
            );
        }
    }

    /// Отправляет сообщение оборудованию до `deadline`, не дольше периода
    /// опроса за раз. `false` - не успели или устройство остановлено.
    fn send(
        &self,
        sender: &Sender<TxMessage>,
        mut msg: TxMessage,
        deadline: Instant,
    ) -> RadioResult<bool> {
        loop {
            let now = Instant::now();

            if now >= deadline || !self.running.load(Ordering::Acquire) {
                return Ok(false);
            }

            let slice = (deadline - now).min(self.sim.poll_interval());

            match sender.send_timeout(msg, slice) {
                Ok(()) => return Ok(true),
                Err(SendTimeoutError::Timeout(back)) => msg = back,
                Err(SendTimeoutError::Disconnected(_)) => {
                    if !self.running.load(Ordering::Acquire) {
                        return Ok(false);
                    }

                    return Err(RadioError::hardware_fault("hardware link lost"));
                }
            }
        }
    }

    /// Конец окна `[ts, ts + len)`; переполнение метки - ошибка аргумента.
    fn span_end(
        ts: Timestamp,
        len: usize,
    ) -> RadioResult<Timestamp> {
        ts.checked_add(len as Timestamp).ok_or_else(|| {
            RadioError::invalid_argument(format!("window of {len} samples at {ts} overflows"))
        })
    }

    /// Запись, не принятая за таймаут. В бюджет отказа идёт только
    /// `stalled`: очередь передачи не приняла сообщение.
    fn write_timeout(
        &self,
        tx: &mut TxPath,
        stalled: bool,
    ) -> RadioResult<WriteResult> {
        self.metrics.timeouts.fetch_add(1, Ordering::Relaxed);

        if self.status.failed.load(Ordering::Acquire) {
            return Err(RadioError::hardware_fault("device disconnected"));
        }

        if stalled && self.running.load(Ordering::Acquire) {
            tx.empty_writes += 1;

            if tx.empty_writes > self.sim.max_io_retries {
                return Err(RadioError::hardware_fault(format!(
                    "transmit path stalled for {} consecutive writes",
                    tx.empty_writes
                )));
            }
        }

        Ok(WriteResult {
            samples: 0,
            flags: IoFlags {
                overrun: false,
                underrun: self.take_underruns(&mut tx.seen_underruns),
            },
        })
    }
}

impl RadioDevice for SimulatedDevice {
    fn open(
        &self,
        args: &str,
        reference: ClockReference,
    ) -> RadioResult<InterfaceType> {
        let mut state = self.state.lock();

        if !matches!(*state, Lifecycle::Constructed) {
            return Err(RadioError::invalid_state("device already open"));
        }

        let args = OpenArgs::parse(args)?;
        let attempt = self.open_attempts.fetch_add(1, Ordering::Relaxed) + 1;

        if attempt <= args.busy {
            warn!("Simulated device busy (attempt {attempt} of {})", args.busy);
            return Err(RadioError::Busy(format!(
                "device claimed by another process (attempt {attempt})"
            )));
        }

        let serial = args.serial.as_deref().unwrap_or(DEFAULT_SERIAL);

        info!(
            "Opened simulated device {serial}: {} interface, {} reference, {:.3} Msps host / {:.3} Msps device, chunk {} samples",
            self.iface,
            reference,
            self.sample_rate() / 1e6,
            self.device_sample_rate() / 1e6,
            self.chunk
        );

        *state = Lifecycle::Opened { reference };

        Ok(self.iface)
    }

    fn start(&self) -> RadioResult<()> {
        let mut state = self.state.lock();

        let reference = match *state {
            Lifecycle::Constructed => return Err(RadioError::invalid_state("device is not open")),
            Lifecycle::Running { .. } => {
                return Err(RadioError::invalid_state("device already started"))
            }
            Lifecycle::Opened { reference } => reference,
        };

        if self.status.failed.load(Ordering::Acquire) {
            return Err(RadioError::hardware_fault("device disconnected"));
        }

        let (rx_out, rx_in) = crossbeam_channel::bounded(self.sim.rx_queue_depth);
        let (tx_out, tx_in) = crossbeam_channel::bounded(self.sim.tx_queue_depth);
        let hw_now = self.status.hw_time.load(Ordering::Acquire);
        let underruns = self.status.underruns.load(Ordering::Acquire);

        {
            let mut rx = self.rx.lock();
            rx.receiver = Some(rx_in.clone());
            rx.buffer.clear();
            // после рестарта чтение продолжается с текущего момента оборудования
            rx.next = rx.next.max(self.sim.initial_timestamp + hw_now);
            rx.empty_reads = 0;
            rx.seen_underruns = underruns;
        }

        {
            let mut tx = self.tx.lock();
            tx.sender = Some(tx_out);
            tx.engine.reset();
            tx.empty_writes = 0;
            tx.seen_underruns = underruns;
        }

        let stop_flag = Arc::new(AtomicBool::new(false));
        let hardware = Hardware::new(
            self.hardware_params(reference),
            self.rf.clone(),
            self.status.clone(),
            self.metrics.clone(),
            rx_out,
            rx_in,
            tx_in,
            stop_flag.clone(),
        );

        let handle = thread::Builder::new()
            .name("trx-hw".to_string())
            .spawn(move || hardware.run())
            .map_err(|e| RadioError::hardware_fault(format!("cannot spawn hardware thread: {e}")))?;

        *self.link.lock() = Some(HardwareLink { stop_flag, handle });
        self.running.store(true, Ordering::Release);
        *state = Lifecycle::Running { reference };

        info!(
            "Device started at hardware sample {hw_now} ({} window)",
            self.window.kind()
        );

        Ok(())
    }

    fn stop(&self) -> RadioResult<()> {
        let mut state = self.state.lock();

        let reference = match *state {
            Lifecycle::Running { reference } => reference,
            _ => return Err(RadioError::invalid_state("device is not running")),
        };

        self.running.store(false, Ordering::Release);

        let mut result = Ok(());

        if let Some(link) = self.link.lock().take() {
            link.stop_flag.store(true, Ordering::Relaxed);

            if link.handle.join().is_err() {
                result = Err(RadioError::hardware_fault("hardware thread panicked"));
            }
        }

        self.rx.lock().receiver = None;
        self.tx.lock().sender = None;
        *state = Lifecycle::Opened { reference };

        info!(
            "Device stopped at hardware sample {}",
            self.status.hw_time.load(Ordering::Acquire)
        );

        result
    }

    fn window_type(&self) -> WindowType {
        self.window.kind()
    }

    fn interface_type(&self) -> InterfaceType {
        self.iface
    }

    fn config(&self) -> &DeviceConfig {
        &self.config
    }

    fn read_samples(
        &self,
        bufs: &mut [&mut [i16]],
        len: usize,
        timestamp: Option<Timestamp>,
    ) -> RadioResult<ReadResult> {
        self.ensure_running()?;
        self.check_buffers(bufs.iter().map(|b| b.len()), len)?;

        let mut guard = self.rx.lock();
        let rx = &mut *guard;

        if let Some(t) = timestamp {
            if t < rx.next {
                return Err(RadioError::TimestampOrder {
                    requested: t,
                    next: rx.next,
                });
            }
        }

        let mut requested = timestamp.unwrap_or(rx.next);
        Self::span_end(requested, len)?;

        if len == 0 {
            return Ok(ReadResult::empty(requested));
        }

        // окно длиннее очереди не должно вытеснять собственное начало
        rx.buffer.reserve(len.saturating_add(self.chunk));

        let receiver = rx
            .receiver
            .clone()
            .ok_or_else(|| RadioError::invalid_state("device is not running"))?;

        let deadline = Instant::now() + self.sim.io_timeout();
        let mut overrun = false;
        let mut timed_out = false;
        let mut disconnected = false;
        let mut ingested = false;

        loop {
            while let Ok(chunk) = receiver.try_recv() {
                Self::ingest(rx, chunk);
                ingested = true;
            }

            if let Some(head) = rx.buffer.start() {
                if head > requested {
                    overrun = true;

                    // без явной метки продолжаем с самой старой уцелевшей
                    if timestamp.is_none() {
                        requested = head;
                    }
                }
            }

            let end = requested.saturating_add(len as Timestamp);
            let from = rx.buffer.start().map_or(requested, |s| s.max(requested));

            if from >= end || rx.buffer.end().is_some_and(|e| e >= end) {
                break;
            }

            if !self.running.load(Ordering::Acquire) {
                break;
            }

            let now = Instant::now();

            if now >= deadline {
                timed_out = true;
                break;
            }

            match receiver.recv_timeout((deadline - now).min(self.sim.poll_interval())) {
                Ok(chunk) => {
                    Self::ingest(rx, chunk);
                    ingested = true;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        let end = requested.saturating_add(len as Timestamp);
        let from = rx
            .buffer
            .start()
            .map_or(requested, |s| s.max(requested))
            .min(end);
        let want = (end - from) as usize;

        let mut rssi: Option<f32> = None;

        let span = if self.config.diversity {
            for branch in rx.scratch.iter_mut() {
                branch.clear();
                branch.resize(2 * want, 0);
            }

            let span = rx.buffer.copy_out(from, want, &mut rx.scratch);
            let n2 = 2 * span.samples;

            if span.samples > 0 {
                for (chan, out) in bufs.iter_mut().enumerate() {
                    let combined = combine_pair(
                        &rx.scratch[2 * chan][..n2],
                        &rx.scratch[2 * chan + 1][..n2],
                        &mut out[..n2],
                        FULL_SCALE_INPUT,
                    );
                    rssi = Some(rssi.map_or(combined.rssi_dbfs, |r| r.max(combined.rssi_dbfs)));
                }
            }

            span
        } else {
            let span = rx.buffer.copy_out(from, want, bufs);

            if span.samples > 0 {
                rssi = bufs
                    .iter()
                    .map(|b| power_dbfs(mean_power(&b[..2 * span.samples]), FULL_SCALE_INPUT))
                    .reduce(f32::max);
            }

            span
        };

        let samples = span.samples;

        let first = if samples > 0 { span.timestamp } else { from };

        if samples > 0 {
            rx.next = span.timestamp + samples as Timestamp;
        } else if overrun {
            rx.next = from;
        }

        rx.buffer.discard_before(rx.next);

        let running = self.running.load(Ordering::Acquire);

        if samples == 0 && !overrun && running {
            if disconnected {
                return Err(RadioError::hardware_fault("device disconnected"));
            }

            if timed_out {
                self.metrics.timeouts.fetch_add(1, Ordering::Relaxed);
            }

            // поток идёт, просто окно ещё впереди
            if ingested {
                rx.empty_reads = 0;
            } else {
                rx.empty_reads += 1;

                if rx.empty_reads > self.sim.max_io_retries {
                    return Err(RadioError::hardware_fault(format!(
                        "no samples received for {} consecutive reads",
                        rx.empty_reads
                    )));
                }
            }
        } else if samples > 0 {
            rx.empty_reads = 0;
        }

        if overrun {
            self.metrics.overruns.fetch_add(1, Ordering::Relaxed);
            warn!("RX overrun: samples before {from} were dropped");
        }

        self.metrics
            .samples_read
            .fetch_add(samples as u64, Ordering::Relaxed);

        Ok(ReadResult {
            samples,
            timestamp: first,
            flags: IoFlags {
                overrun,
                underrun: self.take_underruns(&mut rx.seen_underruns),
            },
            rssi,
        })
    }

    fn write_samples(
        &self,
        bufs: &[&[i16]],
        len: usize,
        timestamp: Timestamp,
        is_control: bool,
    ) -> RadioResult<WriteResult> {
        self.ensure_running()?;
        self.check_buffers(bufs.iter().map(|b| b.len()), len)?;

        let mut guard = self.tx.lock();
        let tx = &mut *guard;

        let sender = tx
            .sender
            .clone()
            .ok_or_else(|| RadioError::invalid_state("device is not running"))?;

        let deadline = Instant::now() + self.sim.io_timeout();

        if is_control {
            if !self.send(&sender, TxMessage::Control { samples: len }, deadline)? {
                return self.write_timeout(tx, true);
            }

            self.metrics.control_packets.fetch_add(1, Ordering::Relaxed);

            return Ok(WriteResult {
                samples: len,
                flags: IoFlags {
                    overrun: false,
                    underrun: self.take_underruns(&mut tx.seen_underruns),
                },
            });
        }

        if timestamp < tx.cursor {
            return Err(RadioError::TimestampOrder {
                requested: timestamp,
                next: tx.cursor,
            });
        }

        let end = Self::span_end(timestamp, len)?;

        if len == 0 {
            return Ok(WriteResult::default());
        }

        let mut late = false;

        loop {
            if self.status.failed.load(Ordering::Acquire) {
                return Err(RadioError::hardware_fault("device disconnected"));
            }

            let now = tx
                .clock
                .rx_timestamp(self.status.hw_time.load(Ordering::Acquire));

            match self.window.admit(timestamp, len, now) {
                Admission::Admit => break,
                Admission::Late { behind } => {
                    warn!("TX write at {timestamp} is {behind} samples late");
                    late = true;
                    break;
                }
                Admission::Wait { excess } => {
                    let wall = Instant::now();

                    // окно ещё не дошло до записи: это не отказ оборудования
                    if wall >= deadline || !self.running.load(Ordering::Acquire) {
                        return self.write_timeout(tx, false);
                    }

                    let wait = Duration::from_secs_f64(excess as f64 / self.sample_rate())
                        .min(self.sim.poll_interval())
                        .min(deadline - wall)
                        .max(Duration::from_micros(100));

                    thread::sleep(wait);
                }
            }
        }

        let burst = TxBurst {
            counter: tx.clock.tx_to_hw(timestamp),
            samples: bufs.iter().map(|b| b[..2 * len].to_vec()).collect(),
            rf: self.rf.snapshot(),
        };

        if !self.send(&sender, TxMessage::Burst(burst), deadline)? {
            return self.write_timeout(tx, true);
        }

        tx.cursor = end;
        tx.empty_writes = 0;

        self.metrics
            .samples_written
            .fetch_add(len as u64, Ordering::Relaxed);

        let fresh = self.take_underruns(&mut tx.seen_underruns);

        Ok(WriteResult {
            samples: len,
            flags: IoFlags {
                overrun: false,
                underrun: late || fresh,
            },
        })
    }

    fn update_alignment(
        &self,
        timestamp: Timestamp,
    ) -> RadioResult<()> {
        self.ensure_running()?;

        let mut guard = self.tx.lock();
        let tx = &mut *guard;
        let hw_now = self.status.hw_time.load(Ordering::Acquire);

        let hw_instant = match tx.engine.plan(timestamp, &tx.clock, hw_now, tx.cursor)? {
            AlignmentPlan::AlreadyAligned => return Ok(()),
            AlignmentPlan::Measure { hw_instant } => hw_instant,
        };

        let sender = tx
            .sender
            .clone()
            .ok_or_else(|| RadioError::invalid_state("device is not running"))?;

        let (reply, answer) = crossbeam_channel::bounded(1);
        let deadline = Instant::now() + self.sim.io_timeout();

        if !self.send(&sender, TxMessage::Ping { hw_instant, reply }, deadline)? {
            return Err(RadioError::hardware_fault("alignment request not accepted"));
        }

        let skew = answer
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
            .map_err(|_| RadioError::hardware_fault("alignment request not answered"))?;

        let prev = tx.engine.commit(timestamp, skew, &mut tx.clock);
        self.metrics.alignments.fetch_add(1, Ordering::Relaxed);

        info!("TX aligned at {timestamp}: offset {prev} -> {skew}");

        Ok(())
    }

    fn set_tx_freq(
        &self,
        hz: f64,
        chan: usize,
    ) -> RadioResult<f64> {
        self.ensure_usable()?;
        self.rf.set_tx_freq(hz, chan)
    }

    fn set_rx_freq(
        &self,
        hz: f64,
        chan: usize,
    ) -> RadioResult<f64> {
        self.ensure_usable()?;
        self.rf.set_rx_freq(hz, chan)
    }

    fn tx_freq(
        &self,
        chan: usize,
    ) -> RadioResult<f64> {
        self.ensure_usable()?;
        Ok(self.rf.channel(chan)?.tx_freq_hz)
    }

    fn rx_freq(
        &self,
        chan: usize,
    ) -> RadioResult<f64> {
        self.ensure_usable()?;
        Ok(self.rf.channel(chan)?.rx_freq_hz)
    }

    fn set_tx_gain(
        &self,
        db: f64,
        chan: usize,
    ) -> RadioResult<f64> {
        self.ensure_usable()?;
        self.rf.set_tx_gain(db, chan)
    }

    fn set_rx_gain(
        &self,
        db: f64,
        chan: usize,
    ) -> RadioResult<f64> {
        self.ensure_usable()?;
        self.rf.set_rx_gain(db, chan)
    }

    fn tx_gain(
        &self,
        chan: usize,
    ) -> RadioResult<f64> {
        self.ensure_usable()?;
        Ok(self.rf.channel(chan)?.tx_gain_db)
    }

    fn rx_gain(
        &self,
        chan: usize,
    ) -> RadioResult<f64> {
        self.ensure_usable()?;
        Ok(self.rf.channel(chan)?.rx_gain_db)
    }

    fn min_tx_gain(&self) -> f64 {
        self.rf.limits().tx_gain.min
    }

    fn max_tx_gain(&self) -> f64 {
        self.rf.limits().tx_gain.max
    }

    fn min_rx_gain(&self) -> f64 {
        self.rf.limits().rx_gain.min
    }

    fn max_rx_gain(&self) -> f64 {
        self.rf.limits().rx_gain.max
    }

    fn initial_read_timestamp(&self) -> RadioResult<Timestamp> {
        self.ensure_opened()?;
        Ok(self.tx.lock().clock.initial_read_timestamp())
    }

    fn initial_write_timestamp(&self) -> RadioResult<Timestamp> {
        self.ensure_opened()?;
        Ok(self.tx.lock().clock.initial_write_timestamp())
    }

    fn full_scale_input_value(&self) -> f64 {
        FULL_SCALE_INPUT
    }

    fn full_scale_output_value(&self) -> f64 {
        FULL_SCALE_OUTPUT
    }

    fn sample_rate(&self) -> f64 {
        host_sample_rate(self.config.sps)
    }

    fn device_sample_rate(&self) -> f64 {
        self.ratio.device_rate(self.sample_rate())
    }

    fn number_read(&self) -> u64 {
        self.metrics.samples_read.load(Ordering::Relaxed)
    }

    fn number_written(&self) -> u64 {
        self.metrics.samples_written.load(Ordering::Relaxed)
    }

    fn metrics(&self) -> Arc<DeviceMetrics> {
        self.metrics.clone()
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        let running = matches!(*self.state.lock(), Lifecycle::Running { .. });

        if running {
            if let Err(e) = self.stop() {
                warn!("Failed to stop device on drop: {e}");
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
