// Поток симулируемого оборудования.
//
// Каждую порцию он выдаёт в темпе реального времени (pacing по Instant),
// подмешивая в приём то, что было передано на тех же каналах: передача
// уходит по своему счётчику, который расходится с приёмным на
// `tx_clock_skew` и дрейфует на `tx_drift_ppm`. Очередь RX при переполнении
// теряет самые старые порции.

use std::{
    f64::consts::PI,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, error, warn};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use trx_core::{db_to_amplitude, saturate_i16, ChannelRf, RfState};
use trx_types::Timestamp;

use crate::metrics::DeviceMetrics;

/// Порция принятых выборок всех физических трактов.
#[derive(Debug, Clone)]
pub(crate) struct RxChunk {
    /// Метка времени первой выборки
    pub timestamp: Timestamp,
    /// I/Q по физическим трактам
    pub data: Vec<Vec<i16>>,
}

/// Пакет передачи, привязанный к TX счётчику оборудования.
#[derive(Debug, Clone)]
pub(crate) struct TxBurst {
    pub counter: u64,
    /// I/Q по логическим каналам
    pub samples: Vec<Vec<i16>>,
    /// RF настройки каналов на момент записи
    pub rf: Vec<ChannelRf>,
}

pub(crate) enum TxMessage {
    Burst(TxBurst),
    Control { samples: usize },
    /// Запрос расхождения TX счётчика в аппаратный момент RX `hw_instant`
    Ping { hw_instant: u64, reply: Sender<i64> },
}

/// Состояние оборудования, видимое устройству.
#[derive(Debug, Default)]
pub(crate) struct HardwareStatus {
    /// Следующая аппаратная выборка приёма; не сбрасывается между стартами
    pub hw_time: AtomicU64,
    /// Накопленные события опустошения TX
    pub underruns: AtomicU64,
    /// Оборудование "отключилось"
    pub failed: AtomicBool,
}

/// Неизменяемые параметры одного запуска.
#[derive(Debug, Clone)]
pub(crate) struct HardwareParams {
    pub chunk: usize,
    pub sample_rate: f64,
    pub start_delay: Duration,
    pub poll: Duration,
    pub physical: usize,
    pub diversity: bool,
    pub read_base: Timestamp,
    pub tx_clock_skew: i64,
    pub tx_drift_ppm: f64,
    pub loopback_gain_db: f64,
    pub branch_gain_db: [f64; 2],
    pub noise_amplitude: f64,
    pub fail_after_samples: Option<u64>,
    /// Пакетов в работе одновременно; остальные ждут в очереди TX
    pub max_pending: usize,
    pub priority: Option<f32>,
}

struct PendingBurst {
    burst: TxBurst,
    len: u64,
}

pub(crate) struct Hardware {
    params: HardwareParams,
    rf: Arc<RfState>,
    status: Arc<HardwareStatus>,
    metrics: Arc<DeviceMetrics>,
    rx_out: Sender<RxChunk>,
    rx_evict: Receiver<RxChunk>,
    tx_in: Receiver<TxMessage>,
    stop_flag: Arc<AtomicBool>,
    pending: Vec<PendingBurst>,
    rng: SmallRng,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl HardwareParams {
    /// Расхождение TX счётчика относительно RX в аппаратный момент `hw`.
    pub fn skew_at(
        &self,
        hw: u64,
    ) -> i64 {
        self.tx_clock_skew + (hw as f64 * self.tx_drift_ppm * 1e-6).round() as i64
    }
}

impl Hardware {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        params: HardwareParams,
        rf: Arc<RfState>,
        status: Arc<HardwareStatus>,
        metrics: Arc<DeviceMetrics>,
        rx_out: Sender<RxChunk>,
        rx_evict: Receiver<RxChunk>,
        tx_in: Receiver<TxMessage>,
        stop_flag: Arc<AtomicBool>,
    ) -> Self {
        Self {
            params,
            rf,
            status,
            metrics,
            rx_out,
            rx_evict,
            tx_in,
            stop_flag,
            pending: Vec::new(),
            rng: SmallRng::from_entropy(),
        }
    }

    /// Выдаёт порции до установки `stop_flag`, отключения или отказа.
    pub fn run(mut self) {
        if let Some(hint) = self.params.priority {
            crate::rt::promote_current_thread(hint);
        }

        if !self.wait_start_delay() {
            return;
        }

        let sample_period = 1.0 / self.params.sample_rate;
        let start_mono = Instant::now();
        let mut produced: u64 = 0;

        while !self.stop_flag.load(Ordering::Relaxed) {
            let chunk = self.params.chunk as u64;

            // pacing: порция доступна, когда последняя её выборка принята
            let expected = Duration::from_secs_f64((produced + chunk) as f64 * sample_period);
            let elapsed = start_mono.elapsed();

            if expected > elapsed {
                thread::sleep((expected - elapsed).min(self.params.poll));
                continue;
            }

            let hw = self.status.hw_time.load(Ordering::Acquire);

            if let Some(limit) = self.params.fail_after_samples {
                if hw >= limit {
                    error!("Simulated hardware disconnected at sample {hw}");
                    self.status.failed.store(true, Ordering::Release);
                    return;
                }
            }

            let skew = self.params.skew_at(hw);
            self.drain_tx(hw, skew);

            let rx = self.receive(hw, skew);

            if !self.deliver(rx) {
                debug!("RX channel closed, hardware thread exiting");
                return;
            }

            self.status.hw_time.store(hw + chunk, Ordering::Release);
            produced += chunk;
        }
    }

    /// Ждёт `start_delay`, проверяя флаг остановки. `false` - остановлено.
    fn wait_start_delay(&self) -> bool {
        let deadline = Instant::now() + self.params.start_delay;

        loop {
            if self.stop_flag.load(Ordering::Relaxed) {
                return false;
            }

            let now = Instant::now();

            if now >= deadline {
                return true;
            }

            thread::sleep((deadline - now).min(self.params.poll));
        }
    }

    /// Забирает сообщения передачи, отмечая опоздавшие пакеты.
    ///
    /// Пока в работе `max_pending` пакетов, остальные сообщения остаются в
    /// очереди и запись упирается в её ёмкость.
    fn drain_tx(
        &mut self,
        hw: u64,
        skew: i64,
    ) {
        let tx_pos = hw as i64 + skew;

        while self.pending.len() < self.params.max_pending.max(1) {
            let Ok(msg) = self.tx_in.try_recv() else {
                break;
            };

            match msg {
                TxMessage::Burst(burst) => {
                    let len = burst.samples.first().map(|s| s.len() / 2).unwrap_or(0) as u64;
                    let late = (tx_pos - burst.counter as i64).clamp(0, len as i64) as u64;

                    if late > 0 {
                        self.metrics.late_samples.fetch_add(late, Ordering::Relaxed);
                        self.metrics.underruns.fetch_add(1, Ordering::Relaxed);
                        self.status.underruns.fetch_add(1, Ordering::Release);
                        warn!(
                            "TX underrun: burst at counter {} arrived {late} samples late",
                            burst.counter
                        );
                    }

                    if late < len {
                        self.pending.push(PendingBurst { burst, len });
                    }
                }
                TxMessage::Control { samples } => {
                    debug!("Control packet of {samples} samples");
                }
                TxMessage::Ping { hw_instant, reply } => {
                    let _ = reply.send(self.params.skew_at(hw_instant));
                }
            }
        }
    }

    /// Формирует порцию приёма `[hw, hw + chunk)`.
    fn receive(
        &mut self,
        hw: u64,
        skew: i64,
    ) -> RxChunk {
        let n = self.params.chunk;
        let rf = self.rf.snapshot();
        let win_start = hw as i64 + skew;
        let win_end = win_start + n as i64;

        let mut acc = vec![vec![0f64; 2 * n]; self.params.physical];

        for pending in &self.pending {
            let burst = &pending.burst;
            let b_start = burst.counter as i64;
            let b_end = b_start + pending.len as i64;
            let from = b_start.max(win_start);
            let to = b_end.min(win_end);

            if from >= to {
                continue;
            }

            for (branch, out) in acc.iter_mut().enumerate() {
                let (chan, pair_idx) = if self.params.diversity {
                    (branch / 2, branch % 2)
                } else {
                    (branch, 0)
                };

                let (Some(tx), Some(rx), Some(data)) =
                    (burst.rf.get(chan), rf.get(chan), burst.samples.get(chan))
                else {
                    continue;
                };

                let delta_hz = tx.tx_freq_hz - rx.rx_freq_hz;

                // тон вне полосы приёма не виден
                if delta_hz.abs() >= self.params.sample_rate / 2.0 {
                    continue;
                }

                let mut gain_db = tx.tx_gain_db + self.params.loopback_gain_db + rx.rx_gain_db;
                if self.params.diversity {
                    gain_db += self.params.branch_gain_db[pair_idx];
                }
                let amp = db_to_amplitude(gain_db);

                for c in from..to {
                    let src = 2 * (c - b_start) as usize;
                    let dst = 2 * (c - win_start) as usize;
                    let i = data[src] as f64 * amp;
                    let q = data[src + 1] as f64 * amp;

                    if delta_hz == 0.0 {
                        out[dst] += i;
                        out[dst + 1] += q;
                    } else {
                        let phase = 2.0 * PI * delta_hz * c as f64 / self.params.sample_rate;
                        let (sin, cos) = phase.sin_cos();
                        out[dst] += i * cos - q * sin;
                        out[dst + 1] += i * sin + q * cos;
                    }
                }
            }
        }

        self.pending
            .retain(|p| p.burst.counter as i64 + p.len as i64 > win_end);

        let noise = self.params.noise_amplitude;
        let data = acc
            .into_iter()
            .map(|branch| {
                branch
                    .into_iter()
                    .map(|v| {
                        if noise > 0.0 {
                            saturate_i16(v + self.rng.gen_range(-noise..=noise))
                        } else {
                            saturate_i16(v)
                        }
                    })
                    .collect()
            })
            .collect();

        RxChunk {
            timestamp: self.params.read_base + hw,
            data,
        }
    }

    /// Отдаёт порцию в очередь RX, вытесняя самую старую при переполнении.
    /// `false` - получатель закрыт.
    fn deliver(
        &self,
        chunk: RxChunk,
    ) -> bool {
        let n = self.params.chunk as u64;

        match self.rx_out.try_send(chunk) {
            Ok(()) => true,
            Err(TrySendError::Full(chunk)) => {
                if let Ok(old) = self.rx_evict.try_recv() {
                    self.metrics.dropped_samples.fetch_add(
                        old.data.first().map(|d| d.len() / 2).unwrap_or(0) as u64,
                        Ordering::Relaxed,
                    );
                }

                match self.rx_out.try_send(chunk) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        self.metrics.dropped_samples.fetch_add(n, Ordering::Relaxed);
                        true
                    }
                    Err(TrySendError::Disconnected(_)) => false,
                }
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
