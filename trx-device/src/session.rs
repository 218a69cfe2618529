use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use log::{info, warn};
use trx_core::DriftPolicy;
use trx_types::{RadioError, RadioResult, Timestamp};

use crate::RadioDevice;

/// Параметры петлевой сессии.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Длина маркерного пакета (выборок); пакеты идут через паузу той же длины
    pub burst_samples: usize,
    /// На сколько периодов запись опережает чтение
    pub lead_bursts: u64,
    /// Амплитуда маркера (I)
    pub marker_amplitude: i16,
    /// Порог обнаружения фронта маркера на приёме
    pub detect_threshold: i16,
    /// Допуск ошибки положения пакета до повторного выравнивания
    pub drift: DriftPolicy,
    /// Ограничение по числу пакетов. `None` - до остановки
    pub max_bursts: Option<u64>,
    /// Ограничение по времени (секунды)
    pub duration_secs: Option<u64>,
    /// Интервал вывода статистики (секунды)
    pub stats_interval_secs: u64,
}

/// Итог сессии.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub bursts_sent: u64,
    pub bursts_detected: u64,
    /// Пакеты, чей фронт не найден на приёме
    pub bursts_missed: u64,
    /// Наибольшая ошибка положения пакета после выравнивания (выборок)
    pub max_abs_error: u64,
    pub realignments: u64,
    pub overruns: u64,
    pub underruns: u64,
}

/// Гоняет маркерные пакеты через устройство и следит за выравниванием.
///
/// Запись идёт с опережением `lead_bursts` периодов, чтение - подряд.
/// Положение каждого принятого фронта сравнивается с меткой записи; если
/// ошибка выходит за допуск, устройство выравнивается заново на следующей
/// метке записи.
pub struct LoopbackSession {
    config: SessionConfig,
    stop_flag: Arc<AtomicBool>,
}

/// Поиск фронтов маркера в потоке I/Q.
#[derive(Debug, Clone)]
struct EdgeDetector {
    threshold: i32,
    high: bool,
}

/// Отправленные, но ещё не найденные пакеты.
#[derive(Debug, Default)]
struct InFlight {
    expected: VecDeque<Timestamp>,
    tolerance: u64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl SessionConfig {
    /// Параметры для `sps` выборок на символ (нормальный пакет GSM).
    pub fn for_sps(sps: usize) -> Self {
        Self {
            burst_samples: 625 * sps / 4,
            ..Default::default()
        }
    }

    fn period(&self) -> u64 {
        2 * self.burst_samples as u64
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            burst_samples: 625,
            lead_bursts: 16,
            marker_amplitude: 8_000,
            detect_threshold: 1_000,
            drift: DriftPolicy::default(),
            max_bursts: None,
            duration_secs: None,
            stats_interval_secs: 5,
        }
    }
}

impl std::fmt::Display for SessionReport {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(f, "  Bursts sent   : {}", self.bursts_sent)?;
        writeln!(
            f,
            "  Detected      : {} ({} missed)",
            self.bursts_detected, self.bursts_missed
        )?;
        writeln!(f, "  Max error     : {} samples", self.max_abs_error)?;
        writeln!(f, "  Realignments  : {}", self.realignments)?;
        writeln!(f, "  Overruns      : {}", self.overruns)?;
        writeln!(f, "  Underruns     : {}", self.underruns)?;
        write!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")
    }
}

impl EdgeDetector {
    fn new(threshold: i16) -> Self {
        Self {
            threshold: threshold.unsigned_abs().max(1) as i32,
            high: false,
        }
    }

    fn reset(&mut self) {
        self.high = false;
    }

    /// Добавляет в `edges` метки фронтов внутри `iq`, начинающегося с `ts`.
    fn scan(
        &mut self,
        iq: &[i16],
        ts: Timestamp,
        edges: &mut Vec<Timestamp>,
    ) {
        for (i, pair) in iq.chunks_exact(2).enumerate() {
            let mag = (pair[0] as i32).abs().max((pair[1] as i32).abs());
            let high = mag >= self.threshold;

            if high && !self.high {
                edges.push(ts + i as Timestamp);
            }

            self.high = high;
        }
    }
}

impl InFlight {
    fn new(tolerance: u64) -> Self {
        Self {
            expected: VecDeque::new(),
            tolerance,
        }
    }

    fn push(
        &mut self,
        ts: Timestamp,
    ) {
        self.expected.push_back(ts);
    }

    fn is_empty(&self) -> bool {
        self.expected.is_empty()
    }

    /// Сопоставляет фронт с ожидаемым пакетом. Возвращает метку пакета и
    /// ошибку положения, а также число пакетов, оставшихся без фронта.
    fn resolve(
        &mut self,
        edge: Timestamp,
    ) -> (Option<(Timestamp, i64)>, u64) {
        let mut missed = 0;

        while let Some(&exp) = self.expected.front() {
            if exp + self.tolerance < edge {
                self.expected.pop_front();
                missed += 1;
            } else {
                break;
            }
        }

        let Some(&exp) = self.expected.front() else {
            return (None, missed);
        };

        // фронт раньше ожидаемого больше чем на допуск: помеха
        if edge + self.tolerance < exp {
            return (None, missed);
        }

        self.expected.pop_front();

        (Some((exp, edge as i64 - exp as i64)), missed)
    }

    /// Отбрасывает пакеты, которые уже должны были прийти до `rx_next`.
    fn expire(
        &mut self,
        rx_next: Timestamp,
    ) -> u64 {
        let mut missed = 0;

        while let Some(&exp) = self.expected.front() {
            if exp + self.tolerance < rx_next {
                self.expected.pop_front();
                missed += 1;
            } else {
                break;
            }
        }

        missed
    }
}

impl LoopbackSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Флаг остановки. Устанавливается в `true` для graceful shutdown.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    /// Выполняет сессию на запущенном устройстве. Блокируется до завершения.
    pub fn run(
        &self,
        device: &dyn RadioDevice,
    ) -> RadioResult<SessionReport> {
        let cfg = &self.config;

        if cfg.burst_samples == 0 || cfg.lead_bursts == 0 {
            return Err(RadioError::configuration(
                "burst_samples and lead_bursts must be > 0",
            ));
        }

        let burst = cfg.burst_samples;
        let period = cfg.period();
        let lead = cfg.lead_bursts * period;
        let chans = device.config().logical_channels();

        let mut marker = vec![0i16; 2 * burst];
        for iq in marker.chunks_exact_mut(2) {
            iq[0] = cfg.marker_amplitude;
        }
        let tx_bufs: Vec<&[i16]> = vec![marker.as_slice(); chans];

        let mut rx_store = vec![vec![0i16; 2 * burst]; chans];
        let mut rx_bufs: Vec<&mut [i16]> = rx_store.iter_mut().map(|b| b.as_mut_slice()).collect();

        let mut report = SessionReport::default();
        let mut detector = EdgeDetector::new(cfg.detect_threshold);
        // ошибка больше полупериода неотличима от соседнего пакета
        let mut in_flight = InFlight::new(burst as u64);
        let mut edges = Vec::new();

        // текущее положение приёма
        let probe = device.read_samples(&mut rx_bufs, burst, None)?;
        let mut rx_next = probe.end();

        let mut tx_next = rx_next + lead;
        device.update_alignment(tx_next)?;
        let mut aligned_from = tx_next;

        info!(
            "Loopback session: burst={burst} samples, lead={lead} samples, anchor={tx_next}"
        );

        let session_start = Instant::now();
        let mut last_stats = Instant::now();
        let stats_interval = Duration::from_secs(cfg.stats_interval_secs);

        loop {
            if let Some(dur) = cfg.duration_secs {
                if session_start.elapsed().as_secs() >= dur {
                    info!("Duration limit reached ({dur}s)");
                    break;
                }
            }

            if self.stop_flag.load(Ordering::Relaxed) {
                info!("Stop signal received");
                break;
            }

            let all_sent = cfg.max_bursts.is_some_and(|m| report.bursts_sent >= m);

            if all_sent && (in_flight.is_empty() || rx_next >= tx_next) {
                break;
            }

            // запись с опережением
            while !cfg.max_bursts.is_some_and(|m| report.bursts_sent >= m)
                && tx_next < rx_next + lead
            {
                let written = device.write_samples(&tx_bufs, burst, tx_next, false)?;

                if written.flags.underrun {
                    report.underruns += 1;
                }

                if written.samples == 0 {
                    break;
                }

                in_flight.push(tx_next);
                tx_next += period;
                report.bursts_sent += 1;
            }

            let read = device.read_samples(&mut rx_bufs, burst, None)?;

            if read.flags.overrun {
                report.overruns += 1;
                detector.reset();
            }

            if read.flags.underrun {
                report.underruns += 1;
            }

            if read.samples == 0 {
                continue;
            }

            if read.timestamp != rx_next {
                detector.reset();
            }

            edges.clear();
            detector.scan(&rx_bufs[0][..2 * read.samples], read.timestamp, &mut edges);
            rx_next = read.end();

            for &edge in &edges {
                let (found, missed) = in_flight.resolve(edge);
                report.bursts_missed += missed;

                let Some((expected, error)) = found else {
                    continue;
                };

                report.bursts_detected += 1;

                // пакеты, отправленные до последнего выравнивания, не учитываются
                if expected < aligned_from {
                    continue;
                }

                report.max_abs_error = report.max_abs_error.max(error.unsigned_abs());

                if cfg.drift.needs_realignment(error) {
                    match device.update_alignment(tx_next) {
                        Ok(()) => {
                            warn!(
                                "Burst at {expected} off by {error} samples, realigned at {tx_next}"
                            );
                            aligned_from = tx_next;
                            report.realignments += 1;
                        }
                        Err(e @ RadioError::Unrealizable { .. }) => {
                            warn!("Realignment skipped: {e}");
                        }
                        Err(e) => return Err(e),
                    }
                }
            }

            report.bursts_missed += in_flight.expire(rx_next);

            if last_stats.elapsed() >= stats_interval {
                self.log_progress(&session_start, &report);
                last_stats = Instant::now();
            }
        }

        Ok(report)
    }

    fn log_progress(
        &self,
        start: &Instant,
        report: &SessionReport,
    ) {
        info!(
            "[ {:.0}s ] sent={} detected={} missed={} max_err={} realigned={} overruns={} underruns={}",
            start.elapsed().as_secs_f64(),
            report.bursts_sent,
            report.bursts_detected,
            report.bursts_missed,
            report.max_abs_error,
            report.realignments,
            report.overruns,
            report.underruns,
        );
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
