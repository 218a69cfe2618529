use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

/// Счётчики устройства, обновляемые lock-free из нескольких потоков.
#[derive(Debug, Default)]
pub struct DeviceMetrics {
    pub samples_read: AtomicU64,
    pub samples_written: AtomicU64,
    pub control_packets: AtomicU64,
    /// Выборки, вытесненные из очереди RX до чтения
    pub dropped_samples: AtomicU64,
    /// Чтения, вернувшие флаг `overrun`
    pub overruns: AtomicU64,
    /// Выборки TX, пришедшие к оборудованию после своей метки
    pub late_samples: AtomicU64,
    /// События опустошения TX
    pub underruns: AtomicU64,
    pub alignments: AtomicU64,
    /// Вызовы, завершившиеся по таймауту без данных
    pub timeouts: AtomicU64,
}

/// Снимок метрик для отображения / тестирования.
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub duration_secs: f64,
    pub samples_read: u64,
    pub samples_written: u64,
    pub control_packets: u64,
    pub dropped_samples: u64,
    pub overruns: u64,
    pub late_samples: u64,
    pub underruns: u64,
    pub alignments: u64,
    pub timeouts: u64,
    pub rx_throughput_msps: f64,
    pub drop_rate_pct: f64,
}

impl DeviceMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Скорость чтения в Мвыб/с.
    pub fn rx_throughput_msps(
        &self,
        elapsed: &Instant,
    ) -> f64 {
        let secs = elapsed.elapsed().as_secs_f64();

        if secs < 1e-9 {
            return 0.0;
        }

        self.samples_read.load(Ordering::Relaxed) as f64 / secs / 1_000_000.0
    }

    /// Процент потерянных выборок приёма (0.0-100.0).
    pub fn drop_rate_pct(&self) -> f64 {
        let read = self.samples_read.load(Ordering::Relaxed);
        let dropped = self.dropped_samples.load(Ordering::Relaxed);
        let total = read + dropped;

        if total == 0 {
            0.0
        } else {
            dropped as f64 / total as f64 * 100.0
        }
    }

    pub fn summary(
        &self,
        elapsed: &Instant,
    ) -> MetricsSummary {
        MetricsSummary {
            duration_secs: elapsed.elapsed().as_secs_f64(),
            samples_read: self.samples_read.load(Ordering::Relaxed),
            samples_written: self.samples_written.load(Ordering::Relaxed),
            control_packets: self.control_packets.load(Ordering::Relaxed),
            dropped_samples: self.dropped_samples.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            late_samples: self.late_samples.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            alignments: self.alignments.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            rx_throughput_msps: self.rx_throughput_msps(elapsed),
            drop_rate_pct: self.drop_rate_pct(),
        }
    }
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(f, "  Duration      : {:.1}s", self.duration_secs)?;
        writeln!(f, "  Samples read  : {}", self.samples_read)?;
        writeln!(f, "  Samples sent  : {}", self.samples_written)?;
        writeln!(f, "  Control pkts  : {}", self.control_packets)?;
        writeln!(
            f,
            "  Dropped       : {} ({:.2}%)",
            self.dropped_samples, self.drop_rate_pct
        )?;
        writeln!(f, "  Overruns      : {}", self.overruns)?;
        writeln!(
            f,
            "  Underruns     : {} ({} late samples)",
            self.underruns, self.late_samples
        )?;
        writeln!(f, "  Alignments    : {}", self.alignments)?;
        writeln!(f, "  Timeouts      : {}", self.timeouts)?;
        writeln!(f, "  RX throughput : {:.3} Msps", self.rx_throughput_msps)?;
        write!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")
    }
}
