use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use clap::Parser;
use log::{error, info, warn};
use trx_core::DriftPolicy;
use trx_device::{
    make, open_with_retry, parse_freq_hz, LoopbackSession, RadioDevice, SessionConfig, SimConfig,
};
use trx_types::{ClockReference, DeviceConfig, MasterClock, WindowType};

#[derive(Parser, Debug)]
#[command(
    name = "trx-loopback",
    version = env!("CARGO_PKG_VERSION"),
    about = "Drive marker bursts through a simulated transceiver loopback and check TX/RX alignment",
    long_about = None,
)]
struct Cli {
    /// Выборок на символ: 1 или 4
    #[arg(long, default_value = "4")]
    sps: usize,
    /// Число каналов (при --diversity - число антенн, чётное)
    #[arg(short, long, default_value = "1")]
    chans: usize,
    /// Разнесённый приём (пары антенн на логический канал)
    #[arg(long)]
    diversity: bool,
    /// Несущая частота (900MHz, 1.8GHz, 935200000)
    #[arg(short = 'f', long, default_value = "900MHz")]
    freq: String,
    /// Смещение гетеродина (Гц)
    #[arg(long, default_value = "0")]
    offset: f64,
    /// Усиление передачи, дБ
    #[arg(long)]
    tx_gain: Option<f64>,
    /// Усиление приёма, дБ
    #[arg(long)]
    rx_gain: Option<f64>,
    /// Мастер-клок: native, 64M, 100M, 30.72M (по умолчанию из профиля)
    #[arg(long)]
    clock: Option<String>,
    /// Окно передачи: fixed, usrp1 (по умолчанию из профиля)
    #[arg(long)]
    window: Option<String>,
    /// Опорный генератор: internal, external
    #[arg(long, default_value = "internal")]
    reference: String,
    /// JSON профиль симулируемого оборудования
    #[arg(short, long)]
    profile: Option<PathBuf>,
    /// Аргументы устройства (serial=...,busy=N)
    #[arg(long, default_value = "")]
    args: String,
    /// Попыток open() при занятом устройстве
    #[arg(long, default_value = "3")]
    open_attempts: u32,
    /// Длительность сессии (секунды). По умолчанию: до Ctrl+C
    #[arg(short, long)]
    duration: Option<u64>,
    /// Число маркерных пакетов
    #[arg(short, long)]
    bursts: Option<u64>,
    /// Допуск ошибки положения пакета (выборок)
    #[arg(long, default_value = "1")]
    tolerance: u64,
    /// Приоритет реального времени 0.0..=1.0
    #[arg(long)]
    priority: Option<f32>,
    /// Интервал вывода статистики (секунды)
    #[arg(long, default_value = "5")]
    stats_interval: u64,
    /// Тихий режим (только ошибки)
    #[arg(short, long)]
    quiet: bool,
    /// Подробный вывод
    #[arg(short, long)]
    verbose: bool,
}

fn fail(msg: impl std::fmt::Display) -> ! {
    error!("{msg}");
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        log::LevelFilter::Error
    } else if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .format_target(false)
        .format_timestamp_secs()
        .init();

    let mut sim = match &cli.profile {
        Some(path) => SimConfig::load(path).unwrap_or_else(|e| fail(format!("--profile: {e}"))),
        None => SimConfig::default(),
    };

    if let Some(clock) = &cli.clock {
        sim.master_clock = clock
            .parse::<MasterClock>()
            .unwrap_or_else(|e| fail(format!("--clock: {e}")));
    }

    if let Some(window) = &cli.window {
        sim.window = window
            .parse::<WindowType>()
            .unwrap_or_else(|e| fail(format!("--window: {e}")));
    }

    let reference: ClockReference = cli
        .reference
        .parse()
        .unwrap_or_else(|e| fail(format!("--reference: {e}")));

    let freq_hz = parse_freq_hz(&cli.freq).unwrap_or_else(|e| fail(format!("--freq: {e}")));

    let config = DeviceConfig {
        sps: cli.sps,
        chans: cli.chans,
        diversity: cli.diversity,
        offset_hz: cli.offset,
        priority: cli.priority,
    };

    let device: Arc<dyn RadioDevice> = match make(&config, &sim) {
        Ok(d) => Arc::from(d),
        Err(e) => fail(format!("Failed to create device: {e}")),
    };

    let iface = open_with_retry(
        device.as_ref(),
        &cli.args,
        reference,
        cli.open_attempts.max(1),
        Duration::from_millis(100),
    )
    .unwrap_or_else(|e| fail(format!("Failed to open device: {e}")));

    for chan in 0..config.logical_channels() {
        let tuned = device
            .set_tx_freq(freq_hz, chan)
            .and_then(|tx| device.set_rx_freq(freq_hz, chan).map(|rx| (tx, rx)));

        match tuned {
            Ok((tx, rx)) if tx != freq_hz || rx != freq_hz => {
                warn!("Channel {chan} tuned to TX {tx} Hz / RX {rx} Hz (requested {freq_hz} Hz)")
            }
            Ok(_) => {}
            Err(e) => fail(format!("--freq: {e}")),
        }

        if let Some(db) = cli.tx_gain {
            match device.set_tx_gain(db, chan) {
                Ok(applied) if applied != db => {
                    warn!("Channel {chan} TX gain clamped to {applied} dB")
                }
                Ok(_) => {}
                Err(e) => fail(format!("--tx-gain: {e}")),
            }
        }

        if let Some(db) = cli.rx_gain {
            match device.set_rx_gain(db, chan) {
                Ok(applied) if applied != db => {
                    warn!("Channel {chan} RX gain clamped to {applied} dB")
                }
                Ok(_) => {}
                Err(e) => fail(format!("--rx-gain: {e}")),
            }
        }
    }

    let session = LoopbackSession::new(SessionConfig {
        drift: DriftPolicy::new(cli.tolerance),
        max_bursts: cli.bursts,
        duration_secs: cli.duration,
        stats_interval_secs: cli.stats_interval,
        ..SessionConfig::for_sps(cli.sps)
    });
    let stop_flag: Arc<AtomicBool> = session.stop_flag();
    let stop_ctrlc = stop_flag.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        if stop_ctrlc.swap(true, Ordering::SeqCst) {
            // Второй Ctrl+C - принудительный выход
            warn!("Force exit");
            std::process::exit(130);
        }
        warn!("Ctrl+C received - finishing current burst...");
    }) {
        warn!("Failed to set Ctrl+C handler: {e}");
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Interface     : {iface}");
    info!("  Window        : {}", device.window_type());
    info!("  Reference     : {reference}");
    info!(
        "  Channels      : {} logical / {} physical",
        config.logical_channels(),
        config.physical_channels()
    );
    info!("  Frequency     : {:.3} MHz", freq_hz / 1e6);
    info!(
        "  Sample rate   : {:.3} Msps host / {:.3} Msps device",
        device.sample_rate() / 1e6,
        device.device_sample_rate() / 1e6
    );
    info!(
        "  TX gain       : {:.1} .. {:.1} dB",
        device.min_tx_gain(),
        device.max_tx_gain()
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if let Err(e) = device.start() {
        fail(format!("Failed to start device: {e}"));
    }

    let session_start = Instant::now();
    let result = session.run(device.as_ref());

    if let Err(e) = device.stop() {
        warn!("Failed to stop device: {e}");
    }

    let report = match result {
        Ok(r) => r,
        Err(e) => fail(format!("Loopback session failed: {e}")),
    };

    let summary = device.metrics().summary(&session_start);
    info!("\n{summary}");
    info!("\n{report}");

    if summary.dropped_samples > 0 {
        warn!(
            "⚠ {} samples dropped ({:.2}% loss). Consider a larger rx_queue_depth in the profile",
            summary.dropped_samples, summary.drop_rate_pct
        );
    }

    if report.bursts_missed > 0 {
        warn!("⚠ {} bursts were not detected", report.bursts_missed);
        std::process::exit(1);
    }

    info!(
        "✓ Loopback complete: {} read / {} written samples",
        device.number_read(),
        device.number_written()
    );
}
