use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use trx_core::RfLimits;
use trx_types::{MasterClock, RadioError, RadioResult, Timestamp, WindowType};

/// Профиль симулируемого оборудования.
///
/// Загружается из JSON (отсутствующие поля берутся из `Default`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Семейство мастер-клока (определяет вариант передискретизации)
    pub master_clock: MasterClock,
    /// Политика окна передачи
    pub window: WindowType,
    /// Размер окна `Fixed` (выборок)
    pub tx_window_samples: u64,
    /// Выборок в одной порции оборудования (округляется до блока хоста)
    pub chunk_samples: usize,
    /// Ёмкость очереди RX (порций)
    pub rx_queue_depth: usize,
    /// Ёмкость очереди TX (сообщений)
    pub tx_queue_depth: usize,
    /// Задержка первой порции после `start()` (мс)
    pub start_delay_ms: u64,
    /// Максимальное ожидание одного вызова чтения/записи (мс)
    pub io_timeout_ms: u64,
    /// Период опроса флага остановки при ожидании (мс)
    pub poll_interval_ms: u64,
    /// Подряд пустых чтений/записей до `HardwareFault`
    pub max_io_retries: u32,
    pub limits: RfLimits,
    /// Начальная частота всех каналов (Гц)
    pub initial_freq_hz: f64,
    /// Начальное усиление приёма (дБ)
    pub initial_rx_gain_db: f64,
    /// Затухание петли TX -> RX (дБ)
    pub loopback_gain_db: f64,
    /// Амплитуда равномерного шума на входе приёмника
    pub noise_amplitude: f64,
    /// Усиление ветвей пары разнесённого приёма (дБ)
    pub diversity_branch_gain_db: [f64; 2],
    /// Расхождение TX счётчика относительно RX (выборок)
    pub tx_clock_skew: i64,
    /// Дрейф TX клока относительно RX (ppm), при внешней опоре не действует
    pub tx_drift_ppm: f64,
    /// Оборудование "отключается" после стольких выборок
    pub fail_after_samples: Option<u64>,
    /// Метка времени первой выборки
    pub initial_timestamp: Timestamp,
}

/// Разобранные аргументы `open()`: `key=value` через запятую.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenArgs {
    /// Серийный номер устройства
    pub serial: Option<String>,
    /// Сколько первых попыток `open()` вернут `Busy`
    pub busy: u32,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl SimConfig {
    /// Загружает профиль из JSON файла.
    pub fn load<P: AsRef<Path>>(path: P) -> RadioResult<Self> {
        let path = path.as_ref();

        let text = std::fs::read_to_string(path).map_err(|e| {
            RadioError::configuration(format!("cannot read {}: {e}", path.display()))
        })?;

        let config: Self = serde_json::from_str(&text).map_err(|e| {
            RadioError::configuration(format!("invalid profile {}: {e}", path.display()))
        })?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> RadioResult<()> {
        if self.chunk_samples == 0 {
            return Err(RadioError::configuration("chunk_samples must be > 0"));
        }

        if self.rx_queue_depth == 0 || self.tx_queue_depth == 0 {
            return Err(RadioError::configuration("queue depths must be > 0"));
        }

        if self.tx_window_samples < self.chunk_samples as u64 {
            return Err(RadioError::configuration(format!(
                "tx window {} is smaller than one chunk ({})",
                self.tx_window_samples, self.chunk_samples
            )));
        }

        if self.io_timeout_ms == 0 || self.poll_interval_ms == 0 {
            return Err(RadioError::configuration(
                "io_timeout_ms and poll_interval_ms must be > 0",
            ));
        }

        self.limits.validate()?;

        if !self.limits.freq.contains(self.initial_freq_hz) {
            return Err(RadioError::configuration(format!(
                "initial frequency {} Hz outside tuning range",
                self.initial_freq_hz
            )));
        }

        let finite = [
            self.initial_rx_gain_db,
            self.loopback_gain_db,
            self.noise_amplitude,
            self.diversity_branch_gain_db[0],
            self.diversity_branch_gain_db[1],
            self.tx_drift_ppm,
        ];

        if finite.iter().any(|v| !v.is_finite()) || self.noise_amplitude < 0.0 {
            return Err(RadioError::configuration(
                "gains, noise and drift must be finite (noise >= 0)",
            ));
        }

        Ok(())
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl OpenArgs {
    /// Разбирает `"serial=SIM-0001,busy=2"`. Пустая строка допустима.
    pub fn parse(args: &str) -> RadioResult<Self> {
        let mut parsed = Self::default();

        for part in args.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                RadioError::configuration(format!("device argument '{part}' is not key=value"))
            })?;

            match key.trim() {
                "serial" => parsed.serial = Some(value.trim().to_string()),
                "busy" => {
                    parsed.busy = value.trim().parse().map_err(|e| {
                        RadioError::configuration(format!("invalid busy count '{value}': {e}"))
                    })?
                }
                other => {
                    return Err(RadioError::configuration(format!(
                        "unknown device argument '{other}'"
                    )))
                }
            }
        }

        Ok(parsed)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для SimConfig
////////////////////////////////////////////////////////////////////////////////

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            master_clock: MasterClock::Native,
            window: WindowType::Fixed,
            tx_window_samples: 50_000,
            chunk_samples: 625,
            rx_queue_depth: 256,
            tx_queue_depth: 256,
            start_delay_ms: 50,
            io_timeout_ms: 200,
            poll_interval_ms: 5,
            max_io_retries: 5,
            limits: RfLimits::default(),
            initial_freq_hz: 900e6,
            initial_rx_gain_db: 30.0,
            loopback_gain_db: -30.0,
            noise_amplitude: 0.0,
            diversity_branch_gain_db: [0.0, -6.0],
            tx_clock_skew: 0,
            tx_drift_ppm: 0.0,
            fail_after_samples: None,
            initial_timestamp: 0,
        }
    }
}

/// Парсит строку частоты в герцы.
///
/// Поддерживает суффиксы: `GHz`, `MHz`, `kHz`, `Hz` (регистронезависимо).
///
/// # Примеры
/// ```
/// use trx_device::config::parse_freq_hz;
/// assert_eq!(parse_freq_hz("935.2MHz").unwrap(), 935_200_000.0);
/// assert_eq!(parse_freq_hz("1.8GHz").unwrap(), 1_800_000_000.0);
/// assert_eq!(parse_freq_hz("900000000").unwrap(), 900_000_000.0);
/// ```
pub fn parse_freq_hz(s: &str) -> Result<f64, String> {
    let s = s.trim();
    let lower = s.to_lowercase();

    let (num_str, mult) = if let Some(v) = lower.strip_suffix("ghz") {
        (v.trim(), 1e9)
    } else if let Some(v) = lower.strip_suffix("mhz") {
        (v.trim(), 1e6)
    } else if let Some(v) = lower.strip_suffix("khz") {
        (v.trim(), 1e3)
    } else if let Some(v) = lower.strip_suffix("hz") {
        (v.trim(), 1.0)
    } else {
        (lower.as_str(), 1.0)
    };

    let n: f64 = num_str
        .parse()
        .map_err(|e| format!("Invalid frequency '{s}': {e}"))?;

    if !n.is_finite() || n < 0.0 {
        return Err(format!("Invalid frequency '{s}'"));
    }

    Ok((n * mult).round())
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_freq_hz() {
        assert_eq!(parse_freq_hz("935.2MHz").unwrap(), 935_200_000.0);
        assert_eq!(parse_freq_hz("1.8GHz").unwrap(), 1_800_000_000.0);
        assert_eq!(parse_freq_hz("200kHz").unwrap(), 200_000.0);
        assert_eq!(parse_freq_hz("900000000Hz").unwrap(), 900_000_000.0);
        assert_eq!(parse_freq_hz("900000000").unwrap(), 900_000_000.0);
        assert!(parse_freq_hz("abc").is_err());
        assert!(parse_freq_hz("-5MHz").is_err());
    }

    #[test]
    fn test_open_args() {
        assert_eq!(OpenArgs::parse("").unwrap(), OpenArgs::default());

        let args = OpenArgs::parse("serial=SIM-0001, busy=2").unwrap();
        assert_eq!(args.serial.as_deref(), Some("SIM-0001"));
        assert_eq!(args.busy, 2);

        assert!(matches!(
            OpenArgs::parse("type=b200"),
            Err(RadioError::Configuration(_))
        ));
        assert!(OpenArgs::parse("serial").is_err());
        assert!(OpenArgs::parse("busy=x").is_err());
    }

    #[test]
    fn test_default_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_profiles() {
        let mut cfg = SimConfig::default();
        cfg.chunk_samples = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = SimConfig::default();
        cfg.tx_window_samples = 100;
        assert!(cfg.validate().is_err());

        let mut cfg = SimConfig::default();
        cfg.initial_freq_hz = 10e6;
        assert!(cfg.validate().is_err());

        let mut cfg = SimConfig::default();
        cfg.noise_amplitude = -1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_partial_profile() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"master_clock": "mhz64", "window": "usrp1", "tx_clock_skew": -12}}"#
        )
        .unwrap();

        let cfg = SimConfig::load(file.path()).unwrap();
        assert_eq!(cfg.master_clock, MasterClock::Mhz64);
        assert_eq!(cfg.window, WindowType::Usrp1);
        assert_eq!(cfg.tx_clock_skew, -12);
        assert_eq!(cfg.chunk_samples, 625);
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            SimConfig::load("/nonexistent/profile.json"),
            Err(RadioError::Configuration(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"chunk_samples": 0}}"#).unwrap();
        assert!(SimConfig::load(file.path()).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(SimConfig::load(file.path()).is_err());
    }
}
