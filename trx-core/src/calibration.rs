//! Частота и усиление по каналам.
//!
//! Состояние каналов лежит под `RwLock`: аппаратный поток и запись берут
//! снимок канала целиком, настройка меняет его целиком, поэтому
//! промежуточное состояние никто не видит.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use trx_types::{RadioError, RadioResult};

/// Диапазон перестройки с шагом квантования.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RfRange {
    pub min: f64,
    pub max: f64,
    /// Шаг (0 - без квантования)
    pub step: f64,
}

/// Пределы RF тракта устройства.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RfLimits {
    pub tx_gain: RfRange,
    pub rx_gain: RfRange,
    /// Диапазон частоты гетеродина (Гц)
    pub freq: RfRange,
}

/// Настройки одного канала.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelRf {
    pub tx_freq_hz: f64,
    pub rx_freq_hz: f64,
    pub tx_gain_db: f64,
    pub rx_gain_db: f64,
}

/// RF настройки всех каналов устройства.
#[derive(Debug)]
pub struct RfState {
    limits: RfLimits,
    offset_hz: f64,
    channels: RwLock<Vec<ChannelRf>>,
}

#[derive(Clone, Copy)]
enum Direction {
    Tx,
    Rx,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl RfRange {
    pub fn new(
        min: f64,
        max: f64,
        step: f64,
    ) -> Self {
        Self { min, max, step }
    }

    pub fn contains(
        &self,
        v: f64,
    ) -> bool {
        v >= self.min && v <= self.max
    }

    /// Ближайшее значение на сетке шага, отсчитанной от `min`.
    pub fn quantize(
        &self,
        v: f64,
    ) -> f64 {
        if self.step <= 0.0 || !v.is_finite() {
            return v;
        }

        self.min + ((v - self.min) / self.step).round() * self.step
    }

    /// Квантование с прижатием к границам, `±∞` прижимаются к границам.
    pub fn clamp(
        &self,
        v: f64,
    ) -> f64 {
        let v = v.clamp(self.min, self.max);

        self.quantize(v).clamp(self.min, self.max)
    }

    pub fn validate(
        &self,
        what: &str,
    ) -> RadioResult<()> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(RadioError::configuration(format!(
                "{what} range [{}, {}] is invalid",
                self.min, self.max
            )));
        }

        if !self.step.is_finite() || self.step < 0.0 {
            return Err(RadioError::configuration(format!(
                "{what} step {} is invalid",
                self.step
            )));
        }

        Ok(())
    }
}

impl RfLimits {
    pub fn validate(&self) -> RadioResult<()> {
        self.tx_gain.validate("TX gain")?;
        self.rx_gain.validate("RX gain")?;
        self.freq.validate("frequency")?;

        Ok(())
    }
}

impl RfState {
    /// Все каналы настроены на `freq_hz` с усилением приёма `rx_gain_db` и
    /// минимальным усилением передачи.
    pub fn new(
        limits: RfLimits,
        offset_hz: f64,
        chans: usize,
        freq_hz: f64,
        rx_gain_db: f64,
    ) -> Self {
        let initial = ChannelRf {
            tx_freq_hz: freq_hz,
            rx_freq_hz: freq_hz,
            tx_gain_db: limits.tx_gain.min,
            rx_gain_db: limits.rx_gain.clamp(rx_gain_db),
        };

        Self {
            limits,
            offset_hz,
            channels: RwLock::new(vec![initial; chans]),
        }
    }

    pub fn limits(&self) -> &RfLimits {
        &self.limits
    }

    pub fn channels(&self) -> usize {
        self.channels.read().len()
    }

    /// Согласованный снимок всех каналов.
    pub fn snapshot(&self) -> Vec<ChannelRf> {
        self.channels.read().clone()
    }

    pub fn channel(
        &self,
        chan: usize,
    ) -> RadioResult<ChannelRf> {
        let channels = self.channels.read();

        channels
            .get(chan)
            .copied()
            .ok_or_else(|| bad_channel(chan, channels.len()))
    }

    pub fn set_tx_freq(
        &self,
        hz: f64,
        chan: usize,
    ) -> RadioResult<f64> {
        self.set_freq(hz, chan, Direction::Tx)
    }

    pub fn set_rx_freq(
        &self,
        hz: f64,
        chan: usize,
    ) -> RadioResult<f64> {
        self.set_freq(hz, chan, Direction::Rx)
    }

    pub fn set_tx_gain(
        &self,
        db: f64,
        chan: usize,
    ) -> RadioResult<f64> {
        self.set_gain(db, chan, Direction::Tx)
    }

    pub fn set_rx_gain(
        &self,
        db: f64,
        chan: usize,
    ) -> RadioResult<f64> {
        self.set_gain(db, chan, Direction::Rx)
    }

    fn set_freq(
        &self,
        hz: f64,
        chan: usize,
        dir: Direction,
    ) -> RadioResult<f64> {
        if !hz.is_finite() {
            return Err(RadioError::invalid_argument(format!(
                "frequency {hz} is not finite"
            )));
        }

        let range = self.limits.freq;
        let lo = hz + self.offset_hz;

        if !range.contains(lo) {
            return Err(RadioError::OutOfRange {
                value: lo,
                min: range.min,
                max: range.max,
            });
        }

        let applied = range.clamp(lo) - self.offset_hz;
        let mut channels = self.channels.write();
        let count = channels.len();
        let rf = channels
            .get_mut(chan)
            .ok_or_else(|| bad_channel(chan, count))?;

        match dir {
            Direction::Tx => rf.tx_freq_hz = applied,
            Direction::Rx => rf.rx_freq_hz = applied,
        }

        Ok(applied)
    }

    fn set_gain(
        &self,
        db: f64,
        chan: usize,
        dir: Direction,
    ) -> RadioResult<f64> {
        if db.is_nan() {
            return Err(RadioError::invalid_argument("gain is NaN"));
        }

        let range = match dir {
            Direction::Tx => self.limits.tx_gain,
            Direction::Rx => self.limits.rx_gain,
        };
        let applied = range.clamp(db);

        let mut channels = self.channels.write();
        let count = channels.len();
        let rf = channels
            .get_mut(chan)
            .ok_or_else(|| bad_channel(chan, count))?;

        match dir {
            Direction::Tx => rf.tx_gain_db = applied,
            Direction::Rx => rf.rx_gain_db = applied,
        }

        if applied != db {
            log::debug!("channel {chan} gain {db} dB applied as {applied} dB");
        }

        Ok(applied)
    }
}

fn bad_channel(
    chan: usize,
    count: usize,
) -> RadioError {
    RadioError::invalid_argument(format!("channel {chan} out of range 0..{count}"))
}

impl Default for RfLimits {
    fn default() -> Self {
        Self {
            tx_gain: RfRange::new(0.0, 30.0, 0.5),
            rx_gain: RfRange::new(0.0, 60.0, 0.5),
            freq: RfRange::new(70e6, 6e9, 1.0),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
