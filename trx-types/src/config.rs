use serde::{Deserialize, Serialize};

use crate::{RadioError, RadioResult, MAX_CHANNELS, SUPPORTED_SPS};

/// Неизменяемая конфигурация устройства, задаётся при создании.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Выборок на символ
    pub sps: usize,
    /// Число каналов. При `diversity` это число физических антенн.
    pub chans: usize,
    /// Разнесённый приём
    pub diversity: bool,
    /// Смещение частоты гетеродина (Гц)
    pub offset_hz: f64,
    /// Подсказка приоритета реального времени (0.0..=1.0), `None` - не менять
    pub priority: Option<f32>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl DeviceConfig {
    pub fn new(
        sps: usize,
        chans: usize,
    ) -> Self {
        Self {
            sps,
            chans,
            ..Default::default()
        }
    }

    /// Конфигурация с разнесённым приёмом на `chans` антеннах.
    pub fn with_diversity(
        sps: usize,
        chans: usize,
    ) -> Self {
        Self {
            sps,
            chans,
            diversity: true,
            ..Default::default()
        }
    }

    /// Число логических каналов, видимых вызывающему.
    pub fn logical_channels(&self) -> usize {
        if self.diversity {
            self.chans / 2
        } else {
            self.chans
        }
    }

    /// Число физических приёмных трактов.
    pub fn physical_channels(&self) -> usize {
        self.chans
    }

    /// Проверяет параметры, не зависящие от оборудования.
    pub fn validate(&self) -> RadioResult<()> {
        if !SUPPORTED_SPS.contains(&self.sps) {
            return Err(RadioError::configuration(format!(
                "unsupported samples-per-symbol {}, expected one of {:?}",
                self.sps, SUPPORTED_SPS
            )));
        }

        if self.chans == 0 || self.chans > MAX_CHANNELS {
            return Err(RadioError::configuration(format!(
                "channel count {} outside 1..={MAX_CHANNELS}",
                self.chans
            )));
        }

        if self.diversity && (self.chans < 2 || self.chans % 2 != 0) {
            return Err(RadioError::configuration(format!(
                "diversity needs an even number of antennas >= 2, got {}",
                self.chans
            )));
        }

        if !self.offset_hz.is_finite() {
            return Err(RadioError::configuration("frequency offset must be finite"));
        }

        if let Some(p) = self.priority {
            if !(0.0..=1.0).contains(&p) {
                return Err(RadioError::configuration(format!(
                    "priority hint {p} outside 0.0..=1.0"
                )));
            }
        }

        Ok(())
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            sps: 4,
            chans: 1,
            diversity: false,
            offset_hz: 0.0,
            priority: None,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
