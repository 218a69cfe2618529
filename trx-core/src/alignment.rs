//! Выравнивание TX относительно RX.
//!
//! Выравнивание привязывается к якорной метке времени `T`: устройство
//! измеряет расхождение аппаратных счётчиков в момент `T` и принимает его как
//! новый `offset` модели часов. После этого запись с меткой `t >= T`
//! излучается в тот физический момент, который приём помечает как `t`.

use trx_types::{RadioError, RadioResult, Timestamp};

use crate::ClockModel;

/// Состояние выравнивания одного устройства.
#[derive(Debug, Clone, Default)]
pub struct AlignmentEngine {
    anchor: Option<Timestamp>,
}

/// Что нужно сделать для выравнивания на якорь.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentPlan {
    /// Якорь совпадает с текущим, ничего делать не нужно
    AlreadyAligned,
    /// Нужно измерить расхождение в аппаратный момент RX `hw_instant`
    Measure { hw_instant: u64 },
}

/// Порог, после которого наблюдаемый дрейф требует повторного выравнивания.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftPolicy {
    /// Допустимая ошибка, выборок
    pub tolerance_samples: u64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl AlignmentEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Текущий якорь (`None`, пока выравнивание не выполнялось).
    pub fn anchor(&self) -> Option<Timestamp> {
        self.anchor
    }

    /// Проверяет якорь и решает, нужно ли измерение.
    ///
    /// `hw_now` - текущий аппаратный момент RX, `write_cursor` - метка, до
    /// которой записи уже переданы оборудованию.
    pub fn plan(
        &self,
        anchor: Timestamp,
        clock: &ClockModel,
        hw_now: u64,
        write_cursor: Timestamp,
    ) -> RadioResult<AlignmentPlan> {
        if self.anchor == Some(anchor) {
            return Ok(AlignmentPlan::AlreadyAligned);
        }

        let hw_instant = clock.rx_to_hw(anchor).ok_or_else(|| RadioError::Unrealizable {
            anchor,
            reason: format!(
                "anchor precedes first sample {}",
                clock.initial_read_timestamp()
            ),
        })?;

        if hw_instant < hw_now {
            return Err(RadioError::Unrealizable {
                anchor,
                reason: format!(
                    "anchor already elapsed, hardware is at {}",
                    clock.rx_timestamp(hw_now)
                ),
            });
        }

        if anchor < write_cursor {
            return Err(RadioError::Unrealizable {
                anchor,
                reason: format!("samples already committed up to {write_cursor}"),
            });
        }

        Ok(AlignmentPlan::Measure { hw_instant })
    }

    /// Принимает измеренное расхождение и возвращает прежний `offset`.
    pub fn commit(
        &mut self,
        anchor: Timestamp,
        measured_skew: i64,
        clock: &mut ClockModel,
    ) -> i64 {
        let prev = clock.offset();
        clock.set_offset(measured_skew);
        self.anchor = Some(anchor);

        if prev != measured_skew {
            log::debug!("TX offset {prev} -> {measured_skew} at anchor {anchor}");
        }

        prev
    }

    /// Сбрасывает якорь, сохраняя `offset` (новый старт устройства).
    pub fn reset(&mut self) {
        self.anchor = None;
    }
}

impl DriftPolicy {
    pub fn new(tolerance_samples: u64) -> Self {
        Self { tolerance_samples }
    }

    /// `true`, если ошибка `error` (выборок, со знаком) вышла за допуск.
    pub fn needs_realignment(
        &self,
        error: i64,
    ) -> bool {
        error.unsigned_abs() > self.tolerance_samples
    }
}

impl Default for DriftPolicy {
    fn default() -> Self {
        Self::new(1)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
