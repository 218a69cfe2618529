//! Модель часов выборок.
//!
//! Приём и передача идут от разных аппаратных счётчиков. Модель переводит
//! виртуальные метки времени в счётчики оборудования и обратно:
//!
//! - RX: метка выборки `h` равна `h + read_base`;
//! - TX: запись с меткой `t` уходит на счётчик `(t - write_base) + offset`,
//!   где `offset` - текущая оценка расхождения TX относительно RX.
//!
//! `offset` меняется только через [`crate::AlignmentEngine::commit`].

use trx_types::Timestamp;

/// Отображение меток времени на аппаратные счётчики.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockModel {
    read_base: Timestamp,
    write_base: Timestamp,
    offset: i64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ClockModel {
    /// Модель, у которой первая выборка RX и TX имеет метку `base`.
    pub fn new(base: Timestamp) -> Self {
        Self {
            read_base: base,
            write_base: base,
            offset: 0,
        }
    }

    /// Первая допустимая метка чтения.
    pub fn initial_read_timestamp(&self) -> Timestamp {
        self.read_base
    }

    /// Первая допустимая метка записи.
    pub fn initial_write_timestamp(&self) -> Timestamp {
        self.write_base
    }

    /// Текущая оценка расхождения TX относительно RX (выборок).
    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub(crate) fn set_offset(
        &mut self,
        offset: i64,
    ) {
        self.offset = offset;
    }

    /// Метка времени для аппаратной RX выборки `hw`.
    pub fn rx_timestamp(
        &self,
        hw: u64,
    ) -> Timestamp {
        hw + self.read_base
    }

    /// Аппаратная RX выборка для метки `ts` (`None`, если раньше базы).
    pub fn rx_to_hw(
        &self,
        ts: Timestamp,
    ) -> Option<u64> {
        ts.checked_sub(self.read_base)
    }

    /// Аппаратный TX счётчик для записи с меткой `ts`.
    ///
    /// Значения до начала счётчика прижимаются к нулю.
    pub fn tx_to_hw(
        &self,
        ts: Timestamp,
    ) -> u64 {
        let rel = ts.saturating_sub(self.write_base) as i128 + self.offset as i128;

        rel.clamp(0, u64::MAX as i128) as u64
    }
}

impl Default for ClockModel {
    fn default() -> Self {
        Self::new(0)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
