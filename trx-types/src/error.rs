use thiserror::Error;

use crate::Timestamp;

/// Результат для операций радиоустройства
pub type RadioResult<T> = std::result::Result<T, RadioError>;

/// Ошибки контракта ввода/вывода радиоустройства.
///
/// Переполнения и опустошения буферов (`overrun`/`underrun`) сюда не входят:
/// это штатные флаги в [`crate::IoFlags`], а не ошибки.
#[derive(Debug, Error)]
pub enum RadioError {
    /// Неподдерживаемая комбинация параметров или некорректные аргументы
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Устройство временно занято, `open()` можно повторить
    #[error("Device busy: {0}")]
    Busy(String),

    /// Вызов не допустим в текущем состоянии жизненного цикла
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Некорректный аргумент вызова (номер канала, размер буфера, NaN)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Чтение/запись с меткой времени раньше уже обработанной
    #[error("Timestamp out of order: requested {requested}, next allowed {next}")]
    TimestampOrder { requested: Timestamp, next: Timestamp },

    /// Значение целиком вне диапазона перестройки устройства
    #[error("Value {value} out of range [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },

    /// Якорь выравнивания недостижим при текущем состоянии буферов
    #[error("Alignment at {anchor} not realizable: {reason}")]
    Unrealizable { anchor: Timestamp, reason: String },

    /// Устройство отключено или транспорт стабильно не отвечает
    #[error("Hardware fault: {0}")]
    HardwareFault(String),
}

impl RadioError {
    /// Удобные конструкторы
    pub fn configuration<S: Into<String>>(s: S) -> Self {
        Self::Configuration(s.into())
    }

    pub fn invalid_state<S: Into<String>>(s: S) -> Self {
        Self::InvalidState(s.into())
    }

    pub fn invalid_argument<S: Into<String>>(s: S) -> Self {
        Self::InvalidArgument(s.into())
    }

    pub fn hardware_fault<S: Into<String>>(s: S) -> Self {
        Self::HardwareFault(s.into())
    }

    /// `true`, если операцию имеет смысл повторить (например, `open()`).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RadioError::Busy(_))
    }
}
