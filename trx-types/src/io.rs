use crate::Timestamp;

/// Флаги переходных событий, замеченных вызовом чтения/записи.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoFlags {
    /// Приёмный буфер был перезаписан до вычитывания (потеря данных)
    pub overrun: bool,
    /// Передатчику не хватило данных (эфир пуст или устаревшие выборки)
    pub underrun: bool,
}

/// Результат `read_samples`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadResult {
    /// Число прочитанных выборок на канал (`<= len`)
    pub samples: usize,
    /// Метка времени первой возвращённой выборки
    pub timestamp: Timestamp,
    pub flags: IoFlags,
    /// Оценка мощности принятого окна (dBFS)
    pub rssi: Option<f32>,
}

/// Результат `write_samples`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteResult {
    /// Число принятых устройством выборок на канал (`<= len`)
    pub samples: usize,
    pub flags: IoFlags,
}

impl IoFlags {
    pub fn any(&self) -> bool {
        self.overrun || self.underrun
    }
}

impl ReadResult {
    /// Пустой результат, начинающийся с `timestamp`.
    pub fn empty(timestamp: Timestamp) -> Self {
        Self {
            samples: 0,
            timestamp,
            flags: IoFlags::default(),
            rssi: None,
        }
    }

    /// Метка времени сразу после последней возвращённой выборки.
    pub fn end(&self) -> Timestamp {
        self.timestamp + self.samples as Timestamp
    }
}
