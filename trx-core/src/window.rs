//! Политика окна передачи.
//!
//! `Usrp1` - непрерывный поток: любая будущая запись принимается сразу, а
//! ограничивает её только очередь транспорта. `Fixed` - транспорт держит
//! ограниченное окно будущих выборок: запись принимается, только когда её
//! конец укладывается в `window` выборок от текущего момента оборудования.

use trx_types::{Timestamp, WindowType};

/// Решение о приёме записи.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Запись принимается
    Admit,
    /// Запись принимается, но её начало уже в прошлом на `behind` выборок
    Late { behind: u64 },
    /// Запись выходит за окно на `excess` выборок, нужно подождать
    Wait { excess: u64 },
}

/// Окно передачи устройства.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    kind: WindowType,
    window: u64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl WindowPolicy {
    pub fn new(
        kind: WindowType,
        window: u64,
    ) -> Self {
        Self {
            kind,
            window: window.max(1),
        }
    }

    pub fn kind(&self) -> WindowType {
        self.kind
    }

    /// Размер окна, выборок (для `Usrp1` не ограничивает запись).
    pub fn window(&self) -> u64 {
        self.window
    }

    /// Решает, можно ли сейчас передать `[ts, ts + len)`, если оборудование
    /// находится в момент `now`.
    pub fn admit(
        &self,
        ts: Timestamp,
        len: usize,
        now: Timestamp,
    ) -> Admission {
        if ts < now {
            return Admission::Late { behind: now - ts };
        }

        match self.kind {
            WindowType::Usrp1 => Admission::Admit,
            WindowType::Fixed => {
                let end = ts.saturating_add(len as Timestamp);
                let limit = now.saturating_add(self.window);

                if end > limit {
                    Admission::Wait {
                        excess: end - limit,
                    }
                } else {
                    Admission::Admit
                }
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
