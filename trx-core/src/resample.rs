//! Отношение частот хоста и устройства для вариантов с передискретизацией.
//!
//! Сами фильтры передискретизации сюда не входят: отношение задаёт только
//! частоту устройства и кратность порций транспорта.

use trx_types::InterfaceType;

/// Рациональное отношение `device / host = p / q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResampleRatio {
    /// Выборок на стороне устройства в одном блоке
    pub p: usize,
    /// Выборок на стороне хоста в одном блоке
    pub q: usize,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ResampleRatio {
    pub const UNITY: Self = Self { p: 1, q: 1 };

    pub fn for_interface(iface: InterfaceType) -> Self {
        match iface {
            InterfaceType::Normal | InterfaceType::Diversity => Self::UNITY,
            InterfaceType::Resamp64M => Self { p: 96, q: 65 },
            InterfaceType::Resamp100M => Self { p: 75, q: 52 },
            InterfaceType::Resamp30_72M => Self { p: 1152, q: 325 },
        }
    }

    pub fn is_unity(&self) -> bool {
        self.p == self.q
    }

    /// Частота устройства для частоты хоста `host_rate`.
    pub fn device_rate(
        &self,
        host_rate: f64,
    ) -> f64 {
        host_rate * self.p as f64 / self.q as f64
    }

    /// Размер блока на стороне хоста, выборок.
    pub fn host_block(&self) -> usize {
        self.q
    }

    /// Округляет размер порции вверх до целого числа блоков хоста.
    pub fn align_chunk(
        &self,
        n: usize,
    ) -> usize {
        let blocks = n.max(1).div_ceil(self.q);

        blocks * self.q
    }

    /// Число выборок устройства для `n` выборок хоста (кратно блоку).
    pub fn host_to_device(
        &self,
        n: usize,
    ) -> usize {
        n / self.q * self.p
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
