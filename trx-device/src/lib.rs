//! Радиоустройство с синхронизированным по меткам времени многоканальным
//! вводом/выводом выборок.
//!
//! [`make`] выбирает вариант устройства по конфигурации, [`RadioDevice`]
//! описывает контракт, [`SimulatedDevice`] - петлевая реализация для
//! разработки и тестов, [`LoopbackSession`] - диагностическая сессия.

pub mod config;
pub mod device;
pub mod metrics;
pub mod rt;
pub mod session;
pub mod sim;

pub use config::*;
pub use device::*;
pub use metrics::*;
pub use session::*;
pub use sim::SimulatedDevice;
