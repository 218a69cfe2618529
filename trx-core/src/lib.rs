//! Ядро контракта ввода/вывода радиовыборок trx
//!
//! Часы выборок, выравнивание TX относительно RX, RF калибровка, политика
//! окна передачи, буфер сборки приёма и объединение разнесённых антенн.
//! Модули не зависят от конкретного оборудования и используются
//! реализациями `RadioDevice`.
//!
//! # Быстрый старт
//!
//! ```
//! use trx_core::{resolve_interface, AlignmentEngine, AlignmentPlan, ClockModel};
//! use trx_types::{DeviceConfig, InterfaceType, MasterClock};
//!
//! let iface = resolve_interface(&DeviceConfig::new(4, 1), MasterClock::Native)?;
//! assert_eq!(iface, InterfaceType::Normal);
//!
//! let mut clock = ClockModel::new(0);
//! let mut engine = AlignmentEngine::new();
//! if let AlignmentPlan::Measure { .. } = engine.plan(4_000, &clock, 1_000, 2_000)? {
//!     engine.commit(4_000, 37, &mut clock);
//! }
//! assert_eq!(clock.tx_to_hw(4_000), 4_037);
//! # Ok::<(), trx_types::RadioError>(())
//! ```

pub mod alignment;
pub mod buffer;
pub mod calibration;
pub mod clock;
pub mod diversity;
pub mod resample;
pub mod signal;
pub mod variant;
pub mod window;

pub use alignment::*;
pub use buffer::*;
pub use calibration::*;
pub use clock::*;
pub use diversity::*;
pub use resample::*;
pub use signal::*;
pub use variant::*;
pub use window::*;

/// Версия библиотеки.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
