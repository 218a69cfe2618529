//! Выбор варианта радиоинтерфейса.

use trx_types::{DeviceConfig, InterfaceType, MasterClock, RadioError, RadioResult};

/// Определяет тип интерфейса для конфигурации и мастер-клока оборудования.
///
/// Разнесённый приём требует клока, кратного символьной скорости: объединение
/// пар и передискретизация вместе не поддерживаются.
pub fn resolve_interface(
    config: &DeviceConfig,
    clock: MasterClock,
) -> RadioResult<InterfaceType> {
    config.validate()?;

    if config.diversity {
        if clock != MasterClock::Native {
            return Err(RadioError::configuration(format!(
                "diversity is not supported with a {clock} master clock"
            )));
        }

        return Ok(InterfaceType::Diversity);
    }

    Ok(match clock {
        MasterClock::Native => InterfaceType::Normal,
        MasterClock::Mhz64 => InterfaceType::Resamp64M,
        MasterClock::Mhz100 => InterfaceType::Resamp100M,
        MasterClock::Mhz30_72 => InterfaceType::Resamp30_72M,
    })
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
