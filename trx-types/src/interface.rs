use serde::{Deserialize, Serialize};

/// Политика окна передачи (буферизация и задержка транспорта).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    /// Непрерывный поток в стиле USRP1: устройство само буферизует TX.
    Usrp1,
    /// Фиксированное окно: вызывающий заранее подаёт ограниченное окно
    /// будущих выборок.
    Fixed,
}

/// Тип радиоинтерфейса, выбирается один раз при создании устройства.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceType {
    /// Без передискретизации.
    Normal,
    /// Передискретизация под мастер-клок 64 МГц.
    Resamp64M,
    /// Передискретизация под мастер-клок 100 МГц.
    Resamp100M,
    /// Передискретизация под мастер-клок 30.72 МГц.
    Resamp30_72M,
    /// Разнесённый приём: пары антенн объединяются в один логический канал.
    Diversity,
}

/// Семейство мастер-клока оборудования.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasterClock {
    /// Клок кратен символьной скорости GSM, передискретизация не нужна.
    #[default]
    Native,
    Mhz64,
    Mhz100,
    Mhz30_72,
}

/// Источник опорной частоты.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockReference {
    #[default]
    Internal,
    External,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl InterfaceType {
    /// `true` для вариантов с передискретизацией.
    pub fn is_resampling(&self) -> bool {
        matches!(
            self,
            InterfaceType::Resamp64M | InterfaceType::Resamp100M | InterfaceType::Resamp30_72M
        )
    }
}

impl MasterClock {
    /// Частота мастер-клока в Гц (`None` для `Native`).
    pub fn rate_hz(&self) -> Option<f64> {
        match self {
            MasterClock::Native => None,
            MasterClock::Mhz64 => Some(64e6),
            MasterClock::Mhz100 => Some(100e6),
            MasterClock::Mhz30_72 => Some(30.72e6),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl std::fmt::Display for WindowType {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            WindowType::Usrp1 => write!(f, "usrp1"),
            WindowType::Fixed => write!(f, "fixed"),
        }
    }
}

impl std::str::FromStr for WindowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "usrp1" | "stream" | "streaming" => Ok(WindowType::Usrp1),
            "fixed" => Ok(WindowType::Fixed),
            _ => Err(format!("Unknown window type: '{s}'. Use: usrp1, fixed")),
        }
    }
}

impl std::fmt::Display for InterfaceType {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            InterfaceType::Normal => write!(f, "normal"),
            InterfaceType::Resamp64M => write!(f, "resamp-64m"),
            InterfaceType::Resamp100M => write!(f, "resamp-100m"),
            InterfaceType::Resamp30_72M => write!(f, "resamp-30.72m"),
            InterfaceType::Diversity => write!(f, "diversity"),
        }
    }
}

impl std::fmt::Display for MasterClock {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            MasterClock::Native => write!(f, "native"),
            MasterClock::Mhz64 => write!(f, "64M"),
            MasterClock::Mhz100 => write!(f, "100M"),
            MasterClock::Mhz30_72 => write!(f, "30.72M"),
        }
    }
}

impl std::str::FromStr for MasterClock {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();

        match lower.trim_end_matches("hz") {
            "native" | "gsm" => Ok(MasterClock::Native),
            "64m" | "64" => Ok(MasterClock::Mhz64),
            "100m" | "100" => Ok(MasterClock::Mhz100),
            "30.72m" | "30.72" => Ok(MasterClock::Mhz30_72),
            _ => Err(format!(
                "Unknown master clock: '{s}'. Use: native, 64M, 100M, 30.72M"
            )),
        }
    }
}

impl std::fmt::Display for ClockReference {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            ClockReference::Internal => write!(f, "internal"),
            ClockReference::External => write!(f, "external"),
        }
    }
}

impl std::str::FromStr for ClockReference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "internal" | "int" => Ok(ClockReference::Internal),
            "external" | "ext" | "extref" => Ok(ClockReference::External),
            _ => Err(format!(
                "Unknown clock reference: '{s}'. Use: internal, external"
            )),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
