//! Контракт радиоустройства и выбор его реализации.
//!
//! Все операции принимают `&self` и синхронизируются внутри, поэтому одно
//! устройство можно разделить через `Arc` между циклом пакетов и потоком
//! управления.

use std::{sync::Arc, thread, time::Duration};

use trx_core::resolve_interface;
use trx_types::{
    ClockReference, DeviceConfig, InterfaceType, RadioResult, ReadResult, Timestamp, WindowType,
    WriteResult,
};

use crate::{metrics::DeviceMetrics, sim::SimulatedDevice, SimConfig};

/// Радиоустройство с синхронизированным по меткам времени вводом/выводом.
///
/// Жизненный цикл: `open()` один раз, затем `start()` / `stop()` сколько
/// угодно раз. Калибровка и метки времени доступны после `open()`.
pub trait RadioDevice: Send + Sync {
    /// Открывает устройство. `args` - `key=value` через запятую.
    ///
    /// `Busy` можно повторить, остальные ошибки фатальны.
    fn open(
        &self,
        args: &str,
        reference: ClockReference,
    ) -> RadioResult<InterfaceType>;

    /// Запускает потоки приёма и передачи.
    fn start(&self) -> RadioResult<()>;

    /// Останавливает потоки. Блокированные чтение и запись возвращаются.
    fn stop(&self) -> RadioResult<()>;

    fn window_type(&self) -> WindowType;

    fn interface_type(&self) -> InterfaceType;

    fn config(&self) -> &DeviceConfig;

    /// Читает до `len` выборок в каждый буфер логического канала.
    ///
    /// `timestamp = None` продолжает с ближайшей доступной выборки.
    fn read_samples(
        &self,
        bufs: &mut [&mut [i16]],
        len: usize,
        timestamp: Option<Timestamp>,
    ) -> RadioResult<ReadResult>;

    /// Передаёт `len` выборок каждого канала начиная с `timestamp`.
    ///
    /// Управляющие пакеты (`is_control`) не двигают курсор записи.
    fn write_samples(
        &self,
        bufs: &[&[i16]],
        len: usize,
        timestamp: Timestamp,
        is_control: bool,
    ) -> RadioResult<WriteResult>;

    /// Выравнивает TX относительно RX с якорем в `timestamp`.
    fn update_alignment(
        &self,
        timestamp: Timestamp,
    ) -> RadioResult<()>;

    fn set_tx_freq(
        &self,
        hz: f64,
        chan: usize,
    ) -> RadioResult<f64>;

    fn set_rx_freq(
        &self,
        hz: f64,
        chan: usize,
    ) -> RadioResult<f64>;

    fn tx_freq(
        &self,
        chan: usize,
    ) -> RadioResult<f64>;

    fn rx_freq(
        &self,
        chan: usize,
    ) -> RadioResult<f64>;

    fn set_tx_gain(
        &self,
        db: f64,
        chan: usize,
    ) -> RadioResult<f64>;

    fn set_rx_gain(
        &self,
        db: f64,
        chan: usize,
    ) -> RadioResult<f64>;

    fn tx_gain(
        &self,
        chan: usize,
    ) -> RadioResult<f64>;

    fn rx_gain(
        &self,
        chan: usize,
    ) -> RadioResult<f64>;

    fn min_tx_gain(&self) -> f64;

    fn max_tx_gain(&self) -> f64;

    fn min_rx_gain(&self) -> f64;

    fn max_rx_gain(&self) -> f64;

    fn initial_read_timestamp(&self) -> RadioResult<Timestamp>;

    fn initial_write_timestamp(&self) -> RadioResult<Timestamp>;

    /// Полная шкала приёма.
    fn full_scale_input_value(&self) -> f64;

    /// Полная шкала передачи.
    fn full_scale_output_value(&self) -> f64;

    /// Частота дискретизации на стороне хоста (Гц).
    fn sample_rate(&self) -> f64;

    /// Частота дискретизации оборудования (Гц).
    fn device_sample_rate(&self) -> f64;

    /// Выборок прочитано с момента `open()`.
    fn number_read(&self) -> u64;

    /// Выборок полезной нагрузки записано с момента `open()`.
    fn number_written(&self) -> u64;

    fn metrics(&self) -> Arc<DeviceMetrics>;
}

/// Создаёт устройство для конфигурации.
///
/// Неподдерживаемые комбинации отклоняются здесь, до `open()`.
pub fn make(
    config: &DeviceConfig,
    sim: &SimConfig,
) -> RadioResult<Box<dyn RadioDevice>> {
    sim.validate()?;

    let iface = resolve_interface(config, sim.master_clock)?;

    log::info!(
        "Creating simulated {iface} device: sps={}, chans={}, clock={}",
        config.sps,
        config.chans,
        sim.master_clock
    );

    Ok(Box::new(SimulatedDevice::new(
        config.clone(),
        sim.clone(),
        iface,
    )))
}

/// Открывает устройство, повторяя попытку при `Busy` до `attempts` раз.
pub fn open_with_retry(
    device: &dyn RadioDevice,
    args: &str,
    reference: ClockReference,
    attempts: u32,
    backoff: Duration,
) -> RadioResult<InterfaceType> {
    let mut attempt = 1;

    loop {
        match device.open(args, reference) {
            Err(e) if e.is_recoverable() && attempt < attempts => {
                log::warn!("Open attempt {attempt}/{attempts} failed: {e}. Retrying...");
                attempt += 1;
                thread::sleep(backoff);
            }
            result => return result,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
