/// 64-битная виртуальная метка времени: число выборок с момента старта
/// устройства. Общая шкала для приёма и передачи.
pub type Timestamp = u64;

/// Символьная скорость GSM (символов в секунду): 1625 kHz / 6.
pub const GSM_RATE: f64 = 1_625_000.0 / 6.0;

/// Поддерживаемые значения выборок на символ.
pub const SUPPORTED_SPS: [usize; 2] = [1, 4];

/// Максимальное число физических каналов одного устройства.
pub const MAX_CHANNELS: usize = 8;

/// Частота дискретизации на стороне хоста для заданного `sps`.
pub fn host_sample_rate(sps: usize) -> f64 {
    GSM_RATE * sps as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_sample_rate() {
        assert!((host_sample_rate(1) - 270_833.333).abs() < 0.001);
        assert!((host_sample_rate(4) - 1_083_333.333).abs() < 0.001);
    }
}
