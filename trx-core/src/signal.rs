//! Вспомогательные функции для чередующихся I/Q выборок `i16`.

/// Нижняя граница оценки мощности (dBFS) для полностью пустого окна.
pub const MIN_DBFS: f32 = -150.0;

/// Средняя мощность |x|² на комплексную выборку.
pub fn mean_power(iq: &[i16]) -> f64 {
    let pairs = iq.len() / 2;

    if pairs == 0 {
        return 0.0;
    }

    let sum: f64 = iq
        .chunks_exact(2)
        .map(|p| {
            let i = p[0] as f64;
            let q = p[1] as f64;
            i * i + q * q
        })
        .sum();

    sum / pairs as f64
}

/// Мощность относительно полной шкалы, дБ.
pub fn power_dbfs(
    power: f64,
    full_scale: f64,
) -> f32 {
    if power <= 0.0 || full_scale <= 0.0 {
        return MIN_DBFS;
    }

    let db = 10.0 * (power / (full_scale * full_scale)).log10();

    (db as f32).max(MIN_DBFS)
}

/// Амплитудный коэффициент для значения в дБ.
pub fn db_to_amplitude(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Округление с насыщением в диапазон `i16`.
pub fn saturate_i16(v: f64) -> i16 {
    v.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}
