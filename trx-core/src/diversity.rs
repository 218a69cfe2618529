//! Объединение пары антенн разнесённого приёма.
//!
//! Ветви складываются с весами, пропорциональными их мощности на окне
//! чтения: `out = (P0*b0 + P1*b1) / (P0 + P1)`. Оценка RSSI берётся от
//! суммарной мощности, поэтому она не ниже любой из ветвей.

use crate::signal::{mean_power, power_dbfs, saturate_i16};

/// Итог объединения окна.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Combined {
    /// Мощность объединённого сигнала, dBFS
    pub rssi_dbfs: f32,
    /// Веса ветвей (в сумме 1)
    pub weights: (f64, f64),
}

/// Объединяет ветви `a` и `b` в `out`.
///
/// Обрабатывается общая длина всех трёх срезов. Если обе ветви молчат,
/// веса равные.
pub fn combine_pair(
    a: &[i16],
    b: &[i16],
    out: &mut [i16],
    full_scale: f64,
) -> Combined {
    let n = a.len().min(b.len()).min(out.len()) & !1;
    let (a, b) = (&a[..n], &b[..n]);

    let pa = mean_power(a);
    let pb = mean_power(b);
    let total = pa + pb;

    let weights = if total > 0.0 {
        (pa / total, pb / total)
    } else {
        (0.5, 0.5)
    };

    for ((o, &x), &y) in out[..n].iter_mut().zip(a).zip(b) {
        *o = saturate_i16(weights.0 * x as f64 + weights.1 * y as f64);
    }

    Combined {
        rssi_dbfs: power_dbfs(total, full_scale),
        weights,
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
