//! Приоритет реального времени для потоков ввода/вывода.

/// Переводит текущий поток в `SCHED_RR` с приоритетом по подсказке
/// `hint` (0.0..=1.0 от минимального до максимального).
///
/// Неудача (нет прав, другая платформа) только логируется. Возвращает
/// `true`, если приоритет применён.
pub fn promote_current_thread(hint: f32) -> bool {
    let hint = hint.clamp(0.0, 1.0);

    match set_round_robin(hint) {
        Ok(prio) => {
            log::info!("Thread promoted to SCHED_RR priority {prio}");
            true
        }
        Err(e) => {
            log::warn!("Failed to set real-time priority (hint {hint:.2}): {e}");
            false
        }
    }
}

#[cfg(target_os = "linux")]
fn set_round_robin(hint: f32) -> Result<i32, String> {
    use std::mem;

    let (min, max) = unsafe {
        (
            libc::sched_get_priority_min(libc::SCHED_RR),
            libc::sched_get_priority_max(libc::SCHED_RR),
        )
    };

    if min < 0 || max < min {
        return Err(format!(
            "SCHED_RR priority range unavailable: {}",
            std::io::Error::last_os_error()
        ));
    }

    let prio = min + ((max - min) as f32 * hint).round() as i32;

    unsafe {
        let mut param: libc::sched_param = mem::zeroed();
        param.sched_priority = prio;

        // pid 0 - вызывающий поток
        if libc::sched_setscheduler(0, libc::SCHED_RR, &param) != 0 {
            return Err(format!(
                "sched_setscheduler failed: {}",
                std::io::Error::last_os_error()
            ));
        }
    }

    Ok(prio)
}

#[cfg(not(target_os = "linux"))]
fn set_round_robin(_hint: f32) -> Result<i32, String> {
    Err("real-time scheduling is not supported on this platform".to_string())
}
