//! Многоканальный буфер выборок с привязкой к метке времени.
//!
//! Хранит непрерывный участок потока `[start, start + len)` для всех каналов
//! сразу. Порции от оборудования добавляются по мере поступления, чтение
//! выполняется по окну меток времени. При переполнении вытесняются самые
//! старые выборки, при разрыве потока (потерянные порции) буфер начинается
//! заново с новой порции.

use std::collections::VecDeque;

use trx_types::Timestamp;

/// Многоканальный буфер чередующихся I/Q `i16`.
#[derive(Debug, Clone)]
pub struct TimestampedBuffer {
    chans: Vec<VecDeque<i16>>,
    start: Option<Timestamp>,
    capacity: usize,
}

/// Что произошло при добавлении порции.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOutcome {
    /// Разрыв перед порцией (выборок), ранее накопленное отброшено
    pub gap: u64,
    /// Вытеснено старых выборок из-за ёмкости
    pub evicted: u64,
    /// Пропущено выборок, уже присутствовавших в буфере
    pub stale: u64,
}

/// Участок, скопированный из буфера.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Метка времени первой скопированной выборки
    pub timestamp: Timestamp,
    /// Число скопированных выборок
    pub samples: usize,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl TimestampedBuffer {
    /// Буфер на `chans` каналов ёмкостью `capacity` выборок на канал.
    pub fn new(
        chans: usize,
        capacity: usize,
    ) -> Self {
        Self {
            chans: (0..chans.max(1))
                .map(|_| VecDeque::with_capacity(capacity * 2))
                .collect(),
            start: None,
            capacity: capacity.max(1),
        }
    }

    pub fn channels(&self) -> usize {
        self.chans.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Увеличивает ёмкость до `capacity` выборок, если она меньше.
    pub fn reserve(
        &mut self,
        capacity: usize,
    ) {
        if capacity > self.capacity {
            for buf in &mut self.chans {
                buf.reserve(2 * capacity - buf.len());
            }
            self.capacity = capacity;
        }
    }

    /// Число выборок на канал.
    pub fn len(&self) -> usize {
        self.chans[0].len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Метка времени самой старой выборки.
    pub fn start(&self) -> Option<Timestamp> {
        self.start.filter(|_| !self.is_empty())
    }

    /// Метка времени сразу после самой новой выборки.
    pub fn end(&self) -> Option<Timestamp> {
        self.start().map(|s| s + self.len() as Timestamp)
    }

    /// `true`, если окно `[ts, ts + len)` целиком в буфере.
    pub fn covers(
        &self,
        ts: Timestamp,
        len: usize,
    ) -> bool {
        match (self.start(), self.end()) {
            (Some(s), Some(e)) => ts >= s && ts.saturating_add(len as Timestamp) <= e,
            _ => false,
        }
    }

    /// Добавляет порцию с меткой `ts`; `data[ch]` - I/Q канала `ch`.
    pub fn push<S: AsRef<[i16]>>(
        &mut self,
        ts: Timestamp,
        data: &[S],
    ) -> PushOutcome {
        let mut outcome = PushOutcome::default();
        let n = data.first().map(|d| d.as_ref().len() / 2).unwrap_or(0);

        if n == 0 {
            return outcome;
        }

        let mut skip = 0usize;

        match self.end() {
            None => self.start = Some(ts),
            Some(end) if ts > end => {
                outcome.gap = ts - end;
                self.clear();
                self.start = Some(ts);
            }
            Some(end) if ts < end => {
                skip = ((end - ts) as usize).min(n);
                outcome.stale = skip as u64;
            }
            Some(_) => {}
        }

        if skip == n {
            return outcome;
        }

        for (buf, src) in self.chans.iter_mut().zip(data) {
            buf.extend(&src.as_ref()[2 * skip..2 * n]);
        }

        let len = self.len();

        if len > self.capacity {
            let excess = len - self.capacity;
            for buf in &mut self.chans {
                buf.drain(..2 * excess);
            }
            self.start = self.start.map(|s| s + excess as Timestamp);
            outcome.evicted = excess as u64;
        }

        outcome
    }

    /// Копирует пересечение окна `[ts, ts + len)` с буфером в начало `out`.
    ///
    /// Если окно начинается раньше буфера, копируется только хвост, а
    /// `Span::timestamp` указывает на его начало. Если пересечения нет,
    /// возвращается пустой участок с меткой `ts`.
    pub fn copy_out<O: AsMut<[i16]>>(
        &self,
        ts: Timestamp,
        len: usize,
        out: &mut [O],
    ) -> Span {
        let (start, end) = match (self.start(), self.end()) {
            (Some(s), Some(e)) => (s, e),
            _ => {
                return Span {
                    timestamp: ts,
                    samples: 0,
                }
            }
        };

        let from = ts.max(start);
        let to = ts.saturating_add(len as Timestamp).min(end);

        if from >= to {
            return Span {
                timestamp: ts,
                samples: 0,
            };
        }

        let offset = (from - start) as usize;
        let count = (to - from) as usize;

        for (buf, dst) in self.chans.iter().zip(out.iter_mut()) {
            let dst = dst.as_mut();
            for (d, s) in dst[..2 * count]
                .iter_mut()
                .zip(buf.range(2 * offset..2 * (offset + count)))
            {
                *d = *s;
            }
        }

        Span {
            timestamp: from,
            samples: count,
        }
    }

    /// Отбрасывает выборки с меткой меньше `ts`.
    pub fn discard_before(
        &mut self,
        ts: Timestamp,
    ) {
        let (start, end) = match (self.start(), self.end()) {
            (Some(s), Some(e)) => (s, e),
            _ => return,
        };

        if ts <= start {
            return;
        }

        if ts >= end {
            self.clear();
            return;
        }

        let drop = (ts - start) as usize;
        for buf in &mut self.chans {
            buf.drain(..2 * drop);
        }
        self.start = Some(ts);
    }

    pub fn clear(&mut self) {
        for buf in &mut self.chans {
            buf.clear();
        }
        self.start = None;
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    /// Порция, где I каждой выборки равен её метке времени (по модулю).
    fn ramp(
        ts: Timestamp,
        n: usize,
        chans: usize,
    ) -> Vec<Vec<i16>> {
        (0..chans)
            .map(|ch| {
                (0..n)
                    .flat_map(|i| [((ts as usize + i) % 30_000) as i16, ch as i16])
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_push_and_copy() {
        let mut buf = TimestampedBuffer::new(2, 1_000);
        assert_eq!(buf.push(100, &ramp(100, 50, 2)), PushOutcome::default());
        assert_eq!(buf.start(), Some(100));
        assert_eq!(buf.end(), Some(150));
        assert!(buf.covers(110, 40));
        assert!(!buf.covers(110, 41));

        let mut out = vec![vec![0i16; 20]; 2];
        let span = buf.copy_out(110, 10, &mut out);
        assert_eq!(
            span,
            Span {
                timestamp: 110,
                samples: 10
            }
        );
        assert_eq!(out[0][0], 110);
        assert_eq!(out[1][1], 1);
        assert_eq!(out[0][18], 119);
    }

    #[test]
    fn test_copy_tail_when_window_starts_early() {
        let mut buf = TimestampedBuffer::new(1, 1_000);
        buf.push(100, &ramp(100, 50, 1));

        let mut out = vec![vec![0i16; 40]];
        let span = buf.copy_out(90, 20, &mut out);
        assert_eq!(span.timestamp, 100);
        assert_eq!(span.samples, 10);
        assert_eq!(out[0][0], 100);
    }

    #[test]
    fn test_copy_disjoint_window() {
        let mut buf = TimestampedBuffer::new(1, 1_000);
        let mut out = vec![vec![0i16; 20]];
        assert_eq!(buf.copy_out(0, 10, &mut out).samples, 0);

        buf.push(100, &ramp(100, 50, 1));
        let before = buf.copy_out(0, 10, &mut out);
        assert_eq!(before.samples, 0);
        assert_eq!(before.timestamp, 0);
        assert_eq!(buf.copy_out(200, 10, &mut out).samples, 0);
    }

    #[test]
    fn test_gap_restarts_buffer() {
        let mut buf = TimestampedBuffer::new(1, 1_000);
        buf.push(0, &ramp(0, 100, 1));
        let outcome = buf.push(250, &ramp(250, 100, 1));
        assert_eq!(outcome.gap, 150);
        assert_eq!(buf.start(), Some(250));
        assert_eq!(buf.len(), 100);
    }

    #[test]
    fn test_overlap_is_skipped() {
        let mut buf = TimestampedBuffer::new(1, 1_000);
        buf.push(0, &ramp(0, 100, 1));
        let outcome = buf.push(80, &ramp(80, 40, 1));
        assert_eq!(outcome.stale, 20);
        assert_eq!(buf.end(), Some(120));

        let outcome = buf.push(10, &ramp(10, 10, 1));
        assert_eq!(outcome.stale, 10);
        assert_eq!(buf.end(), Some(120));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut buf = TimestampedBuffer::new(1, 100);
        buf.push(0, &ramp(0, 80, 1));
        let outcome = buf.push(80, &ramp(80, 80, 1));
        assert_eq!(outcome.evicted, 60);
        assert_eq!(buf.start(), Some(60));
        assert_eq!(buf.end(), Some(160));

        let mut out = vec![vec![0i16; 2]];
        buf.copy_out(60, 1, &mut out);
        assert_eq!(out[0][0], 60);
    }

    #[test]
    fn test_reserve_keeps_long_window() {
        let mut buf = TimestampedBuffer::new(1, 100);
        buf.reserve(300);
        assert_eq!(buf.capacity(), 300);

        for i in 0..3u64 {
            let outcome = buf.push(i * 100, &ramp(i * 100, 100, 1));
            assert_eq!(outcome.evicted, 0);
        }
        assert!(buf.covers(0, 300));

        // уменьшать ёмкость нельзя
        buf.reserve(50);
        assert_eq!(buf.capacity(), 300);
    }

    #[test]
    fn test_window_near_end_of_clock() {
        let mut buf = TimestampedBuffer::new(1, 100);
        buf.push(100, &ramp(100, 50, 1));
        assert!(!buf.covers(u64::MAX - 5, 10));

        let mut out = vec![vec![0i16; 20]];
        assert_eq!(buf.copy_out(u64::MAX - 5, 10, &mut out).samples, 0);
    }

    #[test]
    fn test_discard_before() {
        let mut buf = TimestampedBuffer::new(1, 1_000);
        buf.push(0, &ramp(0, 100, 1));
        buf.discard_before(30);
        assert_eq!(buf.start(), Some(30));
        assert_eq!(buf.len(), 70);

        buf.discard_before(10);
        assert_eq!(buf.start(), Some(30));

        buf.discard_before(500);
        assert!(buf.is_empty());
        assert_eq!(buf.start(), None);
    }

    proptest! {
        /// Какие бы порции ни приходили, буфер остаётся непрерывным,
        /// не превышает ёмкость и хранит верные данные.
        #[test]
        fn prop_buffer_contents_match_timestamps(
            chunks in prop::collection::vec((0u64..400, 1usize..120), 1..40)
        ) {
            let mut buf = TimestampedBuffer::new(1, 256);
            let mut ts = 0u64;

            for (advance, n) in chunks {
                ts += advance;
                buf.push(ts, &ramp(ts, n, 1));
                prop_assert!(buf.len() <= buf.capacity());

                if let (Some(s), Some(e)) = (buf.start(), buf.end()) {
                    prop_assert_eq!(e - s, buf.len() as u64);
                    let mut out = vec![vec![0i16; 2]];
                    let span = buf.copy_out(s, 1, &mut out);
                    prop_assert_eq!(span.samples, 1);
                    prop_assert_eq!(out[0][0], (s % 30_000) as i16);
                }
            }
        }
    }
}
