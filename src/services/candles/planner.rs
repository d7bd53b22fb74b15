//! Splits a time range into request windows the API accepts.

use super::resolution::Resolution;
use chrono::{DateTime, TimeDelta, Utc};

/// Half-open request window `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Lazy sequence of consecutive windows covering `[from, to)`.
///
/// Windows are contiguous, strictly increasing and never wider than
/// `limit × atomic unit`; the last one is clamped to `to`.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    cursor: DateTime<Utc>,
    end: DateTime<Utc>,
    step: TimeDelta,
}

pub fn plan(
    resolution: Resolution,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    api_limit_rows: u32,
) -> ChunkPlan {
    let rows = i32::try_from(api_limit_rows.max(1)).unwrap_or(i32::MAX);
    let step = resolution
        .atomic_unit()
        .checked_mul(rows)
        .unwrap_or(TimeDelta::MAX);

    ChunkPlan {
        cursor: from,
        end: to,
        step,
    }
}

impl Iterator for ChunkPlan {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.cursor >= self.end {
            return None;
        }

        let to = self
            .cursor
            .checked_add_signed(self.step)
            .map_or(self.end, |t| t.min(self.end));
        let chunk = Chunk {
            from: self.cursor,
            to,
        };
        self.cursor = to;
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_range_yields_nothing() {
        let t = utc(2024, 1, 1, 0);
        assert_eq!(plan(Resolution::Min1, t, t, 1440).count(), 0);
        assert_eq!(plan(Resolution::Min1, utc(2024, 1, 2, 0), t, 1440).count(), 0);
    }

    #[test]
    fn test_chunks_cover_range_exactly() {
        let from = utc(2024, 1, 1, 0);
        let to = utc(2024, 1, 3, 7);
        let chunks: Vec<Chunk> = plan(Resolution::Min5, from, to, 1440).collect();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].from, from);
        assert_eq!(chunks.last().unwrap().to, to);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].to, pair[1].from);
        }
        for chunk in &chunks {
            assert!(chunk.from < chunk.to);
            assert!(chunk.to - chunk.from <= TimeDelta::minutes(1440));
        }
    }

    #[test]
    fn test_hourly_limit_uses_hours() {
        let from = utc(2024, 1, 1, 0);
        let to = utc(2024, 1, 1, 10);
        let chunks: Vec<Chunk> = plan(Resolution::Hour4, from, to, 4).collect();

        assert_eq!(
            chunks,
            vec![
                Chunk { from, to: utc(2024, 1, 1, 4) },
                Chunk { from: utc(2024, 1, 1, 4), to: utc(2024, 1, 1, 8) },
                Chunk { from: utc(2024, 1, 1, 8), to },
            ]
        );
    }

    #[test]
    fn test_daily_range_fits_one_chunk() {
        let from = utc(2024, 1, 1, 0);
        let to = utc(2024, 1, 10, 0);
        let chunks: Vec<Chunk> = plan(Resolution::Day, from, to, 30).collect();

        assert_eq!(chunks, vec![Chunk { from, to }]);
    }

    #[test]
    fn test_zero_limit_still_terminates() {
        let from = utc(2024, 1, 1, 0);
        let to = utc(2024, 1, 1, 1);
        assert_eq!(plan(Resolution::Min1, from, to, 0).count(), 60);
    }

    #[test]
    fn test_plan_is_restartable() {
        let chunks = plan(Resolution::Day, utc(2023, 1, 1, 0), utc(2024, 1, 1, 0), 100);
        let first: Vec<Chunk> = chunks.clone().collect();
        let second: Vec<Chunk> = chunks.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }
}
