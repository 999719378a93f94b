use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Deserialize;

use crate::error::BackupError;

/// 起動時に受け取るイベント。
///
/// `start`, `end`はいずれもUTCのUnix時間とする。
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Event {
    pub start: i64,
    pub end: i64,
}

/// バックアップ対象の期間。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: i64,
    end: i64,
}

impl TimeWindow {
    /// 新しい`TimeWindow`を返す。
    ///
    /// `start`が`end`より後の場合はエラーを返す。
    pub fn new(start: i64, end: i64) -> Result<Self, BackupError> {
        if start > end {
            return Err(BackupError::InvalidWindow { start, end });
        }

        Ok(Self { start, end })
    }

    /// 指定時刻の前月1ヶ月分(UTC)を返す。
    ///
    /// 終了は当月1日00:00:00の1秒前とする。
    pub fn last_month(now: DateTime<Utc>) -> Result<Self> {
        let start_of_this_month = now
            .date_naive()
            .with_day(1)
            .context("Failed to set day")?
            .and_hms_opt(0, 0, 0)
            .context("Failed to set hour, minute, and second")?
            .and_utc();
        let end_of_last_month = start_of_this_month - Duration::seconds(1);
        let start_of_last_month = end_of_last_month
            .date_naive()
            .with_day(1)
            .context("Failed to set day")?
            .and_hms_opt(0, 0, 0)
            .context("Failed to set hour, minute, and second")?
            .and_utc();

        Ok(Self::new(
            start_of_last_month.timestamp(),
            end_of_last_month.timestamp(),
        )?)
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }
}

impl TryFrom<Event> for TimeWindow {
    type Error = BackupError;

    fn try_from(event: Event) -> Result<Self, Self::Error> {
        Self::new(event.start, event.end)
    }
}

/// JSON形式のイベントをパースする。
pub fn parse_event(s: &str) -> Result<TimeWindow> {
    let event: Event =
        serde_json::from_str(s).with_context(|| format!("Failed to parse event: {}", s))?;
    let window = TimeWindow::try_from(event).context("Event is not a valid time window")?;

    Ok(window)
}
