use chrono::{DateTime, Local, TimeZone, Utc};

#[cfg(not(test))]
/// 現在のUTC時間を取得する。
pub fn now() -> DateTime<Utc> {
    Utc::now()
}


#[cfg(test)]
pub use mock_datetime::now;

/// Unix時間をLocalタイムゾーンの`YYYY-MM-DD HH:MM:SS`形式に変換する。
///
/// 表現できない時刻の場合はUnix時間をそのまま文字列にする。
pub fn format_local(unix_time: i64) -> String {
    Local
        .timestamp_opt(unix_time, 0)
        .single()
        .map(|datetime| datetime.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| unix_time.to_string())
}

/// Unix時間をUTCの`YYYY-MM-DD`形式の日付に変換する。
///
/// 日付未満の精度は切り捨てられる。
pub fn utc_date(unix_time: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(unix_time, 0)
        .map(|datetime| datetime.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Local, SecondsFormat, TimeZone, Utc};
    use rstest::rstest;

    use super::{format_local, mock_datetime, utc_date};

    /// 何も設定しない場合は、現在時間が取得できることを確認する。
    ///
    ///  - 現在時刻での比較を行なっているため、ミリ秒単位まで比較するとテストが失敗する可能性があり、秒単位で比較している。
    #[test]
    fn test_now() {
        assert_eq!(
            mock_datetime::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        );
    }

    /// モック時間を設定した時に、その時間が取得できることを確認する。
    #[test]
    fn test_now_specific_datetime() {
        let datetime = String::from("2024-01-01T00:00:00+00:00");
        mock_datetime::set_mock_time(
            DateTime::parse_from_rfc3339(datetime.as_str())
                .unwrap()
                .to_utc(),
        );

        assert_eq!(mock_datetime::now().to_rfc3339(), datetime);
        mock_datetime::clear_mock_time();
    }

    #[rstest]
    #[case::epoch(0, "1970-01-01")]
    #[case::end_of_day(86_399, "1970-01-01")]
    #[case::next_day(86_400, "1970-01-02")]
    #[case::leap_day(1_709_208_000, "2024-02-29")]
    fn test_utc_date(#[case] input: i64, #[case] expected: &str) {
        assert_eq!(utc_date(input).unwrap(), expected);
    }

    /// Localタイムゾーンで整形されることを確認する。
    #[test]
    fn test_format_local() {
        let local = Local.with_ymd_and_hms(2024, 3, 1, 12, 34, 56).unwrap();

        assert_eq!(format_local(local.timestamp()), "2024-03-01 12:34:56");
    }

    #[test]
    fn test_format_local_out_of_range() {
        assert_eq!(format_local(i64::MAX), i64::MAX.to_string());
    }
}
