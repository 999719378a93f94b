use serde::Serialize;

/// 1回分の再生履歴。
///
/// IDはMusicBrainz IDで、空文字列の場合がある。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlayRecord {
    pub date_timestamp: i64,
    pub date_readable: String,
    pub artist_id: String,
    pub artist_name: String,
    pub track_id: String,
    pub track_name: String,
    pub album_id: String,
    pub album_name: String,
}

impl PlayRecord {
    /// CSVに出力する列名。
    pub const FIELDNAMES: &'static [&'static str] = &[
        "date_timestamp",
        "date_readable",
        "artist_id",
        "artist_name",
        "track_id",
        "track_name",
        "album_id",
        "album_name",
    ];
}
