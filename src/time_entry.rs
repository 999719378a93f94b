use serde::Serialize;

/// Togglのtime entry。
///
/// 計測中のtime entryは`stop`が`None`で、`duration`が負の値になる。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimeEntry {
    pub id: i64,
    pub description: String,
    pub duration: i64,
    pub start: String,
    pub stop: Option<String>,
    pub project_id: Option<i64>,
    pub project_name: String,
    pub tag_ids: Vec<i64>,
    pub tags: Vec<String>,
}

impl TimeEntry {
    /// CSVに出力する列名。
    pub const FIELDNAMES: &'static [&'static str] = &[
        "id",
        "description",
        "duration",
        "start",
        "stop",
        "project_id",
        "project_name",
        "tag_ids",
        "tags",
    ];
}
