use anyhow::{Context, Result};
use log::info;

use crate::blob_store::BlobStore;
use crate::datetime;
use crate::lastfm::ScrobbleRepository;
use crate::play_record::PlayRecord;
use crate::sink::{object_key, RecordSink, UploadReceipt};
use crate::time_entry::TimeEntry;
use crate::toggl::TogglRepository;
use crate::window::TimeWindow;

/// 1回のバックアップ結果。
#[derive(Debug)]
pub struct BackupSummary {
    pub lastfm: UploadReceipt,
    pub toggl: UploadReceipt,
}

pub struct BackupCommand<'a, L: ScrobbleRepository, T: TogglRepository, B: BlobStore> {
    lastfm_client: &'a L,
    toggl_client: &'a T,
    sink: &'a RecordSink<B>,
    bucket_name: &'a str,
}

impl<'a, L: ScrobbleRepository, T: TogglRepository, B: BlobStore> BackupCommand<'a, L, T, B> {
    /// 新しい`BackupCommand`を返す。
    ///
    /// # Arguments
    /// * `lastfm_client` - 再生履歴を取得するリポジトリ
    /// * `toggl_client` - time entryを取得するリポジトリ
    /// * `sink` - レコードのアップロード先
    /// * `bucket_name` - アップロード先のバケット
    pub fn new(
        lastfm_client: &'a L,
        toggl_client: &'a T,
        sink: &'a RecordSink<B>,
        bucket_name: &'a str,
    ) -> Self {
        Self {
            lastfm_client,
            toggl_client,
            sink,
            bucket_name,
        }
    }

    /// 指定された期間のデータをバックアップする。
    ///
    /// Last.fm, Togglの順に取得とアップロードを行う。
    /// 途中で失敗した場合は、以降の処理を行わずにエラーを返す。
    pub async fn run(&self, window: TimeWindow) -> Result<BackupSummary> {
        info!(
            "backing up data for {} to {}",
            datetime::format_local(window.start()),
            datetime::format_local(window.end())
        );

        info!("starting last fm backup");
        let play_records = self
            .lastfm_client
            .read_play_records(window)
            .await
            .context("Failed to retrieve play records")?;
        let lastfm = self
            .sink
            .upload(
                &play_records,
                PlayRecord::FIELDNAMES,
                self.bucket_name,
                &object_key("lastfm", &window),
            )
            .await
            .context("Failed to upload play records")?;

        info!("starting toggl backup");
        let time_entries = self
            .toggl_client
            .read_time_entries(window)
            .await
            .context("Failed to retrieve time entries")?;
        let toggl = self
            .sink
            .upload(
                &time_entries,
                TimeEntry::FIELDNAMES,
                self.bucket_name,
                &object_key("toggl", &window),
            )
            .await
            .context("Failed to upload time entries")?;

        Ok(BackupSummary { lastfm, toggl })
    }
}
