use async_trait::async_trait;
use log::{debug, info};
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::BackupError;
use crate::play_record::PlayRecord;
use crate::secrets::{ApiKeyName, SecretProvider};
use crate::window::TimeWindow;

const SERVICE: &str = "Last.fm";

/// 1ページあたりの取得件数。APIの上限値。
const PAGE_LIMIT: u32 = 200;

const USER_AGENT: &str = concat!("personal-data-backup/", env!("CARGO_PKG_VERSION"));

/// 再生履歴を取得するためのtrait。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ScrobbleRepository: Send + Sync {
    /// 指定された期間の再生履歴を取得する。
    async fn read_play_records(&self, window: TimeWindow)
        -> Result<Vec<PlayRecord>, BackupError>;
}

/// `user.getrecenttracks`のレスポンス。
///
/// エラー時もHTTP 200で`error`, `message`を含むJSONが返ることがある。
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecentTracksResponse {
    Error { error: i64, message: String },
    Page { recenttracks: RecentTracks },
}

#[derive(Debug, Deserialize)]
struct RecentTracks {
    track: Vec<Value>,
}

/// Last.fm APIの再生履歴をデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct LastFmTrack {
    date: LastFmDate,
    artist: LastFmNamed,
    mbid: String,
    name: String,
    album: LastFmNamed,
}

#[derive(Debug, Deserialize)]
struct LastFmDate {
    uts: String,
    #[serde(rename = "#text")]
    text: String,
}

/// `artist`, `album`のようにMBIDと名前を持つ要素。
#[derive(Debug, Deserialize)]
struct LastFmNamed {
    mbid: String,
    #[serde(rename = "#text")]
    text: String,
}

/// Last.fm APIと通信するためのクライアント。
pub struct LastFmClient<P: SecretProvider> {
    client: Client,
    api_url: String,
    secrets: P,
    username: String,
    max_pages: u32,
}

impl<P: SecretProvider> LastFmClient<P> {
    /// 新しい`LastFmClient`を返す。
    ///
    /// # Arguments
    ///
    /// * `secrets` - APIキーを取得するためのプロバイダ
    /// * `username` - 再生履歴を取得するユーザー
    /// * `max_pages` - 取得するページ数の上限
    pub fn new(
        secrets: P,
        username: impl Into<String>,
        max_pages: u32,
    ) -> Result<Self, BackupError> {
        Self::with_base_url(
            secrets,
            username,
            max_pages,
            "http://ws.audioscrobbler.com/2.0/",
        )
    }

    fn with_base_url(
        secrets: P,
        username: impl Into<String>,
        max_pages: u32,
        api_url: impl Into<String>,
    ) -> Result<Self, BackupError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| BackupError::remote(SERVICE, err))?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            secrets,
            username: username.into(),
            max_pages,
        })
    }

    /// 1ページ分の再生履歴を取得する。
    async fn read_page(
        &self,
        api_key: &str,
        window: &TimeWindow,
        page: u32,
    ) -> Result<Vec<Value>, BackupError> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("method", "user.getrecenttracks"),
                ("api_key", api_key),
                ("format", "json"),
                ("user", self.username.as_str()),
            ])
            .query(&[("from", window.start()), ("to", window.end())])
            .query(&[("page", page), ("limit", PAGE_LIMIT)])
            .send()
            .await
            .map_err(|err| {
                BackupError::remote(SERVICE, format!("failed to send request: {}", err))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackupError::remote(
                SERVICE,
                format!("page {} returned HTTP {}", page, status),
            ));
        }

        let body = response.json::<RecentTracksResponse>().await.map_err(|err| {
            BackupError::remote(SERVICE, format!("failed to deserialize page {}: {}", page, err))
        })?;
        match body {
            RecentTracksResponse::Error { error, message } => Err(BackupError::remote(
                SERVICE,
                format!("error {}: {}", error, message),
            )),
            RecentTracksResponse::Page { recenttracks } => Ok(recenttracks.track),
        }
    }
}

#[async_trait]
impl<P: SecretProvider> ScrobbleRepository for LastFmClient<P> {
    /// 空のページが返るまでページを進めて再生履歴を取得する。
    ///
    /// `max_pages`を超えてもページが続く場合はエラーを返す。
    async fn read_play_records(
        &self,
        window: TimeWindow,
    ) -> Result<Vec<PlayRecord>, BackupError> {
        let api_key = self.secrets.get_api_key(ApiKeyName::LastFm).await?;

        let mut play_records = Vec::new();
        for page in 1.. {
            if page > self.max_pages {
                return Err(BackupError::MaxPagesExceeded(self.max_pages));
            }

            let tracks = self.read_page(&api_key, &window, page).await?;
            // 再生中のトラックだけのページも空ではないので、次のページに進む。
            if tracks.is_empty() {
                break;
            }
            debug!("page {}: {} tracks", page, tracks.len());

            for track in &tracks {
                if is_now_playing(track) {
                    debug!("Skipping now playing track");
                    continue;
                }
                play_records.push(parse_track(track)?);
            }
        }
        info!("length of play records: {}", play_records.len());

        Ok(play_records)
    }
}

/// 再生中のトラックかを判定する。再生中のトラックは`date`を持たない。
fn is_now_playing(track: &Value) -> bool {
    track
        .get("@attr")
        .and_then(|attr| attr.get("nowplaying"))
        .and_then(Value::as_str)
        == Some("true")
}

/// APIのトラック情報を`PlayRecord`に変換する。
pub fn parse_track(track: &Value) -> Result<PlayRecord, BackupError> {
    let track = LastFmTrack::deserialize(track)
        .map_err(|err| BackupError::MalformedRecord(format!("track: {}", err)))?;
    let date_timestamp = track.date.uts.parse::<i64>().map_err(|err| {
        BackupError::MalformedRecord(format!("date.uts {:?}: {}", track.date.uts, err))
    })?;

    Ok(PlayRecord {
        date_timestamp,
        date_readable: track.date.text,
        artist_id: track.artist.mbid,
        artist_name: track.artist.text,
        track_id: track.mbid,
        track_name: track.name,
        album_id: track.album.mbid,
        album_name: track.album.text,
    })
}
