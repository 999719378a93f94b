use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

fn default_max_pages() -> u32 {
    1000
}

/// バックアップ処理の設定。
///
/// # Examples
///
/// ```json
/// {
///     "bucket_name": "personal-data-backup",
///     "workspace_id": 1234567,
///     "username": "someone",
///     "secret_id": "personal-backup-keys",
///     "region": "us-east-1"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackupConfig {
    /// アップロード先のバケット
    pub bucket_name: String,
    /// Togglのworkspace ID
    pub workspace_id: i64,
    /// Last.fmのユーザー名
    pub username: String,
    /// APIキーを格納したシークレットの名前
    pub secret_id: String,
    /// AWSのリージョン。未指定の場合は環境の設定に従う
    #[serde(default)]
    pub region: Option<String>,
    /// Last.fmから取得するページ数の上限
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

impl BackupConfig {
    /// JSON文字列から設定を読み込む。
    pub fn from_json(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s).context("Failed to parse config")?;
        config.validate()?;

        Ok(config)
    }

    /// ファイルから設定を読み込む。
    ///
    /// `path`が指定されていない場合は、ユーザーの設定ディレクトリにある
    /// `personal-data-backup/config.json`を利用する。
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_path()?,
        };
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        Self::from_json(&data).with_context(|| format!("Invalid config: {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.bucket_name.is_empty(), "bucket_name must not be empty");
        ensure!(!self.username.is_empty(), "username must not be empty");
        ensure!(!self.secret_id.is_empty(), "secret_id must not be empty");
        ensure!(self.max_pages >= 1, "max_pages must be at least 1");

        Ok(())
    }
}

fn default_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().context("Could not find config directory")?;
    path.push("personal-data-backup");
    path.push("config.json");

    Ok(path)
}
