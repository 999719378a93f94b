use std::collections::HashMap;

use async_trait::async_trait;
use log::info;
#[cfg(test)]
use mockall::automock;
use reqwest::{header::CONTENT_TYPE, Client};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::datetime;
use crate::error::BackupError;
use crate::secrets::{ApiKeyName, SecretProvider};
use crate::time_entry::TimeEntry;
use crate::window::TimeWindow;

const SERVICE: &str = "Toggl";

const USER_AGENT: &str = concat!("personal-data-backup/", env!("CARGO_PKG_VERSION"));

/// time entryを取得するためのtrait。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TogglRepository: Send + Sync {
    /// 指定された期間のtime entryを取得する。
    async fn read_time_entries(&self, window: TimeWindow) -> Result<Vec<TimeEntry>, BackupError>;
}

/// Toggl APIのレスポンスをデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct TogglTimeEntry {
    id: i64,
    description: Option<String>,
    duration: i64,
    start: String,
    stop: Option<String>,
    project_id: Option<i64>,
    tag_ids: Option<Vec<i64>>,
    tags: Option<Vec<String>>,
}

/// Toggl APIのプロジェクト情報をデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct TogglProject {
    id: i64,
    name: String,
}

/// Toggl APIと通信するためのクライアント。
///
/// # Examples
///
/// ```
/// let client = TogglClient::new(secrets, workspace_id).unwrap();
/// let time_entries = client.read_time_entries(window).await.unwrap();
/// ```
pub struct TogglClient<P: SecretProvider> {
    client: Client,
    api_url: String,
    secrets: P,
    workspace_id: i64,
}

impl<P: SecretProvider> TogglClient<P> {
    /// 新しい`TogglClient`を返す。
    ///
    /// # Arguments
    ///
    /// * `secrets` - APIキーを取得するためのプロバイダ
    /// * `workspace_id` - プロジェクトを取得するworkspace
    pub fn new(secrets: P, workspace_id: i64) -> Result<Self, BackupError> {
        Self::with_base_url(secrets, workspace_id, "https://api.track.toggl.com/api/v9")
    }

    fn with_base_url(
        secrets: P,
        workspace_id: i64,
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
            workspace_id,
        })
    }

    /// workspaceのプロジェクトを取得し、IDから名前への対応表を返す。
    pub async fn read_projects(
        &self,
        api_token: &str,
    ) -> Result<HashMap<i64, String>, BackupError> {
        let url = format!("{}/workspaces/{}/projects", self.api_url, self.workspace_id);
        let projects: Vec<TogglProject> = self.get_json(&url, api_token, &[]).await?;

        Ok(projects
            .into_iter()
            .map(|project| (project.id, project.name))
            .collect())
    }

    /// GETリクエストを送り、レスポンスをデシリアライズする。
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        api_token: &str,
        query: &[(&str, String)],
    ) -> Result<T, BackupError> {
        let response = self
            .client
            .get(url)
            .basic_auth(api_token, Some("api_token"))
            .header(CONTENT_TYPE, "application/json")
            .query(query)
            .send()
            .await
            .map_err(|err| {
                BackupError::remote(SERVICE, format!("failed to send request to {}: {}", url, err))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackupError::remote(
                SERVICE,
                format!("{} returned HTTP {}", url, status),
            ));
        }

        response.json::<T>().await.map_err(|err| {
            BackupError::remote(SERVICE, format!("failed to deserialize response: {}", err))
        })
    }
}

#[async_trait]
impl<P: SecretProvider> TogglRepository for TogglClient<P> {
    /// プロジェクト一覧を取得した上で、期間内のtime entryを取得する。
    ///
    /// 期間はUTCの日付に丸めて指定する。
    async fn read_time_entries(&self, window: TimeWindow) -> Result<Vec<TimeEntry>, BackupError> {
        let api_token = self.secrets.get_api_key(ApiKeyName::Toggl).await?;

        let projects = self.read_projects(&api_token).await?;
        info!("length of projects: {}", projects.len());

        let out_of_range = || BackupError::InvalidWindow {
            start: window.start(),
            end: window.end(),
        };
        let start_date = datetime::utc_date(window.start()).ok_or_else(out_of_range)?;
        let end_date = datetime::utc_date(window.end()).ok_or_else(out_of_range)?;
        let url = format!("{}/me/time_entries", self.api_url);
        let raw_entries: Vec<Value> = self
            .get_json(
                &url,
                &api_token,
                &[("start_date", start_date), ("end_date", end_date)],
            )
            .await?;
        info!("length of time entries: {}", raw_entries.len());

        raw_entries
            .iter()
            .map(|entry| parse_time_entry(entry, &projects))
            .collect()
    }
}

/// APIのtime entryを`TimeEntry`に変換する。
///
/// プロジェクトが設定されていない場合、プロジェクト名は空文字列とする。
/// 対応表にないプロジェクトを参照している場合はエラーを返す。
pub fn parse_time_entry(
    entry: &Value,
    projects: &HashMap<i64, String>,
) -> Result<TimeEntry, BackupError> {
    let entry = TogglTimeEntry::deserialize(entry)
        .map_err(|err| BackupError::MalformedRecord(format!("time entry: {}", err)))?;
    let project_name = match entry.project_id {
        Some(project_id) => projects.get(&project_id).cloned().ok_or(
            BackupError::UnknownProjectReference {
                entry_id: entry.id,
                project_id,
            },
        )?,
        None => String::new(),
    };

    Ok(TimeEntry {
        id: entry.id,
        description: entry.description.unwrap_or_default(),
        duration: entry.duration,
        start: entry.start,
        stop: entry.stop,
        project_id: entry.project_id,
        project_name,
        tag_ids: entry.tag_ids.unwrap_or_default(),
        tags: entry.tags.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use mockall::predicate::eq;
    use mockito::{Matcher, Server, ServerGuard};
    use rstest::rstest;
    use serde_json::{json, Value};

    use super::{parse_time_entry, TogglClient, TogglRepository, USER_AGENT};
    use crate::error::BackupError;
    use crate::secrets::{ApiKeyName, MockSecretProvider};
    use crate::time_entry::TimeEntry;
    use crate::window::TimeWindow;

    fn projects() -> HashMap<i64, String> {
        HashMap::from([(1, "Work".to_string())])
    }

    fn raw_entry(id: i64, project_id: Value) -> Value {
        json!({
            "id": id,
            "workspace_id": 42,
            "description": "writing",
            "duration": 3600,
            "start": "2024-01-01T09:00:00+00:00",
            "stop": "2024-01-01T10:00:00+00:00",
            "project_id": project_id,
            "tag_ids": [10, 11],
            "tags": ["deep", "focus"],
        })
    }

    fn authorization() -> String {
        format!("Basic {}", STANDARD.encode("toggl-key:api_token"))
    }

    fn client(server: &ServerGuard) -> TogglClient<MockSecretProvider> {
        let mut secrets = MockSecretProvider::new();
        secrets
            .expect_get_api_key()
            .with(eq(ApiKeyName::Toggl))
            .times(1)
            .returning(|_| Ok("toggl-key".to_string()));
        TogglClient::with_base_url(secrets, 42, server.url()).unwrap()
    }

    #[test]
    fn test_parse_time_entry() {
        let entry = parse_time_entry(&raw_entry(7, json!(1)), &projects()).unwrap();

        assert_eq!(
            entry,
            TimeEntry {
                id: 7,
                description: "writing".to_string(),
                duration: 3600,
                start: "2024-01-01T09:00:00+00:00".to_string(),
                stop: Some("2024-01-01T10:00:00+00:00".to_string()),
                project_id: Some(1),
                project_name: "Work".to_string(),
                tag_ids: vec![10, 11],
                tags: vec!["deep".to_string(), "focus".to_string()],
            }
        );
    }

    #[test]
    fn test_parse_time_entry_unknown_project() {
        let result = parse_time_entry(&raw_entry(7, json!(2)), &projects());

        assert!(matches!(
            result,
            Err(BackupError::UnknownProjectReference {
                entry_id: 7,
                project_id: 2
            })
        ));
    }

    #[test]
    fn test_parse_time_entry_without_project() {
        let entry = parse_time_entry(&raw_entry(7, Value::Null), &projects()).unwrap();

        assert_eq!(entry.project_id, None);
        assert_eq!(entry.project_name, "");
    }

    /// 計測中のtime entryはそのまま保持することを確認する。
    #[test]
    fn test_parse_time_entry_running() {
        let mut raw = raw_entry(7, json!(1));
        raw["stop"] = Value::Null;
        raw["duration"] = json!(-1704099600);
        raw["description"] = Value::Null;
        raw["tags"] = Value::Null;

        let entry = parse_time_entry(&raw, &projects()).unwrap();

        assert_eq!(entry.stop, None);
        assert_eq!(entry.duration, -1704099600);
        assert_eq!(entry.description, "");
        assert!(entry.tags.is_empty());
    }

    #[rstest]
    #[case::missing_id("id")]
    #[case::missing_duration("duration")]
    #[case::missing_start("start")]
    fn test_parse_time_entry_missing_field(#[case] field: &str) {
        let mut raw = raw_entry(7, json!(1));
        raw.as_object_mut().unwrap().remove(field);

        assert!(matches!(
            parse_time_entry(&raw, &projects()),
            Err(BackupError::MalformedRecord(_))
        ));
    }

    /// プロジェクト一覧とtime entryを取得し、プロジェクト名を解決することを確認する。
    #[tokio::test]
    async fn test_read_time_entries() {
        let mut server = Server::new_async().await;
        let projects_mock = server
            .mock("GET", "/workspaces/42/projects")
            .match_header("authorization", authorization().as_str())
            .match_header("user-agent", USER_AGENT)
            .with_status(200)
            .with_body(json!([{"id": 1, "name": "Work", "active": true}]).to_string())
            .expect(1)
            .create_async()
            .await;
        let entries_mock = server
            .mock("GET", "/me/time_entries")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("start_date".into(), "1970-01-01".into()),
                Matcher::UrlEncoded("end_date".into(), "1970-01-02".into()),
            ]))
            .match_header("authorization", authorization().as_str())
            .with_status(200)
            .with_body(json!([raw_entry(7, json!(1)), raw_entry(8, Value::Null)]).to_string())
            .expect(1)
            .create_async()
            .await;

        let window = TimeWindow::new(1000, 90_000).unwrap();
        let entries = client(&server).read_time_entries(window).await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].project_name, "Work");
        assert_eq!(entries[1].project_name, "");
        projects_mock.assert_async().await;
        entries_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_read_time_entries_unknown_project() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/workspaces/42/projects")
            .with_status(200)
            .with_body(json!([{"id": 1, "name": "Work"}]).to_string())
            .create_async()
            .await;
        server
            .mock("GET", "/me/time_entries")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!([raw_entry(7, json!(2))]).to_string())
            .create_async()
            .await;

        let window = TimeWindow::new(1000, 2000).unwrap();
        let result = client(&server).read_time_entries(window).await;

        assert!(matches!(
            result,
            Err(BackupError::UnknownProjectReference { .. })
        ));
    }

    /// プロジェクトの取得に失敗した場合、time entryは取得しないことを確認する。
    #[tokio::test]
    async fn test_read_time_entries_projects_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/workspaces/42/projects")
            .with_status(403)
            .create_async()
            .await;
        let entries_mock = server
            .mock("GET", "/me/time_entries")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let window = TimeWindow::new(1000, 2000).unwrap();
        let result = client(&server).read_time_entries(window).await;

        assert!(matches!(result, Err(BackupError::RemoteApi { .. })));
        entries_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_read_time_entries_invalid_json() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/workspaces/42/projects")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        server
            .mock("GET", "/me/time_entries")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let window = TimeWindow::new(1000, 2000).unwrap();
        let result = client(&server).read_time_entries(window).await;

        assert!(matches!(result, Err(BackupError::RemoteApi { .. })));
    }
}
