use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_secretsmanager::{error::DisplayErrorContext, Client};
use log::debug;
#[cfg(test)]
use mockall::automock;

use crate::error::BackupError;

/// シークレットに格納されているAPIキーの名前。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyName {
    LastFm,
    Toggl,
}

impl ApiKeyName {
    /// シークレットのJSON内でのフィールド名を返す。
    pub fn field_name(&self) -> &'static str {
        match self {
            ApiKeyName::LastFm => "last_fm_api_key",
            ApiKeyName::Toggl => "toggl_api_key",
        }
    }
}

/// APIキーを取得するためのtrait。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// 指定された名前のAPIキーを取得する。
    ///
    /// 呼び出しごとにシークレットストアへ問い合わせる。
    async fn get_api_key(&self, key_name: ApiKeyName) -> Result<String, BackupError>;
}

/// AWS Secrets ManagerからAPIキーを取得する。
#[derive(Clone)]
pub struct SecretsManagerProvider {
    client: Client,
    secret_id: String,
}

impl SecretsManagerProvider {
    /// 新しい`SecretsManagerProvider`を返す。
    ///
    /// # Arguments
    ///
    /// * `client` - Secrets Managerのクライアント
    /// * `secret_id` - APIキーをまとめたシークレットの名前
    pub fn new(client: Client, secret_id: impl Into<String>) -> Self {
        Self {
            client,
            secret_id: secret_id.into(),
        }
    }
}

#[async_trait]
impl SecretProvider for SecretsManagerProvider {
    async fn get_api_key(&self, key_name: ApiKeyName) -> Result<String, BackupError> {
        debug!(
            "Reading {} from secret {}",
            key_name.field_name(),
            self.secret_id
        );
        let output = self
            .client
            .get_secret_value()
            .secret_id(&self.secret_id)
            .send()
            .await
            .map_err(|err| match err.as_service_error() {
                Some(service_err) if service_err.is_resource_not_found_exception() => {
                    BackupError::CredentialNotFound(format!(
                        "secret {} does not exist",
                        self.secret_id
                    ))
                }
                _ => BackupError::SecretStore(DisplayErrorContext(&err).to_string()),
            })?;
        let secret = output.secret_string().ok_or_else(|| {
            BackupError::CredentialNotFound(format!(
                "secret {} has no string value",
                self.secret_id
            ))
        })?;

        extract_api_key(secret, key_name)
    }
}

/// JSON形式のシークレットから指定されたAPIキーを取り出す。
pub fn extract_api_key(secret: &str, key_name: ApiKeyName) -> Result<String, BackupError> {
    let fields: HashMap<String, serde_json::Value> = serde_json::from_str(secret)
        .map_err(|err| BackupError::SecretStore(format!("secret is not a JSON object: {}", err)))?;

    fields
        .get(key_name.field_name())
        .and_then(|value| value.as_str())
        .map(str::to_string)
        .ok_or_else(|| BackupError::CredentialNotFound(key_name.field_name().to_string()))
}
