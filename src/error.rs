use thiserror::Error;

/// バックアップ処理で発生するエラー。
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Credential not found: {0}")]
    CredentialNotFound(String),

    #[error("Failed to read secret: {0}")]
    SecretStore(String),

    #[error("{service} API request failed: {message}")]
    RemoteApi {
        service: &'static str,
        message: String,
    },

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Time entry {entry_id} references unknown project {project_id}")]
    UnknownProjectReference { entry_id: i64, project_id: i64 },

    #[error("Exceeded the maximum of {0} pages")]
    MaxPagesExceeded(u32),

    #[error("Failed to serialize records: {0}")]
    Serialization(String),

    #[error("Failed to compress records")]
    Compression(#[from] std::io::Error),

    #[error("Failed to upload {key} to {bucket}: HTTP {status}")]
    StoreWriteFailure {
        bucket: String,
        key: String,
        status: u16,
    },

    #[error("Blob store unreachable: {0}")]
    StoreUnreachable(String),

    #[error("Invalid time window: start {start} is after end {end}")]
    InvalidWindow { start: i64, end: i64 },
}

impl BackupError {
    /// リモートAPIのエラーを作成する。
    pub fn remote(service: &'static str, message: impl ToString) -> Self {
        Self::RemoteApi {
            service,
            message: message.to_string(),
        }
    }
}
