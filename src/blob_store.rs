use async_trait::async_trait;
use aws_sdk_s3::{
    error::{DisplayErrorContext, SdkError},
    primitives::ByteStream,
    Client,
};
#[cfg(test)]
use mockall::automock;

use crate::error::BackupError;

/// PutObjectが成功した時のHTTPステータス。S3は成功時に常に200を返す。
const PUT_OBJECT_OK: u16 = 200;

/// オブジェクトの書き込みリクエスト。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: &'static str,
    pub content_encoding: &'static str,
}

/// オブジェクトを書き込むためのtrait。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// オブジェクトを書き込み、ストアが返したHTTPステータスを返す。
    ///
    /// ストアに到達できなかった場合はエラーを返す。
    async fn put_object(&self, request: PutObjectRequest) -> Result<u16, BackupError>;
}

/// S3にオブジェクトを書き込む。
pub struct S3BlobStore {
    client: Client,
}

impl S3BlobStore {
    /// 新しい`S3BlobStore`を返す。
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put_object(&self, request: PutObjectRequest) -> Result<u16, BackupError> {
        let result = self
            .client
            .put_object()
            .bucket(request.bucket)
            .key(request.key)
            .body(ByteStream::from(request.body))
            .content_type(request.content_type)
            .content_encoding(request.content_encoding)
            .send()
            .await;

        match result {
            Ok(_) => Ok(PUT_OBJECT_OK),
            Err(SdkError::ServiceError(err)) => Ok(err.raw().status().as_u16()),
            Err(err) => Err(BackupError::StoreUnreachable(
                DisplayErrorContext(&err).to_string(),
            )),
        }
    }
}
