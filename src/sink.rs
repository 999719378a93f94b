use std::io::Write;

use flate2::{write::GzEncoder, Compression};
use log::info;
use serde::Serialize;
use serde_json::Value;

use crate::blob_store::{BlobStore, PutObjectRequest};
use crate::error::BackupError;
use crate::window::TimeWindow;

/// アップロード結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub bucket: String,
    pub key: String,
    pub status: u16,
    pub record_count: usize,
    pub compressed_bytes: usize,
}

/// レコードをgzip圧縮したCSVとしてアップロードする。
pub struct RecordSink<B: BlobStore> {
    store: B,
}

impl<B: BlobStore> RecordSink<B> {
    /// 新しい`RecordSink`を返す。
    pub fn new(store: B) -> Self {
        Self { store }
    }

    /// レコードをCSVに変換し、gzip圧縮してアップロードする。
    ///
    /// # Arguments
    ///
    /// * `records` - アップロードするレコード
    /// * `fieldnames` - CSVの列名。列の順序もこれに従う
    /// * `bucket` - アップロード先のバケット
    /// * `key` - アップロード先のキー
    pub async fn upload<T: Serialize>(
        &self,
        records: &[T],
        fieldnames: &[&str],
        bucket: &str,
        key: &str,
    ) -> Result<UploadReceipt, BackupError> {
        let csv = to_csv(records, fieldnames)?;
        let body = gzip(&csv)?;
        let compressed_bytes = body.len();

        let status = self
            .store
            .put_object(PutObjectRequest {
                bucket: bucket.to_string(),
                key: key.to_string(),
                body,
                content_type: "text/csv",
                content_encoding: "gzip",
            })
            .await?;
        if !(200..300).contains(&status) {
            return Err(BackupError::StoreWriteFailure {
                bucket: bucket.to_string(),
                key: key.to_string(),
                status,
            });
        }
        info!("Successfully uploaded {} to {}", key, bucket);

        Ok(UploadReceipt {
            bucket: bucket.to_string(),
            key: key.to_string(),
            status,
            record_count: records.len(),
            compressed_bytes,
        })
    }
}

/// アップロード先のキーを返す。
pub fn object_key(source: &str, window: &TimeWindow) -> String {
    format!("{}/{}_{}.csv.gz", source, window.start(), window.end())
}

/// レコードをヘッダー付きのCSV文字列に変換する。
///
/// 各レコードは`fieldnames`と同じフィールドを過不足なく持つ必要がある。
pub fn to_csv<T: Serialize>(records: &[T], fieldnames: &[&str]) -> Result<String, BackupError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer
        .write_record(fieldnames)
        .map_err(|err| BackupError::Serialization(err.to_string()))?;

    for (index, record) in records.iter().enumerate() {
        let row = to_row(record, fieldnames).map_err(|message| {
            BackupError::Serialization(format!("record {}: {}", index, message))
        })?;
        writer
            .write_record(&row)
            .map_err(|err| BackupError::Serialization(err.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| BackupError::Serialization(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| BackupError::Serialization(err.to_string()))
}

/// レコードを`fieldnames`の順に並べた値のリストに変換する。
fn to_row<T: Serialize>(record: &T, fieldnames: &[&str]) -> Result<Vec<String>, String> {
    let fields = match serde_json::to_value(record).map_err(|err| err.to_string())? {
        Value::Object(fields) => fields,
        other => return Err(format!("expected a struct, got {}", other)),
    };
    if let Some(unknown) = fields
        .keys()
        .find(|name| !fieldnames.contains(&name.as_str()))
    {
        return Err(format!("field {:?} is not in fieldnames", unknown));
    }

    fieldnames
        .iter()
        .map(|name| {
            fields
                .get(*name)
                .map(to_cell)
                .ok_or_else(|| format!("missing field {:?}", name))
        })
        .collect()
}

fn to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 文字列をgzip圧縮する。
pub fn gzip(text: &str) -> Result<Vec<u8>, BackupError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes())?;

    Ok(encoder.finish()?)
}
