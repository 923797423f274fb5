//! GraphQL file uploads sent as `multipart/form-data`.
//!
//! The request is expected to follow the GraphQL multipart request convention
//! (https://github.com/jaydenseric/graphql-multipart-request-spec):
//! 1. `operations` field with the JSON operation(s), file variables set to `null`
//! 2. `map` field with `{"<file field name>": ["variables.file", ...]}`
//! 3. file fields named as in `map`
//!
//! The processor replaces every mapped `null` with an upload object and returns the operations
//! as a structured body for the engine.

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Limits applied to a single multipart request.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadConfig {
    /// Max size of a single file in bytes
    pub max_file_size: u64,
    /// Max number of files per request
    pub max_files: usize,
    /// Max size of a non-file field, e.g. `operations`, in bytes
    pub max_field_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig {
            max_file_size: 5 * 1024 * 1024,
            max_files: 10,
            max_field_size: 1024 * 1024,
        }
    }
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Missing multipart field 'operations'.")]
    MissingOperations,
    #[error("Invalid JSON in the 'operations' multipart field: {0}")]
    InvalidOperations(serde_json::Error),
    #[error("Missing multipart field 'map'.")]
    MissingMap,
    #[error("Invalid JSON in the 'map' multipart field: {0}")]
    InvalidMap(serde_json::Error),
    #[error("{0} max file uploads exceeded.")]
    TooManyFiles(usize),
    #[error("File missing in the request: {0}")]
    FileMissing(String),
    #[error("Invalid object path in the 'map' multipart field: {0}")]
    InvalidPath(String),
    #[error("Invalid multipart request: {0}")]
    Multipart(#[from] multer::Error),
}

/// An uploaded file as it is passed to resolvers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Upload {
    pub filename: Option<String>,
    pub mimetype: Option<String>,
    pub size: usize,
    /// File content, base64 encoded
    pub content: String,
}

/// The receiving end of a one-shot request body. Produced by [byte_channel].
pub type ByteStream = mpsc::UnboundedReceiver<Result<Bytes, std::io::Error>>;

/// The sending end of a one-shot request body.
pub struct BytePusher {
    tx: mpsc::UnboundedSender<Result<Bytes, std::io::Error>>,
}

impl BytePusher {
    /// Queues a chunk of the body. Chunks pushed after the stream was dropped are discarded.
    pub fn push<B: Into<Bytes>>(&self, chunk: B) {
        if self.tx.unbounded_send(Ok(chunk.into())).is_err() {
            debug!("Body stream receiver is gone");
        }
    }

    /// Signals the end of the body.
    pub fn end(self) {
        self.tx.close_channel();
    }
}

/// Creates a fresh body stream for a single request.
pub fn byte_channel() -> (BytePusher, ByteStream) {
    let (tx, rx) = mpsc::unbounded();
    (BytePusher { tx }, rx)
}

/// Converts a multipart body stream into a structured GraphQL request body.
#[async_trait]
pub trait UploadProcessor: Send + Sync {
    async fn process(&self, stream: ByteStream, content_type: &str, config: &UploadConfig) -> Result<Value, UploadError>;
}

/// The default [UploadProcessor] built on `multer`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MultipartProcessor;

#[async_trait]
impl UploadProcessor for MultipartProcessor {
    async fn process(&self, stream: ByteStream, content_type: &str, config: &UploadConfig) -> Result<Value, UploadError> {
        let boundary = multer::parse_boundary(content_type)?;

        let constraints = multer::Constraints::new().size_limit(
            multer::SizeLimit::new()
                .per_field(config.max_file_size)
                .for_field("operations", config.max_field_size)
                .for_field("map", config.max_field_size),
        );
        let mut multipart = multer::Multipart::with_constraints(stream, boundary, constraints);

        // operations and map must come first, before any of the files
        let mut operations = match multipart.next_field().await? {
            Some(field) if field.name() == Some("operations") => {
                serde_json::from_str::<Value>(&field.text().await?).map_err(UploadError::InvalidOperations)?
            }
            _ => return Err(UploadError::MissingOperations),
        };

        let map = match multipart.next_field().await? {
            Some(field) if field.name() == Some("map") => {
                serde_json::from_str::<HashMap<String, Vec<String>>>(&field.text().await?)
                    .map_err(UploadError::InvalidMap)?
            }
            _ => return Err(UploadError::MissingMap),
        };

        if map.len() > config.max_files {
            warn!("Upload with {} files", map.len());
            return Err(UploadError::TooManyFiles(config.max_files));
        }

        let mut files: HashMap<String, Upload> = HashMap::new();
        while let Some(field) = multipart.next_field().await? {
            let name = match field.name() {
                Some(v) if map.contains_key(v) => v.to_owned(),
                v => {
                    debug!("Skipping unmapped multipart field {:?}", v);
                    continue;
                }
            };
            let filename = field.file_name().map(|v| v.to_owned());
            let mimetype = field.content_type().map(|v| v.to_string());
            let data = field.bytes().await?;
            info!("Upload {}: {:?}, {} bytes", name, filename, data.len());

            files.insert(
                name,
                Upload {
                    filename,
                    mimetype,
                    size: data.len(),
                    content: base64::encode(&data),
                },
            );
        }

        for (name, paths) in map {
            let upload = files.remove(&name).ok_or_else(|| UploadError::FileMissing(name.clone()))?;
            let upload = json!(upload);
            for path in paths {
                set_path(&mut operations, &path, upload.clone())?;
            }
        }

        Ok(operations)
    }
}

/// Sets the value at a dotted path like `variables.files.1` or `0.variables.file` for batches.
fn set_path(root: &mut Value, path: &str, value: Value) -> Result<(), UploadError> {
    let mut target = root;
    for segment in path.split('.') {
        target = match target {
            Value::Object(obj) => obj
                .get_mut(segment)
                .ok_or_else(|| UploadError::InvalidPath(path.to_owned()))?,
            Value::Array(arr) => segment
                .parse::<usize>()
                .ok()
                .and_then(move |idx| arr.get_mut(idx))
                .ok_or_else(|| UploadError::InvalidPath(path.to_owned()))?,
            _ => return Err(UploadError::InvalidPath(path.to_owned())),
        };
    }

    *target = value;
    Ok(())
}
