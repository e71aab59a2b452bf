//! Photo capture, compression and upload.
//!
//! Every step can fail with an [`AssetError`]; the registration flow aborts
//! on the first one, before anything is written to the census. An uploaded
//! photo whose tree then fails to save is deleted again with
//! [`PhotoPipeline::discard`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::config::PhotoConfig;
use crate::core::{Effect, Transience};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssetError {
    #[error("camera capture failed: {reason}")]
    Capture { reason: String },
    #[error("photo compression failed: {reason}")]
    Compress { reason: String },
    #[error("upload to {path} failed: {reason}")]
    Upload { path: String, reason: String },
    #[error("deleting {path} failed: {reason}")]
    Delete { path: String, reason: String },
}

impl AssetError {
    pub fn transience(&self) -> Transience {
        match self {
            AssetError::Upload { .. } | AssetError::Delete { .. } => Transience::Retryable,
            AssetError::Capture { .. } | AssetError::Compress { .. } => Transience::Unknown,
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            AssetError::Upload { .. } | AssetError::Delete { .. } => Effect::Unknown,
            _ => Effect::None,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Photo {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl Photo {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: "image/jpeg".to_string(),
        }
    }
}

impl std::fmt::Debug for Photo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Photo")
            .field("bytes", &self.bytes.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

pub trait Camera: Send + Sync {
    /// Takes one picture at the given JPEG quality.
    fn capture(&self, quality: u8) -> Result<Photo, AssetError>;
}

pub trait ImageCompressor: Send + Sync {
    fn compress(&self, photo: &Photo, settings: &PhotoConfig) -> Result<Photo, AssetError>;
}

/// Leaves the photo untouched. For cameras that already honor the quality
/// setting.
#[derive(Clone, Copy, Debug, Default)]
pub struct Passthrough;

impl ImageCompressor for Passthrough {
    fn compress(&self, photo: &Photo, _: &PhotoConfig) -> Result<Photo, AssetError> {
        Ok(photo.clone())
    }
}

pub trait BlobStore: Send + Sync {
    /// Stores `photo` at `path` and returns a publicly resolvable URL.
    fn upload(&self, path: &str, photo: &Photo) -> Result<String, AssetError>;

    /// Removes the blob at `path`. Deleting a missing path succeeds.
    fn delete(&self, path: &str) -> Result<(), AssetError>;
}

/// In-process blob store; URLs are `base_url` + path.
#[derive(Debug)]
pub struct MemoryBlobStore {
    base_url: String,
    state: Mutex<BlobState>,
}

#[derive(Debug, Default)]
struct BlobState {
    blobs: BTreeMap<String, Photo>,
    failing: Option<String>,
    failing_deletes: Option<String>,
}

impl MemoryBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            state: Mutex::new(BlobState::default()),
        }
    }

    /// Makes every upload fail with `reason` until cleared with `None`.
    pub fn fail_uploads(&self, reason: Option<&str>) {
        self.lock().failing = reason.map(str::to_string);
    }

    /// Makes every delete fail with `reason` until cleared with `None`.
    pub fn fail_deletes(&self, reason: Option<&str>) {
        self.lock().failing_deletes = reason.map(str::to_string);
    }

    pub fn get(&self, path: &str) -> Option<Photo> {
        self.lock().blobs.get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.lock().blobs.keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BlobState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl BlobStore for MemoryBlobStore {
    fn upload(&self, path: &str, photo: &Photo) -> Result<String, AssetError> {
        let mut state = self.lock();
        if let Some(reason) = state.failing.clone() {
            return Err(AssetError::Upload {
                path: path.to_string(),
                reason,
            });
        }
        state.blobs.insert(path.to_string(), photo.clone());
        Ok(format!("{}/{path}", self.base_url))
    }

    fn delete(&self, path: &str) -> Result<(), AssetError> {
        let mut state = self.lock();
        if let Some(reason) = state.failing_deletes.clone() {
            return Err(AssetError::Delete {
                path: path.to_string(),
                reason,
            });
        }
        state.blobs.remove(path);
        Ok(())
    }
}

/// Where an uploaded photo landed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredPhoto {
    pub path: String,
    pub url: String,
}

/// Compress, then upload under `trees/`.
#[derive(Clone)]
pub struct PhotoPipeline {
    compressor: Arc<dyn ImageCompressor>,
    blobs: Arc<dyn BlobStore>,
    settings: PhotoConfig,
}

impl PhotoPipeline {
    pub fn new(
        compressor: Arc<dyn ImageCompressor>,
        blobs: Arc<dyn BlobStore>,
        settings: PhotoConfig,
    ) -> Self {
        Self {
            compressor,
            blobs,
            settings,
        }
    }

    pub fn settings(&self) -> &PhotoConfig {
        &self.settings
    }

    pub fn store(&self, code: &str, photo: &Photo, now_ms: u64) -> Result<StoredPhoto, AssetError> {
        let compressed = self.compressor.compress(photo, &self.settings)?;
        let path = blob_path(code, now_ms);
        let url = self.blobs.upload(&path, &compressed)?;
        tracing::info!(
            path = %path,
            original = photo.bytes.len(),
            stored = compressed.bytes.len(),
            "photo uploaded"
        );
        Ok(StoredPhoto { path, url })
    }

    /// Best effort: deletes a photo nothing refers to. A failed delete is
    /// logged with the orphaned URL and otherwise ignored.
    pub fn discard(&self, stored: &StoredPhoto) {
        match self.blobs.delete(&stored.path) {
            Ok(()) => tracing::info!(path = %stored.path, "unused photo deleted"),
            Err(err) => tracing::warn!(url = %stored.url, "orphaned photo left behind: {err}"),
        }
    }
}

/// `trees/<code>-<millis>.jpg`, with anything outside `[A-Za-z0-9_-]` in the
/// code replaced by `_`.
pub fn blob_path(code: &str, now_ms: u64) -> String {
    let code: String = code
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("trees/{code}-{now_ms}.jpg")
}
