use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::image_processing::{detect_mime_type, get_extension_from_mime_type};

pub const UPLOAD_ROUTE: &str = "/uploads";

/// Source photos uploaded by shoppers, kept on local disk and served back
/// under [`UPLOAD_ROUTE`].
#[derive(Clone, Debug)]
pub struct UploadStorage {
    base_dir: PathBuf,
    base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub key: String,
    pub url: String,
}

pub fn compute_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Sniffs the stored format from the bytes themselves. The client's file
/// name and declared content type never pick the extension, so everything
/// served back under [`UPLOAD_ROUTE`] is one of the decodable image types.
pub fn sniff_upload(bytes: &[u8]) -> Option<(&'static str, &'static str)> {
    let mime_type = detect_mime_type(bytes)?;
    Some((mime_type, get_extension_from_mime_type(mime_type)))
}

impl UploadStorage {
    pub fn new(base_dir: PathBuf, base_url: String) -> Self {
        Self { base_dir, base_url }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<StoredUpload> {
        let (_, ext) = sniff_upload(bytes).ok_or_else(|| anyhow!("not a supported image"))?;
        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let hash = compute_hash(&format!("upload:{timestamp}:{file_name}:{}", bytes.len()));
        let key = format!("{hash}.{ext}");
        let path = self.resolve_path(&key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, bytes).await?;
        Ok(StoredUpload {
            url: self.get_public_url(&key),
            key,
        })
    }

    pub fn get_public_url(&self, key: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let key = key.trim_start_matches('/');
        format!("{base}{UPLOAD_ROUTE}/{key}")
    }

    pub fn resolve_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(Path::new(key.trim_start_matches('/')))
    }
}
