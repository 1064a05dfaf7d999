use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;

/// URL prefix the upload directory is served under.
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// On-disk store for uploaded pin images.
///
/// Files are kept verbatim, one flat file per pin, named `{uuid}.{ext}` so
/// names never collide and never carry client-supplied path components.
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Upload directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` under a fresh unique name and return that name.
    pub async fn save(&self, extension: &str, bytes: &[u8]) -> Result<String> {
        let filename = format!("{}.{}", Uuid::new_v4().simple(), extension);
        fs::write(self.dir.join(&filename), bytes).await?;
        Ok(filename)
    }

    pub async fn delete(&self, filename: &str) {
        if let Err(e) = fs::remove_file(self.dir.join(filename)).await {
            warn!("Failed to remove upload {}: {}", filename, e);
        }
    }
}

pub fn image_url(filename: &str) -> String {
    format!("{}/{}", UPLOADS_URL_PREFIX, filename)
}

/// Lower-cased extension of an uploaded image name, if it is one we accept.
pub fn image_extension(filename: &str) -> Result<String, ApiError> {
    let (_, ext) = filename
        .rsplit_once('.')
        .ok_or_else(|| ApiError::validation("Invalid image file."))?;

    let ext = ext.to_ascii_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ApiError::validation("Only JPG, JPEG, PNG, GIF allowed."));
    }
    Ok(ext)
}
