//! Image files attached to schools and courses.
//!
//! Files live under the configured upload directory; rows only keep the path
//! relative to it, e.g. `courses/<uuid>.png`.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ApiError;

const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// An image received in a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

fn extension_of(file_name: Option<&str>) -> Result<String, ApiError> {
    let ext = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| ApiError::Validation("image: el archivo no tiene extensión".to_string()))?;
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ApiError::Validation(format!(
            "image: formato '{ext}' no permitido"
        )));
    }
    Ok(ext)
}

/// Writes the image and returns its relative path.
pub async fn store_image(
    upload_dir: &str,
    category: &str,
    image: &UploadedImage,
) -> Result<String, ApiError> {
    if image.bytes.is_empty() {
        return Err(ApiError::Validation("image: el archivo está vacío".to_string()));
    }
    let ext = extension_of(image.file_name.as_deref())?;
    let relative = format!("{category}/{}.{ext}", Uuid::new_v4());

    let target: PathBuf = Path::new(upload_dir).join(&relative);
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ApiError::internal(format!("Cannot create {}: {e}", parent.display())))?;
    }
    tokio::fs::write(&target, &image.bytes)
        .await
        .map_err(|e| ApiError::internal(format!("Cannot write {}: {e}", target.display())))?;

    debug!(path = %relative, size = image.bytes.len(), "Image stored");
    Ok(relative)
}

/// Best effort: a missing file is not an error.
pub async fn remove_image(upload_dir: &str, relative: &str) {
    let target = Path::new(upload_dir).join(relative);
    if let Err(e) = tokio::fs::remove_file(&target).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %target.display(), "Could not remove image: {e}");
        }
    }
}
