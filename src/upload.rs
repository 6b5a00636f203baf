//! Content-addressed image storage.

use std::io;
use std::path::Path;

/// URL prefix (and stored path prefix) for uploaded files.
pub const UPLOADS_PREFIX: &str = "uploads";

/// Writes `bytes` to `dir` as `<blake3 hex><extension>` and returns the
/// relative path kept on the post. Identical bytes map to the same file,
/// which is written only once.
pub fn store_image(dir: &Path, extension: &str, bytes: &[u8]) -> io::Result<String> {
    std::fs::create_dir_all(dir)?;

    let file_name = format!("{}{}", blake3::hash(bytes).to_hex(), extension);
    let path = dir.join(&file_name);
    if path.exists() {
        tracing::debug!("Upload {} already stored", file_name);
    } else {
        std::fs::write(&path, bytes)?;
        tracing::info!("Stored upload {}", path.display());
    }

    Ok(format!("{UPLOADS_PREFIX}/{file_name}"))
}
