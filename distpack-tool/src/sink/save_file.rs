use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs::File;

/// Creates a file writer for streaming zip output.
/// Automatically creates parent directories if they don't exist.
pub async fn create_file_writer<P: AsRef<Path>>(path: P) -> Result<File> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }

    let file = File::create(path)
        .await
        .with_context(|| format!("creating {}", path.display()))?;

    Ok(file)
}
