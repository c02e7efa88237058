use std::path::{Path, PathBuf};

use vidforge_core::job::Artifact;

/// File name for a video finished at `millis` (Unix epoch milliseconds).
pub fn artifact_file_name(millis: i64) -> String {
    format!("gemini-video-{millis}.mp4")
}

/// Write a finished video into `dir`, creating the directory if needed.
///
/// Returns the path written.
pub async fn write_artifact(dir: &Path, artifact: &Artifact) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(artifact_file_name(chrono::Utc::now().timestamp_millis()));
    tokio::fs::write(&path, &artifact.bytes[..]).await?;
    tracing::info!(path = %path.display(), size_bytes = artifact.len(), "Video written");
    Ok(path)
}
