use std::path::Path;

use crate::error::DockerError;

/// Archive `ctx_dir` into a uniquely-named temp file via the system `tar`,
/// read the bytes back, and delete the temp file.
pub async fn build_context_tar(ctx_dir: &Path) -> Result<Vec<u8>, DockerError> {
    let tar_path = tempfile::Builder::new()
        .prefix("otturnaut-ctx-")
        .suffix(".tar")
        .tempfile()
        .map_err(|e| DockerError::TarballCreateFailed(e.to_string()))?
        .into_temp_path()
        .keep()
        .map_err(|e| DockerError::TarballCreateFailed(e.to_string()))?;

    let spec = otturnaut_process::CommandSpec::new("tar")
        .arg("-cf")
        .arg(tar_path.to_string_lossy().into_owned())
        .arg("-C")
        .arg(ctx_dir.to_string_lossy().into_owned())
        .arg(".");

    let outcome = otturnaut_process::run_sync(&spec).await;
    if !outcome.is_ok() {
        let _ = tokio::fs::remove_file(&tar_path).await;
        return Err(DockerError::TarballCreateFailed(outcome.output));
    }

    let bytes = tokio::fs::read(&tar_path)
        .await
        .map_err(|e| DockerError::TarballReadFailed(e.to_string()));
    let _ = tokio::fs::remove_file(&tar_path).await;
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn archives_a_directory_into_readable_tar_bytes() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("Dockerfile"), b"FROM scratch\n")
            .await
            .unwrap();

        let bytes = build_context_tar(dir.path()).await.unwrap();
        assert!(!bytes.is_empty());
        // A valid tar stream starts with the first entry's 512-byte header.
        assert!(bytes.len() >= 512);
    }
}
