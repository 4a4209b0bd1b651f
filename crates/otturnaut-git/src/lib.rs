//! Source Fetcher (C2): shallow-clones a git repository to a scratch
//! directory, resolves its HEAD commit, and scrubs credentials out of the
//! process it spawns to do so.

use std::path::{Path, PathBuf};

use otturnaut_process::{run_sync, CommandSpec, RunErrorKind};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("failed to create scratch directory: {0}")]
    MkdirFailed(String),
    #[error("git clone failed (exit {0}): {1}")]
    CloneFailed(i32, String),
    #[error("git rev-parse HEAD failed (exit {0})")]
    HashResolveFailed(i32),
}

const STDERR_SNIPPET_LEN: usize = 500;

/// Required SSH options when a private key is supplied: disable the agent,
/// use only the given identity, accept new host keys non-interactively, and
/// never prompt.
fn git_ssh_command(key_path: &str) -> String {
    format!(
        "ssh -i {key_path} -o IdentityAgent=none -o IdentitiesOnly=yes \
         -o StrictHostKeyChecking=accept-new -o BatchMode=yes"
    )
}

/// Create a fresh scratch directory, shallow-clone `repo_url` at `ref` into
/// it, and resolve its HEAD commit hash.
pub async fn fetch(
    repo_url: &str,
    git_ref: &str,
    depth: Option<u32>,
    ssh_key_path: Option<&str>,
) -> Result<(PathBuf, String), FetchError> {
    let dir = tempfile::Builder::new()
        .prefix("otturnaut-")
        .tempdir()
        .map_err(|e| FetchError::MkdirFailed(e.to_string()))?
        // Keep the directory alive past this scope; the caller owns
        // cleanup via `cleanup()`.
        .into_path();

    info!(repo_url, git_ref, dir = %dir.display(), "cloning repository");

    let mut spec = CommandSpec::new("git")
        .arg("clone")
        .arg("--branch")
        .arg(git_ref);
    if let Some(depth) = depth {
        spec = spec.arg("--depth").arg(depth.to_string());
    }
    spec = spec
        .arg(repo_url)
        .arg(dir.to_string_lossy().into_owned());

    if let Some(key) = ssh_key_path {
        spec = spec.env("GIT_SSH_COMMAND", git_ssh_command(key));
    }

    let outcome = run_sync(&spec).await;
    if !outcome.is_ok() {
        let code = match outcome.kind {
            RunErrorKind::NonZeroExit(c) => c,
            RunErrorKind::Timeout => -1,
            _ => -1,
        };
        let snippet: String = outcome.output.chars().take(STDERR_SNIPPET_LEN).collect();
        return Err(FetchError::CloneFailed(code, snippet));
    }

    let hash_spec = CommandSpec::new("git")
        .arg("rev-parse")
        .arg("HEAD")
        .cwd(&dir);
    let hash_outcome = run_sync(&hash_spec).await;
    if !hash_outcome.is_ok() {
        let code = match hash_outcome.kind {
            RunErrorKind::NonZeroExit(c) => c,
            _ => -1,
        };
        return Err(FetchError::HashResolveFailed(code));
    }

    let commit_hash = hash_outcome.output.trim().to_string();
    Ok((dir, commit_hash))
}

/// Idempotent recursive removal; a missing directory is success.
pub async fn cleanup(dir: &Path) -> Result<(), FetchError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FetchError::MkdirFailed(e.to_string())),
    }
}
