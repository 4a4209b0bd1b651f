use std::collections::HashMap;

use otturnaut_docker::ContainerRuntime;

use crate::error::AgentError;
use crate::progress::{Progress, ProgressSink};

/// Fetch, tag, and build an image from a source-build descriptor. Runs *before* the saga: a build failure must not allocate any
/// runtime resources. The scratch directory is always cleaned up, whether
/// the build succeeded or not.
pub async fn build_pipeline(
    runtime: &dyn ContainerRuntime,
    progress: &dyn ProgressSink,
    app_id: &str,
    repo_url: &str,
    git_ref: &str,
    dockerfile: &str,
    build_args: &HashMap<String, String>,
    ssh_key_path: Option<&str>,
) -> Result<String, AgentError> {
    progress.notify(Progress::Build {
        phase: "fetch".to_string(),
        message: format!("{repo_url}@{git_ref}"),
    });

    let (dir, commit_hash) = otturnaut_git::fetch(repo_url, git_ref, None, ssh_key_path).await?;
    let tag = otturnaut_core::naming::image_tag(app_id, &commit_hash);

    progress.notify(Progress::Build {
        phase: "build".to_string(),
        message: tag.clone(),
    });

    let build_result = runtime.build_image(&dir, &tag, dockerfile, build_args).await;

    if let Err(e) = otturnaut_git::cleanup(&dir).await {
        tracing::warn!(error = %e, dir = ?dir, "failed to clean up build scratch dir");
    }

    let built_tag = build_result.map_err(|e| AgentError::BuildFailed(e.to_string()))?;
    progress.notify(Progress::Build {
        phase: "done".to_string(),
        message: built_tag.clone(),
    });
    Ok(built_tag)
}
