//! `repub` flow
//!
//! Republishes the umbrella package from a local clone after remote changes
//! (merged pull requests in particular). Local edits are shelved, the clone
//! is merged up to origin, then published as-is. The registry is not edited.

use crate::core::error::PublishError;
use crate::git::command::CommandRunner;
use crate::git::reconciler::GitWorkspace;
use std::path::PathBuf;

/// Inputs of the `repub` flow
#[derive(Debug, Clone)]
pub struct RepubOptions {
    /// Folder containing the umbrella repository clone
    pub repo_folder: PathBuf,
}

/// Run the `repub` flow
pub async fn repub(runner: &dyn CommandRunner, options: &RepubOptions) -> Result<(), PublishError> {
    let repo_folder = options.repo_folder.clone();
    if !repo_folder.join(".git").exists() {
        return Err(PublishError::MissingRepository {
            path: repo_folder.join(".git"),
        });
    }

    let workspace = GitWorkspace::new(runner, &repo_folder);

    println!("🔄 Updating clone from origin");
    workspace.add_all().await?;
    workspace.stash().await?;
    workspace.fetch("origin").await?;
    workspace.merge_theirs("origin/master").await?;

    println!("🚀 Publishing");
    runner
        .stream("npm", &["publish"], Some(&repo_folder))
        .await?;
    println!("✅ Republished");

    Ok(())
}
