//! `init` flow
//!
//! Prepares an existing git repository as the umbrella package: generated
//! registry skeleton, runtime shim, per-binary launcher scripts, README and
//! descriptor, then commits and optionally publishes.

use crate::core::error::PublishError;
use crate::core::version::{BinaryVersion, VersionComponent};
use crate::git::command::CommandRunner;
use crate::git::reconciler::GitWorkspace;
use crate::registry::manifest::{self, Repository, UmbrellaManifest};
use crate::registry::sources::SOURCES_FILE;
use crate::templates;
use std::path::PathBuf;
use tokio::fs;

/// Inputs of the `init` flow
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Umbrella package name
    pub name: String,

    /// Folder containing the umbrella repository clone
    pub repo_folder: PathBuf,

    /// Logical binary names to expose
    pub binary_names: Vec<String>,

    /// Extra file names shipped alongside every binary
    pub additional_files: Vec<String>,

    /// Source repository of the original binary (must end in `.git`)
    pub git_source: Option<String>,

    /// Homepage of the original binary's project
    pub url_source: Option<String>,

    /// Version component to advance on re-runs
    pub bump: VersionComponent,

    /// Skip publishing and pushing
    pub dont_publish: bool,
}

/// Run the `init` flow
pub async fn init(runner: &dyn CommandRunner, options: &InitOptions) -> Result<(), PublishError> {
    let repo_folder = options.repo_folder.clone();
    if !repo_folder.join(".git").exists() {
        return Err(PublishError::MissingRepository {
            path: repo_folder.join(".git"),
        });
    }

    if let Some(git_source) = &options.git_source {
        if !git_source.ends_with(".git") {
            return Err(PublishError::Configuration {
                message: "gitSourceは.gitで終わる必要があります。urlSourceの使用を検討してください"
                    .to_string(),
            });
        }
    }

    let package_path = repo_folder.join("package.json");
    let mut package: UmbrellaManifest = match manifest::load(&package_path).await {
        Ok(package) => package,
        Err(e) => {
            println!("⚠️  Failed to parse package.json, replacing it ({})", e);
            UmbrellaManifest::default()
        }
    };

    package.name.get_or_insert_with(|| options.name.clone());
    package.version = Some(match &package.version {
        None => "0.0.0".to_string(),
        Some(version) => BinaryVersion::parse(version)
            .bump(options.bump)
            .to_string(),
    });
    package
        .description
        .get_or_insert_with(|| templates::umbrella_description(&options.name));
    package.main.get_or_insert_with(|| "index.js".to_string());

    package.binary_names = manifest::unique(
        package
            .binary_names
            .iter()
            .cloned()
            .chain(options.binary_names.iter().cloned()),
    );
    package.additional_files = manifest::unique(
        package
            .additional_files
            .iter()
            .cloned()
            .chain(options.additional_files.iter().cloned()),
    );

    let mut files = package.files.clone();
    files.extend(
        [SOURCES_FILE, "index.js", "README.md"]
            .iter()
            .map(|s| s.to_string()),
    );

    let workspace = GitWorkspace::new(runner, &repo_folder);

    // package.json metadata derived from the repository itself
    let remotes = workspace.remote_push_urls().await?;
    if let Some(origin) = remotes.get("origin") {
        package.repository = Some(Repository::Url(origin.clone()));
    }
    if package.author.is_none() {
        let user = workspace
            .config_value(&["config", "--global", "user.name"])
            .await?;
        let email = workspace.config_value(&["config", "user.email"]).await?;
        package.author = Some(format!("{} <{}>", user, email));
    }

    // Generated artifacts; existing README and registry are never replaced
    let readme_path = repo_folder.join("README.md");
    if !readme_path.exists() {
        fs::write(
            &readme_path,
            templates::umbrella_readme(
                &options.name,
                options.git_source.as_deref(),
                options.url_source.as_deref(),
            ),
        )
        .await?;
    }

    let sources_path = repo_folder.join(SOURCES_FILE);
    if !sources_path.exists() {
        fs::write(&sources_path, templates::sources_skeleton()).await?;
    }

    fs::write(repo_folder.join("index.js"), templates::umbrella_shim()).await?;

    for binary_name in package.binary_names.clone() {
        let js_name = format!("{}.js", binary_name);
        // Alias the package name to its first binary when the names differ
        if Some(&binary_name) == package.binary_names.first() && binary_name != options.name {
            package.bin.insert(options.name.clone(), js_name.clone());
        }
        package.bin.insert(binary_name.clone(), js_name.clone());
        files.push(js_name.clone());
        fs::write(
            repo_folder.join(&js_name),
            templates::launcher_script(&binary_name),
        )
        .await?;
    }

    package.url_source = package.url_source.take().or(options.url_source.clone());
    package.git_source = package.git_source.take().or(options.git_source.clone());

    // publish.sh is deliberately not listed in files
    package.files = manifest::unique(files);
    manifest::save(&package_path, &package).await?;

    workspace
        .commit_if_changed("init/config update (AUTO GENERATED COMMIT)")
        .await?;

    let publish_path = repo_folder.join("publish.sh");
    fs::write(&publish_path, templates::publish_script()).await?;

    if options.dont_publish {
        println!(
            "⏭️  Not publishing (run \"bash {}\" to publish)",
            publish_path.display()
        );
    } else {
        println!("🚀 Publishing {}", options.name);
        workspace.push().await?;
        runner
            .stream("npm", &["publish"], Some(&repo_folder))
            .await?;
        println!("✅ Published {}", package.version.as_deref().unwrap_or(""));
    }

    Ok(())
}
