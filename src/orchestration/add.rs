//! `add` flow
//!
//! Publishes the current system's binaries as a sub-package and registers
//! them in the umbrella repository. The full sequence: install the umbrella
//! package, resolve the sub-package identity, stage binaries with their
//! runtime shim, reconcile a disposable clone of the umbrella repo, splice
//! the registry entry, then publish and push behind the version gate.

use crate::browser;
use crate::core::cleanup::ResourceGuard;
use crate::core::environment::SystemEnvironment;
use crate::core::error::PublishError;
use crate::core::version::{self, BinaryVersion, VersionComponent};
use crate::git::command::CommandRunner;
use crate::git::reconciler::{GitWorkspace, Reconciler};
use crate::locator::{self, FileLocator};
use crate::npm::NpmClient;
use crate::orchestration::OperatorPrompt;
use crate::registry::manifest::{self, Repository, SubPackageManifest, UmbrellaManifest};
use crate::registry::sources::{self, SourceEntry, SOURCES_FILE};
use crate::templates;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Inputs of the `add` flow
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Umbrella package name
    pub name: String,

    /// Sub-package name override
    pub sub_package_name: Option<String>,

    /// Folder for intermediate files; required when publishing is suppressed
    pub workspace_folder: Option<PathBuf>,

    /// Explicit path of the main binary
    pub binary_path: Option<PathBuf>,

    /// Extra file names to stage beyond the umbrella's lists
    pub additional_files: Vec<String>,

    /// Exact version to publish, skipping the probe
    pub version_override: Option<String>,

    /// Bump the previous patch version instead of probing the binary
    pub force_update: bool,

    /// Umbrella version component to advance
    pub bump: VersionComponent,

    /// Skip publishing and pushing
    pub dont_publish: bool,

    /// GitHub user name override
    pub user_name: Option<String>,
}

/// Outcome of one `add` run
#[derive(Debug, Clone)]
pub struct AddReport {
    pub sub_package_name: String,
    pub version: String,
    pub version_unchanged: bool,
    pub published: bool,
    pub pull_request_url: Option<String>,
}

/// The `add` flow with its injected collaborators
pub struct AddFlow<'a> {
    runner: &'a dyn CommandRunner,
    env: SystemEnvironment,
    prompt: &'a dyn OperatorPrompt,
}

/// Owner and repository name segments of a GitHub URL
fn repo_owner_and_name(url: &str) -> (String, String) {
    let trimmed = url.trim_end_matches('/').trim_end_matches(".git");
    let mut parts = trimmed.rsplit(['/', ':']);
    let name = parts.next().unwrap_or("").to_string();
    let owner = parts.next().unwrap_or("").to_string();
    (owner, name)
}

impl<'a> AddFlow<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        env: SystemEnvironment,
        prompt: &'a dyn OperatorPrompt,
    ) -> Self {
        Self {
            runner,
            env,
            prompt,
        }
    }

    pub async fn run(&self, options: &AddOptions) -> Result<AddReport, PublishError> {
        let mut guard = ResourceGuard::new();
        let npm = NpmClient::new(self.runner);

        // Step 1: workspace and umbrella package
        let base = match &options.workspace_folder {
            Some(dir) => dir.clone(),
            None => {
                if options.dont_publish {
                    return Err(PublishError::Configuration {
                        message: "dontPublishはworkspaceFolderが設定されている場合のみ使用できます"
                            .to_string(),
                    });
                }
                guard.adopt_temp_dir(tempfile::TempDir::new()?)
            }
        };
        let workspace = base.join(format!("{}_workspace", options.name));
        fs::create_dir_all(&workspace).await?;
        println!("🗂  Using workspace {}", workspace.display());

        println!("📦 Install and download of {}", options.name);
        let workspace_package = workspace.join("package.json");
        if !workspace_package.exists() {
            fs::write(&workspace_package, "{}").await?;
        }
        npm.install_latest(&workspace, &options.name).await?;

        let umbrella_dir = workspace.join("node_modules").join(&options.name);
        let umbrella: UmbrellaManifest = manifest::load(&umbrella_dir.join("package.json")).await?;

        let sub_package_name = self
            .resolve_sub_package_name(options, &umbrella_dir)
            .await?;

        // Step 2: previous sub-package version, when one exists
        println!("📦 Install/update of subPackage {}", sub_package_name);
        let found_previous = npm
            .install_latest(&workspace, &sub_package_name)
            .await
            .is_ok();
        if !found_previous {
            println!("⚠️  Could not find previous version of this subpackage. Assuming this is the first version.");
            if options.force_update {
                return Err(PublishError::InvalidOperation {
                    message: format!(
                        "初回リリースではfupdateを使用できません（{}の既存バージョンが見つかりません）",
                        sub_package_name
                    ),
                });
            }
        }

        let sub_workspace = workspace.join("node_modules").join(&sub_package_name);
        let mut sub: SubPackageManifest = if found_previous {
            manifest::load(&sub_workspace.join("package.json")).await?
        } else {
            SubPackageManifest::default()
        };
        fs::create_dir_all(&sub_workspace).await?;
        sub.name.get_or_insert_with(|| sub_package_name.clone());

        // Step 3: main binary location
        let main_binary =
            umbrella
                .binary_names
                .first()
                .cloned()
                .ok_or_else(|| PublishError::Configuration {
                    message: format!("{}のbinaryNamesが空です", options.name),
                })?;
        let binary_path = match &options.binary_path {
            Some(path) => path.clone(),
            None => locator::find_executable(&main_binary).ok_or_else(|| {
                PublishError::NotFound {
                    name: main_binary.clone(),
                    candidates: vec!["$PATH".to_string()],
                }
            })?,
        };
        println!("✅ Found binary at {}", binary_path.display());

        // Step 4: new version and the version gate
        let previous_version = sub.version.clone();
        let new_version = if let Some(version) = &options.version_override {
            version.clone()
        } else if options.force_update {
            BinaryVersion::parse(previous_version.as_deref().unwrap_or("0.0.0"))
                .bump(VersionComponent::Patch)
                .to_string()
        } else {
            let output = self.runner.run_binary(&binary_path, &["--version"]).await?;
            version::extract_version(&output).ok_or_else(|| PublishError::Configuration {
                message: format!(
                    "{} --version の出力からバージョンを抽出できません",
                    binary_path.display()
                ),
            })?
        };
        let version_unchanged = previous_version.as_deref() == Some(new_version.as_str());
        println!(
            "🔢 Going from version {} to {}",
            previous_version.as_deref().unwrap_or("(none)"),
            new_version
        );
        sub.version = Some(new_version.clone());

        // Step 5: stage binaries and auxiliary files
        let binary_dir = binary_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let file_locator = FileLocator::new(binary_dir, self.env.clone());

        let mut binaries = BTreeMap::new();
        let mut files = sub.files.clone();
        let all_names = manifest::unique(
            umbrella
                .binary_names
                .iter()
                .cloned()
                .chain(umbrella.additional_files.iter().cloned())
                .chain(options.additional_files.iter().cloned()),
        );
        for name in &all_names {
            let resolved = file_locator.locate(name)?;
            let file_name = file_locator.staged_name(&resolved);
            if umbrella.binary_names.contains(name) {
                binaries.insert(name.clone(), file_name.clone());
            }
            fs::copy(&resolved, sub_workspace.join(&file_name)).await?;
            files.push(file_name);
        }

        // Step 6: runtime shim
        fs::write(
            sub_workspace.join("index.js"),
            templates::sub_package_shim(&binaries),
        )
        .await?;
        files.push("index.js".to_string());
        sub.main = Some("index.js".to_string());

        // Step 7: sub-package descriptor
        sub.description = Some(templates::sub_package_description(&options.name));
        if sub.author.is_none() {
            let user = self
                .runner
                .run("git", &["config", "--global", "user.name"], None)
                .await?;
            let email = self.runner.run("git", &["config", "user.email"], None).await?;
            sub.author = Some(format!("{} <{}>", user, email));
        }
        sub.homepage = umbrella.url_source.clone();
        if let Some(git_source) = &umbrella.git_source {
            sub.repository = Some(Repository::git(git_source.clone()));
        }
        sub.os = vec![self.env.platform.clone()];
        sub.cpu = vec![self.env.arch.clone()];
        sub.files = manifest::unique(files);

        fs::write(
            sub_workspace.join("README.md"),
            templates::sub_package_readme(
                sub.description.as_deref().unwrap_or(""),
                &options.name,
                &options.name,
            ),
        )
        .await?;
        manifest::save(&sub_workspace.join("package.json"), &sub).await?;

        // Step 8: reconcile a disposable clone of the umbrella repo
        let upstream_url = umbrella
            .repository
            .as_ref()
            .map(|r| r.url().to_string())
            .ok_or_else(|| PublishError::Manifest {
                message: format!("{}のpackage.jsonにrepositoryがありません", options.name),
            })?;

        let user_name = match &options.user_name {
            Some(user) => user.clone(),
            None => {
                self.runner
                    .run("git", &["config", "--global", "user.name"], None)
                    .await?
            }
        };
        println!(
            "✅ Found git username as \"{}\", assuming this is your github username.",
            user_name
        );

        println!("🔄 Syncing base repo ({})", upstream_url);
        let default_fork_url = format!("git@github.com:{}/{}.git", user_name, options.name);
        let clone = GitWorkspace::ensure_clone(self.runner, &workspace, &upstream_url).await?;
        let report = Reconciler::new(&clone)
            .reconcile(&upstream_url, &default_fork_url)
            .await?;

        // Step 9: registry entry and umbrella descriptor update
        println!("📝 Updating base repo config to point to our package");
        let sources_path = clone.dir().join(SOURCES_FILE);
        let sources_text = fs::read_to_string(&sources_path).await?;
        let mut registry = sources::decode(&sources_text)?;
        registry.insert(
            sub_package_name.clone(),
            SourceEntry {
                system_info: self.env.system_info(),
                package_name: sub_package_name.clone(),
                binaries: binaries.clone(),
            },
        );
        fs::write(&sources_path, sources::encode(&sources_text, &registry)?).await?;

        let clone_package_path = clone.dir().join("package.json");
        let mut clone_package: UmbrellaManifest = manifest::load(&clone_package_path).await?;
        clone_package
            .optional_dependencies
            .insert(sub_package_name.clone(), new_version.clone());
        clone_package.version = Some(
            BinaryVersion::parse(clone_package.version.as_deref().unwrap_or("0.0.0"))
                .bump(options.bump)
                .to_string(),
        );
        manifest::save(&clone_package_path, &clone_package).await?;

        // Step 10
        clone
            .commit_if_changed(&format!("Version {}", new_version))
            .await?;

        // Step 11: operator-gated fork creation
        let mut pull_request_url = None;
        if report.fork_url != upstream_url {
            let (upstream_owner, repo_name) = repo_owner_and_name(&upstream_url);
            let upstream_page = format!("https://github.com/{}/{}", upstream_owner, repo_name);

            while clone.push_dry_run().await.is_err() {
                println!(
                    "\n🔀 You must make a fork of the underlying repo to make your changes. \
                     A browser will be opened in a few seconds. CLICK FORK, come back here, \
                     and press enter."
                );
                tokio::time::sleep(Duration::from_secs(3)).await;
                if let Err(e) = browser::open_url(self.runner, &self.env, &upstream_page).await {
                    println!(
                        "⚠️  Failed to launch a browser ({}). Ensure {} exists.",
                        e, report.fork_url
                    );
                }
                println!(
                    "⏸  Press enter once the repo {} exists, and can be pushed to.",
                    report.fork_url
                );
                self.prompt.wait_for_enter().await;
            }
            println!("✅ Fork detected correctly.");

            pull_request_url = Some(format!(
                "https://github.com/{}/{}/pulls",
                user_name, repo_name
            ));
        }

        // Step 12: publishing gate
        let mut published = false;
        if options.dont_publish {
            println!("⏭️  Done setup. Publish the sub package with:");
            println!("    npm publish \"{}\"", sub_workspace.display());
            println!("    cd \"{}\" && git push", clone.dir().display());
            if let Some(url) = &pull_request_url {
                println!("    then pull request it to the main repo by visiting {}", url);
            }
        } else if version_unchanged {
            let gate = PublishError::VersionUnchanged {
                version: new_version.clone(),
            };
            println!("⚠️  {}", gate);
            for action in gate.suggested_actions() {
                println!("    - {}", action);
            }
            // Registry edits still reach the umbrella repo
            clone.push().await?;
        } else {
            println!("🚀 Publishing {}", sub_package_name);
            npm.publish(&sub_workspace).await?;
            clone.push().await?;
            published = true;

            if !npm.verify_published(&sub_package_name, &new_version).await? {
                println!("⚠️  Registry does not show the new version yet (propagation lag)");
            }

            if let Some(url) = &pull_request_url {
                println!(
                    "✅ NPM package created called {}, and fork pushed to. Opening pull request page at {}",
                    sub_package_name, url
                );
                let _ = browser::open_url(self.runner, &self.env, url).await;
            } else {
                println!(
                    "✅ NPM package created called {}, and repo {} pushed to.",
                    sub_package_name, upstream_url
                );
            }
        }

        Ok(AddReport {
            sub_package_name,
            version: new_version,
            version_unchanged,
            published,
            pull_request_url,
        })
    }

    /// Explicit override, registry match, or synthesized name, in that order
    async fn resolve_sub_package_name(
        &self,
        options: &AddOptions,
        umbrella_dir: &Path,
    ) -> Result<String, PublishError> {
        if let Some(name) = &options.sub_package_name {
            return Ok(name.clone());
        }

        let sources_path = umbrella_dir.join(SOURCES_FILE);
        if sources_path.exists() {
            let text = fs::read_to_string(&sources_path).await?;
            let registry = sources::decode(&text)?;
            if let Some((name, _)) = registry
                .iter()
                .find(|(_, entry)| self.env.matches(&entry.system_info))
            {
                return Ok(name.clone());
            }
        }

        // Only the first hyphen segment of the umbrella name; npm spam
        // detection rejects names with too many hyphenated words.
        let stem = options.name.split('-').next().unwrap_or(&options.name);
        Ok(format!("{}-{}-{}", stem, self.env.platform, self.env.arch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::command::testing::ScriptedRunner;
    use crate::orchestration::testing::AutoPrompt;
    use tempfile::TempDir;

    const UPSTREAM: &str = "https://github.com/someone/clang-wasm.git";

    fn env() -> SystemEnvironment {
        SystemEnvironment {
            platform: "linux".to_string(),
            arch: "x64".to_string(),
            exe_suffix: String::new(),
        }
    }

    /// Workspace with a pre-installed umbrella package, an existing clone
    /// and a fake binary, so no real npm or git is needed.
    struct Fixture {
        base: TempDir,
        binary_path: PathBuf,
    }

    impl Fixture {
        fn new(previous_sub_version: Option<&str>) -> Self {
            let base = TempDir::new().unwrap();
            let workspace = base.path().join("clang-wasm_workspace");

            let umbrella_dir = workspace.join("node_modules").join("clang-wasm");
            std::fs::create_dir_all(&umbrella_dir).unwrap();
            std::fs::write(
                umbrella_dir.join("package.json"),
                format!(
                    r#"{{
                        "name": "clang-wasm",
                        "version": "1.0.0",
                        "binaryNames": ["clang"],
                        "repository": {{"type": "git", "url": "{UPSTREAM}"}},
                        "urlSource": "https://llvm.org",
                        "gitSource": "https://github.com/llvm/llvm-project.git"
                    }}"#
                ),
            )
            .unwrap();
            std::fs::write(
                umbrella_dir.join(SOURCES_FILE),
                templates::sources_skeleton(),
            )
            .unwrap();

            if let Some(version) = previous_sub_version {
                let sub_dir = workspace.join("node_modules").join("clang-linux-x64");
                std::fs::create_dir_all(&sub_dir).unwrap();
                std::fs::write(
                    sub_dir.join("package.json"),
                    format!(r#"{{"name": "clang-linux-x64", "version": "{version}"}}"#),
                )
                .unwrap();
            }

            // An existing clone, so the flow never runs git clone
            let clone_dir = workspace.join("clang-wasm");
            std::fs::create_dir_all(clone_dir.join(".git")).unwrap();
            std::fs::write(clone_dir.join(SOURCES_FILE), templates::sources_skeleton()).unwrap();
            std::fs::write(
                clone_dir.join("package.json"),
                r#"{"name": "clang-wasm", "version": "1.0.0"}"#,
            )
            .unwrap();

            let binary_path = base.path().join("clang");
            std::fs::write(&binary_path, b"fake binary").unwrap();

            Self { base, binary_path }
        }

        fn runner(&self) -> ScriptedRunner {
            ScriptedRunner::new()
                .output(
                    "git remote -v",
                    &format!("origin\t{UPSTREAM} (fetch)\norigin\t{UPSTREAM} (push)"),
                )
                .output(
                    &format!("{} --version", self.binary_path.display()),
                    "clang version 17.0.6 (https://github.com/llvm/llvm-project)",
                )
                .output("git config --global user.name", "octocat")
                .output("git config user.email", "octocat@example.com")
                .output("git status --porcelain", " M sources.js\n M package.json")
        }

        fn options(&self) -> AddOptions {
            AddOptions {
                name: "clang-wasm".to_string(),
                workspace_folder: Some(self.base.path().to_path_buf()),
                binary_path: Some(self.binary_path.clone()),
                ..Default::default()
            }
        }

        fn clone_dir(&self) -> PathBuf {
            self.base
                .path()
                .join("clang-wasm_workspace")
                .join("clang-wasm")
        }

        fn sub_workspace(&self) -> PathBuf {
            self.base
                .path()
                .join("clang-wasm_workspace")
                .join("node_modules")
                .join("clang-linux-x64")
        }
    }

    #[tokio::test]
    async fn test_version_unchanged_stages_but_never_publishes() {
        let fixture = Fixture::new(Some("17.0.6"));
        let runner = fixture.runner();
        let prompt = AutoPrompt::default();
        let flow = AddFlow::new(&runner, env(), &prompt);

        let report = flow.run(&fixture.options()).await.unwrap();

        assert!(report.version_unchanged);
        assert!(!report.published);
        assert_eq!(report.version, "17.0.6");

        // Staging and registry update still happened
        assert!(fixture.sub_workspace().join("clang").exists());
        assert!(fixture.sub_workspace().join("index.js").exists());
        let sources_text =
            std::fs::read_to_string(fixture.clone_dir().join(SOURCES_FILE)).unwrap();
        let registry = sources::decode(&sources_text).unwrap();
        assert!(registry.contains_key("clang-linux-x64"));

        // Umbrella repo changes were pushed, but nothing was published
        let calls = runner.recorded_calls();
        assert!(calls.iter().any(|c| c == "git push"));
        assert!(!calls.iter().any(|c| c.starts_with("npm publish")));
    }

    #[tokio::test]
    async fn test_changed_version_publishes_and_pushes() {
        let fixture = Fixture::new(Some("17.0.5"));
        let runner = fixture.runner();
        let prompt = AutoPrompt::default();
        let flow = AddFlow::new(&runner, env(), &prompt);

        let report = flow.run(&fixture.options()).await.unwrap();

        assert!(!report.version_unchanged);
        assert!(report.published);
        assert_eq!(report.version, "17.0.6");
        assert_eq!(report.pull_request_url, None);

        let calls = runner.recorded_calls();
        assert!(calls.iter().any(|c| c == "npm publish"));
        assert!(calls.iter().any(|c| c == "git push"));

        // Pinned dependency and umbrella version bump landed in the clone
        let clone_package: UmbrellaManifest =
            manifest::load(&fixture.clone_dir().join("package.json"))
                .await
                .unwrap();
        assert_eq!(
            clone_package.optional_dependencies.get("clang-linux-x64"),
            Some(&"17.0.6".to_string())
        );
        assert_eq!(clone_package.version.as_deref(), Some("1.0.1"));
    }

    #[tokio::test]
    async fn test_force_update_requires_prior_version() {
        let fixture = Fixture::new(None);
        let runner = fixture
            .runner()
            .fail_on("npm install --save clang-linux-x64@latest");
        let prompt = AutoPrompt::default();
        let flow = AddFlow::new(&runner, env(), &prompt);

        let mut options = fixture.options();
        options.force_update = true;

        let result = flow.run(&options).await;
        assert!(matches!(
            result,
            Err(PublishError::InvalidOperation { .. })
        ));
    }

    #[tokio::test]
    async fn test_first_publish_defaults_to_probed_version() {
        let fixture = Fixture::new(None);
        let runner = fixture
            .runner()
            .fail_on("npm install --save clang-linux-x64@latest");
        let prompt = AutoPrompt::default();
        let flow = AddFlow::new(&runner, env(), &prompt);

        let mut options = fixture.options();
        options.dont_publish = true;

        let report = flow.run(&options).await.unwrap();
        assert_eq!(report.version, "17.0.6");
        assert!(!report.version_unchanged);
        assert!(!report.published);
    }

    #[tokio::test]
    async fn test_fork_path_reports_pull_request_url() {
        let fixture = Fixture::new(Some("17.0.6"));
        // Failed pull means no push access; the dry-run probe for fork
        // existence still succeeds, so the operator loop never runs.
        let runner = fixture.runner().fail_on("git pull");
        let prompt = AutoPrompt::default();
        let flow = AddFlow::new(&runner, env(), &prompt);

        let mut options = fixture.options();
        options.dont_publish = true;

        let report = flow.run(&options).await.unwrap();
        assert_eq!(
            report.pull_request_url.as_deref(),
            Some("https://github.com/octocat/clang-wasm/pulls")
        );
        assert_eq!(
            runner
                .recorded_calls()
                .iter()
                .filter(|c| *c == "git remote set-url origin git@github.com:octocat/clang-wasm.git")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_suppressed_publish_requires_workspace() {
        let fixture = Fixture::new(None);
        let runner = fixture.runner();
        let prompt = AutoPrompt::default();
        let flow = AddFlow::new(&runner, env(), &prompt);

        let mut options = fixture.options();
        options.workspace_folder = None;
        options.dont_publish = true;

        let result = flow.run(&options).await;
        assert!(matches!(result, Err(PublishError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_sub_name_resolved_from_registry_match() {
        let fixture = Fixture::new(None);

        // Register an entry for this system in the umbrella's sources.js
        let umbrella_sources = fixture
            .base
            .path()
            .join("clang-wasm_workspace")
            .join("node_modules")
            .join("clang-wasm")
            .join(SOURCES_FILE);
        let text = std::fs::read_to_string(&umbrella_sources).unwrap();
        let mut registry = sources::decode(&text).unwrap();
        registry.insert(
            "custom-sub".to_string(),
            SourceEntry {
                system_info: env().system_info(),
                package_name: "custom-sub".to_string(),
                binaries: BTreeMap::new(),
            },
        );
        std::fs::write(&umbrella_sources, sources::encode(&text, &registry).unwrap()).unwrap();

        let sub_dir = fixture
            .base
            .path()
            .join("clang-wasm_workspace")
            .join("node_modules")
            .join("custom-sub");
        std::fs::create_dir_all(&sub_dir).unwrap();
        std::fs::write(
            sub_dir.join("package.json"),
            r#"{"name": "custom-sub", "version": "17.0.6"}"#,
        )
        .unwrap();

        let runner = fixture.runner();
        let prompt = AutoPrompt::default();
        let flow = AddFlow::new(&runner, env(), &prompt);

        let mut options = fixture.options();
        options.dont_publish = true;

        let report = flow.run(&options).await.unwrap();
        assert_eq!(report.sub_package_name, "custom-sub");
    }

    #[test]
    fn test_repo_owner_and_name() {
        assert_eq!(
            repo_owner_and_name("https://github.com/someone/clang-wasm.git"),
            ("someone".to_string(), "clang-wasm".to_string())
        );
        assert_eq!(
            repo_owner_and_name("git@github.com:me/repo.git"),
            ("me".to_string(), "repo".to_string())
        );
    }
}
