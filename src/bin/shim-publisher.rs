//! shim-publisher CLI
//!
//! Packages platform-specific binaries as npm packages: an umbrella package
//! with a runtime shim, per-system sub-packages, and a generated registry
//! tying them together.

use anyhow::Result;
use clap::{Parser, Subcommand};
use shim_publisher::core::config::PublisherConfig;
use shim_publisher::core::environment::SystemEnvironment;
use shim_publisher::core::error::PublishError;
use shim_publisher::core::version::VersionComponent;
use shim_publisher::git::command::SystemCommandRunner;
use shim_publisher::orchestration::{
    add::{AddFlow, AddOptions},
    init::{self, InitOptions},
    repub::{self, RepubOptions},
    StdinPrompt,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process;

/// Binary-to-npm publishing assistant
#[derive(Parser)]
#[command(name = "shim-publisher")]
#[command(version = "0.1.0")]
#[command(about = "Binary-to-npm publishing assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare a git repository as the umbrella package
    Init {
        /// Umbrella package name
        #[arg(value_name = "NAME")]
        name: String,

        /// Folder containing the umbrella repository (defaults to ./NAME)
        #[arg(long)]
        repo_folder: Option<PathBuf>,

        /// Logical binary names to expose
        #[arg(long = "bins", value_delimiter = ',')]
        binary_names: Vec<String>,

        /// Extra file names shipped alongside every binary
        #[arg(long = "add-files", value_delimiter = ',')]
        additional_files: Vec<String>,

        /// Source repository of the original binary (must end in .git)
        #[arg(long)]
        git_source: Option<String>,

        /// Homepage of the original binary's project
        #[arg(long)]
        url_source: Option<String>,

        /// Increment the minor version component
        #[arg(long)]
        minor: bool,

        /// Increment the major version component
        #[arg(long)]
        major: bool,

        /// Suppress publishing and pushing (run publish.sh manually)
        #[arg(long = "nopub")]
        dont_publish: bool,
    },

    /// Publish this system's binaries as a sub-package
    Add {
        /// Umbrella package name
        #[arg(value_name = "NAME")]
        name: String,

        /// Sub-package name override
        #[arg(long = "sub-name")]
        sub_package_name: Option<String>,

        /// Folder for intermediate files (defaults to a temp dir)
        #[arg(long)]
        workspace_folder: Option<PathBuf>,

        /// Explicit path of the main binary
        #[arg(long)]
        binary_path: Option<PathBuf>,

        /// Extra file names to stage
        #[arg(long = "add-files", value_delimiter = ',')]
        additional_files: Vec<String>,

        /// Exact version to publish, skipping the --version probe
        #[arg(long = "version-override", alias = "set-version")]
        version_override: Option<String>,

        /// Force a patch bump over the previous published version
        #[arg(long = "fupdate")]
        force_update: bool,

        /// Increment the umbrella's minor version component
        #[arg(long)]
        minor: bool,

        /// Increment the umbrella's major version component
        #[arg(long)]
        major: bool,

        /// Suppress publishing and pushing
        #[arg(long = "nopub")]
        dont_publish: bool,

        /// GitHub user name override
        #[arg(long)]
        user_name: Option<String>,
    },

    /// Republish the umbrella package after remote changes
    Repub {
        /// Umbrella package name
        #[arg(value_name = "NAME")]
        name: String,

        /// Folder containing the umbrella repository (defaults to ./NAME)
        #[arg(long)]
        repo_folder: Option<PathBuf>,
    },
}

fn bump(minor: bool, major: bool) -> VersionComponent {
    if major {
        VersionComponent::Major
    } else if minor {
        VersionComponent::Minor
    } else {
        VersionComponent::Patch
    }
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => process::exit(code),
        Err(e) => {
            if let Some(publish_error) = e.downcast_ref::<PublishError>() {
                eprintln!("\n❌ [{}] {}", publish_error.code(), publish_error);
                let actions = publish_error.suggested_actions();
                if !actions.is_empty() {
                    eprintln!("\n💡 対処方法:");
                    for action in actions {
                        eprintln!("  - {}", action);
                    }
                }
                process::exit(if publish_error.is_fatal() { 1 } else { 0 });
            }
            eprintln!("\n❌ Error");
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let runner = SystemCommandRunner::new();
    let env_vars: HashMap<String, String> = std::env::vars().collect();
    let config = PublisherConfig::load(&PathBuf::from("."), &env_vars).await?;

    match cli.command {
        Commands::Init {
            name,
            repo_folder,
            binary_names,
            additional_files,
            git_source,
            url_source,
            minor,
            major,
            dont_publish,
        } => {
            let options = InitOptions {
                repo_folder: repo_folder.unwrap_or_else(|| PathBuf::from(&name)),
                name,
                binary_names,
                additional_files,
                git_source,
                url_source,
                bump: bump(minor, major),
                dont_publish: dont_publish || config.dont_publish.unwrap_or(false),
            };
            init::init(&runner, &options).await?;
            Ok(0)
        }

        Commands::Add {
            name,
            sub_package_name,
            workspace_folder,
            binary_path,
            additional_files,
            version_override,
            force_update,
            minor,
            major,
            dont_publish,
            user_name,
        } => {
            let options = AddOptions {
                name,
                sub_package_name,
                workspace_folder: workspace_folder.or(config.workspace_folder.clone()),
                binary_path,
                additional_files,
                version_override,
                force_update,
                bump: bump(minor, major),
                dont_publish: dont_publish || config.dont_publish.unwrap_or(false),
                user_name: user_name.or(config.user_name.clone()),
            };

            let prompt = StdinPrompt;
            let flow = AddFlow::new(&runner, SystemEnvironment::current(), &prompt);
            let report = flow.run(&options).await?;

            println!(
                "\n📋 {} {} (published: {})",
                report.sub_package_name, report.version, report.published
            );
            if let Some(url) = &report.pull_request_url {
                println!("🔗 Pull request: {}", url);
            }
            Ok(0)
        }

        Commands::Repub { name, repo_folder } => {
            let options = RepubOptions {
                repo_folder: repo_folder.unwrap_or_else(|| PathBuf::from(&name)),
            };
            repub::repub(&runner, &options).await?;
            Ok(0)
        }
    }
}
