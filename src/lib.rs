pub mod browser;
pub mod core;
pub mod git;
pub mod locator;
pub mod npm;
pub mod orchestration;
pub mod registry;
pub mod templates;

pub use crate::core::*;
pub use git::{CommandError, CommandRunner, GitWorkspace, Reconciler, SystemCommandRunner};
pub use npm::{NpmClient, NpmRegistryInfo};
pub use orchestration::{
    AddFlow, AddOptions, AddReport, InitOptions, OperatorPrompt, RepubOptions, StdinPrompt,
};
pub use registry::{SourceEntry, SourcesRegistry, SubPackageManifest, UmbrellaManifest};
