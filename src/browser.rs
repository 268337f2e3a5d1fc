//! Opening URLs in the operator's browser
//!
//! Used during the fork-creation loop: the fork page is opened for the
//! operator, who confirms on the console once GitHub has created the fork.

use crate::core::environment::SystemEnvironment;
use crate::core::error::PublishError;
use crate::git::command::CommandRunner;

/// The platform's URL opener command
///
/// Keyed by the Node-style platform names `SystemEnvironment` carries.
fn opener(platform: &str) -> &'static str {
    match platform {
        "win32" => "explorer",
        "darwin" => "open",
        _ => "xdg-open",
    }
}

/// Open `url` in the default browser
///
/// `explorer` on Windows exits non-zero even on success, so its exit
/// status is ignored.
pub async fn open_url(
    runner: &dyn CommandRunner,
    env: &SystemEnvironment,
    url: &str,
) -> Result<(), PublishError> {
    let command = opener(&env.platform);
    let result = runner.run(command, &[url], None).await;
    if env.platform == "win32" {
        return Ok(());
    }
    result?;
    Ok(())
}
