//! Generated JavaScript and shell artifacts
//!
//! Everything the umbrella repository and the sub-packages need at install
//! or run time is JavaScript, because the packages are consumed through the
//! npm ecosystem. The text here is emitted once and then owned by the
//! repository; regeneration never overwrites an existing artifact.

use crate::registry::sources::{SOURCES_END_TAG, SOURCES_START_TAG};
use std::collections::BTreeMap;

/// Initial `sources.js` with an empty embedded registry
///
/// The returned text already parses with the registry codec.
pub fn sources_skeleton() -> String {
    format!(
        r#"module.exports = {{}};
module.exports.sources = function sources() {{
    /** @type {{
        [packageName: string]: {{
            // Ex, {{ platform: "win32", arch: "x64" }}. Every key is mapped
            //  to the value of process[key] and checked against the current
            //  system.
            systemInfo: {{ [key: string]: unknown }};
            // Exact name of npm package
            packageName: string;
            binaries: {{
                // Maps to the name of the file inside the package.
                [binaryName: string]: string
            }}
        }}
    }} */
    return (
        // Autogenerated. Don't modify this manually.
{start}
{{ }}
{end}
    )
    ;
}};"#,
        start = SOURCES_START_TAG,
        end = SOURCES_END_TAG,
    )
}

/// Umbrella runtime shim (`index.js`)
///
/// Scans the embedded registry for the first entry whose `systemInfo`
/// matches the running system and resolves binary paths through that
/// sub-package.
pub fn umbrella_shim() -> String {
    r#"let sources = require("./sources.js").sources();

function findPackage() {
    for (let key of Object.keys(sources).sort()) {
        let entry = sources[key];
        let matches = Object.keys(entry.systemInfo)
            .every(attr => process[attr] === entry.systemInfo[attr]);
        if (matches) {
            return entry;
        }
    }
    throw new Error(
        "No published binaries support this system ("
        + process.platform + "/" + process.arch + ")"
    );
}

module.exports = {
    getBinaryPath(name) {
        let entry = findPackage();
        let fileName = entry.binaries[name];
        if (!fileName) {
            throw new Error("Unknown binary " + JSON.stringify(name));
        }
        return require(entry.packageName + "/index.js").getBinaryPath(name);
    }
};
"#
    .to_string()
}

/// Per-binary launcher script (`<binary>.js`)
pub fn launcher_script(binary_name: &str) -> String {
    format!(
        r#"#!/usr/bin/env node
let path = require("./index.js").getBinaryPath("{binary_name}");
let args = process.argv.slice(2);
require("child_process").execFileSync(path, args, {{ stdio: "inherit" }});
"#
    )
}

/// Sub-package runtime shim (`index.js`)
///
/// `names_map` maps logical binary names to staged file names next to the
/// shim.
pub fn sub_package_shim(names_map: &BTreeMap<String, String>) -> String {
    let map_json =
        serde_json::to_string(names_map).unwrap_or_else(|_| "{}".to_string());
    format!(
        r#"
let namesMap = {map_json};
module.exports = {{
    getBinaryPath(name) {{
        return __dirname + "/" + namesMap[name];
    }}
}};
"#
    )
}

/// README for the umbrella package
pub fn umbrella_readme(name: &str, git_source: Option<&str>, url_source: Option<&str>) -> String {
    let mut text = format!(
        "Autogenerated readme. Allows use of {name} via an npm package install, \
         for use in cross platform scripts. Not affiliated with the {name} \
         project in any way."
    );
    if let Some(git_source) = git_source {
        text.push_str(&format!(
            " The source for the original binary is available at {git_source}"
        ));
    }
    if let Some(url_source) = url_source {
        text.push_str(&format!(
            " The site for the original binary is available at {url_source}"
        ));
    }
    text
}

/// README for one sub-package
pub fn sub_package_readme(description: &str, name: &str, umbrella_name: &str) -> String {
    format!(
        "{description}. Not affiliated with {name} in any way. Part of the \
         {umbrella_name} package (which is also not affiliated with {name})."
    )
}

/// Default description of the umbrella package
pub fn umbrella_description(name: &str) -> String {
    format!("Binary publish of {name}.")
}

/// Default description of one sub-package
pub fn sub_package_description(name: &str) -> String {
    format!(
        "Autogenerated package.json for {name} (only redistribution of the \
         binaries as an npm package, not affiliated with the project in any way)."
    )
}

/// Manual publish script, for suppressed-publish runs
pub fn publish_script() -> String {
    "git push\nnpm publish".to_string()
}
