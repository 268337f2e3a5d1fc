//! Error handling for binary shim publishing
//!
//! This module provides comprehensive error types with recovery guidance
//! using the thiserror crate for ergonomic error handling.

use crate::git::command::CommandError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for shim publishing operations
#[derive(Error, Debug)]
pub enum PublishError {
    // Configuration errors
    #[error("設定エラー: {message}")]
    Configuration { message: String },

    #[error("Gitリポジトリが見つかりません: {path}")]
    MissingRepository { path: PathBuf },

    // Registry artifact errors
    #[error("生成ファイル内にマーカー {marker} が見つかりません。レジストリが破損しています")]
    CorruptRegistry { marker: String },

    #[error("レジストリのJSONを解析できません: {source}")]
    InvalidRegistryJson {
        #[source]
        source: serde_json::Error,
    },

    // Locator errors
    #[error("{name} が見つかりません。探した場所: {candidates:?}")]
    NotFound {
        name: String,
        candidates: Vec<String>,
    },

    // Operation errors
    #[error("無効な操作です: {message}")]
    InvalidOperation { message: String },

    // Not a hard error: a recognized terminal state that gates publishing
    #[error("バージョンが変更されていません（{version}）。公開はスキップされます")]
    VersionUnchanged { version: String },

    // External collaborator errors
    #[error("外部コマンドの実行に失敗しました")]
    ExternalProcess(#[from] CommandError),

    #[error("ネットワークエラーが発生しました: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ディスクリプタファイルの読み書きに失敗しました: {message}")]
    Manifest { message: String },

    #[error("I/Oエラー: {0}")]
    Io(#[from] std::io::Error),
}

impl PublishError {
    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::MissingRepository { .. } => "MISSING_REPOSITORY",
            Self::CorruptRegistry { .. } => "CORRUPT_REGISTRY",
            Self::InvalidRegistryJson { .. } => "CORRUPT_REGISTRY",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidOperation { .. } => "INVALID_OPERATION",
            Self::VersionUnchanged { .. } => "VERSION_UNCHANGED",
            Self::ExternalProcess(_) => "EXTERNAL_PROCESS_ERROR",
            Self::Http(_) => "NETWORK_ERROR",
            Self::Manifest { .. } => "MANIFEST_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Check if this error aborts the whole run
    ///
    /// `VersionUnchanged` is a recognized terminal state: it gates the
    /// publish step but staging and registry updates still complete.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::VersionUnchanged { .. })
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::Configuration { .. } => {
                vec!["コマンドライン引数と設定ファイルを確認してください"]
            }
            Self::MissingRepository { .. } => vec![
                "--repo-folderで.gitを含むフォルダを指定してください",
                "先にリポジトリをcloneしてください",
            ],
            Self::CorruptRegistry { .. } | Self::InvalidRegistryJson { .. } => vec![
                "アンブレラリポジトリのsources.jsを確認してください",
                "initコマンドで再生成できます",
            ],
            Self::NotFound { .. } => vec![
                "--binary-pathでバイナリの場所を明示してください",
                "バイナリがPATH上にあるか確認してください",
            ],
            Self::InvalidOperation { .. } => {
                vec!["初回公開では--fupdateを使用できません。--versionで明示してください"]
            }
            Self::VersionUnchanged { .. } => vec![
                "--fupdateでパッチバージョンを強制的に進められます",
                "--versionでバージョンを明示できます",
            ],
            Self::ExternalProcess(_) => vec![
                "コマンドの出力を確認してください",
                "gitとnpmがインストールされているか確認してください",
            ],
            Self::Http(_) => vec![
                "インターネット接続を確認してください",
                "しばらく待ってから再試行してください",
            ],
            Self::Manifest { .. } => {
                vec!["package.jsonの内容を確認してください"]
            }
            Self::Io(_) => vec!["ファイルパスと権限を確認してください"],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_repository_error() {
        let error = PublishError::MissingRepository {
            path: PathBuf::from("/tmp/nowhere/.git"),
        };

        assert_eq!(error.code(), "MISSING_REPOSITORY");
        assert!(error.is_fatal());
        assert!(!error.suggested_actions().is_empty());
    }

    #[test]
    fn test_corrupt_registry_error() {
        let error = PublishError::CorruptRegistry {
            marker: "// AUTO_GENERATED_SOURCES_START".to_string(),
        };

        assert_eq!(error.code(), "CORRUPT_REGISTRY");
        let display = format!("{}", error);
        assert!(display.contains("AUTO_GENERATED_SOURCES_START"));
    }

    #[test]
    fn test_not_found_lists_candidates() {
        let error = PublishError::NotFound {
            name: "wasm-ld".to_string(),
            candidates: vec![
                "wasm-ld".to_string(),
                "/usr/bin/wasm-ld".to_string(),
                "/usr/bin/wasm-ld.exe".to_string(),
            ],
        };

        let display = format!("{}", error);
        assert!(display.contains("wasm-ld"));
        assert!(display.contains("/usr/bin/wasm-ld.exe"));
    }

    #[test]
    fn test_version_unchanged_is_not_fatal() {
        let error = PublishError::VersionUnchanged {
            version: "1.2.3".to_string(),
        };

        assert!(!error.is_fatal());
        assert_eq!(error.code(), "VERSION_UNCHANGED");
        let actions = error.suggested_actions();
        assert!(actions.iter().any(|a| a.contains("fupdate")));
    }

    #[test]
    fn test_invalid_operation_error() {
        let error = PublishError::InvalidOperation {
            message: "fupdate requires a prior published version".to_string(),
        };

        assert!(error.is_fatal());
        assert_eq!(error.code(), "INVALID_OPERATION");
    }
}
