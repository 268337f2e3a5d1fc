//! Flow orchestrators
//!
//! One module per CLI command. The orchestrators own the console output
//! and the step ordering; all effects go through the injected command
//! runner, so the flows are scripted end-to-end in tests.

pub mod add;
pub mod init;
pub mod repub;

pub use add::*;
pub use init::*;
pub use repub::*;

use async_trait::async_trait;

/// Seam for operator interaction during the fork-creation loop
#[async_trait]
pub trait OperatorPrompt: Send + Sync {
    /// Block until the operator presses Enter
    async fn wait_for_enter(&self);
}

/// Prompt backed by the process stdin
#[derive(Debug, Default)]
pub struct StdinPrompt;

#[async_trait]
impl OperatorPrompt for StdinPrompt {
    async fn wait_for_enter(&self) {
        use tokio::io::AsyncBufReadExt;
        let mut line = String::new();
        let mut reader = tokio::io::BufReader::new(tokio::io::stdin());
        let _ = reader.read_line(&mut line).await;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Prompt that returns immediately, counting invocations
    #[derive(Debug, Default)]
    pub struct AutoPrompt {
        pub waits: AtomicUsize,
    }

    #[async_trait]
    impl OperatorPrompt for AutoPrompt {
        async fn wait_for_enter(&self) {
            self.waits.fetch_add(1, Ordering::SeqCst);
        }
    }
}
