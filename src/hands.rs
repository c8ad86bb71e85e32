use anyhow::Result;
use async_trait::async_trait;

use crate::types::EnvStatus;

/// The browser-side collaborator the agent acts on.
///
/// Implementations own truncation of observations, translation of action
/// strings into driver commands, and any wall-clock timeouts. An empty
/// action or a `note [..]` action must be accepted and must not reach the
/// underlying driver.
#[async_trait]
pub trait Environment: Send {
    /// Current page content, already simplified.
    async fn observation(&mut self) -> String;

    fn url(&self) -> String;

    /// Read once at the start of an episode.
    fn objective(&self) -> String;

    fn done(&self) -> bool;

    async fn step(&mut self, action: &str) -> Result<EnvStatus>;
}
