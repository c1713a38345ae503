//! Configuration for group-chat orchestration runs

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Run-level configuration shared by the engine, adapters, and the judge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupChatConfig {
    /// Hard ceiling on total adapter invocations across the whole run
    pub maximum_iterations: usize,

    /// Number of trailing turns included in a judge query
    pub judge_window: usize,

    /// Timeout carried by every remote call (agent invocation and judge query)
    pub request_timeout: Duration,

    /// Model used for judged termination verdicts
    pub judge_model: String,
}

impl Default for GroupChatConfig {
    fn default() -> Self {
        Self {
            maximum_iterations: 12,
            judge_window: 4,
            request_timeout: Duration::from_secs(30),
            judge_model: "gpt-4o-mini".to_string(),
        }
    }
}
