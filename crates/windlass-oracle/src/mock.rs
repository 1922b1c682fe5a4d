//! Mock oracle for testing decision workflows.
//!
//! Allows defining canned responses, enabling end-to-end testing of
//! planning, evaluation, and reflection without real model calls.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use windlass_core::{Error, IgnoreLock as _, Result};

use crate::oracle::{DecisionOracle, OraclePrompt};

/// Response storage type.
type ResponseQueue = Arc<Mutex<VecDeque<String>>>;

/// Oracle that replays scripted responses in order.
///
/// When the queue is empty the default response is returned; with no
/// default either, the call fails like a dead transport. Prompts are
/// recorded for verification.
#[derive(Clone, Default)]
pub struct MockOracle {
    /// Scripted responses, consumed front to back.
    responses: ResponseQueue,
    /// Fallback response once the queue is empty.
    default_response: Arc<Mutex<Option<String>>>,
    /// Every prompt received, in order.
    call_history: Arc<Mutex<Vec<OraclePrompt>>>,
}

impl MockOracle {
    /// Creates an oracle with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one scripted response.
    #[must_use]
    pub fn with_response(self, response: impl Into<String>) -> Self {
        {
            let mut responses = self.responses.lock_ignore_poison();
            responses.push_back(response.into());
        }
        self
    }

    /// Sets the fallback response for when the script runs out.
    #[must_use]
    pub fn with_default_response(self, response: impl Into<String>) -> Self {
        {
            let mut default = self.default_response.lock_ignore_poison();
            *default = Some(response.into());
        }
        self
    }

    /// Number of completions requested so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        let history = self.call_history.lock_ignore_poison();
        history.len()
    }

    /// Every prompt received, in order.
    #[must_use]
    pub fn call_history(&self) -> Vec<OraclePrompt> {
        let history = self.call_history.lock_ignore_poison();
        history.clone()
    }
}

#[async_trait]
impl DecisionOracle for MockOracle {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, prompt: &OraclePrompt) -> Result<String> {
        {
            let mut history = self.call_history.lock_ignore_poison();
            history.push(prompt.clone());
        }

        let scripted = {
            let mut responses = self.responses.lock_ignore_poison();
            responses.pop_front()
        };
        if let Some(response) = scripted {
            return Ok(response);
        }

        let default = self.default_response.lock_ignore_poison();
        default
            .clone()
            .ok_or_else(|| Error::Oracle("mock oracle script exhausted".to_owned()))
    }
}
