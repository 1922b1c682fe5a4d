use async_trait::async_trait;

use windlass_core::Result;

/// Structured context sent to the oracle for one request.
#[derive(Debug, Clone)]
pub struct OraclePrompt {
    /// Role instructions, including the wire-format contract.
    pub system: String,
    /// Request-specific context: objective, step metadata, recent results.
    pub user: String,
}

impl OraclePrompt {
    /// Creates a prompt from system and user parts.
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Appends a corrective reminder after a rejected response.
    #[must_use]
    pub fn with_reminder(mut self, reminder: &str) -> Self {
        self.user.push_str("\n\nREMINDER: ");
        self.user.push_str(reminder);
        self
    }
}

/// Transport seam to the language model making structured decisions.
///
/// Implementations return raw text; decoding and schema validation happen
/// in [`crate::OracleSession`], never in the transport.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    /// Returns the unique identifier for this oracle.
    fn name(&self) -> &'static str;

    /// Completes one prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails; malformed content is not an
    /// error at this layer.
    async fn complete(&self, prompt: &OraclePrompt) -> Result<String>;
}
