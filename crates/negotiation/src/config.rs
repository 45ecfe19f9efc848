//! Configuration for the negotiation layer.

use std::env;

/// Default number of compare-and-swap attempts per write.
pub const DEFAULT_MAX_CAS_ATTEMPTS: u32 = 5;

/// Acknowledgement sent after a customer's first message in a thread.
pub const DEFAULT_AUTO_REPLY_TEXT: &str = "Thank you for reaching out! Your message has been received. \
Our expert will review and respond shortly. Please wait for the admin to reply.";

/// Negotiation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationConfig {
    /// Attempts before a write gives up with a conflict. At least 1.
    pub max_cas_attempts: u32,

    /// Text of the system acknowledgement.
    pub auto_reply_text: String,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            max_cas_attempts: DEFAULT_MAX_CAS_ATTEMPTS,
            auto_reply_text: DEFAULT_AUTO_REPLY_TEXT.to_string(),
        }
    }
}

impl NegotiationConfig {
    /// Load settings from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `QUOTE_DESK_MAX_CAS_ATTEMPTS` | Attempts per write before a conflict is reported | `5` |
    /// | `QUOTE_DESK_AUTO_REPLY_TEXT` | Acknowledgement for a customer's first message | built-in text |
    ///
    /// Unparseable or zero values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(attempts) = lookup("QUOTE_DESK_MAX_CAS_ATTEMPTS")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|attempts| *attempts > 0)
        {
            config.max_cas_attempts = attempts;
        }

        if let Some(text) = lookup("QUOTE_DESK_AUTO_REPLY_TEXT")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
        {
            config.auto_reply_text = text;
        }

        config
    }

    /// Override the retry budget.
    pub fn with_max_cas_attempts(mut self, attempts: u32) -> Self {
        self.max_cas_attempts = attempts.max(1);
        self
    }
}
