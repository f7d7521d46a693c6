use thiserror::Error;

/// Failure classes of the notification core.
///
/// Advice degradation is deliberately absent: the advice generator never
/// fails upward, it returns a placeholder string instead.
#[derive(Debug, Error)]
pub enum BotError {
    /// A free-text location could not be resolved. User-facing, no retry.
    #[error("location not found: {query}")]
    Resolution { query: String },

    /// A provider call failed (unreachable, timeout, non-success status).
    /// Surfaced to the chat inline; the tick is not retried before the
    /// next scheduled fire.
    #[error("provider request failed")]
    Transport(#[source] anyhow::Error),

    /// The subscription store could not be written. The triggering command
    /// must not register or cancel a scheduler job after this.
    #[error("subscription store write failed")]
    Persistence(#[source] anyhow::Error),
}

impl BotError {
    /// Short inline-styled message for the chat; never raw internals.
    pub fn user_message(&self) -> String {
        match self {
            BotError::Resolution { query } => {
                format!("<i>Location not found: {query}</i>")
            }
            BotError::Transport(source) => {
                format!("<i>Error: {source}</i>")
            }
            BotError::Persistence(_) => {
                "<i>Error: could not save your subscription, please try again.</i>".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
