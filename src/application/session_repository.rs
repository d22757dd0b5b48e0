// Repository trait for completed-session persistence
use crate::domain::session::Session;
use async_trait::async_trait;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Load the stored session history, most recent first
    async fn load(&self) -> anyhow::Result<Vec<Session>>;

    /// Replace the stored session history
    async fn save(&self, sessions: &[Session]) -> anyhow::Result<()>;
}
