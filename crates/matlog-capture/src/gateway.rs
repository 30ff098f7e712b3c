use anyhow::Result;
use async_trait::async_trait;
use matlog_schema::SessionRecord;
use uuid::Uuid;

/// Collaborator boundary for storage. The capture flow hands over one
/// finalized record and routes failures to its error state without
/// interpreting the reason; retries resend the identical record.
#[async_trait]
pub trait SaveGateway: Send + Sync {
    async fn save(&self, record: &SessionRecord) -> Result<Uuid>;
}
