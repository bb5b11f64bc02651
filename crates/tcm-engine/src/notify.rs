//! Best-effort notification.

use async_trait::async_trait;

use tcm_cases::CaseEventKind;
use tcm_core::CaseId;

use crate::error::PublishError;
use crate::ports::NotificationPublisher;

/// Publish `event`, logging and swallowing any failure.
pub(crate) async fn publish_best_effort(
    publisher: &dyn NotificationPublisher,
    case_id: CaseId,
    event: &CaseEventKind,
) {
    if let Err(e) = publisher.publish(case_id, event).await {
        tracing::warn!(
            case_id = %case_id,
            event = event.name(),
            error = %e,
            "case notification failed"
        );
    }
}

/// Publisher that writes events to the log. Used when no notification
/// channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

#[async_trait]
impl NotificationPublisher for LogPublisher {
    async fn publish(&self, case_id: CaseId, event: &CaseEventKind) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| PublishError::Unavailable(e.to_string()))?;
        tracing::info!(case_id = %case_id, event = event.name(), payload = %payload, "case event");
        Ok(())
    }
}
