//! Inbound event dispatch.
//!
//! Every frame is checked in a fixed order: envelope shape, event name,
//! sender role, open session (all but START), payload shape. The first
//! failure becomes the reply and nothing else happens.

use std::sync::Arc;

use rollcall_core::protocol::{MarkEcho, MarkPayload, StartPayload, StatusPayload};
use rollcall_core::{
    CoordinatorError, DirectoryError, DirectoryStore, EventKind, Identity, InboundEnvelope,
    OutboundEvent,
};
use tracing::{debug, info};

use super::finalizer::Finalizer;
use super::state::{SessionSlot, SessionState};
use crate::websocket::registry::ConnectionRegistry;

/// Applies inbound events to the session and fans results out.
pub struct EventRouter {
    directory: Arc<dyn DirectoryStore>,
    registry: Arc<ConnectionRegistry>,
    state: Arc<SessionState>,
    finalizer: Finalizer,
}

impl EventRouter {
    /// Create a router sharing `state` and `registry` with the server.
    pub fn new(
        directory: Arc<dyn DirectoryStore>,
        registry: Arc<ConnectionRegistry>,
        state: Arc<SessionState>,
    ) -> Self {
        let finalizer = Finalizer::new(Arc::clone(&directory), Arc::clone(&registry));
        Self {
            directory,
            registry,
            state,
            finalizer,
        }
    }

    /// Handle one text frame from `identity`.
    ///
    /// Returns the reply for the sender, if any. Broadcasts (SUMMARY,
    /// FINISH) and student notifications go out through the registry and
    /// are not returned.
    pub async fn route(&self, identity: &Identity, text: &str) -> Option<OutboundEvent> {
        match self.dispatch(identity, text).await {
            Ok(reply) => reply,
            Err(e) => {
                debug!(user_id = %identity.id, kind = e.error_kind(), "event rejected");
                Some(e.to_event())
            }
        }
    }

    async fn dispatch(
        &self,
        identity: &Identity,
        text: &str,
    ) -> Result<Option<OutboundEvent>, CoordinatorError> {
        let envelope = InboundEnvelope::parse(text)?;
        let kind = EventKind::from_name(&envelope.event).ok_or(CoordinatorError::UnknownEvent)?;
        if identity.role != kind.required_role() {
            return Err(CoordinatorError::Forbidden);
        }

        if !kind.requires_session() {
            return self.start(identity, &envelope).await.map(Some);
        }

        let mut slot = self.state.lock().await;
        let _ = slot.require()?;
        match kind {
            EventKind::Mark => self.mark(&envelope, &mut slot).await.map(Some),
            EventKind::QuerySelf => Ok(Some(query_self(identity, &envelope, &slot)?)),
            EventKind::Summary => {
                self.summary(&envelope, &slot).await?;
                Ok(None)
            }
            EventKind::Finish => {
                let _ = self.finalizer.finish(&mut slot, &envelope.event).await?;
                Ok(None)
            }
            // Handled above; a session is open here, so it would conflict.
            EventKind::Start => Err(CoordinatorError::SessionConflict),
        }
    }

    async fn start(
        &self,
        identity: &Identity,
        envelope: &InboundEnvelope,
    ) -> Result<OutboundEvent, CoordinatorError> {
        let payload: StartPayload = envelope.payload()?;
        if self.state.current().await.is_some() {
            return Err(CoordinatorError::SessionConflict);
        }

        let roster = self
            .directory
            .find_class(&payload.class_id)
            .await
            .map_err(|e| match e {
                DirectoryError::NotFound(_) => CoordinatorError::ClassNotFound,
                DirectoryError::Unavailable(detail) => {
                    CoordinatorError::PersistenceFailure { detail }
                }
            })?;
        if roster.teacher_id != identity.id {
            return Err(CoordinatorError::Forbidden);
        }

        let mut slot = self.state.lock().await;
        let snapshot = slot.start(&roster)?.snapshot();
        info!(
            class_id = %snapshot.class_id,
            teacher_id = %identity.id,
            roster = roster.len(),
            "session started"
        );
        Ok(OutboundEvent::new(envelope.event.as_str(), &snapshot))
    }

    async fn mark(
        &self,
        envelope: &InboundEnvelope,
        slot: &mut SessionSlot<'_>,
    ) -> Result<OutboundEvent, CoordinatorError> {
        let payload: MarkPayload = envelope.payload()?;
        slot.mark(payload.student_id.clone(), payload.status)?;

        let notice = OutboundEvent::new(
            envelope.event.as_str(),
            &StatusPayload::from_status(Some(payload.status)),
        );
        let delivered = self.registry.send_to(&payload.student_id, &notice).await;
        debug!(student_id = %payload.student_id, status = %payload.status, delivered, "marked");

        Ok(OutboundEvent::new(
            envelope.event.as_str(),
            &MarkEcho {
                student_id: payload.student_id,
                status: payload.status,
            },
        ))
    }

    async fn summary(
        &self,
        envelope: &InboundEnvelope,
        slot: &SessionSlot<'_>,
    ) -> Result<(), CoordinatorError> {
        let tally = slot.require()?.live_tally();
        let _ = self
            .registry
            .broadcast_all(&OutboundEvent::new(envelope.event.as_str(), &tally))
            .await;
        Ok(())
    }
}

fn query_self(
    identity: &Identity,
    envelope: &InboundEnvelope,
    slot: &SessionSlot<'_>,
) -> Result<OutboundEvent, CoordinatorError> {
    let status = slot.require()?.status_of(&identity.id);
    Ok(OutboundEvent::new(
        envelope.event.as_str(),
        &StatusPayload::from_status(status),
    ))
}
