use std::{fmt, sync::Arc};

use shared::{
    domain::{ModifiableParameter, ParameterChange, ShotId},
    protocol::{Shot, ShotSpec},
};
use tokio::{
    sync::{broadcast, watch, Mutex},
    task::JoinSet,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    error::{ClientError, SessionError},
    store::ShotStore,
    transport::ShotBackend,
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Creating,
    Modifying {
        shot_id: ShotId,
        parameter: ModifiableParameter,
    },
}

impl SessionPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, SessionPhase::Idle)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Idle => f.write_str("idle"),
            SessionPhase::Creating => f.write_str("creating shot"),
            SessionPhase::Modifying { shot_id, parameter } => {
                write!(f, "modifying {parameter} on {shot_id}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Notice(Notice),
    StaleResponseDiscarded {
        target: ShotId,
        active: Option<ShotId>,
        received: ShotId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModifyOutcome {
    Applied(Shot),
    Discarded(Shot),
}

impl ModifyOutcome {
    pub fn shot(&self) -> &Shot {
        match self {
            ModifyOutcome::Applied(shot) | ModifyOutcome::Discarded(shot) => shot,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, ModifyOutcome::Applied(_))
    }
}

/// Holds the phase for one mutation; dropping it always returns to idle.
struct MutationTicket<'a> {
    phase: &'a watch::Sender<SessionPhase>,
    request_id: Uuid,
}

impl Drop for MutationTicket<'_> {
    fn drop(&mut self) {
        self.phase.send_replace(SessionPhase::Idle);
        debug!(request_id = %self.request_id, "session: phase released");
    }
}

pub struct SessionController {
    backend: Arc<dyn ShotBackend>,
    store: Arc<ShotStore>,
    phase: watch::Sender<SessionPhase>,
    refreshes: Mutex<JoinSet<()>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(backend: Arc<dyn ShotBackend>, store: Arc<ShotStore>) -> Arc<Self> {
        let (phase, _) = watch::channel(SessionPhase::Idle);
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            backend,
            store,
            phase,
            refreshes: Mutex::new(JoinSet::new()),
            events,
        })
    }

    pub fn store(&self) -> &Arc<ShotStore> {
        &self.store
    }

    pub fn backend(&self) -> &Arc<dyn ShotBackend> {
        &self.backend
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase.borrow().clone()
    }

    pub fn watch_phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn bootstrap(&self) -> Result<usize, SessionError> {
        match self.store.refresh_library(self.backend.as_ref()).await {
            Ok(len) => Ok(len),
            Err(err) => {
                warn!(error = %err, "session: initial library load failed");
                Err(err.into())
            }
        }
    }

    pub async fn refresh_library(&self) -> Result<usize, SessionError> {
        self.store
            .refresh_library(self.backend.as_ref())
            .await
            .map_err(|err| {
                warn!(error = %err, "session: library refresh failed");
                SessionError::from(err)
            })
    }

    pub async fn create_shot(&self, spec: ShotSpec) -> Result<Shot, SessionError> {
        if let Err(err) = spec.validate() {
            self.notify_error("Please describe your scene", false);
            return Err(err.into());
        }

        let ticket = self.begin(SessionPhase::Creating)?;
        info!(
            request_id = %ticket.request_id,
            shot_type = %spec.shot_type,
            aspect_ratio = %spec.aspect_ratio,
            hdr_preset = %spec.hdr_preset,
            "session: creating shot"
        );

        let shot = match self.backend.create_shot(&spec).await {
            Ok(shot) => shot,
            Err(err) => {
                error!(request_id = %ticket.request_id, error = %err, "session: shot creation failed");
                drop(ticket);
                self.notify_failure(&err, "Failed to create shot");
                return Err(err.into());
            }
        };

        self.store.set_active(shot.clone()).await;
        info!(request_id = %ticket.request_id, shot_id = %shot.shot_id, "session: shot created");
        drop(ticket);

        self.notify_success("Shot created successfully!");
        self.spawn_library_refresh("create").await;
        Ok(shot)
    }

    pub async fn modify_active_raw(
        &self,
        parameter: &str,
        value: &str,
    ) -> Result<ModifyOutcome, SessionError> {
        let change = match ParameterChange::parse(parameter, value) {
            Ok(change) => change,
            Err(err) => {
                self.notify_error(err.to_string(), false);
                return Err(err.into());
            }
        };
        self.modify_active(change).await
    }

    pub async fn modify_active(&self, change: ParameterChange) -> Result<ModifyOutcome, SessionError> {
        let Some(before) = self.store.active().await else {
            debug!(%change, "session: modify ignored without an active shot");
            return Err(SessionError::NoActiveShot);
        };
        let target = before.shot_id.clone();

        let ticket = self.begin(SessionPhase::Modifying {
            shot_id: target.clone(),
            parameter: change.parameter(),
        })?;
        info!(
            request_id = %ticket.request_id,
            shot_id = %target,
            parameter = %change.parameter(),
            value = change.value(),
            "session: modifying parameter"
        );

        let shot = match self.backend.modify_parameter(&target, change).await {
            Ok(shot) => shot,
            Err(err) => {
                error!(
                    request_id = %ticket.request_id,
                    shot_id = %target,
                    parameter = %change.parameter(),
                    error = %err,
                    "session: parameter modification failed"
                );
                drop(ticket);
                self.notify_failure(&err, "Failed to modify parameter");
                return Err(err.into());
            }
        };

        check_isolation(&before, &shot, change);

        let outcome = match self.store.replace_active_if(&target, shot.clone()).await {
            Ok(()) => {
                info!(request_id = %ticket.request_id, shot_id = %shot.shot_id, "session: parameter applied");
                ModifyOutcome::Applied(shot)
            }
            Err(shot) => {
                let active = self.store.active_id().await;
                warn!(
                    request_id = %ticket.request_id,
                    target = %target,
                    active = active.as_ref().map(ShotId::as_str).unwrap_or("none"),
                    "session: discarding modify response for a shot that is no longer active"
                );
                let _ = self.events.send(SessionEvent::StaleResponseDiscarded {
                    target,
                    active,
                    received: shot.shot_id.clone(),
                });
                ModifyOutcome::Discarded(shot)
            }
        };
        drop(ticket);

        if outcome.was_applied() {
            self.notify_success(format!("{} modified!", change.parameter().title()));
        }
        self.spawn_library_refresh("modify").await;
        Ok(outcome)
    }

    pub async fn open_shot(&self, shot_id: &ShotId) -> Result<Shot, SessionError> {
        match self.backend.get_shot(shot_id).await {
            Ok(shot) => {
                self.store.set_active(shot.clone()).await;
                Ok(shot)
            }
            Err(err) => {
                warn!(shot_id = %shot_id, error = %err, "session: failed to load shot");
                self.notify_failure(&err, "Failed to load shot");
                Err(err.into())
            }
        }
    }

    /// Waits for every library refresh spawned so far.
    pub async fn settle(&self) {
        let mut pending = std::mem::take(&mut *self.refreshes.lock().await);
        while let Some(joined) = pending.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "session: library refresh task aborted");
            }
        }
    }

    fn begin(&self, next: SessionPhase) -> Result<MutationTicket<'_>, SessionError> {
        let mut current = None;
        let accepted = self.phase.send_if_modified(|phase| {
            if phase.is_idle() {
                *phase = next;
                true
            } else {
                current = Some(phase.clone());
                false
            }
        });
        if !accepted {
            let current = current.unwrap_or_default();
            debug!(phase = %current, "session: mutation rejected while busy");
            return Err(SessionError::Busy(current));
        }
        Ok(MutationTicket {
            phase: &self.phase,
            request_id: Uuid::new_v4(),
        })
    }

    async fn spawn_library_refresh(&self, reason: &'static str) {
        let store = self.store.clone();
        let backend = self.backend.clone();
        let mut refreshes = self.refreshes.lock().await;
        while refreshes.try_join_next().is_some() {}
        refreshes.spawn(async move {
            if let Err(err) = store.refresh_library(backend.as_ref()).await {
                warn!(reason, error = %err, "session: library refresh failed; keeping cached library");
            }
        });
    }

    fn notify_success(&self, message: impl Into<String>) {
        self.publish(Notice {
            level: NoticeLevel::Success,
            message: message.into(),
            retryable: false,
        });
    }

    fn notify_error(&self, message: impl Into<String>, retryable: bool) {
        self.publish(Notice {
            level: NoticeLevel::Error,
            message: message.into(),
            retryable,
        });
    }

    fn notify_failure(&self, err: &ClientError, fallback: &str) {
        self.notify_error(err.user_message(fallback), err.is_retryable());
    }

    fn publish(&self, notice: Notice) {
        let _ = self.events.send(SessionEvent::Notice(notice));
    }
}

fn check_isolation(before: &Shot, after: &Shot, change: ParameterChange) {
    let unexpected: Vec<ModifiableParameter> = before
        .changed_parameters(after)
        .into_iter()
        .filter(|parameter| *parameter != change.parameter())
        .collect();
    if !unexpected.is_empty() {
        warn!(
            shot_id = %after.shot_id,
            requested = %change.parameter(),
            unexpected = ?unexpected,
            "session: modify response changed unrelated parameters"
        );
    }

    let drift = before.identity_drift(after);
    if !drift.is_empty() {
        warn!(shot_id = %after.shot_id, fields = ?drift, "session: modify response changed creation fields");
    }

    if let Some(reported) = after.parameter(change.parameter()) {
        if reported != change.value() {
            warn!(
                shot_id = %after.shot_id,
                parameter = %change.parameter(),
                requested = change.value(),
                reported,
                "session: backend reported a different value than requested"
            );
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
