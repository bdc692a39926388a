use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};

use async_trait::async_trait;
use kiosk_camera::{CameraDevice, MediaStreamManager, VideoSink};
use kiosk_network::AttendanceBackend;
use kiosk_ops::ActivityLog;
use kiosk_types::{
    events::{CameraEvent, EventPayload, KioskEvent, LifecycleEvent, LifecyclePhase, PunchEvent},
    ui::{
        ElementId, Tone, ATTENDANCE_CONTROLS, ATTEND_STATUS, IDENTIFY_RESULT, PUNCH_IN_BUTTON,
        PUNCH_MESSAGE, PUNCH_OUT_BUTTON,
    },
    wire::{ActionOutcome, Identity, PunchAction},
    KioskError, Result,
};
use tracing::{info, warn};

use crate::{
    capture_payload, show_message, PageController, UiSurface, WorkflowSettings,
    CAMERA_UNAVAILABLE_MESSAGE,
};

const PAGE: &str = "attend";

pub const READY_STATUS: &str =
    "Camera ready. Look at the camera and blink when prompted, then Punch In or Punch Out.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendancePhase {
    CameraStarting,
    CameraUnavailable,
    CameraReady,
}

/// What the backend confirmed for a settled punch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PunchReceipt {
    pub action: PunchAction,
    pub message: String,
    pub identity: Option<Identity>,
}

/// Drives the punch-in / punch-out page.
///
/// The two controls are independent: each is disabled only while its own
/// request is in flight, and nothing orders a punch-in against a concurrent
/// punch-out.
pub struct AttendanceController<D: CameraDevice, B: AttendanceBackend> {
    settings: WorkflowSettings,
    streams: tokio::sync::Mutex<MediaStreamManager<D>>,
    sink: VideoSink,
    backend: B,
    surface: Arc<dyn UiSurface>,
    activity: ActivityLog,
    phase: Mutex<AttendancePhase>,
    in_flight: Mutex<HashSet<PunchAction>>,
}

fn control(action: PunchAction) -> ElementId {
    match action {
        PunchAction::In => PUNCH_IN_BUTTON,
        PunchAction::Out => PUNCH_OUT_BUTTON,
    }
}

impl<D: CameraDevice, B: AttendanceBackend> AttendanceController<D, B> {
    pub fn new(
        settings: WorkflowSettings,
        device: D,
        backend: B,
        surface: Arc<dyn UiSurface>,
        activity: ActivityLog,
    ) -> Self {
        Self {
            settings,
            streams: tokio::sync::Mutex::new(MediaStreamManager::new(device)),
            sink: VideoSink::new(),
            backend,
            surface,
            activity,
            phase: Mutex::new(AttendancePhase::CameraStarting),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn phase(&self) -> AttendancePhase {
        *self
            .phase
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_verifying(&self, action: PunchAction) -> bool {
        self.in_flight().contains(&action)
    }

    pub fn sink(&self) -> &VideoSink {
        &self.sink
    }

    fn set_phase(&self, phase: AttendancePhase) {
        *self
            .phase
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = phase;
    }

    fn in_flight(&self) -> MutexGuard<'_, HashSet<PunchAction>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_identify_result(&self, text: &str, tone: Tone) {
        self.surface.set_text(IDENTIFY_RESULT, text);
        self.surface.set_tone(IDENTIFY_RESULT, tone);
    }

    /// Captures the current frame and asks the backend to record `action`.
    /// The pressed control is re-enabled whatever the outcome.
    pub async fn punch(&self, action: PunchAction) -> Result<PunchReceipt> {
        self.begin_punch(action)?;
        let started = Instant::now();
        let result = self.verify(action).await;
        self.settle_punch(action, result, started).await
    }

    fn begin_punch(&self, action: PunchAction) -> Result<()> {
        let mut in_flight = self.in_flight();
        if in_flight.contains(&action) {
            return Err(KioskError::ControlBusy(format!(
                "{} already in flight",
                action.label()
            )));
        }
        if !self.sink.has_source() {
            show_message(
                self.surface.as_ref(),
                PUNCH_MESSAGE,
                "Camera not ready.",
                Tone::Error,
            );
            return Err(KioskError::CameraUnavailable("camera not ready".into()));
        }
        in_flight.insert(action);
        self.surface.set_disabled(control(action), true);
        self.set_identify_result("Verifying face and recording…", Tone::Neutral);
        Ok(())
    }

    async fn verify(&self, action: PunchAction) -> Result<ActionOutcome> {
        let payload = capture_payload(&self.settings.encoder, &self.sink, self.settings.transport)?;
        self.backend.punch(action, &payload).await
    }

    async fn settle_punch(
        &self,
        action: PunchAction,
        result: Result<ActionOutcome>,
        started: Instant,
    ) -> Result<PunchReceipt> {
        let settled = match result {
            Ok(ActionOutcome::Success { message, identity }) => {
                let message = message
                    .filter(|text| !text.is_empty())
                    .unwrap_or_else(|| "Recorded.".into());
                show_message(self.surface.as_ref(), PUNCH_MESSAGE, &message, Tone::Success);
                let who = identity
                    .as_ref()
                    .map(Identity::label)
                    .filter(|label| !label.is_empty())
                    .unwrap_or("unknown");
                self.set_identify_result(&format!("Identified: {who}"), Tone::Success);
                Ok(PunchReceipt {
                    action,
                    message,
                    identity,
                })
            }
            Ok(outcome @ ActionOutcome::Failure { .. }) => {
                let message = outcome.message().map(str::to_string);
                show_message(
                    self.surface.as_ref(),
                    PUNCH_MESSAGE,
                    message.as_deref().unwrap_or("Failed."),
                    Tone::Error,
                );
                let reason = message.unwrap_or_else(|| "No match or verification failed.".into());
                self.set_identify_result(&reason, Tone::Error);
                Err(KioskError::BackendRejected(reason))
            }
            Err(err) => {
                warn!("{} failed: {err}", action.label());
                let text = match err {
                    KioskError::EmptySink => "Camera not ready.",
                    KioskError::NetworkFailure(_) => "Network error.",
                    _ => "Could not capture a photo.",
                };
                show_message(self.surface.as_ref(), PUNCH_MESSAGE, text, Tone::Error);
                self.set_identify_result("Error.", Tone::Error);
                Err(err)
            }
        };

        self.surface.set_disabled(control(action), false);
        self.in_flight().remove(&action);

        let latency_ms = started.elapsed().as_millis() as u64;
        info!(
            "{} settled in {}ms (accepted={})",
            action.label(),
            latency_ms,
            settled.is_ok()
        );
        self.activity
            .record(KioskEvent::from_payload(EventPayload::Punch(PunchEvent {
                action,
                accepted: settled.is_ok(),
                identity: settled
                    .as_ref()
                    .ok()
                    .and_then(|receipt| receipt.identity.as_ref())
                    .map(|identity| identity.label().to_string()),
                message: match &settled {
                    Ok(receipt) => Some(receipt.message.clone()),
                    Err(err) => Some(err.to_string()),
                },
                latency_ms,
            })))
            .await;
        settled
    }
}

#[async_trait]
impl<D: CameraDevice, B: AttendanceBackend> PageController for AttendanceController<D, B> {
    fn page(&self) -> &'static str {
        PAGE
    }

    async fn load(&self) -> Result<()> {
        self.activity
            .record(KioskEvent::from_payload(EventPayload::Lifecycle(
                LifecycleEvent {
                    page: PAGE.into(),
                    phase: LifecyclePhase::Load,
                },
            )))
            .await;
        for id in ATTENDANCE_CONTROLS {
            self.surface.set_disabled(id, true);
        }
        self.set_phase(AttendancePhase::CameraStarting);

        let started = {
            let mut streams = self.streams.lock().await;
            streams.start(&self.sink, &self.settings.stream).await
        };
        let settled = match started {
            Ok(_) => {
                self.set_phase(AttendancePhase::CameraReady);
                self.surface.set_text(ATTEND_STATUS, READY_STATUS);
                for id in ATTENDANCE_CONTROLS {
                    self.surface.set_disabled(id, false);
                }
                Ok(())
            }
            Err(err) => {
                warn!("Attendance camera unavailable: {err}");
                self.set_phase(AttendancePhase::CameraUnavailable);
                self.surface.set_text(ATTEND_STATUS, CAMERA_UNAVAILABLE_MESSAGE);
                Err(err)
            }
        };

        self.activity
            .record(KioskEvent::from_payload(EventPayload::Camera(CameraEvent {
                started: settled.is_ok(),
                details: settled.as_ref().err().map(ToString::to_string),
            })))
            .await;
        settled
    }

    async fn unload(&self) {
        self.streams.lock().await.stop();
        self.activity
            .record(KioskEvent::from_payload(EventPayload::Lifecycle(
                LifecycleEvent {
                    page: PAGE.into(),
                    phase: LifecyclePhase::Unload,
                },
            )))
            .await;
    }
}
