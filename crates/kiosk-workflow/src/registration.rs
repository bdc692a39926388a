use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use kiosk_camera::{CameraDevice, MediaStreamManager, VideoSink};
use kiosk_network::{AttendanceBackend, ImagePayload};
use kiosk_ops::ActivityLog;
use kiosk_types::{
    events::{
        CameraEvent, CaptureEvent, EventPayload, KioskEvent, LifecycleEvent, LifecyclePhase,
        RegistrationEvent, RosterEvent,
    },
    frame::CapturedFrame,
    ui::{
        Tone, CAMERA, CAPTURE_BUTTON, NAME_INPUT, PREVIEW, REGISTER_MESSAGE, SNAPSHOT,
        REGISTRATION_CONTROLS, SUBMIT_BUTTON, USER_ID_INPUT,
    },
    wire::{ActionOutcome, RosterEntry},
    KioskError, Result,
};
use tracing::{info, warn};

use crate::{
    payload_for, roster::UserListEditor, show_message, workflow_error, PageController,
    UiSurface, WorkflowSettings, CAMERA_UNAVAILABLE_MESSAGE,
};

const PAGE: &str = "register";

fn capture_failure_message(err: &KioskError) -> &'static str {
    match err {
        KioskError::EmptySink => "Camera is still starting. Try again in a moment.",
        _ => "Could not capture a photo.",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationPhase {
    CameraStarting,
    CameraUnavailable,
    CameraReady,
    Captured,
    Submitting,
}

enum RegistrationState {
    CameraStarting,
    CameraUnavailable,
    CameraReady,
    Captured(CapturedFrame),
    Submitting(CapturedFrame),
}

impl RegistrationState {
    fn phase(&self) -> RegistrationPhase {
        match self {
            RegistrationState::CameraStarting => RegistrationPhase::CameraStarting,
            RegistrationState::CameraUnavailable => RegistrationPhase::CameraUnavailable,
            RegistrationState::CameraReady => RegistrationPhase::CameraReady,
            RegistrationState::Captured(_) => RegistrationPhase::Captured,
            RegistrationState::Submitting(_) => RegistrationPhase::Submitting,
        }
    }
}

/// Drives the enrollment page: capture a face, submit it with an identifier
/// and display name, and keep the roster list current.
pub struct RegistrationController<D: CameraDevice, B: AttendanceBackend> {
    settings: WorkflowSettings,
    streams: tokio::sync::Mutex<MediaStreamManager<D>>,
    sink: VideoSink,
    backend: B,
    surface: Arc<dyn UiSurface>,
    roster: UserListEditor,
    activity: ActivityLog,
    state: Mutex<RegistrationState>,
}

impl<D: CameraDevice, B: AttendanceBackend> RegistrationController<D, B> {
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
            roster: UserListEditor::new(surface.clone()),
            surface,
            activity,
            state: Mutex::new(RegistrationState::CameraStarting),
        }
    }

    pub fn phase(&self) -> RegistrationPhase {
        self.state().phase()
    }

    pub fn captured_frame(&self) -> Option<CapturedFrame> {
        match &*self.state() {
            RegistrationState::Captured(frame) | RegistrationState::Submitting(frame) => {
                Some(frame.clone())
            }
            _ => None,
        }
    }

    pub fn sink(&self) -> &VideoSink {
        &self.sink
    }

    pub fn roster(&self) -> &UserListEditor {
        &self.roster
    }

    fn state(&self) -> MutexGuard<'_, RegistrationState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, next: RegistrationState) {
        *self.state() = next;
    }

    async fn seed_roster(&self) {
        match self.backend.list_users().await {
            Ok(users) => {
                info!("Seeding roster with {} registered users", users.len());
                self.roster.seed(&users);
            }
            Err(err) => {
                warn!("Unable to list registered users: {err}");
                self.roster.refresh_empty_indicator();
            }
        }
    }

    async fn start_camera(&self) -> Result<()> {
        let started = {
            let mut streams = self.streams.lock().await;
            streams.start(&self.sink, &self.settings.stream).await
        };
        let settled = match started {
            Ok(_) => {
                self.set_state(RegistrationState::CameraReady);
                self.surface.set_disabled(CAPTURE_BUTTON, false);
                Ok(())
            }
            Err(err) => {
                warn!("Registration camera unavailable: {err}");
                self.set_state(RegistrationState::CameraUnavailable);
                show_message(
                    self.surface.as_ref(),
                    REGISTER_MESSAGE,
                    CAMERA_UNAVAILABLE_MESSAGE,
                    Tone::Error,
                );
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

    /// Snapshots the live view. Only valid while the camera is ready.
    pub async fn capture(&self) -> Result<CapturedFrame> {
        let frame = self.capture_into_state()?;

        self.surface.set_image(SNAPSHOT, Some(&frame.data_uri));
        self.surface.set_hidden(SNAPSHOT, false);
        self.surface.set_hidden(CAMERA, true);
        self.surface.set_image(PREVIEW, Some(&frame.data_uri));
        self.surface.set_hidden(PREVIEW, false);
        self.surface.set_disabled(SUBMIT_BUTTON, false);
        self.surface.set_hidden(REGISTER_MESSAGE, true);

        self.activity
            .record(KioskEvent::from_payload(EventPayload::Capture(CaptureEvent {
                width: frame.width,
                height: frame.height,
                encoded_len: frame.data_uri.len(),
            })))
            .await;
        Ok(frame)
    }

    fn capture_into_state(&self) -> Result<CapturedFrame> {
        let mut state = self.state();
        if !matches!(*state, RegistrationState::CameraReady) {
            return Err(workflow_error(format!(
                "capture is not available while {:?}",
                state.phase()
            )));
        }
        if !self.sink.has_source() {
            return Err(KioskError::CameraUnavailable(
                "camera stream is not attached".into(),
            ));
        }
        let frame = match self.settings.encoder.capture_frame(&self.sink) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("Capture failed: {err}");
                show_message(
                    self.surface.as_ref(),
                    REGISTER_MESSAGE,
                    capture_failure_message(&err),
                    Tone::Error,
                );
                return Err(err);
            }
        };
        *state = RegistrationState::Captured(frame.clone());
        Ok(frame)
    }

    /// Discards the captured frame and returns to the live view.
    pub fn retake(&self) -> Result<()> {
        {
            let mut state = self.state();
            if !matches!(*state, RegistrationState::Captured(_)) {
                return Err(workflow_error(format!(
                    "nothing to retake while {:?}",
                    state.phase()
                )));
            }
            *state = RegistrationState::CameraReady;
        }
        self.restore_live_view();
        self.surface.set_disabled(SUBMIT_BUTTON, true);
        self.surface.set_hidden(REGISTER_MESSAGE, true);
        Ok(())
    }

    /// Sends the captured frame with the typed identifier and name.
    pub async fn submit(&self) -> Result<RosterEntry> {
        let (frame, entry, payload) = self.begin_submission()?;
        let result = self
            .backend
            .register(&entry.user_id, &entry.name, &payload)
            .await;
        self.settle_submission(frame, entry, result).await
    }

    fn begin_submission(&self) -> Result<(CapturedFrame, RosterEntry, ImagePayload)> {
        let mut state = self.state();
        let frame = match &*state {
            RegistrationState::Captured(frame) => frame.clone(),
            RegistrationState::Submitting(_) => {
                return Err(KioskError::ControlBusy(
                    "registration already in flight".into(),
                ))
            }
            _ => {
                show_message(
                    self.surface.as_ref(),
                    REGISTER_MESSAGE,
                    "Capture a photo first.",
                    Tone::Error,
                );
                return Err(workflow_error("no captured frame to submit"));
            }
        };

        let user_id = self.surface.input_value(USER_ID_INPUT).trim().to_string();
        let name = self.surface.input_value(NAME_INPUT).trim().to_string();
        if user_id.is_empty() || name.is_empty() {
            show_message(
                self.surface.as_ref(),
                REGISTER_MESSAGE,
                "Enter User ID and Name.",
                Tone::Error,
            );
            return Err(workflow_error("user id and name are required"));
        }

        let payload = payload_for(&frame, self.settings.transport).map_err(|err| {
            show_message(
                self.surface.as_ref(),
                REGISTER_MESSAGE,
                "Could not prepare the captured photo.",
                Tone::Error,
            );
            err
        })?;

        *state = RegistrationState::Submitting(frame.clone());
        self.surface.set_disabled(SUBMIT_BUTTON, true);
        Ok((frame, RosterEntry { user_id, name }, payload))
    }

    async fn settle_submission(
        &self,
        frame: CapturedFrame,
        entry: RosterEntry,
        result: Result<ActionOutcome>,
    ) -> Result<RosterEntry> {
        let settled = match result {
            Ok(outcome @ ActionOutcome::Success { .. }) => {
                let text = outcome.message().unwrap_or("Registered.");
                show_message(self.surface.as_ref(), REGISTER_MESSAGE, text, Tone::Success);
                self.set_state(RegistrationState::CameraReady);
                self.restore_live_view();
                self.surface.set_disabled(SUBMIT_BUTTON, true);
                self.roster.add(&entry);
                info!("Registered {} ({})", entry.user_id, entry.name);
                Ok(entry.clone())
            }
            Ok(outcome @ ActionOutcome::Failure { .. }) => {
                let text = outcome.message().unwrap_or("Registration failed.").to_string();
                show_message(self.surface.as_ref(), REGISTER_MESSAGE, &text, Tone::Error);
                self.set_state(RegistrationState::Captured(frame));
                self.surface.set_disabled(SUBMIT_BUTTON, false);
                Err(KioskError::BackendRejected(text))
            }
            Err(err) => {
                warn!("Registration request for {} failed: {err}", entry.user_id);
                show_message(
                    self.surface.as_ref(),
                    REGISTER_MESSAGE,
                    "Network error. Try again.",
                    Tone::Error,
                );
                self.set_state(RegistrationState::Captured(frame));
                self.surface.set_disabled(SUBMIT_BUTTON, false);
                Err(err)
            }
        };

        self.activity
            .record(KioskEvent::from_payload(EventPayload::Registration(
                RegistrationEvent {
                    user_id: entry.user_id,
                    accepted: settled.is_ok(),
                    message: settled.as_ref().err().map(ToString::to_string),
                },
            )))
            .await;
        settled
    }

    /// Deletes a registered user; the row disappears only once the backend confirms.
    pub async fn remove_user(&self, user_id: &str) -> Result<()> {
        let settled = match self.backend.delete_user(user_id).await {
            Ok(true) => {
                self.roster.remove(user_id);
                info!("Removed user {}", user_id);
                Ok(())
            }
            Ok(false) => {
                show_message(
                    self.surface.as_ref(),
                    REGISTER_MESSAGE,
                    &format!("Could not remove user {user_id}."),
                    Tone::Error,
                );
                Err(KioskError::BackendRejected(format!(
                    "delete of {user_id} was refused"
                )))
            }
            Err(err) => {
                warn!("Delete request for {} failed: {err}", user_id);
                show_message(
                    self.surface.as_ref(),
                    REGISTER_MESSAGE,
                    "Network error. Try again.",
                    Tone::Error,
                );
                Err(err)
            }
        };

        self.activity
            .record(KioskEvent::from_payload(EventPayload::Roster(RosterEvent {
                user_id: user_id.to_string(),
                removed: settled.is_ok(),
            })))
            .await;
        settled
    }

    fn restore_live_view(&self) {
        self.surface.set_image(PREVIEW, None);
        self.surface.set_hidden(PREVIEW, true);
        self.surface.set_image(SNAPSHOT, None);
        self.surface.set_hidden(SNAPSHOT, true);
        self.surface.set_hidden(CAMERA, false);
    }
}

#[async_trait]
impl<D: CameraDevice, B: AttendanceBackend> PageController for RegistrationController<D, B> {
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
        for id in REGISTRATION_CONTROLS {
            self.surface.set_disabled(id, true);
        }
        self.set_state(RegistrationState::CameraStarting);

        // The roster listing never gates the camera.
        let ((), started) = tokio::join!(self.seed_roster(), self.start_camera());
        started
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
