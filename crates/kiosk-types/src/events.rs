use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::wire::PunchAction;

/// Categories of activity recorded by the kiosk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Lifecycle,
    Camera,
    Capture,
    Registration,
    Punch,
    Roster,
}

/// Immutable activity record for logs and the operator view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KioskEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Lifecycle(LifecycleEvent),
    Camera(CameraEvent),
    Capture(CaptureEvent),
    Registration(RegistrationEvent),
    Punch(PunchEvent),
    Roster(RosterEvent),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LifecyclePhase {
    Load,
    Unload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub page: String,
    pub phase: LifecyclePhase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraEvent {
    pub started: bool,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureEvent {
    pub width: u32,
    pub height: u32,
    pub encoded_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationEvent {
    pub user_id: String,
    pub accepted: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PunchEvent {
    pub action: PunchAction,
    pub accepted: bool,
    pub identity: Option<String>,
    pub message: Option<String>,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEvent {
    pub user_id: String,
    pub removed: bool,
}

impl KioskEvent {
    pub fn new(kind: EventKind, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Builds an event whose kind is derived from the payload variant.
    pub fn from_payload(payload: EventPayload) -> Self {
        let kind = match &payload {
            EventPayload::Lifecycle(_) => EventKind::Lifecycle,
            EventPayload::Camera(_) => EventKind::Camera,
            EventPayload::Capture(_) => EventKind::Capture,
            EventPayload::Registration(_) => EventKind::Registration,
            EventPayload::Punch(_) => EventKind::Punch,
            EventPayload::Roster(_) => EventKind::Roster,
        };
        Self::new(kind, payload)
    }
}
