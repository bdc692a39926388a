use std::fmt;

/// Stable identifier of a surface element the workflow reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub &'static str);

impl ElementId {
    pub const fn new(id: &'static str) -> Self {
        Self(id)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Visual tone of a message region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tone {
    #[default]
    Neutral,
    Success,
    Error,
}

// Registration page.
pub const CAMERA: ElementId = ElementId::new("camera");
pub const SNAPSHOT: ElementId = ElementId::new("snapshot");
pub const PREVIEW: ElementId = ElementId::new("preview");
pub const CAPTURE_BUTTON: ElementId = ElementId::new("captureBtn");
pub const SUBMIT_BUTTON: ElementId = ElementId::new("submitBtn");
pub const USER_ID_INPUT: ElementId = ElementId::new("user_id");
pub const NAME_INPUT: ElementId = ElementId::new("name");
pub const REGISTER_MESSAGE: ElementId = ElementId::new("registerMessage");
pub const USER_LIST: ElementId = ElementId::new("userList");
pub const NO_USERS: ElementId = ElementId::new("noUsers");

// Attendance page.
pub const ATTEND_STATUS: ElementId = ElementId::new("attendStatus");
pub const IDENTIFY_RESULT: ElementId = ElementId::new("identifyResult");
pub const PUNCH_IN_BUTTON: ElementId = ElementId::new("punchInBtn");
pub const PUNCH_OUT_BUTTON: ElementId = ElementId::new("punchOutBtn");
pub const PUNCH_MESSAGE: ElementId = ElementId::new("punchMessage");

pub const REGISTRATION_CONTROLS: [ElementId; 2] = [CAPTURE_BUTTON, SUBMIT_BUTTON];
pub const ATTENDANCE_CONTROLS: [ElementId; 2] = [PUNCH_IN_BUTTON, PUNCH_OUT_BUTTON];
