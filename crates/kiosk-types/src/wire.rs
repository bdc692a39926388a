//! JSON shapes exchanged with the attendance backend.

use serde::{Deserialize, Serialize};

pub const REGISTER_PATH: &str = "/register";
pub const PUNCH_IN_PATH: &str = "/api/punch-in";
pub const PUNCH_OUT_PATH: &str = "/api/punch-out";
pub const USERS_PATH: &str = "/api/users";

/// The two attendance actions. They share sequencing but hit different endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PunchAction {
    In,
    Out,
}

impl PunchAction {
    pub fn path(self) -> &'static str {
        match self {
            PunchAction::In => PUNCH_IN_PATH,
            PunchAction::Out => PUNCH_OUT_PATH,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PunchAction::In => "punch-in",
            PunchAction::Out => "punch-out",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterRequest {
    pub user_id: String,
    pub name: String,
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageRequest {
    pub image: String,
}

/// Raw response body as the backend sends it. Only used at the decoding boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Who the backend matched the face to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Option<String>,
    pub name: Option<String>,
}

impl Identity {
    /// Display label: the name when present, the identifier otherwise.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.user_id.as_deref())
            .unwrap_or("")
    }
}

/// Decoded result of a register or punch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Success {
        message: Option<String>,
        identity: Option<Identity>,
    },
    Failure {
        message: Option<String>,
    },
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Success { .. })
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ActionOutcome::Success { message, .. } | ActionOutcome::Failure { message } => {
                message.as_deref().filter(|m| !m.is_empty())
            }
        }
    }
}

impl From<ActionResponse> for ActionOutcome {
    fn from(raw: ActionResponse) -> Self {
        if raw.success {
            let identity = if raw.user_id.is_some() || raw.name.is_some() {
                Some(Identity {
                    user_id: raw.user_id,
                    name: raw.name,
                })
            } else {
                None
            };
            ActionOutcome::Success {
                message: raw.message,
                identity,
            }
        } else {
            ActionOutcome::Failure {
                message: raw.message,
            }
        }
    }
}

/// One row of the registration roster, keyed by `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub user_id: String,
    pub name: String,
}

impl RosterEntry {
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_success_with_identity() {
        let raw: ActionResponse = serde_json::from_str(
            r#"{"success":true,"user_id":"u1","name":"Alice","message":"Punch-in recorded for Alice."}"#,
        )
        .expect("parse");
        let outcome = ActionOutcome::from(raw);
        let ActionOutcome::Success { identity, .. } = &outcome else {
            panic!("expected success");
        };
        assert_eq!(identity.as_ref().map(Identity::label), Some("Alice"));
        assert_eq!(outcome.message(), Some("Punch-in recorded for Alice."));
    }

    #[test]
    fn decode_failure_without_message() {
        let raw: ActionResponse = serde_json::from_str(r#"{"success":false}"#).expect("parse");
        let outcome = ActionOutcome::from(raw);
        assert!(!outcome.is_success());
        assert_eq!(outcome.message(), None);
    }

    #[test]
    fn identity_label_falls_back_to_user_id() {
        let identity = Identity {
            user_id: Some("u7".into()),
            name: None,
        };
        assert_eq!(identity.label(), "u7");
        let blank_name = Identity {
            user_id: Some("u8".into()),
            name: Some(String::new()),
        };
        assert_eq!(blank_name.label(), "u8");
    }

    #[test]
    fn register_request_uses_snake_case_keys() {
        let body = serde_json::to_value(RegisterRequest {
            user_id: "u1".into(),
            name: "Alice".into(),
            image: "data:image/jpeg;base64,AA==".into(),
        })
        .expect("serialize");
        assert_eq!(body["user_id"], "u1");
        assert_eq!(body["image"], "data:image/jpeg;base64,AA==");
    }
}
