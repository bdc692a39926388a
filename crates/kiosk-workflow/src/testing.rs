use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use kiosk_network::{network_error, AttendanceBackend, ImagePayload};
use kiosk_types::{
    wire::{ActionOutcome, Identity, PunchAction, RosterEntry},
    Result,
};
use tokio::time::{sleep, Duration};

#[derive(Debug, Clone)]
pub enum Reply {
    Outcome(ActionOutcome),
    NetworkDown,
}

impl Reply {
    pub fn success(message: &str) -> Self {
        Reply::Outcome(ActionOutcome::Success {
            message: Some(message.into()),
            identity: None,
        })
    }

    pub fn identified(user_id: &str, name: &str) -> Self {
        Reply::Outcome(ActionOutcome::Success {
            message: Some(format!("Punch recorded for {name}.")),
            identity: Some(Identity {
                user_id: Some(user_id.into()),
                name: Some(name.into()),
            }),
        })
    }

    pub fn rejected(message: Option<&str>) -> Self {
        Reply::Outcome(ActionOutcome::Failure {
            message: message.map(str::to_string),
        })
    }
}

#[derive(Default)]
struct Script {
    register: VecDeque<Reply>,
    punch: VecDeque<Reply>,
    delete: VecDeque<Option<bool>>,
    users: Option<Vec<RosterEntry>>,
    calls: Vec<String>,
    payloads: Vec<ImagePayload>,
}

/// In-process backend answering from queued replies and logging every call.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
    latency: Duration,
    list_delay: Duration,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Holds `list_users` open for `delay` before answering.
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = delay;
        self
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("script lock")
    }

    pub fn queue_register(&self, reply: Reply) {
        self.script().register.push_back(reply);
    }

    pub fn queue_punch(&self, reply: Reply) {
        self.script().punch.push_back(reply);
    }

    /// `None` simulates a transport failure.
    pub fn queue_delete(&self, status_ok: Option<bool>) {
        self.script().delete.push_back(status_ok);
    }

    pub fn set_users(&self, users: Vec<RosterEntry>) {
        self.script().users = Some(users);
    }

    pub fn calls(&self) -> Vec<String> {
        self.script().calls.clone()
    }

    pub fn payloads(&self) -> Vec<ImagePayload> {
        self.script().payloads.clone()
    }

    fn answer(reply: Option<Reply>) -> Result<ActionOutcome> {
        match reply {
            Some(Reply::Outcome(outcome)) => Ok(outcome),
            Some(Reply::NetworkDown) | None => Err(network_error("connection refused")),
        }
    }
}

#[async_trait]
impl AttendanceBackend for ScriptedBackend {
    async fn register(&self, user_id: &str, name: &str, image: &ImagePayload) -> Result<ActionOutcome> {
        let reply = {
            let mut script = self.script();
            script.calls.push(format!("register:{user_id}:{name}"));
            script.payloads.push(image.clone());
            script.register.pop_front()
        };
        sleep(self.latency).await;
        Self::answer(reply)
    }

    async fn punch(&self, action: PunchAction, image: &ImagePayload) -> Result<ActionOutcome> {
        let reply = {
            let mut script = self.script();
            script.calls.push(action.label().to_string());
            script.payloads.push(image.clone());
            script.punch.pop_front()
        };
        sleep(self.latency).await;
        Self::answer(reply)
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool> {
        let reply = {
            let mut script = self.script();
            script.calls.push(format!("delete:{user_id}"));
            script.delete.pop_front()
        };
        sleep(self.latency).await;
        match reply.flatten() {
            Some(status_ok) => Ok(status_ok),
            None => Err(network_error("connection refused")),
        }
    }

    async fn list_users(&self) -> Result<Vec<RosterEntry>> {
        let users = {
            let mut script = self.script();
            script.calls.push("list".into());
            script.users.clone()
        };
        sleep(self.list_delay).await;
        users.ok_or_else(|| network_error("connection refused"))
    }
}
