//! Control command wire format and delivery gating.

use crate::animation::schema::ParameterMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Requests a UI process can make of the hardware owner.
///
/// A closed set: the owner matches exhaustively, so adding an action is a
/// compile-time event, not a silent fallthrough at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum ControlAction {
    Start {
        animation: String,
        #[serde(default)]
        params: ParameterMap,
    },
    Stop,
    UpdateParameters {
        params: ParameterMap,
    },
    SetBrightness {
        value: u8,
    },
    Reload {
        animation: String,
    },
    Clear,
}

/// One command as written to the control file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlCommand {
    pub command_id: u64,
    #[serde(flatten)]
    pub action: ControlAction,
    pub written_at: String,
}

impl ControlCommand {
    /// Wrap an action with a fresh monotonic id and timestamp.
    pub fn new(action: ControlAction) -> Self {
        Self {
            command_id: next_command_id(),
            action,
            written_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

static LAST_ID: AtomicU64 = AtomicU64::new(0);

/// Strictly increasing command id, seeded from wall-clock milliseconds so
/// ids from separate short-lived sender processes still order sensibly.
pub fn next_command_id() -> u64 {
    let now = chrono::Utc::now().timestamp_millis().max(1) as u64;
    loop {
        let prev = LAST_ID.load(Ordering::SeqCst);
        let candidate = now.max(prev + 1);
        if LAST_ID
            .compare_exchange(prev, candidate, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return candidate;
        }
    }
}

/// Delivery gate on the owner side.
///
/// The control file holds the latest command until it is overwritten, so
/// the poll loop re-reads commands it has already acted on. The gate keeps
/// the last processed id and admits only newer ones.
#[derive(Debug, Default)]
pub struct CommandGate {
    last_processed: u64,
}

impl CommandGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// True exactly once per command id, in increasing order.
    pub fn accept(&mut self, command: &ControlCommand) -> bool {
        if command.command_id <= self.last_processed {
            return false;
        }
        self.last_processed = command.command_id;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_wire_format() {
        let command = ControlCommand {
            command_id: 7,
            action: ControlAction::Start {
                animation: "rainbow".into(),
                params: ParameterMap::new(),
            },
            written_at: "2026-01-01T00:00:00Z".into(),
        };
        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value["command_id"], json!(7));
        assert_eq!(value["action"], json!("start"));
        assert_eq!(value["data"]["animation"], json!("rainbow"));
    }

    #[test]
    fn test_unit_actions_roundtrip() {
        for action in [ControlAction::Stop, ControlAction::Clear] {
            let json = serde_json::to_string(&ControlCommand::new(action.clone())).unwrap();
            let back: ControlCommand = serde_json::from_str(&json).unwrap();
            assert_eq!(back.action, action);
        }
    }

    #[test]
    fn test_start_params_default_when_missing() {
        let raw = json!({
            "command_id": 1,
            "action": "start",
            "data": {"animation": "solid"},
            "written_at": "2026-01-01T00:00:00Z",
        });
        let command: ControlCommand = serde_json::from_value(raw).unwrap();
        match command.action {
            ControlAction::Start { animation, params } => {
                assert_eq!(animation, "solid");
                assert!(params.is_empty());
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_ids_strictly_increase() {
        let a = next_command_id();
        let b = next_command_id();
        let c = next_command_id();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_gate_is_idempotent() {
        let mut gate = CommandGate::new();
        let first = ControlCommand::new(ControlAction::Stop);
        let second = ControlCommand::new(ControlAction::Clear);

        assert!(gate.accept(&first));
        assert!(!gate.accept(&first));
        assert!(gate.accept(&second));
        assert!(!gate.accept(&second));
        assert!(!gate.accept(&first));
    }
}
