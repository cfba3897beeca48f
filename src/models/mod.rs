//! Domain models exchanged between the services and the gateway.

pub mod permission;

pub use permission::{Permission, PermissionError, Role};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity;

/// A named, versioned processing graph registered with the service.
///
/// `name` is the business key: globally unique and immutable once
/// created. `uri` and `version` are required on create but may be
/// absent on payloads that only reference a pipeline by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Pipeline {
    /// A user-controlled name for the pipeline.
    pub name: String,
    /// URI to bootstrap the pipeline code.
    #[serde(default)]
    pub uri: Option<String>,
    /// Pipeline version to use with the URI.
    #[serde(default)]
    pub version: Option<String>,
}

/// Task lifecycle states.
///
/// `Pending` is assigned on creation; `Claimed` is the only transition
/// the service performs itself. The remaining states are written by
/// workers via task updates, with no transition policy enforced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    /// Created and available for claiming.
    Pending,
    /// Exclusively reserved by one worker.
    Claimed,
    /// Reported as executing by its worker.
    Running,
    /// Finished successfully.
    Done,
    /// Finished unsuccessfully.
    Failed,
    /// Withdrawn before completion.
    Cancelled,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => f.write_str("PENDING"),
            Self::Claimed => f.write_str("CLAIMED"),
            Self::Running => f.write_str("RUNNING"),
            Self::Done => f.write_str("DONE"),
            Self::Failed => f.write_str("FAILED"),
            Self::Cancelled => f.write_str("CANCELLED"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "CLAIMED" => Ok(Self::Claimed),
            "RUNNING" => Ok(Self::Running),
            "DONE" => Ok(Self::Done),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(anyhow::anyhow!("unknown task status: {other}")),
        }
    }
}

/// One unit of work for a pipeline.
///
/// `task_input` is an opaque JSON document; its canonical fingerprint
/// (`task_input_id`) is the task's identity within the pipeline. The
/// fingerprint is assigned by the server and ignored on input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// The pipeline this task belongs to.
    pub pipeline: Pipeline,
    /// Server-assigned fingerprint of `task_input`.
    #[serde(default)]
    pub task_input_id: Option<String>,
    /// The structured parameter set that identifies this piece of work.
    pub task_input: serde_json::Value,
    /// Current lifecycle state.
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

impl Task {
    /// Fingerprint of this task's input document.
    pub fn generate_task_id(&self) -> String {
        identity::fingerprint(&self.task_input)
    }
}

/// Two tasks are the same piece of work when they target the same
/// pipeline (by name) and their inputs fingerprint identically. Status
/// and the server-assigned `task_input_id` do not participate.
impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.pipeline.name == other.pipeline.name
            && self.generate_task_id() == other.generate_task_id()
    }
}

/// A freshly minted pipeline token, as returned to the caller. The
/// token string is only ever shown once, at mint time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Token {
    /// Name of the pipeline this token is bound to.
    pub name: String,
    /// The 32-hex-character bearer credential.
    pub token: String,
    /// A user-controlled description of the token.
    pub description: String,
}

/// An append-only audit record describing a change to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Server-assigned timestamp of the change.
    pub time: DateTime<Utc>,
    /// What happened, e.g. `Created` or `Task claimed`.
    pub change: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_status_roundtrip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Claimed,
            TaskStatus::Running,
            TaskStatus::Done,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
        ] {
            let s = status.to_string();
            let parsed: TaskStatus = s.parse().expect("roundtrip");
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn task_status_from_str_rejects_unknown() {
        assert!("pending".parse::<TaskStatus>().is_err());
        assert!("".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn task_status_serializes_as_literal() {
        let s = serde_json::to_string(&TaskStatus::Claimed).expect("serialize");
        assert_eq!(s, r#""CLAIMED""#);
        let parsed: TaskStatus = serde_json::from_str(r#""DONE""#).expect("deserialize");
        assert_eq!(parsed, TaskStatus::Done);
    }

    #[test]
    fn pipeline_rejects_unknown_fields() {
        let result: Result<Pipeline, _> =
            serde_json::from_str(r#"{"name": "p1", "bogus": true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn pipeline_uri_and_version_are_optional_on_input() {
        let pipeline: Pipeline = serde_json::from_str(r#"{"name": "p1"}"#).expect("deserialize");
        assert_eq!(pipeline.name, "p1");
        assert!(pipeline.uri.is_none());
        assert!(pipeline.version.is_none());
    }

    fn task(pipeline_name: &str, input: serde_json::Value) -> Task {
        Task {
            pipeline: Pipeline {
                name: pipeline_name.to_owned(),
                uri: None,
                version: None,
            },
            task_input_id: None,
            task_input: input,
            status: None,
        }
    }

    #[test]
    fn tasks_with_same_input_are_equal() {
        let a = task("p1", json!({"x": 1, "y": 2}));
        let mut b = task("p1", json!({"y": 2, "x": 1}));
        b.status = Some(TaskStatus::Done);
        b.task_input_id = Some("ignored".to_owned());
        assert_eq!(a, b);
    }

    #[test]
    fn tasks_differ_across_pipelines_and_inputs() {
        let a = task("p1", json!({"x": 1}));
        assert_ne!(a, task("p2", json!({"x": 1})));
        assert_ne!(a, task("p1", json!({"x": 2})));
    }

    #[test]
    fn task_deserializes_without_optional_fields() {
        let task: Task = serde_json::from_str(
            r#"{"pipeline": {"name": "p1"}, "task_input": {"n": 1}}"#,
        )
        .expect("deserialize");
        assert!(task.status.is_none());
        assert!(task.task_input_id.is_none());
    }
}
