use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Error returned when a string does not name a member of one of the closed
/// domain enums.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized {kind} `{value}`")]
pub struct UnrecognizedValue {
    /// The enum that rejected the value, e.g. "animation".
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl UnrecognizedValue {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Represents the lifecycle state of a generation task.
#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// The task has been accepted but has not yet started processing.
    Queued,
    /// The task is actively being processed.
    Running,
    /// The task completed successfully.
    Success,
    /// The task failed to complete.
    Failed,
    /// The task was cancelled before completing.
    Cancelled,
    /// The service reported a state this client does not recognize.
    Unknown,
}

impl TaskStatus {
    /// Returns `true` for `Success`, `Failed` and `Cancelled`; no further
    /// transitions happen from these.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Unknown => "unknown",
        }
    }

    /// Maps a wire status onto the closed set. `banned` and `expired` never
    /// transition again, so they read as `Failed`.
    fn from_wire(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "queued" | "pending" => TaskStatus::Queued,
            "running" => TaskStatus::Running,
            "success" => TaskStatus::Success,
            "failed" | "failure" | "banned" | "expired" => TaskStatus::Failed,
            "cancelled" | "canceled" => TaskStatus::Cancelled,
            _ => TaskStatus::Unknown,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(TaskStatus::from_wire(&raw))
    }
}

/// Declares a closed, string-backed enum with `as_str`, `FromStr`, `Display`
/// and serde support through its wire name.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every member, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The name used on the wire.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnrecognizedValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| UnrecognizedValue::new($kind, s))
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_enum! {
    /// Skeleton topology to build when rigging a model.
    RigType, "rig type" {
        Biped => "biped",
        Quadruped => "quadruped",
        Hexapod => "hexapod",
        Octopod => "octopod",
        Avian => "avian",
        Serpentine => "serpentine",
        Aquatic => "aquatic",
        Others => "others",
    }
}

string_enum! {
    /// Bone naming convention of a rigged model.
    RigSpec, "rig spec" {
        Mixamo => "mixamo",
        Tripo => "tripo",
    }
}

impl Default for RigSpec {
    fn default() -> Self {
        RigSpec::Tripo
    }
}

string_enum! {
    /// File format of rigged and animated models.
    ModelFormat, "model format" {
        Glb => "glb",
        Fbx => "fbx",
    }
}

impl Default for ModelFormat {
    fn default() -> Self {
        ModelFormat::Glb
    }
}

string_enum! {
    /// A named artifact produced by a successful task.
    OutputKind, "output kind" {
        /// The generated mesh.
        Model => "model",
        /// The untextured base mesh.
        BaseModel => "base_model",
        /// The mesh with PBR materials.
        PbrModel => "pbr_model",
        /// A preview render of the result.
        RenderedImage => "rendered_image",
        /// The intermediate image produced for text prompts.
        GeneratedImage => "generated_image",
    }
}

impl OutputKind {
    /// File extension used when the artifact URL does not carry one.
    pub(crate) fn default_extension(self) -> &'static str {
        match self {
            OutputKind::Model | OutputKind::BaseModel | OutputKind::PbrModel => "glb",
            OutputKind::RenderedImage | OutputKind::GeneratedImage => "webp",
        }
    }
}

/// Preset animation clips that can be retargeted onto a rigged model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Animation {
    Idle,
    Walk,
    Run,
    Dive,
    Climb,
    Jump,
    Slash,
    Shoot,
    Hurt,
    Fall,
    Turn,
    QuadrupedWalk,
    HexapodWalk,
    OctopodWalk,
    SerpentineMarch,
    AquaticMarch,
}

impl Animation {
    pub const ALL: &'static [Animation] = &[
        Animation::Idle,
        Animation::Walk,
        Animation::Run,
        Animation::Dive,
        Animation::Climb,
        Animation::Jump,
        Animation::Slash,
        Animation::Shoot,
        Animation::Hurt,
        Animation::Fall,
        Animation::Turn,
        Animation::QuadrupedWalk,
        Animation::HexapodWalk,
        Animation::OctopodWalk,
        Animation::SerpentineMarch,
        Animation::AquaticMarch,
    ];

    /// The clip name without the `preset:` prefix, e.g. `quadruped:walk`.
    pub fn name(self) -> &'static str {
        match self {
            Animation::Idle => "idle",
            Animation::Walk => "walk",
            Animation::Run => "run",
            Animation::Dive => "dive",
            Animation::Climb => "climb",
            Animation::Jump => "jump",
            Animation::Slash => "slash",
            Animation::Shoot => "shoot",
            Animation::Hurt => "hurt",
            Animation::Fall => "fall",
            Animation::Turn => "turn",
            Animation::QuadrupedWalk => "quadruped:walk",
            Animation::HexapodWalk => "hexapod:walk",
            Animation::OctopodWalk => "octopod:walk",
            Animation::SerpentineMarch => "serpentine:march",
            Animation::AquaticMarch => "aquatic:march",
        }
    }

    /// The identifier the service expects, e.g. `preset:walk`.
    pub fn as_str(self) -> &'static str {
        match self {
            Animation::Idle => "preset:idle",
            Animation::Walk => "preset:walk",
            Animation::Run => "preset:run",
            Animation::Dive => "preset:dive",
            Animation::Climb => "preset:climb",
            Animation::Jump => "preset:jump",
            Animation::Slash => "preset:slash",
            Animation::Shoot => "preset:shoot",
            Animation::Hurt => "preset:hurt",
            Animation::Fall => "preset:fall",
            Animation::Turn => "preset:turn",
            Animation::QuadrupedWalk => "preset:quadruped:walk",
            Animation::HexapodWalk => "preset:hexapod:walk",
            Animation::OctopodWalk => "preset:octopod:walk",
            Animation::SerpentineMarch => "preset:serpentine:march",
            Animation::AquaticMarch => "preset:aquatic:march",
        }
    }
}

impl fmt::Display for Animation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Animation {
    type Err = UnrecognizedValue;

    /// Accepts both `walk` and `preset:walk`, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let name = match trimmed.get(..7) {
            Some(prefix) if prefix.eq_ignore_ascii_case("preset:") => &trimmed[7..],
            _ => trimmed,
        };
        Animation::ALL
            .iter()
            .copied()
            .find(|a| a.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnrecognizedValue::new("animation", s))
    }
}

impl Serialize for Animation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The artifacts referenced by a successful task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskOutput {
    /// Remote location of every artifact the task produced.
    pub artifacts: BTreeMap<OutputKind, String>,
    /// Set by pre-rig check tasks.
    pub riggable: Option<bool>,
    /// Mesh topology reported by the service, e.g. "quad".
    pub topology: Option<String>,
}

impl TaskOutput {
    /// The remote location of one artifact.
    pub fn get(&self, kind: OutputKind) -> Option<&str> {
        self.artifacts.get(&kind).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Reads artifact entries out of a wire object. Each value is either the
    /// URL itself or an object with a `url` field; unknown keys are ignored.
    fn merge_wire(&mut self, map: &Map<String, Value>) {
        for (key, value) in map {
            let Ok(kind) = key.parse::<OutputKind>() else {
                continue;
            };
            let url = match value {
                Value::String(url) => Some(url.clone()),
                Value::Object(obj) => obj.get("url").and_then(Value::as_str).map(str::to_string),
                _ => None,
            };
            if let Some(url) = url.filter(|u| !u.is_empty()) {
                self.artifacts.entry(kind).or_insert(url);
            }
        }
        if let Some(riggable) = map.get("riggable").and_then(Value::as_bool) {
            self.riggable = Some(riggable);
        }
        if let Some(topology) = map.get("topology").and_then(Value::as_str) {
            self.topology = Some(topology.to_string());
        }
    }
}

impl FromIterator<(OutputKind, String)> for TaskOutput {
    fn from_iter<I: IntoIterator<Item = (OutputKind, String)>>(iter: I) -> Self {
        Self {
            artifacts: iter.into_iter().collect(),
            ..Default::default()
        }
    }
}

/// A snapshot of one remote generation task.
///
/// Every call to `get_task` yields a fresh snapshot; nothing in this crate
/// mutates a `Task` after handing it out.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "WireTask")]
pub struct Task {
    /// The unique identifier of the task.
    pub task_id: String,
    /// The job kind, e.g. "text_to_model".
    pub task_type: String,
    /// The current lifecycle state.
    pub status: TaskStatus,
    /// Completion progress, from 0 to 100.
    pub progress: u8,
    /// Unix timestamp (seconds) of when the task was created.
    pub create_time: Option<i64>,
    /// Server estimate of the seconds left, while running.
    pub running_left_time: Option<i64>,
    /// Produced artifacts; only present when `status` is `Success`.
    pub output: Option<TaskOutput>,
    /// Only present when `status` is `Failed`.
    pub error_code: Option<i64>,
    /// Only present when `status` is `Failed`.
    pub error_msg: Option<String>,
}

impl Task {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.create_time
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    }

    /// The answer of a finished pre-rig check task.
    pub fn riggable(&self) -> Option<bool> {
        self.output.as_ref().and_then(|o| o.riggable)
    }
}

#[derive(Deserialize)]
struct WireTask {
    task_id: String,
    #[serde(rename = "type", default)]
    task_type: String,
    status: TaskStatus,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    create_time: Option<i64>,
    #[serde(default)]
    running_left_time: Option<f64>,
    #[serde(default)]
    output: Option<Map<String, Value>>,
    #[serde(default)]
    result: Option<Map<String, Value>>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    error_msg: Option<String>,
}

impl From<WireTask> for Task {
    fn from(wire: WireTask) -> Self {
        let output = (wire.status == TaskStatus::Success).then(|| {
            let mut output = TaskOutput::default();
            if let Some(map) = &wire.output {
                output.merge_wire(map);
            }
            if let Some(map) = &wire.result {
                output.merge_wire(map);
            }
            output
        });
        let failed = wire.status == TaskStatus::Failed;

        Task {
            task_id: wire.task_id,
            task_type: wire.task_type,
            status: wire.status,
            progress: wire.progress.unwrap_or(0.0).clamp(0.0, 100.0) as u8,
            create_time: wire.create_time,
            running_left_time: wire.running_left_time.map(|s| s.max(0.0).round() as i64),
            output,
            error_code: wire.error_code.filter(|_| failed),
            error_msg: wire.error_msg.filter(|_| failed),
        }
    }
}

/// The user's account balance.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Balance {
    /// The available, usable balance.
    pub balance: f64,
    /// The amount of credits currently reserved for ongoing tasks.
    pub frozen: f64,
}

/// The response from an API call that successfully initiates a task.
#[derive(Deserialize, Debug)]
pub(crate) struct TaskResponse {
    pub(crate) task_id: String,
}

/// Holds the file token from a multipart upload.
#[derive(Deserialize, Debug)]
pub(crate) struct UploadData {
    pub(crate) image_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_wire_names_map_onto_closed_set() {
        let parse = |s: &str| serde_json::from_value::<TaskStatus>(json!(s)).unwrap();
        assert_eq!(parse("queued"), TaskStatus::Queued);
        assert_eq!(parse("RUNNING"), TaskStatus::Running);
        assert_eq!(parse("failure"), TaskStatus::Failed);
        assert_eq!(parse("expired"), TaskStatus::Failed);
        assert_eq!(parse("something_new"), TaskStatus::Unknown);
        assert!(!TaskStatus::Unknown.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }

    #[test]
    fn animation_parses_bare_and_prefixed_names() {
        assert_eq!("walk".parse::<Animation>().unwrap(), Animation::Walk);
        assert_eq!("preset:walk".parse::<Animation>().unwrap(), Animation::Walk);
        assert_eq!(
            "Quadruped:Walk".parse::<Animation>().unwrap(),
            Animation::QuadrupedWalk
        );
        let err = "bogus_name".parse::<Animation>().unwrap_err();
        assert_eq!(err.kind, "animation");
        assert_eq!(err.value, "bogus_name");
    }

    #[test]
    fn rig_enums_reject_unknown_values() {
        assert_eq!("Biped".parse::<RigType>().unwrap(), RigType::Biped);
        assert!("dragon".parse::<RigType>().is_err());
        assert_eq!("mixamo".parse::<RigSpec>().unwrap(), RigSpec::Mixamo);
        assert_eq!(RigSpec::default(), RigSpec::Tripo);
        assert!("obj".parse::<ModelFormat>().is_err());
    }

    #[test]
    fn successful_task_collects_artifacts() {
        let task: Task = serde_json::from_value(json!({
            "task_id": "t1",
            "type": "text_to_model",
            "status": "success",
            "progress": 100,
            "create_time": 1752091365,
            "output": {
                "model": "https://cdn.example.com/t1/model.glb",
                "rendered_image": "https://cdn.example.com/t1/preview.webp",
                "topology": "quad",
                "something_else": "ignored"
            },
            "result": {
                "pbr_model": { "url": "https://cdn.example.com/t1/pbr.glb" }
            }
        }))
        .unwrap();

        let output = task.output.as_ref().unwrap();
        assert_eq!(output.artifacts.len(), 3);
        assert_eq!(
            output.get(OutputKind::PbrModel),
            Some("https://cdn.example.com/t1/pbr.glb")
        );
        assert_eq!(output.topology.as_deref(), Some("quad"));
        assert_eq!(task.created_at().unwrap().timestamp(), 1752091365);
    }

    #[test]
    fn non_terminal_task_drops_output_and_clamps_progress() {
        let task: Task = serde_json::from_value(json!({
            "task_id": "t2",
            "status": "running",
            "progress": 140,
            "output": { "model": "https://cdn.example.com/t2/model.glb" },
            "error_msg": "stale"
        }))
        .unwrap();

        assert_eq!(task.progress, 100);
        assert!(task.output.is_none());
        assert!(task.error_msg.is_none());
    }

    #[test]
    fn failed_task_keeps_error_detail() {
        let task: Task = serde_json::from_value(json!({
            "task_id": "t3",
            "status": "failed",
            "progress": 12,
            "error_code": 2003,
            "error_msg": "content policy"
        }))
        .unwrap();

        assert_eq!(task.error_code, Some(2003));
        assert_eq!(task.error_msg.as_deref(), Some("content policy"));
    }
}
