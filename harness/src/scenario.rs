//! Replay scenarios (`scenario.v1`): a JSON list of steps driven against a
//! loaded descriptor.
//!
//! # Format
//!
//! ```json
//! {
//!   "schema_version": "scenario.v1",
//!   "config": { "initial_enabled": 1, "initial_passthrough": 65535,
//!               "max_records_per_cell": 16 },
//!   "steps": [
//!     { "op": "key", "x": 0, "y": 0, "state": "pressed", "velocity": 65535 },
//!     { "op": "key", "raw": 16, "state": "released" },
//!     { "op": "render" },
//!     { "op": "effects", "cell": 3 },
//!     { "op": "layer", "layer": 1, "kind": "enabled", "on": true },
//!     { "op": "reset_layers" },
//!     { "op": "init_layer", "layer": "top" },
//!     { "op": "deinit_layer", "layer": 1 }
//!   ]
//! }
//! ```
//!
//! `config` and every field inside it are optional. `velocity` defaults to
//! full scale.

use uad_kernel::operators::event::{KeyId, KeyInfo, KeyState};
use uad_kernel::runtime::config::RuntimeConfig;
use uad_kernel::runtime::layer_state::{LayerKind, LayerSelector};

/// The one accepted `schema_version`.
pub const SCENARIO_SCHEMA_VERSION: &str = "scenario.v1";

/// One scenario step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Key { key: KeyId, info: KeyInfo },
    Render,
    Effects { cell: u16 },
    SetLayer { layer: u8, kind: LayerKind, on: bool },
    ResetLayers,
    InitLayer(LayerSelector),
    DeinitLayer(LayerSelector),
}

impl Step {
    /// Operation name as written in scenario files.
    #[must_use]
    pub const fn op(&self) -> &'static str {
        match self {
            Self::Key { .. } => "key",
            Self::Render => "render",
            Self::Effects { .. } => "effects",
            Self::SetLayer { .. } => "layer",
            Self::ResetLayers => "reset_layers",
            Self::InitLayer(_) => "init_layer",
            Self::DeinitLayer(_) => "deinit_layer",
        }
    }
}

/// A parsed scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scenario {
    pub config: RuntimeConfig,
    pub steps: Vec<Step>,
}

/// Error parsing a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioError {
    /// Not valid JSON.
    Json { detail: String },
    /// Top-level shape or `schema_version` is wrong.
    Schema { detail: String },
    /// Step `index` is malformed.
    Step { index: usize, detail: String },
}

impl std::fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json { detail } => write!(f, "scenario is not valid JSON: {detail}"),
            Self::Schema { detail } => write!(f, "scenario schema error: {detail}"),
            Self::Step { index, detail } => write!(f, "scenario step {index}: {detail}"),
        }
    }
}

impl std::error::Error for ScenarioError {}

/// Parse scenario JSON bytes.
///
/// # Errors
///
/// Returns [`ScenarioError`] on invalid JSON, a wrong `schema_version`, or
/// any malformed step.
pub fn parse_scenario(bytes: &[u8]) -> Result<Scenario, ScenarioError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| ScenarioError::Json {
            detail: e.to_string(),
        })?;
    let root = value.as_object().ok_or_else(|| ScenarioError::Schema {
        detail: "top level must be an object".into(),
    })?;

    match root.get("schema_version").and_then(serde_json::Value::as_str) {
        Some(SCENARIO_SCHEMA_VERSION) => {}
        other => {
            return Err(ScenarioError::Schema {
                detail: format!("expected schema_version \"{SCENARIO_SCHEMA_VERSION}\", got {other:?}"),
            })
        }
    }

    let config = match root.get("config") {
        None | Some(serde_json::Value::Null) => RuntimeConfig::default(),
        Some(v) => parse_config(v)?,
    };

    let steps_json = root
        .get("steps")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| ScenarioError::Schema {
            detail: "missing \"steps\" array".into(),
        })?;
    let steps = steps_json
        .iter()
        .enumerate()
        .map(|(index, step)| {
            parse_step(step).map_err(|detail| ScenarioError::Step { index, detail })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Scenario { config, steps })
}

fn parse_config(value: &serde_json::Value) -> Result<RuntimeConfig, ScenarioError> {
    let schema = |detail: String| ScenarioError::Schema { detail };
    let obj = value
        .as_object()
        .ok_or_else(|| schema("\"config\" must be an object".into()))?;
    Ok(RuntimeConfig {
        initial_enabled: optional_uint(obj, "initial_enabled").map_err(schema)?,
        initial_passthrough: optional_uint(obj, "initial_passthrough").map_err(schema)?,
        max_records_per_cell: optional_uint(obj, "max_records_per_cell").map_err(schema)?,
    })
}

fn parse_step(value: &serde_json::Value) -> Result<Step, String> {
    let obj = value.as_object().ok_or("step must be an object")?;
    let op = obj
        .get("op")
        .and_then(serde_json::Value::as_str)
        .ok_or("missing \"op\"")?;
    match op {
        "key" => {
            let key = match optional_uint::<u16>(obj, "raw")? {
                Some(raw) => KeyId::from_raw(raw),
                None => {
                    let x = required_uint(obj, "x")?;
                    let y = required_uint(obj, "y")?;
                    KeyId::grid(x, y).ok_or_else(|| format!("grid key ({x}, {y}) out of range"))?
                }
            };
            let state_name = obj
                .get("state")
                .and_then(serde_json::Value::as_str)
                .ok_or("missing \"state\"")?;
            let state = KeyState::parse(state_name)
                .ok_or_else(|| format!("unknown key state \"{state_name}\""))?;
            let velocity = optional_uint(obj, "velocity")?.unwrap_or(u16::MAX);
            Ok(Step::Key {
                key,
                info: KeyInfo::new(state, velocity),
            })
        }
        "render" => Ok(Step::Render),
        "effects" => Ok(Step::Effects {
            cell: required_uint(obj, "cell")?,
        }),
        "layer" => {
            let kind = match obj.get("kind").and_then(serde_json::Value::as_str) {
                Some("enabled") => LayerKind::Enabled,
                Some("passthrough") => LayerKind::Passthrough,
                other => return Err(format!("unknown layer kind {other:?}")),
            };
            let on = obj
                .get("on")
                .and_then(serde_json::Value::as_bool)
                .ok_or("missing boolean \"on\"")?;
            Ok(Step::SetLayer {
                layer: required_uint(obj, "layer")?,
                kind,
                on,
            })
        }
        "reset_layers" => Ok(Step::ResetLayers),
        "init_layer" => Ok(Step::InitLayer(parse_selector(obj)?)),
        "deinit_layer" => Ok(Step::DeinitLayer(parse_selector(obj)?)),
        other => Err(format!("unknown op \"{other}\"")),
    }
}

fn parse_selector(obj: &serde_json::Map<String, serde_json::Value>) -> Result<LayerSelector, String> {
    match obj.get("layer") {
        None => Ok(LayerSelector::Top),
        Some(serde_json::Value::String(s)) if s == "top" => Ok(LayerSelector::Top),
        Some(_) => Ok(LayerSelector::from_raw(required_uint(obj, "layer")?)),
    }
}

fn optional_uint<T: TryFrom<u64>>(
    obj: &serde_json::Map<String, serde_json::Value>,
    field: &str,
) -> Result<Option<T>, String> {
    match obj.get(field) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| T::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| format!("\"{field}\" must be an unsigned integer in range")),
    }
}

fn required_uint<T: TryFrom<u64>>(
    obj: &serde_json::Map<String, serde_json::Value>,
    field: &str,
) -> Result<T, String> {
    optional_uint(obj, field)?.ok_or_else(|| format!("missing \"{field}\""))
}
