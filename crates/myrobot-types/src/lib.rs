//! `myrobot-types` – shared vocabulary for the MyRobot plugin.
//!
//! Holds the manufacturer's fixed-layout wire records, the framework-neutral
//! ("generic") representations the host framework works with, and the single
//! error enum every other crate returns.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Device records (manufacturer wire layout)
// ---------------------------------------------------------------------------

/// Odometry feedback published by the robot on `myrobot_odom`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomOdom {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

/// Body-frame velocity command accepted by the robot as a topic message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomTwist {
    pub vx: f64,
    pub vy: f64,
    pub vyaw: f64,
}

/// Request half of the `RobotActionCall` service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RobotActionCallRequest {
    pub vx: f64,
    pub vy: f64,
    pub vyaw: f64,
}

/// Response half of the `RobotActionCall` service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotActionCallResponse {
    pub success: bool,
}

// ---------------------------------------------------------------------------
// Generic representations
// ---------------------------------------------------------------------------

/// Planar pose as `[x, y, yaw]`, in the same units and frame as the device
/// record it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseVector([f64; 3]);

impl PoseVector {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self([x, y, yaw])
    }

    pub fn x(&self) -> f64 {
        self.0[0]
    }

    pub fn y(&self) -> f64 {
        self.0[1]
    }

    pub fn yaw(&self) -> f64 {
        self.0[2]
    }

    pub fn as_array(&self) -> [f64; 3] {
        self.0
    }
}

impl From<PoseVector> for [f64; 3] {
    fn from(pose: PoseVector) -> Self {
        pose.0
    }
}

/// Named floating-point parameters as passed by the host framework to any
/// action.  Every action type shares this calling convention, so a given
/// action only reads the keys it needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionParams(BTreeMap<String, f64>);

impl ActionParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) -> Option<f64> {
        self.0.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Fetch a parameter the action cannot run without.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::MissingParameter`] when `name` is absent.
    pub fn require(&self, name: &str) -> Result<f64, PluginError> {
        self.get(name)
            .ok_or_else(|| PluginError::MissingParameter(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for ActionParams {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Structured body-frame velocity command.
///
/// `vx`, `vy` and `omega` are required.  Any other parameter the caller
/// supplied lands in `extra` and is never forwarded to the robot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TwistCommand {
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, f64>,
}

impl TwistCommand {
    pub const REQUIRED: [&'static str; 3] = ["vx", "vy", "omega"];

    pub fn new(vx: f64, vy: f64, omega: f64) -> Self {
        Self {
            vx,
            vy,
            omega,
            extra: BTreeMap::new(),
        }
    }
}

impl TryFrom<&ActionParams> for TwistCommand {
    type Error = PluginError;

    fn try_from(params: &ActionParams) -> Result<Self, Self::Error> {
        let vx = params.require("vx")?;
        let vy = params.require("vy")?;
        let omega = params.require("omega")?;
        let extra = params
            .iter()
            .filter(|(name, _)| !Self::REQUIRED.iter().any(|required| required == name))
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        Ok(Self {
            vx,
            vy,
            omega,
            extra,
        })
    }
}

// ---------------------------------------------------------------------------
// Transport envelope
// ---------------------------------------------------------------------------

/// Metadata wrapper around every message delivered by the middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "myrobot-server::minimal_service"
    pub source: String,
    pub msg: T,
}

impl<T> Envelope<T> {
    pub fn new(source: impl Into<String>, msg: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            msg,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type shared by the transport, the plugin and the server node.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PluginError {
    #[error("Missing required action parameter: {0}")]
    MissingParameter(String),

    #[error("Topic '{topic}' is bound to a different message type (expected {expected})")]
    TopicTypeMismatch { topic: String, expected: String },

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}
