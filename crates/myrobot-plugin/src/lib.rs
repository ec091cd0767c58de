//! `myrobot-plugin` – MyRobot adapter for the robot-abstraction framework
//!
//! Declares which of the robot's topics and services back the framework's
//! standard feedback and action types, and how records convert in between.
//!
//! # Modules
//!
//! - [`types`] – pure conversions: odometry callback and twist converter.
//! - [`clients`] – [`CustomTwistClient`][clients::CustomTwistClient]: turns a
//!   generic twist into one `RobotActionCall` service request.
//! - [`registration`] – [`RobotPlugin`][registration::RobotPlugin]: the
//!   immutable feedback/action table read by the host at load time.

pub mod clients;
pub mod registration;
pub mod types;

pub use clients::{ActionOutcome, CustomTwistClient, DEFAULT_SRV_NAME, RobotPluginServiceClient};
pub use registration::{
    ActionBinding, BoundAction, FeedbackBinding, FeedbackStream, RobotPlugin, TwistTransport,
    register, register_with,
};
