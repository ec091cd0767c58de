//! `myrobot-server` – stand-in for the robot's control endpoint
//!
//! Hosts a [`StubResponder`][responder::StubResponder] that accepts
//! `RobotActionCall` requests and always reports success, so the plugin's
//! action client can be exercised without hardware.
//!
//! # Modules
//!
//! - [`config`] – `~/.myrobot/server.toml` plus `MYROBOT_*` overrides.
//! - [`responder`] – the stub service node.

pub mod config;
pub mod responder;

pub use config::ServerConfig;
pub use responder::StubResponder;
