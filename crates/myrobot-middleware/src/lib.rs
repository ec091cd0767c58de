//! `myrobot-middleware` – in-process robotics transport
//!
//! Carries the manufacturer's records between the plugin and the robot
//! without caring about their meaning.  Stands in for the middleware's
//! topic and service layers so the plugin can be driven end to end inside a
//! single process.
//!
//! # Modules
//!
//! - [`bus`] – Name-keyed, typed publish/subscribe topics built on Tokio
//!   broadcast channels.
//! - [`service`] – Named request/response services with an optional
//!   per-client timeout.

pub mod bus;
pub mod service;

pub use bus::{MessageBus, TopicReceiver};
pub use service::{CallError, ServiceBus, ServiceCall, ServiceClient, ServiceServer};
