//! Stub control endpoint.
//!
//! [`StubResponder`] answers `RobotActionCall` requests in place of the real
//! robot: it logs the commanded velocities and always reports success.  No
//! motion happens and nothing is validated.

use myrobot_middleware::{ServiceBus, ServiceServer};
use myrobot_types::{Envelope, PluginError, RobotActionCallRequest, RobotActionCallResponse};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::ServerConfig;

pub struct StubResponder {
    node_name: String,
    server: ServiceServer<RobotActionCallRequest, RobotActionCallResponse>,
}

impl StubResponder {
    /// Advertise the control service named in `cfg`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Channel`] when another live server already owns
    /// the service name.
    pub fn advertise(services: &ServiceBus, cfg: &ServerConfig) -> Result<Self, PluginError> {
        let server = services.advertise(&cfg.service_name)?;
        info!(
            node = %cfg.node_name,
            service = %cfg.service_name,
            "Robot Custom Server Node is Running!"
        );
        Ok(Self {
            node_name: cfg.node_name.clone(),
            server,
        })
    }

    pub fn service_name(&self) -> &str {
        self.server.service_name()
    }

    /// Answer every request until the service is unadvertised.
    pub async fn run(self) {
        let node = self.node_name;
        self.server
            .serve(|request| Some(handle_request(&node, request)))
            .await;
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

fn handle_request(
    node: &str,
    request: &Envelope<RobotActionCallRequest>,
) -> RobotActionCallResponse {
    let msg = &request.msg;
    info!(
        node,
        request_id = %request.id,
        caller = %request.source,
        vx = msg.vx,
        vy = msg.vy,
        omega = msg.vyaw,
        "Incoming request"
    );
    RobotActionCallResponse { success: true }
}
