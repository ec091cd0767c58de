//! Service clients for actions the robot exposes as services.
//!
//! Many manufacturers implement actions as services rather than topics.  A
//! client here turns the framework's generic parameters into the robot's
//! request record, performs exactly one call, and reduces the reply to a
//! boolean.

use async_trait::async_trait;
use myrobot_middleware::{ServiceBus, ServiceClient};
use myrobot_types::{
    ActionParams, PluginError, RobotActionCallRequest, RobotActionCallResponse, TwistCommand,
};
use tracing::debug;

use crate::types::action_call_request;

/// Service name the robot's control endpoint listens on unless configured
/// otherwise.
pub const DEFAULT_SRV_NAME: &str = "robot_control_service";

/// Interface name of the control service.
pub const ACTION_CALL_SRV_TYPE: &str = "myrobot_plugin_interface/srv/RobotActionCall";

/// How a single action call ended.
///
/// [`RobotPluginServiceClient::publish`] collapses this to `true` only for
/// [`ActionOutcome::Succeeded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The robot replied with `success = true`.
    Succeeded,
    /// The robot replied with `success = false`.
    Rejected,
    /// No reply arrived (service missing, request dropped, or transport
    /// timeout).
    NoResponse,
}

impl ActionOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, ActionOutcome::Succeeded)
    }
}

/// Every service-backed robot action implements this trait.
///
/// # Contract
///
/// * `publish` – receives the generic parameters for one action invocation,
///   sends one request to [`srv_name`][Self::srv_name] and returns whether
///   the robot reported success.  A missing required parameter is the only
///   `Err`; an absent or negative reply is `Ok(false)`.
#[async_trait]
pub trait RobotPluginServiceClient: Send + Sync {
    /// Name of the service this client calls.
    fn srv_name(&self) -> &str;

    /// Convert `params`, call the service and report success.
    async fn publish(&self, params: &ActionParams) -> Result<bool, PluginError>;
}

/// Sends body-frame velocity commands through the `RobotActionCall` service.
pub struct CustomTwistClient {
    client: ServiceClient<RobotActionCallRequest, RobotActionCallResponse>,
}

impl CustomTwistClient {
    /// Create a client for `srv_name` on `services`.
    pub fn new(services: &ServiceBus, srv_name: &str) -> Self {
        Self::from_client(services.client(srv_name))
    }

    /// Create a client for [`DEFAULT_SRV_NAME`].
    pub fn with_default_name(services: &ServiceBus) -> Self {
        Self::new(services, DEFAULT_SRV_NAME)
    }

    /// Wrap an already configured transport client (e.g. one with a
    /// timeout).
    pub fn from_client(
        client: ServiceClient<RobotActionCallRequest, RobotActionCallResponse>,
    ) -> Self {
        Self { client }
    }

    /// Send `cmd` and report how the call ended.
    pub async fn send_command(&self, cmd: &TwistCommand) -> ActionOutcome {
        let request = action_call_request(cmd);
        match self.client.call(request).await {
            Ok(RobotActionCallResponse { success: true }) => ActionOutcome::Succeeded,
            Ok(RobotActionCallResponse { success: false }) => ActionOutcome::Rejected,
            Err(e) => {
                debug!(service = %self.client.service_name(), error = %e, "no response to twist command");
                ActionOutcome::NoResponse
            }
        }
    }
}

#[async_trait]
impl RobotPluginServiceClient for CustomTwistClient {
    fn srv_name(&self) -> &str {
        self.client.service_name()
    }

    async fn publish(&self, params: &ActionParams) -> Result<bool, PluginError> {
        let cmd = TwistCommand::try_from(params)?;
        Ok(self.send_command(&cmd).await.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn twist_params(vx: f64, vy: f64, omega: f64) -> ActionParams {
        ActionParams::new()
            .with("vx", vx)
            .with("vy", vy)
            .with("omega", omega)
    }

    /// Serves the control service with a fixed reply and records every
    /// request it sees.
    fn spawn_robot(
        services: &ServiceBus,
        reply: Option<bool>,
    ) -> Arc<Mutex<Vec<RobotActionCallRequest>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let server = services
            .advertise::<RobotActionCallRequest, RobotActionCallResponse>(DEFAULT_SRV_NAME)
            .unwrap();
        tokio::spawn(server.serve(move |req| {
            log.lock().unwrap().push(req.msg);
            reply.map(|success| RobotActionCallResponse { success })
        }));
        seen
    }

    #[tokio::test]
    async fn publish_returns_true_on_success_reply() {
        let services = ServiceBus::default();
        let seen = spawn_robot(&services, Some(true));
        let client = CustomTwistClient::with_default_name(&services);

        assert_eq!(client.publish(&twist_params(1.0, 0.0, 0.3)).await, Ok(true));

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            [RobotActionCallRequest {
                vx: 1.0,
                vy: 0.0,
                vyaw: 0.3
            }]
        );
    }

    #[tokio::test]
    async fn publish_returns_false_on_rejection() {
        let services = ServiceBus::default();
        spawn_robot(&services, Some(false));
        let client = CustomTwistClient::with_default_name(&services);

        assert_eq!(client.publish(&twist_params(1.0, 0.0, 0.0)).await, Ok(false));
        assert_eq!(
            client.send_command(&TwistCommand::new(1.0, 0.0, 0.0)).await,
            ActionOutcome::Rejected
        );
    }

    #[tokio::test]
    async fn publish_returns_false_when_no_reply_arrives() {
        let services = ServiceBus::default();
        spawn_robot(&services, None);
        let client = CustomTwistClient::with_default_name(&services);

        assert_eq!(client.publish(&twist_params(1.0, 0.0, 0.0)).await, Ok(false));
        assert_eq!(
            client.send_command(&TwistCommand::new(1.0, 0.0, 0.0)).await,
            ActionOutcome::NoResponse
        );
    }

    #[tokio::test]
    async fn publish_returns_false_when_service_missing() {
        let services = ServiceBus::default();
        let client = CustomTwistClient::with_default_name(&services);
        assert_eq!(client.publish(&twist_params(1.0, 0.0, 0.0)).await, Ok(false));
    }

    #[tokio::test]
    async fn missing_parameter_fails_before_any_request() {
        let services = ServiceBus::default();
        let seen = spawn_robot(&services, Some(true));
        let client = CustomTwistClient::with_default_name(&services);

        let result = client
            .publish(&ActionParams::new().with("vx", 1.0).with("vy", 0.0))
            .await;
        assert_eq!(result, Err(PluginError::MissingParameter("omega".to_string())));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn extra_parameters_do_not_reach_the_robot() {
        let services = ServiceBus::default();
        let seen = spawn_robot(&services, Some(true));
        let client = CustomTwistClient::with_default_name(&services);

        let params = twist_params(0.5, 0.5, 0.1).with("frame_id", 3.0);
        assert_eq!(client.publish(&params).await, Ok(true));
        assert_eq!(
            seen.lock().unwrap()[0],
            RobotActionCallRequest {
                vx: 0.5,
                vy: 0.5,
                vyaw: 0.1
            }
        );
    }

    #[test]
    fn service_name_is_fixed_at_construction() {
        let services = ServiceBus::default();
        assert_eq!(
            CustomTwistClient::with_default_name(&services).srv_name(),
            "robot_control_service"
        );
        assert_eq!(
            CustomTwistClient::new(&services, "base/control").srv_name(),
            "base/control"
        );
    }
}
