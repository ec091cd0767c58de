//! The plugin's registration table.
//!
//! The host framework reads a [`RobotPlugin`] once at load time.  Each entry
//! maps a standard type name to either a topic descriptor or a service
//! client factory:
//!
//! | Kind | Name | Binding |
//! |---|---|---|
//! | feedback | `"Odometry"` | topic `myrobot_odom` ([`CustomOdom`]) |
//! | action | `"Twist"` | service `robot_control_service`, or topic `myrobot_cmd_vel` with [`TwistTransport::Topic`] |
//!
//! The table is immutable after [`register`] returns.

use std::collections::BTreeMap;
use std::fmt;

use futures_util::stream::{self, BoxStream};
use myrobot_middleware::{MessageBus, ServiceBus, TopicReceiver};
use myrobot_types::{ActionParams, CustomOdom, CustomTwist, PluginError, PoseVector};
use tracing::debug;

use crate::clients::{ACTION_CALL_SRV_TYPE, CustomTwistClient, DEFAULT_SRV_NAME, RobotPluginServiceClient};
use crate::types::{ODOM_MSG_TYPE, TWIST_MSG_TYPE, odom_callback, twist_converter};

/// Standard feedback type name for planar odometry.
pub const ODOMETRY: &str = "Odometry";

/// Standard action type name for body-frame velocity commands.
pub const TWIST: &str = "Twist";

/// Topic the robot publishes odometry on.
pub const ODOM_TOPIC: &str = "myrobot_odom";

/// Topic the robot accepts velocity commands on.
pub const CMD_VEL_TOPIC: &str = "myrobot_cmd_vel";

const SOURCE: &str = "myrobot-plugin";

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

/// A feedback value read from a topic and converted by `callback`.
#[derive(Clone, Copy)]
pub struct FeedbackTopic {
    pub name: &'static str,
    pub msg_type: &'static str,
    pub callback: fn(Option<&CustomOdom>) -> Option<PoseVector>,
}

impl fmt::Debug for FeedbackTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedbackTopic")
            .field("name", &self.name)
            .field("msg_type", &self.msg_type)
            .finish_non_exhaustive()
    }
}

impl FeedbackTopic {
    /// Subscribe to the topic on `bus`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::TopicTypeMismatch`] when the topic already
    /// carries another message type.
    pub fn attach(&self, bus: &MessageBus) -> Result<FeedbackStream, PluginError> {
        let receiver = bus.subscribe::<CustomOdom>(self.name)?;
        debug!(topic = self.name, msg_type = self.msg_type, "feedback attached");
        Ok(FeedbackStream {
            receiver,
            callback: self.callback,
        })
    }
}

/// Converted feedback values from one topic subscription.
pub struct FeedbackStream {
    receiver: TopicReceiver<CustomOdom>,
    callback: fn(Option<&CustomOdom>) -> Option<PoseVector>,
}

impl FeedbackStream {
    /// Wait for the next record that converts to a pose.  Records the
    /// callback rejects are skipped.  Returns `None` once the bus has shut
    /// down.
    pub async fn next_pose(&mut self) -> Option<PoseVector> {
        loop {
            let envelope = self.receiver.recv().await?;
            if let Some(pose) = (self.callback)(Some(&envelope.msg)) {
                return Some(pose);
            }
        }
    }

    pub fn into_stream(self) -> BoxStream<'static, PoseVector> {
        Box::pin(stream::unfold(self, |mut feedback| async move {
            let pose = feedback.next_pose().await?;
            Some((pose, feedback))
        }))
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FeedbackBinding {
    Topic(FeedbackTopic),
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// An action published on a topic after `converter` builds the record.
#[derive(Clone, Copy)]
pub struct ActionTopic {
    pub name: &'static str,
    pub msg_type: &'static str,
    pub converter: fn(&ActionParams) -> Result<CustomTwist, PluginError>,
}

impl fmt::Debug for ActionTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionTopic")
            .field("name", &self.name)
            .field("msg_type", &self.msg_type)
            .finish_non_exhaustive()
    }
}

impl ActionTopic {
    /// Convert `params` and publish the record.
    ///
    /// Returns `Ok(false)` when nobody is listening on the topic.
    ///
    /// # Errors
    ///
    /// * [`PluginError::MissingParameter`] from the converter.
    /// * [`PluginError::TopicTypeMismatch`] from the bus.
    pub fn publish(&self, bus: &MessageBus, params: &ActionParams) -> Result<bool, PluginError> {
        let msg = (self.converter)(params)?;
        match bus.publish(self.name, SOURCE, msg) {
            Ok(receivers) => Ok(receivers > 0),
            Err(PluginError::Channel(reason)) => {
                debug!(topic = self.name, %reason, "action not delivered");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

/// Builds the service client for an action.
#[derive(Clone, Copy)]
pub struct ClientFactory {
    pub srv_name: &'static str,
    pub srv_type: &'static str,
    build: fn(&ServiceBus, &str) -> Box<dyn RobotPluginServiceClient>,
}

impl fmt::Debug for ClientFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientFactory")
            .field("srv_name", &self.srv_name)
            .field("srv_type", &self.srv_type)
            .finish_non_exhaustive()
    }
}

impl ClientFactory {
    /// Build a client for the default service name.
    pub fn connect(&self, services: &ServiceBus) -> Box<dyn RobotPluginServiceClient> {
        self.connect_to(services, self.srv_name)
    }

    /// Build a client for an overridden service name.
    pub fn connect_to(
        &self,
        services: &ServiceBus,
        srv_name: &str,
    ) -> Box<dyn RobotPluginServiceClient> {
        (self.build)(services, srv_name)
    }
}

fn build_twist_client(services: &ServiceBus, srv_name: &str) -> Box<dyn RobotPluginServiceClient> {
    Box::new(CustomTwistClient::new(services, srv_name))
}

#[derive(Debug, Clone, Copy)]
pub enum ActionBinding {
    Topic(ActionTopic),
    ServiceClient(ClientFactory),
}

impl ActionBinding {
    /// Resolve this binding against the host's transports.
    pub fn bind(&self, bus: &MessageBus, services: &ServiceBus) -> BoundAction {
        match self {
            ActionBinding::Topic(topic) => BoundAction::Topic {
                topic: *topic,
                bus: bus.clone(),
            },
            ActionBinding::ServiceClient(factory) => {
                BoundAction::Service(factory.connect(services))
            }
        }
    }
}

/// An action ready to be invoked with generic parameters.
pub enum BoundAction {
    Topic { topic: ActionTopic, bus: MessageBus },
    Service(Box<dyn RobotPluginServiceClient>),
}

impl BoundAction {
    /// Invoke the action once.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::MissingParameter`] for incomplete parameters.
    pub async fn publish(&self, params: &ActionParams) -> Result<bool, PluginError> {
        match self {
            BoundAction::Topic { topic, bus } => topic.publish(bus, params),
            BoundAction::Service(client) => client.publish(params).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Which transport carries the `"Twist"` action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TwistTransport {
    /// `RobotActionCall` service on `robot_control_service`.
    #[default]
    Service,
    /// `CustomTwist` messages on `myrobot_cmd_vel`.
    Topic,
}

/// Immutable association of standard type names to bindings.
#[derive(Debug, Clone)]
pub struct RobotPlugin {
    feedback: BTreeMap<&'static str, FeedbackBinding>,
    action: BTreeMap<&'static str, ActionBinding>,
}

impl RobotPlugin {
    pub fn feedback(&self, name: &str) -> Option<&FeedbackBinding> {
        self.feedback.get(name)
    }

    pub fn action(&self, name: &str) -> Option<&ActionBinding> {
        self.action.get(name)
    }

    pub fn feedback_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.feedback.keys().copied()
    }

    pub fn action_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.action.keys().copied()
    }
}

/// Build the table with `"Twist"` served by the control service.
pub fn register() -> RobotPlugin {
    register_with(TwistTransport::default())
}

/// Build the table with `"Twist"` on the chosen transport.
pub fn register_with(twist: TwistTransport) -> RobotPlugin {
    let mut feedback = BTreeMap::new();
    feedback.insert(
        ODOMETRY,
        FeedbackBinding::Topic(FeedbackTopic {
            name: ODOM_TOPIC,
            msg_type: ODOM_MSG_TYPE,
            callback: odom_callback,
        }),
    );

    let twist_binding = match twist {
        TwistTransport::Service => ActionBinding::ServiceClient(ClientFactory {
            srv_name: DEFAULT_SRV_NAME,
            srv_type: ACTION_CALL_SRV_TYPE,
            build: build_twist_client,
        }),
        TwistTransport::Topic => ActionBinding::Topic(ActionTopic {
            name: CMD_VEL_TOPIC,
            msg_type: TWIST_MSG_TYPE,
            converter: twist_converter,
        }),
    };
    let mut action = BTreeMap::new();
    action.insert(TWIST, twist_binding);

    RobotPlugin { feedback, action }
}
