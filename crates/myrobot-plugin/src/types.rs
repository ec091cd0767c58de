//! Conversions between the robot's records and the framework's generic
//! representations.
//!
//! A feedback type gets a *callback* (device record → generic value); an
//! action type gets a *converter* (generic parameters → device record).
//! Every function here is pure and performs no range validation.

use myrobot_types::{
    ActionParams, CustomOdom, CustomTwist, PluginError, PoseVector, RobotActionCallRequest,
    TwistCommand,
};

/// Interface name of the odometry record.
pub const ODOM_MSG_TYPE: &str = "myrobot_plugin_interface/msg/CustomOdom";

/// Interface name of the topic velocity command.
pub const TWIST_MSG_TYPE: &str = "myrobot_plugin_interface/msg/CustomTwist";

/// Odometry callback: `[x, y, yaw]`, or nothing when no record arrived.
pub fn odom_callback(msg: Option<&CustomOdom>) -> Option<PoseVector> {
    let msg = msg?;
    Some(PoseVector::new(msg.x, msg.y, msg.yaw))
}

/// Twist converter used when the robot takes velocity commands on a topic.
///
/// # Errors
///
/// Returns [`PluginError::MissingParameter`] when `vx`, `vy` or `omega` is
/// absent.  Other parameters are accepted and dropped.
pub fn twist_converter(params: &ActionParams) -> Result<CustomTwist, PluginError> {
    let cmd = TwistCommand::try_from(params)?;
    Ok(twist_from_command(&cmd))
}

pub fn twist_from_command(cmd: &TwistCommand) -> CustomTwist {
    CustomTwist {
        vx: cmd.vx,
        vy: cmd.vy,
        vyaw: cmd.omega,
    }
}

/// `RobotActionCall` request carrying the same velocities as [`twist_from_command`].
pub fn action_call_request(cmd: &TwistCommand) -> RobotActionCallRequest {
    let twist = twist_from_command(cmd);
    RobotActionCallRequest {
        vx: twist.vx,
        vy: twist.vy,
        vyaw: twist.vyaw,
    }
}
