//! Name-keyed, typed publish/subscribe message bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! A topic is created lazily by whichever side touches it first and is bound
//! to that side's message type for the rest of the bus's life:
//!
//! | Topic | Message type |
//! |---|---|
//! | `myrobot_odom` | [`CustomOdom`][myrobot_types::CustomOdom] |
//! | `myrobot_cmd_vel` | [`CustomTwist`][myrobot_types::CustomTwist] |

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use myrobot_types::{Envelope, PluginError};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default channel capacity (number of buffered messages before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

struct TopicSlot {
    // Always a `broadcast::Sender<Envelope<T>>` for the bound `T`.
    sender: Box<dyn Any + Send + Sync>,
    receiver_count: Box<dyn Fn() -> usize + Send + Sync>,
}

/// Shared message bus. Clone it cheaply – all clones share the same topic
/// table.
#[derive(Clone)]
pub struct MessageBus {
    topics: Arc<RwLock<HashMap<String, TopicSlot>>>,
    capacity: usize,
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topics: Vec<String> = self
            .topics
            .read()
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("MessageBus")
            .field("capacity", &self.capacity)
            .field("topics", &topics)
            .finish()
    }
}

impl MessageBus {
    /// Create a new bus with the given per-topic channel capacity.  A
    /// capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Publish `msg` on `topic`, stamped with `source`.
    ///
    /// Returns the number of active receivers that were handed the message.
    ///
    /// # Errors
    ///
    /// * [`PluginError::Channel`] when nobody is subscribed to the topic.
    /// * [`PluginError::TopicTypeMismatch`] when the topic carries another
    ///   message type.
    pub fn publish<T>(
        &self,
        topic: &str,
        source: impl Into<String>,
        msg: T,
    ) -> Result<usize, PluginError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let sender = self.sender::<T>(topic)?;
        match sender.send(Envelope::new(source, msg)) {
            Ok(n) => {
                debug!(topic, receivers = n, "message published");
                Ok(n)
            }
            Err(broadcast::error::SendError(_)) => Err(PluginError::Channel(format!(
                "No subscribers for topic {topic}"
            ))),
        }
    }

    /// Subscribe to `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::TopicTypeMismatch`] when the topic carries
    /// another message type.
    pub fn subscribe<T>(&self, topic: &str) -> Result<TopicReceiver<T>, PluginError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let sender = self.sender::<T>(topic)?;
        Ok(TopicReceiver {
            topic: topic.to_string(),
            receiver: sender.subscribe(),
        })
    }

    /// Number of receivers currently subscribed to `topic` (0 for unknown
    /// topics).
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let Ok(topics) = self.topics.read() else {
            return 0;
        };
        topics
            .get(topic)
            .map(|slot| (slot.receiver_count)())
            .unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn sender<T>(&self, topic: &str) -> Result<broadcast::Sender<Envelope<T>>, PluginError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let mismatch = || PluginError::TopicTypeMismatch {
            topic: topic.to_string(),
            expected: type_name::<T>().to_string(),
        };

        {
            let topics = self
                .topics
                .read()
                .map_err(|_| PluginError::Channel("message bus lock poisoned".to_string()))?;
            if let Some(slot) = topics.get(topic) {
                return slot
                    .sender
                    .downcast_ref::<broadcast::Sender<Envelope<T>>>()
                    .cloned()
                    .ok_or_else(mismatch);
            }
        }

        let mut topics = self
            .topics
            .write()
            .map_err(|_| PluginError::Channel("message bus lock poisoned".to_string()))?;
        let slot = topics.entry(topic.to_string()).or_insert_with(|| {
            let (sender, _) = broadcast::channel::<Envelope<T>>(self.capacity);
            debug!(topic, msg_type = type_name::<T>(), "topic created");
            let counted = sender.clone();
            TopicSlot {
                sender: Box::new(sender),
                receiver_count: Box::new(move || counted.receiver_count()),
            }
        });
        slot.sender
            .downcast_ref::<broadcast::Sender<Envelope<T>>>()
            .cloned()
            .ok_or_else(mismatch)
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single topic.
///
/// Obtained via [`MessageBus::subscribe`].
pub struct TopicReceiver<T> {
    topic: String,
    receiver: broadcast::Receiver<Envelope<T>>,
}

impl<T: Clone> TopicReceiver<T> {
    /// Wait for the next message on this topic.
    ///
    /// A lagging receiver logs how many messages it missed and keeps
    /// reading.  Returns `None` once the bus has shut down.
    pub async fn recv(&mut self) -> Option<Envelope<T>> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = %self.topic, lagged_by = n, "TopicReceiver lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// The topic this receiver is bound to.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use myrobot_types::{CustomOdom, CustomTwist};

    fn odom(x: f64) -> CustomOdom {
        CustomOdom { x, y: 0.0, yaw: 0.0 }
    }

    #[tokio::test]
    async fn publish_and_receive() -> Result<(), Box<dyn std::error::Error>> {
        let bus = MessageBus::default();
        let mut rx = bus.subscribe::<CustomOdom>("myrobot_odom")?;

        bus.publish("myrobot_odom", "test", odom(1.0))?;

        let received = rx.recv().await.ok_or("No message received")?;
        assert_eq!(received.msg, odom(1.0));
        assert_eq!(received.source, "test");
        assert_eq!(rx.topic(), "myrobot_odom");
        Ok(())
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_message() -> Result<(), Box<dyn std::error::Error>> {
        let bus = MessageBus::default();
        let mut rx1 = bus.subscribe::<CustomOdom>("myrobot_odom")?;
        let mut rx2 = bus.subscribe::<CustomOdom>("myrobot_odom")?;
        assert_eq!(bus.subscriber_count("myrobot_odom"), 2);

        bus.publish("myrobot_odom", "test", odom(3.0))?;

        let a = rx1.recv().await.ok_or("subscriber 1 got nothing")?;
        let b = rx2.recv().await.ok_or("subscriber 2 got nothing")?;
        assert_eq!(a.id, b.id);
        Ok(())
    }

    #[test]
    fn publish_no_subscribers_returns_error() {
        let bus = MessageBus::default();
        let result = bus.publish("myrobot_odom", "test", odom(0.0));
        assert!(matches!(result, Err(PluginError::Channel(_))));
    }

    #[test]
    fn topic_is_bound_to_first_message_type() {
        let bus = MessageBus::default();
        let _rx = bus.subscribe::<CustomOdom>("myrobot_odom").unwrap();

        let result = bus.subscribe::<CustomTwist>("myrobot_odom");
        assert!(matches!(
            result,
            Err(PluginError::TopicTypeMismatch { ref topic, .. }) if topic == "myrobot_odom"
        ));

        let publish = bus.publish("myrobot_odom", "test", CustomTwist::default());
        assert!(matches!(publish, Err(PluginError::TopicTypeMismatch { .. })));
    }

    #[tokio::test]
    async fn topics_are_isolated() -> Result<(), Box<dyn std::error::Error>> {
        let bus = MessageBus::default();
        let mut cmd_rx = bus.subscribe::<CustomTwist>("myrobot_cmd_vel")?;
        let _odom_rx = bus.subscribe::<CustomOdom>("myrobot_odom")?;

        bus.publish("myrobot_odom", "test", odom(1.0))?;

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(50), cmd_rx.recv()).await;
        assert!(result.is_err(), "cmd_vel subscriber must not see odometry");
        Ok(())
    }

    #[tokio::test]
    async fn zero_capacity_bus_still_delivers() -> Result<(), Box<dyn std::error::Error>> {
        let bus = MessageBus::new(0);
        let mut rx = bus.subscribe::<CustomOdom>("myrobot_odom")?;
        bus.publish("myrobot_odom", "test", odom(3.0))?;

        let envelope = rx.recv().await.ok_or("bus closed")?;
        assert_eq!(envelope.msg.x, 3.0);
        Ok(())
    }

    #[tokio::test]
    async fn lagging_receiver_skips_ahead() {
        let bus = MessageBus::new(4);
        let mut slow = bus.subscribe::<CustomOdom>("myrobot_odom").unwrap();

        for i in 0..32 {
            let _ = bus.publish("myrobot_odom", "flood", odom(f64::from(i)));
        }

        // Lag is absorbed; the receiver resumes at the oldest retained message.
        let first = slow.recv().await.unwrap();
        assert_eq!(first.msg.x, 28.0);
    }
}
