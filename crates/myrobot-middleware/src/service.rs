//! Named request/response services.
//!
//! A server advertises a service name on the [`ServiceBus`] and receives
//! [`ServiceCall`]s over a [`tokio::sync::mpsc`] queue.  Each call carries a
//! [`tokio::sync::oneshot`] reply slot, so a client awaits exactly one
//! response or learns that none is coming.
//!
//! Clients resolve the service on every call, so a client may be created
//! before its server exists.  The transport never retries.  Timeouts are
//! opt-in per client via [`ServiceClient::with_timeout`].

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use myrobot_types::{Envelope, PluginError};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Default request queue depth per service.
const DEFAULT_QUEUE_DEPTH: usize = 32;

/// Why a service call produced no response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("service '{0}' is not available")]
    NotAvailable(String),

    #[error("service '{service}' is bound to a different service type (expected {expected})")]
    TypeMismatch { service: String, expected: String },

    #[error("service '{0}' dropped the request without responding")]
    NoResponse(String),

    #[error("service '{service}' did not respond within {timeout:?}")]
    TimedOut { service: String, timeout: Duration },
}

/// One in-flight request together with its reply slot.
pub struct ServiceCall<Req, Resp> {
    pub request: Envelope<Req>,
    reply: oneshot::Sender<Resp>,
}

impl<Req, Resp> ServiceCall<Req, Resp> {
    /// Send `response` back to the caller.
    ///
    /// Returns `false` when the caller has already gone away (e.g. it timed
    /// out).
    pub fn respond(self, response: Resp) -> bool {
        self.reply.send(response).is_ok()
    }
}

type CallSender<Req, Resp> = mpsc::Sender<ServiceCall<Req, Resp>>;

struct ServiceSlot {
    // Always a `CallSender<Req, Resp>` for the bound pair.
    sender: Box<dyn Any + Send + Sync>,
    is_closed: Box<dyn Fn() -> bool + Send + Sync>,
}

/// Shared registry of advertised services. Clone it cheaply – all clones
/// share the same table.
#[derive(Clone)]
pub struct ServiceBus {
    services: Arc<RwLock<HashMap<String, ServiceSlot>>>,
    queue_depth: usize,
}

impl std::fmt::Debug for ServiceBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let services: Vec<String> = self
            .services
            .read()
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("ServiceBus")
            .field("queue_depth", &self.queue_depth)
            .field("services", &services)
            .finish()
    }
}

impl ServiceBus {
    /// Create a registry whose services buffer up to `queue_depth` pending
    /// requests each.
    pub fn new(queue_depth: usize) -> Self {
        Self {
            services: Arc::new(RwLock::new(HashMap::new())),
            queue_depth: queue_depth.max(1),
        }
    }

    /// Advertise `name` and return the server end.
    ///
    /// A name whose previous server has shut down may be advertised again.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Channel`] when a live server already owns the
    /// name.
    pub fn advertise<Req, Resp>(&self, name: &str) -> Result<ServiceServer<Req, Resp>, PluginError>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
    {
        let mut services = self
            .services
            .write()
            .map_err(|_| PluginError::Channel("service registry lock poisoned".to_string()))?;

        if let Some(slot) = services.get(name)
            && !(slot.is_closed)()
        {
            return Err(PluginError::Channel(format!(
                "service '{name}' is already advertised"
            )));
        }

        let (sender, receiver) = mpsc::channel::<ServiceCall<Req, Resp>>(self.queue_depth);
        let watched = sender.clone();
        services.insert(
            name.to_string(),
            ServiceSlot {
                sender: Box::new(sender),
                is_closed: Box::new(move || watched.is_closed()),
            },
        );
        debug!(service = name, srv_type = type_name::<Req>(), "service advertised");

        Ok(ServiceServer {
            name: name.to_string(),
            receiver,
        })
    }

    /// Remove `name` from the registry.  Its server stops once in-flight
    /// callers have finished.
    pub fn unadvertise(&self, name: &str) -> bool {
        match self.services.write() {
            Ok(mut services) => services.remove(name).is_some(),
            Err(_) => false,
        }
    }

    /// Whether a live server currently owns `name`.
    pub fn is_available(&self, name: &str) -> bool {
        self.services
            .read()
            .ok()
            .and_then(|s| s.get(name).map(|slot| !(slot.is_closed)()))
            .unwrap_or(false)
    }

    /// Build a client for `name`.  The service does not need to exist yet.
    pub fn client<Req, Resp>(&self, name: &str) -> ServiceClient<Req, Resp>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
    {
        ServiceClient {
            bus: self.clone(),
            name: name.to_string(),
            source: format!("myrobot-middleware::client/{name}"),
            timeout: None,
            _marker: std::marker::PhantomData,
        }
    }

    fn resolve<Req, Resp>(&self, name: &str) -> Result<CallSender<Req, Resp>, CallError>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
    {
        let services = self
            .services
            .read()
            .map_err(|_| CallError::NotAvailable(name.to_string()))?;
        let slot = services
            .get(name)
            .ok_or_else(|| CallError::NotAvailable(name.to_string()))?;
        slot.sender
            .downcast_ref::<CallSender<Req, Resp>>()
            .cloned()
            .ok_or_else(|| CallError::TypeMismatch {
                service: name.to_string(),
                expected: type_name::<Req>().to_string(),
            })
    }
}

impl Default for ServiceBus {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_DEPTH)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Caller side of a named service.
pub struct ServiceClient<Req, Resp> {
    bus: ServiceBus,
    name: String,
    source: String,
    timeout: Option<Duration>,
    _marker: std::marker::PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> ServiceClient<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Give up on a call once `timeout` has elapsed without a response.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Stamp outgoing requests with `source` instead of the default.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn service_name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_service_available(&self) -> bool {
        self.bus.is_available(&self.name)
    }

    /// Send `request` and wait for the single response.
    ///
    /// # Errors
    ///
    /// See [`CallError`] for the ways a call can end without a response.
    pub async fn call(&self, request: Req) -> Result<Resp, CallError> {
        let sender = self.bus.resolve::<Req, Resp>(&self.name)?;
        let (reply, response) = oneshot::channel();
        let call = ServiceCall {
            request: Envelope::new(self.source.clone(), request),
            reply,
        };
        let request_id = call.request.id;

        // The deadline covers waiting for queue space as well as the reply.
        let exchange = async move {
            sender
                .send(call)
                .await
                .map_err(|_| CallError::NotAvailable(self.name.clone()))?;
            debug!(service = %self.name, %request_id, "request sent");
            response
                .await
                .map_err(|_| CallError::NoResponse(self.name.clone()))
        };

        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, exchange)
                .await
                .map_err(|_| CallError::TimedOut {
                    service: self.name.clone(),
                    timeout,
                })?,
            None => exchange.await,
        }
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Server side of a named service.
pub struct ServiceServer<Req, Resp> {
    name: String,
    receiver: mpsc::Receiver<ServiceCall<Req, Resp>>,
}

impl<Req, Resp> ServiceServer<Req, Resp> {
    pub fn service_name(&self) -> &str {
        &self.name
    }

    /// Wait for the next request.  Returns `None` once the service has been
    /// unadvertised and every pending call has been drained.
    pub async fn next_request(&mut self) -> Option<ServiceCall<Req, Resp>> {
        self.receiver.recv().await
    }

    /// Answer every incoming request with `handler` until the service shuts
    /// down.
    ///
    /// A handler returning `None` drops the reply slot; the caller then sees
    /// [`CallError::NoResponse`].
    pub async fn serve<F>(mut self, mut handler: F)
    where
        F: FnMut(&Envelope<Req>) -> Option<Resp>,
    {
        while let Some(call) = self.receiver.recv().await {
            let request_id = call.request.id;
            match handler(&call.request) {
                Some(response) => {
                    if !call.respond(response) {
                        debug!(service = %self.name, %request_id, "caller left before response");
                    }
                }
                None => {
                    warn!(service = %self.name, %request_id, "request dropped without response");
                }
            }
        }
        debug!(service = %self.name, "service stopped");
    }
}
