//! Callback configuration for transport events.
//!
//! The transport never surfaces connect, send, or receive failures through
//! its return values beyond a bare `bool`; everything interesting arrives
//! through the handlers registered here. Every handler is optional and
//! defaults to a no-op. A missing handler firing is not an error, the event
//! is simply dropped.
//!
//! Message and failure handlers are invoked synchronously on the receive
//! loop's task (or the sender's task for send failures). A consumer that
//! needs its own thread (a UI, typically) is responsible for marshaling.

use std::fmt;
use std::sync::Arc;

use crate::codec::Message;
use crate::error::TransportError;

/// Handler invoked with each inbound decoded message.
pub type MessageHandler = Arc<dyn Fn(Message) + Send + Sync>;

/// Handler invoked with a transport failure.
pub type FailureHandler = Arc<dyn Fn(TransportError) + Send + Sync>;

/// Optional callbacks wired into a [`ChatClient`](crate::client::ChatClient).
#[derive(Clone, Default)]
pub struct EventHandlers {
    message_received: Option<MessageHandler>,
    connect_failure: Option<FailureHandler>,
    receive_failure: Option<FailureHandler>,
    send_failure: Option<FailureHandler>,
}

impl EventHandlers {
    /// Create an empty handler set; every event is dropped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the handler for inbound messages.
    pub fn on_message_received(mut self, handler: impl Fn(Message) + Send + Sync + 'static) -> Self {
        self.message_received = Some(Arc::new(handler));
        self
    }

    /// Set the handler for failed connect attempts.
    pub fn on_connect_failure(
        mut self,
        handler: impl Fn(TransportError) + Send + Sync + 'static,
    ) -> Self {
        self.connect_failure = Some(Arc::new(handler));
        self
    }

    /// Set the handler for receive-side failures (unexpected disconnects,
    /// read errors, undecryptable frames).
    pub fn on_receive_failure(
        mut self,
        handler: impl Fn(TransportError) + Send + Sync + 'static,
    ) -> Self {
        self.receive_failure = Some(Arc::new(handler));
        self
    }

    /// Set the handler for send-side failures.
    pub fn on_send_failure(
        mut self,
        handler: impl Fn(TransportError) + Send + Sync + 'static,
    ) -> Self {
        self.send_failure = Some(Arc::new(handler));
        self
    }

    pub(crate) fn message_received(&self, message: Message) {
        if let Some(handler) = &self.message_received {
            handler(message);
        }
    }

    pub(crate) fn connect_failure(&self, error: TransportError) {
        if let Some(handler) = &self.connect_failure {
            handler(error);
        }
    }

    pub(crate) fn receive_failure(&self, error: TransportError) {
        if let Some(handler) = &self.receive_failure {
            handler(error);
        }
    }

    pub(crate) fn send_failure(&self, error: TransportError) {
        if let Some(handler) = &self.send_failure {
            handler(error);
        }
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn mark(set: bool) -> &'static str {
            if set {
                "set"
            } else {
                "unset"
            }
        }

        f.debug_struct("EventHandlers")
            .field("message_received", &mark(self.message_received.is_some()))
            .field("connect_failure", &mark(self.connect_failure.is_some()))
            .field("receive_failure", &mark(self.receive_failure.is_some()))
            .field("send_failure", &mark(self.send_failure.is_some()))
            .finish()
    }
}
