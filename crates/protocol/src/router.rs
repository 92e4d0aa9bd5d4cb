use crate::channel::Outbox;
use crate::errors::ProtocolError;
use crate::types::ControlMessage;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Open,
    Close,
}

/// What a handler gets to work with during dispatch: the channel's outgoing
/// queue and the caller's state.
pub struct Context<'a, S> {
    pub outbox: &'a mut Outbox,
    pub state: &'a mut S,
}

impl<'a, S> Context<'a, S> {
    pub fn new(outbox: &'a mut Outbox, state: &'a mut S) -> Self {
        Self { outbox, state }
    }
}

/// Callbacks for one control message name. Every hook defaults to a no-op.
pub trait Handler<S> {
    fn on_open(&mut self, _cx: &mut Context<'_, S>) {}

    fn on_message(&mut self, _cx: &mut Context<'_, S>, _value: Option<&Value>) {}

    fn on_close(&mut self, _cx: &mut Context<'_, S>) {}
}

/// Adapts a closure into a handler that only listens for messages.
pub struct MessageFn<F>(pub F);

impl<S, F> Handler<S> for MessageFn<F>
where
    F: FnMut(&mut Context<'_, S>, Option<&Value>),
{
    fn on_message(&mut self, cx: &mut Context<'_, S>, value: Option<&Value>) {
        (self.0)(cx, value)
    }
}

type BoxedHandler<S> = Box<dyn Handler<S> + Send>;

/// Maps control message names to handlers.
///
/// Registration order is kept for lifecycle fan-out. Registering a name
/// twice replaces the earlier handler in place.
pub struct Router<S> {
    handlers: Vec<(String, BoxedHandler<S>)>,
}

impl<S> Default for Router<S> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }
}

impl<S> Router<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, name: impl Into<String>, handler: H)
    where
        H: Handler<S> + Send + 'static,
    {
        let name = name.into();
        let handler: BoxedHandler<S> = Box::new(handler);

        match self.handlers.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => {
                tracing::debug!(name = %name, "Replacing registered handler");
                entry.1 = handler;
            }
            None => self.handlers.push((name, handler)),
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|(n, _)| n.as_str())
    }

    /// Run the open or close hook of every handler, in registration order.
    pub fn dispatch_lifecycle(&mut self, event: Lifecycle, cx: &mut Context<'_, S>) {
        for (_, handler) in self.handlers.iter_mut() {
            match event {
                Lifecycle::Open => handler.on_open(cx),
                Lifecycle::Close => handler.on_close(cx),
            }
        }
    }

    /// Parse a text frame and hand its value to the matching handler.
    ///
    /// Returns `Ok(true)` when a handler ran. Messages without a name or
    /// with an unregistered name are dropped with `Ok(false)`; invalid JSON
    /// is returned as [`ProtocolError::MalformedMessage`].
    pub fn dispatch_message(
        &mut self,
        raw: &str,
        cx: &mut Context<'_, S>,
    ) -> Result<bool, ProtocolError> {
        let Some(msg) = ControlMessage::parse(raw)? else {
            tracing::debug!("Dropping control message without name");
            return Ok(false);
        };

        let Some((_, handler)) = self.handlers.iter_mut().find(|(n, _)| *n == msg.name) else {
            tracing::debug!(name = %msg.name, "Dropping unrouted control message");
            return Ok(false);
        };

        if let Some(error) = msg.error.as_deref() {
            tracing::warn!(name = %msg.name, error, "Backend reported an error");
        }

        handler.on_message(cx, msg.value.as_ref());
        Ok(true)
    }
}
