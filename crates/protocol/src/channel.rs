use crate::demux::{DecodedFrame, Demultiplexer};
use crate::errors::ProtocolError;
use crate::router::{Context, Lifecycle, Router};
use crate::types::ControlMessage;
use std::collections::VecDeque;

/// Control messages waiting to be written to the transport.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: VecDeque<ControlMessage>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, msg: ControlMessage) {
        tracing::debug!(name = %msg.name, "Queueing control message");
        self.pending.push_back(msg);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = ControlMessage> + '_ {
        self.pending.drain(..)
    }
}

/// Payload of one transport message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Binary(Vec<u8>),
}

/// Transport event delivered to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open,
    Message(Inbound),
    Close { reason: Option<String> },
}

/// Receives demultiplexed frames.
pub trait FrameSink {
    fn accept_frame(&mut self, frame: DecodedFrame);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

/// One logical connection, identified by its sub-protocol.
///
/// Text frames go to the router, binary frames to the demultiplexer and on
/// to the [`FrameSink`]. Events are handled one at a time to completion.
pub struct Channel<S> {
    protocol: String,
    router: Router<S>,
    demux: Option<Demultiplexer>,
    outbox: Outbox,
    state: ChannelState,
}

impl<S: FrameSink> Channel<S> {
    pub fn new(protocol: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            router: Router::new(),
            demux: None,
            outbox: Outbox::new(),
            state: ChannelState::Connecting,
        }
    }

    pub fn with_demux(mut self, demux: Demultiplexer) -> Self {
        self.demux = Some(demux);
        self
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    pub fn router_mut(&mut self) -> &mut Router<S> {
        &mut self.router
    }

    pub fn outbox_mut(&mut self) -> &mut Outbox {
        &mut self.outbox
    }

    /// Queue a control message from outside the dispatch path.
    pub fn send(&mut self, msg: ControlMessage) -> Result<(), ProtocolError> {
        if self.state == ChannelState::Closed {
            return Err(ProtocolError::ChannelClosed(self.protocol.clone()));
        }
        self.outbox.send(msg);
        Ok(())
    }

    /// Serialize everything queued so far into text frames.
    pub fn take_outgoing(&mut self) -> Result<Vec<String>, ProtocolError> {
        if self.state == ChannelState::Closed && !self.outbox.is_empty() {
            tracing::debug!(
                protocol = %self.protocol,
                dropped = self.outbox.len(),
                "Discarding messages queued on closed channel"
            );
            self.outbox.drain().for_each(drop);
        }
        self.outbox.drain().map(|msg| msg.to_text()).collect()
    }

    /// Process one transport event.
    ///
    /// A text frame that is not valid JSON is returned as
    /// [`ProtocolError::MalformedMessage`]; the channel stays usable.
    pub fn handle(&mut self, event: Event, state: &mut S) -> Result<(), ProtocolError> {
        match event {
            Event::Open => {
                tracing::info!(protocol = %self.protocol, "Channel open");
                self.state = ChannelState::Open;
                let mut cx = Context::new(&mut self.outbox, state);
                self.router.dispatch_lifecycle(Lifecycle::Open, &mut cx);
                Ok(())
            }
            Event::Close { reason } => {
                tracing::info!(protocol = %self.protocol, reason = ?reason, "Channel closed");
                self.state = ChannelState::Closed;
                let mut cx = Context::new(&mut self.outbox, state);
                self.router.dispatch_lifecycle(Lifecycle::Close, &mut cx);
                Ok(())
            }
            Event::Message(_) if self.state == ChannelState::Closed => {
                tracing::debug!(protocol = %self.protocol, "Ignoring message after close");
                Ok(())
            }
            Event::Message(Inbound::Text(text)) => {
                let mut cx = Context::new(&mut self.outbox, state);
                self.router.dispatch_message(&text, &mut cx).map(|_| ())
            }
            Event::Message(Inbound::Binary(data)) => {
                self.handle_binary(&data, state);
                Ok(())
            }
        }
    }

    fn handle_binary(&mut self, data: &[u8], state: &mut S) {
        let Some(demux) = self.demux.as_ref() else {
            tracing::debug!(
                protocol = %self.protocol,
                bytes = data.len(),
                "Binary frame on channel without streams - dropping"
            );
            return;
        };

        if let Some(frame) = demux.demux(data) {
            state.accept_frame(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demux::{Encoding, tagged_frame};
    use crate::router::{Handler, MessageFn};
    use crate::streams::StreamId;
    use serde_json::Value;

    #[derive(Default)]
    struct Sink {
        frames: Vec<StreamId>,
        messages: usize,
    }

    impl FrameSink for Sink {
        fn accept_frame(&mut self, frame: DecodedFrame) {
            self.frames.push(frame.stream);
        }
    }

    struct Greeter;

    impl Handler<Sink> for Greeter {
        fn on_open(&mut self, cx: &mut Context<'_, Sink>) {
            cx.outbox.send(ControlMessage::request("hello"));
        }
    }

    fn camera_channel() -> Channel<Sink> {
        Channel::new("camera").with_demux(
            Demultiplexer::new(StreamId::Camera)
                .with_stream(StreamId::Camera, Encoding::Jpeg)
                .with_stream(StreamId::DetectorOverlay, Encoding::Jpeg),
        )
    }

    #[test]
    fn test_open_runs_handlers_and_queues_requests() {
        let mut channel = camera_channel();
        let mut sink = Sink::default();
        channel.router_mut().register("hello", Greeter);

        channel.handle(Event::Open, &mut sink).unwrap();

        assert!(channel.is_open());
        assert_eq!(channel.take_outgoing().unwrap(), vec![r#"{"name":"hello"}"#]);
        assert!(channel.take_outgoing().unwrap().is_empty());
    }

    #[test]
    fn test_text_goes_to_router_and_binary_to_sink() {
        let mut channel = camera_channel();
        let mut sink = Sink::default();
        channel.router_mut().register(
            "count",
            MessageFn(|cx: &mut Context<'_, Sink>, _: Option<&Value>| cx.state.messages += 1),
        );

        channel.handle(Event::Open, &mut sink).unwrap();
        channel
            .handle(Event::Message(Inbound::Text(r#"{"name":"count"}"#.into())), &mut sink)
            .unwrap();
        channel
            .handle(
                Event::Message(Inbound::Binary(tagged_frame(StreamId::DetectorOverlay, &[1, 2]))),
                &mut sink,
            )
            .unwrap();
        channel
            .handle(Event::Message(Inbound::Binary(vec![128; 8])), &mut sink)
            .unwrap();

        assert_eq!(sink.messages, 1);
        assert_eq!(sink.frames, vec![StreamId::DetectorOverlay, StreamId::Camera]);
    }

    #[test]
    fn test_malformed_text_surfaces_but_channel_survives() {
        let mut channel = camera_channel();
        let mut sink = Sink::default();
        channel.handle(Event::Open, &mut sink).unwrap();

        let err = channel
            .handle(Event::Message(Inbound::Text("{oops".into())), &mut sink)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedMessage(_)));

        channel
            .handle(Event::Message(Inbound::Binary(vec![128; 4])), &mut sink)
            .unwrap();
        assert_eq!(sink.frames.len(), 1);
    }

    #[test]
    fn test_binary_without_demux_is_dropped() {
        let mut channel: Channel<Sink> = Channel::new("drpai");
        let mut sink = Sink::default();
        channel.handle(Event::Open, &mut sink).unwrap();

        channel
            .handle(Event::Message(Inbound::Binary(vec![1, 2, 3, 4])), &mut sink)
            .unwrap();

        assert!(sink.frames.is_empty());
    }

    #[test]
    fn test_closed_channel_rejects_sends_and_ignores_messages() {
        let mut channel = camera_channel();
        let mut sink = Sink::default();
        channel.handle(Event::Open, &mut sink).unwrap();
        channel.outbox_mut().send(ControlMessage::request("late"));
        channel
            .handle(Event::Close { reason: Some("going away".into()) }, &mut sink)
            .unwrap();

        assert_eq!(channel.state(), ChannelState::Closed);
        assert!(matches!(
            channel.send(ControlMessage::request("x")),
            Err(ProtocolError::ChannelClosed(p)) if p == "camera"
        ));
        assert!(channel.take_outgoing().unwrap().is_empty());

        channel
            .handle(Event::Message(Inbound::Binary(vec![128; 4])), &mut sink)
            .unwrap();
        assert!(sink.frames.is_empty());
    }
}
