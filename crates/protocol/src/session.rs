//! Client session: the state shared by all channels of one viewer and the
//! handlers that keep it current.

use crate::channel::{Channel, FrameSink};
use crate::clock::FrameClock;
use crate::control::{CAMERA_DEVICES, DRPAI_MODELS, Selector};
use crate::demux::{DecodedFrame, DecodedImage, Demultiplexer, Encoding};
use crate::overlay::{OverlayCache, OverlayView};
use crate::router::{Context, Handler};
use crate::streams::{StreamId, messages, protocols};
use crate::types::{ControlMessage, Device, Model};
use serde_json::Value;

/// Paints what the session hands over. Called synchronously from event
/// dispatch.
pub trait Renderer {
    fn draw_video(&mut self, image: &DecodedImage);

    fn draw_overlay(&mut self, overlay: OverlayView<'_>);

    fn elapsed(&mut self, _ticks: u64) {}
}

pub struct Session<R> {
    pub cameras: Selector<Device>,
    pub models: Selector<Model>,
    overlay: OverlayCache,
    clock: FrameClock,
    renderer: R,
}

impl<R: Renderer> Session<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            cameras: Selector::new(CAMERA_DEVICES),
            models: Selector::new(DRPAI_MODELS),
            overlay: OverlayCache::new(),
            clock: FrameClock::default(),
            renderer,
        }
    }

    pub fn with_frames_per_tick(mut self, frames_per_tick: u32) -> Self {
        self.clock = FrameClock::new(frames_per_tick);
        self
    }

    pub fn overlay(&self) -> &OverlayCache {
        &self.overlay
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn set_detection_results(&mut self, value: Option<&Value>) {
        self.overlay.set_results(value);
        tracing::debug!(boxes = self.overlay.boxes().len(), "Detection results updated");
        self.redraw_overlay();
    }

    fn redraw_overlay(&mut self) {
        self.renderer.draw_overlay(self.overlay.view());
    }
}

impl<R: Renderer> FrameSink for Session<R> {
    fn accept_frame(&mut self, frame: DecodedFrame) {
        match frame.stream {
            StreamId::DetectorOverlay => {
                self.overlay.set_image(frame.stream, frame.image);
                self.redraw_overlay();
            }
            StreamId::Camera => {
                self.renderer.draw_video(&frame.image);
                if let Some(ticks) = self.clock.advance() {
                    self.renderer.elapsed(ticks);
                }
            }
        }
    }
}

/// Requests the device list on open and stores the reply.
pub struct DeviceList;

impl<R: Renderer> Handler<Session<R>> for DeviceList {
    fn on_open(&mut self, cx: &mut Context<'_, Session<R>>) {
        cx.outbox
            .send(ControlMessage::request(messages::CAMERA_DEVICES_GET));
    }

    fn on_message(&mut self, cx: &mut Context<'_, Session<R>>, value: Option<&Value>) {
        cx.state.cameras.replace_items(Device::list_from_value(value));
    }
}

/// Requests the model list on open and stores the reply.
pub struct ModelList;

impl<R: Renderer> Handler<Session<R>> for ModelList {
    fn on_open(&mut self, cx: &mut Context<'_, Session<R>>) {
        cx.outbox
            .send(ControlMessage::request(messages::DRPAI_MODELS_GET));
    }

    fn on_message(&mut self, cx: &mut Context<'_, Session<R>>, value: Option<&Value>) {
        cx.state.models.replace_items(Model::list_from_value(value));
    }
}

pub struct DetectionResults;

impl<R: Renderer> Handler<Session<R>> for DetectionResults {
    fn on_message(&mut self, cx: &mut Context<'_, Session<R>>, value: Option<&Value>) {
        cx.state.set_detection_results(value);
    }
}

/// Replies to play/start commands carry nothing the session needs; the
/// router already logs backend errors.
pub struct CommandReply(pub &'static str);

impl<S> Handler<S> for CommandReply {
    fn on_message(&mut self, _cx: &mut Context<'_, S>, value: Option<&Value>) {
        tracing::debug!(name = self.0, value = ?value, "Command acknowledged");
    }
}

/// Camera channel: device enumeration, play/stop and the tagged JPEG
/// streams, with the legacy packed stream as fallback. The backend pushes
/// detection results for the overlay frames on this socket as well.
pub fn camera_channel<R: Renderer>() -> Channel<Session<R>> {
    let demux = Demultiplexer::new(StreamId::Camera)
        .with_stream(StreamId::Camera, Encoding::Jpeg)
        .with_stream(StreamId::DetectorOverlay, Encoding::Jpeg);

    let mut channel = Channel::new(protocols::CAMERA).with_demux(demux);
    let router = channel.router_mut();
    router.register(messages::CAMERA_DEVICES_GET, DeviceList);
    router.register(
        messages::CAMERA_DEVICE_PLAY,
        CommandReply(messages::CAMERA_DEVICE_PLAY),
    );
    router.register(messages::DRPAI_DETECTION_RESULT, DetectionResults);
    channel
}

/// Detector channel: model enumeration, start/stop and detection results.
pub fn drpai_channel<R: Renderer>() -> Channel<Session<R>> {
    let mut channel = Channel::new(protocols::DRPAI);
    let router = channel.router_mut();
    router.register(messages::DRPAI_MODELS_GET, ModelList);
    router.register(messages::DRPAI_DETECTION_RESULT, DetectionResults);
    router.register(
        messages::DRPAI_MODEL_START,
        CommandReply(messages::DRPAI_MODEL_START),
    );
    channel
}

/// Generic command channel. Only answers device enumeration.
pub fn command_channel<R: Renderer>() -> Channel<Session<R>> {
    let mut channel = Channel::new(protocols::COMMAND);
    channel
        .router_mut()
        .register(messages::CAMERA_DEVICES_GET, DeviceList);
    channel
}

/// Build the channel for a sub-protocol name.
pub fn channel_for<R: Renderer>(protocol: &str) -> Option<Channel<Session<R>>> {
    match protocol {
        protocols::CAMERA => Some(camera_channel()),
        protocols::DRPAI => Some(drpai_channel()),
        protocols::COMMAND => Some(command_channel()),
        _ => None,
    }
}
