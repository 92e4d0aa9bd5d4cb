pub mod channel;
pub mod clock;
pub mod control;
pub mod demux;
pub mod errors;
pub mod overlay;
pub mod router;
pub mod session;
pub mod streams;
pub mod types;
pub mod yuv;

#[cfg(feature = "ws")]
pub mod ws;

pub use channel::{Channel, ChannelState, Event, FrameSink, Inbound, Outbox};
pub use clock::FrameClock;
pub use control::{ControlError, ControlState, SelectOption, Selectable, Selector};
pub use demux::{DecodedFrame, DecodedImage, Demultiplexer, EncodedImage, Encoding};
pub use errors::ProtocolError;
pub use overlay::{OverlayCache, OverlayImage, OverlayView};
pub use router::{Context, Handler, Lifecycle, MessageFn, Router};
pub use session::{Renderer, Session};
pub use streams::StreamId;
pub use types::{BoundingBox, ControlMessage, Detection, Device, Model, Resolution};
