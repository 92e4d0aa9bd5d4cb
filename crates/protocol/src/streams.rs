//! Wire constants shared by the client channels.
//!
//! Sub-protocol names, control message names, binary stream tags and the
//! fixed raster size of the packed-pixel camera stream live here so that
//! the router, demultiplexer and session agree on them.

/// ASCII tag window at the start of a tagged binary frame.
pub const STREAM_TAG_LEN: usize = 15;

/// Tag window plus the reserved separator byte.
pub const STREAM_HEADER_LEN: usize = STREAM_TAG_LEN + 1;

/// Tag of the plain camera stream.
pub const TAG_CAMERA: &str = "camera";

/// Tag of the camera copy that was fed to the detector.
pub const TAG_DETECTOR_OVERLAY: &str = "drpai+camera";

/// Raster size of the legacy packed-pixel camera stream.
pub const RASTER_WIDTH: u32 = 640;
pub const RASTER_HEIGHT: u32 = 480;

/// Channel sub-protocols.
pub mod protocols {
    pub const CAMERA: &str = "camera";
    pub const DRPAI: &str = "drpai";
    pub const COMMAND: &str = "command";
}

/// Control message names.
pub mod messages {
    pub const CAMERA_DEVICES_GET: &str = "camera-devices-get";
    pub const CAMERA_DEVICE_PLAY: &str = "camera-device-play";
    pub const CAMERA_DEVICE_STOP: &str = "camera-device-stop";
    pub const DRPAI_MODELS_GET: &str = "drpai-models-get";
    pub const DRPAI_MODEL_START: &str = "drpai-model-start";
    pub const DRPAI_MODEL_STOP: &str = "drpai-model-stop";
    pub const DRPAI_DETECTION_RESULT: &str = "drpai-object-detection-result";
}

/// Logical stream a binary frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamId {
    /// Live camera video.
    Camera,
    /// Camera frame the detector ran on; drawn together with the results.
    DetectorOverlay,
}

impl StreamId {
    pub fn tag(&self) -> &'static str {
        match self {
            StreamId::Camera => TAG_CAMERA,
            StreamId::DetectorOverlay => TAG_DETECTOR_OVERLAY,
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            TAG_CAMERA => Some(StreamId::Camera),
            TAG_DETECTOR_OVERLAY => Some(StreamId::DetectorOverlay),
            _ => None,
        }
    }

    pub fn is_overlay(&self) -> bool {
        matches!(self, StreamId::DetectorOverlay)
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}
