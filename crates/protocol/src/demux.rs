use crate::streams::{RASTER_HEIGHT, RASTER_WIDTH, STREAM_HEADER_LEN, STREAM_TAG_LEN, StreamId};
use crate::yuv;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// How the payload of a stream is encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Packed 4:2:2 pixels, decoded to RGBA here.
    Packed,
    /// JPEG bytes, passed through base64 encoded.
    Jpeg,
}

/// Compressed image handed to the renderer untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime: &'static str,
    pub base64: String,
}

impl EncodedImage {
    pub fn jpeg(bytes: &[u8]) -> Self {
        Self {
            mime: "image/jpeg",
            base64: STANDARD.encode(bytes),
        }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.base64)
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.base64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedImage {
    Rgba {
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    },
    Encoded(EncodedImage),
}

/// Output of the demultiplexer: one image attributed to its stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub stream: StreamId,
    pub image: DecodedImage,
}

/// Splits binary frames into logical streams.
///
/// A frame starting with a registered tag is attributed to that stream and
/// stripped of its header. Anything else is the default stream in the
/// legacy packed-pixel format, header and all.
#[derive(Debug, Clone)]
pub struct Demultiplexer {
    default_stream: StreamId,
    streams: Vec<(StreamId, Encoding)>,
    width: u32,
    height: u32,
}

impl Demultiplexer {
    pub fn new(default_stream: StreamId) -> Self {
        Self {
            default_stream,
            streams: Vec::new(),
            width: RASTER_WIDTH,
            height: RASTER_HEIGHT,
        }
    }

    pub fn with_stream(mut self, stream: StreamId, encoding: Encoding) -> Self {
        match self.streams.iter_mut().find(|(id, _)| *id == stream) {
            Some(entry) => entry.1 = encoding,
            None => self.streams.push((stream, encoding)),
        }
        self
    }

    pub fn with_raster(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn default_stream(&self) -> StreamId {
        self.default_stream
    }

    /// Decide which stream `payload` belongs to and return the bytes that
    /// carry the image.
    pub fn route<'a>(&self, payload: &'a [u8]) -> (StreamId, Encoding, &'a [u8]) {
        let tagged = read_tag(payload)
            .and_then(StreamId::from_tag)
            .and_then(|id| self.streams.iter().find(|(s, _)| *s == id));

        match tagged {
            Some(&(stream, encoding)) => (stream, encoding, &payload[STREAM_HEADER_LEN..]),
            None => (self.default_stream, Encoding::Packed, payload),
        }
    }

    /// Route and decode one binary frame. Returns `None` when there is
    /// nothing to draw.
    pub fn demux(&self, payload: &[u8]) -> Option<DecodedFrame> {
        let (stream, encoding, body) = self.route(payload);

        if body.is_empty() {
            tracing::debug!(stream = %stream, "Empty frame payload - skipping");
            return None;
        }

        let image = match encoding {
            Encoding::Packed => DecodedImage::Rgba {
                width: self.width,
                height: self.height,
                pixels: yuv::decode_yuyv(body, self.width, self.height)?,
            },
            Encoding::Jpeg => DecodedImage::Encoded(EncodedImage::jpeg(body)),
        };

        Some(DecodedFrame { stream, image })
    }
}

/// Read the ASCII tag window of a frame, if it has one.
///
/// The tag ends at the first NUL or at the end of the window. Frames too
/// short to hold a header, or whose window is not printable ASCII, are
/// untagged.
pub fn read_tag(payload: &[u8]) -> Option<&str> {
    if payload.len() < STREAM_HEADER_LEN {
        return None;
    }

    let window = &payload[..STREAM_TAG_LEN];
    let end = window.iter().position(|&b| b == 0).unwrap_or(STREAM_TAG_LEN);
    let tag = &window[..end];

    if tag.is_empty() || !tag.iter().all(|b| b.is_ascii_graphic()) {
        return None;
    }

    std::str::from_utf8(tag).ok()
}

/// Build a tagged frame the way the backend does: tag, NUL padding up to
/// the header length, then the payload.
pub fn tagged_frame(stream: StreamId, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0u8; STREAM_HEADER_LEN];
    frame[..stream.tag().len()].copy_from_slice(stream.tag().as_bytes());
    frame.extend_from_slice(payload);
    frame
}
