use anyhow::Context;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, RgbImage, RgbaImage};
use protocol::{DecodedImage, Detection, OverlayView, Renderer};
use std::path::PathBuf;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Headless renderer.
///
/// Keeps the latest video frame, the latest overlay background and the
/// current boxes, and every `snapshot_every` video frames writes the
/// composited picture as a JPEG when a snapshot path is configured.
pub struct SnapshotRenderer {
    snapshot_path: Option<PathBuf>,
    snapshot_every: u64,
    video_frames: u64,
    snapshots: u64,
    latest: Option<DecodedImage>,
    overlay: Option<DecodedImage>,
    boxes: Vec<Detection>,
}

impl SnapshotRenderer {
    pub fn new(snapshot_path: Option<PathBuf>, snapshot_every: u64) -> Self {
        Self {
            snapshot_path,
            snapshot_every: snapshot_every.max(1),
            video_frames: 0,
            snapshots: 0,
            latest: None,
            overlay: None,
            boxes: Vec::new(),
        }
    }

    pub fn video_frames(&self) -> u64 {
        self.video_frames
    }

    pub fn snapshots(&self) -> u64 {
        self.snapshots
    }

    pub fn boxes(&self) -> &[Detection] {
        &self.boxes
    }

    /// Current picture: the detector's frame with boxes when there is one,
    /// otherwise the live frame with whatever boxes are newest.
    pub fn compose(&self) -> anyhow::Result<Option<RgbImage>> {
        let Some(background) = self.overlay.as_ref().or(self.latest.as_ref()) else {
            return Ok(None);
        };

        let mut canvas = to_rgb(background)?;
        for det in &self.boxes {
            draw_box(&mut canvas, det);
        }
        Ok(Some(canvas))
    }

    fn write_snapshot(&mut self) -> anyhow::Result<()> {
        let Some(path) = self.snapshot_path.clone() else {
            return Ok(());
        };
        let Some(canvas) = self.compose()? else {
            return Ok(());
        };

        canvas
            .save_with_format(&path, ImageFormat::Jpeg)
            .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;
        self.snapshots += 1;

        tracing::debug!(
            path = %path.display(),
            frame = self.video_frames,
            boxes = self.boxes.len(),
            "Snapshot written"
        );
        Ok(())
    }
}

impl Renderer for SnapshotRenderer {
    fn draw_video(&mut self, image: &DecodedImage) {
        self.latest = Some(image.clone());
        self.video_frames += 1;

        if self.video_frames.is_multiple_of(self.snapshot_every)
            && let Err(e) = self.write_snapshot()
        {
            tracing::error!(error = %e, "Snapshot failed");
        }
    }

    fn draw_overlay(&mut self, overlay: OverlayView<'_>) {
        self.boxes = overlay.boxes.to_vec();
        if let Some(img) = overlay.image {
            self.overlay = Some(img.image.clone());
        }

        for det in &self.boxes {
            tracing::debug!(
                label = %det.label,
                x = det.bbox.x,
                y = det.bbox.y,
                w = det.bbox.width,
                h = det.bbox.height,
                probability = ?det.probability,
                "Detection"
            );
        }
    }

    fn elapsed(&mut self, ticks: u64) {
        tracing::info!(
            elapsed_s = ticks,
            frames = self.video_frames,
            boxes = self.boxes.len(),
            "Stream running"
        );
    }
}

fn to_rgb(image: &DecodedImage) -> anyhow::Result<RgbImage> {
    match image {
        DecodedImage::Rgba {
            width,
            height,
            pixels,
        } => {
            let rgba: RgbaImage = ImageBuffer::from_raw(*width, *height, pixels.clone())
                .ok_or_else(|| anyhow::anyhow!("Failed to create image from raw data"))?;
            Ok(DynamicImage::ImageRgba8(rgba).to_rgb8())
        }
        DecodedImage::Encoded(encoded) => {
            let bytes = encoded
                .decode_bytes()
                .context("Invalid base64 image payload")?;
            let img = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)
                .context("Failed to decode JPEG frame")?;
            Ok(img.to_rgb8())
        }
    }
}

/// Outline a detection box, clipped to the canvas.
fn draw_box(canvas: &mut RgbImage, det: &Detection) {
    let (w, h) = canvas.dimensions();
    if w == 0 || h == 0 {
        return;
    }

    let clamp_x = |v: f32| (v.max(0.0) as u32).min(w - 1);
    let clamp_y = |v: f32| (v.max(0.0) as u32).min(h - 1);

    let x0 = clamp_x(det.bbox.x);
    let y0 = clamp_y(det.bbox.y);
    let x1 = clamp_x(det.bbox.x + det.bbox.width);
    let y1 = clamp_y(det.bbox.y + det.bbox.height);

    for x in x0..=x1 {
        canvas.put_pixel(x, y0, BOX_COLOR);
        canvas.put_pixel(x, y1, BOX_COLOR);
    }
    for y in y0..=y1 {
        canvas.put_pixel(x0, y, BOX_COLOR);
        canvas.put_pixel(x1, y, BOX_COLOR);
    }
}
