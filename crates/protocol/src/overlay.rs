use crate::demux::DecodedImage;
use crate::streams::StreamId;
use crate::types::Detection;
use serde_json::Value;

/// Most recent overlay image together with the stream it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayImage {
    pub stream: StreamId,
    pub image: DecodedImage,
}

impl OverlayImage {
    /// Only the detector's own copy of the frame is trusted as the
    /// background for the boxes.
    pub fn is_drawable(&self) -> bool {
        self.stream.is_overlay()
    }
}

/// What the renderer should draw for the overlay right now.
#[derive(Debug, Clone, Copy)]
pub struct OverlayView<'a> {
    pub image: Option<&'a OverlayImage>,
    pub boxes: &'a [Detection],
}

/// Last-write-wins store for the detection overlay.
///
/// Results and image are replaced independently and never merged; readers
/// get whatever is newest without any notion of which video frame it
/// belongs to.
#[derive(Debug, Default)]
pub struct OverlayCache {
    results: Option<Vec<Detection>>,
    image: Option<OverlayImage>,
    results_version: u64,
    image_version: u64,
}

impl OverlayCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the result list from a raw message payload. A missing or
    /// malformed payload clears the boxes.
    pub fn set_results(&mut self, value: Option<&Value>) {
        match Detection::list_from_value(value) {
            Some(list) => self.set_result_list(list),
            None => {
                tracing::debug!("Invalid detection payload - clearing overlay");
                self.clear_results();
            }
        }
    }

    pub fn set_result_list(&mut self, list: Vec<Detection>) {
        self.results_version += 1;
        self.results = if list.is_empty() { None } else { Some(list) };
    }

    pub fn clear_results(&mut self) {
        self.results_version += 1;
        self.results = None;
    }

    pub fn set_image(&mut self, stream: StreamId, image: DecodedImage) {
        self.image_version += 1;
        self.image = Some(OverlayImage { stream, image });
    }

    pub fn boxes(&self) -> &[Detection] {
        self.results.as_deref().unwrap_or(&[])
    }

    pub fn image(&self) -> Option<&OverlayImage> {
        self.image.as_ref()
    }

    pub fn has_data(&self) -> bool {
        self.results.is_some() || self.image.is_some()
    }

    /// Number of result updates seen, including clears.
    pub fn results_version(&self) -> u64 {
        self.results_version
    }

    pub fn image_version(&self) -> u64 {
        self.image_version
    }

    pub fn view(&self) -> OverlayView<'_> {
        OverlayView {
            image: self.image.as_ref().filter(|img| img.is_drawable()),
            boxes: self.boxes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demux::EncodedImage;
    use serde_json::json;

    fn person_at(x: f32) -> Value {
        json!([{"label": "person", "box": {"x": x, "y": 0, "w": 10, "h": 20}}])
    }

    fn jpeg() -> DecodedImage {
        DecodedImage::Encoded(EncodedImage::jpeg(&[0xFF, 0xD8]))
    }

    #[test]
    fn test_new_cache_has_no_data() {
        let cache = OverlayCache::new();
        assert!(!cache.has_data());
        assert!(cache.boxes().is_empty());
        assert!(cache.view().image.is_none());
    }

    #[test]
    fn test_results_are_replaced_wholesale() {
        let mut cache = OverlayCache::new();
        cache.set_results(Some(&person_at(1.0)));
        cache.set_results(Some(&person_at(5.0)));

        assert_eq!(cache.boxes().len(), 1);
        assert_eq!(cache.boxes()[0].bbox.x, 5.0);
        assert_eq!(cache.results_version(), 2);
    }

    #[test]
    fn test_empty_results_clear_boxes() {
        let mut cache = OverlayCache::new();
        cache.set_results(Some(&person_at(1.0)));
        cache.set_results(Some(&json!([])));

        assert!(cache.view().boxes.is_empty());
    }

    #[test]
    fn test_invalid_results_clear_boxes() {
        let mut cache = OverlayCache::new();
        cache.set_results(Some(&person_at(1.0)));
        cache.set_results(Some(&json!({"error": "model not loaded"})));
        assert!(cache.boxes().is_empty());

        cache.set_results(Some(&person_at(1.0)));
        cache.set_results(None);
        assert!(cache.boxes().is_empty());
    }

    #[test]
    fn test_only_detector_image_is_drawable() {
        let mut cache = OverlayCache::new();

        cache.set_image(StreamId::Camera, jpeg());
        assert!(cache.image().is_some());
        assert!(cache.view().image.is_none());

        cache.set_image(StreamId::DetectorOverlay, jpeg());
        let view = cache.view();
        assert_eq!(view.image.map(|img| img.stream), Some(StreamId::DetectorOverlay));
    }

    #[test]
    fn test_image_and_results_update_independently() {
        let mut cache = OverlayCache::new();
        cache.set_results(Some(&person_at(1.0)));
        cache.set_image(StreamId::DetectorOverlay, jpeg());
        cache.set_image(StreamId::DetectorOverlay, jpeg());

        assert_eq!(cache.boxes().len(), 1, "new images keep stale boxes");
        assert_eq!(cache.image_version(), 2);
        assert_eq!(cache.results_version(), 1);
    }
}
