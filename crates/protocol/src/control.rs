use crate::channel::Outbox;
use crate::streams::messages;
use crate::types::{ControlMessage, Device, Model, Resolution};
use serde_json::{Map, Value, json};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    NoSelection,
    Selected,
    Playing,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ControlError {
    #[error("Nothing is selected")]
    NothingSelected,

    #[error("Selection is locked while playing")]
    SelectionLocked,

    #[error("Unknown entry: {0}")]
    UnknownEntry(String),

    #[error("Resolution {0} is not offered by the selected entry")]
    NoResolution(Resolution),
}

/// Something that can be picked in a selector.
pub trait Selectable {
    fn id(&self) -> &str;

    fn label(&self) -> &str;

    fn resolutions(&self) -> &[Resolution] {
        &[]
    }
}

impl Selectable for Device {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.display_name
    }

    fn resolutions(&self) -> &[Resolution] {
        &self.resolutions
    }
}

impl Selectable for Model {
    fn id(&self) -> &str {
        &self.name
    }

    fn label(&self) -> &str {
        &self.name
    }
}

/// Message names and wording for one kind of selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorKind {
    pub play: &'static str,
    pub stop: &'static str,
    pub value_key: &'static str,
    pub placeholder: &'static str,
    pub empty_placeholder: &'static str,
}

pub const CAMERA_DEVICES: SelectorKind = SelectorKind {
    play: messages::CAMERA_DEVICE_PLAY,
    stop: messages::CAMERA_DEVICE_STOP,
    value_key: "device",
    placeholder: "Select camera device...",
    empty_placeholder: "No camera device...",
};

pub const DRPAI_MODELS: SelectorKind = SelectorKind {
    play: messages::DRPAI_MODEL_START,
    stop: messages::DRPAI_MODEL_STOP,
    value_key: "model",
    placeholder: "Select model...",
    empty_placeholder: "No models available...",
};

/// Entry of the selection control. The placeholder has an empty value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

/// Selection/play control for a server-reported list.
///
/// `NoSelection -> Selected -> Playing -> Selected`. Play and stop flip the
/// state as soon as the command is queued; there is no acknowledgement.
/// Stopping an entry that the latest list dropped ends in `NoSelection`.
pub struct Selector<T> {
    kind: SelectorKind,
    items: Vec<T>,
    enabled: bool,
    selected: Option<usize>,
    /// Playing entry that a later list no longer contains.
    stranded: Option<T>,
    resolution: Option<Resolution>,
    state: ControlState,
}

impl<T: Selectable> Selector<T> {
    pub fn new(kind: SelectorKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
            enabled: false,
            selected: None,
            stranded: None,
            resolution: None,
            state: ControlState::NoSelection,
        }
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn selected(&self) -> Option<&T> {
        self.stranded
            .as_ref()
            .or_else(|| self.selected.map(|i| &self.items[i]))
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    /// Whether the list control accepts input.
    pub fn selection_enabled(&self) -> bool {
        self.enabled && self.state != ControlState::Playing
    }

    pub fn play_enabled(&self) -> bool {
        self.state != ControlState::NoSelection
    }

    /// A new list arrived from the backend.
    ///
    /// `None` (missing, empty or malformed list) leaves the stored items
    /// alone and disables the control. While playing, the live selection is
    /// kept so the running stream can still be stopped, even when the new
    /// list no longer offers it.
    pub fn replace_items(&mut self, items: Option<Vec<T>>) {
        let Some(items) = items else {
            tracing::info!(kind = self.kind.value_key, "Empty or invalid list received");
            self.enabled = false;
            if self.state != ControlState::Playing {
                self.reset_selection();
            }
            return;
        };

        tracing::info!(kind = self.kind.value_key, count = items.len(), "List updated");

        let playing_id = match self.state {
            ControlState::Playing => self.selected().map(|item| item.id().to_string()),
            _ => None,
        };

        let previous = std::mem::replace(&mut self.items, items);
        self.enabled = true;

        let Some(id) = playing_id else {
            self.reset_selection();
            return;
        };

        match self.position(&id) {
            Some(index) => {
                self.selected = Some(index);
                self.stranded = None;
            }
            None => {
                if self.stranded.is_none() {
                    self.stranded = self.selected.and_then(|i| previous.into_iter().nth(i));
                }
                self.selected = None;
                tracing::warn!(
                    kind = self.kind.value_key,
                    id = %id,
                    "Playing entry no longer listed - kept until stopped"
                );
            }
        }
    }

    /// Options for the list control: placeholder first, then one per item.
    pub fn options(&self) -> Vec<SelectOption> {
        let placeholder = if self.enabled {
            self.kind.placeholder
        } else {
            self.kind.empty_placeholder
        };

        let mut options = vec![SelectOption {
            value: String::new(),
            label: placeholder.to_string(),
        }];

        if self.enabled {
            options.extend(self.items.iter().map(|item| SelectOption {
                value: item.id().to_string(),
                label: item.label().to_string(),
            }));
        }

        options
    }

    /// Change the selection. An empty id goes back to the placeholder.
    pub fn select(&mut self, id: &str) -> Result<ControlState, ControlError> {
        if self.state == ControlState::Playing {
            return Err(ControlError::SelectionLocked);
        }

        if id.is_empty() {
            self.reset_selection();
            return Ok(self.state);
        }

        let index = self
            .position(id)
            .filter(|_| self.enabled)
            .ok_or_else(|| ControlError::UnknownEntry(id.to_string()))?;

        self.selected = Some(index);
        self.resolution = self.items[index].resolutions().first().copied();
        self.state = ControlState::Selected;
        Ok(self.state)
    }

    /// Pick one of the resolutions offered by the selected entry.
    pub fn select_resolution(&mut self, resolution: Resolution) -> Result<(), ControlError> {
        if self.state == ControlState::Playing {
            return Err(ControlError::SelectionLocked);
        }
        let item = self.selected().ok_or(ControlError::NothingSelected)?;
        if !item.resolutions().contains(&resolution) {
            return Err(ControlError::NoResolution(resolution));
        }
        self.resolution = Some(resolution);
        Ok(())
    }

    /// Activate the play control: start when selected, stop when playing.
    pub fn toggle(&mut self, outbox: &mut Outbox) -> Result<ControlState, ControlError> {
        let item = self.selected().ok_or(ControlError::NothingSelected)?;

        let (msg, next) = match self.state {
            ControlState::NoSelection => return Err(ControlError::NothingSelected),
            ControlState::Selected => (
                ControlMessage::with_value(self.kind.play, self.command_value(item, true)),
                ControlState::Playing,
            ),
            ControlState::Playing if self.stranded.is_some() => (
                ControlMessage::with_value(self.kind.stop, self.command_value(item, false)),
                ControlState::NoSelection,
            ),
            ControlState::Playing => (
                ControlMessage::with_value(self.kind.stop, self.command_value(item, false)),
                ControlState::Selected,
            ),
        };

        outbox.send(msg);
        tracing::info!(
            kind = self.kind.value_key,
            id = item.id(),
            from = ?self.state,
            to = ?next,
            "Control transition"
        );
        if next == ControlState::NoSelection {
            self.reset_selection();
        } else {
            self.state = next;
        }
        Ok(next)
    }

    fn command_value(&self, item: &T, with_resolution: bool) -> Value {
        let mut value = Map::new();
        value.insert(self.kind.value_key.to_string(), json!(item.id()));
        if with_resolution && let Some(res) = self.resolution {
            value.insert(
                "resolution".to_string(),
                json!({"width": res.width, "height": res.height}),
            );
        }
        Value::Object(value)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    fn reset_selection(&mut self) {
        self.selected = None;
        self.stranded = None;
        self.resolution = None;
        self.state = ControlState::NoSelection;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device(id: &str, resolutions: &[(u32, u32)]) -> Device {
        Device {
            id: id.to_string(),
            display_name: format!("Cam {id}"),
            resolutions: resolutions
                .iter()
                .map(|&(w, h)| Resolution::new(w, h))
                .collect(),
        }
    }

    fn cameras(devices: Vec<Device>) -> Selector<Device> {
        let mut sel = Selector::new(CAMERA_DEVICES);
        sel.replace_items(Some(devices));
        sel
    }

    // ========== Initial State Tests ==========

    #[test]
    fn new_starts_disabled_without_selection() {
        let sel: Selector<Device> = Selector::new(CAMERA_DEVICES);

        assert_eq!(sel.state(), ControlState::NoSelection);
        assert!(!sel.selection_enabled());
        assert!(!sel.play_enabled());
        assert_eq!(sel.options()[0].label, "No camera device...");
    }

    // ========== List Updates ==========

    #[test]
    fn list_offers_placeholder_plus_entries() {
        let sel = cameras(vec![device("dev0", &[(640, 480)])]);
        let options = sel.options();

        assert_eq!(options.len(), 2);
        assert_eq!(options[0].value, "");
        assert_eq!(options[0].label, "Select camera device...");
        assert_eq!(options[1].value, "dev0");
        assert!(sel.selection_enabled());
        assert!(!sel.play_enabled());
    }

    #[test]
    fn empty_list_keeps_items_and_disables() {
        let mut sel = cameras(vec![device("dev0", &[])]);
        sel.select("dev0").unwrap();

        sel.replace_items(None);

        assert_eq!(sel.items().len(), 1, "stored list is left untouched");
        assert_eq!(sel.state(), ControlState::NoSelection);
        assert!(!sel.selection_enabled());
        assert_eq!(sel.options().len(), 1);
    }

    #[test]
    fn new_list_resets_selection() {
        let mut sel = cameras(vec![device("dev0", &[])]);
        sel.select("dev0").unwrap();

        sel.replace_items(Some(vec![device("dev0", &[]), device("dev1", &[])]));

        assert_eq!(sel.state(), ControlState::NoSelection);
        assert!(sel.selected().is_none());
    }

    #[test]
    fn new_list_while_playing_keeps_live_entry() {
        let mut sel = cameras(vec![device("dev0", &[])]);
        let mut outbox = Outbox::new();
        sel.select("dev0").unwrap();
        sel.toggle(&mut outbox).unwrap();

        sel.replace_items(Some(vec![device("dev1", &[]), device("dev0", &[])]));

        assert_eq!(sel.state(), ControlState::Playing);
        assert_eq!(sel.selected().map(|d| d.id.as_str()), Some("dev0"));
    }

    #[test]
    fn empty_list_while_playing_keeps_stream_stoppable() {
        let mut sel = cameras(vec![device("dev0", &[(640, 480)])]);
        let mut outbox = Outbox::new();
        sel.select("dev0").unwrap();
        sel.toggle(&mut outbox).unwrap();

        sel.replace_items(None);

        assert_eq!(sel.state(), ControlState::Playing);
        assert!(!sel.selection_enabled());
        assert_eq!(sel.select("dev0"), Err(ControlError::SelectionLocked));

        assert_eq!(sel.toggle(&mut outbox), Ok(ControlState::Selected));
        let sent: Vec<_> = outbox.drain().collect();
        assert_eq!(
            sent[1],
            ControlMessage::with_value("camera-device-stop", json!({"device": "dev0"}))
        );
    }

    #[test]
    fn new_list_without_live_entry_keeps_playing_until_stop() {
        let mut sel = cameras(vec![device("dev0", &[(640, 480)])]);
        let mut outbox = Outbox::new();
        sel.select("dev0").unwrap();
        sel.toggle(&mut outbox).unwrap();

        sel.replace_items(Some(vec![device("dev1", &[])]));

        assert_eq!(sel.state(), ControlState::Playing);
        assert!(!sel.selection_enabled());
        assert_eq!(sel.selected().map(|d| d.id.as_str()), Some("dev0"));
        assert_eq!(sel.options()[1].value, "dev1");

        assert_eq!(sel.toggle(&mut outbox), Ok(ControlState::NoSelection));
        let sent: Vec<_> = outbox.drain().collect();
        assert_eq!(
            sent[1],
            ControlMessage::with_value("camera-device-stop", json!({"device": "dev0"}))
        );
        assert!(sel.selected().is_none());
        assert!(sel.selection_enabled());
        assert_eq!(sel.select("dev1"), Ok(ControlState::Selected));
    }

    #[test]
    fn stranded_entry_returns_when_listed_again() {
        let mut sel = cameras(vec![device("dev0", &[])]);
        let mut outbox = Outbox::new();
        sel.select("dev0").unwrap();
        sel.toggle(&mut outbox).unwrap();

        sel.replace_items(Some(vec![device("dev1", &[])]));
        sel.replace_items(Some(vec![device("dev1", &[]), device("dev0", &[])]));

        assert_eq!(sel.state(), ControlState::Playing);
        assert_eq!(sel.toggle(&mut outbox), Ok(ControlState::Selected));
        assert_eq!(sel.selected().map(|d| d.id.as_str()), Some("dev0"));
    }

    // ========== Selection ==========

    #[test]
    fn selecting_entry_enables_play() {
        let mut sel = cameras(vec![device("dev0", &[(640, 480), (320, 240)])]);

        assert_eq!(sel.select("dev0"), Ok(ControlState::Selected));
        assert!(sel.play_enabled());
        assert_eq!(sel.resolution(), Some(Resolution::new(640, 480)));
    }

    #[test]
    fn selecting_placeholder_disables_play() {
        let mut sel = cameras(vec![device("dev0", &[])]);
        sel.select("dev0").unwrap();

        assert_eq!(sel.select(""), Ok(ControlState::NoSelection));
        assert!(!sel.play_enabled());
    }

    #[test]
    fn selecting_unknown_entry_fails() {
        let mut sel = cameras(vec![device("dev0", &[])]);
        assert_eq!(
            sel.select("dev9"),
            Err(ControlError::UnknownEntry("dev9".to_string()))
        );
        assert_eq!(sel.state(), ControlState::NoSelection);
    }

    #[test]
    fn resolution_must_be_offered() {
        let mut sel = cameras(vec![device("dev0", &[(640, 480), (320, 240)])]);
        sel.select("dev0").unwrap();

        sel.select_resolution(Resolution::new(320, 240)).unwrap();
        assert_eq!(sel.resolution(), Some(Resolution::new(320, 240)));
        assert_eq!(
            sel.select_resolution(Resolution::new(1920, 1080)),
            Err(ControlError::NoResolution(Resolution::new(1920, 1080)))
        );
    }

    // ========== Play / Stop ==========

    #[test]
    fn play_sends_device_and_resolution() {
        let mut sel = cameras(vec![device("dev0", &[(640, 480)])]);
        let mut outbox = Outbox::new();
        sel.select("dev0").unwrap();

        assert_eq!(sel.toggle(&mut outbox), Ok(ControlState::Playing));

        let sent: Vec<_> = outbox.drain().collect();
        assert_eq!(
            sent,
            vec![ControlMessage::with_value(
                "camera-device-play",
                json!({"device": "dev0", "resolution": {"width": 640, "height": 480}})
            )]
        );
        assert!(!sel.selection_enabled());
        assert!(sel.play_enabled());
    }

    #[test]
    fn stop_returns_to_selected() {
        let mut sel = cameras(vec![device("dev0", &[(640, 480)])]);
        let mut outbox = Outbox::new();
        sel.select("dev0").unwrap();
        sel.toggle(&mut outbox).unwrap();

        assert_eq!(sel.toggle(&mut outbox), Ok(ControlState::Selected));

        let sent: Vec<_> = outbox.drain().collect();
        assert_eq!(
            sent[1],
            ControlMessage::with_value("camera-device-stop", json!({"device": "dev0"}))
        );
        assert!(sel.selection_enabled());
    }

    #[test]
    fn selection_locked_while_playing() {
        let mut sel = cameras(vec![device("dev0", &[]), device("dev1", &[])]);
        let mut outbox = Outbox::new();
        sel.select("dev0").unwrap();
        sel.toggle(&mut outbox).unwrap();

        assert_eq!(sel.select("dev1"), Err(ControlError::SelectionLocked));
        assert_eq!(sel.selected().map(|d| d.id.as_str()), Some("dev0"));
    }

    #[test]
    fn toggle_without_selection_sends_nothing() {
        let mut sel = cameras(vec![device("dev0", &[])]);
        let mut outbox = Outbox::new();

        assert_eq!(sel.toggle(&mut outbox), Err(ControlError::NothingSelected));
        assert!(outbox.is_empty());
    }

    #[test]
    fn model_start_omits_resolution() {
        let mut sel = Selector::new(DRPAI_MODELS);
        let mut outbox = Outbox::new();
        sel.replace_items(Some(vec![Model {
            name: "yolov3".to_string(),
        }]));
        sel.select("yolov3").unwrap();
        sel.toggle(&mut outbox).unwrap();
        sel.toggle(&mut outbox).unwrap();

        let sent: Vec<_> = outbox.drain().collect();
        assert_eq!(
            sent,
            vec![
                ControlMessage::with_value("drpai-model-start", json!({"model": "yolov3"})),
                ControlMessage::with_value("drpai-model-stop", json!({"model": "yolov3"})),
            ]
        );
    }

    #[test]
    fn full_cycle_selected_playing_selected() {
        let mut sel = cameras(vec![device("dev0", &[])]);
        let mut outbox = Outbox::new();

        assert_eq!(sel.select("dev0"), Ok(ControlState::Selected));
        assert_eq!(sel.toggle(&mut outbox), Ok(ControlState::Playing));
        assert_eq!(sel.toggle(&mut outbox), Ok(ControlState::Selected));
        assert_eq!(sel.toggle(&mut outbox), Ok(ControlState::Playing));
        assert_eq!(outbox.len(), 3);
    }
}
