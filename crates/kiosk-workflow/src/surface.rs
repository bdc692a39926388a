//! The display surface the workflows drive, and an in-memory implementation of it.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use kiosk_types::ui::{ElementId, Tone};

/// Named elements the workflows read and write. The workflows never create
/// or lay out elements; they only touch text, tone, visibility, disabled
/// state, shown images, and list rows.
pub trait UiSurface: Send + Sync {
    fn set_text(&self, id: ElementId, text: &str);
    fn set_tone(&self, id: ElementId, tone: Tone);
    fn set_hidden(&self, id: ElementId, hidden: bool);
    fn set_disabled(&self, id: ElementId, disabled: bool);
    fn set_image(&self, id: ElementId, data_uri: Option<&str>);
    fn input_value(&self, id: ElementId) -> String;
    fn append_item(&self, list: ElementId, key: &str, label: &str);
    fn remove_item(&self, list: ElementId, key: &str) -> bool;
    fn item_count(&self, list: ElementId) -> usize;
}

/// Writes `text` into a message region, tints it, and makes it visible.
pub fn show_message(surface: &dyn UiSurface, id: ElementId, text: &str, tone: Tone) {
    surface.set_text(id, text);
    surface.set_tone(id, tone);
    surface.set_hidden(id, false);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementState {
    pub text: String,
    pub tone: Tone,
    pub hidden: bool,
    pub disabled: bool,
    pub image: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct SurfaceSnapshot {
    pub elements: HashMap<ElementId, ElementState>,
    pub lists: HashMap<ElementId, Vec<(String, String)>>,
}

impl SurfaceSnapshot {
    pub fn element(&self, id: ElementId) -> ElementState {
        self.elements.get(&id).cloned().unwrap_or_default()
    }

    pub fn items(&self, list: ElementId) -> &[(String, String)] {
        self.lists.get(&list).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Default)]
struct MemoryState {
    snapshot: SurfaceSnapshot,
    disabled_history: HashMap<ElementId, Vec<bool>>,
}

/// Surface kept entirely in memory; backs the terminal kiosk and the tests.
#[derive(Clone, Default)]
pub struct MemorySurface {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> R {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    fn with_element(&self, id: ElementId, f: impl FnOnce(&mut ElementState)) {
        self.with_state(|state| f(state.snapshot.elements.entry(id).or_default()));
    }

    /// Simulates the operator typing into an input element.
    pub fn set_input(&self, id: ElementId, value: &str) {
        self.with_element(id, |el| el.value = value.to_string());
    }

    pub fn snapshot(&self) -> SurfaceSnapshot {
        self.with_state(|state| state.snapshot.clone())
    }

    pub fn element(&self, id: ElementId) -> ElementState {
        self.with_state(|state| state.snapshot.element(id))
    }

    pub fn text(&self, id: ElementId) -> String {
        self.element(id).text
    }

    pub fn is_disabled(&self, id: ElementId) -> bool {
        self.element(id).disabled
    }

    pub fn is_hidden(&self, id: ElementId) -> bool {
        self.element(id).hidden
    }

    pub fn items(&self, list: ElementId) -> Vec<(String, String)> {
        self.with_state(|state| state.snapshot.items(list).to_vec())
    }

    /// Every value ever written to the element's disabled flag, in order.
    pub fn disabled_history(&self, id: ElementId) -> Vec<bool> {
        self.with_state(|state| {
            state
                .disabled_history
                .get(&id)
                .cloned()
                .unwrap_or_default()
        })
    }
}

impl UiSurface for MemorySurface {
    fn set_text(&self, id: ElementId, text: &str) {
        self.with_element(id, |el| el.text = text.to_string());
    }

    fn set_tone(&self, id: ElementId, tone: Tone) {
        self.with_element(id, |el| el.tone = tone);
    }

    fn set_hidden(&self, id: ElementId, hidden: bool) {
        self.with_element(id, |el| el.hidden = hidden);
    }

    fn set_disabled(&self, id: ElementId, disabled: bool) {
        self.with_state(|state| {
            state.snapshot.elements.entry(id).or_default().disabled = disabled;
            state.disabled_history.entry(id).or_default().push(disabled);
        });
    }

    fn set_image(&self, id: ElementId, data_uri: Option<&str>) {
        self.with_element(id, |el| el.image = data_uri.map(str::to_string));
    }

    fn input_value(&self, id: ElementId) -> String {
        self.element(id).value
    }

    fn append_item(&self, list: ElementId, key: &str, label: &str) {
        self.with_state(|state| {
            state
                .snapshot
                .lists
                .entry(list)
                .or_default()
                .push((key.to_string(), label.to_string()));
        });
    }

    fn remove_item(&self, list: ElementId, key: &str) -> bool {
        self.with_state(|state| {
            let Some(rows) = state.snapshot.lists.get_mut(&list) else {
                return false;
            };
            let before = rows.len();
            rows.retain(|(row_key, _)| row_key != key);
            rows.len() != before
        })
    }

    fn item_count(&self, list: ElementId) -> usize {
        self.with_state(|state| state.snapshot.items(list).len())
    }
}
