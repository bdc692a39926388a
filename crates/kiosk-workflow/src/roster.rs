use std::sync::Arc;

use kiosk_types::{
    ui::{NO_USERS, USER_LIST},
    wire::RosterEntry,
};

use crate::surface::UiSurface;

/// Keeps the visible roster list and its "no users" indicator in step.
/// The surface is the only copy of the roster.
#[derive(Clone)]
pub struct UserListEditor {
    surface: Arc<dyn UiSurface>,
}

impl UserListEditor {
    pub fn new(surface: Arc<dyn UiSurface>) -> Self {
        Self { surface }
    }

    pub fn seed(&self, entries: &[RosterEntry]) {
        for entry in entries {
            self.add(entry);
        }
        self.refresh_empty_indicator();
    }

    /// Appends a row; a row already shown for the same `user_id` is replaced.
    pub fn add(&self, entry: &RosterEntry) {
        self.surface.remove_item(USER_LIST, &entry.user_id);
        self.surface
            .append_item(USER_LIST, &entry.user_id, &entry.label());
        self.refresh_empty_indicator();
    }

    pub fn remove(&self, user_id: &str) -> bool {
        let removed = self.surface.remove_item(USER_LIST, user_id);
        self.refresh_empty_indicator();
        removed
    }

    pub fn len(&self) -> usize {
        self.surface.item_count(USER_LIST)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn refresh_empty_indicator(&self) {
        self.surface.set_hidden(NO_USERS, !self.is_empty());
    }
}
