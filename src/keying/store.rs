use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::foundation::core::{FrameRGBA, Rgb8};
use crate::foundation::error::KeyResult;
use crate::keying::detect::detect_key_color;
use crate::keying::pick::PickState;
use crate::keying::settings::KeySettings;

/// Identity of a keyable source item (owned by the editor's item layer).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub String);

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key settings per source item.
///
/// An explicit object handed by reference to whoever reads or edits settings (the renderer, the
/// property editor). Entries are owned by the item: when the item goes away its entry must be
/// removed, either directly with [`SettingsStore::remove`] or in bulk with
/// [`SettingsStore::retain_sources`].
///
/// Serializes as a JSON object keyed by source id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsStore {
    entries: BTreeMap<SourceId, KeySettings>,
}

impl SettingsStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings for `id`, if any.
    pub fn get(&self, id: &SourceId) -> Option<&KeySettings> {
        self.entries.get(id)
    }

    /// Settings for `id`, created with defaults on first access.
    pub fn get_or_default(&mut self, id: impl Into<SourceId>) -> &mut KeySettings {
        self.entries.entry(id.into()).or_default()
    }

    /// Replace the settings for `id`, returning the previous value.
    pub fn set(&mut self, id: impl Into<SourceId>, settings: KeySettings) -> Option<KeySettings> {
        self.entries.insert(id.into(), settings)
    }

    /// Mutate the settings for `id` in place (created with defaults if missing).
    pub fn update(
        &mut self,
        id: impl Into<SourceId>,
        f: impl FnOnce(&mut KeySettings),
    ) -> &KeySettings {
        let entry = self.get_or_default(id);
        f(&mut *entry);
        entry
    }

    /// Turn keying on for `id`, creating default settings on first use.
    pub fn enable(&mut self, id: impl Into<SourceId>) -> &KeySettings {
        self.update(id, |s| s.set_enabled(true))
    }

    /// Turn keying off for `id`. Missing entries stay missing.
    pub fn disable(&mut self, id: &SourceId) {
        if let Some(s) = self.entries.get_mut(id) {
            s.set_enabled(false);
        }
    }

    /// Write a key color for `id` (from a pick or detection).
    pub fn set_key_color(&mut self, id: impl Into<SourceId>, color: Rgb8) -> &KeySettings {
        self.update(id, |s| s.set_key_color(color))
    }

    /// Detect the key color from `frame` corners and store it for `id`.
    pub fn apply_detected_key(
        &mut self,
        id: impl Into<SourceId>,
        frame: &FrameRGBA,
    ) -> KeyResult<Rgb8> {
        let color = detect_key_color(frame)?;
        self.set_key_color(id, color);
        Ok(color)
    }

    /// Store the outcome of a finished pick. Returns the color written, if the pick succeeded.
    pub fn apply_picked_color(
        &mut self,
        id: impl Into<SourceId>,
        state: &PickState,
    ) -> Option<Rgb8> {
        let PickState::Picked(color) = *state else {
            return None;
        };
        self.set_key_color(id, color);
        Some(color)
    }

    /// Drop the settings of a deleted item.
    pub fn remove(&mut self, id: &SourceId) -> Option<KeySettings> {
        let removed = self.entries.remove(id);
        if removed.is_some() {
            tracing::debug!(source = %id, "removed key settings");
        }
        removed
    }

    /// Keep only entries whose item still exists. Returns how many were dropped.
    pub fn retain_sources(&mut self, mut exists: impl FnMut(&SourceId) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, _| exists(id));
        let dropped = before - self.entries.len();
        if dropped > 0 {
            tracing::debug!(dropped, "dropped orphaned key settings");
        }
        dropped
    }

    /// Whether `id` has settings.
    pub fn contains(&self, id: &SourceId) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&SourceId, &KeySettings)> {
        self.entries.iter()
    }

    /// Export as a JSON object keyed by source id.
    pub fn to_json(&self) -> KeyResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Import from [`SettingsStore::to_json`] output. Entries are clamped and recovered the same
    /// way as [`KeySettings::from_json`].
    pub fn from_json(s: &str) -> KeyResult<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/keying/store.rs"]
mod tests;
