use tracing::info;

use crate::preferences::{KeyValueStorage, PreferenceError, PreferenceStore, Preferences};
use crate::spicyness::{
    SPICYNESS_MARKS, SPICYNESS_MAX, SPICYNESS_MIN, SPICYNESS_STEP, SliderMark, Spicyness,
};

pub const SETTINGS_TITLE: &str = "Conspiracy Settings";
pub const CONTEXT_LABEL: &str = "Conspiracy Context:";
pub const CONTEXT_HELP: &str = "This is where you tell me about what you want to conspire about, \
     and how you want me to respond to you... Heeheehee 🐨";
pub const SPICYNESS_LABEL: &str = "Conspiracy Spicyness 🌶️:";
pub const SPICYNESS_HELP: &str =
    "Think of this way: the higher the spicyness, the more wild the conspiracy... 🌶️🐨. Heeheehee";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderSpec {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub marks: &'static [SliderMark],
}

pub const SPICYNESS_SLIDER: SliderSpec = SliderSpec {
    min: SPICYNESS_MIN,
    max: SPICYNESS_MAX,
    step: SPICYNESS_STEP,
    marks: &SPICYNESS_MARKS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelClose {
    Saved,
    Discarded,
}

/// Modal editor for the live preferences.
///
/// Edits land directly in the preferences the conversation reads, so they take
/// effect before saving. Saving only adds persistence; closing never rolls
/// anything back.
#[derive(Debug, Clone, Default)]
pub struct SettingsPanel {
    open: bool,
}

impl SettingsPanel {
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    pub fn edit_context(&self, preferences: &mut Preferences, context: impl Into<String>) {
        preferences.context = context.into();
    }

    /// Applies a slider position, snapped to the slider's step.
    pub fn edit_spicyness(&self, preferences: &mut Preferences, position: f64) -> Spicyness {
        preferences.spicyness = Spicyness::from_slider(position);
        preferences.spicyness
    }

    pub fn close(&mut self) -> PanelClose {
        self.open = false;
        PanelClose::Discarded
    }

    /// Persists the current values and closes. On a storage failure the panel
    /// stays open so the user can retry or close.
    pub fn save<S: KeyValueStorage>(
        &mut self,
        preferences: &Preferences,
        store: &mut PreferenceStore<S>,
    ) -> Result<PanelClose, PreferenceError> {
        store.save(&preferences.context, preferences.spicyness)?;
        info!(
            spicyness = preferences.spicyness.value(),
            has_context = !preferences.context.is_empty(),
            "conspiracy settings saved"
        );
        self.open = false;
        Ok(PanelClose::Saved)
    }
}
