use crate::section::{Section, SubView};

/// One-shot navigation intents. Section A is the CV builder, section B the
/// ID-card printer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntentFlags {
    pub navigate_to_section_a: bool,
    pub navigate_to_section_b: bool,
    pub navigate_home: bool,
}

impl IntentFlags {
    pub fn any(&self) -> bool {
        self.navigate_to_section_a || self.navigate_to_section_b || self.navigate_home
    }
}

/// Explicit transitions that were triggered by the user since the last resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserActions {
    pub continue_editing: bool,
    pub continue_printing: bool,
}

/// A consistent read of every navigation-relevant signal at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalSnapshot {
    pub path: String,
    pub fragment: String,
    pub intents: IntentFlags,
    pub actions: UserActions,
    pub durable_section: Option<Section>,
    pub last_known_section: Option<Section>,
    pub cv_view_mode: Option<SubView>,
    pub id_card_view_mode: Option<SubView>,
    pub explicitly_visited_marketplace: bool,
    pub authenticated: bool,
    pub loading: bool,
}

impl SignalSnapshot {
    pub fn at(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}
