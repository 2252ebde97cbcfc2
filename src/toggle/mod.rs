//! Show/hide widgets: aria-driven toggles, accordions, "show more"
//! wrappers, the council-list filter panel, popup modals and the content
//! navbar.

use std::collections::HashMap;

use crate::analytics::{self, AnalyticsEvent};

pub const SHOW_MORE: &str = "Show more";
pub const SHOW_LESS: &str = "Show less";
pub const FILTERS_COLLAPSED: &str = "Filter by authority type and more…";
pub const FILTERS_EXPANDED: &str = "Show fewer filters…";

/// A button whose `aria-expanded` controls whether its target is hidden.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HiddenToggle {
    pub controls: String,
    expanded: bool,
}

impl HiddenToggle {
    /// Starts collapsed unless the markup says `aria-expanded="true"`.
    pub fn new(controls: &str, aria_expanded: Option<&str>) -> Self {
        Self {
            controls: controls.to_string(),
            expanded: aria_expanded == Some("true"),
        }
    }

    pub fn toggle(&mut self) {
        self.expanded = !self.expanded;
    }

    pub fn set_expanded(&mut self, expanded: bool) {
        self.expanded = expanded;
    }

    pub fn aria_expanded(&self) -> &'static str {
        if self.expanded {
            "true"
        } else {
            "false"
        }
    }

    pub fn target_hidden(&self) -> bool {
        !self.expanded
    }
}

/// "Display complete content" switch: expands or collapses every toggle.
pub fn set_all_expanded(toggles: &mut [HiddenToggle], expanded: bool) {
    for toggle in toggles.iter_mut() {
        toggle.set_expanded(expanded);
    }
}

/// Sections where at most one is open at a time. Clicking the open one
/// closes it; clicking another closes the rest.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Accordion {
    sections: Vec<String>,
    open: Option<usize>,
}

impl Accordion {
    pub fn new<I, S>(sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sections: sections.into_iter().map(Into::into).collect(),
            open: None,
        }
    }

    pub fn click(&mut self, index: usize) -> Option<&str> {
        if index >= self.sections.len() {
            return self.open_section();
        }
        self.open = if self.open == Some(index) {
            None
        } else {
            Some(index)
        };
        self.open_section()
    }

    pub fn open_section(&self) -> Option<&str> {
        self.open.map(|i| self.sections[i].as_str())
    }

    pub fn is_open(&self, index: usize) -> bool {
        self.open == Some(index)
    }
}

/// A wrapper with a trailing button flipping between "Show more" and
/// "Show less".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShowMore {
    open: bool,
}

impl ShowMore {
    pub fn click(&mut self) -> &'static str {
        self.open = !self.open;
        self.label()
    }

    pub fn label(&self) -> &'static str {
        if self.open {
            SHOW_LESS
        } else {
            SHOW_MORE
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

/// The collapsible filter form above the council list. Always starts
/// collapsed, including after a partial reload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterPanel {
    open: bool,
}

impl FilterPanel {
    pub fn toggle(&mut self) -> &'static str {
        self.open = !self.open;
        self.label()
    }

    pub fn label(&self) -> &'static str {
        if self.open {
            FILTERS_EXPANDED
        } else {
            FILTERS_COLLAPSED
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collapsed<T> {
    pub visible: T,
    pub summary: &'static str,
    pub hidden: Vec<T>,
}

/// Keeps the first child visible and moves the rest under a "Show more"
/// disclosure. A single child (or none) is left alone.
pub fn collapse_children<T>(mut children: Vec<T>) -> Result<Collapsed<T>, Vec<T>> {
    if children.len() < 2 {
        return Err(children);
    }
    let hidden = children.split_off(1);
    let visible = children.remove(0);
    Ok(Collapsed {
        visible,
        summary: SHOW_MORE,
        hidden,
    })
}

/// Named modals opened by triggers and closed by their close control.
#[derive(Clone, Debug, Default)]
pub struct PopupModals {
    visible: HashMap<String, bool>,
}

impl PopupModals {
    pub fn register(&mut self, name: &str) {
        self.visible.entry(name.to_string()).or_insert(false);
    }

    /// Opens the modal a trigger names; unknown names do nothing.
    pub fn trigger(&mut self, name: &str) -> bool {
        match self.visible.get_mut(name) {
            Some(v) => {
                *v = true;
                true
            }
            None => false,
        }
    }

    pub fn close(&mut self, name: &str) {
        if let Some(v) = self.visible.get_mut(name) {
            *v = false;
        }
    }

    pub fn is_visible(&self, name: &str) -> bool {
        self.visible.get(name).copied().unwrap_or(false)
    }
}

/// Which section the dynamic content container shows. Every switch is
/// reported to analytics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentNavbar {
    active: Option<String>,
}

impl ContentNavbar {
    /// Activates `section` and returns the event to track.
    pub fn switch(&mut self, section: &str) -> AnalyticsEvent {
        self.active = Some(section.to_string());
        analytics::content_navbar_switch(section)
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }
}

/// Extra inputs shown only while the checkbox before them is ticked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConditionalFields {
    visible: bool,
}

impl ConditionalFields {
    pub fn on_change(&mut self, checked: bool) {
        self.visible = checked;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_toggle_starts_hidden_unless_expanded() {
        let mut t = HiddenToggle::new("q1", None);
        assert!(t.target_hidden());
        assert_eq!(t.aria_expanded(), "false");
        t.toggle();
        assert!(!t.target_hidden());

        let open = HiddenToggle::new("q2", Some("true"));
        assert!(!open.target_hidden());
    }

    #[test]
    fn complete_content_switch_expands_everything() {
        let mut toggles = vec![HiddenToggle::new("a", None), HiddenToggle::new("b", Some("true"))];
        set_all_expanded(&mut toggles, true);
        assert!(toggles.iter().all(|t| !t.target_hidden()));
        set_all_expanded(&mut toggles, false);
        assert!(toggles.iter().all(|t| t.target_hidden()));
    }

    #[test]
    fn accordion_keeps_one_section_open() {
        let mut acc = Accordion::new(["buildings", "transport", "waste"]);
        assert_eq!(acc.click(0), Some("buildings"));
        assert_eq!(acc.click(2), Some("waste"));
        assert!(!acc.is_open(0));
        assert_eq!(acc.click(2), None);
        assert_eq!(acc.click(7), None);
    }

    #[test]
    fn show_more_and_filter_labels_flip() {
        let mut more = ShowMore::default();
        assert_eq!(more.label(), SHOW_MORE);
        assert_eq!(more.click(), SHOW_LESS);
        assert_eq!(more.click(), SHOW_MORE);

        let mut panel = FilterPanel::default();
        assert_eq!(panel.label(), FILTERS_COLLAPSED);
        assert_eq!(panel.toggle(), FILTERS_EXPANDED);
    }

    #[test]
    fn collapse_children_needs_more_than_one() {
        assert_eq!(collapse_children(vec!["only"]), Err(vec!["only"]));
        let c = collapse_children(vec!["a", "b", "c"]).unwrap();
        assert_eq!(c.visible, "a");
        assert_eq!(c.hidden, vec!["b", "c"]);
        assert_eq!(c.summary, SHOW_MORE);
    }

    #[test]
    fn popup_modals_open_and_close_by_name() {
        let mut modals = PopupModals::default();
        modals.register("share");
        assert!(!modals.trigger("missing"));
        assert!(modals.trigger("share"));
        assert!(modals.is_visible("share"));
        modals.close("share");
        assert!(!modals.is_visible("share"));
    }

    #[test]
    fn navbar_switch_sets_section_and_builds_event() {
        let mut navbar = ContentNavbar::default();
        assert_eq!(navbar.active(), None);
        let event = navbar.switch("emissions");
        assert_eq!(navbar.active(), Some("emissions"));
        assert_eq!(event.name, "content_navbar_switch");
        assert_eq!(event.params["content_navbar"], "emissions");
    }

    #[test]
    fn conditional_fields_follow_the_checkbox() {
        let mut fields = ConditionalFields::default();
        assert!(!fields.is_visible());
        fields.on_change(true);
        assert!(fields.is_visible());
        fields.on_change(false);
        assert!(!fields.is_visible());
    }
}
