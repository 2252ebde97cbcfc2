use serde::Serialize;
use tracing::debug;

use crate::registry::Registry;
use crate::state::{self, Action, PageState};

pub const DEFAULT_MIN_CHARS: usize = 3;
pub const DEFAULT_MAX_ITEMS: usize = 10;

/// What happens once a council is picked from the list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    /// Go to the council's own page.
    Search,
    /// Go to the council's scoring table with its row highlighted.
    Jump,
    /// Add the council to the comparison set of the current page.
    Compare,
    /// Switch the methodology page to the council's type.
    Methodology,
}

impl Variant {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "search" | "location-search" => Some(Self::Search),
            "jump" | "location-jump" => Some(Self::Jump),
            "compare" | "location-compare" => Some(Self::Compare),
            "methodology" => Some(Self::Methodology),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AutocompleteOptions {
    pub variant: Variant,
    pub min_chars: usize,
    pub max_items: usize,
    pub auto_first: bool,
    /// Restricts the list to one council type when set.
    pub category: Option<String>,
}

impl AutocompleteOptions {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            min_chars: DEFAULT_MIN_CHARS,
            max_items: DEFAULT_MAX_ITEMS,
            auto_first: true,
            category: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Suggestions {
    pub items: Vec<String>,
    pub highlighted: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", content = "value", rename_all = "snake_case")]
pub enum Effect {
    Navigate(String),
    SetActiveCouncilType(String),
}

/// A typeahead bound to one input.
#[derive(Clone, Debug)]
pub struct Autocomplete {
    options: AutocompleteOptions,
    list: Vec<String>,
}

impl Autocomplete {
    pub fn attach(registry: &Registry, options: AutocompleteOptions) -> Self {
        let list = registry.names(options.category.as_deref());
        Self { options, list }
    }

    pub fn options(&self) -> &AutocompleteOptions {
        &self.options
    }

    /// Case-insensitive substring match, shortest names first, ties broken
    /// alphabetically. The minimum length counts the raw input, surrounding
    /// whitespace included; only the match itself uses the trimmed text.
    pub fn suggest(&self, input: &str) -> Suggestions {
        if input.chars().count() < self.options.min_chars {
            return Suggestions::default();
        }
        let needle = input.trim().to_lowercase();
        let mut items: Vec<String> = self
            .list
            .iter()
            .filter(|name| name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        items.truncate(self.options.max_items);
        let highlighted = if self.options.auto_first && !items.is_empty() {
            Some(0)
        } else {
            None
        };
        Suggestions { items, highlighted }
    }

    /// Resolves `text` to a council and returns the resulting effect.
    /// Text that names no council yields `None` and changes nothing.
    pub fn select(&self, text: &str, registry: &Registry, page: &PageState) -> Option<Effect> {
        let Some(council) = registry.by_name(text) else {
            debug!(text, "autocomplete selection matched no council");
            return None;
        };
        let effect = match self.options.variant {
            Variant::Search => Effect::Navigate(council.council_url.clone()),
            Variant::Jump => Effect::Navigate(state::jump_url(&council.scoring_url, &council.slug)),
            Variant::Compare => Effect::Navigate(state::compute_next_url(
                page,
                &Action::AddComparison(council.slug.clone()),
            )),
            Variant::Methodology => Effect::SetActiveCouncilType(council.council_type.clone()),
        };
        Some(effect)
    }

    /// Free-text submission acts only when the text names a council.
    pub fn submit(&self, text: &str, registry: &Registry, page: &PageState) -> Option<Effect> {
        self.select(text.trim(), registry, page)
    }
}

/// The methodology page shows the criteria for one council type at a time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MethodologyPanel {
    pub active_council_type: Option<String>,
    pub inputs: Vec<String>,
}

impl MethodologyPanel {
    pub fn new(input_count: usize) -> Self {
        Self {
            active_council_type: None,
            inputs: vec![String::new(); input_count],
        }
    }

    /// Tab switch: activates the type and clears every council input.
    pub fn switch_to(&mut self, council_type: &str) {
        self.active_council_type = Some(council_type.to_string());
        for input in self.inputs.iter_mut() {
            input.clear();
        }
    }

    pub fn apply(&mut self, effect: &Effect) {
        if let Effect::SetActiveCouncilType(t) = effect {
            self.active_council_type = Some(t.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Council;

    fn registry() -> Registry {
        let council = |name: &str, slug: &str, t: &str| Council {
            name: name.to_string(),
            slug: slug.to_string(),
            council_type: t.to_string(),
            council_url: format!("/councils/{slug}/"),
            scoring_url: format!("/scoring/{t}/"),
        };
        Registry::new(vec![
            council("Bath and North East Somerset Council", "bath", "single"),
            council("Bassetlaw District Council", "bassetlaw", "district"),
            council("Basildon Borough Council", "basildon", "district"),
            council("Bristol City Council", "bristol", "single"),
        ])
    }

    #[test]
    fn needs_three_characters() {
        let ac = Autocomplete::attach(&registry(), AutocompleteOptions::new(Variant::Search));
        assert!(ac.suggest("Ba").items.is_empty());
        assert_eq!(ac.suggest("Ba").highlighted, None);
        assert_eq!(ac.suggest("bas").items.len(), 2);
    }

    #[test]
    fn minimum_length_counts_surrounding_spaces() {
        let ac = Autocomplete::attach(&registry(), AutocompleteOptions::new(Variant::Search));
        assert!(ac.suggest("ba").items.is_empty());
        let padded = ac.suggest("  ba");
        assert_eq!(padded.items.len(), 3);
        assert!(padded.items.iter().all(|name| name.to_lowercase().contains("ba")));
    }

    #[test]
    fn first_suggestion_is_highlighted_and_shortest_first() {
        let ac = Autocomplete::attach(&registry(), AutocompleteOptions::new(Variant::Search));
        let s = ac.suggest("council");
        assert_eq!(s.highlighted, Some(0));
        assert_eq!(s.items[0], "Bristol City Council");
        assert_eq!(s.items.len(), 4);
    }

    #[test]
    fn category_restricts_the_list() {
        let mut opts = AutocompleteOptions::new(Variant::Search);
        opts.category = Some("district".to_string());
        let ac = Autocomplete::attach(&registry(), opts);
        let s = ac.suggest("council");
        assert_eq!(s.items.len(), 2);
        assert!(s.items.iter().all(|n| n.starts_with("Bas")));
    }

    #[test]
    fn variants_navigate_differently() {
        let reg = registry();
        let page = PageState::parse("/compare/?comparisons=bath").unwrap();

        let search = Autocomplete::attach(&reg, AutocompleteOptions::new(Variant::Search));
        assert_eq!(
            search.select("Bristol City Council", &reg, &page),
            Some(Effect::Navigate("/councils/bristol/".to_string()))
        );

        let jump = Autocomplete::attach(&reg, AutocompleteOptions::new(Variant::Jump));
        assert_eq!(
            jump.select("Bristol City Council", &reg, &page),
            Some(Effect::Navigate("/scoring/single/#jump=bristol".to_string()))
        );

        let compare = Autocomplete::attach(&reg, AutocompleteOptions::new(Variant::Compare));
        assert_eq!(
            compare.select("Bristol City Council", &reg, &page),
            Some(Effect::Navigate(
                "/compare/?comparisons=bath&comparisons=bristol#results".to_string()
            ))
        );
    }

    #[test]
    fn unknown_text_produces_nothing() {
        let reg = registry();
        let page = PageState::parse("/compare/?comparisons=bath").unwrap();
        let before = page.clone();
        let ac = Autocomplete::attach(&reg, AutocompleteOptions::new(Variant::Compare));
        assert_eq!(ac.select("Gotham City Council", &reg, &page), None);
        assert_eq!(ac.submit("Bristol", &reg, &page), None);
        assert_eq!(page, before);
    }

    #[test]
    fn methodology_switch_clears_inputs() {
        let reg = registry();
        let page = PageState::default();
        let ac = Autocomplete::attach(&reg, AutocompleteOptions::new(Variant::Methodology));
        let mut panel = MethodologyPanel::new(2);
        panel.inputs[0] = "Bassetlaw District Council".to_string();

        let effect = ac.select("Bassetlaw District Council", &reg, &page).unwrap();
        panel.apply(&effect);
        assert_eq!(panel.active_council_type.as_deref(), Some("district"));

        panel.switch_to("county");
        assert_eq!(panel.active_council_type.as_deref(), Some("county"));
        assert!(panel.inputs.iter().all(String::is_empty));
    }
}
