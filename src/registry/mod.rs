use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One entry of the council directory the server embeds in every page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Council {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub council_type: String,
    #[serde(default)]
    pub council_url: String,
    #[serde(default)]
    pub scoring_url: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CouncilField {
    Name,
    Slug,
    CouncilType,
    CouncilUrl,
    ScoringUrl,
}

impl CouncilField {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "name" => Some(Self::Name),
            "slug" => Some(Self::Slug),
            "council_type" | "type" => Some(Self::CouncilType),
            "council_url" => Some(Self::CouncilUrl),
            "scoring_url" => Some(Self::ScoringUrl),
            _ => None,
        }
    }
}

impl Council {
    pub fn field(&self, field: CouncilField) -> &str {
        match field {
            CouncilField::Name => &self.name,
            CouncilField::Slug => &self.slug,
            CouncilField::CouncilType => &self.council_type,
            CouncilField::CouncilUrl => &self.council_url,
            CouncilField::ScoringUrl => &self.scoring_url,
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to parse council directory: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read council directory: {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// First council whose `field` equals `value`, in directory order.
pub fn find_item<'a>(
    items: &'a [Council],
    field: CouncilField,
    value: &str,
) -> Option<&'a Council> {
    items.iter().find(|c| c.field(field) == value)
}

/// Read-only council directory. Lookups are linear; the directory holds
/// a few hundred entries at most.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    items: Vec<Council>,
}

impl Registry {
    pub fn new(items: Vec<Council>) -> Self {
        Self { items }
    }

    pub fn from_json(raw: &str) -> Result<Self, RegistryError> {
        let items: Vec<Council> =
            serde_json::from_str(raw).map_err(|source| RegistryError::Parse { source })?;
        Ok(Self::new(items))
    }

    pub async fn load(path: &str) -> Result<Self, RegistryError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| RegistryError::Read {
                path: path.to_string(),
                source,
            })?;
        Self::from_json(&raw)
    }

    pub fn items(&self) -> &[Council] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn find(&self, field: CouncilField, value: &str) -> Option<&Council> {
        find_item(&self.items, field, value)
    }

    pub fn by_name(&self, name: &str) -> Option<&Council> {
        self.find(CouncilField::Name, name)
    }

    pub fn by_slug(&self, slug: &str) -> Option<&Council> {
        self.find(CouncilField::Slug, slug)
    }

    /// Display names for an autocomplete list, optionally restricted to one
    /// council type.
    pub fn names(&self, category: Option<&str>) -> Vec<String> {
        self.items
            .iter()
            .filter(|c| category.map_or(true, |t| c.council_type == t))
            .map(|c| c.name.clone())
            .collect()
    }
}
