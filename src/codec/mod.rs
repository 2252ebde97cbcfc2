use std::collections::BTreeMap;

use thiserror::Error;
use url::form_urlencoded;

/// Flat single-valued state, as carried in a URL hash fragment.
pub type StateMap = BTreeMap<String, String>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid percent-encoding in '{segment}'")]
    InvalidEncoding { segment: String },
}

/// Joins `key=value` pairs with `&`, percent-encoding keys and values
/// independently.
pub fn encode(state: &StateMap) -> String {
    state
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Splits on `&`, then on the first `=`. Empty segments are skipped and a
/// segment without `=` decodes to an empty value. Later keys overwrite
/// earlier ones.
pub fn decode(raw: &str) -> Result<StateMap, CodecError> {
    let mut out = StateMap::new();
    for segment in raw.split('&') {
        if segment.is_empty() {
            continue;
        }
        let (k, v) = segment.split_once('=').unwrap_or((segment, ""));
        out.insert(percent_decode(k, segment)?, percent_decode(v, segment)?);
    }
    Ok(out)
}

fn percent_decode(part: &str, segment: &str) -> Result<String, CodecError> {
    let invalid = || CodecError::InvalidEncoding {
        segment: segment.to_string(),
    };
    if !escapes_well_formed(part) {
        return Err(invalid());
    }
    urlencoding::decode(part)
        .map(|s| s.into_owned())
        .map_err(|_| invalid())
}

/// Every `%` must be followed by two hex digits.
fn escapes_well_formed(part: &str) -> bool {
    let bytes = part.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            match bytes.get(i + 1..i + 3) {
                Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => i += 3,
                _ => return false,
            }
        } else {
            i += 1;
        }
    }
    true
}

/// Ordered multi-map over a query string, following the usual
/// form-urlencoded conventions (`+` for spaces, repeated keys allowed).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a query string with or without the leading `?`.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let pairs = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self { pairs }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn append(&mut self, key: &str, value: &str) {
        self.pairs.push((key.to_string(), value.to_string()));
    }

    pub fn delete(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    /// Replaces every value of `key` with `values`, appended at the end.
    pub fn replace_all(&mut self, key: &str, values: &[String]) {
        self.delete(key);
        for value in values {
            self.append(key, value);
        }
    }

    pub fn set(&mut self, key: &str, value: &str) {
        match self.pairs.iter().position(|(k, _)| k == key) {
            Some(idx) => {
                self.pairs[idx].1 = value.to_string();
                let mut seen = false;
                self.pairs.retain(|(k, _)| {
                    if k != key {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.append(key, value),
        }
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish()
    }
}

impl std::fmt::Display for QueryParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_query_string())
    }
}
