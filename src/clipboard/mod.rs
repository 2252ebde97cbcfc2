//! Copy buttons: a `.js-copy-text` control copies the markup of its
//! `.js-copy-hidden` sibling to the clipboard.

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClipboardError {
    #[error("invalid selector '{0}'")]
    Selector(String),

    #[error("no copy button {index} on the page ({found} found)")]
    NoButton { index: usize, found: usize },

    #[error("copy button {index} has no hidden text beside it")]
    NoSource { index: usize },

    #[error("clipboard is not available")]
    Unavailable,
}

pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryClipboard {
    contents: Option<String>,
}

impl MemoryClipboard {
    pub fn contents(&self) -> Option<&str> {
        self.contents.as_deref()
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.contents = Some(text.to_string());
        Ok(())
    }
}

fn has_class(el: &ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

/// Hidden text for each copy button, in document order. A button without
/// a hidden sibling yields `None`.
pub fn copy_sources(html: &str) -> Result<Vec<Option<String>>, ClipboardError> {
    let doc = Html::parse_document(html);
    let buttons = Selector::parse(".js-copy-text")
        .map_err(|_| ClipboardError::Selector(".js-copy-text".to_string()))?;
    let sources = doc
        .select(&buttons)
        .map(|button| {
            let parent = button.parent()?;
            parent
                .children()
                .filter_map(ElementRef::wrap)
                .find(|sibling| has_class(sibling, "js-copy-hidden"))
                .map(|hidden| hidden.inner_html())
        })
        .collect();
    Ok(sources)
}

/// Clicks copy button `index` and returns what was copied.
pub fn copy_text<C: Clipboard + ?Sized>(
    html: &str,
    index: usize,
    clipboard: &mut C,
) -> Result<String, ClipboardError> {
    let sources = copy_sources(html)?;
    let found = sources.len();
    let text = sources
        .into_iter()
        .nth(index)
        .ok_or(ClipboardError::NoButton { index, found })?
        .ok_or(ClipboardError::NoSource { index })?;
    clipboard.write_text(&text)?;
    debug!(index, chars = text.chars().count(), "copied hidden text");
    Ok(text)
}
