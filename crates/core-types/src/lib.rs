//! Shared identifiers used across the storygate crates.

use std::fmt;

use uuid::Uuid;

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PageId(pub String);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of a loadable resource (an image element) inside a page.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ResourceId(pub Uuid);

impl ResourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable story identifier, e.g. `example-image--default`.
///
/// Used as the baseline key by the snapshot store, so it must be derived
/// deterministically rather than generated.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct StoryId(pub String);

impl StoryId {
    /// Build an id from a story title (`Example/Image`) and export name
    /// (`WaitForImagesInPlayFunction`).
    pub fn from_parts(title: &str, export_name: &str) -> Self {
        Self(format!(
            "{}--{}",
            sanitize(title),
            sanitize(&split_camel(export_name))
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase, collapse every run of non-alphanumerics into one `-`, trim dashes.
fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// `WaitForImagesInPlayFunction` -> `Wait For Images In Play Function`.
fn split_camel(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 8);
    for (idx, &ch) in chars.iter().enumerate() {
        if idx > 0 && ch.is_ascii_uppercase() {
            let prev = chars[idx - 1];
            let next_lower = chars.get(idx + 1).is_some_and(|c| c.is_ascii_lowercase());
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_lower)
            {
                out.push(' ');
            }
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn story_id_kebab_cases_export_name() {
        let id = StoryId::from_parts("Example/Image", "WaitForImagesInPlayFunction");
        assert_eq!(id.as_str(), "example-image--wait-for-images-in-play-function");
    }

    #[test]
    fn story_id_keeps_acronyms_together() {
        let id = StoryId::from_parts("Example/Image", "MockImagesWithMSW");
        assert_eq!(id.as_str(), "example-image--mock-images-with-msw");
    }

    #[test]
    fn story_id_default_export() {
        let id = StoryId::from_parts("Example/Image", "Default");
        assert_eq!(id.as_str(), "example-image--default");
    }

    #[test]
    fn resource_ids_are_unique() {
        assert_ne!(ResourceId::new(), ResourceId::new());
    }
}
