// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Tag

use serde::{Deserialize, Serialize};

use crate::filter::SingleLetterTag;

/// Tags
pub type Tags = Vec<Tag>;

/// Tag
///
/// An ordered sequence of strings: the first one is the tag name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(Vec<String>);

impl Tag {
    /// Parse tag from a list of strings
    ///
    /// Returns `None` if the list is empty.
    pub fn parse<I, S>(tag: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tag: Vec<String> = tag.into_iter().map(|s| s.into()).collect();
        if tag.is_empty() {
            return None;
        }
        Some(Self(tag))
    }

    /// Build a tag with a name and a single value
    #[inline]
    pub fn custom<N, V>(name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self(vec![name.into(), value.into()])
    }

    /// Tag name (first element)
    #[inline]
    pub fn kind(&self) -> &str {
        self.0.first().map(|s| s.as_str()).unwrap_or_default()
    }

    /// Tag value (second element)
    #[inline]
    pub fn content(&self) -> Option<&str> {
        self.0.get(1).map(|s| s.as_str())
    }

    /// Single-letter tag name, if the name is one ASCII letter
    #[inline]
    pub fn single_letter_tag(&self) -> Option<SingleLetterTag> {
        SingleLetterTag::parse(self.kind())
    }

    /// Get as slice
    #[inline]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Consume into a list of strings
    #[inline]
    pub fn to_vec(self) -> Vec<String> {
        self.0
    }
}
