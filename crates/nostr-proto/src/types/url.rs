// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Relay URL

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::{ParseError, Url};

/// Relay URL error
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// Url parse error
    Url(ParseError),
    /// Unsupported scheme
    UnsupportedScheme(String),
    /// Missing host
    MissingHost,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(e) => write!(f, "{e}"),
            Self::UnsupportedScheme(scheme) => write!(f, "unsupported scheme: {scheme}"),
            Self::MissingHost => write!(f, "missing host"),
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::Url(e)
    }
}

/// Normalized relay URL
///
/// Equality, ordering and hashing use the normalized form, so
/// `wss://Relay.Example.com:443/` and `relay.example.com` are the same relay.
#[derive(Debug, Clone)]
pub struct RelayUrl {
    url: Url,
    normalized: String,
}

impl RelayUrl {
    /// Parse and normalize a relay URL
    ///
    /// - a missing scheme defaults to `wss://`
    /// - `http`/`https` are mapped to `ws`/`wss`
    /// - scheme and host are lowercased and the default port is dropped
    /// - trailing slashes and the fragment are removed, query params are sorted
    pub fn parse(url: &str) -> Result<Self, Error> {
        let url: &str = url.trim();

        let (scheme, rest) = match url.split_once("://") {
            Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest),
            None => (String::from("wss"), url),
        };

        let scheme: &str = match scheme.as_str() {
            "ws" | "http" => "ws",
            "wss" | "https" => "wss",
            _ => return Err(Error::UnsupportedScheme(scheme)),
        };

        let mut url: Url = Url::parse(&format!("{scheme}://{rest}"))?;

        if url.host_str().is_none_or(|host| host.is_empty()) {
            return Err(Error::MissingHost);
        }

        url.set_fragment(None);

        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            pairs.sort();
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }

        let normalized: String = normalize(&url);

        Ok(Self { url, normalized })
    }

    /// Get as [`Url`]
    #[inline]
    pub fn as_url(&self) -> &Url {
        &self.url
    }

    /// Get normalized URL as `&str`
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// Check if the scheme is `wss`
    #[inline]
    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "wss"
    }
}

fn normalize(url: &Url) -> String {
    let mut out: String = format!("{}://", url.scheme());

    if let Some(host) = url.host_str() {
        out.push_str(host);
    }

    // `Url` already drops the default port of special schemes
    if let Some(port) = url.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }

    out.push_str(url.path().trim_end_matches('/'));

    if let Some(query) = url.query() {
        out.push('?');
        out.push_str(query);
    }

    out
}

/// Types that can be converted into a [`RelayUrl`]
pub trait TryIntoUrl {
    /// Parse and normalize
    fn try_into_url(self) -> Result<RelayUrl, Error>;
}

impl TryIntoUrl for RelayUrl {
    #[inline]
    fn try_into_url(self) -> Result<RelayUrl, Error> {
        Ok(self)
    }
}

impl TryIntoUrl for &RelayUrl {
    #[inline]
    fn try_into_url(self) -> Result<RelayUrl, Error> {
        Ok(self.clone())
    }
}

impl TryIntoUrl for &str {
    #[inline]
    fn try_into_url(self) -> Result<RelayUrl, Error> {
        RelayUrl::parse(self)
    }
}

impl TryIntoUrl for String {
    #[inline]
    fn try_into_url(self) -> Result<RelayUrl, Error> {
        RelayUrl::parse(&self)
    }
}

impl TryIntoUrl for &String {
    #[inline]
    fn try_into_url(self) -> Result<RelayUrl, Error> {
        RelayUrl::parse(self)
    }
}

impl PartialEq for RelayUrl {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for RelayUrl {}

impl PartialOrd for RelayUrl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RelayUrl {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized.cmp(&other.normalized)
    }
}

impl Hash for RelayUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl FromStr for RelayUrl {
    type Err = Error;

    #[inline]
    fn from_str(url: &str) -> Result<Self, Self::Err> {
        Self::parse(url)
    }
}

impl TryFrom<&str> for RelayUrl {
    type Error = Error;

    #[inline]
    fn try_from(url: &str) -> Result<Self, Self::Error> {
        Self::parse(url)
    }
}

impl TryFrom<String> for RelayUrl {
    type Error = Error;

    #[inline]
    fn try_from(url: String) -> Result<Self, Self::Error> {
        Self::parse(&url)
    }
}

impl TryFrom<&String> for RelayUrl {
    type Error = Error;

    #[inline]
    fn try_from(url: &String) -> Result<Self, Self::Error> {
        Self::parse(url)
    }
}

impl fmt::Display for RelayUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

impl Serialize for RelayUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.normalized)
    }
}

impl<'de> Deserialize<'de> for RelayUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let url: String = String::deserialize(deserializer)?;
        Self::parse(&url).map_err(serde::de::Error::custom)
    }
}
