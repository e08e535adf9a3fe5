// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Types

pub mod time;
pub mod url;

pub use self::time::Timestamp;
pub use self::url::{RelayUrl, TryIntoUrl};
