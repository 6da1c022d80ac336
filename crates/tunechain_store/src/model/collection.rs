//! Known marketplace collections.
//!
//! # Responsibility
//! - Provide the closed set of collection names backed by durable artifacts.
//! - Map each collection to its artifact file name.
//!
//! # Invariants
//! - Unknown collection names never reach storage; only `FromStr` accepts
//!   strings and it rejects anything outside [`Collection::ALL`].

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Number of known collections.
pub const COLLECTION_COUNT: usize = 10;

/// Logical collection backed by one JSON array file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Users,
    Tracks,
    Artists,
    Nfts,
    Playlists,
    Licenses,
    Proposals,
    Votes,
    Transactions,
    Analytics,
}

impl Collection {
    /// Every known collection, in artifact declaration order.
    pub const ALL: [Collection; COLLECTION_COUNT] = [
        Collection::Users,
        Collection::Tracks,
        Collection::Artists,
        Collection::Nfts,
        Collection::Playlists,
        Collection::Licenses,
        Collection::Proposals,
        Collection::Votes,
        Collection::Transactions,
        Collection::Analytics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Tracks => "tracks",
            Self::Artists => "artists",
            Self::Nfts => "nfts",
            Self::Playlists => "playlists",
            Self::Licenses => "licenses",
            Self::Proposals => "proposals",
            Self::Votes => "votes",
            Self::Transactions => "transactions",
            Self::Analytics => "analytics",
        }
    }

    /// Artifact file name inside the store data directory.
    pub fn file_name(self) -> String {
        format!("{}.json", self.as_str())
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|collection| collection.as_str() == normalized)
            .ok_or_else(|| StoreError::UnknownCollection(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::Collection;
    use crate::error::StoreError;

    #[test]
    fn names_roundtrip_through_from_str() {
        for collection in Collection::ALL {
            let parsed: Collection = collection.as_str().parse().unwrap();
            assert_eq!(parsed, collection);
        }
    }

    #[test]
    fn from_str_is_case_insensitive_and_rejects_unknown() {
        assert_eq!(" Tracks ".parse::<Collection>().unwrap(), Collection::Tracks);
        let err = "albums".parse::<Collection>().unwrap_err();
        assert!(matches!(err, StoreError::UnknownCollection(name) if name == "albums"));
    }

    #[test]
    fn index_matches_declaration_order() {
        for (position, collection) in Collection::ALL.into_iter().enumerate() {
            assert_eq!(collection.index(), position);
        }
        assert_eq!(Collection::Nfts.file_name(), "nfts.json");
    }
}
