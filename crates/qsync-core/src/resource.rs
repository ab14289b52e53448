//! Resource classes of the remote job queue.
//!
//! Each concrete class (torrents, usenet, web downloads) has its own rate-limit
//! state, poll loop and item list. `Scope::All` is a read-only projection over
//! the three and never carries state of its own.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three independent job categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    Torrents,
    Usenet,
    WebDl,
}

impl ResourceClass {
    /// Every concrete class, in display order.
    pub const ALL: [ResourceClass; 3] = [
        ResourceClass::Torrents,
        ResourceClass::Usenet,
        ResourceClass::WebDl,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceClass::Torrents => "torrents",
            ResourceClass::Usenet => "usenet",
            ResourceClass::WebDl => "webdl",
        }
    }

    /// Query parameter naming the item id on link and control requests.
    pub fn id_param(self) -> &'static str {
        match self {
            ResourceClass::Torrents => "torrent_id",
            ResourceClass::Usenet => "usenet_id",
            ResourceClass::WebDl => "web_id",
        }
    }

    /// Endpoint name for item-level lifecycle operations.
    pub fn control_endpoint(self) -> &'static str {
        match self {
            ResourceClass::Torrents => "controltorrent",
            ResourceClass::Usenet => "controlusenetdownload",
            ResourceClass::WebDl => "controlwebdownload",
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known class.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource class: {0} (expected torrents, usenet, webdl or all)")]
pub struct UnknownClass(pub String);

impl FromStr for ResourceClass {
    type Err = UnknownClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "torrents" | "torrent" => Ok(ResourceClass::Torrents),
            "usenet" => Ok(ResourceClass::Usenet),
            "webdl" | "web" => Ok(ResourceClass::WebDl),
            other => Err(UnknownClass(other.to_string())),
        }
    }
}

/// Either one concrete class or the virtual union of all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    All,
    Class(ResourceClass),
}

impl Scope {
    /// Concrete classes covered by this scope.
    pub fn classes(self) -> Vec<ResourceClass> {
        match self {
            Scope::All => ResourceClass::ALL.to_vec(),
            Scope::Class(c) => vec![c],
        }
    }

    pub fn contains(self, class: ResourceClass) -> bool {
        match self {
            Scope::All => true,
            Scope::Class(c) => c == class,
        }
    }
}

impl From<ResourceClass> for Scope {
    fn from(class: ResourceClass) -> Self {
        Scope::Class(class)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => f.write_str("all"),
            Scope::Class(c) => c.fmt(f),
        }
    }
}

impl FromStr for Scope {
    type Err = UnknownClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Scope::All);
        }
        s.parse().map(Scope::Class)
    }
}
