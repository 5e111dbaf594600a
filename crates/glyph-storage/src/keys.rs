//! Token-scoped object key layout
//!
//! Three artifact objects plus one record object per token, under stable
//! keys so regeneration overwrites in place. Public URLs derive from the
//! key and the backend base URL alone.

use serde::{Deserialize, Serialize};

/// The three published artifact representations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Compressed structured pixel history
    Pixels,
    /// Raster snapshot
    Raster,
    /// Vector document
    Vector,
}

impl ArtifactKind {
    /// File name under the token prefix
    #[inline]
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Pixels => "pixels.json.gz",
            Self::Raster => "artifact.png",
            Self::Vector => "artifact.svg",
        }
    }

    /// Content type the object is served with
    #[inline]
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Pixels => "application/gzip",
            Self::Raster => "image/png",
            Self::Vector => "image/svg+xml",
        }
    }

    /// All kinds, in publication order
    #[inline]
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Pixels, Self::Raster, Self::Vector]
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pixels" => Ok(Self::Pixels),
            "raster" => Ok(Self::Raster),
            "vector" => Ok(Self::Vector),
            other => Err(format!("unknown artifact kind: {other}")),
        }
    }
}

/// Key layout under a collection prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKeys {
    prefix: String,
}

impl ArtifactKeys {
    /// Layout rooted at the given prefix (e.g. `tokens`)
    #[inline]
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Key for one artifact representation of a token
    #[inline]
    #[must_use]
    pub fn artifact(&self, token_id: u64, kind: ArtifactKind) -> String {
        format!("{}/{token_id}/{}", self.prefix, kind.file_name())
    }

    /// Key for the token's published record (the commit marker)
    #[inline]
    #[must_use]
    pub fn record(&self, token_id: u64) -> String {
        format!("{}/{token_id}/record.json", self.prefix)
    }
}

impl Default for ArtifactKeys {
    fn default() -> Self {
        Self::new("tokens")
    }
}
