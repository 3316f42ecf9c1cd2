//! Per-tree configuration.
//!
//! An [`MfsConfig`] is handed to [`Root`](crate::Root) once; every directory of
//! that tree shares it, so the sharding policy cannot differ within a tree.

use arbor_crypto::IdentityBuilder;
use arbor_encoding::DEFAULT_FANOUT;
use serde::{Deserialize, Serialize};

use crate::error::{MfsError, MfsResult};

/// When a directory converts its flat link list into a shard table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardingPolicy {
    /// Directories stay flat.
    Disabled,
    /// Convert as soon as a link addition would bring the directory to this
    /// many links. `0` and `1` convert on the first addition.
    Threshold(usize),
}

impl ShardingPolicy {
    /// Whether any directory can ever convert.
    pub fn is_enabled(self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Whether a flat directory holding `links_after` links once the
    /// pending addition lands should convert first.
    pub fn should_shard(self, links_after: usize) -> bool {
        match self {
            Self::Disabled => false,
            Self::Threshold(limit) => links_after >= limit,
        }
    }
}

/// Per-tree configuration, fixed when the [`Root`](crate::Root) is built
/// and shared by every directory of that tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MfsConfig {
    /// When directories migrate to a shard table. Defaults to `Disabled`.
    pub sharding: ShardingPolicy,
    /// Slots per shard; a power of two in `2..=1024`.
    pub hamt_fanout: usize,
    /// Builder for nodes the tree creates from scratch.
    pub identity_builder: IdentityBuilder,
}

impl Default for MfsConfig {
    fn default() -> Self {
        Self {
            sharding: ShardingPolicy::Disabled,
            hamt_fanout: DEFAULT_FANOUT,
            identity_builder: IdentityBuilder::default(),
        }
    }
}

impl MfsConfig {
    /// Default configuration with sharding at `threshold` links.
    pub fn sharded(threshold: usize) -> Self {
        Self {
            sharding: ShardingPolicy::Threshold(threshold),
            ..Default::default()
        }
    }

    /// Override the shard fan-out. Checked by [`validate`](Self::validate).
    pub fn with_fanout(mut self, fanout: usize) -> Self {
        self.hamt_fanout = fanout;
        self
    }

    /// Parse and validate a TOML document.
    ///
    /// ```toml
    /// sharding = { threshold = 1000 }
    /// hamt_fanout = 256
    ///
    /// [identity_builder]
    /// domain = "arbor-node-v1"
    /// ```
    pub fn from_toml_str(s: &str) -> MfsResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| MfsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the fan-out is a power of two in `2..=1024` and the identity
    /// domain is non-empty. Called by every [`Root`](crate::Root) constructor.
    pub fn validate(&self) -> MfsResult<()> {
        let fanout = self.hamt_fanout;
        if !(2..=1024).contains(&fanout) || !fanout.is_power_of_two() {
            return Err(MfsError::Config(format!(
                "hamt_fanout must be a power of two between 2 and 1024, got {fanout}"
            )));
        }
        if self.identity_builder.domain().is_empty() {
            return Err(MfsError::Config("identity domain must not be empty".into()));
        }
        Ok(())
    }
}
