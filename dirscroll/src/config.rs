//! Session and balancer configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::listing::{ListingFilter, SortSpec};
use crate::resolver::DEFAULT_ROOT_MARKER;

/// Default number of buffered rows kept on each side of the viewport.
pub const DEFAULT_BALANCE_TARGET: usize = 15;
/// Default sleep between balancer polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Prefetch balancer tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BalancerConfig {
    /// Rows to keep materialized above and below the viewport.
    pub target: usize,
    /// Sleep between polls.
    #[cfg_attr(feature = "serde", serde(with = "duration_millis"))]
    pub poll_interval: Duration,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            target: DEFAULT_BALANCE_TARGET,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl BalancerConfig {
    /// Set the per-side buffer target.
    pub fn target(mut self, target: usize) -> Self {
        self.target = target;
        self
    }

    /// Set the poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Everything needed to open a [`crate::ViewSession`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Marker prefixed to every identifier.
    pub root_marker: String,
    /// Root anchor identifiers are relative to.
    pub anchor: PathBuf,
    /// Balancer tuning.
    pub balancer: BalancerConfig,
    /// Listing filter.
    pub filter: ListingFilter,
    /// Listing sort; `None` keeps filesystem order.
    pub sort: Option<SortSpec>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            root_marker: DEFAULT_ROOT_MARKER.to_string(),
            anchor: PathBuf::from("/"),
            balancer: BalancerConfig::default(),
            filter: ListingFilter::default(),
            sort: None,
        }
    }
}

impl SessionConfig {
    /// Default configuration anchored at `anchor`.
    pub fn new(anchor: impl Into<PathBuf>) -> Self {
        Self {
            anchor: anchor.into(),
            ..Self::default()
        }
    }

    /// Set the root marker.
    pub fn root_marker(mut self, marker: impl Into<String>) -> Self {
        self.root_marker = marker.into();
        self
    }

    /// Set the balancer configuration.
    pub fn balancer(mut self, balancer: BalancerConfig) -> Self {
        self.balancer = balancer;
        self
    }

    /// Set the listing filter.
    pub fn filter(mut self, filter: ListingFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the listing sort.
    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }
}

#[cfg(feature = "serde")]
mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::SortBy;

    #[test]
    fn defaults() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.root_marker, "root");
        assert_eq!(cfg.balancer.target, 15);
        assert_eq!(cfg.balancer.poll_interval, Duration::from_millis(50));
        assert!(cfg.filter.accepts_all());
        assert!(cfg.sort.is_none());
    }

    #[test]
    fn builders_chain() {
        let cfg = SessionConfig::new("/data/pics")
            .root_marker("sd")
            .balancer(BalancerConfig::default().target(4).poll_interval(Duration::from_millis(5)))
            .sort(SortSpec::new(SortBy::Modified).descending());
        assert_eq!(cfg.anchor, PathBuf::from("/data/pics"));
        assert_eq!(cfg.root_marker, "sd");
        assert_eq!(cfg.balancer.target, 4);
        assert_eq!(cfg.sort.map(|s| s.ascending), Some(false));
    }
}
