//! Resolver configuration.
//!
//! [`ResolverConfig::default`] suits most uses; the `with_*` methods override
//! one setting at a time:
//!
//! ```ignore
//! use sumpack::{LayoutMode, Resolver, ResolverConfig};
//!
//! let resolver = Resolver::with_config(
//!     ResolverConfig::default()
//!         .with_default_layout(LayoutMode::IntKeyed)
//!         .with_build_guard(false),
//! );
//! ```

use std::sync::OnceLock;

use crate::union::LayoutMode;

/// Returns the default number of shards for the resolver's internal maps.
pub fn default_shard_amount() -> usize {
    static SHARD_AMOUNT: OnceLock<usize> = OnceLock::new();
    *SHARD_AMOUNT.get_or_init(|| {
        (std::thread::available_parallelism().map_or(1, usize::from) * 16)
            .next_power_of_two()
    })
}

/// Settings of a [`Resolver`](crate::Resolver).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
    default_layout: LayoutMode,
    build_guard: bool,
    shard_amount: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_layout: LayoutMode::StringKeyed,
            build_guard: true,
            shard_amount: default_shard_amount(),
        }
    }
}

impl ResolverConfig {
    /// The layout of sum types that do not pin one themselves.
    #[must_use]
    pub const fn default_layout(&self) -> LayoutMode { self.default_layout }

    /// Whether concurrent first-time resolutions of one type wait for a
    /// single build instead of each building their own.
    #[must_use]
    pub const fn build_guard(&self) -> bool { self.build_guard }

    #[must_use]
    pub const fn shard_amount(&self) -> usize { self.shard_amount }

    #[must_use]
    pub const fn with_default_layout(mut self, layout: LayoutMode) -> Self {
        self.default_layout = layout;
        self
    }

    #[must_use]
    pub const fn with_build_guard(mut self, enabled: bool) -> Self {
        self.build_guard = enabled;
        self
    }

    /// Sets the shard amount, rounded up to a power of two of at least 2.
    #[must_use]
    pub const fn with_shard_amount(mut self, shard_amount: usize) -> Self {
        let shard_amount = if shard_amount < 2 { 2 } else { shard_amount };
        self.shard_amount = shard_amount.next_power_of_two();
        self
    }
}
