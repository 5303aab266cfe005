//! Model pricing and cost calculation
//!
//! Costs are computed from a [`PriceTable`]: normalized model name mapped to
//! four per-token-type rates. Rates are stored as micro-USD per million
//! tokens so the whole path is integer arithmetic and reproducible.
//!
//! The table is resolved through three tiers:
//!
//! 1. **Cached** — a price sheet fetched within the last 24 hours and kept
//!    on disk. Used without consulting the network again.
//! 2. **Fresh** — fetched from the LiteLLM price sheet just now and
//!    persisted to the cache.
//! 3. **Bundled** — the static table compiled into the binary.
//!
//! Resolution never fails: a fetch failure only selects a lower tier. The
//! active tier is carried in every published snapshot for display.

mod cache;
mod fetcher;

pub use cache::default_cache_path;

use crate::types::{Money, UsageCounters};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Per-model unit rates, in micro-USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRates {
    pub input: u64,
    pub output: u64,
    pub cache_creation: u64,
    pub cache_read: u64,
}

/// Rates applied when a model is unknown after normalization (sonnet-tier).
///
/// Failing closed to a mid-tier rate keeps costs visible for new models
/// instead of silently dropping them.
pub const DEFAULT_RATES: ModelRates = ModelRates {
    input: 3_000_000,
    output: 15_000_000,
    cache_creation: 3_750_000,
    cache_read: 300_000,
};

/// Which source produced the active price table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingTier {
    /// Fetched from the remote price sheet this run
    Fresh,
    /// Loaded from the on-disk cache (fetched within the TTL)
    Cached,
    /// Static table compiled into the binary
    #[default]
    Bundled,
}

impl PricingTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingTier::Fresh => "fresh",
            PricingTier::Cached => "cached",
            PricingTier::Bundled => "bundled",
        }
    }
}

impl std::fmt::Display for PricingTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalize a raw model identifier to its priced family+tier key.
///
/// Date/version-stamped identifiers collapse to their base model name, e.g.
/// `claude-sonnet-4-5-20250929` becomes `claude-sonnet-4-5`. Unrecognized
/// identifiers pass through lowercased; the table lookup then falls back to
/// [`DEFAULT_RATES`].
pub fn normalize_model(model: &str) -> String {
    let m = model.to_ascii_lowercase();

    if m.contains("opus-4") {
        "claude-opus-4-5".to_string()
    } else if m.contains("sonnet-4") {
        "claude-sonnet-4-5".to_string()
    } else if m.contains("3-5-sonnet") || m.contains("3.5-sonnet") {
        "claude-3-5-sonnet".to_string()
    } else if m.contains("3-opus") || m.contains("3.0-opus") {
        "claude-3-opus".to_string()
    } else if m.contains("3-5-haiku") || m.contains("3.5-haiku") || m.contains("haiku-4") {
        "claude-3-5-haiku".to_string()
    } else if m.contains("3-haiku") || m.contains("3.0-haiku") {
        "claude-3-haiku".to_string()
    } else {
        m
    }
}

/// Mapping from normalized model name to unit rates.
///
/// Never mutated in place; replaced wholesale when a newer sheet resolves.
#[derive(Debug, Clone)]
pub struct PriceTable {
    rates: HashMap<String, ModelRates>,
    default: ModelRates,
}

impl PriceTable {
    /// The static table compiled into the binary.
    pub fn bundled() -> Self {
        let mut rates = HashMap::new();
        rates.insert(
            "claude-sonnet-4-5".to_string(),
            ModelRates {
                input: 3_000_000,
                output: 15_000_000,
                cache_creation: 3_750_000,
                cache_read: 300_000,
            },
        );
        rates.insert(
            "claude-opus-4-5".to_string(),
            ModelRates {
                input: 15_000_000,
                output: 75_000_000,
                cache_creation: 18_750_000,
                cache_read: 1_500_000,
            },
        );
        rates.insert(
            "claude-3-5-sonnet".to_string(),
            ModelRates {
                input: 3_000_000,
                output: 15_000_000,
                cache_creation: 3_750_000,
                cache_read: 300_000,
            },
        );
        rates.insert(
            "claude-3-opus".to_string(),
            ModelRates {
                input: 15_000_000,
                output: 75_000_000,
                cache_creation: 18_750_000,
                cache_read: 1_500_000,
            },
        );
        rates.insert(
            "claude-3-5-haiku".to_string(),
            ModelRates {
                input: 800_000,
                output: 4_000_000,
                cache_creation: 1_000_000,
                cache_read: 80_000,
            },
        );
        rates.insert(
            "claude-3-haiku".to_string(),
            ModelRates {
                input: 250_000,
                output: 1_250_000,
                cache_creation: 300_000,
                cache_read: 30_000,
            },
        );
        Self::from_rates(rates)
    }

    /// Build a table from resolved rates, keeping the documented default.
    pub fn from_rates(rates: HashMap<String, ModelRates>) -> Self {
        Self {
            rates,
            default: DEFAULT_RATES,
        }
    }

    /// Number of priced models.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Rates for a raw model identifier, normalizing first.
    ///
    /// Unknown models use the default rates rather than failing.
    pub fn rates_for(&self, model: &str) -> &ModelRates {
        let normalized = normalize_model(model);
        match self.rates.get(&normalized) {
            Some(rates) => rates,
            None => {
                tracing::debug!(model, normalized, "Unknown model, using default rates");
                &self.default
            }
        }
    }

    /// Cost of one record's usage under the given model.
    ///
    /// Each dimension contributes `count × rate / 1_000_000`, floored at
    /// micro-USD. A record with no model uses the default rates.
    pub fn cost(&self, usage: &UsageCounters, model: Option<&str>) -> Money {
        let rates = match model {
            Some(m) => self.rates_for(m),
            None => &self.default,
        };
        Money(
            per_mtok(usage.input_tokens, rates.input)
                + per_mtok(usage.output_tokens, rates.output)
                + per_mtok(usage.cache_creation_tokens, rates.cache_creation)
                + per_mtok(usage.cache_read_tokens, rates.cache_read),
        )
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::bundled()
    }
}

fn per_mtok(tokens: u64, rate: u64) -> u64 {
    (tokens as u128 * rate as u128 / 1_000_000) as u64
}

/// Resolve a price table through the fresh/cached/bundled tiers.
///
/// The remote sheet is consulted at most once per cache TTL: a valid cache
/// short-circuits the fetch entirely. With `allow_fetch` false (offline
/// mode), resolution goes straight from cache to bundled.
pub fn resolve(cache_path: &Path, allow_fetch: bool) -> (PriceTable, PricingTier) {
    if let Some(rates) = cache::load(cache_path) {
        tracing::info!(models = rates.len(), "Using cached price table");
        return (PriceTable::from_rates(rates), PricingTier::Cached);
    }

    if allow_fetch {
        match fetcher::fetch_price_sheet() {
            Ok(rates) if !rates.is_empty() => {
                tracing::info!(models = rates.len(), "Fetched fresh price table");
                if let Err(e) = cache::save(cache_path, &rates) {
                    tracing::warn!(error = %e, "Failed to persist price cache");
                }
                return (PriceTable::from_rates(rates), PricingTier::Fresh);
            }
            Ok(_) => {
                tracing::warn!("Price sheet contained no usable models");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Price fetch failed, falling back");
            }
        }
    }

    tracing::info!("Using bundled price table");
    (PriceTable::bundled(), PricingTier::Bundled)
}
