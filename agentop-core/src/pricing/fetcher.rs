//! Remote price sheet fetcher
//!
//! Pulls the LiteLLM model price sheet and converts the Claude entries into
//! internal per-Mtok rates. Failures here are never surfaced to the
//! aggregation core; the caller just falls back to a lower tier.

use super::{normalize_model, ModelRates};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const PRICE_SHEET_URL: &str =
    "https://raw.githubusercontent.com/BerriAI/litellm/main/model_prices_and_context_window.json";

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// One model entry from the LiteLLM sheet. Costs are USD per token.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SheetEntry {
    input_cost_per_token: Option<f64>,
    output_cost_per_token: Option<f64>,
    cache_creation_input_token_cost: Option<f64>,
    cache_read_input_token_cost: Option<f64>,
}

/// Fetch and convert the remote price sheet.
pub fn fetch_price_sheet() -> Result<HashMap<String, ModelRates>> {
    tracing::debug!(url = PRICE_SHEET_URL, "Fetching price sheet");

    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .user_agent(concat!("agentop/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Pricing(format!("HTTP client: {e}")))?;

    let response = client
        .get(PRICE_SHEET_URL)
        .send()
        .map_err(|e| Error::Pricing(format!("fetch: {e}")))?;

    if !response.status().is_success() {
        return Err(Error::Pricing(format!(
            "price sheet returned {}",
            response.status()
        )));
    }

    let sheet: HashMap<String, serde_json::Value> = response
        .json()
        .map_err(|e| Error::Pricing(format!("decode: {e}")))?;

    Ok(convert_sheet(sheet))
}

/// Convert sheet entries to internal rates, keeping only Claude models.
///
/// The first entry seen for a normalized name wins, matching the sheet's
/// most-specific-first ordering.
fn convert_sheet(sheet: HashMap<String, serde_json::Value>) -> HashMap<String, ModelRates> {
    let mut rates = HashMap::new();

    for (name, value) in sheet {
        let lower = name.to_ascii_lowercase();
        if !lower.contains("claude") && !lower.contains("anthropic") {
            continue;
        }

        let entry: SheetEntry = match serde_json::from_value(value) {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!(model = %name, error = %e, "Skipping sheet entry");
                continue;
            }
        };

        let (Some(input), Some(output)) = (entry.input_cost_per_token, entry.output_cost_per_token)
        else {
            continue;
        };

        let normalized = normalize_model(&strip_provider(&lower));
        rates.entry(normalized).or_insert(ModelRates {
            input: per_token_to_per_mtok(input),
            output: per_token_to_per_mtok(output),
            cache_creation: per_token_to_per_mtok(entry.cache_creation_input_token_cost.unwrap_or(0.0)),
            cache_read: per_token_to_per_mtok(entry.cache_read_input_token_cost.unwrap_or(0.0)),
        });
    }

    rates
}

/// Strip provider prefixes like `anthropic.` or `bedrock/` from sheet names.
fn strip_provider(name: &str) -> String {
    name.replace("anthropic.", "").replace("bedrock/", "")
}

/// USD per token (e.g. `3e-6`) to micro-USD per million tokens.
///
/// A single rounded conversion per rate, never accumulated, so the result
/// is deterministic for a given sheet.
fn per_token_to_per_mtok(cost: f64) -> u64 {
    (cost * 1e12).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_per_token_conversion() {
        // $3/Mtok expressed as 3e-6 USD per token
        assert_eq!(per_token_to_per_mtok(3e-6), 3_000_000);
        assert_eq!(per_token_to_per_mtok(3.75e-6), 3_750_000);
        assert_eq!(per_token_to_per_mtok(3e-7), 300_000);
        assert_eq!(per_token_to_per_mtok(0.0), 0);
    }

    #[test]
    fn test_convert_sheet_filters_and_normalizes() {
        let mut sheet = HashMap::new();
        sheet.insert(
            "claude-sonnet-4-5-20250929".to_string(),
            json!({
                "input_cost_per_token": 3e-6,
                "output_cost_per_token": 15e-6,
                "cache_creation_input_token_cost": 3.75e-6,
                "cache_read_input_token_cost": 3e-7,
            }),
        );
        sheet.insert(
            "gpt-5".to_string(),
            json!({
                "input_cost_per_token": 1e-6,
                "output_cost_per_token": 2e-6,
            }),
        );
        sheet.insert(
            "claude-no-pricing".to_string(),
            json!({ "max_tokens": 8192 }),
        );

        let rates = convert_sheet(sheet);
        assert_eq!(rates.len(), 1);
        let sonnet = &rates["claude-sonnet-4-5"];
        assert_eq!(sonnet.input, 3_000_000);
        assert_eq!(sonnet.output, 15_000_000);
        assert_eq!(sonnet.cache_creation, 3_750_000);
        assert_eq!(sonnet.cache_read, 300_000);
    }

    #[test]
    fn test_strip_provider_prefixes() {
        assert_eq!(
            strip_provider("anthropic.claude-3-5-sonnet"),
            "claude-3-5-sonnet"
        );
        assert_eq!(
            strip_provider("bedrock/claude-3-haiku"),
            "claude-3-haiku"
        );
    }
}
