use async_trait::async_trait;
use reqwest::Url;
use serde::de::Deserializer;
use serde::Deserialize;
use serde_json::Value;

use crate::error::FetchError;
use crate::source::ValuationSource;

pub const DEFAULT_HOST: &str = "https://api.dexscreener.com";

/// Token-keyed DexScreener lookup. The first pair in the response is treated
/// as the main market for the token.
#[derive(Clone)]
pub struct DexScreenerSource {
    host: String,
    http: reqwest::Client,
}

impl DexScreenerSource {
    pub fn new(host: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("mcap-growth/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { host, http })
    }

    #[cfg(test)]
    pub(crate) fn with_client(host: String, http: reqwest::Client) -> Self {
        Self { host, http }
    }

    /// The asset id is pushed as one path segment, so `/`, `?` and `#` in it
    /// are percent-encoded instead of reshaping the request.
    fn token_url(&self, asset_id: &str) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.host)
            .map_err(|e| FetchError::Network(format!("invalid api host {:?}: {}", self.host, e)))?;
        url.path_segments_mut()
            .map_err(|_| {
                FetchError::Network(format!("api host {:?} cannot take a path", self.host))
            })?
            .pop_if_empty()
            .extend(["latest", "dex", "tokens", asset_id]);
        Ok(url)
    }
}

#[async_trait]
impl ValuationSource for DexScreenerSource {
    async fn fetch_valuation(&self, asset_id: &str) -> Result<f64, FetchError> {
        let url = self.token_url(asset_id)?;
        tracing::debug!(url = %url, "fetching valuation");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(format!("GET /latest/dex/tokens failed: {}", e)))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Network(format!("read body failed: {}", e)))?;

        if !status.is_success() {
            let snippet: String = body.chars().take(256).collect();
            return Err(FetchError::Network(format!(
                "non-2xx: status={} body_snippet={}",
                status, snippet
            )));
        }

        parse_valuation(&body)
    }
}

/// Pull the valuation out of a `/latest/dex/tokens` body: first pair, `fdv`
/// preferred over `marketCap`. Records after the first are never inspected.
pub fn parse_valuation(body: &str) -> Result<f64, FetchError> {
    let resp: TokensResp = serde_json::from_str(body)
        .map_err(|e| FetchError::Malformed(format!("decode json failed: {}", e)))?;

    let pair = resp
        .pairs
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::Malformed("no pairs for token".to_string()))?;

    tracing::trace!(
        pair_address = pair.get("pairAddress").and_then(serde_json::Value::as_str).unwrap_or(""),
        dex_id = pair.get("dexId").and_then(serde_json::Value::as_str).unwrap_or(""),
        "selected first pair"
    );

    pair.get("fdv")
        .and_then(usable_number)
        .or_else(|| pair.get("marketCap").and_then(usable_number))
        .ok_or_else(|| FetchError::Malformed("pair has neither fdv nor marketCap".to_string()))
}

/// Numbers and numeric strings count; zero, negatives and non-finite values
/// do not.
fn usable_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (n.is_finite() && n > 0.0).then_some(n)
}

fn vec_or_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let opt = Option::<Vec<T>>::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct TokensResp {
    // DexScreener sends `"pairs": null` for unknown tokens. Records stay
    // untyped so a broken later record cannot spoil the first one.
    #[serde(default, deserialize_with = "vec_or_empty")]
    pairs: Vec<Value>,
}
