//! Token whitelist and USD price feed over HTTP.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use feesweep_core::config::PriceApiConfig;
use feesweep_core::{
    Address, PriceCandidate, Result, SweepError, TokenMetadata, TokenSource, WhitelistTokenMap,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;

pub struct PriceApiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

/// The tokens endpoint answers either with a map keyed by address or a flat list.
#[derive(Deserialize)]
#[serde(untagged)]
enum TokensReply {
    Map(HashMap<Address, TokenMetadata>),
    List(Vec<ListedToken>),
}

#[derive(Deserialize)]
struct ListedToken {
    address: Address,
    #[serde(flatten)]
    metadata: TokenMetadata,
}

impl PriceApiClient {
    pub fn new(config: &PriceApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SweepError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the auth header for the request.
    pub(crate) fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            req
        } else {
            req.header("Authorization", format!("Bearer {}", self.api_key))
        }
    }

    /// GET `{base}{path}` and decode the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .apply_auth(self.client.get(&url).query(query))
            .send()
            .await
            .map_err(|e| SweepError::PriceApi(format!("GET {path} failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(SweepError::PriceApi(format!("GET {path} HTTP {status}: {text}")));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| SweepError::PriceApi(format!("GET {path} body: {e}")))?;
        serde_json::from_str(&body)
            .map_err(|e| SweepError::PriceApi(format!("GET {path} parse: {e}")))
    }
}

fn into_whitelist(reply: TokensReply) -> WhitelistTokenMap {
    match reply {
        TokensReply::Map(map) => map,
        TokensReply::List(list) => list.into_iter().map(|t| (t.address, t.metadata)).collect(),
    }
}

#[async_trait]
impl TokenSource for PriceApiClient {
    async fn whitelisted_tokens(&self) -> Result<WhitelistTokenMap> {
        let reply: TokensReply = self.get_json("/v1/tokens", &[]).await?;
        let whitelist = into_whitelist(reply);
        tracing::debug!("🪙 {} whitelisted tokens", whitelist.len());
        Ok(whitelist)
    }

    async fn token_prices(&self) -> Result<Vec<PriceCandidate>> {
        let prices: Vec<PriceCandidate> = self
            .get_json("/v1/prices", &[("currency", "USD".to_string())])
            .await?;
        tracing::debug!("💲 {} priced tokens", prices.len());
        Ok(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HONEY: &str = "0x2577d24a26f8fa19c1058a8b0106e2c7303454a4";

    #[test]
    fn test_tokens_reply_as_map() {
        let json = format!(r#"{{"{HONEY}": {{"symbol": "HONEY", "name": "Honey", "decimals": 18}}}}"#);
        let reply: TokensReply = serde_json::from_str(&json).unwrap();
        let whitelist = into_whitelist(reply);
        let honey: Address = HONEY.parse().unwrap();
        assert_eq!(whitelist[&honey].symbol, "HONEY");
    }

    #[test]
    fn test_tokens_reply_as_list() {
        let json = format!(r#"[{{"address": "{HONEY}", "symbol": "HONEY"}}]"#);
        let reply: TokensReply = serde_json::from_str(&json).unwrap();
        let whitelist = into_whitelist(reply);
        let honey: Address = HONEY.parse().unwrap();
        assert_eq!(whitelist[&honey].decimals, 18);
    }

    #[test]
    fn test_prices_keep_feed_order() {
        let json = r#"[
            {"address": "0x0000000000000000000000000000000000000002", "price": 1.5},
            {"address": "0x0000000000000000000000000000000000000001", "price": 0.25}
        ]"#;
        let prices: Vec<PriceCandidate> = serde_json::from_str(json).unwrap();
        assert_eq!(prices[0].address, Address::with_last_byte(2));
        assert_eq!(prices[1].price.price_usd, 0.25);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = PriceApiConfig {
            base_url: "https://api.example.com/".into(),
            api_key: String::new(),
            timeout_secs: 5,
        };
        let client = PriceApiClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "https://api.example.com");
    }
}
