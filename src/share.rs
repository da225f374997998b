use reqwest::Url;

use crate::render::format_number;

const TWEET_INTENT: &str = "https://twitter.com/intent/tweet";

pub fn chart_url(chain: &str, asset_id: &str) -> String {
    format!("https://dexscreener.com/{}/{}", chain.trim().to_ascii_lowercase(), asset_id.trim())
}

/// First 20 chars of the address followed by `...` when it is longer.
pub fn short_address(asset_id: &str) -> String {
    if asset_id.chars().count() <= 20 {
        return asset_id.to_string();
    }
    let head: String = asset_id.chars().take(20).collect();
    format!("{}...", head)
}

pub fn share_text(asset_id: &str, target: f64, community_url: Option<&str>) -> String {
    let mut text = format!(
        "Posting until our coin hits ${} MC. Join us.\n\nCA: {}",
        format_number(target),
        asset_id
    );
    if let Some(url) = community_url.map(str::trim).filter(|u| !u.is_empty()) {
        text.push_str("\n\n");
        text.push_str(url);
    }
    text
}

pub fn tweet_intent_url(text: &str) -> anyhow::Result<Url> {
    Ok(Url::parse_with_params(TWEET_INTENT, &[("text", text)])?)
}
