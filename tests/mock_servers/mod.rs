#![allow(dead_code)]

pub mod spotify;

use std::time::{Duration, SystemTime};

use spotdeck::{config::Config, settings::GlobalSettings, tokens::TokenSet};
use url::Url;

/// Config pointing both the Web API and the accounts service at `base`.
pub fn config(base: &str) -> Config {
    let base = Url::parse(base).unwrap();
    let mut config = Config::new()
        .with_api_url(base.join("v1/").unwrap())
        .with_accounts_url(base);
    config.redirect_port = 0;
    config
}

/// Tokens that expire `ttl` from now.
pub fn tokens(access_token: &str, ttl: Duration) -> TokenSet {
    TokenSet {
        access_token: access_token.to_owned(),
        refresh_token: "refresh-0".to_owned(),
        expires_at: SystemTime::now() + ttl,
    }
}

pub fn global_settings(tokens: Option<TokenSet>) -> GlobalSettings {
    GlobalSettings {
        client_id: Some("client".to_owned()),
        tokens,
        ..GlobalSettings::default()
    }
}
