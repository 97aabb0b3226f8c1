use std::time::Duration;

use anyhow::{Context, bail};

use murmur_api::ApiConfig;
use murmur_gateway::{GatewayConfig, ReconnectPolicy};
use murmur_sync::SyncConfig;
use murmur_types::UserId;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub gateway_url: String,
    pub user_id: UserId,
    pub username: String,
    pub token: Option<String>,
    pub reconnect: ReconnectPolicy,
    pub toast_duration: Duration,
}

impl ClientConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let api_url = var("MURMUR_API_URL").unwrap_or_else(|| "http://localhost:8080".into());
        let gateway_url = var("MURMUR_GATEWAY_URL").unwrap_or_else(|| "ws://localhost:8080/ws".into());
        let user_id: i64 = var("MURMUR_USER_ID")
            .context("MURMUR_USER_ID must be set")?
            .parse()
            .context("MURMUR_USER_ID must be a number")?;
        if user_id <= 0 {
            bail!("MURMUR_USER_ID must be positive, got {}", user_id);
        }
        let username = var("MURMUR_USERNAME").unwrap_or_default();
        let token = var("MURMUR_TOKEN").filter(|t| !t.is_empty());

        let max_attempts: u32 = var("MURMUR_RECONNECT_MAX_ATTEMPTS")
            .unwrap_or_else(|| "8".into())
            .parse()
            .context("MURMUR_RECONNECT_MAX_ATTEMPTS must be a number")?;
        let reconnect = match var("MURMUR_RECONNECT").as_deref().unwrap_or("off") {
            "off" => ReconnectPolicy::Never,
            "backoff" => ReconnectPolicy::backoff(max_attempts),
            other => bail!("MURMUR_RECONNECT must be `off` or `backoff`, got `{}`", other),
        };

        let toast_secs: u64 = var("MURMUR_TOAST_SECS")
            .unwrap_or_else(|| "4".into())
            .parse()
            .context("MURMUR_TOAST_SECS must be a number")?;

        Ok(Self {
            api_url,
            gateway_url,
            user_id: UserId(user_id),
            username,
            token,
            reconnect,
            toast_duration: Duration::from_secs(toast_secs),
        })
    }

    pub fn api(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.api_url.clone(),
            token: self.token.clone(),
            ..Default::default()
        }
    }

    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            url: self.gateway_url.clone(),
            reconnect: self.reconnect.clone(),
            ..Default::default()
        }
    }

    pub fn sync(&self) -> SyncConfig {
        SyncConfig {
            toast_duration: self.toast_duration,
            ..Default::default()
        }
    }
}
