//! Messaging-platform integration.
//!
//! Everything the engines need from the platform goes through
//! [`JoinLinkProvider`], so issuance, delivery recovery and membership
//! recovery stay testable without a live bot. [`BotClient`] is the real
//! implementation against a Telegram-style Bot API.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, Result};

/// A single-use join link as minted by the platform. `token` is the opaque
/// trailing segment of the URL and is what the ledger keys on.
#[derive(Debug, Clone)]
pub struct MintedLink {
    pub link: String,
    pub token: String,
}

impl MintedLink {
    /// Build from a full join URL; the token is the last path segment.
    pub fn from_link(link: String) -> Self {
        let token = link
            .rsplit('/')
            .next()
            .unwrap_or(link.as_str())
            .to_string();
        Self { link, token }
    }
}

/// The seam between the engines and the messaging platform.
#[allow(async_fn_in_trait)]
pub trait JoinLinkProvider {
    /// Mint one join-request link for a channel.
    async fn create_join_link(&self, channel_external_id: &str) -> Result<MintedLink>;

    /// Invalidate a link on the platform side (after first use).
    async fn revoke_join_link(&self, channel_external_id: &str, link: &str) -> Result<()>;

    async fn approve_join(&self, channel_external_id: &str, user_id: &str) -> Result<()>;

    async fn decline_join(&self, channel_external_id: &str, user_id: &str) -> Result<()>;

    /// Direct-message a platform user (linking codes). Best-effort callers
    /// are expected to tolerate failure.
    async fn send_message(&self, user_id: &str, text: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InviteLinkResult {
    invite_link: String,
}

#[derive(Debug, Clone)]
pub struct BotClient {
    client: Client,
    base_url: String,
    token: String,
}

impl BotClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let parsed: ApiResponse<T> = response.json().await.map_err(|e| {
            AppError::Internal(format!("bot API returned unparseable body ({}): {}", status, e))
        })?;

        if !parsed.ok {
            return Err(AppError::Internal(format!(
                "bot API {} failed: {}",
                method,
                parsed.description.unwrap_or_else(|| status.to_string())
            )));
        }
        parsed
            .result
            .ok_or_else(|| AppError::Internal(format!("bot API {} returned no result", method)))
    }

    async fn call_ok(&self, method: &str, body: serde_json::Value) -> Result<()> {
        let _: bool = self.call(method, body).await?;
        Ok(())
    }
}

impl JoinLinkProvider for BotClient {
    async fn create_join_link(&self, channel_external_id: &str) -> Result<MintedLink> {
        // creates_join_request makes the link admission-gated: following it
        // raises a join request we approve only after the ledger consumes
        // the token.
        let result: InviteLinkResult = self
            .call(
                "createChatInviteLink",
                json!({
                    "chat_id": channel_external_id,
                    "creates_join_request": true,
                }),
            )
            .await?;
        Ok(MintedLink::from_link(result.invite_link))
    }

    async fn revoke_join_link(&self, channel_external_id: &str, link: &str) -> Result<()> {
        self.call_ok(
            "revokeChatInviteLink",
            json!({
                "chat_id": channel_external_id,
                "invite_link": link,
            }),
        )
        .await
    }

    async fn approve_join(&self, channel_external_id: &str, user_id: &str) -> Result<()> {
        self.call_ok(
            "approveChatJoinRequest",
            json!({
                "chat_id": channel_external_id,
                "user_id": user_id,
            }),
        )
        .await
    }

    async fn decline_join(&self, channel_external_id: &str, user_id: &str) -> Result<()> {
        self.call_ok(
            "declineChatJoinRequest",
            json!({
                "chat_id": channel_external_id,
                "user_id": user_id,
            }),
        )
        .await
    }

    async fn send_message(&self, user_id: &str, text: &str) -> Result<()> {
        self.call_ok(
            "sendMessage",
            json!({
                "chat_id": user_id,
                "text": text,
            }),
        )
        .await
    }
}
