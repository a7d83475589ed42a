/// 外部埋め込みプロバイダのHTTPクライアント。
///
/// タイムアウト、サービストークン認証、限定的な再試行をサポートします。
/// プロバイダの失敗はすべて[`EmbeddingError`]に正規化されます。
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::engine::embedding::Embedder;
use crate::util::retry::{RetryConfig, is_retryable_error};

/// プロバイダ呼び出しの失敗。ネットワーク・クォータ・不正応答はすべて
/// この型に写像され、呼び出し側では常にフォールバックに変換される。
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("embedding provider returned status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("embedding provider returned malformed payload: {0}")]
    Malformed(String),
}

impl EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::Transport(error) => is_retryable_error(error),
            EmbeddingError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            EmbeddingError::Malformed(_) => false,
        }
    }
}

/// 埋め込みプロバイダクライアントの設定。
#[derive(Debug, Clone)]
pub struct EmbeddingProviderConfig {
    pub base_url: String,
    pub model: String,
    pub connect_timeout: Duration,
    pub total_timeout: Duration,
    pub service_token: Option<String>,
    pub retry: RetryConfig,
}

/// 埋め込みリクエスト。
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

/// 埋め込みレスポンス。
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// 埋め込みプロバイダとの通信を管理するクライアント。
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: Client,
    embed_url: Url,
    model: String,
    service_token: Option<String>,
    retry: RetryConfig,
}

impl EmbeddingClient {
    /// 新しい埋め込みクライアントを作成する。
    ///
    /// # Errors
    /// URLのパースまたはHTTPクライアントの構築に失敗した場合はエラーを返します。
    pub fn new(config: EmbeddingProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .build()
            .context("failed to build embedding provider HTTP client")?;

        let base_url =
            Url::parse(&config.base_url).context("invalid embedding provider base URL")?;
        let embed_url = base_url
            .join("api/v1/embeddings")
            .context("failed to build embeddings URL")?;

        Ok(Self {
            client,
            embed_url,
            model: config.model,
            service_token: config.service_token,
            retry: config.retry,
        })
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut request = self.client.post(self.embed_url.clone()).json(&EmbedRequest {
            model: &self.model,
            input: text,
        });

        if let Some(ref token) = self.service_token {
            request = request.header("X-Service-Token", token);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Status { status, body });
        }

        let payload: EmbedResponse = response
            .json()
            .await
            .map_err(|error| EmbeddingError::Malformed(error.to_string()))?;

        if payload.embedding.is_empty() {
            return Err(EmbeddingError::Malformed(
                "empty embedding vector".to_string(),
            ));
        }

        Ok(payload.embedding)
    }

    /// テキストの埋め込みベクトルを取得する。
    ///
    /// 再試行可能な失敗（ネットワーク、5xx、429）に限り、設定された
    /// 試行回数までジッター付きで再試行する。
    ///
    /// # Errors
    /// すべての試行が失敗した場合は最後の[`EmbeddingError`]を返します。
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut attempt = 0;
        loop {
            match self.embed_once(text).await {
                Ok(vector) => return Ok(vector),
                Err(error) => {
                    attempt += 1;
                    if !error.is_retryable() || !self.retry.can_retry(attempt) {
                        return Err(error);
                    }
                    let delay = self.retry.delay_for_attempt(attempt);
                    debug!(attempt, delay = ?delay, %error, "retrying embedding request");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_text(text).await
    }
}
