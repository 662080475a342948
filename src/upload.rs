//! Image and metadata upload collaborator
//!
//! Uploads produce content-addressed URIs that end up in the on-chain
//! metadata record. The storage backend is external; this module holds the
//! [`UploadService`] seam, a thin HTTP client for it, the metadata JSON
//! document and a wallet-signed freshness proof that backends may require.
//!
//! A missing URI never blocks minting: the flow simply writes an empty URI.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    metrics::metrics,
    task_queue::{Retryable, TaskQueue},
    tx_builder::{uri_len, LaunchError, MAX_URI_LEN},
    types::TokenDraft,
    wallet::ExternalWallet,
};

/// Largest clock skew tolerated on a freshness proof
const MAX_FUTURE_SKEW_SECS: i64 = 30;

#[derive(Error, Debug, Clone)]
pub enum UploadError {
    #[error("upload transport error: {0}")]
    Transport(String),

    #[error("upload service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid upload response: {0}")]
    InvalidResponse(String),

    #[error("payload of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    #[error("freshness proof rejected: {0}")]
    Freshness(String),
}

impl Retryable for UploadError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidResponse(_) | Self::TooLarge { .. } | Self::Freshness(_) => false,
        }
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<UploadError> for LaunchError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::TooLarge { .. } => LaunchError::validation(err.to_string()),
            UploadError::Freshness(reason) => LaunchError::Authentication(reason),
            other => LaunchError::collaborator("upload service", other.to_string()),
        }
    }
}

/// Message a wallet signs to authorize an upload at `issued_at`
pub fn freshness_message(wallet: &Pubkey, issued_at: DateTime<Utc>) -> String {
    format!(
        "Authorize token asset upload\nwallet: {wallet}\nissued: {}",
        issued_at.to_rfc3339()
    )
}

/// Wallet-signed proof that an upload request is recent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshnessProof {
    pub wallet: Pubkey,
    pub issued_at: DateTime<Utc>,
    pub message: String,
    pub signature: Signature,
}

impl FreshnessProof {
    /// Ask `wallet` to sign a freshness message for `now`
    pub async fn sign(wallet: &dyn ExternalWallet, now: DateTime<Utc>) -> Result<Self, LaunchError> {
        if !wallet.capabilities().sign_message {
            return Err(LaunchError::Authentication(
                "wallet cannot sign messages".to_string(),
            ));
        }
        let pubkey = wallet.pubkey();
        let message = freshness_message(&pubkey, now);
        let signature = wallet.sign_message(message.as_bytes()).await?;
        Ok(Self {
            wallet: pubkey,
            issued_at: now,
            message,
            signature,
        })
    }

    /// Check the signature and that the proof is at most `max_age` old
    pub fn verify(&self, now: DateTime<Utc>, max_age: ChronoDuration) -> Result<(), UploadError> {
        if self.message != freshness_message(&self.wallet, self.issued_at) {
            return Err(UploadError::Freshness("message does not match its claims".into()));
        }
        if !self.signature.verify(self.wallet.as_ref(), self.message.as_bytes()) {
            return Err(UploadError::Freshness("bad signature".into()));
        }
        if self.issued_at > now + ChronoDuration::seconds(MAX_FUTURE_SKEW_SECS) {
            return Err(UploadError::Freshness("issued in the future".into()));
        }
        if now - self.issued_at > max_age {
            return Err(UploadError::Freshness("expired".into()));
        }
        Ok(())
    }

    fn headers(&self) -> [(&'static str, String); 3] {
        [
            ("x-wallet", self.wallet.to_string()),
            ("x-signature", self.signature.to_string()),
            ("x-message", BASE64.encode(self.message.as_bytes())),
        ]
    }
}

/// Raw image bytes plus what the backend needs to store them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPayload {
    pub bytes: Bytes,
    pub content_type: String,
    pub file_name: String,
}

impl UploadPayload {
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
            file_name: file_name.into(),
        }
    }

    pub fn digest(&self) -> String {
        content_digest(&self.bytes)
    }
}

/// Off-chain metadata document referenced by the mint's URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadataJson {
    pub name: String,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
}

pub fn build_metadata_json(draft: &TokenDraft, image_uri: Option<&str>, created_on: Option<&str>) -> TokenMetadataJson {
    TokenMetadataJson {
        name: draft.name.trim().to_string(),
        symbol: draft.symbol.trim().to_string(),
        description: draft
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
        image: image_uri.filter(|uri| !uri.is_empty()).map(str::to_string),
        created_on: created_on.map(str::to_string),
    }
}

/// base58 SHA-256 of `bytes`
pub fn content_digest(bytes: &[u8]) -> String {
    bs58::encode(Sha256::digest(bytes)).into_string()
}

#[async_trait]
pub trait UploadService: Send + Sync {
    /// Store an image, returning its URI
    async fn upload_image(
        &self,
        payload: &UploadPayload,
        proof: Option<&FreshnessProof>,
    ) -> Result<String, UploadError>;

    /// Store a metadata document, returning its URI
    async fn upload_metadata(
        &self,
        metadata: &TokenMetadataJson,
        proof: Option<&FreshnessProof>,
    ) -> Result<String, UploadError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    uri: String,
}

fn check_uri(uri: String) -> Result<String, UploadError> {
    if uri.is_empty() {
        return Err(UploadError::InvalidResponse("empty uri".into()));
    }
    let len = uri_len(&uri);
    if len > MAX_URI_LEN {
        return Err(UploadError::InvalidResponse(format!(
            "uri of {len} characters exceeds {MAX_URI_LEN}"
        )));
    }
    Ok(uri)
}

/// [`UploadService`] over a JSON/HTTP storage backend
///
/// `POST {base}/upload/image` takes the raw bytes, `POST {base}/upload/metadata`
/// the JSON document; both answer `{"uri": "..."}`.
#[derive(Debug, Clone)]
pub struct HttpUploadService {
    client: reqwest::Client,
    base_url: String,
    max_image_bytes: usize,
}

impl HttpUploadService {
    pub fn new(base_url: impl Into<String>, timeout: Duration, max_image_bytes: usize) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_image_bytes,
        })
    }

    async fn read_uri(response: reqwest::Response) -> Result<String, UploadError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| UploadError::InvalidResponse(e.to_string()))?;
        check_uri(parsed.uri)
    }

    fn with_proof(request: reqwest::RequestBuilder, proof: Option<&FreshnessProof>) -> reqwest::RequestBuilder {
        match proof {
            Some(proof) => proof
                .headers()
                .into_iter()
                .fold(request, |request, (name, value)| request.header(name, value)),
            None => request,
        }
    }
}

#[async_trait]
impl UploadService for HttpUploadService {
    async fn upload_image(
        &self,
        payload: &UploadPayload,
        proof: Option<&FreshnessProof>,
    ) -> Result<String, UploadError> {
        if payload.bytes.len() > self.max_image_bytes {
            return Err(UploadError::TooLarge {
                size: payload.bytes.len(),
                max: self.max_image_bytes,
            });
        }
        let request = self
            .client
            .post(format!("{}/upload/image", self.base_url))
            .header("content-type", payload.content_type.as_str())
            .header("x-file-name", payload.file_name.as_str())
            .body(payload.bytes.clone());
        let response = Self::with_proof(request, proof).send().await?;
        Self::read_uri(response).await
    }

    async fn upload_metadata(
        &self,
        metadata: &TokenMetadataJson,
        proof: Option<&FreshnessProof>,
    ) -> Result<String, UploadError> {
        let request = self
            .client
            .post(format!("{}/upload/metadata", self.base_url))
            .json(metadata);
        let response = Self::with_proof(request, proof).send().await?;
        Self::read_uri(response).await
    }
}

/// Uploads paced through a [`TaskQueue`] and deduplicated by content digest
pub struct UploadPipeline {
    service: Arc<dyn UploadService>,
    queue: Arc<TaskQueue>,
    cache: DashMap<String, String>,
}

impl UploadPipeline {
    pub fn new(service: Arc<dyn UploadService>, queue: Arc<TaskQueue>) -> Self {
        Self {
            service,
            queue,
            cache: DashMap::new(),
        }
    }

    pub fn cached_uri(&self, digest: &str) -> Option<String> {
        self.cache.get(digest).map(|uri| uri.clone())
    }

    pub async fn upload_image(
        &self,
        payload: UploadPayload,
        proof: Option<FreshnessProof>,
    ) -> Result<String, UploadError> {
        let digest = format!("image:{}", payload.digest());
        if let Some(uri) = self.cached_uri(&digest) {
            debug!(%digest, "Image already uploaded");
            return Ok(uri);
        }

        let service = self.service.clone();
        let result = self
            .queue
            .run("image_upload", || {
                let service = service.clone();
                let payload = payload.clone();
                let proof = proof.clone();
                async move { service.upload_image(&payload, proof.as_ref()).await }
            })
            .await;
        self.record("image", digest, result)
    }

    pub async fn upload_metadata(
        &self,
        metadata: TokenMetadataJson,
        proof: Option<FreshnessProof>,
    ) -> Result<String, UploadError> {
        let encoded = serde_json::to_vec(&metadata).map_err(|e| UploadError::InvalidResponse(e.to_string()))?;
        let digest = format!("metadata:{}", content_digest(&encoded));
        if let Some(uri) = self.cached_uri(&digest) {
            debug!(%digest, "Metadata already uploaded");
            return Ok(uri);
        }

        let service = self.service.clone();
        let result = self
            .queue
            .run("metadata_upload", || {
                let service = service.clone();
                let metadata = metadata.clone();
                let proof = proof.clone();
                async move { service.upload_metadata(&metadata, proof.as_ref()).await }
            })
            .await;
        self.record("metadata", digest, result)
    }

    fn record(&self, kind: &str, digest: String, result: Result<String, UploadError>) -> Result<String, UploadError> {
        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics().uploads.with_label_values(&[kind, outcome]).inc();
        let uri = result?;
        info!(kind, %uri, "Upload stored");
        self.cache.insert(digest, uri.clone());
        Ok(uri)
    }
}
