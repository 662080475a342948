//! Launch flow state machine
//!
//! ```text
//! Form → UploadImage → UploadMetadata → Review → Minting → Success
//!   ↑________|_______________|______________|        |
//!            Back (one step)                 ←────────┘ failure
//! ```
//!
//! [`transition`] is pure: it validates an event against the current step
//! and returns the next [`FlowState`], threading the accumulated payload
//! forward. [`LaunchSession`] owns the collaborators and drives the
//! asynchronous work behind each step: uploads, then guard, builder,
//! signing coordinator and confirmation poller on entering Minting.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn, Instrument};

use crate::{
    confirmation::{ConfirmationPoller, ConfirmationResult, ConfirmationStatus},
    ledger::LedgerClient,
    metrics::metrics,
    observability::TraceContext,
    security::validator::validate_mint_request,
    signing::{CancelSignal, EphemeralMint, FirstBuyOutcome, LaunchSubmission, SigningCoordinator},
    structured_logging::LaunchLogger,
    submission_guard::{launch_key, SubmissionGuard},
    tx_builder::{FeeBreakdown, LaunchBuilder, LaunchError, MintConfig},
    types::{LaunchMode, MintRequest, TokenDraft},
    upload::{build_metadata_json, FreshnessProof, UploadPayload, UploadPipeline},
    wallet::ExternalWallet,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlowStep {
    Form,
    UploadImage,
    UploadMetadata,
    Review,
    Minting,
    Success,
}

impl FlowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Form => "form",
            Self::UploadImage => "upload_image",
            Self::UploadMetadata => "upload_metadata",
            Self::Review => "review",
            Self::Minting => "minting",
            Self::Success => "success",
        }
    }

    /// Step reached by Back, if any
    pub fn previous(&self) -> Option<Self> {
        match self {
            Self::Form | Self::Minting | Self::Success => None,
            Self::UploadImage => Some(Self::Form),
            Self::UploadMetadata => Some(Self::UploadImage),
            Self::Review => Some(Self::UploadMetadata),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for FlowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Block explorer used for receipt links
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    pub base_url: String,
    /// Appended as `?cluster=` when set
    pub cluster: Option<String>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://explorer.solana.com".to_string(),
            cluster: None,
        }
    }
}

impl ExplorerConfig {
    fn link(&self, kind: &str, id: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        match &self.cluster {
            Some(cluster) => format!("{base}/{kind}/{id}?cluster={cluster}"),
            None => format!("{base}/{kind}/{id}"),
        }
    }

    pub fn transaction_url(&self, signature: &str) -> String {
        self.link("tx", signature)
    }

    pub fn address_url(&self, address: &str) -> String {
        self.link("address", address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerLinks {
    pub transaction: String,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
}

/// Final record of a launch shown on the Success step
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchReceipt {
    pub mint: String,
    pub primary_signature: String,
    pub pool_address: Option<String>,
    pub first_buy: FirstBuyOutcome,
    pub fees: FeeBreakdown,
    /// Latest confirmation check; absent when the check itself failed
    pub confirmation: Option<ConfirmationResult>,
    pub links: ExplorerLinks,
}

impl LaunchReceipt {
    pub fn from_submission(
        submission: &LaunchSubmission,
        confirmation: Option<ConfirmationResult>,
        explorer: &ExplorerConfig,
    ) -> Self {
        let mint = submission.mint.to_string();
        let signature = submission.primary_signature.to_string();
        let pool_address = submission.pool_address.map(|pool| pool.to_string());
        Self {
            links: ExplorerLinks {
                transaction: explorer.transaction_url(&signature),
                token: explorer.address_url(&mint),
                pool: pool_address.as_deref().map(|pool| explorer.address_url(pool)),
            },
            mint,
            primary_signature: signature,
            pool_address,
            first_buy: submission.first_buy.clone(),
            fees: submission.fees,
            confirmation,
        }
    }

    pub fn is_partial_success(&self) -> bool {
        matches!(self.first_buy, FirstBuyOutcome::Skipped { .. })
    }
}

/// Fields collected across the flow
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowPayload {
    pub draft: Option<TokenDraft>,
    pub config: MintConfig,
    pub launch_mode: LaunchMode,
    pub referrer: Option<Pubkey>,
    pub first_buy_lamports: Option<u64>,
    pub image_uri: Option<String>,
    pub metadata_uri: Option<String>,
    pub receipt: Option<LaunchReceipt>,
    /// User-facing message of the most recent failed mint attempt
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowState {
    pub step: FlowStep,
    pub payload: FlowPayload,
}

impl Default for FlowState {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowState {
    pub fn new() -> Self {
        Self {
            step: FlowStep::Form,
            payload: FlowPayload::default(),
        }
    }

    /// Launch request assembled from the collected fields
    pub fn mint_request(&self) -> Result<MintRequest, FlowError> {
        let draft = self.payload.draft.as_ref().ok_or(FlowError::MissingDraft)?;
        let mut request = MintRequest::from_draft(draft, self.payload.config, self.payload.launch_mode);
        request.image_uri = self.payload.image_uri.clone();
        request.metadata_uri = self.payload.metadata_uri.clone();
        request.referrer = self.payload.referrer;
        request.first_buy_lamports = match self.payload.launch_mode {
            LaunchMode::BondingCurve => self.payload.first_buy_lamports,
            LaunchMode::Direct => None,
        };
        Ok(request)
    }
}

/// Form contents submitted on the first step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSubmission {
    pub draft: TokenDraft,
    pub config: MintConfig,
    pub launch_mode: LaunchMode,
    pub referrer: Option<Pubkey>,
    pub first_buy_lamports: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    SubmitForm(FormSubmission),
    /// `None` when the image step was skipped
    ImageUploaded(Option<String>),
    MetadataUploaded(Option<String>),
    ConfirmReview,
    MintSucceeded(Box<LaunchReceipt>),
    MintFailed(String),
    Back,
}

impl FlowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SubmitForm(_) => "submit_form",
            Self::ImageUploaded(_) => "image_uploaded",
            Self::MetadataUploaded(_) => "metadata_uploaded",
            Self::ConfirmReview => "confirm_review",
            Self::MintSucceeded(_) => "mint_succeeded",
            Self::MintFailed(_) => "mint_failed",
            Self::Back => "back",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("event {event} is not valid in step {step}")]
    InvalidTransition { step: FlowStep, event: &'static str },

    #[error("cannot go back from {0}")]
    NoPredecessor(FlowStep),

    #[error("the launch has already completed")]
    Terminal,

    #[error("token details have not been submitted")]
    MissingDraft,

    #[error("{0}")]
    Invalid(String),

    #[error("upload failed: {0}")]
    Upload(String),
}

/// Apply `event` to `state`
///
/// Forward transitions only add or overwrite fields; Back moves one step and
/// keeps everything collected so far. A failed mint returns to Review with
/// the uploaded URIs intact.
pub fn transition(state: &FlowState, event: FlowEvent) -> Result<FlowState, FlowError> {
    use FlowStep::*;

    if state.step.is_terminal() {
        return Err(FlowError::Terminal);
    }

    let mut payload = state.payload.clone();
    let step = match (state.step, event) {
        (step, FlowEvent::Back) => step.previous().ok_or(FlowError::NoPredecessor(step))?,

        (Form, FlowEvent::SubmitForm(form)) => {
            let mut request = MintRequest::from_draft(&form.draft, form.config, form.launch_mode);
            request.metadata_uri = payload.metadata_uri.clone();
            validate_mint_request(&request).map_err(|e| FlowError::Invalid(e.to_string()))?;

            payload.draft = Some(form.draft);
            payload.config = form.config;
            payload.launch_mode = form.launch_mode;
            payload.referrer = form.referrer;
            payload.first_buy_lamports = form.first_buy_lamports;
            UploadImage
        }
        (UploadImage, FlowEvent::ImageUploaded(uri)) => {
            if uri.is_some() {
                payload.image_uri = uri;
            }
            UploadMetadata
        }
        (UploadMetadata, FlowEvent::MetadataUploaded(uri)) => {
            if uri.is_some() {
                payload.metadata_uri = uri;
            }
            Review
        }
        (Review, FlowEvent::ConfirmReview) => {
            if payload.draft.is_none() {
                return Err(FlowError::MissingDraft);
            }
            Minting
        }
        (Minting, FlowEvent::MintSucceeded(receipt)) => {
            payload.receipt = Some(*receipt);
            Success
        }
        (Minting, FlowEvent::MintFailed(message)) => {
            payload.last_error = Some(message);
            Review
        }
        (step, event) => {
            return Err(FlowError::InvalidTransition {
                step,
                event: event.name(),
            })
        }
    };

    Ok(FlowState { step, payload })
}

/// Collaborators shared by every session
#[derive(Clone)]
pub struct LaunchServices {
    pub builder: Arc<LaunchBuilder>,
    pub ledger: Arc<dyn LedgerClient>,
    pub guard: SubmissionGuard,
    pub poller: Arc<ConfirmationPoller>,
    pub uploads: Option<Arc<UploadPipeline>>,
    pub explorer: ExplorerConfig,
}

/// One user's walk through the launch flow
pub struct LaunchSession {
    services: LaunchServices,
    wallet: Arc<dyn ExternalWallet>,
    state: FlowState,
    logger: LaunchLogger,
    trace: TraceContext,
}

impl LaunchSession {
    pub fn new(services: LaunchServices, wallet: Arc<dyn ExternalWallet>) -> Self {
        let trace = TraceContext::new("launch_session");
        Self {
            logger: LaunchLogger::new(trace.correlation_id.as_str()),
            services,
            wallet,
            state: FlowState::new(),
            trace,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn step(&self) -> FlowStep {
        self.state.step
    }

    pub fn correlation_id(&self) -> &str {
        self.trace.correlation_id.as_str()
    }

    fn apply(&mut self, event: FlowEvent) -> Result<FlowStep, FlowError> {
        let from = self.state.step;
        let event_name = event.name();
        self.state = transition(&self.state, event)?;
        tracing::debug!(
            context_id = %self.logger.context_id(),
            from = %from,
            to = %self.state.step,
            event = event_name,
            "Flow transition"
        );
        Ok(self.state.step)
    }

    pub fn submit_form(&mut self, form: FormSubmission) -> Result<FlowStep, FlowError> {
        self.apply(FlowEvent::SubmitForm(form))
    }

    pub fn back(&mut self) -> Result<FlowStep, FlowError> {
        self.apply(FlowEvent::Back)
    }

    pub fn skip_image(&mut self) -> Result<FlowStep, FlowError> {
        self.apply(FlowEvent::ImageUploaded(None))
    }

    pub fn skip_metadata(&mut self) -> Result<FlowStep, FlowError> {
        self.apply(FlowEvent::MetadataUploaded(None))
    }

    fn ensure_step(&self, expected: FlowStep, event: &'static str) -> Result<(), FlowError> {
        if self.state.step != expected {
            return Err(FlowError::InvalidTransition {
                step: self.state.step,
                event,
            });
        }
        Ok(())
    }

    /// Freshness proof when the wallet can sign messages
    async fn freshness_proof(&self) -> Option<FreshnessProof> {
        if !self.wallet.capabilities().sign_message {
            return None;
        }
        match FreshnessProof::sign(self.wallet.as_ref(), Utc::now()).await {
            Ok(proof) => Some(proof),
            Err(err) => {
                warn!(context_id = %self.logger.context_id(), error = %err, "Upload proceeds without freshness proof");
                None
            }
        }
    }

    /// Upload the token image and advance; failures keep the step
    pub async fn upload_image(&mut self, payload: UploadPayload) -> Result<FlowStep, FlowError> {
        self.ensure_step(FlowStep::UploadImage, "image_uploaded")?;
        let uri = match self.services.uploads.clone() {
            Some(pipeline) => {
                let proof = self.freshness_proof().await;
                Some(
                    pipeline
                        .upload_image(payload, proof)
                        .await
                        .map_err(|e| FlowError::Upload(e.to_string()))?,
                )
            }
            None => {
                warn!(context_id = %self.logger.context_id(), "No upload service configured, image skipped");
                None
            }
        };
        self.apply(FlowEvent::ImageUploaded(uri))
    }

    /// Build and upload the metadata document and advance
    pub async fn upload_metadata(&mut self) -> Result<FlowStep, FlowError> {
        self.ensure_step(FlowStep::UploadMetadata, "metadata_uploaded")?;
        let draft = self.state.payload.draft.as_ref().ok_or(FlowError::MissingDraft)?;
        let document = build_metadata_json(draft, self.state.payload.image_uri.as_deref(), None);

        let uri = match self.services.uploads.clone() {
            Some(pipeline) => {
                let proof = self.freshness_proof().await;
                Some(
                    pipeline
                        .upload_metadata(document, proof)
                        .await
                        .map_err(|e| FlowError::Upload(e.to_string()))?,
                )
            }
            None => None,
        };
        self.apply(FlowEvent::MetadataUploaded(uri))
    }

    /// Enter Minting and run the launch to Success or back to Review
    ///
    /// The returned error is the classified launch failure; the session is
    /// then on Review with `last_error` set. Flow misuse (wrong step)
    /// surfaces as `LaunchError::Internal` without changing state.
    pub async fn mint(&mut self, cancel: &CancelSignal) -> Result<LaunchReceipt, LaunchError> {
        self.apply(FlowEvent::ConfirmReview)
            .map_err(|e| LaunchError::internal(e.to_string()))?;

        let span = self.trace.child_span("minting").span();
        let result = self.run_minting(cancel).instrument(span).await;

        let event = match &result {
            Ok(receipt) => {
                metrics()
                    .launches_succeeded
                    .with_label_values(&[self.state.payload.launch_mode.as_str()])
                    .inc();
                FlowEvent::MintSucceeded(Box::new(receipt.clone()))
            }
            Err(err) => {
                metrics().launches_failed.with_label_values(&[err.category()]).inc();
                self.logger.log_launch_failed(err);
                FlowEvent::MintFailed(err.user_message())
            }
        };
        self.apply(event)
            .map_err(|e| LaunchError::internal(e.to_string()))?;
        result
    }

    async fn run_minting(&self, cancel: &CancelSignal) -> Result<LaunchReceipt, LaunchError> {
        let request = self
            .state
            .mint_request()
            .map_err(|e| LaunchError::validation(e.to_string()))?;
        let requester = self.wallet.pubkey();

        let key = launch_key(&requester);
        let Some(_ticket) = self.services.guard.try_acquire(key.clone()) else {
            metrics().duplicate_rejections.inc();
            self.logger.log_duplicate_rejected(&key);
            return Err(LaunchError::DuplicateSubmission(key));
        };

        if cancel.is_cancelled() {
            return Err(LaunchError::Cancelled);
        }

        let mint_key = EphemeralMint::generate();
        metrics()
            .launches_started
            .with_label_values(&[request.launch_mode.as_str()])
            .inc();
        self.logger
            .log_launch_started(request.launch_mode, &requester, &mint_key.pubkey());

        let prepared = self
            .services
            .builder
            .prepare(&request, &requester, &mint_key.pubkey())
            .await?;
        self.logger.log_fees(&prepared.fees);

        let coordinator = SigningCoordinator::new(self.services.ledger.clone(), self.wallet.clone());
        let submission = coordinator
            .sign_and_submit(prepared, mint_key, cancel, &self.logger)
            .await?;

        let confirmation = self.check_confirmation(&submission).await?;
        let receipt = LaunchReceipt::from_submission(&submission, confirmation, &self.services.explorer);
        info!(
            context_id = %self.logger.context_id(),
            mint = %receipt.mint,
            signature = %receipt.primary_signature,
            partial = receipt.is_partial_success(),
            "Launch submitted"
        );
        Ok(receipt)
    }

    /// One confirmation check; only a ledger-reported failure is an error
    async fn check_confirmation(
        &self,
        submission: &LaunchSubmission,
    ) -> Result<Option<ConfirmationResult>, LaunchError> {
        match self.services.poller.check(&submission.primary_signature).await {
            Ok(result) if result.status == ConfirmationStatus::Failed => Err(LaunchError::LedgerExecution {
                raw: result
                    .raw_error
                    .map(|raw| raw.to_string())
                    .unwrap_or_else(|| "transaction failed".to_string()),
                signature: Some(result.signature),
            }),
            Ok(result) => {
                self.logger
                    .log_confirmation(&submission.primary_signature, result.status);
                Ok(Some(result))
            }
            Err(err) => {
                warn!(
                    context_id = %self.logger.context_id(),
                    signature = %submission.primary_signature,
                    error = %err,
                    "Confirmation check failed, status unknown"
                );
                Ok(None)
            }
        }
    }

    /// Re-run the confirmation check for a completed launch
    pub async fn refresh_confirmation(&mut self) -> Result<ConfirmationResult, LaunchError> {
        let signature = self
            .state
            .payload
            .receipt
            .as_ref()
            .map(|receipt| receipt.primary_signature.clone())
            .ok_or_else(|| LaunchError::internal("no launch has been submitted"))?;
        let signature = crate::security::validator::validate_signature(&signature)?;

        let result = self.services.poller.check(&signature).await?;
        self.logger.log_confirmation(&signature, result.status);
        if let Some(receipt) = self.state.payload.receipt.as_mut() {
            receipt.confirmation = Some(result.clone());
        }
        Ok(result)
    }
}
