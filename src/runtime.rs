//! Process-wide runtime context.
//!
//! Instantiated once at startup and threaded through every component:
//! the chat gateway (with its LLM semaphore), the OCR service (with its
//! worker semaphore and content cache), and the job store with its
//! executor. There is no other process-wide mutable state.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Settings;
use crate::jobs::{JobError, JobExecutor, JobStore};
use crate::llm::{ChatClient, GroqClient, LlmGateway};
use crate::ocr::{
    AzureReadClient, DocumentOcrService, LocalOcrEngine, PdfPageRenderer, PdfiumRenderer,
    RemoteOcrEngine, UnavailableRenderer,
};

pub struct Runtime {
    pub settings: Settings,
    pub gateway: Arc<LlmGateway>,
    pub ocr: Arc<DocumentOcrService>,
    pub store: Arc<JobStore>,
    pub executor: JobExecutor,
}

impl Runtime {
    /// Build the production runtime from settings.
    pub fn new(settings: Settings) -> Result<Arc<Self>, JobError> {
        let chat: Arc<dyn ChatClient> = Arc::new(GroqClient::new(settings.groq_api_key.clone()));
        let gateway = Arc::new(LlmGateway::new(chat, settings.max_concurrent_llm));

        let local = local_ocr_engine();
        if local.is_none() {
            warn!("No local OCR engine available; relying on remote OCR");
        }

        let remote: Option<Arc<dyn RemoteOcrEngine>> = if settings.azure_ocr_configured() {
            let endpoint = settings.azure_doc_endpoint.as_deref().unwrap_or_default();
            let key = settings.azure_doc_key.as_deref().unwrap_or_default();
            Some(Arc::new(AzureReadClient::new(endpoint, key)))
        } else {
            None
        };

        let renderer: Arc<dyn PdfPageRenderer> = match PdfiumRenderer::new() {
            Ok(renderer) => Arc::new(renderer),
            Err(e) => {
                warn!(error = %e, "PDFium unavailable; PDF documents will be rejected");
                Arc::new(UnavailableRenderer::new(e.to_string()))
            }
        };

        let ocr = Arc::new(DocumentOcrService::new(
            local,
            remote,
            renderer,
            settings.ocr_cache_max_size,
            settings.max_ocr_workers,
            settings.ocr_engine,
            settings.ocr_min_confidence,
            settings.ocr_max_dpi,
        ));

        let store = Arc::new(JobStore::open(&settings.database_path)?);
        let executor = JobExecutor::new(store.clone());

        info!(
            llm_permits = settings.max_concurrent_llm,
            ocr_workers = settings.max_ocr_workers,
            engine = settings.ocr_engine.as_str(),
            "Runtime initialized"
        );

        Ok(Arc::new(Self {
            settings,
            gateway,
            ocr,
            store,
            executor,
        }))
    }

    /// Runtime over injected parts (tests).
    pub fn with_parts(
        settings: Settings,
        gateway: Arc<LlmGateway>,
        ocr: Arc<DocumentOcrService>,
        store: Arc<JobStore>,
    ) -> Arc<Self> {
        let executor = JobExecutor::new(store.clone());
        Arc::new(Self {
            settings,
            gateway,
            ocr,
            store,
            executor,
        })
    }

    /// Remote OCR client for the diagnostics surface, when configured.
    pub fn azure_probe_client(&self) -> Option<AzureReadClient> {
        if !self.settings.azure_ocr_configured() {
            return None;
        }
        Some(AzureReadClient::new(
            self.settings.azure_doc_endpoint.as_deref().unwrap_or_default(),
            self.settings.azure_doc_key.as_deref().unwrap_or_default(),
        ))
    }
}

#[cfg(feature = "ocr-paddle")]
fn local_ocr_engine() -> Option<Arc<dyn LocalOcrEngine>> {
    let engine = crate::ocr::paddle::PaddleEngine::new();
    if engine.is_available() {
        Some(Arc::new(engine))
    } else {
        warn!("PaddleOCR models not found; local OCR disabled");
        None
    }
}

#[cfg(not(feature = "ocr-paddle"))]
fn local_ocr_engine() -> Option<Arc<dyn LocalOcrEngine>> {
    None
}
