use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use lookout_capture::{TesseractExtractor, TextExtractor, XcapFrameSource};
use lookout_config::{Config, ConfigError};
use lookout_core::response::InputDriver;
use lookout_core::session::{Session, SessionMachine};
use lookout_research::{EnvSecretStore, ResearchClient, services_from_config};

use crate::input::{DryRunDriver, RdevInputDriver};

pub struct AppState {
    pub config: Arc<Config>,
    pub machine: Arc<SessionMachine>,
}

impl AppState {
    /// Wire the session from a validated config. The session itself is
    /// handed back separately because its runner consumes it.
    pub fn build(config: Config, dry_run: bool) -> anyhow::Result<(Self, Session)> {
        let services = services_from_config(&config.research, &EnvSecretStore)
            .map_err(|e| ConfigError::Credential(e.to_string()))
            .context("Failed to resolve research credential")?;
        let research = ResearchClient::from_config(&config.research, services)
            .context("No research provider configured")?;

        let frames = Arc::new(XcapFrameSource::new(config.capture.region));
        let extractor = text_extractor(&config);

        let driver: Box<dyn InputDriver> = if dry_run {
            tracing::warn!("dry run: input actions are logged, not sent");
            Box::new(DryRunDriver)
        } else {
            Box::new(RdevInputDriver::default())
        };

        let session = Session::from_config(&config, frames, extractor, research, driver)
            .context("Failed to initialize session")?;

        let state = Self {
            machine: session.machine(),
            config: Arc::new(config),
        };

        Ok((state, session))
    }
}

/// The OCR backend, if the binary is reachable. Without it text detectors
/// are skipped and the engine decides whether enough remain.
fn text_extractor(config: &Config) -> Option<Arc<dyn TextExtractor>> {
    let ocr = &config.detection.ocr;
    let extractor = TesseractExtractor::new(ocr.binary.clone(), ocr.language.clone())
        .with_timeout(Duration::from_millis(config.detection.timeout_ms));
    match extractor.check_available() {
        Ok(()) => {
            tracing::info!(binary = %ocr.binary, language = %ocr.language, "OCR backend found");
            Some(Arc::new(extractor))
        }
        Err(e) => {
            tracing::warn!(binary = %ocr.binary, "OCR backend unavailable: {}", e);
            None
        }
    }
}
