use std::sync::Arc;

use magalia_core::config::AppConfig;
use magalia_core::pricing::{DeterministicPricingEngine, PricingEngine};
use magalia_export::{ExportSettings, ImageFetcher, WordExporter};

use crate::services::{ExportService, QuoteService, Repositories, VersioningService};

/// Shared handler state. Every service is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub quotes: QuoteService,
    pub versions: VersioningService,
    pub exports: ExportService,
}

impl AppState {
    pub fn new(
        repositories: &Repositories,
        config: &AppConfig,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        let pricing: Arc<dyn PricingEngine> = Arc::new(DeterministicPricingEngine);
        let versions = VersioningService::new(
            repositories,
            pricing.clone(),
            config.versioning.auto_throttle_minutes,
        );
        let word = WordExporter::new(ExportSettings::from(&config.export));

        Self {
            quotes: QuoteService::new(repositories, pricing.clone(), versions.clone()),
            exports: ExportService::new(repositories, pricing, versions.clone(), fetcher, word),
            versions,
        }
    }
}
