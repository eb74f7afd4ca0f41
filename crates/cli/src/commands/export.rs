use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::ValueEnum;
use magalia_core::domain::quote::QuoteId;
use magalia_core::domain::view::QuoteView;
use magalia_core::pricing::{DeterministicPricingEngine, PricingEngine};
use magalia_db::repositories::{
    QuoteRepository, ServiceCatalog, SqlQuoteRepository, SqlServiceCatalog,
};
use magalia_export::{ExcelExporter, ExportSettings, HttpImageFetcher, WordExporter};

use crate::commands::{connect, into_result, prepare, CommandResult, StepFailure};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Word,
    Excel,
}

impl ExportFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Word => "docx",
            Self::Excel => "xlsx",
        }
    }
}

pub fn run(quote_id: i64, format: ExportFormat, out: Option<PathBuf>) -> CommandResult {
    let (config, runtime) = match prepare("export") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };
    let destination =
        out.unwrap_or_else(|| PathBuf::from(format!("quote_{quote_id}.{}", format.extension())));

    let result = runtime.block_on(async {
        let pool = connect(&config).await?;
        let quotes = SqlQuoteRepository::new(pool.clone());
        let mut quote = quotes
            .find_by_id(QuoteId(quote_id))
            .await
            .map_err(|error| ("repository", error.to_string(), 5u8))?
            .ok_or_else(|| ("not_found", format!("quote {quote_id} was not found"), 6u8))?;
        quote.totals = DeterministicPricingEngine.reprice(&quote).totals();

        let mut view = QuoteView::from(&quote);
        let catalog = SqlServiceCatalog::new(pool.clone());
        let images_attached = attach_service_images(&catalog, &mut view).await;
        pool.close().await;

        let bytes = match format {
            ExportFormat::Word => {
                let settings = ExportSettings::from(&config.export);
                let fetcher = HttpImageFetcher::new(&settings)
                    .map_err(|error| ("image_client", error.to_string(), 7u8))?;
                WordExporter::new(settings).render(&view, &fetcher).await
            }
            ExportFormat::Excel => ExcelExporter::new().render(&view),
        }
        .map_err(|error| ("rendering", error.to_string(), 8u8))?;

        tokio::fs::write(&destination, &bytes)
            .await
            .map_err(|error| ("io", format!("{}: {error}", destination.display()), 9u8))?;

        let mut message = format!(
            "wrote {} ({} bytes) to {}",
            format.extension(),
            bytes.len(),
            destination.display()
        );
        if !images_attached {
            message.push_str("; service images unavailable");
        }
        Ok::<_, StepFailure>(message)
    });

    into_result("export", result)
}

/// Fills `first_image_url` on every catalogued line. Returns false when the
/// catalog could not be read; the export then proceeds without images.
async fn attach_service_images(catalog: &dyn ServiceCatalog, view: &mut QuoteView) -> bool {
    let service_ids: Vec<i64> = view
        .days
        .iter()
        .flat_map(|day| day.lines.iter())
        .filter_map(|line| line.service_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if service_ids.is_empty() {
        return true;
    }

    match catalog.first_image_urls(&service_ids).await {
        Ok(images) => {
            for line in view.lines_mut() {
                line.first_image_url =
                    line.service_id.and_then(|service_id| images.get(&service_id).cloned());
            }
            true
        }
        Err(_) => false,
    }
}
