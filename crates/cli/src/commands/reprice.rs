use chrono::Utc;
use magalia_core::domain::quote::QuoteId;
use magalia_core::pricing::{DeterministicPricingEngine, PricingEngine};
use magalia_db::repositories::{QuoteRepository, SqlQuoteRepository};

use crate::commands::{connect, prepare, CommandResult, StepFailure};

pub fn run(quote_id: i64, persist: bool) -> CommandResult {
    let (config, runtime) = match prepare("reprice") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect(&config).await?;
        let quotes = SqlQuoteRepository::new(pool.clone());
        let quote = quotes
            .find_by_id(QuoteId(quote_id))
            .await
            .map_err(|error| ("repository", error.to_string(), 5u8))?
            .ok_or_else(|| ("not_found", format!("quote {quote_id} was not found"), 6u8))?;

        let pricing = DeterministicPricingEngine.reprice(&quote);
        if persist {
            quotes
                .save_totals(quote.id, &pricing.totals(), Utc::now())
                .await
                .map_err(|error| ("repository", error.to_string(), 5u8))?;
        }
        pool.close().await;
        Ok::<_, StepFailure>(pricing)
    });

    match result {
        Ok(pricing) => {
            let message = if persist {
                format!("quote {quote_id} repriced and saved: grand_total={}", pricing.grand_total)
            } else {
                format!("quote {quote_id} repriced: grand_total={}", pricing.grand_total)
            };
            CommandResult::success_with_data("reprice", message, &pricing)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("reprice", error_class, message, exit_code)
        }
    }
}
