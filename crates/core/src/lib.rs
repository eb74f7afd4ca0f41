pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;
pub mod versioning;

pub use domain::category::LineCategory;
pub use domain::input::{DayInput, LineInput, QuoteInput};
pub use domain::payload::{LineDetails, LinePayload};
pub use domain::quote::{
    DayId, LineId, Quote, QuoteDay, QuoteId, QuoteLine, QuoteTotals, Visibility,
};
pub use domain::version::{
    ExportKind, NewQuoteVersion, QuoteVersion, VersionId, VersionListFilter, VersionPage,
    VersionType,
};
pub use domain::view::{DayView, LineView, QuoteSummary, QuoteView};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use pricing::{DeterministicPricingEngine, PricingEngine, PricingResult};
