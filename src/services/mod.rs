pub mod provider;
pub mod quota;
pub mod record_writer;
pub mod retention;

pub use provider::{record_from_provider, BenefitProvider, HttpBenefitProvider, ProviderError};
pub use quota::QuotaLedger;
pub use record_writer::{PreparedWrite, RecordError, RecordWriter};
