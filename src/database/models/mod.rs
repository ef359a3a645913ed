pub mod grant;
pub mod record;

pub use grant::{AccessGrant, GrantChange, GrantEdit, GrantTopUp, Reservation};
pub use record::{BenefitDetails, BenefitRecord, NaturalKey, Provenance, RecordPayload, RECORD_COLUMNS};
