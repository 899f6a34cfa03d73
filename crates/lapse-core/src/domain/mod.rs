//! Domain model (ids, quote snapshot, state, expiration policy, report, errors).
//!
//! ドメイン層は I/O を持ちません。store への読み書きは ports 経由で app 層が行います。

pub mod errors;
pub mod expiration;
pub mod ids;
pub mod quote;
pub mod report;
pub mod state;

pub use errors::{
    DeadlineField, EvaluationError, StoreError, SweepError, TransitionError, TransitionStep,
};
pub use expiration::{DEFAULT_DATE_FORMAT, Deadline, DeadlinePolicy, ExpirationPolicy};
pub use ids::{Id, IdMarker, QuoteId, SweepId};
pub use quote::{Note, Quote};
pub use report::{FailedTransition, ItemOutcome, SweepReport, UnevaluableQuote};
pub use state::QuoteState;
