//! Expiration policy: decides whether a quote's deadline has passed.
//!
//! Policies are pure functions: given a quote snapshot and today's date they
//! return a verdict without touching the store. Acting on the verdict is the
//! sweeper's and the transition executor's job.

use chrono::NaiveDate;

use super::errors::{DeadlineField, EvaluationError};
use super::quote::Quote;

/// Default format of the deadline fields sent by the quote store.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// The deadline a policy settled on for a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub field: DeadlineField,
    pub date: NaiveDate,
}

/// Trait for deciding whether a quote has expired.
pub trait ExpirationPolicy: Send + Sync {
    /// The deadline that applies to `quote`, if any. Ignores the quote's state.
    fn deadline(&self, quote: &Quote) -> Result<Option<Deadline>, EvaluationError>;

    /// Whether the applicable deadline lies strictly before `today`, regardless of state.
    fn has_lapsed(&self, quote: &Quote, today: NaiveDate) -> Result<bool, EvaluationError> {
        Ok(self
            .deadline(quote)?
            .is_some_and(|deadline| deadline.date < today))
    }

    /// Whether the sweep should cancel `quote`.
    ///
    /// Cancelled quotes are never candidates; their deadline fields are not
    /// even parsed.
    fn is_expired(&self, quote: &Quote, today: NaiveDate) -> Result<bool, EvaluationError> {
        if quote.state.is_cancelled() {
            return Ok(false);
        }
        self.has_lapsed(quote, today)
    }
}

/// Deadline-based policy provided by lapse-core.
///
/// - `expectedQuoteCompletionDate` wins whenever it is present and non-blank,
///   even if it lies in the future.
/// - `requestedQuoteCompletionDate` is only consulted when the primary is absent.
/// - No deadline at all means the quote never expires.
#[derive(Debug, Clone)]
pub struct DeadlinePolicy {
    date_format: String,
}

impl DeadlinePolicy {
    pub fn new(date_format: impl Into<String>) -> Self {
        Self {
            date_format: date_format.into(),
        }
    }

    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    fn parse(
        &self,
        quote: &Quote,
        field: DeadlineField,
        raw: &str,
    ) -> Result<Deadline, EvaluationError> {
        NaiveDate::parse_from_str(raw.trim(), &self.date_format)
            .map(|date| Deadline { field, date })
            .map_err(|source| EvaluationError {
                quote_id: quote.id.clone(),
                field,
                raw: raw.to_string(),
                source,
            })
    }
}

impl Default for DeadlinePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_DATE_FORMAT)
    }
}

/// Present and not just whitespace.
fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|raw| !raw.trim().is_empty())
}

impl ExpirationPolicy for DeadlinePolicy {
    fn deadline(&self, quote: &Quote) -> Result<Option<Deadline>, EvaluationError> {
        if let Some(raw) = non_blank(&quote.expected_completion_date) {
            return self
                .parse(quote, DeadlineField::ExpectedCompletion, raw)
                .map(Some);
        }
        if let Some(raw) = non_blank(&quote.requested_completion_date) {
            return self
                .parse(quote, DeadlineField::RequestedCompletion, raw)
                .map(Some);
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QuoteState;
    use rstest::rstest;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn open(expected: Option<&str>, requested: Option<&str>) -> Quote {
        Quote {
            id: "Q".into(),
            state: QuoteState::InProgress,
            expected_completion_date: expected.map(str::to_string),
            requested_completion_date: requested.map(str::to_string),
            notes: Vec::new(),
        }
    }

    #[rstest]
    #[case::expected_past(Some("2023-12-31"), None, true)]
    #[case::expected_today(Some("2024-01-01"), None, false)]
    #[case::expected_future(Some("2024-01-02"), None, false)]
    #[case::expected_future_ignores_past_requested(Some("2024-01-02"), Some("2023-12-31"), false)]
    #[case::expected_past_ignores_future_requested(Some("2023-12-31"), Some("2999-01-01"), true)]
    #[case::requested_only_past(None, Some("2023-12-31"), true)]
    #[case::requested_only_future(None, Some("2024-06-01"), false)]
    #[case::empty_expected_falls_back(Some(""), Some("2023-12-31"), true)]
    #[case::blank_expected_falls_back(Some("   "), Some("2023-12-31"), true)]
    #[case::no_deadlines(None, None, false)]
    #[case::both_empty(Some(""), Some(""), false)]
    fn open_quote_verdicts(
        #[case] expected: Option<&str>,
        #[case] requested: Option<&str>,
        #[case] verdict: bool,
    ) {
        let policy = DeadlinePolicy::default();
        let quote = open(expected, requested);
        assert_eq!(policy.is_expired(&quote, today()).unwrap(), verdict);
    }

    #[rstest]
    #[case::cancelled("cancelled")]
    #[case::upper("CANCELLED")]
    #[case::mixed("Cancelled")]
    fn cancelled_quotes_never_expire(#[case] state: &str) {
        let policy = DeadlinePolicy::default();
        let mut quote = open(Some("2000-01-01"), Some("2000-01-01"));
        quote.state = QuoteState::parse(state);
        assert!(!policy.is_expired(&quote, today()).unwrap());
    }

    #[test]
    fn cancelled_quote_with_garbage_deadline_is_not_evaluated() {
        let policy = DeadlinePolicy::default();
        let mut quote = open(Some("not a date"), None);
        quote.state = QuoteState::Cancelled;
        assert_eq!(policy.is_expired(&quote, today()), Ok(false));
    }

    #[test]
    fn malformed_primary_is_reported_with_raw_value() {
        let policy = DeadlinePolicy::default();
        let quote = open(Some("01/02/2020"), Some("2023-12-31"));
        let err = policy.is_expired(&quote, today()).unwrap_err();
        assert_eq!(err.field, DeadlineField::ExpectedCompletion);
        assert_eq!(err.raw, "01/02/2020");
        assert_eq!(err.quote_id.as_str(), "Q");
    }

    #[test]
    fn malformed_fallback_is_irrelevant_when_primary_present() {
        let policy = DeadlinePolicy::default();
        let quote = open(Some("2023-12-31"), Some("garbage"));
        assert_eq!(policy.is_expired(&quote, today()), Ok(true));
    }

    #[test]
    fn malformed_fallback_is_reported_when_consulted() {
        let policy = DeadlinePolicy::default();
        let quote = open(None, Some("garbage"));
        let err = policy.is_expired(&quote, today()).unwrap_err();
        assert_eq!(err.field, DeadlineField::RequestedCompletion);
    }

    #[test]
    fn custom_date_format() {
        let policy = DeadlinePolicy::new("%d.%m.%Y");
        let quote = open(Some("31.12.2023"), None);
        assert_eq!(policy.is_expired(&quote, today()), Ok(true));
    }

    #[test]
    fn has_lapsed_ignores_state() {
        let policy = DeadlinePolicy::default();
        let mut quote = open(Some("2023-12-31"), None);
        quote.state = QuoteState::Cancelled;
        assert_eq!(policy.has_lapsed(&quote, today()), Ok(true));
        assert_eq!(policy.is_expired(&quote, today()), Ok(false));
    }
}
