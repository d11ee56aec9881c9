//! Page arithmetic for filtered news listings.
//!
//! [`PageResult::new`] turns a total count and a requested page into
//! navigation metadata. [`PageResult::set_results`] attaches the rows that
//! were actually returned and, when the last page comes back short,
//! recomputes the totals from what was really there. That reconciles a
//! count query and a result query that observed different snapshots.

use serde::Serialize;
use thiserror::Error;

/// Page size used when none is configured.
pub const DEFAULT_PER_PAGE: i64 = 20;

/// A pagination or filter parameter is out of bounds.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Page must be at least 1, got {0}")]
    InvalidPage(i64),

    #[error("Total results must not be negative, got {0}")]
    NegativeTotal(i64),

    #[error("Items per page must be at least 1, got {0}")]
    InvalidPerPage(i64),

    #[error("Unknown ordering: {0}")]
    UnknownOrdering(String),
}

/// One page of results plus navigation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageResult<T> {
    pub total_results: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub per_page: i64,
    pub has_next: bool,
    pub has_prev: bool,
    pub next_page: Option<i64>,
    pub prev_page: Option<i64>,
    pub results: Vec<T>,
}

impl<T> PageResult<T> {
    /// Build page metadata for `requested_page` out of `total_results` rows.
    ///
    /// The page is clamped to at least 1, and down to the last page when it
    /// points past the end. A `per_page` below 1 yields zero pages and is
    /// reported by [`PageResult::validate`].
    pub fn new(total_results: i64, requested_page: i64, per_page: i64) -> Self {
        let mut page = Self {
            total_results: total_results.max(0),
            total_pages: 0,
            current_page: requested_page.max(1),
            per_page,
            has_next: false,
            has_prev: false,
            next_page: None,
            prev_page: None,
            results: Vec::new(),
        };
        page.recompute();
        page
    }

    /// Row offset of the first result on the current page.
    pub fn offset(&self) -> i64 {
        (self.current_page - 1).saturating_mul(self.per_page.max(0))
    }

    /// Attach the rows returned for this page.
    ///
    /// On the last page, fewer rows than `per_page` means the count was
    /// stale: `total_results` becomes `(total_pages - 1) * per_page + len`
    /// and everything derived from it is recomputed.
    pub fn set_results(&mut self, results: Vec<T>) {
        let returned = i64::try_from(results.len()).unwrap_or(i64::MAX);
        let last_page = self.total_pages;

        if last_page > 0 && self.current_page == last_page && returned < self.per_page {
            let corrected = (last_page - 1) * self.per_page + returned;
            if corrected != self.total_results {
                tracing::debug!(
                    counted = self.total_results,
                    corrected = corrected,
                    page = self.current_page,
                    "Short last page, correcting total"
                );
            }
            self.total_results = corrected;
            self.recompute();
        }

        self.results = results;
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.current_page < 1 {
            return Err(ValidationError::InvalidPage(self.current_page));
        }
        if self.total_results < 0 {
            return Err(ValidationError::NegativeTotal(self.total_results));
        }
        if self.per_page < 1 {
            return Err(ValidationError::InvalidPerPage(self.per_page));
        }
        Ok(())
    }

    fn recompute(&mut self) {
        self.total_pages = total_pages(self.total_results, self.per_page);
        if self.total_pages > 0 && self.current_page > self.total_pages {
            self.current_page = self.total_pages;
        }

        self.has_next = self.current_page < self.total_pages;
        self.has_prev = self.current_page > 1;
        self.next_page = self.has_next.then(|| self.current_page + 1);
        self.prev_page = self.has_prev.then(|| self.current_page - 1);
    }
}

/// `ceil(total_results / per_page)`, zero for an empty result set.
pub fn total_pages(total_results: i64, per_page: i64) -> i64 {
    if total_results <= 0 || per_page < 1 {
        return 0;
    }
    (total_results - 1) / per_page + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(1, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
        assert_eq!(total_pages(45, 20), 3);
    }

    #[test]
    fn test_total_pages_near_i64_max() {
        assert_eq!(total_pages(i64::MAX, 1), i64::MAX);
        assert_eq!(total_pages(i64::MAX, 2), i64::MAX / 2 + 1);
        assert_eq!(total_pages(i64::MAX, i64::MAX), 1);

        let page: PageResult<()> = PageResult::new(i64::MAX, i64::MAX, 20);
        assert_eq!(page.total_pages, i64::MAX / 20 + 1);
        assert_eq!(page.current_page, page.total_pages);
        assert!(!page.has_next);
    }

    #[test]
    fn test_requested_page_past_end_clamps_to_last() {
        let page: PageResult<()> = PageResult::new(45, 5, 20);

        assert_eq!(page.total_pages, 3);
        assert_eq!(page.current_page, 3);
        assert!(!page.has_next);
        assert!(page.has_prev);
        assert_eq!(page.next_page, None);
        assert_eq!(page.prev_page, Some(2));
    }

    #[test]
    fn test_first_page_navigation() {
        let page: PageResult<()> = PageResult::new(45, 1, 20);

        assert_eq!(page.current_page, 1);
        assert!(page.has_next);
        assert!(!page.has_prev);
        assert_eq!(page.next_page, Some(2));
        assert_eq!(page.prev_page, None);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_non_positive_page_and_total_are_clamped() {
        let page: PageResult<()> = PageResult::new(-3, -1, 20);

        assert_eq!(page.total_results, 0);
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.current_page, 1);
        assert!(!page.has_next);
        assert!(!page.has_prev);
        assert!(page.validate().is_ok());
    }

    #[test]
    fn test_empty_result_set_keeps_requested_page() {
        let page: PageResult<()> = PageResult::new(0, 4, 20);
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.current_page, 4);
        assert!(!page.has_next);
        assert!(page.has_prev);
    }

    #[test]
    fn test_short_last_page_corrects_total() {
        let mut page = PageResult::new(45, 3, 20);
        page.set_results(vec![1, 2, 3]);

        assert_eq!(page.total_results, 43);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.current_page, 3);
        assert!(!page.has_next);
        assert_eq!(page.results, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_last_page_drops_a_page() {
        let mut page: PageResult<u32> = PageResult::new(41, 3, 20);
        page.set_results(Vec::new());

        assert_eq!(page.total_results, 40);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.current_page, 2);
        assert!(!page.has_next);
        assert_eq!(page.prev_page, Some(1));
    }

    #[test]
    fn test_short_page_before_last_is_not_corrected() {
        let mut page = PageResult::new(45, 2, 20);
        page.set_results(vec![1, 2, 3]);

        assert_eq!(page.total_results, 45);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
    }

    #[test]
    fn test_full_last_page_is_not_corrected() {
        let mut page = PageResult::new(40, 2, 20);
        page.set_results((0..20).collect());
        assert_eq!(page.total_results, 40);
    }

    #[test]
    fn test_offset_follows_clamped_page() {
        let page: PageResult<()> = PageResult::new(45, 9, 20);
        assert_eq!(page.offset(), 40);
    }

    #[test]
    fn test_validate_rejects_bad_per_page() {
        let page: PageResult<()> = PageResult::new(45, 1, 0);
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.validate(), Err(ValidationError::InvalidPerPage(0)));
    }

    #[test]
    fn test_validate_rejects_tampered_fields() {
        let mut page: PageResult<()> = PageResult::new(45, 1, 20);
        page.current_page = 0;
        assert_eq!(page.validate(), Err(ValidationError::InvalidPage(0)));

        let mut page: PageResult<()> = PageResult::new(45, 1, 20);
        page.total_results = -1;
        assert_eq!(page.validate(), Err(ValidationError::NegativeTotal(-1)));
    }

    #[test]
    fn test_serializes_for_rendering() {
        let mut page = PageResult::new(45, 3, 20);
        page.set_results(vec!["a"]);
        let json = serde_json::to_value(&page).unwrap();

        assert_eq!(json["total_results"], 41);
        assert_eq!(json["has_next"], false);
        assert_eq!(json["prev_page"], 2);
        assert_eq!(json["next_page"], serde_json::Value::Null);
    }

    fn assert_navigation_consistent<T>(page: &PageResult<T>) {
        assert_eq!(page.total_pages, total_pages(page.total_results, page.per_page));
        assert!(page.current_page >= 1);
        if page.total_pages > 0 {
            assert!(page.current_page <= page.total_pages);
        }
        assert_eq!(page.has_next, page.current_page < page.total_pages);
        assert_eq!(page.has_prev, page.current_page > 1);
        assert_eq!(page.next_page.is_some(), page.has_next);
        assert_eq!(page.prev_page.is_some(), page.has_prev);
    }

    proptest! {
        #[test]
        fn prop_navigation_is_consistent(
            total in -10i64..5_000,
            requested in -10i64..500,
            per_page in 1i64..100,
        ) {
            let page: PageResult<()> = PageResult::new(total, requested, per_page);
            assert_navigation_consistent(&page);
            prop_assert!(page.validate().is_ok());
        }

        #[test]
        fn prop_short_page_correction_stays_consistent(
            total in 1i64..5_000,
            per_page in 1i64..100,
            returned_fraction in 0.0f64..1.0,
        ) {
            let last = total_pages(total, per_page);
            let mut page = PageResult::new(total, last, per_page);
            let returned = ((per_page as f64) * returned_fraction) as usize;

            page.set_results(vec![(); returned]);

            assert_navigation_consistent(&page);
            prop_assert!(page.total_results <= total.max((last - 1) * per_page + returned as i64));
            prop_assert_eq!(page.results.len(), returned);
        }
    }
}
