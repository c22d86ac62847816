use crate::error::CrawlerError;
use std::collections::BTreeSet;

/// One unparsed review block, as lifted from a page. All fields carry the raw
/// element text; interpretation (term splitting, date normalization, vote
/// parsing) happens in the course reviewer.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct RawReviewBlock {
    pub term: Option<String>,
    pub grade: Option<String>,
    pub date: Option<String>,
    pub text: Option<String>,
    pub upvotes: Option<String>,
    pub downvotes: Option<String>,
}

/// The per-professor aggregate header: department, canonical course identity
/// and the rating snapshot attached to every review from that page.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseAggregate {
    pub department: String,
    pub course_code: String,
    pub course_name: String,
    pub ratings: crate::data::CourseRatings,
}

/// Converts raw page content into typed pieces. Implementations parse the
/// markup internally; callers never see a DOM.
pub trait PageExtract: Send + Sync {
    /// All link targets whose path starts with `path_prefix`, deduplicated.
    fn extract_links(&self, page: &str, path_prefix: &str)
        -> Result<BTreeSet<String>, CrawlerError>;

    /// Total page count from the listing's pagination indicator, if present
    /// and well-formed.
    fn pagination_count(&self, page: &str) -> Option<u32>;

    /// Every review block on the page, raw.
    fn review_blocks(&self, page: &str) -> Result<Vec<RawReviewBlock>, CrawlerError>;

    /// The aggregate header of a professor-course page. Errors with
    /// [`CrawlerError::Structure`] when a required element is missing, which
    /// skips the professor's entire contribution.
    fn course_aggregate(&self, page: &str) -> Result<CourseAggregate, CrawlerError>;
}
