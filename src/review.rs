use crate::data::{dedup_records, ReviewRecord, NOT_AVAILABLE};
use crate::error::CrawlerError;
use crate::extract::{CourseAggregate, PageExtract, RawReviewBlock};
use crate::fetch::Fetch;
use crate::paginate::paginate;
use chrono::NaiveDate;
use lazy_regex::regex;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Walks one course: professor discovery, per-professor aggregate snapshot,
/// then every review page. All failures are contained here - a bad review is
/// skipped, a bad professor page drops that professor's contribution, and the
/// course itself always yields whatever was collected.
pub struct CourseReviewer<F, E> {
    fetcher: F,
    extractor: E,
    base_url: String,
}

impl<F: Fetch, E: PageExtract> CourseReviewer<F, E> {
    pub fn new(fetcher: F, extractor: E, base_url: impl Into<String>) -> CourseReviewer<F, E> {
        CourseReviewer {
            fetcher,
            extractor,
            base_url: base_url.into(),
        }
    }

    pub async fn review_course(&self, course_code: &str) -> Vec<ReviewRecord> {
        let course_url = format!("{}/classes/{}", self.base_url, course_code);
        let professors = paginate(
            &self.fetcher,
            &course_url,
            |page| self.extractor.pagination_count(page),
            |page| self.extractor.extract_links(page, "/professors/"),
        )
        .await;

        let mut records = vec![];
        for href in &professors {
            let Some(professor) = professor_from_path(href, course_code) else {
                debug!("Ignoring professor link {} without course segment", href);
                continue;
            };
            match self.review_professor(href, &professor).await {
                Ok(found) => records.extend(found),
                Err(e) => {
                    warn!(
                        "Skipping professor {} for course {}: {}",
                        professor, course_code, e
                    );
                }
            }
        }

        // Set-union edge cases upstream can hand us the same professor/page
        // combination twice; full-row equality collapses those here.
        dedup_records(records)
    }

    async fn review_professor(
        &self,
        href: &str,
        professor: &str,
    ) -> Result<Vec<ReviewRecord>, CrawlerError> {
        let url = format!("{}{}", self.base_url, href);
        let page = self.fetcher.fetch(&url).await?;
        let aggregate = self.extractor.course_aggregate(&page)?;

        let blocks = paginate(
            &self.fetcher,
            &url,
            |page| self.extractor.pagination_count(page),
            |page| {
                self.extractor
                    .review_blocks(page)
                    .map(|blocks| blocks.into_iter().collect::<BTreeSet<_>>())
            },
        )
        .await;

        let mut records = vec![];
        for block in blocks {
            match normalize_review(&block, &aggregate, professor) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        "Skipping review of {} by {}: {}",
                        aggregate.course_code, professor, e
                    );
                }
            }
        }
        Ok(records)
    }
}

/// Builds a canonical record from one raw block. Required fields (grade,
/// date, text, vote counts) error out and fail this review only; a literally
/// unavailable term becomes the `N/A` sentinel pair, never a guess.
pub fn normalize_review(
    block: &RawReviewBlock,
    aggregate: &CourseAggregate,
    professor: &str,
) -> Result<ReviewRecord, CrawlerError> {
    let term = block
        .term
        .as_deref()
        .ok_or_else(|| CrawlerError::Field("quarter".to_string()))?;
    let (quarter, year) = split_term(term)?;

    let grade: String = block
        .grade
        .as_deref()
        .ok_or_else(|| CrawlerError::Field("grade".to_string()))?
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let date = normalize_date(
        block
            .date
            .as_deref()
            .ok_or_else(|| CrawlerError::Field("review date".to_string()))?,
    )?;

    let text = block
        .text
        .as_deref()
        .ok_or_else(|| CrawlerError::Field("review text".to_string()))?
        .replace('\n', "")
        .trim()
        .to_string();

    Ok(ReviewRecord {
        course_code: aggregate.course_code.clone(),
        course_name: aggregate.course_name.clone(),
        department: aggregate.department.clone(),
        professor: professor.to_string(),
        ratings: aggregate.ratings.clone(),
        quarter,
        year,
        grade,
        date,
        text,
        upvotes: parse_votes(block.upvotes.as_deref(), "upvote")?,
        downvotes: parse_votes(block.downvotes.as_deref(), "downvote")?,
        sentiment_label: None,
        sentiment_score: None,
    })
}

fn parse_votes(raw: Option<&str>, which: &str) -> Result<u32, CrawlerError> {
    let raw = raw.ok_or_else(|| CrawlerError::Field(format!("{} count", which)))?;
    raw.trim()
        .parse()
        .map_err(|_| CrawlerError::Field(format!("{} count {:?}", which, raw)))
}

/// Splits a combined term token like `Fall2021` at the letter-digit boundary.
/// A literal `N/A` maps to the sentinel pair.
pub fn split_term(raw: &str) -> Result<(String, String), CrawlerError> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact == NOT_AVAILABLE {
        return Ok((NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()));
    }
    let spaced = regex!(r"([a-zA-Z])(\d)").replace(&compact, "$1 $2");
    match spaced.split_once(' ') {
        Some((quarter, year)) => Ok((quarter.to_string(), year.to_string())),
        None => Err(CrawlerError::Field(format!("term token {:?}", raw))),
    }
}

/// Normalizes the two date forms the source uses - abbreviated month with a
/// period (`Jan.5,2021`, with longer abbreviations like `Sept.` cut to three
/// letters) and full month (`January5,2021`) - to `MM/DD/YYYY`. Anything else
/// is a hard failure for this review only.
pub fn normalize_date(raw: &str) -> Result<String, CrawlerError> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let candidate = match compact.find('.') {
        Some(i) if compact.is_ascii() => format!("{}{}", &compact[..i.min(3)], &compact[i..]),
        _ => compact,
    };
    for format in ["%b.%d,%Y", "%B%d,%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(&candidate, format) {
            return Ok(date.format("%m/%d/%Y").to_string());
        }
    }
    Err(CrawlerError::DateFormat(raw.to_string()))
}

/// Extracts a display name from a professor link path, which looks like
/// `/professors/jane-doe/{course}/`: hyphens to spaces, title case.
pub fn professor_from_path(path: &str, course_code: &str) -> Option<String> {
    let start = path.find("/professors/")? + "/professors/".len();
    let marker = format!("/{}/", course_code);
    let end = path[start..].find(&marker)? + start;
    let slug = &path[start..end];
    if slug.is_empty() {
        return None;
    }
    Some(title_case(&slug.replace('-', " ")))
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
