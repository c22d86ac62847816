use crate::data::CourseRatings;
use crate::error::CrawlerError;
use crate::extract::{CourseAggregate, PageExtract, RawReviewBlock};
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;

const E: &str = "Invalid selector";
lazy_static! {
    static ref PAGINATOR: Selector = Selector::parse("div.paginator").expect(E);
    static ref SPAN: Selector = Selector::parse("span").expect(E);
    static ref DIV: Selector = Selector::parse("div").expect(E);
    static ref H2: Selector = Selector::parse("h2").expect(E);
    static ref DEPARTMENT: Selector = Selector::parse("div.department-name").expect(E);
    static ref COURSE_BADGE: Selector = Selector::parse("span.aggregate-type-badge").expect(E);
    static ref AGGREGATE_HEADER: Selector =
        Selector::parse("div.aggregate-header.content-row").expect(E);
    static ref OVERALL_SCORE: Selector = Selector::parse("div.overall-score").expect(E);
    static ref OVERALL_TEXT: Selector = Selector::parse("div.overall-text").expect(E);
    static ref IND_RATING: Selector = Selector::parse("div.ind-rating").expect(E);
    static ref RATING_VALUE: Selector = Selector::parse("span.value").expect(E);
    static ref REVIEW_CARD: Selector = Selector::parse("div.review.reviewcard").expect(E);
    static ref TERM_GRADE_ROW: Selector = Selector::parse(r#"div[class^="row collapse"]"#).expect(E);
    static ref REVIEW_DATE: Selector = Selector::parse(r#"span[class^="date"]"#).expect(E);
    static ref REVIEW_TEXT: Selector =
        Selector::parse("div.expand-area.review-paragraph").expect(E);
    static ref UPVOTE: Selector = Selector::parse("span.upvote-value").expect(E);
    static ref DOWNVOTE: Selector = Selector::parse("span.downvote-value").expect(E);
}

fn element_text(el: ElementRef) -> String {
    el.text().collect()
}

fn compact(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// `3.1 / 5` or `N/A` out of a rating badge; absence of a number is recorded
/// as missing, never zero.
fn parse_rating(raw: &str) -> Result<Option<f64>, CrawlerError> {
    let value = compact(raw);
    let value = value.strip_suffix("/5").unwrap_or(&value);
    if value == "N/A" || value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| CrawlerError::Field(format!("rating value {:?}", raw)))
}

/// Page extractor for the bruinwalk.com markup.
#[derive(Debug, Default)]
pub struct Bruinwalk;

impl PageExtract for Bruinwalk {
    fn extract_links(
        &self,
        page: &str,
        path_prefix: &str,
    ) -> Result<BTreeSet<String>, CrawlerError> {
        let selector = Selector::parse(&format!(r#"a[href^="{}"]"#, path_prefix))
            .map_err(|_| CrawlerError::Structure(format!("link selector {:?}", path_prefix)))?;
        let doc = Html::parse_document(page);
        Ok(doc
            .select(&selector)
            .filter_map(|a| a.value().attr("href"))
            .map(ToString::to_string)
            .collect())
    }

    fn pagination_count(&self, page: &str) -> Option<u32> {
        let doc = Html::parse_document(page);
        let indicator = doc.select(&PAGINATOR).next()?.select(&SPAN).nth(1)?;
        // reads "1 of N"
        element_text(indicator)
            .trim()
            .replace("1 of ", "")
            .parse()
            .ok()
    }

    fn review_blocks(&self, page: &str) -> Result<Vec<RawReviewBlock>, CrawlerError> {
        let doc = Html::parse_document(page);
        let mut blocks = vec![];
        for card in doc.select(&REVIEW_CARD) {
            let (term, grade) = match card.select(&TERM_GRADE_ROW).next() {
                Some(row) => {
                    let mut cells = row.select(&DIV);
                    (
                        cells
                            .next()
                            .map(|c| element_text(c).replace("Quarter:", "")),
                        cells.next().map(|c| element_text(c).replace("Grade:", "")),
                    )
                }
                None => (None, None),
            };
            blocks.push(RawReviewBlock {
                term,
                grade,
                date: card.select(&REVIEW_DATE).next().map(element_text),
                text: card.select(&REVIEW_TEXT).next().map(element_text),
                upvotes: card.select(&UPVOTE).next().map(element_text),
                downvotes: card.select(&DOWNVOTE).next().map(element_text),
            });
        }
        Ok(blocks)
    }

    fn course_aggregate(&self, page: &str) -> Result<CourseAggregate, CrawlerError> {
        let doc = Html::parse_document(page);

        let department = doc
            .select(&DEPARTMENT)
            .next()
            .map(element_text)
            .ok_or_else(|| CrawlerError::Structure("department-name".to_string()))?
            .trim()
            .replace("Department of ", "");

        let course_code = doc
            .select(&COURSE_BADGE)
            .next()
            .map(element_text)
            .ok_or_else(|| CrawlerError::Structure("aggregate-type-badge".to_string()))?
            .trim()
            .to_string();

        let course_name = doc
            .select(&AGGREGATE_HEADER)
            .next()
            .and_then(|header| header.select(&H2).next())
            .map(element_text)
            .ok_or_else(|| CrawlerError::Structure("aggregate-header h2".to_string()))?
            .trim()
            .to_string();

        let overall = doc
            .select(&OVERALL_SCORE)
            .next()
            .map(element_text)
            .ok_or_else(|| CrawlerError::Structure("overall-score".to_string()))?;

        let users: String = doc
            .select(&OVERALL_TEXT)
            .next()
            .map(element_text)
            .ok_or_else(|| CrawlerError::Structure("overall-text".to_string()))?
            .chars()
            .filter(char::is_ascii_digit)
            .collect();

        let mut ratings = CourseRatings {
            overall: parse_rating(&overall)?,
            users: if users.is_empty() {
                None
            } else {
                Some(users.parse().map_err(|_| {
                    CrawlerError::Field(format!("user count {:?}", users))
                })?)
            },
            ..CourseRatings::default()
        };

        for badge in doc.select(&IND_RATING).take(4) {
            let value = match badge.select(&RATING_VALUE).next() {
                Some(el) => parse_rating(&element_text(el))?,
                None => continue,
            };
            let label = element_text(badge);
            if label.contains("Easiness") {
                ratings.easiness = value;
            } else if label.contains("Clarity") {
                ratings.clarity = value;
            } else if label.contains("Workload") {
                ratings.workload = value;
            } else if label.contains("Helpfulness") {
                ratings.helpfulness = value;
            }
        }

        Ok(CourseAggregate {
            department,
            course_code,
            course_name,
            ratings,
        })
    }
}
