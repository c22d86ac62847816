use crate::extract::PageExtract;
use crate::fetch::Fetch;
use crate::paginate::paginate;
use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use tracing::info;

/// Course-listing search URL for one department.
pub fn department_url(base_url: &str, department: u32) -> String {
    format!("{}/search/?category=classes&dept={}", base_url, department)
}

/// Turns a course link path like `/classes/com-sci-35l/` into its code.
pub fn course_code_from_path(path: &str) -> Option<String> {
    let code = path.trim_matches('/').strip_prefix("classes/")?;
    let code = code.trim_matches('/');
    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}

/// Enumerates department course listings and unions their course codes.
///
/// A department whose listing is unreachable or unparseable contributes
/// nothing; the walk always continues to the next code. The result is sorted
/// so that crawl order is fixed across runs, which is what makes
/// resume-by-index well-defined. Cross-listed courses collapse to one entry.
pub async fn discover<F, E>(
    fetcher: &F,
    extractor: &E,
    base_url: &str,
    departments: RangeInclusive<u32>,
) -> Vec<String>
where
    F: Fetch + ?Sized,
    E: PageExtract + ?Sized,
{
    let mut courses = BTreeSet::new();
    for department in departments {
        let url = department_url(base_url, department);
        let links = paginate(
            fetcher,
            &url,
            |page| extractor.pagination_count(page),
            |page| extractor.extract_links(page, "/classes/"),
        )
        .await;

        let before = courses.len();
        courses.extend(links.iter().filter_map(|path| course_code_from_path(path)));
        info!(
            "Department {}: {} courses ({} new)",
            department,
            links.len(),
            courses.len() - before
        );
    }
    courses.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn course_code_strips_listing_segment() {
        assert_eq!(
            course_code_from_path("/classes/com-sci-35l/"),
            Some("com-sci-35l".to_string())
        );
        assert_eq!(
            course_code_from_path("/classes/stats-100a"),
            Some("stats-100a".to_string())
        );
        assert_eq!(course_code_from_path("/professors/jane-doe/"), None);
        assert_eq!(course_code_from_path("/classes/"), None);
    }
}
