use course_review_crawler::bruinwalk::Bruinwalk;
use course_review_crawler::checkpoint::{CheckpointStore, MemoryCheckpointStore};
use course_review_crawler::crawl::{CrawlConfig, Orchestrator};
use course_review_crawler::error::CrawlerError;
use course_review_crawler::fetch::Fetch;
use course_review_crawler::review::CourseReviewer;
use course_review_crawler::sentiment::{self, Classify, Sentiment};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Arc;

const BASE: &str = "https://bruinwalk.test";

struct StaticFetcher {
    pages: HashMap<String, String>,
}

#[async_trait::async_trait]
impl Fetch for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, CrawlerError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| CrawlerError::Structure(format!("no page for {}", url)))
    }
}

fn course_page(course: &str, professor_slugs: &[&str]) -> String {
    professor_slugs
        .iter()
        .map(|slug| format!(r#"<a href="/professors/{}/{}/">{}</a>"#, slug, course, slug))
        .collect()
}

fn review_card(term: &str, grade: &str, date: &str, text: &str, up: u32, down: u32) -> String {
    format!(
        r#"<div class="review reviewcard">
             <div class="row collapse"><div>Quarter: {}</div><div>Grade: {}</div></div>
             <span class="date">{}</span>
             <div class="expand-area review-paragraph">{}</div>
             <span class="upvote-value">{}</span>
             <span class="downvote-value">{}</span>
           </div>"#,
        term, grade, date, text, up, down
    )
}

fn professor_page(code: &str, name: &str, cards: &[String]) -> String {
    format!(
        r#"<div class="department-name">Department of Statistics</div>
           <span class="aggregate-type-badge">{}</span>
           <div class="aggregate-header content-row"><h2>{}</h2></div>
           <div class="overall-score">3.5</div>
           <div class="overall-text">Overall Rating Based on 10 Users</div>
           <div class="ind-rating">Easiness <span class="value">2.0 / 5</span></div>
           <div class="ind-rating">Clarity <span class="value">3.0 / 5</span></div>
           <div class="ind-rating">Workload <span class="value">N/A</span></div>
           <div class="ind-rating">Helpfulness <span class="value">4.0 / 5</span></div>
           {}"#,
        code,
        name,
        cards.join("\n")
    )
}

/// One course taught by one professor with one review page.
fn simple_course(pages: &mut HashMap<String, String>, course: &str, slug: &str, text: &str) {
    pages.insert(
        format!("{}/classes/{}", BASE, course),
        course_page(course, &[slug]),
    );
    pages.insert(
        format!("{}/professors/{}/{}/", BASE, slug, course),
        professor_page(
            &course.to_uppercase(),
            "Some Course",
            &[review_card("Fall 2021", "A", "Jan. 5, 2021", text, 1, 0)],
        ),
    );
}

fn orchestrator(
    pages: HashMap<String, String>,
    store: Arc<MemoryCheckpointStore>,
    interval: usize,
) -> Orchestrator<StaticFetcher, Bruinwalk, Arc<MemoryCheckpointStore>> {
    Orchestrator::new(
        CourseReviewer::new(StaticFetcher { pages }, Bruinwalk, BASE),
        store,
        CrawlConfig {
            checkpoint_interval: interval,
            workers: 1,
        },
    )
}

#[tokio::test]
async fn malformed_professor_page_drops_only_that_professor() {
    let mut pages = HashMap::new();
    pages.insert(
        format!("{}/classes/stats-100a", BASE),
        course_page("stats-100a", &["ada-lovelace", "bad-prof"]),
    );
    pages.insert(
        format!("{}/professors/ada-lovelace/stats-100a/", BASE),
        professor_page(
            "STATS 100A",
            "Introduction to Probability",
            &[
                review_card("Fall 2021", "A", "Jan. 5, 2021", "Loved it.", 3, 0),
                review_card("Winter 2022", "B+", "March 14, 2022", "Tough but fair.", 1, 1),
            ],
        ),
    );
    // aggregate page missing every required structural element
    pages.insert(
        format!("{}/professors/bad-prof/stats-100a/", BASE),
        "<div>under construction</div>".to_string(),
    );

    let store = Arc::new(MemoryCheckpointStore::default());
    let courses = vec!["stats-100a".to_string()];
    let dataset = orchestrator(pages, Arc::clone(&store), 1000)
        .run(&courses)
        .await
        .unwrap();

    assert_eq!(dataset.len(), 2);
    for record in dataset.records() {
        assert_eq!(record.professor, "Ada Lovelace");
        assert_eq!(record.course_code, "STATS 100A");
        assert_eq!(record.ratings.workload, None);
    }
    let dates: Vec<&str> = dataset.records().iter().map(|r| r.date.as_str()).collect();
    assert!(dates.contains(&"01/05/2021"));
    assert!(dates.contains(&"03/14/2022"));
}

#[tokio::test]
async fn resumed_run_equals_uninterrupted_run() {
    let mut pages = HashMap::new();
    simple_course(&mut pages, "com-sci-35l", "paul-eggert", "Git everywhere.");
    simple_course(&mut pages, "math-31a", "terence-tao", "Lucky us.");
    simple_course(&mut pages, "stats-10", "jane-doe", "Gentle intro.");
    let courses: Vec<String> = ["com-sci-35l", "math-31a", "stats-10"]
        .map(str::to_string)
        .to_vec();

    // uninterrupted reference run
    let full_store = Arc::new(MemoryCheckpointStore::default());
    let reference = orchestrator(pages.clone(), full_store, 1000)
        .run(&courses)
        .await
        .unwrap();

    // interrupted after two courses, then resumed over the full list
    let store = Arc::new(MemoryCheckpointStore::default());
    orchestrator(pages.clone(), Arc::clone(&store), 1000)
        .run(&courses[..2])
        .await
        .unwrap();
    assert_eq!(store.load().await.unwrap().unwrap().cursor, 2);

    let resumed = orchestrator(pages, Arc::clone(&store), 1000)
        .run(&courses)
        .await
        .unwrap();

    assert_eq!(resumed.records(), reference.records());
    assert_eq!(store.load().await.unwrap().unwrap().cursor, 3);
}

#[tokio::test]
async fn zero_review_course_still_advances_the_cursor() {
    let mut pages = HashMap::new();
    // course page exists but lists no professors
    pages.insert(format!("{}/classes/ghost-1", BASE), "<p>no links</p>".to_string());

    let store = Arc::new(MemoryCheckpointStore::default());
    let courses = vec!["ghost-1".to_string()];
    let dataset = orchestrator(pages, Arc::clone(&store), 1000)
        .run(&courses)
        .await
        .unwrap();

    assert!(dataset.is_empty());
    // resume knows the course was attempted even though it produced nothing
    assert_eq!(store.load().await.unwrap().unwrap().cursor, 1);
}

#[tokio::test]
async fn interval_checkpoints_are_written_during_the_run() {
    let mut pages = HashMap::new();
    simple_course(&mut pages, "a-1", "prof-a", "one");
    simple_course(&mut pages, "b-2", "prof-b", "two");
    let courses: Vec<String> = ["a-1", "b-2"].map(str::to_string).to_vec();

    let store = Arc::new(MemoryCheckpointStore::default());
    let dataset = orchestrator(pages, Arc::clone(&store), 1)
        .run(&courses)
        .await
        .unwrap();

    assert_eq!(dataset.len(), 2);
    let checkpoint = store.load().await.unwrap().unwrap();
    assert_eq!(checkpoint.cursor, 2);
    assert_eq!(checkpoint.records, dataset.into_records());
}

struct LengthClassifier;

#[async_trait::async_trait]
impl Classify for LengthClassifier {
    async fn classify(&self, text: &str) -> Result<Sentiment, CrawlerError> {
        Ok(Sentiment {
            label: if text.len() % 2 == 0 { "POSITIVE" } else { "NEGATIVE" }.to_string(),
            score: (text.len() as f64) / 1000.0,
        })
    }
}

#[tokio::test]
async fn enrichment_is_idempotent_with_a_deterministic_classifier() {
    let mut pages = HashMap::new();
    simple_course(&mut pages, "stats-10", "jane-doe", "Gentle intro.");
    let courses = vec!["stats-10".to_string()];
    let store = Arc::new(MemoryCheckpointStore::default());
    let dataset = orchestrator(pages, store, 1000).run(&courses).await.unwrap();

    let mut once = dataset.into_records();
    assert_eq!(sentiment::enrich_all(&LengthClassifier, &mut once).await, 1);
    let mut twice = once.clone();
    assert_eq!(sentiment::enrich_all(&LengthClassifier, &mut twice).await, 1);

    assert_eq!(once, twice);
    assert!(once[0].sentiment_label.is_some());
    assert!(once[0].sentiment_score.is_some());
}
