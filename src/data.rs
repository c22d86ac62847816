use crate::error::CrawlerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io;
use std::str::FromStr;

/// Sentinel used where the source literally shows "N/A" for a string field.
pub const NOT_AVAILABLE: &str = "N/A";

/// Rating snapshot from a professor-course aggregate page. `None` means the
/// source showed the rating as not available; that is distinct from `0.0` and
/// must stay distinct for downstream aggregate statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourseRatings {
    pub overall: Option<f64>,
    pub users: Option<f64>,
    pub easiness: Option<f64>,
    pub clarity: Option<f64>,
    pub workload: Option<f64>,
    pub helpfulness: Option<f64>,
}

impl CourseRatings {
    /// Bit patterns for equality and hashing; absent ratings never hold NaN,
    /// so `to_bits` comparison matches value comparison.
    fn bits(&self) -> [Option<u64>; 6] {
        [
            self.overall.map(f64::to_bits),
            self.users.map(f64::to_bits),
            self.easiness.map(f64::to_bits),
            self.clarity.map(f64::to_bits),
            self.workload.map(f64::to_bits),
            self.helpfulness.map(f64::to_bits),
        ]
    }
}

fn fmt_rating(f: &mut fmt::Formatter<'_>, value: Option<f64>) -> fmt::Result {
    match value {
        Some(v) => write!(f, "{}", v),
        None => write!(f, "{}", NOT_AVAILABLE),
    }
}

impl fmt::Display for CourseRatings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Overall=")?;
        fmt_rating(f, self.overall)?;
        write!(f, "; Users=")?;
        fmt_rating(f, self.users)?;
        write!(f, "; Easiness=")?;
        fmt_rating(f, self.easiness)?;
        write!(f, "; Clarity=")?;
        fmt_rating(f, self.clarity)?;
        write!(f, "; Workload=")?;
        fmt_rating(f, self.workload)?;
        write!(f, "; Helpfulness=")?;
        fmt_rating(f, self.helpfulness)
    }
}

impl FromStr for CourseRatings {
    type Err = CrawlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut ratings = CourseRatings::default();
        for pair in s.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| CrawlerError::Field(format!("ratings entry {:?}", pair)))?;
            let value = if value == NOT_AVAILABLE {
                None
            } else {
                Some(value.parse::<f64>().map_err(|_| {
                    CrawlerError::Field(format!("ratings value {:?} for {}", value, key))
                })?)
            };
            match key {
                "Overall" => ratings.overall = value,
                "Users" => ratings.users = value,
                "Easiness" => ratings.easiness = value,
                "Clarity" => ratings.clarity = value,
                "Workload" => ratings.workload = value,
                "Helpfulness" => ratings.helpfulness = value,
                other => {
                    return Err(CrawlerError::Field(format!("ratings key {:?}", other)));
                }
            }
        }
        Ok(ratings)
    }
}

impl Serialize for CourseRatings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CourseRatings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One normalized review. Column names match the exported CSV schema; the
/// sentiment columns stay empty until enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    #[serde(rename = "Course Code")]
    pub course_code: String,
    #[serde(rename = "Course Name")]
    pub course_name: String,
    #[serde(rename = "Department")]
    pub department: String,
    #[serde(rename = "Professor")]
    pub professor: String,
    #[serde(rename = "Course Ratings")]
    pub ratings: CourseRatings,
    #[serde(rename = "Quarter")]
    pub quarter: String,
    #[serde(rename = "Year")]
    pub year: String,
    #[serde(rename = "Grade")]
    pub grade: String,
    #[serde(rename = "Review Date")]
    pub date: String,
    #[serde(rename = "Review Text")]
    pub text: String,
    #[serde(rename = "Review Upvote")]
    pub upvotes: u32,
    #[serde(rename = "Review Downvote")]
    pub downvotes: u32,
    #[serde(rename = "Review Sentiment Label")]
    pub sentiment_label: Option<String>,
    #[serde(rename = "Review Sentiment Score")]
    pub sentiment_score: Option<f64>,
}

impl ReviewRecord {
    #[allow(clippy::type_complexity)]
    fn key(
        &self,
    ) -> (
        [&str; 9],
        u32,
        u32,
        [Option<u64>; 6],
        Option<&str>,
        Option<u64>,
    ) {
        (
            [
                self.course_code.as_str(),
                self.course_name.as_str(),
                self.department.as_str(),
                self.professor.as_str(),
                self.quarter.as_str(),
                self.year.as_str(),
                self.grade.as_str(),
                self.date.as_str(),
                self.text.as_str(),
            ],
            self.upvotes,
            self.downvotes,
            self.ratings.bits(),
            self.sentiment_label.as_deref(),
            self.sentiment_score.map(f64::to_bits),
        )
    }
}

// Full-row equality defines a duplicate; floats compare by bit pattern.
impl PartialEq for ReviewRecord {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl Eq for ReviewRecord {}

impl Hash for ReviewRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// Drops full-row duplicates, keeping the first occurrence in order.
pub fn dedup_records(records: Vec<ReviewRecord>) -> Vec<ReviewRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.clone()))
        .collect()
}

/// The accumulated dataset. Insertion order reflects crawl order; merging
/// silently drops rows identical to one already present, so merging the same
/// batch twice is a no-op.
#[derive(Debug, Default)]
pub struct Dataset {
    records: Vec<ReviewRecord>,
    seen: HashSet<ReviewRecord>,
}

impl Dataset {
    pub fn from_records(records: Vec<ReviewRecord>) -> Dataset {
        let mut dataset = Dataset::default();
        dataset.merge(records);
        dataset
    }

    /// Returns how many records were new.
    pub fn merge(&mut self, records: impl IntoIterator<Item = ReviewRecord>) -> usize {
        let mut inserted = 0;
        for record in records {
            if self.seen.insert(record.clone()) {
                self.records.push(record);
                inserted += 1;
            }
        }
        inserted
    }

    pub fn records(&self) -> &[ReviewRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ReviewRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn write_csv<W: io::Write>(writer: W, records: &[ReviewRecord]) -> Result<(), CrawlerError> {
    let mut writer = csv::Writer::from_writer(writer);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_csv<R: io::Read>(reader: R) -> Result<Vec<ReviewRecord>, CrawlerError> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut records = vec![];
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn record(course: &str, text: &str) -> ReviewRecord {
        ReviewRecord {
            course_code: course.to_string(),
            course_name: "Software Construction".to_string(),
            department: "Computer Science".to_string(),
            professor: "Paul Eggert".to_string(),
            ratings: CourseRatings {
                overall: Some(3.5),
                users: Some(120.0),
                easiness: Some(1.9),
                clarity: Some(3.1),
                workload: None,
                helpfulness: Some(3.4),
            },
            quarter: "Fall".to_string(),
            year: "2021".to_string(),
            grade: "A-".to_string(),
            date: "01/05/2021".to_string(),
            text: text.to_string(),
            upvotes: 4,
            downvotes: 1,
            sentiment_label: None,
            sentiment_score: None,
        }
    }

    #[test]
    fn ratings_display_roundtrip() {
        let ratings = CourseRatings {
            overall: Some(3.5),
            users: Some(120.0),
            easiness: None,
            clarity: Some(3.1),
            workload: None,
            helpfulness: Some(3.4),
        };
        let s = ratings.to_string();
        assert_eq!(
            s,
            "Overall=3.5; Users=120; Easiness=N/A; Clarity=3.1; Workload=N/A; Helpfulness=3.4"
        );
        assert_eq!(s.parse::<CourseRatings>().unwrap(), ratings);
    }

    #[test]
    fn ratings_parse_rejects_unknown_key() {
        assert!("Overall=3; Difficulty=2".parse::<CourseRatings>().is_err());
    }

    #[test]
    fn missing_rating_is_not_zero() {
        let ratings: CourseRatings = "Overall=3.5; Users=12; Easiness=2; Clarity=3; \
                                      Workload=N/A; Helpfulness=4"
            .parse()
            .unwrap();
        assert_eq!(ratings.workload, None);
        assert_ne!(ratings.workload, Some(0.0));
    }

    #[test]
    fn merging_dataset_with_itself_changes_nothing() {
        let records = vec![record("com-sci-35l", "great"), record("com-sci-35l", "hard")];
        let mut dataset = Dataset::from_records(records.clone());
        assert_eq!(dataset.len(), 2);
        let inserted = dataset.merge(records);
        assert_eq!(inserted, 0);
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let a = record("com-sci-35l", "great");
        let b = record("com-sci-35l", "hard");
        let deduped = dedup_records(vec![a.clone(), b.clone(), a.clone()]);
        assert_eq!(deduped, vec![a, b]);
    }

    #[test]
    fn sentiment_widening_creates_a_distinct_row() {
        let plain = record("stats-100a", "fine");
        let mut enriched = plain.clone();
        enriched.sentiment_label = Some("POSITIVE".to_string());
        enriched.sentiment_score = Some(0.98);
        assert_ne!(plain, enriched);
    }

    #[test]
    fn csv_roundtrip_preserves_records_and_headers() {
        let records = vec![record("com-sci-35l", "line one\nwas stripped upstream")];
        let mut buf = vec![];
        write_csv(&mut buf, &records).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with(
            "Course Code,Course Name,Department,Professor,Course Ratings,Quarter,Year,\
             Grade,Review Date,Review Text,Review Upvote,Review Downvote,\
             Review Sentiment Label,Review Sentiment Score"
        ));
        assert_eq!(read_csv(buf.as_slice()).unwrap(), records);
    }
}
