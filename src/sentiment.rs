use crate::data::ReviewRecord;
use crate::error::CrawlerError;
use tracing::{info, warn};

/// Input limit of the classifier, in characters. The caller truncates; the
/// classifier never sees more than this.
pub const MAX_INPUT_CHARS: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub struct Sentiment {
    pub label: String,
    pub score: f64,
}

#[async_trait::async_trait]
pub trait Classify: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Sentiment, CrawlerError>;
}

/// First [`MAX_INPUT_CHARS`] characters, cut on a character boundary.
pub fn truncate_for_classifier(text: &str) -> &str {
    match text.char_indices().nth(MAX_INPUT_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Attaches label and score verbatim; the score is never reinterpreted or
/// thresholded here. Fatal only to this record's enrichment.
pub async fn enrich_record<C: Classify + ?Sized>(
    classifier: &C,
    record: &mut ReviewRecord,
) -> Result<(), CrawlerError> {
    let sentiment = classifier
        .classify(truncate_for_classifier(&record.text))
        .await?;
    record.sentiment_label = Some(sentiment.label);
    record.sentiment_score = Some(sentiment.score);
    Ok(())
}

/// Batch driver: a failed record keeps empty sentiment columns and the batch
/// continues. Returns how many records were enriched.
pub async fn enrich_all<C: Classify + ?Sized>(
    classifier: &C,
    records: &mut [ReviewRecord],
) -> usize {
    let mut enriched = 0;
    for record in records.iter_mut() {
        match enrich_record(classifier, record).await {
            Ok(()) => enriched += 1,
            Err(e) => warn!(
                "Leaving review of {} by {} unenriched: {}",
                record.course_code, record.professor, e
            ),
        }
    }
    info!("Enriched {}/{} records", enriched, records.len());
    enriched
}

/// Text classifier behind an HTTP inference endpoint speaking the common
/// `{"inputs": text}` request / `[[{"label", "score"}]]` response convention.
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    pub fn new(endpoint: impl Into<String>) -> HttpClassifier {
        HttpClassifier {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait::async_trait]
impl Classify for HttpClassifier {
    async fn classify(&self, text: &str) -> Result<Sentiment, CrawlerError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "inputs": text }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CrawlerError::Classify(e.to_string()))?;

        let mut value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CrawlerError::Classify(e.to_string()))?;

        // Some backends nest the result one array deeper than others.
        while value.is_array() {
            let first = value
                .get_mut(0)
                .map(serde_json::Value::take)
                .ok_or_else(|| CrawlerError::Classify("empty classifier response".to_string()))?;
            if first.is_array() {
                value = first;
                continue;
            }
            value = first;
            break;
        }

        let label = value
            .get("label")
            .and_then(|l| l.as_str())
            .ok_or_else(|| CrawlerError::Classify("response missing label".to_string()))?
            .to_string();
        let score = value
            .get("score")
            .and_then(serde_json::Value::as_f64)
            .ok_or_else(|| CrawlerError::Classify("response missing score".to_string()))?;

        Ok(Sentiment { label, score })
    }
}
