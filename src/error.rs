#[derive(Debug, thiserror::Error)]
pub enum CrawlerError {
    /// Network-level failure. Contained at the page/item boundary.
    #[error("request for {url} failed")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// An expected markup element is absent. At review level this skips the
    /// review; on a professor aggregate page it skips the professor.
    #[error("missing expected element: {0}")]
    Structure(String),

    /// A review date in neither recognized textual format.
    #[error("unrecognized date format: {0:?}")]
    DateFormat(String),

    /// A required field is absent or fails to parse.
    #[error("missing or invalid field: {0}")]
    Field(String),

    #[error("classifier error: {0}")]
    Classify(String),

    #[error("checkpoint I/O error")]
    Io(#[from] std::io::Error),

    #[error("checkpoint encoding error")]
    Csv(#[from] csv::Error),
}
