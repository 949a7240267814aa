use thiserror::Error;

/// Errors talking to the Notion API.
#[derive(Error, Debug)]
pub enum NotionError {
    #[error("Notion token is not configured (set SOAL_NOTION_TOKEN)")]
    MissingToken,

    #[error("Invalid header value for {0}")]
    InvalidHeader(&'static str),

    #[error("Invalid Notion id: {0}")]
    InvalidId(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notion API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}

/// A page whose blocks could not be fetched.
#[derive(Error, Debug)]
#[error("Failed to process page {page_id}: {source}")]
pub struct PageError {
    pub page_id: String,
    #[source]
    pub source: NotionError,
}
