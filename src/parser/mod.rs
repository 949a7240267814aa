pub mod blocks;
pub mod sections;
pub mod segments;

use async_trait::async_trait;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{NotionError, PageError};
use crate::question::Question;
use blocks::Block;
use sections::Classifier;

/// A page returned by the database query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageRef {
    pub id: String,
}

/// Supplies the ordered block list of one page.
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn fetch_blocks(&self, page_id: &str) -> Result<Vec<Block>, NotionError>;
}

/// How a failed page affects the rest of the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageErrorPolicy {
    /// The first failure fails the whole batch.
    #[default]
    Abort,
    /// Skip failed pages and report them next to the questions.
    Isolate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFailure {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct Batch {
    pub questions: Vec<Question>,
    pub failures: Vec<PageFailure>,
}

/// Response body: a bare question list, or questions plus failures when
/// failed pages are isolated.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Output {
    Questions(Vec<Question>),
    Partial {
        questions: Vec<Question>,
        errors: Vec<PageFailure>,
    },
}

impl Batch {
    pub fn into_output(self, policy: PageErrorPolicy) -> Output {
        match policy {
            PageErrorPolicy::Abort => Output::Questions(self.questions),
            PageErrorPolicy::Isolate => Output::Partial {
                questions: self.questions,
                errors: self.failures,
            },
        }
    }
}

/// Fetch one page's blocks and classify them.
pub async fn process_page<S: BlockSource + ?Sized>(
    source: &S,
    page_id: &str,
    classifier: &Classifier<'_>,
) -> Result<Question, NotionError> {
    let blocks = source.fetch_blocks(page_id).await?;
    debug!(page = page_id, blocks = blocks.len(), "Fetched blocks");
    Ok(classifier.classify(page_id, &blocks))
}

/// Process pages one after another, in input order.
pub async fn process_pages<S: BlockSource + ?Sized>(
    source: &S,
    pages: &[PageRef],
    classifier: &Classifier<'_>,
    on_error: PageErrorPolicy,
    pb: &ProgressBar,
) -> Result<Batch, PageError> {
    let mut batch = Batch::default();

    for page in pages {
        match process_page(source, &page.id, classifier).await {
            Ok(question) => batch.questions.push(question),
            Err(e) => match on_error {
                PageErrorPolicy::Abort => {
                    return Err(PageError {
                        page_id: page.id.clone(),
                        source: e,
                    })
                }
                PageErrorPolicy::Isolate => {
                    warn!(page = %page.id, error = %e, "Page failed, skipping");
                    batch.failures.push(PageFailure {
                        id: page.id.clone(),
                        error: e.to_string(),
                    });
                }
            },
        }
        pb.inc(1);
    }

    info!(
        "Processed {} pages ({} ok, {} failed)",
        pages.len(),
        batch.questions.len(),
        batch.failures.len()
    );
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::math::EchoRenderer;
    use crate::parser::sections::UnlabeledAnswerPolicy;
    use serde_json::json;

    /// In-memory block source that records the order of fetches.
    struct MemorySource {
        pages: HashMap<String, Vec<Block>>,
        calls: Mutex<Vec<String>>,
    }

    impl MemorySource {
        fn new(pages: Vec<(&str, Vec<Block>)>) -> Self {
            MemorySource {
                pages: pages
                    .into_iter()
                    .map(|(id, blocks)| (id.to_string(), blocks))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BlockSource for MemorySource {
        async fn fetch_blocks(&self, page_id: &str) -> Result<Vec<Block>, NotionError> {
            self.calls.lock().unwrap().push(page_id.to_string());
            self.pages
                .get(page_id)
                .cloned()
                .ok_or_else(|| NotionError::Api {
                    status: 404,
                    code: "object_not_found".into(),
                    message: format!("Could not find block with ID: {page_id}"),
                })
        }
    }

    fn refs(ids: &[&str]) -> Vec<PageRef> {
        ids.iter().map(|id| PageRef { id: id.to_string() }).collect()
    }

    fn source() -> MemorySource {
        MemorySource::new(vec![
            ("p1", vec![Block::h2("Pertanyaan"), Block::para("one")]),
            ("p2", vec![Block::h2("Solusi"), Block::para("two")]),
            ("p3", vec![]),
        ])
    }

    #[tokio::test]
    async fn pages_processed_in_order() {
        let src = source();
        let classifier = Classifier::new(&EchoRenderer, UnlabeledAnswerPolicy::Buffer);
        let batch = process_pages(
            &src,
            &refs(&["p2", "p3", "p1"]),
            &classifier,
            PageErrorPolicy::Abort,
            &ProgressBar::hidden(),
        )
        .await
        .unwrap();

        let ids: Vec<&str> = batch.questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p3", "p1"]);
        assert_eq!(src.calls(), vec!["p2", "p3", "p1"]);
        assert!(batch.questions[1].is_empty());
        assert_eq!(batch.questions[0].solution.len(), 1);
        assert!(batch.failures.is_empty());
    }

    #[tokio::test]
    async fn abort_stops_at_first_failure() {
        let src = source();
        let classifier = Classifier::new(&EchoRenderer, UnlabeledAnswerPolicy::Buffer);
        let err = process_pages(
            &src,
            &refs(&["p1", "missing", "p2"]),
            &classifier,
            PageErrorPolicy::Abort,
            &ProgressBar::hidden(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.page_id, "missing");
        assert!(matches!(err.source, NotionError::Api { status: 404, .. }));
        assert_eq!(src.calls(), vec!["p1", "missing"]);
    }

    #[tokio::test]
    async fn isolate_keeps_other_pages() {
        let src = source();
        let classifier = Classifier::new(&EchoRenderer, UnlabeledAnswerPolicy::Buffer);
        let batch = process_pages(
            &src,
            &refs(&["p1", "missing", "p2"]),
            &classifier,
            PageErrorPolicy::Isolate,
            &ProgressBar::hidden(),
        )
        .await
        .unwrap();

        let ids: Vec<&str> = batch.questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].id, "missing");
        assert!(batch.failures[0].error.contains("object_not_found"));
        // p2 is unaffected by the failure before it
        assert_eq!(batch.questions[1], {
            let mut q = Question::new("p2");
            q.solution.push(crate::question::Entry::Paragraph(vec![
                crate::question::Segment::Text("two".into()),
            ]));
            q
        });
    }

    #[tokio::test]
    async fn single_page() {
        let src = source();
        let classifier = Classifier::new(&EchoRenderer, UnlabeledAnswerPolicy::Buffer);
        let q = process_page(&src, "p1", &classifier).await.unwrap();
        assert_eq!(q.contents.len(), 1);
        assert!(process_page(&src, "nope", &classifier).await.is_err());
    }

    #[test]
    fn output_shapes() {
        let batch = Batch {
            questions: vec![Question::new("p1")],
            failures: vec![PageFailure {
                id: "p2".into(),
                error: "boom".into(),
            }],
        };
        let abort = serde_json::to_value(batch.into_output(PageErrorPolicy::Abort)).unwrap();
        assert!(abort.is_array());
        assert_eq!(abort[0]["id"], "p1");

        let batch = Batch {
            questions: vec![],
            failures: vec![PageFailure {
                id: "p2".into(),
                error: "boom".into(),
            }],
        };
        let partial = serde_json::to_value(batch.into_output(PageErrorPolicy::Isolate)).unwrap();
        assert_eq!(
            partial,
            json!({ "questions": [], "errors": [{ "id": "p2", "error": "boom" }] })
        );
    }
}
