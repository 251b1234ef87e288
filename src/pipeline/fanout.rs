//! Fan-out coordinator: dispatch a batch concurrently, join, merge in order.
//!
//! Workers run via `buffer_unordered`, so results arrive in completion
//! order. Each result carries its batch ordinal and is placed into an
//! index-addressed slot; the merge then walks the slots, so the merged text
//! never depends on which worker finished first.

use crate::error::DocumentError;
use crate::output::{DocumentRef, DocumentText};
use crate::pipeline::recognize::RecognizerFactory;
use crate::pipeline::worker::PageWorker;
use crate::progress::ProgressCallback;
use crate::store::DocumentSource;
use futures::stream::{self, Stream, StreamExt};
use std::time::Duration;
use tracing::{info, warn};

/// First `batch_size` keys in enumeration order.
pub fn select_batch(keys: Vec<String>, batch_size: usize) -> Vec<DocumentRef> {
    keys.into_iter().take(batch_size).map(DocumentRef::new).collect()
}

/// Start one worker per document, at most `concurrency` in flight, and yield
/// results as they complete.
///
/// A worker exceeding `timeout` is abandoned and yields a `Timeout` failure.
pub fn dispatch<'a, S, F>(
    worker: PageWorker<'a, S, F>,
    batch: Vec<DocumentRef>,
    concurrency: usize,
    timeout: Duration,
    progress: Option<ProgressCallback>,
) -> impl Stream<Item = DocumentText> + Send + 'a
where
    S: DocumentSource + 'a,
    F: RecognizerFactory + 'a,
{
    stream::iter(batch.into_iter().enumerate())
        .map(move |(ordinal, doc)| {
            let progress = progress.clone();
            async move {
                if let Some(ref cb) = progress {
                    cb.on_document_start(ordinal, &doc.key);
                }

                let outcome = match tokio::time::timeout(timeout, worker.process(ordinal, &doc))
                    .await
                {
                    Ok(done) => done,
                    Err(_) => DocumentText::failed(
                        ordinal,
                        &doc.key,
                        DocumentError::Timeout {
                            key: doc.key.clone(),
                            secs: timeout.as_secs(),
                        },
                    ),
                };

                match &outcome.error {
                    None => {
                        info!(
                            "'{}': {} page(s), {} bytes of text in {}ms",
                            outcome.key,
                            outcome.page_count,
                            outcome.text.len(),
                            outcome.duration_ms
                        );
                        if let Some(ref cb) = progress {
                            cb.on_document_complete(ordinal, &outcome.key, outcome.text.len());
                        }
                    }
                    Some(e) => {
                        warn!("'{}' excluded: {}", outcome.key, e);
                        if let Some(ref cb) = progress {
                            cb.on_document_error(ordinal, &outcome.key, &e.to_string());
                        }
                    }
                }

                outcome
            }
        })
        .buffer_unordered(concurrency.max(1))
}

/// Run the whole batch and return one result per document, in batch order.
pub async fn fan_out<S, F>(
    worker: PageWorker<'_, S, F>,
    batch: &[DocumentRef],
    concurrency: usize,
    timeout: Duration,
    progress: Option<ProgressCallback>,
) -> Vec<DocumentText>
where
    S: DocumentSource,
    F: RecognizerFactory,
{
    let mut slots: Vec<Option<DocumentText>> = vec![None; batch.len()];

    let mut completed = std::pin::pin!(dispatch(
        worker,
        batch.to_vec(),
        concurrency,
        timeout,
        progress
    ));
    while let Some(done) = completed.next().await {
        let ordinal = done.ordinal;
        if let Some(slot) = slots.get_mut(ordinal) {
            *slot = Some(done);
        }
    }

    slots
        .into_iter()
        .zip(batch)
        .enumerate()
        .map(|(ordinal, (slot, doc))| {
            slot.unwrap_or_else(|| {
                DocumentText::failed(
                    ordinal,
                    &doc.key,
                    DocumentError::Internal {
                        key: doc.key.clone(),
                        detail: "worker produced no result".into(),
                    },
                )
            })
        })
        .collect()
}

/// Concatenate successful documents' text in ordinal order.
///
/// Every document contributes whole lines, so an item never spans two
/// documents.
pub fn merge_texts(documents: &[DocumentText]) -> String {
    let mut ordered: Vec<&DocumentText> = documents.iter().filter(|d| d.is_success()).collect();
    ordered.sort_by_key(|d| d.ordinal);

    let mut merged = String::with_capacity(ordered.iter().map(|d| d.text.len() + 1).sum());
    for doc in ordered {
        merged.push_str(&doc.text);
        if !doc.text.is_empty() && !doc.text.ends_with('\n') {
            merged.push('\n');
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(ordinal: usize, text: &str) -> DocumentText {
        DocumentText {
            ordinal,
            key: format!("doc-{ordinal}.pdf"),
            text: text.to_string(),
            page_count: 1,
            page_failures: Vec::new(),
            error: None,
            duration_ms: 0,
        }
    }

    #[test]
    fn batch_takes_first_keys_in_order() {
        let keys: Vec<String> = (0..8).map(|i| format!("k{i}.pdf")).collect();
        let batch = select_batch(keys, 5);
        let names: Vec<&str> = batch.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(names, ["k0.pdf", "k1.pdf", "k2.pdf", "k3.pdf", "k4.pdf"]);
    }

    #[test]
    fn short_listing_is_not_padded() {
        let batch = select_batch(vec!["a.pdf".into(), "b.png".into()], 5);
        assert_eq!(batch.len(), 2);
        assert!(select_batch(Vec::new(), 5).is_empty());
    }

    #[test]
    fn merge_follows_ordinals_not_slice_order() {
        let docs = vec![ok(2, "third\n"), ok(0, "first\n"), ok(1, "second\n")];
        assert_eq!(merge_texts(&docs), "first\nsecond\nthird\n");
    }

    #[test]
    fn merge_skips_failures_and_terminates_lines() {
        let failed = DocumentText::failed(
            1,
            "bad.pdf",
            DocumentError::Rasterization {
                key: "bad.pdf".into(),
                detail: "corrupt".into(),
            },
        );
        let docs = vec![ok(0, "A | x |"), failed, ok(2, "B | y |\n")];
        assert_eq!(merge_texts(&docs), "A | x |\nB | y |\n");
    }

    #[test]
    fn merge_of_nothing_is_empty() {
        assert_eq!(merge_texts(&[]), "");
    }
}
