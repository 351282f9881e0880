//! Batched taxonomy classification
//!
//! Chunks collected feedback into fixed-size batches and sends each batch
//! through the completion service with a strict schema: the taxonomy name
//! is pinned to the known name and level1 is pinned to the known category
//! set, so an out-of-taxonomy classification fails at the client boundary
//! instead of passing through. A batch whose call fails degrades to an
//! empty classification list - completeness is sacrificed for that batch
//! rather than failing the whole run - and the number of degraded batches
//! is surfaced to the caller.

use crate::error::ClassifyError;
use fma_core::{ClassificationEntry, ClassifyConfig, FeedbackItem, Taxonomy, TaxonomyFile};
use fma_llm::CompletionClient;
use fma_scheduler::BoundedScheduler;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Developer-level instruction for classification calls
pub const CLASSIFY_INSTRUCTION: &str =
    "You classify feedbacks into a 2-level taxonomy (level1 and level2).";

/// Name of the structured response schema
pub const SCHEMA_NAME: &str = "taxonomy_feedback_classifications";

/// Fallback subcategory when no known level2 fits
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Classifier output: the taxonomy file plus degradation count
#[derive(Debug, Clone)]
pub struct ClassifyOutput {
    /// Concatenated classifications under the taxonomy name
    pub file: TaxonomyFile,
    /// Batches that failed and contributed nothing
    pub degraded_batches: usize,
    /// Total batches attempted
    pub total_batches: usize,
}

struct BatchOutcome {
    entries: Vec<ClassificationEntry>,
    degraded: bool,
}

/// Classifies feedback batches under a bounded concurrency limit
pub struct BatchClassifier {
    client: Arc<dyn CompletionClient>,
    config: ClassifyConfig,
}

impl BatchClassifier {
    /// Create a classifier over a shared completion client
    #[inline]
    #[must_use]
    pub fn new(client: Arc<dyn CompletionClient>, config: ClassifyConfig) -> Self {
        Self { client, config }
    }

    /// Classify all items into the taxonomy.
    ///
    /// Batching preserves collection order; batch results are concatenated
    /// as they complete. Never fails: a failed batch is logged, counted,
    /// and contributes an empty list.
    pub async fn classify(&self, items: &[FeedbackItem], taxonomy: &Taxonomy) -> ClassifyOutput {
        let batches = chunk_batches(items, self.config.effective_batch_size());
        let total_batches = batches.len();
        tracing::info!(
            items = items.len(),
            batches = total_batches,
            batch_size = self.config.effective_batch_size(),
            "classifying feedback batches"
        );

        let taxonomy_name = taxonomy.name().to_string();
        let schema = Arc::new(classification_schema(taxonomy));
        let taxonomy = Arc::new(taxonomy.clone());
        let scheduler = BoundedScheduler::new(self.config.effective_concurrency());

        let client = Arc::clone(&self.client);
        let results = scheduler
            .run_to_vec(batches, move |batch: Vec<FeedbackItem>| {
                let client = Arc::clone(&client);
                let schema = Arc::clone(&schema);
                let taxonomy = Arc::clone(&taxonomy);
                async move {
                    Ok::<_, Infallible>(classify_batch(client, &batch, &taxonomy, &schema).await)
                }
            })
            .await;

        let mut classifications = Vec::new();
        let mut degraded_batches = 0;
        for result in results {
            match result {
                Ok(outcome) => {
                    if outcome.degraded {
                        degraded_batches += 1;
                    }
                    classifications.extend(outcome.entries);
                }
                Err(e) => {
                    // Unit-level panic; treat like any other failed batch
                    tracing::warn!(error = %e, "classification unit failed");
                    degraded_batches += 1;
                }
            }
        }

        if degraded_batches > 0 {
            tracing::warn!(
                degraded = degraded_batches,
                total = total_batches,
                "some batches degraded to empty classification lists"
            );
        }

        ClassifyOutput {
            file: TaxonomyFile {
                taxonomy_name,
                classifications,
            },
            degraded_batches,
            total_batches,
        }
    }
}

async fn classify_batch(
    client: Arc<dyn CompletionClient>,
    batch: &[FeedbackItem],
    taxonomy: &Taxonomy,
    schema: &Value,
) -> BatchOutcome {
    let prompt = build_batch_prompt(batch, taxonomy);
    match client
        .complete_json(CLASSIFY_INSTRUCTION, &prompt, SCHEMA_NAME, schema)
        .await
    {
        Ok(value) => match serde_json::from_value::<TaxonomyFile>(value) {
            Ok(file) => BatchOutcome {
                entries: file.classifications,
                degraded: false,
            },
            Err(e) => {
                tracing::warn!(error = %e, "validated output did not deserialize, degrading batch");
                BatchOutcome {
                    entries: Vec::new(),
                    degraded: true,
                }
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "batch classification failed, degrading to empty result");
            BatchOutcome {
                entries: Vec::new(),
                degraded: true,
            }
        }
    }
}

/// Partition items into contiguous batches of `size`, preserving order.
///
/// The last batch may be shorter; a zero size is clamped to one.
#[must_use]
pub fn chunk_batches<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    items.chunks(size).map(<[T]>::to_vec).collect()
}

/// Render one batch prompt with numbered feedback sections and the
/// taxonomy embedded verbatim as reference material
#[must_use]
pub fn build_batch_prompt(batch: &[FeedbackItem], taxonomy: &Taxonomy) -> String {
    let mut prompt = String::new();
    let _ = write!(
        prompt,
        "Classify each issue mentioned in the feedbacks into a 2-level taxonomy: \
         a top-level category (level1) and a subcategory (level2). \
         Use the provided known taxonomy. \
         Choose the single best level1 and level2 for each feedback. \
         If no subcategory clearly fits, pick the closest level1 and set level2 to '{UNCATEGORIZED}'.\n\n",
    );

    prompt.push_str("<feedbacks>\n");
    for (idx, item) in batch.iter().enumerate() {
        let n = idx + 1;
        let _ = writeln!(prompt, "<feedback{n}>");
        let _ = writeln!(prompt, "<node_id>{}</node_id>", item.node_id);
        prompt.push_str(&item.text);
        prompt.push('\n');
        let _ = writeln!(prompt, "</feedback{n}>");
        prompt.push('\n');
    }
    prompt.push_str("</feedbacks>\n\n");

    let _ = writeln!(
        prompt,
        "<known_taxonomy_name>\n{}\n</known_taxonomy_name>\n",
        taxonomy.name()
    );
    let _ = writeln!(
        prompt,
        "<known_taxonomy_json>\n{}\n</known_taxonomy_json>\n",
        taxonomy.raw_json()
    );

    prompt.push_str(
        "Important: Do not classify entire feedbacks as a single level1 and level2. \
         Classify each issue mentioned in the feedbacks into a 2-level taxonomy.",
    );
    prompt
}

/// Strict response schema for one batch: taxonomy name pinned to the known
/// name, level1 pinned to the known category set
#[must_use]
pub fn classification_schema(taxonomy: &Taxonomy) -> Value {
    json!({
        "type": "object",
        "properties": {
            "taxonomy_name": {
                "type": "string",
                "description": "The name of the taxonomy used for classification.",
                "enum": [taxonomy.name()]
            },
            "classifications": {
                "type": "array",
                "description": "Per-feedback classification assignments.",
                "items": {
                    "type": "object",
                    "properties": {
                        "issue": {
                            "type": "string",
                            "description": "The issue extracted from the feedback."
                        },
                        "node_id": {
                            "type": "string",
                            "description": "Identifier for the node associated with this feedback."
                        },
                        "level1": {
                            "type": "string",
                            "description": "Top-level category name.",
                            "enum": taxonomy.level1_categories()
                        },
                        "level2": {
                            "type": "string",
                            "description": "Subcategory under level1 (or 'Uncategorized' if none clearly fits)."
                        }
                    },
                    "required": ["issue", "node_id", "level1", "level2"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["taxonomy_name", "classifications"],
        "additionalProperties": false
    })
}

/// Write a taxonomy file as pretty-printed JSON under `dir`
pub fn write_classification(
    dir: impl AsRef<Path>,
    filename: &str,
    file: &TaxonomyFile,
) -> Result<PathBuf, ClassifyError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let path = dir.join(filename);
    let payload = serde_json::to_string_pretty(file)?;
    std::fs::write(&path, payload)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fma_test_utils::{make_taxonomy, MockCompletionClient, MockReply};
    use serde_json::json;

    fn items(n: usize) -> Vec<FeedbackItem> {
        (0..n)
            .map(|i| FeedbackItem::new(format!("node{i}"), format!("finding {i}")))
            .collect()
    }

    #[test]
    fn chunking_is_exhaustive_and_order_preserving() {
        let data: Vec<u32> = (0..10).collect();
        let batches = chunk_batches(&data, 3);
        assert_eq!(batches.len(), 4);
        assert_eq!(batches[3], vec![9]);
        let rejoined: Vec<u32> = batches.into_iter().flatten().collect();
        assert_eq!(rejoined, data);
    }

    #[test]
    fn chunking_clamps_zero_size() {
        let batches = chunk_batches(&[1, 2], 0);
        assert_eq!(batches.len(), 2);
    }

    #[test]
    fn prompt_numbers_feedbacks_and_embeds_taxonomy() {
        let taxonomy = make_taxonomy();
        let batch = items(2);
        let prompt = build_batch_prompt(&batch, &taxonomy);

        assert!(prompt.contains("<feedback1>"));
        assert!(prompt.contains("<feedback2>"));
        assert!(prompt.contains("<node_id>node0</node_id>"));
        assert!(prompt.contains("finding 1"));
        assert!(prompt.contains("<known_taxonomy_name>\nFailure Modes\n</known_taxonomy_name>"));
        assert!(prompt.contains("OffByOne"));
        assert!(prompt.contains("Important: Do not classify entire feedbacks"));
    }

    #[test]
    fn schema_pins_taxonomy_name_and_level1() {
        let taxonomy = make_taxonomy();
        let schema = classification_schema(&taxonomy);
        assert_eq!(
            schema["properties"]["taxonomy_name"]["enum"],
            json!(["Failure Modes"])
        );
        assert_eq!(
            schema["properties"]["classifications"]["items"]["properties"]["level1"]["enum"],
            json!(["Bugs", "Data"])
        );
    }

    #[tokio::test]
    async fn classify_concatenates_batch_results() {
        let taxonomy = make_taxonomy();
        let reply = json!({
            "taxonomy_name": "Failure Modes",
            "classifications": [
                {"issue": "loop bound", "node_id": "node0", "level1": "Bugs", "level2": "OffByOne"}
            ]
        });
        let client = Arc::new(MockCompletionClient::always_json(reply));
        let classifier = BatchClassifier::new(client, ClassifyConfig::new().with_batch_size(2));

        let output = classifier.classify(&items(5), &taxonomy).await;
        assert_eq!(output.total_batches, 3);
        assert_eq!(output.degraded_batches, 0);
        assert_eq!(output.file.taxonomy_name, "Failure Modes");
        // One entry per batch reply
        assert_eq!(output.file.classifications.len(), 3);
    }

    #[tokio::test]
    async fn failed_batches_degrade_to_empty() {
        let taxonomy = make_taxonomy();
        let client = Arc::new(MockCompletionClient::always_fail("timeout"));
        let classifier = BatchClassifier::new(client, ClassifyConfig::new().with_batch_size(2));

        let output = classifier.classify(&items(4), &taxonomy).await;
        assert_eq!(output.total_batches, 2);
        assert_eq!(output.degraded_batches, 2);
        assert!(output.file.classifications.is_empty());
        assert_eq!(output.file.taxonomy_name, "Failure Modes");
    }

    #[tokio::test]
    async fn unknown_level1_fails_at_the_boundary_and_degrades() {
        let taxonomy = make_taxonomy();
        let reply = json!({
            "taxonomy_name": "Failure Modes",
            "classifications": [
                {"issue": "slow", "node_id": "node0", "level1": "Perf", "level2": "Loops"}
            ]
        });
        let client = Arc::new(MockCompletionClient::always_json(reply));
        let classifier = BatchClassifier::new(client, ClassifyConfig::new());

        let output = classifier.classify(&items(1), &taxonomy).await;
        assert_eq!(output.degraded_batches, 1);
        assert!(output.file.classifications.is_empty());
    }

    #[tokio::test]
    async fn partial_failures_keep_successful_batches() {
        let taxonomy = make_taxonomy();
        let good = json!({
            "taxonomy_name": "Failure Modes",
            "classifications": [
                {"issue": "leak", "node_id": "node0", "level1": "Data", "level2": "Leakage"}
            ]
        });
        let client = Arc::new(MockCompletionClient::scripted(
            vec![
                MockReply::Json(good),
                MockReply::Fail("connection reset".into()),
            ],
            MockReply::Fail("unexpected extra call".into()),
        ));
        // Sequential so the scripted order maps to batch order
        let classifier = BatchClassifier::new(
            client,
            ClassifyConfig::new().with_batch_size(1).with_concurrency(1),
        );

        let output = classifier.classify(&items(2), &taxonomy).await;
        assert_eq!(output.total_batches, 2);
        assert_eq!(output.degraded_batches, 1);
        assert_eq!(output.file.classifications.len(), 1);
        assert_eq!(output.file.classifications[0].issue, "leak");
    }

    #[tokio::test]
    async fn empty_input_yields_empty_file() {
        let taxonomy = make_taxonomy();
        let client = Arc::new(MockCompletionClient::always_fail("never called"));
        let classifier = BatchClassifier::new(client.clone(), ClassifyConfig::new());

        let output = classifier.classify(&[], &taxonomy).await;
        assert_eq!(output.total_batches, 0);
        assert!(output.file.classifications.is_empty());
        assert!(client.calls().is_empty());
    }

    #[test]
    fn write_classification_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let file = TaxonomyFile {
            taxonomy_name: "Failure Modes".to_string(),
            classifications: vec![fma_core::ClassificationEntry::new(
                "loop bound",
                "node0",
                "Bugs",
                "OffByOne",
            )],
        };
        let path = write_classification(dir.path(), "taxonomy_classification.json", &file).unwrap();
        let raw = std::fs::read_to_string(path).unwrap();
        let reread: TaxonomyFile = serde_json::from_str(&raw).unwrap();
        assert_eq!(reread, file);
    }

    mod batching_laws {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn concatenation_reconstructs_input(
                data in proptest::collection::vec(any::<u16>(), 0..200),
                size in 1usize..20,
            ) {
                let batches = chunk_batches(&data, size);
                let expected_batches = data.len().div_ceil(size);
                prop_assert_eq!(batches.len(), expected_batches);

                if let Some(last) = batches.last() {
                    let expected_last = if data.len() % size == 0 { size } else { data.len() % size };
                    prop_assert_eq!(last.len(), expected_last);
                    for batch in &batches[..batches.len() - 1] {
                        prop_assert_eq!(batch.len(), size);
                    }
                }

                let rejoined: Vec<u16> = batches.into_iter().flatten().collect();
                prop_assert_eq!(rejoined, data);
            }
        }
    }
}
