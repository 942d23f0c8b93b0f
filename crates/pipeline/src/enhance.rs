//! Optional LLM synthesis. Runs after a complete run; its output is stored beside the
//! decisions and never alters them.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lore_protocol::DecisionRecord;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

#[async_trait]
pub trait Synthesizer: Send + Sync {
    fn model(&self) -> &str;

    /// Short prose summary of one decision.
    async fn synthesize(&self, record: &DecisionRecord) -> Result<String>;
}

#[async_trait]
impl<T: Synthesizer + ?Sized> Synthesizer for &T {
    fn model(&self) -> &str {
        (**self).model()
    }

    async fn synthesize(&self, record: &DecisionRecord) -> Result<String> {
        (**self).synthesize(record).await
    }
}

/// Ollama-compatible `/api/generate` client.
pub struct OllamaSynthesizer {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaSynthesizer {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
        }
    }
}

fn prompt_for(record: &DecisionRecord) -> String {
    let decision = &record.decision;
    let mut prompt = format!(
        "Summarise this architectural decision in two sentences for a new team member.\n\nTitle: {}\nContext: {}\nDecision: {}\n",
        decision.title, decision.context, decision.decision_text
    );
    if !decision.alternatives.is_empty() {
        prompt.push_str(&format!("Alternatives: {}\n", decision.alternatives.join("; ")));
    }
    prompt
}

#[async_trait]
impl Synthesizer for OllamaSynthesizer {
    fn model(&self) -> &str {
        &self.model
    }

    async fn synthesize(&self, record: &DecisionRecord) -> Result<String> {
        let body = json!({
            "model": self.model,
            "prompt": prompt_for(record),
            "stream": false,
        });
        let url = format!("{}/api/generate", self.endpoint.trim_end_matches('/'));
        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?
            .error_for_status()?;
        let value: serde_json::Value = res.json().await?;
        let text = value
            .get("response")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if text.is_empty() {
            bail!("empty response from {url}");
        }
        Ok(text.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synthesis {
    pub decision_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnhancementOutcome {
    Synthesized(Vec<Synthesis>),
    Degraded { reason: String },
}

impl EnhancementOutcome {
    pub fn describe(&self) -> String {
        match self {
            Self::Synthesized(items) => format!("synthesized {} decision summaries", items.len()),
            Self::Degraded { reason } => format!("degraded: {reason}"),
        }
    }
}

/// `references/llm-synthesis.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisArtifact {
    pub generated_at: DateTime<Utc>,
    pub model: String,
    pub syntheses: Vec<Synthesis>,
}

/// Time-boxed wrapper around a [`Synthesizer`]. All-or-nothing: any error or the
/// deadline discards the whole batch.
pub struct Enhancer<S> {
    synthesizer: S,
    timeout: Duration,
    max_decisions: usize,
}

impl<S: Synthesizer> Enhancer<S> {
    pub fn new(synthesizer: S, timeout: Duration, max_decisions: usize) -> Self {
        Self {
            synthesizer,
            timeout,
            max_decisions,
        }
    }

    pub fn model(&self) -> &str {
        self.synthesizer.model()
    }

    pub async fn enhance(&self, records: &[DecisionRecord]) -> EnhancementOutcome {
        let batch = async {
            let mut syntheses = Vec::new();
            for record in records.iter().take(self.max_decisions) {
                let text = self
                    .synthesizer
                    .synthesize(record)
                    .await
                    .with_context(|| format!("synthesis of {} failed", record.id()))?;
                syntheses.push(Synthesis {
                    decision_id: record.id().to_string(),
                    text,
                });
            }
            Ok::<_, anyhow::Error>(syntheses)
        };

        match tokio::time::timeout(self.timeout, batch).await {
            Ok(Ok(syntheses)) => {
                log::info!("LLM synthesis produced {} summaries", syntheses.len());
                EnhancementOutcome::Synthesized(syntheses)
            }
            Ok(Err(err)) => {
                log::warn!("LLM synthesis failed; keeping pattern-based result: {err:#}");
                EnhancementOutcome::Degraded {
                    reason: format!("{err:#}"),
                }
            }
            Err(_) => {
                log::warn!(
                    "LLM synthesis timed out after {} ms; keeping pattern-based result",
                    self.timeout.as_millis()
                );
                EnhancementOutcome::Degraded {
                    reason: format!("timed out after {} ms", self.timeout.as_millis()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lore_protocol::{Decision, DecisionSource};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Mode {
        Echo,
        FailOn(&'static str),
        Hang,
    }

    struct Fake {
        mode: Mode,
        calls: AtomicUsize,
    }

    impl Fake {
        fn new(mode: Mode) -> Self {
            Self {
                mode,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Synthesizer for Fake {
        fn model(&self) -> &str {
            "fake"
        }

        async fn synthesize(&self, record: &DecisionRecord) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                Mode::Echo => Ok(format!("about {}", record.decision.title)),
                Mode::FailOn(id) if record.id() == id => bail!("model unavailable"),
                Mode::FailOn(_) => Ok("ok".to_string()),
                Mode::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok("late".to_string())
                }
            }
        }
    }

    fn records(ids: &[&str]) -> Vec<DecisionRecord> {
        ids.iter()
            .map(|id| DecisionRecord {
                decision: Decision::new(*id, format!("title {id}"), DecisionSource::Existing),
                supplement: None,
            })
            .collect()
    }

    #[tokio::test]
    async fn synthesizes_up_to_the_limit() {
        let enhancer = Enhancer::new(Fake::new(Mode::Echo), Duration::from_secs(5), 2);
        let outcome = enhancer.enhance(&records(&["A", "B", "C"])).await;
        assert_eq!(
            outcome,
            EnhancementOutcome::Synthesized(vec![
                Synthesis {
                    decision_id: "A".to_string(),
                    text: "about title A".to_string()
                },
                Synthesis {
                    decision_id: "B".to_string(),
                    text: "about title B".to_string()
                },
            ])
        );
        assert_eq!(enhancer.synthesizer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn any_failure_discards_the_batch() {
        let enhancer = Enhancer::new(Fake::new(Mode::FailOn("B")), Duration::from_secs(5), 10);
        let input = records(&["A", "B", "C"]);
        let before = input.clone();
        let outcome = enhancer.enhance(&input).await;
        match outcome {
            EnhancementOutcome::Degraded { reason } => {
                assert!(reason.contains("synthesis of B failed"), "{reason}");
                assert!(reason.contains("model unavailable"), "{reason}");
            }
            other => panic!("expected degraded outcome, got {other:?}"),
        }
        assert_eq!(input, before);
    }

    #[tokio::test]
    async fn slow_backends_time_out() {
        let enhancer = Enhancer::new(Fake::new(Mode::Hang), Duration::from_millis(20), 10);
        let outcome = enhancer.enhance(&records(&["A"])).await;
        assert_eq!(
            outcome,
            EnhancementOutcome::Degraded {
                reason: "timed out after 20 ms".to_string()
            }
        );
    }

    #[test]
    fn prompt_mentions_the_decision() {
        let mut record = records(&["ADR-0001"]).remove(0);
        record.decision.alternatives = vec!["MySQL".to_string()];
        let prompt = prompt_for(&record);
        assert!(prompt.contains("Title: title ADR-0001"));
        assert!(prompt.contains("Alternatives: MySQL"));
    }
}
