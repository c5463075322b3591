//! Sentiment analysis of short texts.
//!
//! A binary POSITIVE/NEGATIVE classifier behind [`SentimentClassifier`],
//! the per-process analysis history, and a terminal bar chart of the two
//! class probabilities. The only backend is the Hugging Face Inference API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{Config, SentimentConfig};
use crate::error::{DocChatError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentimentLabel {
    Positive,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "POSITIVE",
            SentimentLabel::Negative => "NEGATIVE",
        }
    }

    pub fn heart(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "❤️",
            SentimentLabel::Negative => "💔",
        }
    }
}

impl std::str::FromStr for SentimentLabel {
    type Err = DocChatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "POSITIVE" => Ok(SentimentLabel::Positive),
            "NEGATIVE" => Ok(SentimentLabel::Negative),
            other => Err(DocChatError::Sentiment(format!("unknown label '{}'", other))),
        }
    }
}

/// Top label and its probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SentimentResult {
    pub label: SentimentLabel,
    pub score: f32,
}

#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<SentimentResult>;
}

pub struct HuggingFaceClassifier {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HuggingFaceClassifier {
    pub fn new(config: &SentimentConfig, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: format!(
                "{}/models/{}",
                config.url.trim_end_matches('/'),
                config.model
            ),
            api_key,
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f32,
}

/// The API answers `[[{label, score}, ...]]` for a single input; some
/// deployments drop the outer list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassifyResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

fn top_label(response: ClassifyResponse) -> Result<SentimentResult> {
    let scores = match response {
        ClassifyResponse::Nested(outer) => outer.into_iter().next().unwrap_or_default(),
        ClassifyResponse::Flat(scores) => scores,
    };
    let best = scores
        .into_iter()
        .max_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .ok_or_else(|| DocChatError::Sentiment("empty classification".to_string()))?;

    Ok(SentimentResult {
        label: best.label.parse()?,
        score: best.score,
    })
}

#[async_trait]
impl SentimentClassifier for HuggingFaceClassifier {
    async fn classify(&self, text: &str) -> Result<SentimentResult> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "inputs": text }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DocChatError::Sentiment(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DocChatError::Sentiment(format!(
                "inference API returned {}: {}",
                status, body
            )));
        }

        let parsed: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| DocChatError::Sentiment(e.to_string()))?;
        top_label(parsed)
    }
}

pub fn create_classifier(config: &SentimentConfig) -> anyhow::Result<Box<dyn SentimentClassifier>> {
    match config.provider.as_str() {
        "huggingface" => {
            let api_key = std::env::var(&config.api_key_env).ok();
            if api_key.is_none() {
                tracing::warn!(
                    env = %config.api_key_env,
                    "no Hugging Face token set; calling the inference API anonymously"
                );
            }
            Ok(Box::new(HuggingFaceClassifier::new(config, api_key)?))
        }
        "disabled" => anyhow::bail!(
            "Sentiment provider is disabled. Set [sentiment] provider = \"huggingface\" in config."
        ),
        other => anyhow::bail!("Unknown sentiment provider: {}", other),
    }
}

/// Probability of each class, derived from the top label alone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SentimentScores {
    pub positive: f32,
    pub negative: f32,
}

impl SentimentScores {
    pub fn from_result(result: &SentimentResult) -> Self {
        match result.label {
            SentimentLabel::Positive => Self {
                positive: result.score,
                negative: 1.0 - result.score,
            },
            SentimentLabel::Negative => Self {
                positive: 1.0 - result.score,
                negative: result.score,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentRecord {
    pub text: String,
    pub sentiment: SentimentLabel,
    pub score: f32,
}

/// Analyses so far, oldest first, and the latest label.
#[derive(Debug, Clone, Serialize)]
pub struct SentimentHistory {
    records: Vec<SentimentRecord>,
    current: SentimentLabel,
}

impl Default for SentimentHistory {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            current: SentimentLabel::Positive,
        }
    }
}

impl SentimentHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, text: &str, result: &SentimentResult) {
        self.records.push(SentimentRecord {
            text: text.to_string(),
            sentiment: result.label,
            score: result.score,
        });
        self.current = result.label;
    }

    pub fn records(&self) -> &[SentimentRecord] {
        &self.records
    }

    pub fn current(&self) -> SentimentLabel {
        self.current
    }

    pub fn heart(&self) -> &'static str {
        self.current.heart()
    }
}

/// Two-row bar chart, `width` cells per bar.
pub fn render_scores(scores: &SentimentScores, width: usize) -> String {
    let mut out = String::new();
    for (label, value) in [
        (SentimentLabel::Positive, scores.positive),
        (SentimentLabel::Negative, scores.negative),
    ] {
        let filled = ((value.clamp(0.0, 1.0) * width as f32).round() as usize).min(width);
        out.push_str(&format!(
            "{:<8} |{}{}| {:.4}\n",
            label.as_str(),
            "█".repeat(filled),
            " ".repeat(width - filled),
            value
        ));
    }
    out
}

/// `docchat sentiment <text>`: classify once and print the chart.
pub async fn run_sentiment(config: &Config, text: &str) -> anyhow::Result<()> {
    if text.trim().is_empty() {
        anyhow::bail!("text must not be empty");
    }
    let classifier = create_classifier(&config.sentiment)?;
    let result = classifier.classify(text).await?;

    let mut history = SentimentHistory::new();
    history.record(text, &result);

    println!("{} {} ({:.4})", history.heart(), result.label.as_str(), result.score);
    print!("{}", render_scores(&SentimentScores::from_result(&result), 40));
    Ok(())
}
