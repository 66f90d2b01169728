//! Recall@k evaluation against a running recommendation API
//!
//! Ground truth is either a JSON array of `{query, relevant_urls}` rows or a
//! CSV file with a header and one `query,url` pair per row (first two
//! columns). Rows that share a query are merged. Each query is posted to
//! the API and scored by the share of its relevant URLs found in the top
//! `k` recommendations.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::crawler::StorageError;
use crate::crawler::storage::read_json;
use crate::error::Error as CrateError;
use crate::recommend::RecommendationResponse;

/// Default endpoint of a locally running server
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/recommend";

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Ground truth error: {0}")]
    Storage(#[from] StorageError),

    #[error("Ground truth CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<EvalError> for CrateError {
    fn from(err: EvalError) -> Self {
        CrateError::Evaluate(err.to_string())
    }
}

/// One row of the ground-truth file
#[derive(Debug, Clone, Deserialize)]
pub struct GroundTruthRow {
    pub query: String,
    #[serde(default)]
    pub relevant_urls: Vec<String>,
}

/// A query with every URL judged relevant for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundTruth {
    pub query: String,
    pub relevant: HashSet<String>,
}

/// Merge rows by trimmed query, keeping first-seen query order
pub fn merge_ground_truth(rows: Vec<GroundTruthRow>) -> Vec<GroundTruth> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<GroundTruth> = Vec::new();

    for row in rows {
        let query = row.query.trim().to_string();
        let urls = row
            .relevant_urls
            .into_iter()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        match positions.get(&query) {
            Some(&index) => merged[index].relevant.extend(urls),
            None => {
                positions.insert(query.clone(), merged.len());
                merged.push(GroundTruth {
                    query,
                    relevant: urls.collect(),
                });
            }
        }
    }

    merged
}

/// Parse `query,url` CSV rows; the header row is skipped and extra columns ignored
pub fn parse_ground_truth_csv(content: &str) -> Result<Vec<GroundTruthRow>, EvalError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let (Some(query), Some(url)) = (record.get(0), record.get(1)) else {
            warn!("Skipping ground-truth row with fewer than two columns");
            continue;
        };
        rows.push(GroundTruthRow {
            query: query.to_string(),
            relevant_urls: vec![url.to_string()],
        });
    }
    Ok(rows)
}

async fn read_ground_truth_csv(path: &Path) -> Result<Vec<GroundTruthRow>, EvalError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StorageError::NotFound(path.to_path_buf()).into());
        }
        Err(e) => return Err(StorageError::Io(e).into()),
    };
    parse_ground_truth_csv(&content)
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// Load and merge a ground-truth file, CSV when the extension says so, JSON otherwise
pub async fn load_ground_truth(path: &Path) -> Result<Vec<GroundTruth>, EvalError> {
    let rows: Vec<GroundTruthRow> = if is_csv(path) {
        read_ground_truth_csv(path).await?
    } else {
        read_json(path).await?
    };
    Ok(merge_ground_truth(rows))
}

/// Fraction of `relevant` found among the first `k` predictions
pub fn recall_at_k(predicted: &[String], relevant: &HashSet<String>, k: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    let top_k: HashSet<&String> = predicted.iter().take(k).collect();
    let found = top_k.iter().filter(|url| relevant.contains(**url)).count();
    found as f64 / relevant.len() as f64
}

/// Score of a single query
#[derive(Debug, Clone, Serialize)]
pub struct QueryScore {
    pub query: String,
    pub predicted: Vec<String>,
    pub recall: f64,
    /// Set when the API call failed and the query scored zero
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Scores of a whole evaluation run
#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub k: usize,
    pub queries: Vec<QueryScore>,
    pub mean_recall: f64,
}

impl EvalReport {
    fn new(k: usize, queries: Vec<QueryScore>) -> Self {
        let mean_recall = if queries.is_empty() {
            0.0
        } else {
            queries.iter().map(|q| q.recall).sum::<f64>() / queries.len() as f64
        };
        Self {
            k,
            queries,
            mean_recall,
        }
    }
}

/// Evaluation settings
#[derive(Debug, Clone)]
pub struct EvalConfig {
    pub api_url: String,
    pub k: usize,
    /// Pause between queries
    pub delay: Duration,
    pub timeout: Duration,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            k: 10,
            delay: Duration::from_secs(1),
            timeout: Duration::from_secs(120),
        }
    }
}

async fn fetch_predictions(
    client: &reqwest::Client,
    api_url: &str,
    query: &str,
) -> Result<Vec<String>, String> {
    let response = client
        .post(api_url)
        .json(&serde_json::json!({ "query": query }))
        .send()
        .await
        .map_err(|e| format!("connection failed: {}", e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("API error: {}", status));
    }

    let body: RecommendationResponse = response
        .json()
        .await
        .map_err(|e| format!("invalid response body: {}", e))?;

    Ok(body
        .recommended_assessments
        .into_iter()
        .map(|r| r.url.trim().to_string())
        .collect())
}

/// Post every query to the API and score the answers
#[instrument(skip(ground_truth, config), fields(queries = ground_truth.len(), k = config.k))]
pub async fn evaluate_api(
    ground_truth: &[GroundTruth],
    config: &EvalConfig,
) -> Result<EvalReport, EvalError> {
    let client = reqwest::Client::builder().timeout(config.timeout).build()?;
    let mut scores = Vec::with_capacity(ground_truth.len());

    for (i, truth) in ground_truth.iter().enumerate() {
        if i > 0 && !config.delay.is_zero() {
            tokio::time::sleep(config.delay).await;
        }
        info!("{}/{} Query: {}", i + 1, ground_truth.len(), truth.query);

        let score = match fetch_predictions(&client, &config.api_url, &truth.query).await {
            Ok(predicted) => {
                let recall = recall_at_k(&predicted, &truth.relevant, config.k);
                info!(
                    "Got {} predictions, Recall@{}: {:.2}",
                    predicted.len(),
                    config.k,
                    recall
                );
                QueryScore {
                    query: truth.query.clone(),
                    predicted,
                    recall,
                    error: None,
                }
            }
            Err(e) => {
                warn!("Query scored 0: {}", e);
                QueryScore {
                    query: truth.query.clone(),
                    predicted: Vec::new(),
                    recall: 0.0,
                    error: Some(e),
                }
            }
        };
        scores.push(score);
    }

    let report = EvalReport::new(config.k, scores);
    info!("Mean Recall@{}: {:.4}", report.k, report.mean_recall);
    Ok(report)
}
