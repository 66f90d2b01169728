//! # Recommendation Module
//!
//! The "generation" half of the pipeline: retrieves candidate products for a
//! job description, asks the completion model to pick and format the best
//! ones, and validates what comes back.
//!
//! `Recommender` is an explicit service object. Build it once at startup and
//! share it behind an `Arc`.

mod error;

pub use error::RecommendError;

use rig::{
    agent::AgentBuilder,
    completion::{AssistantContent, Completion, CompletionModel},
    embeddings::EmbeddingModel,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::index::Database;
use crate::model::Client;
use crate::search::{SearchOptions, prepare_context, search_products};

const PREAMBLE: &str = "You are an expert HR Recruitment consultant.";

/// One recommended assessment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Recommendation {
    /// URL of the assessment
    pub url: String,

    /// Name of the assessment
    pub name: String,

    /// 'Yes' or 'No'
    #[serde(with = "crate::crawler::yes_no", default)]
    #[schemars(with = "String")]
    pub adaptive_support: bool,

    /// Duration in minutes, null if unknown
    #[serde(default)]
    pub duration: Option<u32>,

    /// Brief description of the assessment
    #[serde(default)]
    pub description: String,

    /// 'Yes' or 'No'
    #[serde(with = "crate::crawler::yes_no", default)]
    #[schemars(with = "String")]
    pub remote_support: bool,

    /// List of test types (e.g. ['Knowledge & Skills', 'Ability & Aptitude'])
    #[serde(default)]
    pub test_type: Vec<String>,
}

/// Body returned by the recommendation endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RecommendationResponse {
    pub recommended_assessments: Vec<Recommendation>,
}

/// Retrieval and selection limits
#[derive(Debug, Clone)]
pub struct RecommenderOptions {
    /// Candidates retrieved from the index
    pub top_k: usize,

    /// Fewest recommendations the model is asked for
    pub min_results: usize,

    /// Most recommendations returned
    pub max_results: usize,
}

impl Default for RecommenderOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            min_results: 5,
            max_results: 10,
        }
    }
}

/// Rewrite legacy catalog URLs to their current location
pub fn normalize_url(url: &str) -> String {
    if url.contains("shl.com/products/") {
        url.replace("shl.com/products/", "shl.com/solutions/products/")
    } else {
        url.to_string()
    }
}

/// Slice from the first `{` to the last `}`, which skips code fences and chatter
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Parse model output into a non-empty, normalized recommendation list
pub fn parse_structured_output(text: &str, max_results: usize) -> Result<RecommendationResponse, RecommendError> {
    let json = extract_json_object(text)
        .ok_or_else(|| RecommendError::MalformedOutput("no JSON object in response".to_string()))?;

    let mut response: RecommendationResponse = serde_json::from_str(json)
        .map_err(|e| RecommendError::MalformedOutput(e.to_string()))?;

    if response.recommended_assessments.is_empty() {
        return Err(RecommendError::MalformedOutput(
            "recommended_assessments is empty".to_string(),
        ));
    }

    if response.recommended_assessments.len() > max_results {
        debug!(
            "Model returned {} recommendations, keeping {}",
            response.recommended_assessments.len(),
            max_results
        );
        response.recommended_assessments.truncate(max_results);
    }

    for recommendation in &mut response.recommended_assessments {
        recommendation.url = normalize_url(&recommendation.url);
    }

    Ok(response)
}

/// JSON schema of `RecommendationResponse`, embedded in the prompt
pub fn response_schema() -> String {
    let schema = schemars::schema_for!(RecommendationResponse);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// Retrieval-augmented recommender
pub struct Recommender<C, E>
where
    C: CompletionModel,
    E: EmbeddingModel,
{
    db: Database,
    client: Client<C, E>,
    options: RecommenderOptions,
}

impl<C, E> Recommender<C, E>
where
    C: CompletionModel,
    E: EmbeddingModel,
{
    pub fn new(db: Database, client: Client<C, E>, options: RecommenderOptions) -> Self {
        Self {
            db,
            client,
            options,
        }
    }

    pub fn options(&self) -> &RecommenderOptions {
        &self.options
    }

    /// Get the database reference
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Build the model prompt for `query` over the retrieved `context`
    pub fn build_prompt(&self, context: &str, query: &str) -> String {
        format!(
            "Your task is to recommend min {min} assessments from the provided context based on user's job description/query.\n\n\
             CONTEXT:\n{context}\n\
             USER REQUEST:\n{query}\n\n\
             INSTRUCTIONS:\n\
             1. Return only valid JSON matching this schema, with key \"recommended_assessments\" (list):\n{schema}\n\
             2. Fields: url, name, adaptive_support, description, duration, remote_support, test_type\n\
             3. Select minimum {min}, maximum {max} top matches.\n\
             4. Only recommend assessments that appear in the context.\n",
            min = self.options.min_results,
            max = self.options.max_results,
            context = context,
            query = query,
            schema = response_schema(),
        )
    }

    /// Recommend assessments for a job description or query
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn recommend(&self, query: &str) -> Result<RecommendationResponse, RecommendError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RecommendError::EmptyQuery);
        }

        let hits = search_products(
            &self.db,
            &self.client,
            query,
            &SearchOptions::with_limit(self.options.top_k),
        )
        .await?;
        info!("Retrieved {} candidate assessments", hits.len());

        let prompt = self.build_prompt(&prepare_context(&hits), query);
        let agent = AgentBuilder::new(self.client.completion().clone())
            .preamble(PREAMBLE)
            .build();

        let response = agent.completion(prompt, vec![]).await?.send().await?;

        let text = response
            .choice
            .iter()
            .filter_map(|content| match content {
                AssistantContent::Text(text) => Some(text.text.clone()),
                other => {
                    warn!(content = ?other, "Ignoring non-text model output");
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        parse_structured_output(&text, self.options.max_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::ProductRecord;
    use crate::model::mock_model::{MockCompletionModel, MockEmbeddingModel};
    use rig::embeddings::Embedding;
    use tempfile::tempdir;

    const DIMS: usize = 16;

    fn recommendation_json(url: &str) -> String {
        format!(
            r#"{{"url": "{}", "name": "Java 8 (New)", "adaptive_support": "No", "duration": 18,
                "description": "Java test", "remote_support": "Yes", "test_type": ["Knowledge & Skills"]}}"#,
            url
        )
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("https://www.shl.com/products/product-catalog/view/java-8-new/"),
            "https://www.shl.com/solutions/products/product-catalog/view/java-8-new/"
        );
        let normalized = "https://www.shl.com/solutions/products/product-catalog/view/x/";
        assert_eq!(normalize_url(normalized), normalized);
        assert_eq!(normalize_url("https://example.com/a"), "https://example.com/a");
    }

    #[test]
    fn test_extract_json_from_fenced_output() {
        let text = "Here you go:\n```json\n{\"recommended_assessments\": []}\n```\n";
        assert_eq!(
            extract_json_object(text),
            Some("{\"recommended_assessments\": []}")
        );
        assert_eq!(extract_json_object("no json"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn test_parse_structured_output() {
        let text = format!(
            "```json\n{{\"recommended_assessments\": [{}]}}\n```",
            recommendation_json("https://www.shl.com/products/product-catalog/view/java-8-new/")
        );

        let response = parse_structured_output(&text, 10).unwrap();
        let first = &response.recommended_assessments[0];

        assert_eq!(
            first.url,
            "https://www.shl.com/solutions/products/product-catalog/view/java-8-new/"
        );
        assert!(!first.adaptive_support);
        assert!(first.remote_support);
        assert_eq!(first.duration, Some(18));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["recommended_assessments"][0]["remote_support"], "Yes");
    }

    #[test]
    fn test_parse_rejects_empty_and_malformed() {
        assert!(matches!(
            parse_structured_output(r#"{"recommended_assessments": []}"#, 10),
            Err(RecommendError::MalformedOutput(_))
        ));
        assert!(matches!(
            parse_structured_output(r#"{"items": 3}"#, 10),
            Err(RecommendError::MalformedOutput(_))
        ));
        assert!(matches!(
            parse_structured_output("I cannot help with that.", 10),
            Err(RecommendError::MalformedOutput(_))
        ));
    }

    #[test]
    fn test_parse_caps_results() {
        let items: Vec<String> = (0..12)
            .map(|i| recommendation_json(&format!("https://example.com/{}", i)))
            .collect();
        let text = format!("{{\"recommended_assessments\": [{}]}}", items.join(","));

        let response = parse_structured_output(&text, 10).unwrap();
        assert_eq!(response.recommended_assessments.len(), 10);
    }

    #[test]
    fn test_schema_describes_flags_as_strings() {
        let schema: serde_json::Value = serde_json::from_str(&response_schema()).unwrap();
        let item = &schema["definitions"]["Recommendation"]["properties"];
        assert_eq!(item["adaptive_support"]["type"], "string");
        assert!(schema.to_string().contains("recommended_assessments"));
    }

    async fn recommender() -> (Recommender<MockCompletionModel, MockEmbeddingModel>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.db").to_string_lossy().to_string();
        let db = Database::new_from_path(&path, DIMS).await.unwrap();
        let embedder = MockEmbeddingModel::new(DIMS);

        let record = ProductRecord {
            name: "Java 8 (New)".to_string(),
            url: "https://www.shl.com/products/product-catalog/view/java-8-new/".to_string(),
            description: "Java test".to_string(),
            duration: Some(18),
            adaptive_support: false,
            remote_support: true,
            test_type: vec!["Knowledge & Skills".to_string()],
            job_levels: None,
            languages: None,
        };
        let embedding = Embedding {
            document: record.description.clone(),
            vec: embedder.vector_for(&record.description),
        };
        db.upsert_products(&[(record, embedding)]).await.unwrap();

        let client = Client::new(MockCompletionModel::new(), embedder);
        (
            Recommender::new(db, client, RecommenderOptions::default()),
            dir,
        )
    }

    #[tokio::test]
    async fn test_recommend_end_to_end() {
        let (recommender, _dir) = recommender().await;
        recommender
            .client
            .completion()
            .set_text_response(&format!(
                "```json\n{{\"recommended_assessments\": [{}]}}\n```",
                recommendation_json("https://www.shl.com/products/product-catalog/view/java-8-new/")
            ))
            .await;

        let response = recommender.recommend("Java developer").await.unwrap();

        assert_eq!(response.recommended_assessments.len(), 1);
        assert!(response.recommended_assessments[0].url.contains("/solutions/products/"));
        assert_eq!(recommender.client.completion().calls(), 1);
    }

    #[tokio::test]
    async fn test_recommend_rejects_empty_query() {
        let (recommender, _dir) = recommender().await;

        assert!(matches!(
            recommender.recommend("  ").await,
            Err(RecommendError::EmptyQuery)
        ));
        assert_eq!(recommender.client.completion().calls(), 0);
    }

    #[tokio::test]
    async fn test_recommend_surfaces_model_failures() {
        let (recommender, _dir) = recommender().await;
        recommender.client.completion().set_text_response("Sorry, no idea.").await;
        assert!(matches!(
            recommender.recommend("Java developer").await,
            Err(RecommendError::MalformedOutput(_))
        ));

        recommender.client.completion().set_error("quota exceeded").await;
        assert!(matches!(
            recommender.recommend("Java developer").await,
            Err(RecommendError::Completion(_))
        ));
    }

    #[tokio::test]
    async fn test_prompt_contains_context_and_limits() {
        let (recommender, _dir) = recommender().await;

        let prompt = recommender.build_prompt("URL: https://x/view/a/\n", "Java developer");

        assert!(prompt.contains("URL: https://x/view/a/"));
        assert!(prompt.contains("USER REQUEST:\nJava developer"));
        assert!(prompt.contains("minimum 5, maximum 10"));
        assert!(prompt.contains("recommended_assessments"));
    }
}
