//! Data analysis agent: local profile + sample rows, interpreted by the model.

use serde::Serialize;
use tracing::info;

use super::AgentsState;
use super::prompt::{self, PromptBuilder};
use crate::dataset::DatasetSummary;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub dataset_id: String,
    pub summary: DatasetSummary,
    pub insights: String,
}

pub struct DataAnalysisAgent;

impl DataAnalysisAgent {
    pub const NAME: &'static str = "analysis";

    pub async fn analyze(state: &AgentsState, dataset_id: &str, request: &str) -> Result<AnalysisResult, AppError> {
        let dataset = state.load_dataset(dataset_id)?;
        let summary = dataset.summary();
        let sample = dataset.sample_csv(state.sample_rows)?;

        let content = PromptBuilder::new(&state.prompts_dir)
            .layer(prompt::ANALYSIS)
            .var("request", request.trim())
            .var("summary", summary.render().trim_end())
            .var("sample", sample.trim_end())
            .build();

        let insights = state.complete_via_llm(Self::NAME, &content).await?;
        info!(%dataset_id, insights_len = insights.len(), "analysis complete");

        Ok(AnalysisResult { dataset_id: dataset_id.to_string(), summary, insights })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::*;

    #[tokio::test]
    async fn prompt_carries_profile_and_sample() {
        let (_tmp, state) = dummy_state();
        let ds = state.import_dataset(SALES_CSV).unwrap();
        let result = DataAnalysisAgent::analyze(&state, ds.id(), "analyze units by region").await.unwrap();

        assert_eq!(result.summary.rows, 4);
        // The echo provider returns the prompt, so its parts are visible.
        assert!(result.insights.starts_with("[echo] "));
        assert!(result.insights.contains("analyze units by region"));
        assert!(result.insights.contains("- units (numeric): count=4"));
        assert!(result.insights.contains("month,region,units,price\n2024-01,north,10,2.5"));
        assert!(!result.insights.contains("{{"));
    }

    #[tokio::test]
    async fn unknown_dataset_is_not_found() {
        let (_tmp, state) = dummy_state();
        let err = DataAnalysisAgent::analyze(&state, "00000000deadbeef", "analyze").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
