//! Visualization agent: the model picks a chart, the renderer draws it.

use serde::Serialize;
use tracing::{info, warn};

use super::prompt::{self, PromptBuilder};
use super::{AgentsState, Artifact};
use crate::chart::ChartSpec;
use crate::chart::svg::render_svg;
use crate::error::AppError;
use crate::storage::StoredChart;

#[derive(Debug, Clone, Serialize)]
pub struct ChartResult {
    pub dataset_id: String,
    pub spec: ChartSpec,
    #[serde(flatten)]
    pub artifact: Artifact,
}

impl ChartResult {
    /// One-line description for chat replies.
    pub fn describe(&self) -> String {
        let axes = match &self.spec.y {
            Some(y) => format!("{} vs {}", y, self.spec.x),
            None => self.spec.x.clone(),
        };
        let kind = serde_json::to_value(self.spec.kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        format!(
            "Created {kind} chart \"{}\" ({axes}). Saved as {}.",
            self.spec.title, self.artifact.file_name
        )
    }
}

pub struct VisualizationAgent;

impl VisualizationAgent {
    pub const NAME: &'static str = "visualization";

    pub async fn visualize(state: &AgentsState, dataset_id: &str, request: &str) -> Result<ChartResult, AppError> {
        let dataset = state.load_dataset(dataset_id)?;
        let summary = dataset.summary();

        let content = PromptBuilder::new(&state.prompts_dir)
            .layer(prompt::VISUALIZATION)
            .var("request", request.trim())
            .var("columns", summary.column_listing())
            .build();

        let reply = state.complete_via_llm(Self::NAME, &content).await?;
        let mut spec = ChartSpec::from_model_reply(&reply).inspect_err(|e| {
            warn!(%dataset_id, error = %e, "model reply is not a chart spec");
        })?;
        let data = spec.resolve(&dataset)?;
        // Persist the title actually drawn so report pages match the SVG.
        spec.title = data.title.clone();

        let svg = render_svg(&data);
        let stored = StoredChart { dataset_id: dataset_id.to_string(), spec };
        let id = state.store.save_chart(&stored, &svg)?;
        info!(%dataset_id, chart_id = %id, kind = ?stored.spec.kind, "chart rendered");

        Ok(ChartResult { dataset_id: stored.dataset_id, spec: stored.spec, artifact: Artifact::chart(id) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::*;
    use crate::chart::{ChartError, ChartKind};

    #[tokio::test]
    async fn echo_reply_has_no_chart_spec() {
        let (_tmp, state) = dummy_state();
        let ds = state.import_dataset(SALES_CSV).unwrap();
        let err = VisualizationAgent::visualize(&state, ds.id(), "visualize units").await.unwrap_err();
        assert!(matches!(err, AppError::Chart(ChartError::NoJson)));
    }

    #[test]
    fn describe_mentions_axes_and_file() {
        let result = ChartResult {
            dataset_id: "d".into(),
            spec: ChartSpec {
                kind: ChartKind::Scatter,
                title: "Price vs units".into(),
                x: "price".into(),
                y: Some("units".into()),
                aggregate: None,
                bins: None,
            },
            artifact: Artifact::chart("abc".into()),
        };
        assert_eq!(result.describe(), "Created scatter chart \"Price vs units\" (units vs price). Saved as abc.svg.");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["kind"], "chart");
        assert_eq!(json["spec"]["kind"], "scatter");
    }
}
