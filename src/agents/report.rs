//! Report agent: model-written text laid out as a PDF with chart pages.

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::prompt::{self, PromptBuilder};
use super::{AgentsState, Artifact};
use crate::chart::ChartData;
use crate::error::AppError;
use crate::report::{ReportDocument, render_pdf};

pub const DEFAULT_TITLE: &str = "Data Analysis Report";
const NO_ANALYSIS: &str = "No dataset analysis was provided.";
const NO_CHARTS: &str = "none";

#[derive(Debug, Clone, Default)]
pub struct ReportRequest {
    pub request: String,
    pub title: Option<String>,
    /// Output of the analysis step, when one ran.
    pub analysis: Option<String>,
    pub chart_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportResult {
    pub title: String,
    pub chart_count: usize,
    #[serde(flatten)]
    pub artifact: Artifact,
}

pub struct ReportAgent;

impl ReportAgent {
    pub const NAME: &'static str = "report";

    pub async fn generate(state: &AgentsState, req: &ReportRequest) -> Result<ReportResult, AppError> {
        let title = req
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TITLE)
            .to_string();

        // Resolve charts up front so a bad id fails before the model call.
        let charts = load_charts(state, &req.chart_ids)?;
        let chart_lines = if charts.is_empty() {
            NO_CHARTS.to_string()
        } else {
            charts
                .iter()
                .map(|c| format!("- {} (x: {}, y: {})", c.title, c.x_label, c.y_label))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let content = PromptBuilder::new(&state.prompts_dir)
            .layer(prompt::REPORT)
            .var("title", title.as_str())
            .var("request", req.request.trim())
            .var("analysis", req.analysis.as_deref().map(str::trim).unwrap_or(NO_ANALYSIS))
            .var("charts", chart_lines)
            .build();

        let body = state.complete_via_llm(Self::NAME, &content).await?;

        let doc = ReportDocument { title: title.clone(), generated_at: Utc::now(), body, charts };
        let pdf = render_pdf(&doc);
        let id = state.store.save_report(&pdf)?;
        info!(report_id = %id, charts = doc.charts.len(), bytes = pdf.len(), "report generated");

        Ok(ReportResult { title, chart_count: doc.charts.len(), artifact: Artifact::report(id) })
    }
}

/// Redraw stored charts from their specs against their source datasets.
fn load_charts(state: &AgentsState, ids: &[String]) -> Result<Vec<ChartData>, AppError> {
    ids.iter()
        .map(|id| -> Result<ChartData, AppError> {
            let stored = state.store.load_chart(id)?;
            let dataset = state.load_dataset(&stored.dataset_id)?;
            Ok(stored.spec.resolve(&dataset)?)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::*;
    use crate::chart::{ChartKind, ChartSpec};
    use crate::chart::svg::render_svg;
    use crate::storage::StoredChart;

    #[tokio::test]
    async fn report_pdf_stored_with_chart_page() {
        let (_tmp, state) = dummy_state();
        let ds = state.import_dataset(SALES_CSV).unwrap();
        let spec = ChartSpec {
            kind: ChartKind::Bar,
            title: "Units by region".into(),
            x: "region".into(),
            y: Some("units".into()),
            aggregate: None,
            bins: None,
        };
        let svg = render_svg(&spec.resolve(&ds).unwrap());
        let chart_id = state
            .store
            .save_chart(&StoredChart { dataset_id: ds.id().to_string(), spec }, &svg)
            .unwrap();

        let req = ReportRequest {
            request: "quarterly report".into(),
            title: Some("Sales".into()),
            analysis: Some("North leads.".into()),
            chart_ids: vec![chart_id],
        };
        let result = ReportAgent::generate(&state, &req).await.unwrap();
        assert_eq!(result.title, "Sales");
        assert_eq!(result.chart_count, 1);
        assert!(result.artifact.file_name.ends_with(".pdf"));

        let pdf = state.store.read_report(&result.artifact.id).unwrap();
        let text = String::from_utf8_lossy(&pdf);
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.contains("(Figure 1: Units by region) Tj"));
        // The echoed prompt becomes the body, so the analysis text is in it.
        assert!(text.contains("North leads."));
    }

    #[tokio::test]
    async fn default_title_and_no_analysis() {
        let (_tmp, state) = dummy_state();
        let result = ReportAgent::generate(&state, &ReportRequest { request: "report".into(), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(result.title, DEFAULT_TITLE);
        let text = String::from_utf8_lossy(&state.store.read_report(&result.artifact.id).unwrap()).into_owned();
        assert!(text.contains(NO_ANALYSIS));
    }

    #[tokio::test]
    async fn unknown_chart_id_fails_before_model_call() {
        let (_tmp, state) = dummy_state();
        let req = ReportRequest { request: "report".into(), chart_ids: vec!["0190a5e4-0000-7000-8000-000000000000".into()], ..Default::default() };
        let err = ReportAgent::generate(&state, &req).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
