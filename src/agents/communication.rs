//! Communication agent: detects the intent of a message and runs the matching
//! agent. Every outcome, including failures, comes back as an
//! [`AgentMessage`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::analysis::DataAnalysisAgent;
use super::intent::Intent;
use super::report::{ReportAgent, ReportRequest, ReportResult};
use super::visualization::VisualizationAgent;
use super::{AgentsState, Artifact};
use crate::error::AppError;

pub const UNKNOWN_INTENT_REPLY: &str = "Sorry, I couldn't understand your request. I can analyze a dataset \
     (\"analyze ...\"), create a chart (\"visualize ...\" or \"show me ...\"), or write a report (\"report ...\").";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentRequest {
    pub text: String,
    #[serde(default)]
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl AgentRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Default::default() }
    }

    pub fn with_dataset(mut self, dataset_id: Option<String>) -> Self {
        self.dataset_id = dataset_id;
        self
    }
}

/// Reply to one dispatched request. `ok = false` carries a readable reason.
#[derive(Debug, Clone, Serialize)]
pub struct AgentMessage {
    pub intent: Intent,
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
}

impl AgentMessage {
    fn success(intent: Intent, message: String, artifact: Option<Artifact>) -> Self {
        Self { intent, ok: true, message, artifact }
    }

    fn failure(intent: Intent, message: impl Into<String>) -> Self {
        Self { intent, ok: false, message: message.into(), artifact: None }
    }
}

#[derive(Clone)]
pub struct CommunicationAgent {
    state: Arc<AgentsState>,
}

impl CommunicationAgent {
    pub fn new(state: Arc<AgentsState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<AgentsState> {
        &self.state
    }

    /// Route `req` by intent. Never fails: errors become `ok = false`.
    pub async fn dispatch(&self, req: &AgentRequest) -> AgentMessage {
        let intent = Intent::detect(&req.text);
        info!(%intent, dataset_id = ?req.dataset_id, "dispatching request");

        let dataset_id = req.dataset_id.as_deref().map(str::trim).filter(|id| !id.is_empty());
        let result = match (intent, dataset_id) {
            (Intent::Unknown, _) => return AgentMessage::failure(intent, UNKNOWN_INTENT_REPLY),
            (Intent::Analyze | Intent::Visualize, None) => {
                return AgentMessage::failure(intent, missing_dataset_reply(intent));
            }
            (Intent::Analyze, Some(id)) => self.analyze(id, &req.text).await,
            (Intent::Visualize, Some(id)) => self.visualize(id, &req.text).await,
            (Intent::Report, id) => self.report(id, req).await,
        };

        match result {
            Ok((message, artifact)) => AgentMessage::success(intent, message, artifact),
            Err(e) => {
                warn!(%intent, error = %e, "agent failed");
                AgentMessage::failure(intent, format!("{intent} failed: {e}"))
            }
        }
    }

    async fn analyze(&self, dataset_id: &str, text: &str) -> Result<(String, Option<Artifact>), AppError> {
        let result = DataAnalysisAgent::analyze(&self.state, dataset_id, text).await?;
        Ok((result.insights, None))
    }

    async fn visualize(&self, dataset_id: &str, text: &str) -> Result<(String, Option<Artifact>), AppError> {
        let chart = VisualizationAgent::visualize(&self.state, dataset_id, text).await?;
        Ok((chart.describe(), Some(chart.artifact)))
    }

    async fn report(&self, dataset_id: Option<&str>, req: &AgentRequest) -> Result<(String, Option<Artifact>), AppError> {
        let request = ReportRequest { request: req.text.clone(), title: req.title.clone(), ..Default::default() };
        let report = self.report_with_analysis(dataset_id, request).await?;
        let message = format!("Generated report \"{}\". Saved as {}.", report.title, report.artifact.file_name);
        Ok((message, Some(report.artifact)))
    }

    /// Linear chain used for reports: with a dataset, the analysis runs first
    /// and its insights feed the report prompt.
    pub async fn report_with_analysis(
        &self,
        dataset_id: Option<&str>,
        mut req: ReportRequest,
    ) -> Result<ReportResult, AppError> {
        if let Some(id) = dataset_id {
            let analysis = DataAnalysisAgent::analyze(&self.state, id, &req.request).await?;
            req.analysis = Some(analysis.insights);
        }
        ReportAgent::generate(&self.state, &req).await
    }
}

fn missing_dataset_reply(intent: Intent) -> String {
    let action = match intent {
        Intent::Visualize => "visualize",
        _ => "analyze",
    };
    format!("Please upload a dataset (CSV) first, then ask me to {action} it.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::*;
    use crate::storage::ArtifactKind;

    fn agent() -> (tempfile::TempDir, CommunicationAgent) {
        let (tmp, state) = dummy_state();
        (tmp, CommunicationAgent::new(state))
    }

    #[tokio::test]
    async fn unknown_intent_is_polite_failure() {
        let (_tmp, agent) = agent();
        let msg = agent.dispatch(&AgentRequest::new("what's the weather?")).await;
        assert_eq!(msg.intent, Intent::Unknown);
        assert!(!msg.ok);
        assert_eq!(msg.message, UNKNOWN_INTENT_REPLY);
        assert!(msg.artifact.is_none());
    }

    #[tokio::test]
    async fn analysis_without_dataset_asks_for_upload() {
        let (_tmp, agent) = agent();
        let msg = agent.dispatch(&AgentRequest::new("Analyze my sales")).await;
        assert_eq!(msg.intent, Intent::Analyze);
        assert!(!msg.ok);
        assert!(msg.message.contains("upload a dataset"));

        let msg = agent.dispatch(&AgentRequest::new("show me sales").with_dataset(Some("  ".into()))).await;
        assert_eq!(msg.intent, Intent::Visualize);
        assert!(msg.message.contains("visualize it"));
    }

    #[tokio::test]
    async fn analysis_with_dataset_returns_insights() {
        let (_tmp, agent) = agent();
        let ds = agent.state().import_dataset(SALES_CSV).unwrap();
        let msg = agent
            .dispatch(&AgentRequest::new("analyze units").with_dataset(Some(ds.id().to_string())))
            .await;
        assert!(msg.ok, "{}", msg.message);
        assert!(msg.message.starts_with("[echo] "));
    }

    #[tokio::test]
    async fn agent_errors_become_failure_messages() {
        let (_tmp, agent) = agent();
        let msg = agent
            .dispatch(&AgentRequest::new("analyze").with_dataset(Some("../../etc/passwd".into())))
            .await;
        assert!(!msg.ok);
        assert!(msg.message.starts_with("Analyze Data failed: "));

        let ds = agent.state().import_dataset(SALES_CSV).unwrap();
        let msg = agent
            .dispatch(&AgentRequest::new("visualize units").with_dataset(Some(ds.id().to_string())))
            .await;
        assert!(!msg.ok);
        assert!(msg.message.contains("no JSON object"));
    }

    #[tokio::test]
    async fn report_chains_analysis_when_dataset_given() {
        let (_tmp, agent) = agent();
        let ds = agent.state().import_dataset(SALES_CSV).unwrap();
        let mut req = AgentRequest::new("monthly report").with_dataset(Some(ds.id().to_string()));
        req.title = Some("Monthly".into());
        let msg = agent.dispatch(&req).await;
        assert!(msg.ok, "{}", msg.message);
        let artifact = msg.artifact.expect("report artifact");
        assert_eq!(artifact.kind, ArtifactKind::Report);

        let pdf = agent.state().store.read_report(&artifact.id).unwrap();
        // Analysis prompt (echoed) nested inside the report prompt (echoed).
        assert!(String::from_utf8_lossy(&pdf).contains("(Column profile) Tj"));
    }

    #[tokio::test]
    async fn report_without_dataset_still_generates() {
        let (_tmp, agent) = agent();
        let msg = agent.dispatch(&AgentRequest::new("Report on nothing")).await;
        assert_eq!(msg.intent, Intent::Report);
        assert!(msg.ok);
        assert!(msg.message.starts_with("Generated report \"Data Analysis Report\""));
    }

    #[tokio::test]
    async fn message_serializes_with_label() {
        let (_tmp, agent) = agent();
        let msg = agent.dispatch(&AgentRequest::new("hello")).await;
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["intent"], "Unknown Intent");
        assert_eq!(json["ok"], false);
        assert!(json.get("artifact").is_none());
    }
}
