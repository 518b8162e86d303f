//! Shared state for the comms channels.
//!
//! Channels receive an `Arc<CommsState>` and only reach the agents through
//! the typed methods below.
//!
//! [`CommsState::report_event`] lets a running channel tell the comms manager
//! about lifecycle changes without a direct handle to it.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crate::agents::{
    AgentMessage, AgentRequest, AgentsState, AnalysisResult, ChartResult, CommunicationAgent, DataAnalysisAgent,
    ReportRequest, ReportResult, VisualizationAgent,
};
use crate::dataset::DatasetSummary;
use crate::error::AppError;

// ── Events ────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum CommsEvent {
    /// Channel has stopped (clean exit or EOF).
    ChannelShutdown { channel_id: String },
    /// A dataset was imported through the channel.
    DatasetImported { channel_id: String, dataset_id: String },
}

// ── State ─────────────────────────────────────────────────────────────────────

pub struct CommsState {
    agent: CommunicationAgent,
    event_tx: mpsc::Sender<CommsEvent>,
}

impl CommsState {
    pub fn new(agent: CommunicationAgent, event_tx: mpsc::Sender<CommsEvent>) -> Self {
        Self { agent, event_tx }
    }

    pub fn agents(&self) -> &Arc<AgentsState> {
        self.agent.state()
    }

    /// Route free text through intent detection. Never fails.
    pub async fn send_message(&self, channel_id: &str, req: AgentRequest) -> AgentMessage {
        tracing::debug!(%channel_id, text_len = req.text.len(), "message received");
        self.agent.dispatch(&req).await
    }

    /// Parse, store and profile an uploaded CSV.
    pub fn import_dataset(&self, channel_id: &str, bytes: &[u8]) -> Result<DatasetSummary, AppError> {
        let dataset = self.agents().import_dataset(bytes)?;
        self.report_event(CommsEvent::DatasetImported {
            channel_id: channel_id.to_string(),
            dataset_id: dataset.id().to_string(),
        });
        Ok(dataset.summary())
    }

    pub fn dataset_summary(&self, dataset_id: &str) -> Result<DatasetSummary, AppError> {
        Ok(self.agents().load_dataset(dataset_id)?.summary())
    }

    pub async fn analyze(&self, dataset_id: &str, request: &str) -> Result<AnalysisResult, AppError> {
        DataAnalysisAgent::analyze(self.agents(), dataset_id, request).await
    }

    pub async fn visualize(&self, dataset_id: &str, request: &str) -> Result<ChartResult, AppError> {
        VisualizationAgent::visualize(self.agents(), dataset_id, request).await
    }

    pub async fn report(&self, dataset_id: Option<&str>, req: ReportRequest) -> Result<ReportResult, AppError> {
        self.agent.report_with_analysis(dataset_id, req).await
    }

    pub fn chart_svg(&self, chart_id: &str) -> Result<Vec<u8>, AppError> {
        self.agents().store.read_chart_svg(chart_id)
    }

    pub fn report_pdf(&self, report_id: &str) -> Result<Vec<u8>, AppError> {
        self.agents().store.read_report(report_id)
    }

    /// Best-effort notification to the comms manager.
    pub fn report_event(&self, event: CommsEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("comms event dropped: {e}");
        }
    }
}
