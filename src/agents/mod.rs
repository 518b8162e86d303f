//! Agents: intent routing plus the analysis, visualization and report steps.
//!
//! Every agent follows the same shape: build a prompt from the templates in
//! `config/prompts/`, send it to the model through [`AgentsState`], and turn
//! the reply into a result (text, a stored chart, a stored PDF). The
//! [`communication::CommunicationAgent`] picks which one runs.

pub mod analysis;
pub mod communication;
pub mod intent;
pub mod prompt;
pub mod report;
pub mod visualization;

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::dataset::Dataset;
use crate::error::AppError;
use crate::llm::LlmProvider;
use crate::storage::{ArtifactKind, ArtifactStore, content_id};

pub use analysis::{AnalysisResult, DataAnalysisAgent};
pub use communication::{AgentMessage, AgentRequest, CommunicationAgent};
pub use intent::Intent;
pub use report::{ReportAgent, ReportRequest, ReportResult};
pub use visualization::{ChartResult, VisualizationAgent};

/// A stored chart or report, as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub id: String,
    pub file_name: String,
}

impl Artifact {
    pub fn chart(id: String) -> Self {
        Self { file_name: format!("{id}.svg"), kind: ArtifactKind::Chart, id }
    }

    pub fn report(id: String) -> Self {
        Self { file_name: format!("{id}.pdf"), kind: ArtifactKind::Report, id }
    }
}

/// Shared capabilities handed to every agent: the model, the artifact store
/// and the prompt/dataset settings.
#[derive(Debug)]
pub struct AgentsState {
    llm: LlmProvider,
    pub store: ArtifactStore,
    pub prompts_dir: PathBuf,
    pub sample_rows: usize,
    pub max_rows: usize,
}

impl AgentsState {
    pub fn new(config: &Config, llm: LlmProvider, store: ArtifactStore) -> Self {
        Self {
            llm,
            store,
            prompts_dir: config.agents.prompts_dir.clone(),
            sample_rows: config.agents.sample_rows,
            max_rows: config.agents.max_rows,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.llm.name()
    }

    /// Send `content` to the model with the persona as system prompt.
    pub async fn complete_via_llm(&self, agent: &str, content: &str) -> Result<String, AppError> {
        let system = prompt::persona(&self.prompts_dir);
        debug!(agent, prompt_len = content.len(), "forwarding prompt to llm");
        let reply = self.llm.complete(content, system.as_deref()).await?;
        if let Some(usage) = &reply.usage {
            info!(
                agent,
                provider = self.llm.name(),
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "llm usage"
            );
        }
        Ok(reply.text)
    }

    /// Parse and persist an uploaded CSV. Nothing is written unless it parses.
    pub fn import_dataset(&self, bytes: &[u8]) -> Result<Dataset, AppError> {
        let id = content_id(bytes);
        let dataset = Dataset::from_csv_bytes(id.clone(), bytes, self.max_rows)?;
        let stored = self.store.save_dataset(bytes)?;
        debug_assert_eq!(stored, id);
        info!(dataset_id = %id, rows = dataset.row_count(), columns = dataset.headers().len(), "dataset imported");
        Ok(dataset)
    }

    pub fn load_dataset(&self, id: &str) -> Result<Dataset, AppError> {
        self.store.load_dataset(id, self.max_rows)
    }
}
