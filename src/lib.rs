//! Adsight: Multi-Agent Facebook Ads Analyst
//!
//! Sequential agent pipeline that turns an ad performance CSV and a natural
//! language question into validated insights, creative recommendations, and a
//! markdown report.
//!
//! ## Architecture
//!
//! - **Planner Agent**: Decomposes the query into an analysis plan
//! - **Data Agent**: Pure-Rust statistical summarization, no LLM
//! - **Insight Agent**: Hypothesis generation from the summary
//! - **Evaluator Agent**: Confidence validation with quantitative checks
//! - **Creative Agent**: New ad variants for low-CTR campaigns
//! - **Workflow**: Stage sequencing and the single reflection pass

pub mod agents;
pub mod config;
pub mod data;
pub mod llm;
pub mod report;
pub mod types;

// Re-export configuration
pub use config::{AnalystConfig, ConfigError};

// Re-export commonly used types
pub use types::{
    AdRecord, CreativeSet, DataSummary, Hypothesis, InsightSet, Plan, RunContext,
    ValidatedInsights,
};

// Re-export agents
pub use agents::{CreativeAgent, DataAgent, EvaluatorAgent, InsightAgent, PlannerAgent, Workflow};

// Re-export data loading
pub use data::{DataError, DataLoader, SAMPLE_DATASET};

// Re-export LLM backends
pub use llm::{LlmBackend, LlmError, OpenAiBackend, StaticBackend};

// Re-export report writer
pub use report::{ReportError, ReportPaths, ReportWriter};
