//! Multi-agent pipeline for Facebook Ads analysis.
//!
//! Each agent is a prompt template plus a thin function that formats inputs,
//! calls the LLM backend, and parses the response. The exception is the data
//! agent, which is pure local computation. The workflow calls them in a fixed
//! order:
//!
//! Planner -> Data -> Insight -> Evaluator -> (reflection, at most once) -> Creative

pub mod creative;
pub mod data;
pub mod evaluator;
pub mod insight;
pub mod planner;
pub mod workflow;

pub use creative::CreativeAgent;
pub use data::DataAgent;
pub use evaluator::EvaluatorAgent;
pub use insight::InsightAgent;
pub use planner::PlannerAgent;
pub use workflow::Workflow;
