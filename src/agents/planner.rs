//! Planner agent - decomposes the user query into a structured task list.
//!
//! Models are unreliable about key names, so parsing goes through a
//! normalization pass that unwraps nested objects, accepts `steps`/`actions`
//! as aliases for `tasks`, and promotes bare strings to full task objects.
//! If nothing salvageable comes back after the bounded retries, a
//! deterministic intent-keyed fallback plan keeps the pipeline moving.

use crate::config::AnalystConfig;
use crate::llm::{call_and_parse, CompletionRequest, LlmBackend};
use crate::types::{Plan, PlanTask};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

const PLANNER_SYSTEM_PROMPT: &str = r#"You are a Facebook Ads strategic planner.

You MUST return a JSON object with this EXACT structure - do not change the key names:

{
  "query": "the user's question",
  "intent": "diagnose_drop",
  "tasks": [
    {
      "task_id": "T1",
      "description": "what to analyze",
      "data_requirements": ["column_name"],
      "expected_output": "expected result"
    }
  ],
  "success_criteria": "how to measure success"
}

CRITICAL: The array MUST be called "tasks" not "steps" or "actions".
Return ONLY this JSON structure. No markdown, no backticks, no extra text."#;

const PLANNER_USER_PROMPT: &str = r#"Create a plan for: {query}

Available dataset columns: {columns}

Return ONLY JSON, no other text."#;

/// Default column set assigned to tasks the model left incomplete.
const DEFAULT_REQUIREMENTS: [&str; 3] = ["spend", "revenue", "roas"];

pub struct PlannerAgent {
    backend: Arc<dyn LlmBackend>,
    config: Arc<AnalystConfig>,
}

impl PlannerAgent {
    pub fn new(backend: Arc<dyn LlmBackend>, config: Arc<AnalystConfig>) -> Self {
        Self { backend, config }
    }

    /// Create an analysis plan for the query. Never fails: parse failures
    /// degrade to the deterministic fallback plan.
    pub async fn create_plan(&self, query: &str) -> Plan {
        let request = CompletionRequest {
            system: PLANNER_SYSTEM_PROMPT.to_string(),
            user: PLANNER_USER_PROMPT
                .replace("{query}", query)
                .replace("{columns}", &self.config.data.required_columns.join(", ")),
            // Planning wants determinism, not creativity
            temperature: 0.1,
            max_tokens: self.config.model.max_tokens.min(1000),
        };

        let raw = call_and_parse::<Value>(
            self.backend.as_ref(),
            &request,
            self.config.agents.max_retries,
        )
        .await;

        match raw {
            Ok(value) => match normalize_plan(value, query) {
                Some(plan) => {
                    info!(tasks = plan.tasks.len(), intent = %plan.intent, "Plan created");
                    plan
                }
                None => {
                    warn!("Plan structure invalid after normalization, using fallback");
                    fallback_plan(query)
                }
            },
            Err(e) => {
                warn!(error = %e, "Planner LLM call failed, using fallback");
                fallback_plan(query)
            }
        }
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Coerce whatever the model returned into a valid [`Plan`], or give up.
fn normalize_plan(mut value: Value, query: &str) -> Option<Plan> {
    // Unwrap nested {"plan": {...}}
    if let Some(inner) = value.get_mut("plan").filter(|v| v.is_object()) {
        value = inner.take();
    }

    let obj = value.as_object_mut()?;

    // Accept "steps" / "actions" as aliases for "tasks"
    if !obj.contains_key("tasks") {
        for alias in ["steps", "actions"] {
            if let Some(alt) = obj.remove(alias) {
                obj.insert("tasks".to_string(), alt);
                break;
            }
        }
    }

    let raw_tasks = obj.remove("tasks")?;
    let tasks = normalize_tasks(raw_tasks)?;

    Some(Plan {
        query: obj
            .get("query")
            .and_then(Value::as_str)
            .unwrap_or(query)
            .to_string(),
        intent: obj
            .get("intent")
            .and_then(Value::as_str)
            .unwrap_or("general_analysis")
            .to_string(),
        tasks,
        success_criteria: obj
            .get("success_criteria")
            .and_then(Value::as_str)
            .unwrap_or("Complete analysis")
            .to_string(),
    })
}

/// Turn the raw tasks value into structured tasks, fixing what can be fixed.
fn normalize_tasks(raw: Value) -> Option<Vec<PlanTask>> {
    let items = raw.as_array()?;
    let mut tasks = Vec::new();

    for item in items {
        match item {
            // Bare string -> promote to a task
            Value::String(s) => tasks.push(default_task(tasks.len() + 1, s)),
            Value::Object(map) => {
                // Nested {"tasks": [...]} inside a step object -> flatten
                if let Some(nested) = map.get("tasks").and_then(Value::as_array) {
                    for n in nested {
                        match n {
                            Value::String(s) => tasks.push(default_task(tasks.len() + 1, s)),
                            Value::Object(_) => {
                                if let Some(t) = object_to_task(n, tasks.len() + 1) {
                                    tasks.push(t);
                                }
                            }
                            _ => {}
                        }
                    }
                } else if let Some(t) = object_to_task(item, tasks.len() + 1) {
                    tasks.push(t);
                }
            }
            _ => {}
        }
    }

    if tasks.is_empty() {
        None
    } else {
        Some(tasks)
    }
}

fn object_to_task(value: &Value, index: usize) -> Option<PlanTask> {
    let map = value.as_object()?;

    let description = map
        .get("description")
        .or_else(|| map.get("action"))
        .or_else(|| map.get("task"))
        .or_else(|| map.get("step"))
        .and_then(Value::as_str)
        .unwrap_or("Analysis task")
        .to_string();

    let data_requirements = map
        .get("data_requirements")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect::<Vec<_>>()
        })
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_REQUIREMENTS.iter().map(|s| (*s).to_string()).collect());

    Some(PlanTask {
        task_id: map
            .get("task_id")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| format!("T{index}")),
        description,
        data_requirements,
        expected_output: map
            .get("expected_output")
            .and_then(Value::as_str)
            .unwrap_or("Analysis results")
            .to_string(),
    })
}

fn default_task(index: usize, description: &str) -> PlanTask {
    PlanTask {
        task_id: format!("T{index}"),
        description: description.to_string(),
        data_requirements: DEFAULT_REQUIREMENTS.iter().map(|s| (*s).to_string()).collect(),
        expected_output: "Analysis results".to_string(),
    }
}

// ============================================================================
// Fallback
// ============================================================================

/// Deterministic plan keyed on query intent, used when the LLM output is
/// unusable.
fn fallback_plan(query: &str) -> Plan {
    let q = query.to_lowercase();

    let (intent, tasks) = if q.contains("drop") || q.contains("decline") || q.contains("decrease") {
        (
            "diagnose_drop",
            vec![
                task("T1", "Analyze ROAS trend over time", &["date", "roas", "spend", "revenue"], "Time-based ROAS pattern showing decline"),
                task("T2", "Identify underperforming campaigns", &["campaign_name", "roas", "ctr", "spend"], "List of campaigns with low ROAS"),
                task("T3", "Analyze creative performance", &["creative_type", "creative_message", "ctr", "roas"], "Creative types and messages causing decline"),
            ],
        )
    } else if q.contains("improve") || q.contains("increase") || q.contains("optimize") {
        (
            "optimize_performance",
            vec![
                task("T1", "Find top performing campaigns", &["campaign_name", "roas", "ctr", "spend"], "Best performing campaigns to scale"),
                task("T2", "Identify winning creative patterns", &["creative_type", "creative_message", "ctr"], "Creative elements that drive performance"),
            ],
        )
    } else {
        (
            "general_analysis",
            vec![
                task("T1", "Overall performance analysis", &["spend", "revenue", "roas", "ctr"], "Summary of key metrics"),
                task("T2", "Campaign comparison", &["campaign_name", "roas", "spend"], "Campaign performance breakdown"),
            ],
        )
    };

    Plan {
        query: query.to_string(),
        intent: intent.to_string(),
        tasks,
        success_criteria: format!("Provide actionable insights for: {query}"),
    }
}

fn task(id: &str, description: &str, requirements: &[&str], expected: &str) -> PlanTask {
    PlanTask {
        task_id: id.to_string(),
        description: description.to_string(),
        data_requirements: requirements.iter().map(|s| (*s).to_string()).collect(),
        expected_output: expected.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::StaticBackend;
    use serde_json::json;

    fn agent(responses: Vec<String>) -> PlannerAgent {
        PlannerAgent::new(
            Arc::new(StaticBackend::new(responses)),
            Arc::new(AnalystConfig::default()),
        )
    }

    #[test]
    fn test_normalize_unwraps_nested_plan() {
        let value = json!({
            "plan": {
                "intent": "diagnose_drop",
                "tasks": [{"task_id": "T1", "description": "Check ROAS trend"}]
            }
        });
        let plan = normalize_plan(value, "Why did ROAS drop?").unwrap();
        assert_eq!(plan.intent, "diagnose_drop");
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.query, "Why did ROAS drop?");
    }

    #[test]
    fn test_normalize_accepts_steps_alias() {
        let value = json!({"steps": ["Check trend", "Compare campaigns"]});
        let plan = normalize_plan(value, "q").unwrap();
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[0].task_id, "T1");
        assert_eq!(plan.tasks[1].description, "Compare campaigns");
    }

    #[test]
    fn test_normalize_flattens_nested_step_tasks() {
        let value = json!({
            "steps": [
                {"tasks": ["Analyze trend", {"description": "Compare creatives"}]}
            ]
        });
        let plan = normalize_plan(value, "q").unwrap();
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[1].description, "Compare creatives");
    }

    #[test]
    fn test_normalize_fills_missing_fields() {
        let value = json!({"tasks": [{"description": "Analyze"}]});
        let plan = normalize_plan(value, "q").unwrap();
        assert_eq!(plan.tasks[0].task_id, "T1");
        assert_eq!(plan.tasks[0].data_requirements, vec!["spend", "revenue", "roas"]);
        assert_eq!(plan.intent, "general_analysis");
    }

    #[test]
    fn test_normalize_rejects_empty_tasks() {
        assert!(normalize_plan(json!({"tasks": []}), "q").is_none());
        assert!(normalize_plan(json!({"intent": "x"}), "q").is_none());
    }

    #[test]
    fn test_fallback_plan_intents() {
        assert_eq!(fallback_plan("Why did ROAS drop?").intent, "diagnose_drop");
        assert_eq!(fallback_plan("How to improve CTR?").intent, "optimize_performance");
        assert_eq!(fallback_plan("Show me the data").intent, "general_analysis");
    }

    #[tokio::test]
    async fn test_create_plan_parses_valid_response() {
        let response = json!({
            "query": "Why did ROAS drop?",
            "intent": "diagnose_drop",
            "tasks": [{"task_id": "T1", "description": "Trend analysis",
                       "data_requirements": ["date", "roas"], "expected_output": "Trend"}],
            "success_criteria": "Root cause found"
        });
        let planner = agent(vec![response.to_string()]);
        let plan = planner.create_plan("Why did ROAS drop?").await;
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].data_requirements, vec!["date", "roas"]);
    }

    #[tokio::test]
    async fn test_create_plan_falls_back_after_retries() {
        // Default config allows 2 retries = 3 attempts; exhaust them all.
        let planner = agent(vec![
            "garbage".to_string(),
            "more garbage".to_string(),
            "still garbage".to_string(),
        ]);
        let plan = planner.create_plan("Why did performance decline?").await;
        assert_eq!(plan.intent, "diagnose_drop");
        assert!(!plan.tasks.is_empty());
    }
}
