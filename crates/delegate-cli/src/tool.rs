//! Tool-call dispatcher for the `subagent` and `subagent_status` tools.
//!
//! Arguments arrive as JSON text and results leave as JSON text; the
//! [`SubagentManager`] underneath only deals in plain strings.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use delegate_core::{StatusReport, SubagentError, SubagentManager, SubagentStatus};

/// Name of the spawning tool.
pub const SUBAGENT_TOOL: &str = "subagent";

/// Name of the status query tool.
pub const SUBAGENT_STATUS_TOOL: &str = "subagent_status";

/// A tool invocation requested by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// JSON object text.
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: &Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.to_string(),
        }
    }
}

/// Outcome of a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub success: bool,
    /// JSON object text.
    pub content: String,
}

impl ToolResult {
    fn new(call: &ToolCall, success: bool, content: &Value) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            success,
            content: content.to_string(),
        }
    }

    /// Parsed `content`.
    pub fn json(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.content)
    }
}

/// Schema advertised for a tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// Definitions of both subagent tools.
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: SUBAGENT_TOOL,
            description: "Spawn a background subagent process to execute a delegated task. \
                          The subagent runs with fresh context and cannot spawn additional \
                          subagents. Use subagent_status to collect its result.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "task": {
                        "type": "string",
                        "description": "Task description for the subagent to execute"
                    },
                    "context": {
                        "type": "string",
                        "description": "Optional context information to provide to the subagent"
                    }
                },
                "required": ["task"]
            }),
        },
        ToolDefinition {
            name: SUBAGENT_STATUS_TOOL,
            description: "Query the status of a subagent and retrieve its result once it has \
                          finished.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "subagent_id": {
                        "type": "string",
                        "description": "ID of the subagent to query status for"
                    },
                    "wait": {
                        "type": "boolean",
                        "description": "If true, block until the subagent completes (default: false)"
                    }
                },
                "required": ["subagent_id"]
            }),
        },
    ]
}

#[derive(Debug, Default, Deserialize)]
struct SpawnArgs {
    #[serde(default)]
    task: Option<String>,
    #[serde(default)]
    context: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusArgs {
    #[serde(default)]
    subagent_id: Option<String>,
    #[serde(default)]
    wait: bool,
}

/// Parse tool arguments; anything malformed counts as "no arguments".
fn parse_args<T: for<'de> Deserialize<'de> + Default>(call: &ToolCall) -> T {
    serde_json::from_str(&call.arguments).unwrap_or_else(|e| {
        debug!(tool = %call.name, error = %e, "Malformed tool arguments");
        T::default()
    })
}

/// Dispatches subagent tool calls to a manager.
#[derive(Debug)]
pub struct SubagentTools<'a> {
    manager: &'a mut SubagentManager,
}

impl<'a> SubagentTools<'a> {
    pub const fn new(manager: &'a mut SubagentManager) -> Self {
        Self { manager }
    }

    /// Execute one tool call.
    pub fn execute(&mut self, call: &ToolCall) -> ToolResult {
        match call.name.as_str() {
            SUBAGENT_TOOL => self.spawn(call),
            SUBAGENT_STATUS_TOOL => self.status(call),
            other => ToolResult::new(
                call,
                false,
                &json!({ "error": format!("Unknown tool: {other}") }),
            ),
        }
    }

    fn spawn(&mut self, call: &ToolCall) -> ToolResult {
        let args: SpawnArgs = parse_args(call);
        let task = args.task.unwrap_or_default();

        match self.manager.spawn(&task, args.context.as_deref()) {
            Ok(id) => ToolResult::new(
                call,
                true,
                &json!({
                    "subagent_id": id,
                    "status": SubagentStatus::Running,
                    "message": "Subagent spawned successfully",
                }),
            ),
            Err(e) => {
                let message = if e.is_refusal() {
                    e.to_string()
                } else {
                    format!("Failed to spawn subagent: {e}")
                };
                ToolResult::new(call, false, &json!({ "error": message }))
            }
        }
    }

    fn status(&mut self, call: &ToolCall) -> ToolResult {
        let args: StatusArgs = parse_args(call);
        let Some(id) = args.subagent_id.filter(|id| !id.is_empty()) else {
            return ToolResult::new(
                call,
                false,
                &json!({ "error": "subagent_id parameter is required" }),
            );
        };

        match self.manager.get_status(&id, args.wait) {
            Ok(report) => {
                let (success, content) = report_json(&report);
                ToolResult::new(call, success, &content)
            }
            Err(e @ SubagentError::NotFound { .. }) => {
                ToolResult::new(call, false, &json!({ "error": e.to_string() }))
            }
            Err(e) => ToolResult::new(
                call,
                false,
                &json!({ "error": format!("Failed to query subagent: {e}") }),
            ),
        }
    }
}

/// JSON body and success flag for a status report.
pub fn report_json(report: &StatusReport) -> (bool, Value) {
    match (report.status, &report.result, &report.error) {
        (SubagentStatus::Completed, Some(result), _) => {
            (true, json!({ "status": report.status, "result": result }))
        }
        (SubagentStatus::Failed | SubagentStatus::Timeout, _, Some(error)) => {
            (false, json!({ "status": report.status, "error": error }))
        }
        (SubagentStatus::Running, _, _) => (
            true,
            json!({ "status": report.status, "message": "Subagent is still running" }),
        ),
        (status, _, _) => (
            status == SubagentStatus::Completed,
            json!({ "status": status }),
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    fn error_of(result: &ToolResult) -> String {
        result.json().unwrap()["error"].as_str().unwrap().to_string()
    }

    #[test]
    fn definitions_name_both_tools_with_required_params() {
        let defs = definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "subagent");
        assert_eq!(defs[0].parameters["required"], json!(["task"]));
        assert_eq!(defs[1].name, "subagent_status");
        assert_eq!(defs[1].parameters["required"], json!(["subagent_id"]));
        assert_eq!(
            defs[1].parameters["properties"]["wait"]["type"],
            json!("boolean")
        );
    }

    #[test]
    fn spawn_without_task_is_refused() {
        let mut manager = SubagentManager::new(5, 10);
        let mut tools = SubagentTools::new(&mut manager);

        for args in ["{}", r#"{"task": ""}"#, "not json", r#"{"task": 7}"#] {
            let result = tools.execute(&call(SUBAGENT_TOOL, args));
            assert!(!result.success);
            assert_eq!(result.tool_call_id, "call_1");
            assert_eq!(error_of(&result), "Task parameter is required");
        }
        assert!(manager.is_empty());
    }

    #[test]
    fn spawn_inside_subagent_is_refused() {
        let mut manager = SubagentManager::new(5, 10);
        manager.set_subagent_process(true);
        let result =
            SubagentTools::new(&mut manager).execute(&call(SUBAGENT_TOOL, r#"{"task": "x"}"#));
        assert!(!result.success);
        assert_eq!(
            error_of(&result),
            "Subagents cannot spawn additional subagents"
        );
    }

    #[test]
    fn status_without_id_is_refused() {
        let mut manager = SubagentManager::new(5, 10);
        let mut tools = SubagentTools::new(&mut manager);
        for args in ["{}", r#"{"subagent_id": ""}"#, "[]"] {
            let result = tools.execute(&call(SUBAGENT_STATUS_TOOL, args));
            assert!(!result.success);
            assert_eq!(error_of(&result), "subagent_id parameter is required");
        }
    }

    #[test]
    fn status_of_unknown_id_is_not_found() {
        let mut manager = SubagentManager::new(5, 10);
        let result = SubagentTools::new(&mut manager).execute(&call(
            SUBAGENT_STATUS_TOOL,
            r#"{"subagent_id": "0123456789abcdef", "wait": true}"#,
        ));
        assert!(!result.success);
        assert_eq!(
            error_of(&result),
            "Subagent not found: 0123456789abcdef"
        );
    }

    #[test]
    fn unknown_tool_is_an_error() {
        let mut manager = SubagentManager::new(5, 10);
        let result = SubagentTools::new(&mut manager).execute(&call("bash", "{}"));
        assert!(!result.success);
        assert!(error_of(&result).contains("bash"));
    }

    #[test]
    fn report_json_shapes() {
        let completed = StatusReport {
            status: SubagentStatus::Completed,
            result: Some("done\n".to_string()),
            error: None,
        };
        assert_eq!(
            report_json(&completed),
            (true, json!({"status": "completed", "result": "done\n"}))
        );

        let timeout = StatusReport {
            status: SubagentStatus::Timeout,
            result: None,
            error: Some("Subagent execution timed out".to_string()),
        };
        assert_eq!(
            report_json(&timeout),
            (
                false,
                json!({"status": "timeout", "error": "Subagent execution timed out"})
            )
        );

        let running = StatusReport {
            status: SubagentStatus::Running,
            result: None,
            error: None,
        };
        assert_eq!(
            report_json(&running),
            (
                true,
                json!({"status": "running", "message": "Subagent is still running"})
            )
        );
    }
}
