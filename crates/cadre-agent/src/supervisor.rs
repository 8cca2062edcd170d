use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use cadre_core::config::ModelConfig;
use cadre_core::error::{CadreError, Result};
use cadre_core::traits::{DecisionMaker, LlmClient};
use cadre_core::types::{ChatMessage, Message, RouteRequest, ToolDefinition, WorkerProfile, FINISH};
use cadre_llm::collect_reply;

use crate::state::{ConversationState, Destination};

/// Name of the tool the LLM decision-maker answers through.
pub const ROUTE_TOOL: &str = "route";

/// The closed set of answers a routing decision may take: `FINISH` and
/// every configured worker name. Fixed when the graph is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSchema {
    options: Vec<String>,
}

impl RouteSchema {
    pub fn new<S: AsRef<str>>(workers: &[S]) -> Self {
        let mut options = Vec::with_capacity(workers.len() + 1);
        options.push(FINISH.to_string());
        options.extend(workers.iter().map(|w| w.as_ref().to_string()));
        Self { options }
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// The schema as a tool the model must call, with `next` restricted to
    /// the options.
    pub fn tool_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: ROUTE_TOOL.to_string(),
            description: "Select the agent that should act next, or FINISH when the request is answered."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "next": { "type": "string", "enum": self.options }
                },
                "required": ["next"]
            }),
        }
    }

    /// Validate a raw answer. Surrounding whitespace is ignored; case is not.
    pub fn parse(&self, raw: &str) -> Result<Destination> {
        let answer = raw.trim();
        if self.options.iter().any(|o| o == answer) {
            Ok(Destination::node(answer))
        } else {
            Err(CadreError::InvalidRoute {
                answer: answer.to_string(),
                allowed: self.options.clone(),
            })
        }
    }
}

/// Outcome of one supervisor step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Every worker is out of turns; the decision-maker was not consulted.
    Exhausted,
    Chosen(Destination),
    /// The decision-maker picked a worker with no turns left.
    Corrected { requested: String },
}

impl RouteDecision {
    pub fn destination(&self) -> Destination {
        match self {
            RouteDecision::Chosen(dest) => dest.clone(),
            RouteDecision::Exhausted | RouteDecision::Corrected { .. } => Destination::Finish,
        }
    }
}

/// The supervisor node.
pub struct SupervisorRouter {
    name: String,
    workers: Vec<WorkerProfile>,
    schema: RouteSchema,
    max_turns: usize,
    decider: Arc<dyn DecisionMaker>,
}

impl SupervisorRouter {
    pub fn new(
        name: impl Into<String>,
        workers: Vec<WorkerProfile>,
        max_turns: usize,
        decider: Arc<dyn DecisionMaker>,
    ) -> Self {
        let names: Vec<&str> = workers.iter().map(|w| w.name.as_str()).collect();
        let schema = RouteSchema::new(&names);
        Self {
            name: name.into(),
            workers,
            schema,
            max_turns,
            decider,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &RouteSchema {
        &self.schema
    }

    /// Workers that still have at least one turn left.
    pub fn eligible<'s>(&'s self, state: &ConversationState) -> Vec<&'s str> {
        self.workers
            .iter()
            .filter(|w| state.turn_count(&w.name) < self.max_turns)
            .map(|w| w.name.as_str())
            .collect()
    }

    pub async fn decide(&self, state: &ConversationState) -> Result<RouteDecision> {
        let eligible = self.eligible(state);
        if eligible.is_empty() {
            info!(supervisor = %self.name, "All workers exhausted, finishing");
            return Ok(RouteDecision::Exhausted);
        }
        debug!(supervisor = %self.name, eligible = ?eligible, "Consulting decision-maker");

        let raw = self
            .decider
            .decide(RouteRequest {
                history: &state.messages,
                options: self.schema.options(),
                workers: &self.workers,
            })
            .await?;
        let destination = self.schema.parse(&raw)?;

        match destination {
            Destination::Node(ref worker) if state.turn_count(worker) >= self.max_turns => {
                warn!(
                    supervisor = %self.name,
                    worker = %worker,
                    "Decision named an exhausted worker, finishing instead"
                );
                Ok(RouteDecision::Corrected {
                    requested: worker.clone(),
                })
            }
            dest => Ok(RouteDecision::Chosen(dest)),
        }
    }
}

/// Asks a chat model to pick the next worker.
///
/// The answer is constrained by a `route` tool whose `next` parameter is an
/// enum of the schema's options. A plain-text reply is still accepted and
/// parsed as a fallback for providers that ignore tools.
pub struct LlmDecisionMaker {
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
    prompt: String,
    route_tool: ToolDefinition,
}

impl LlmDecisionMaker {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: ModelConfig,
        prompt: impl Into<String>,
        schema: &RouteSchema,
    ) -> Self {
        Self {
            llm,
            model,
            prompt: prompt.into(),
            route_tool: schema.tool_definition(),
        }
    }

    fn build_messages(&self, request: &RouteRequest<'_>) -> Vec<ChatMessage> {
        let roster = request
            .workers
            .iter()
            .map(|w| format!("- {}: {}", w.name, w.description))
            .collect::<Vec<_>>()
            .join("\n");

        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ChatMessage::system(format!(
            "{}\n\nAvailable agents and their descriptions:\n{}",
            self.prompt, roster
        )));
        messages.extend(request.history.iter().map(Message::to_chat));
        messages.push(ChatMessage::system(format!(
            "Based on the conversation, who should act next? Choose one of: {:?}\n\
             Call the `{}` tool with your choice.",
            request.options, ROUTE_TOOL
        )));
        messages
    }
}

fn next_field(value: &serde_json::Value) -> Result<String> {
    value["next"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| CadreError::LlmParse("routing reply has no string 'next' field".into()))
}

/// Pull the chosen option out of a text reply.
///
/// Accepts `{"next": "..."}` (fenced, or surrounded by prose) or a bare
/// token.
pub(crate) fn extract_answer(text: &str) -> Result<String> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    // JSON may be wrapped in prose; take the outermost object
    if let Some(start) = unfenced.find('{') {
        let end = unfenced
            .rfind('}')
            .filter(|&end| end > start)
            .ok_or_else(|| CadreError::LlmParse("routing reply: unterminated JSON object".into()))?;
        let value: serde_json::Value = serde_json::from_str(&unfenced[start..=end])
            .map_err(|e| CadreError::LlmParse(format!("routing reply: {}", e)))?;
        return next_field(&value);
    }

    Ok(unfenced
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.' || c.is_whitespace())
        .to_string())
}

impl DecisionMaker for LlmDecisionMaker {
    fn decide<'a>(&'a self, request: RouteRequest<'a>) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let messages = self.build_messages(&request);
            let stream = self
                .llm
                .chat_stream(&self.model, messages, std::slice::from_ref(&self.route_tool))
                .await?;
            let reply = collect_reply(stream).await?;
            match reply.tool_calls.iter().find(|c| c.name == ROUTE_TOOL) {
                Some(call) => next_field(&call.input),
                None => {
                    debug!("Routing reply carried no tool call, parsing text");
                    extract_answer(&reply.text)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadre_test_utils::{ScriptedDecider, ScriptedLlm};

    fn profiles() -> Vec<WorkerProfile> {
        vec![
            WorkerProfile {
                name: "A".into(),
                description: "does a".into(),
            },
            WorkerProfile {
                name: "B".into(),
                description: "does b".into(),
            },
        ]
    }

    fn router(max_turns: usize, decider: &ScriptedDecider) -> SupervisorRouter {
        SupervisorRouter::new("Supervisor", profiles(), max_turns, Arc::new(decider.clone()))
    }

    #[test]
    fn test_schema_options_and_parse() {
        let schema = RouteSchema::new(&["A", "B"]);
        assert_eq!(schema.options(), &["FINISH", "A", "B"]);
        assert_eq!(schema.parse(" B\n").unwrap(), Destination::node("B"));
        assert_eq!(schema.parse("FINISH").unwrap(), Destination::Finish);

        let err = schema.parse("finish").unwrap_err();
        assert!(matches!(err, CadreError::InvalidRoute { .. }));
        assert!(schema.parse("C").is_err());
    }

    #[test]
    fn test_extract_answer_forms() {
        assert_eq!(extract_answer(r#"{"next": "A"}"#).unwrap(), "A");
        assert_eq!(extract_answer("```json\n{\"next\":\"FINISH\"}\n```").unwrap(), "FINISH");
        assert_eq!(extract_answer("  \"B\". ").unwrap(), "B");
        assert!(extract_answer(r#"{"choice": "A"}"#).is_err());
        assert!(extract_answer("{not json").is_err());
    }

    #[tokio::test]
    async fn test_exhausted_skips_decision_maker() {
        let decider = ScriptedDecider::new(vec!["A"]);
        let mut state = ConversationState::new();
        state.turn_counts.insert("A".into(), 2);
        state.turn_counts.insert("B".into(), 3);

        let decision = router(2, &decider).decide(&state).await.unwrap();
        assert_eq!(decision, RouteDecision::Exhausted);
        assert_eq!(decision.destination(), Destination::Finish);
        assert_eq!(decider.calls(), 0);
    }

    #[tokio::test]
    async fn test_menu_lists_every_worker_even_when_exhausted() {
        let decider = ScriptedDecider::new(vec!["A"]);
        let mut state = ConversationState::new();
        state.messages.push(Message::user("q"));
        state.turn_counts.insert("A".into(), 2);

        let decision = router(2, &decider).decide(&state).await.unwrap();
        assert_eq!(
            decision,
            RouteDecision::Corrected {
                requested: "A".into()
            }
        );
        assert_eq!(decision.destination(), Destination::Finish);

        let request = &decider.requests()[0];
        assert_eq!(request.workers, profiles());
        assert_eq!(request.options, vec!["FINISH", "A", "B"]);
        assert_eq!(request.history_len, 1);
    }

    #[tokio::test]
    async fn test_answer_outside_schema_fails_the_step() {
        let decider = ScriptedDecider::new(vec!["Nobody"]);
        let err = router(2, &decider)
            .decide(&ConversationState::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CadreError::InvalidRoute { ref answer, .. } if answer == "Nobody"));
    }

    #[test]
    fn test_extract_answer_tolerates_prose_around_json() {
        assert_eq!(
            extract_answer("Sure. {\"next\": \"A\"} Let me know if that helps.").unwrap(),
            "A"
        );
    }

    #[test]
    fn test_route_tool_restricts_next_to_options() {
        let tool = RouteSchema::new(&["A", "B"]).tool_definition();
        assert_eq!(tool.name, ROUTE_TOOL);
        assert_eq!(
            tool.input_schema["properties"]["next"]["enum"],
            serde_json::json!(["FINISH", "A", "B"])
        );
        assert_eq!(tool.input_schema["required"], serde_json::json!(["next"]));
    }

    #[tokio::test]
    async fn test_llm_decision_maker_answers_through_route_tool() {
        let llm = ScriptedLlm::new(vec![ScriptedLlm::tool_call(
            "call_1",
            ROUTE_TOOL,
            serde_json::json!({"next": "A"}),
        )]);
        let schema = RouteSchema::new(&["A", "B"]);
        let decider = LlmDecisionMaker::new(
            Arc::new(llm.clone()),
            ModelConfig::default(),
            "You are a supervisor.",
            &schema,
        );
        let history = vec![Message::user("help")];
        let workers = profiles();
        let answer = decider
            .decide(RouteRequest {
                history: &history,
                options: schema.options(),
                workers: &workers,
            })
            .await
            .unwrap();
        assert_eq!(answer, "A");

        let offered = &llm.tool_requests()[0];
        assert_eq!(offered.len(), 1);
        assert_eq!(offered[0].name, ROUTE_TOOL);
        assert_eq!(
            offered[0].input_schema["properties"]["next"]["enum"],
            serde_json::json!(["FINISH", "A", "B"])
        );
    }

    #[tokio::test]
    async fn test_llm_decision_maker_prompt_and_text_fallback() {
        let llm = ScriptedLlm::new(vec![ScriptedLlm::text(r#"{"next": "B"}"#)]);
        let options = RouteSchema::new(&["A", "B"]);
        let decider = LlmDecisionMaker::new(
            Arc::new(llm.clone()),
            ModelConfig::default(),
            "You are a supervisor.",
            &options,
        );
        let history = vec![Message::user("help")];
        let workers = profiles();
        let answer = decider
            .decide(RouteRequest {
                history: &history,
                options: options.options(),
                workers: &workers,
            })
            .await
            .unwrap();
        assert_eq!(answer, "B");

        let sent = &llm.requests()[0];
        assert_eq!(sent.len(), 3);
        let head = sent[0].text();
        assert!(head.starts_with("You are a supervisor."));
        assert!(head.contains("- A: does a\n- B: does b"));
        assert_eq!(sent[1].text(), "help");
        assert!(sent[2]
            .text()
            .contains(r#"Choose one of: ["FINISH", "A", "B"]"#));
    }
}
