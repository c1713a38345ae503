//! Termination strategies: deciding when the group chat should stop
//!
//! Two-tier decision, cheapest check first: a keyword heuristic over the most
//! recent reply, then an optional model-judged verdict over a short trailing
//! window. A strategy is consulted after every produced reply and must never
//! fail — an undecidable verdict defaults to "continue", and a judge outage
//! falls back to the keyword heuristic rather than surfacing.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use futures::future::BoxFuture;
use tower::{util::BoxCloneService, BoxError, Service, ServiceExt};
use tracing::{debug, warn};

use crate::config::GroupChatConfig;
use crate::history::{ConversationTurn, Role, SharedHistory};

/// Per-reply stop decision. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationVerdict {
    pub should_stop: bool,
    pub reason: String,
}

impl TerminationVerdict {
    pub fn stop(reason: impl Into<String>) -> Self {
        Self {
            should_stop: true,
            reason: reason.into(),
        }
    }

    pub fn proceed() -> Self {
        Self {
            should_stop: false,
            reason: String::new(),
        }
    }
}

/// Strategy consulted by the engine after every reply.
///
/// Infallible by contract: implementations recover internally and return a
/// verdict in all cases.
#[async_trait]
pub trait TerminationStrategy: Send + Sync {
    async fn should_terminate(&self, history: &SharedHistory) -> TerminationVerdict;
}

/// Fixed completion markers scanned (lowercased) in the most recent reply.
const COMPLETION_MARKERS: &[&str] = &[
    "completed",
    "done",
    "no todos found",
    "no action items",
    "approved",
];

/// Tier-1 heuristic: scan the latest reply for completion markers.
#[derive(Debug, Clone)]
pub struct KeywordTermination {
    markers: Vec<String>,
}

impl Default for KeywordTermination {
    fn default() -> Self {
        Self {
            markers: COMPLETION_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl KeywordTermination {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }

    fn matching_marker(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.markers
            .iter()
            .find(|m| lowered.contains(m.as_str()))
            .map(|m| m.as_str())
    }

    /// Scan a trailing window of turns; used as the judge fallback.
    fn scan_window(&self, turns: &[ConversationTurn]) -> Option<TerminationVerdict> {
        for turn in turns.iter().rev() {
            if let Some(marker) = self.matching_marker(&turn.text) {
                return Some(TerminationVerdict::stop(format!(
                    "completion marker '{}' observed",
                    marker
                )));
            }
        }
        None
    }
}

#[async_trait]
impl TerminationStrategy for KeywordTermination {
    async fn should_terminate(&self, history: &SharedHistory) -> TerminationVerdict {
        // Never stop before at least one reply exists.
        let Some(last) = history.last() else {
            return TerminationVerdict::proceed();
        };
        match self.matching_marker(&last.text) {
            Some(marker) => {
                debug!(marker, "keyword heuristic signalled stop");
                TerminationVerdict::stop(format!("completion marker '{}' observed", marker))
            }
            None => TerminationVerdict::proceed(),
        }
    }
}

/// One turn of a judge query, rendered from the trailing history window.
#[derive(Debug, Clone)]
pub struct JudgeTurn {
    pub role: Role,
    pub text: String,
}

/// A single constrained-length, low-temperature completion request whose sole
/// purpose is a binary completion verdict.
#[derive(Debug, Clone)]
pub struct JudgeQuery {
    pub turns: Vec<JudgeTurn>,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

/// Boxed judge service seam; tests inject scripted judges.
pub type JudgeSvc = BoxCloneService<JudgeQuery, String, BoxError>;

/// Tier-2 strategy: keyword heuristic first, then a model-judged yes/no
/// verdict over the last few turns. Judge failures fall back to the keyword
/// heuristic over the same trailing window; this strategy never errors.
pub struct JudgedTermination {
    keywords: KeywordTermination,
    // BoxCloneService is Send but not Sync; the mutex exists only so the
    // strategy itself can be shared. Held just long enough to clone.
    judge: Mutex<JudgeSvc>,
    task_description: String,
    window: usize,
}

impl JudgedTermination {
    pub fn new(judge: JudgeSvc, task_description: impl Into<String>) -> Self {
        Self {
            keywords: KeywordTermination::default(),
            judge: Mutex::new(judge),
            task_description: task_description.into(),
            window: 4,
        }
    }

    /// Like [`JudgedTermination::new`], with the judge window taken from the
    /// run configuration.
    pub fn with_config(
        judge: JudgeSvc,
        task_description: impl Into<String>,
        config: &GroupChatConfig,
    ) -> Self {
        Self::new(judge, task_description).window(config.judge_window)
    }

    /// Number of trailing turns included in the judge prompt (3–5 is
    /// sensible; default 4).
    pub fn window(mut self, n: usize) -> Self {
        self.window = n;
        self
    }

    fn build_query(&self, history: &SharedHistory) -> JudgeQuery {
        let mut turns = Vec::with_capacity(self.window + 2);
        turns.push(JudgeTurn {
            role: Role::System,
            text: format!(
                "You are judging whether a multi-agent workflow has finished. Task: {}",
                self.task_description
            ),
        });
        for turn in history.tail(self.window) {
            turns.push(JudgeTurn {
                role: turn.role,
                text: turn.render(),
            });
        }
        turns.push(JudgeTurn {
            role: Role::User,
            text: "Has the task above been fully completed? Answer yes or no.".to_string(),
        });
        JudgeQuery {
            turns,
            max_output_tokens: 10,
            temperature: 0.1,
        }
    }
}

#[async_trait]
impl TerminationStrategy for JudgedTermination {
    async fn should_terminate(&self, history: &SharedHistory) -> TerminationVerdict {
        // Tier 1: a marker match bypasses the judge entirely.
        let keyword_verdict = self.keywords.should_terminate(history).await;
        if keyword_verdict.should_stop {
            return keyword_verdict;
        }

        // The judge needs context to rule on; with fewer than two turns the
        // verdict is undecidable and we continue.
        if history.len() < 2 {
            return TerminationVerdict::proceed();
        }

        let query = self.build_query(history);
        let mut judge = match self.judge.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let answer = match ServiceExt::ready(&mut judge).await {
            Ok(svc) => svc.call(query).await,
            Err(e) => Err(e),
        };

        match answer {
            Ok(text) if text.to_lowercase().contains("yes") => {
                debug!(answer = %text, "judge affirmed completion");
                TerminationVerdict::stop("judge affirmed completion")
            }
            Ok(text) => {
                debug!(answer = %text, "judge denied completion");
                TerminationVerdict::proceed()
            }
            Err(e) => {
                // Judge unavailable: recover locally with the keyword
                // heuristic over the same trailing window.
                warn!(error = %e, "judge query failed, falling back to keyword heuristic");
                self.keywords
                    .scan_window(history.tail(self.window))
                    .unwrap_or_else(TerminationVerdict::proceed)
            }
        }
    }
}

/// Judge implementation backed by a chat-completion model.
#[derive(Clone)]
pub struct OpenAiJudge {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
}

impl OpenAiJudge {
    pub fn new(client: Arc<Client<OpenAIConfig>>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Judge over the model named in the run configuration.
    pub fn from_config(client: Arc<Client<OpenAIConfig>>, config: &GroupChatConfig) -> Self {
        Self::new(client, config.judge_model.clone())
    }

    pub fn into_svc(self) -> JudgeSvc {
        BoxCloneService::new(self)
    }

    fn to_chat_message(turn: &JudgeTurn) -> Result<ChatCompletionRequestMessage, BoxError> {
        let msg = match turn.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(turn.text.clone())
                .build()?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(turn.text.clone())
                .build()?
                .into(),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(turn.text.clone())
                .build()?
                .into(),
        };
        Ok(msg)
    }
}

impl Service<JudgeQuery> for OpenAiJudge {
    type Response = String;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, query: JudgeQuery) -> Self::Future {
        let client = self.client.clone();
        let model = self.model.clone();
        Box::pin(async move {
            let messages = query
                .turns
                .iter()
                .map(Self::to_chat_message)
                .collect::<Result<Vec<_>, _>>()?;
            let request = CreateChatCompletionRequestArgs::default()
                .model(&model)
                .messages(messages)
                .max_tokens(query.max_output_tokens)
                .temperature(query.temperature)
                .build()?;
            let response = client.chat().create(request).await?;
            let answer = response
                .choices
                .first()
                .and_then(|c| c.message.content.clone())
                .unwrap_or_default();
            Ok(answer)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::ConversationTurn;
    use std::sync::{Arc as StdArc, Mutex};
    use tower::service_fn;

    fn history_with(replies: &[&str]) -> SharedHistory {
        let mut history = SharedHistory::new();
        history.push(ConversationTurn::user("extract the todos"));
        for reply in replies {
            history.push(ConversationTurn::assistant(*reply, "agent"));
        }
        history
    }

    fn scripted_judge(answer: &'static str, calls: StdArc<Mutex<usize>>) -> JudgeSvc {
        BoxCloneService::new(service_fn(move |_q: JudgeQuery| {
            let calls = calls.clone();
            async move {
                *calls.lock().unwrap() += 1;
                Ok::<String, BoxError>(answer.to_string())
            }
        }))
    }

    fn failing_judge() -> JudgeSvc {
        BoxCloneService::new(service_fn(|_q: JudgeQuery| async move {
            Err::<String, BoxError>("judge timed out".into())
        }))
    }

    #[tokio::test]
    async fn keyword_match_stops_immediately() {
        let strategy = KeywordTermination::default();
        let verdict = strategy
            .should_terminate(&history_with(&["All work items created, task completed."]))
            .await;
        assert!(verdict.should_stop);
        assert!(verdict.reason.contains("completed"));
    }

    #[tokio::test]
    async fn empty_history_never_stops() {
        let strategy = KeywordTermination::default();
        let verdict = strategy.should_terminate(&SharedHistory::new()).await;
        assert!(!verdict.should_stop);
    }

    #[tokio::test]
    async fn keyword_only_checks_latest_reply() {
        let strategy = KeywordTermination::default();
        // Marker in an earlier turn, latest turn clean.
        let verdict = strategy
            .should_terminate(&history_with(&["completed the extraction", "now formatting"]))
            .await;
        assert!(!verdict.should_stop);
    }

    #[tokio::test]
    async fn keyword_match_bypasses_judge() {
        let calls = StdArc::new(Mutex::new(0));
        let strategy = JudgedTermination::new(scripted_judge("no", calls.clone()), "create work items");

        let verdict = strategy
            .should_terminate(&history_with(&["Everything is done."]))
            .await;
        assert!(verdict.should_stop);
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn judge_affirmative_stops() {
        let calls = StdArc::new(Mutex::new(0));
        let strategy = JudgedTermination::new(scripted_judge("Yes.", calls.clone()), "create work items");

        let verdict = strategy
            .should_terminate(&history_with(&["the items are in the tracker now"]))
            .await;
        assert!(verdict.should_stop);
        assert_eq!(verdict.reason, "judge affirmed completion");
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn judge_negative_continues() {
        let calls = StdArc::new(Mutex::new(0));
        let strategy = JudgedTermination::new(scripted_judge("no", calls.clone()), "create work items");

        let verdict = strategy
            .should_terminate(&history_with(&["still formatting the items"]))
            .await;
        assert!(!verdict.should_stop);
    }

    #[tokio::test]
    async fn judge_skipped_below_two_turns() {
        let calls = StdArc::new(Mutex::new(0));
        let strategy = JudgedTermination::new(scripted_judge("yes", calls.clone()), "task");

        let mut history = SharedHistory::new();
        history.push(ConversationTurn::user("begin"));
        let verdict = strategy.should_terminate(&history).await;

        assert!(!verdict.should_stop);
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn judge_failure_falls_back_to_keyword_window() {
        let strategy = JudgedTermination::new(failing_judge(), "create work items");

        // Marker sits one turn back; the latest reply has none, so tier 1
        // misses it, but the fallback scans the same trailing window the
        // judge would have seen.
        let verdict = strategy
            .should_terminate(&history_with(&["extraction completed", "uploading now"]))
            .await;
        assert!(verdict.should_stop);
        assert!(verdict.reason.contains("completed"));
    }

    #[tokio::test]
    async fn judge_failure_with_clean_window_continues() {
        let strategy = JudgedTermination::new(failing_judge(), "create work items");
        let verdict = strategy
            .should_terminate(&history_with(&["still working on formatting"]))
            .await;
        assert!(!verdict.should_stop);
    }

    #[test]
    fn strategies_are_shareable_across_threads() {
        fn assert_bounds<T: Send + Sync>() {}
        assert_bounds::<KeywordTermination>();
        assert_bounds::<JudgedTermination>();
    }

    #[tokio::test]
    async fn verdict_can_be_produced_from_a_spawned_task() {
        let calls = StdArc::new(Mutex::new(0));
        let strategy = StdArc::new(JudgedTermination::new(
            scripted_judge("yes", calls.clone()),
            "create work items",
        ));

        let shared = strategy.clone();
        let verdict = tokio::spawn(async move {
            shared
                .should_terminate(&history_with(&["still working"]))
                .await
        })
        .await
        .unwrap();

        assert!(verdict.should_stop);
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn config_sets_the_judge_window() {
        let seen: StdArc<Mutex<Vec<JudgeQuery>>> = StdArc::new(Mutex::new(Vec::new()));
        let seen_cl = seen.clone();
        let judge: JudgeSvc = BoxCloneService::new(service_fn(move |q: JudgeQuery| {
            let seen = seen_cl.clone();
            async move {
                seen.lock().unwrap().push(q);
                Ok::<String, BoxError>("no".to_string())
            }
        }));
        let config = GroupChatConfig {
            judge_window: 2,
            ..GroupChatConfig::default()
        };
        let strategy = JudgedTermination::with_config(judge, "create work items", &config);

        strategy
            .should_terminate(&history_with(&["reply one", "reply two", "reply three"]))
            .await;

        // System preamble + 2 window turns + yes/no question.
        assert_eq!(seen.lock().unwrap()[0].turns.len(), 4);
    }

    #[tokio::test]
    async fn judge_prompt_carries_window_and_question() {
        let seen: StdArc<Mutex<Vec<JudgeQuery>>> = StdArc::new(Mutex::new(Vec::new()));
        let seen_cl = seen.clone();
        let judge: JudgeSvc = BoxCloneService::new(service_fn(move |q: JudgeQuery| {
            let seen = seen_cl.clone();
            async move {
                seen.lock().unwrap().push(q);
                Ok::<String, BoxError>("no".to_string())
            }
        }));
        let strategy = JudgedTermination::new(judge, "create work items").window(3);

        let history = history_with(&["reply one", "reply two", "reply three", "reply four"]);
        strategy.should_terminate(&history).await;

        let queries = seen.lock().unwrap();
        let query = &queries[0];
        assert_eq!(query.max_output_tokens, 10);
        assert!((query.temperature - 0.1).abs() < f32::EPSILON);
        // System preamble + 3 window turns + yes/no question.
        assert_eq!(query.turns.len(), 5);
        assert!(query.turns[0].text.contains("create work items"));
        assert!(query.turns.last().unwrap().text.contains("yes or no"));
        assert!(query.turns[1].text.contains("reply two"));
    }
}
