// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! End-to-end scenarios for the agent loop, driven by `ScriptedStream` so
//! every run is deterministic and needs no network access.
#[cfg(test)]
mod scenario_tests {
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio_util::sync::CancellationToken;

    use otto_config::Config;
    use otto_model::{
        AssistantContent, EventStream, ModelRef, ScriptStep, ScriptedStream, StopReason, Usage,
    };
    use otto_tools::{Tool, ToolRegistry, ToolResult, ToolUpdateFn};

    use crate::{
        Agent, AgentEvent, AgentHooks, AgentMessage, CustomMessage, MessageSourceFn,
        SKIPPED_TOOL_TEXT, SPLIT_TURN_SEPARATOR,
    };

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn model() -> ModelRef {
        ModelRef::new("mock", "scripted", "mock-model")
    }

    fn config_with(tweak: impl FnOnce(&mut Config)) -> Arc<Config> {
        let mut config = Config::default();
        config.model.provider = "mock".into();
        config.model.api = "scripted".into();
        config.model.name = "mock-model".into();
        tweak(&mut config);
        Arc::new(config)
    }

    fn default_config() -> Arc<Config> {
        config_with(|_| {})
    }

    struct LsTool;

    #[async_trait]
    impl Tool for LsTool {
        fn name(&self) -> &str {
            "ls"
        }
        fn description(&self) -> &str {
            "list files in a directory"
        }
        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "path": { "type": "string" } },
                "required": ["path"],
            })
        }
        async fn execute(
            &self,
            _call_id: &str,
            _arguments: Value,
            _cancel: CancellationToken,
            _on_update: Option<ToolUpdateFn>,
        ) -> anyhow::Result<ToolResult> {
            Ok(ToolResult::text("a.txt\nb.txt").with_details(json!({})))
        }
    }

    fn ls_registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(LsTool);
        Arc::new(registry)
    }

    fn agent_with(
        stream: ScriptedStream,
        tools: Arc<ToolRegistry>,
        config: Arc<Config>,
        hooks: AgentHooks,
    ) -> Agent {
        Agent::new(Arc::new(stream), tools, config, hooks)
    }

    async fn run_collect(
        agent: &mut Agent,
        prompts: Vec<AgentMessage>,
    ) -> (Vec<AgentMessage>, Vec<AgentEvent>) {
        let events = EventStream::new();
        let messages = agent.run(prompts, &events).await.unwrap();
        let collected = events.collect().await;
        (messages, collected)
    }

    /// Validate the event-ordering grammar:
    /// `agent_start (turn_start (message-group | tool-group)* turn_end)* agent_end`
    /// where a message group is `message_start message_update* message_end`
    /// and a tool group is `tool_execution_start tool_execution_update*
    /// tool_execution_end`.
    fn assert_event_grammar(events: &[AgentEvent]) {
        let kinds: Vec<&str> = events.iter().map(AgentEvent::kind).collect();
        let mut i = 0;
        assert_eq!(kinds.first(), Some(&"agent_start"), "trace: {kinds:?}");
        i += 1;
        while kinds.get(i) == Some(&"turn_start") {
            i += 1;
            loop {
                match kinds.get(i) {
                    Some(&"message_start") => {
                        i += 1;
                        while kinds.get(i) == Some(&"message_update") {
                            i += 1;
                        }
                        assert_eq!(kinds.get(i), Some(&"message_end"), "at {i}: {kinds:?}");
                        i += 1;
                    }
                    Some(&"tool_execution_start") => {
                        i += 1;
                        while kinds.get(i) == Some(&"tool_execution_update") {
                            i += 1;
                        }
                        assert_eq!(
                            kinds.get(i),
                            Some(&"tool_execution_end"),
                            "at {i}: {kinds:?}"
                        );
                        i += 1;
                    }
                    Some(&"turn_end") => {
                        i += 1;
                        break;
                    }
                    other => panic!("unexpected {other:?} at {i}: {kinds:?}"),
                }
            }
        }
        assert_eq!(kinds.get(i), Some(&"agent_end"), "trace: {kinds:?}");
        assert_eq!(i + 1, kinds.len(), "events after agent_end: {kinds:?}");
    }

    fn turn_count(events: &[AgentEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, AgentEvent::TurnStart))
            .count()
    }

    /// Text of a single-block user message (timestamps make whole-message
    /// equality useless across separately constructed values).
    fn user_text(message: &AgentMessage) -> Option<&str> {
        match message {
            AgentMessage::User(u) => match u.content.first() {
                Some(otto_model::UserContent::Text { text }) => Some(text),
                _ => None,
            },
            _ => None,
        }
    }

    // ── S1: simple echo ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn simple_echo() {
        let mut agent = agent_with(
            ScriptedStream::text_reply("Hello!"),
            Arc::new(ToolRegistry::new()),
            default_config(),
            AgentHooks::default(),
        );
        let (messages, events) = run_collect(&mut agent, vec![AgentMessage::user("hi")]).await;

        assert_eq!(messages.len(), 2);
        assert_eq!(user_text(&messages[0]), Some("hi"));
        let assistant = messages[1].as_assistant().unwrap();
        assert_eq!(assistant.stop_reason, StopReason::Stop);
        assert_eq!(
            assistant.content,
            vec![AssistantContent::text("Hello!")]
        );

        assert_event_grammar(&events);
        assert_eq!(turn_count(&events), 1);
    }

    // ── S2: single tool call ──────────────────────────────────────────────────

    #[tokio::test]
    async fn single_tool_call() {
        let mut agent = agent_with(
            ScriptedStream::tool_then_text("call_1", "ls", json!({"path": "."}), "Here they are…"),
            ls_registry(),
            default_config(),
            AgentHooks::default(),
        );
        let (messages, events) =
            run_collect(&mut agent, vec![AgentMessage::user("list files")]).await;

        // user, assistant(tool call), tool result, assistant(text)
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].as_assistant().unwrap().tool_calls()[0].id, "call_1");
        let tool_result = messages[2].as_tool_result().unwrap();
        assert_eq!(tool_result.tool_call_id, "call_1");
        assert!(!tool_result.is_error);
        assert_eq!(
            tool_result.content,
            vec![otto_model::UserContent::text("a.txt\nb.txt")]
        );
        assert_eq!(
            messages[3].as_assistant().unwrap().text(),
            "Here they are…"
        );

        let starts: Vec<&AgentEvent> = events
            .iter()
            .filter(|e| matches!(e, AgentEvent::ToolExecutionStart { .. }))
            .collect();
        let ends: Vec<&AgentEvent> = events
            .iter()
            .filter(|e| matches!(e, AgentEvent::ToolExecutionEnd { .. }))
            .collect();
        assert_eq!(starts.len(), 1);
        assert_eq!(ends.len(), 1);
        match starts[0] {
            AgentEvent::ToolExecutionStart { tool_call_id, .. } => {
                assert_eq!(tool_call_id, "call_1")
            }
            _ => unreachable!(),
        }

        assert_event_grammar(&events);
        assert_eq!(turn_count(&events), 2);
    }

    // ── S3: steering skips remaining tool calls ───────────────────────────────

    #[tokio::test]
    async fn steering_skips_remaining_tools() {
        let stream = ScriptedStream::new(vec![
            vec![
                ScriptStep::ToolCall {
                    id: "call_a".into(),
                    name: "ls".into(),
                    arguments: json!({"path": "a"}),
                },
                ScriptStep::ToolCall {
                    id: "call_b".into(),
                    name: "ls".into(),
                    arguments: json!({"path": "b"}),
                },
                ScriptStep::ToolCall {
                    id: "call_c".into(),
                    name: "ls".into(),
                    arguments: json!({"path": "c"}),
                },
            ],
            vec![ScriptStep::Text("changing course".into())],
        ]);

        // Poll 1 is the run-entry check, polls 2 and 3 follow tool results
        // A and B; the third poll carries the queued user message.
        let polls = Arc::new(Mutex::new(0u32));
        let steering: MessageSourceFn = {
            let polls = Arc::clone(&polls);
            Arc::new(move || {
                let polls = Arc::clone(&polls);
                Box::pin(async move {
                    let mut n = polls.lock().unwrap();
                    *n += 1;
                    if *n == 3 {
                        vec![AgentMessage::user("wait, do X")]
                    } else {
                        vec![]
                    }
                })
            })
        };
        let hooks = AgentHooks {
            get_steering_messages: Some(steering),
            ..Default::default()
        };

        let mut agent = agent_with(stream, ls_registry(), default_config(), hooks);
        let (messages, events) = run_collect(&mut agent, vec![AgentMessage::user("go")]).await;

        let results: Vec<_> = messages
            .iter()
            .filter_map(AgentMessage::as_tool_result)
            .collect();
        assert_eq!(results.len(), 3);
        assert!(!results[0].is_error, "A executed normally");
        assert!(!results[1].is_error, "B executed normally");
        assert_eq!(results[2].tool_call_id, "call_c");
        assert!(results[2].is_error, "C was skipped");
        assert_eq!(
            results[2].content,
            vec![otto_model::UserContent::text(SKIPPED_TOOL_TEXT)]
        );

        // The steering message was appended and a new turn ran.
        assert!(messages.iter().any(|m| user_text(m) == Some("wait, do X")));
        assert_eq!(turn_count(&events), 2);
        assert_event_grammar(&events);
    }

    // ── S4: context overflow + automatic recovery ─────────────────────────────

    #[tokio::test]
    async fn overflow_compacts_and_continues() {
        let stream = ScriptedStream::new(vec![
            vec![ScriptStep::Fail {
                message: "request failed: context_length_exceeded".into(),
            }],
            vec![ScriptStep::Text("## Goal\ncarry on".into())], // compaction summary
            vec![ScriptStep::Text("recovered and done".into())], // retried turn
        ])
        .with_overflow_marker("context_length_exceeded");

        let config = config_with(|c| {
            c.model.context_window = Some(1_000_000);
            c.compaction.keep_recent_tokens = 50;
        });
        let mut agent = agent_with(
            stream,
            Arc::new(ToolRegistry::new()),
            config,
            AgentHooks::default(),
        );

        // Enough prior history that compaction has something to summarize.
        for i in 0..4 {
            agent.append_history([AgentMessage::user(format!(
                "earlier request {i}: {}",
                "context ".repeat(60)
            ))]);
            let mut reply = otto_model::AssistantMessage::empty(model());
            reply.content = vec![AssistantContent::text("done")];
            reply.stop_reason = StopReason::Stop;
            agent.append_history([AgentMessage::Assistant(reply)]);
        }

        let started = Instant::now();
        let (messages, events) =
            run_collect(&mut agent, vec![AgentMessage::user("keep going")]).await;

        // The failing assistant was retracted from the session and a
        // compaction entry written in its place.
        assert!(agent.session().last_compaction().is_some());
        let errored_in_session = agent.session().entries().iter().any(|e| {
            crate::entry_message(e)
                .as_ref()
                .and_then(AgentMessage::as_assistant)
                .is_some_and(|a| a.stop_reason == StopReason::Error)
        });
        assert!(!errored_in_session);

        // The run continued automatically (≈100 ms delay) and finished.
        assert!(started.elapsed() >= Duration::from_millis(100));
        let last = messages.last().unwrap().as_assistant().unwrap();
        assert_eq!(last.text(), "recovered and done");

        // Working context now starts with the compaction summary.
        let first = agent.messages()[0].as_custom().unwrap();
        assert_eq!(first.kind, CustomMessage::COMPACTION_SUMMARY);
        assert!(first.content.contains("## Goal\ncarry on"));

        assert_event_grammar(&events);
        assert_eq!(turn_count(&events), 2);
    }

    // ── Threshold-triggered compaction ────────────────────────────────────────

    #[tokio::test]
    async fn threshold_compacts_without_retry() {
        let stream = ScriptedStream::new(vec![
            vec![
                ScriptStep::Text("big answer".into()),
                ScriptStep::Usage(Usage {
                    total_tokens: 9_500,
                    ..Default::default()
                }),
            ],
            vec![ScriptStep::Text("## Goal\ncheckpoint".into())], // summary
        ]);
        let config = config_with(|c| {
            c.model.context_window = Some(10_000);
            c.compaction.reserve_tokens = 2_000;
            c.compaction.keep_recent_tokens = 50;
        });
        let mut agent = agent_with(
            stream,
            Arc::new(ToolRegistry::new()),
            config,
            AgentHooks::default(),
        );
        agent.append_history([
            AgentMessage::user("old request ".repeat(50)),
            AgentMessage::user("another old one ".repeat(50)),
        ]);

        let (_, events) = run_collect(&mut agent, vec![AgentMessage::user("now this")]).await;

        assert!(agent.session().last_compaction().is_some());
        assert_eq!(
            agent.messages()[0].as_custom().unwrap().kind,
            CustomMessage::COMPACTION_SUMMARY
        );
        // No retry: a single turn ran.
        assert_eq!(turn_count(&events), 1);
        assert_event_grammar(&events);
    }

    // ── S5: split-turn compaction ─────────────────────────────────────────────

    #[tokio::test]
    async fn split_turn_joins_history_and_prefix() {
        use crate::{compact, prepare_compaction, CompactionHooks, CompactionSettings, Session};
        use otto_model::ToolCall;

        let mut session = Session::new();
        session.push_message(AgentMessage::user("first question"));
        let mut small = otto_model::AssistantMessage::empty(model());
        small.content = vec![AssistantContent::text("first answer")];
        small.stop_reason = StopReason::Stop;
        session.push_message(AgentMessage::Assistant(small));
        session.push_message(AgentMessage::user("investigate the bug"));
        let mut caller = otto_model::AssistantMessage::empty(model());
        caller.content = vec![AssistantContent::ToolCall(ToolCall::new(
            "c1",
            "read",
            json!({"path": "/src/lib.rs"}),
        ))];
        caller.stop_reason = StopReason::ToolUse;
        session.push_message(AgentMessage::Assistant(caller));
        session.push_message(AgentMessage::from(otto_model::ToolResultMessage::text(
            "c1",
            "read",
            "r".repeat(4000),
        )));
        let mut tail = otto_model::AssistantMessage::empty(model());
        tail.content = vec![AssistantContent::text("a".repeat(2000))];
        tail.stop_reason = StopReason::Stop;
        session.push_message(AgentMessage::Assistant(tail));

        let settings = CompactionSettings {
            enabled: true,
            context_window: 10_000,
            reserve_tokens: 2_000,
            keep_recent_tokens: 300,
        };
        let prep = prepare_compaction(&session, &settings).unwrap();
        assert!(prep.is_split_turn);
        // Prefix runs from the turn's user message to the cut.
        assert_eq!(prep.turn_prefix_messages.len(), 3);
        assert_eq!(
            user_text(&prep.turn_prefix_messages[0]),
            Some("investigate the bug")
        );
        // Earlier turns are summarized separately.
        assert_eq!(prep.messages_to_summarize.len(), 2);

        // The two summaries run concurrently; scripts pop in call order
        // (history first).
        let stream = ScriptedStream::new(vec![
            vec![ScriptStep::Text("HISTORY SUMMARY".into())],
            vec![ScriptStep::Text("TURN PREFIX SUMMARY".into())],
        ]);
        compact(
            &mut session,
            &prep,
            &stream,
            &model(),
            &settings,
            &CompactionHooks::default(),
            None,
        )
        .await
        .unwrap()
        .unwrap();

        let (_, entry) = session.last_compaction().unwrap();
        let expected = format!("HISTORY SUMMARY{SPLIT_TURN_SEPARATOR}TURN PREFIX SUMMARY");
        assert!(
            entry.summary.starts_with(&expected),
            "summary was: {}",
            entry.summary
        );
    }

    // ── S6: cross-model replay ────────────────────────────────────────────────

    #[tokio::test]
    async fn cross_model_replay_rewrites_only_for_other_models() {
        use otto_model::transform::{sequential_id_normalizer, transform_for_model};
        use otto_model::{Message, ToolCall, ToolResultMessage};

        let source = ModelRef::new("anthropic", "messages", "claude-opus-4-5");
        let target = ModelRef::new("openai", "chat-completions", "gpt-4o");
        let long_id = "x".repeat(480);

        let mut produced = otto_model::AssistantMessage::empty(source.clone());
        produced.content = vec![
            AssistantContent::Thinking {
                thinking: "private chain of thought".into(),
                signature: Some("sig-a".into()),
            },
            AssistantContent::ToolCall(ToolCall::new(long_id.clone(), "read", json!({}))),
        ];
        produced.stop_reason = StopReason::ToolUse;
        let history = vec![
            Message::user("go"),
            Message::Assistant(produced),
            Message::ToolResult(ToolResultMessage::text(long_id.clone(), "read", "ok")),
        ];

        // Replaying to model B rewrites thinking → text and shortens the id,
        // keeping the tool result consistent.
        let normalizer = sequential_id_normalizer();
        let for_b = transform_for_model(&history, &target, Some(&normalizer));
        let assistant = for_b[1].as_assistant().unwrap();
        assert!(matches!(
            &assistant.content[0],
            AssistantContent::Text { text, signature: None } if text == "private chain of thought"
        ));
        let new_id = &assistant.tool_calls()[0].id;
        assert!(otto_model::transform::valid_tool_call_id(new_id));
        assert_eq!(&for_b[2].as_tool_result().unwrap().tool_call_id, new_id);

        // Replaying to model A preserves signatures and ids.
        let normalizer = sequential_id_normalizer();
        let for_a = transform_for_model(&history, &source, Some(&normalizer));
        let assistant = for_a[1].as_assistant().unwrap();
        assert!(matches!(
            &assistant.content[0],
            AssistantContent::Thinking { signature: Some(_), .. }
        ));
        assert_eq!(assistant.tool_calls()[0].id, long_id);
    }

    // ── Abort ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn abort_terminates_cleanly() {
        let stream = ScriptedStream::new(vec![vec![ScriptStep::HangUntilCancelled]]);
        let mut agent = agent_with(
            stream,
            Arc::new(ToolRegistry::new()),
            default_config(),
            AgentHooks::default(),
        );
        let cancel = agent.cancel_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let (messages, events) = run_collect(&mut agent, vec![AgentMessage::user("work")]).await;
        let last = messages.last().unwrap().as_assistant().unwrap();
        assert_eq!(last.stop_reason, StopReason::Aborted);
        assert_event_grammar(&events);
        // Aborted runs never compact.
        assert!(agent.session().last_compaction().is_none());
    }

    // ── continue_run ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn continue_after_assistant_is_a_contract_violation() {
        let mut agent = agent_with(
            ScriptedStream::text_reply("done"),
            Arc::new(ToolRegistry::new()),
            default_config(),
            AgentHooks::default(),
        );
        let events = EventStream::new();
        agent
            .run(vec![AgentMessage::user("hi")], &events)
            .await
            .unwrap();

        let events = EventStream::new();
        let err = agent.continue_run(&events).await.unwrap_err();
        assert!(err.to_string().contains("cannot continue"));
    }

    #[tokio::test]
    async fn continue_from_user_tail_runs_a_turn() {
        let mut agent = agent_with(
            ScriptedStream::text_reply("picking up"),
            Arc::new(ToolRegistry::new()),
            default_config(),
            AgentHooks::default(),
        );
        agent.append_history([AgentMessage::user("resume this")]);
        let events = EventStream::new();
        let messages = agent.continue_run(&events).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].as_assistant().unwrap().text(),
            "picking up"
        );
        assert_event_grammar(&events.collect().await);
    }

    #[tokio::test]
    async fn continue_on_empty_context_fails() {
        let mut agent = agent_with(
            ScriptedStream::text_reply("x"),
            Arc::new(ToolRegistry::new()),
            default_config(),
            AgentHooks::default(),
        );
        let events = EventStream::new();
        assert!(agent.continue_run(&events).await.is_err());
    }

    // ── Follow-ups ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn follow_up_extends_the_run_once() {
        let stream = ScriptedStream::new(vec![
            vec![ScriptStep::Text("first answer".into())],
            vec![ScriptStep::Text("second answer".into())],
        ]);
        let queue = Arc::new(Mutex::new(vec![vec![AgentMessage::user("and then?")]]));
        let follow_up: MessageSourceFn = {
            let queue = Arc::clone(&queue);
            Arc::new(move || {
                let queue = Arc::clone(&queue);
                Box::pin(async move { queue.lock().unwrap().pop().unwrap_or_default() })
            })
        };
        let hooks = AgentHooks {
            get_follow_up_messages: Some(follow_up),
            ..Default::default()
        };
        let mut agent = agent_with(
            stream,
            Arc::new(ToolRegistry::new()),
            default_config(),
            hooks,
        );
        let (messages, events) = run_collect(&mut agent, vec![AgentMessage::user("hi")]).await;

        // user, assistant, follow-up user, assistant — all in one run.
        assert_eq!(messages.len(), 4);
        assert_eq!(user_text(&messages[2]), Some("and then?"));
        assert_eq!(
            messages[3].as_assistant().unwrap().text(),
            "second answer"
        );
        assert_eq!(turn_count(&events), 2);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, AgentEvent::AgentEnd { .. }))
                .count(),
            1
        );
        assert_event_grammar(&events);
    }

    // ── Stream result plumbing ────────────────────────────────────────────────

    #[tokio::test]
    async fn event_stream_result_matches_return_value() {
        let mut agent = agent_with(
            ScriptedStream::text_reply("Hello!"),
            Arc::new(ToolRegistry::new()),
            default_config(),
            AgentHooks::default(),
        );
        let events = EventStream::new();
        let returned = agent
            .run(vec![AgentMessage::user("hi")], &events)
            .await
            .unwrap();
        let from_stream = events.result().await.unwrap();
        assert_eq!(returned, from_stream);
    }

    // ── Context transform hook ────────────────────────────────────────────────

    #[tokio::test]
    async fn transform_context_rewrites_what_the_model_sees() {
        let mock = Arc::new(ScriptedStream::text_reply("ok"));
        let hooks = AgentHooks {
            transform_context: Some(Arc::new(|mut messages, _cancel| {
                Box::pin(async move {
                    messages.insert(0, AgentMessage::user("injected preamble"));
                    messages
                })
            })),
            ..Default::default()
        };
        let mut agent = Agent::new(
            mock.clone(),
            Arc::new(ToolRegistry::new()),
            default_config(),
            hooks,
        );
        let events = EventStream::new();
        agent
            .run(vec![AgentMessage::user("real prompt")], &events)
            .await
            .unwrap();

        let context = mock.last_context.lock().unwrap().clone().unwrap();
        assert_eq!(context.messages.len(), 2);
        match &context.messages[0] {
            otto_model::Message::User(u) => assert_eq!(
                u.content,
                vec![otto_model::UserContent::text("injected preamble")]
            ),
            other => panic!("expected injected user message, got {other:?}"),
        }
        // The UI-level context is untouched by the transform.
        assert_eq!(agent.messages().len(), 2);
        assert_eq!(user_text(&agent.messages()[0]), Some("real prompt"));
    }

    // ── Custom variants are dropped from LM context ───────────────────────────

    #[tokio::test]
    async fn unknown_custom_variants_never_reach_the_model() {
        let mock = Arc::new(ScriptedStream::text_reply("ok"));
        let mut agent = Agent::new(
            mock.clone(),
            Arc::new(ToolRegistry::new()),
            default_config(),
            AgentHooks::default(),
        );
        agent.append_history([
            AgentMessage::Custom(CustomMessage::new("bash_execution", "$ make -j8")),
            AgentMessage::user("what happened?"),
        ]);
        let events = EventStream::new();
        agent.continue_run(&events).await.unwrap();

        let context = mock.last_context.lock().unwrap().clone().unwrap();
        assert_eq!(context.messages.len(), 1, "custom variant must be dropped");
        assert_eq!(context.messages[0].role(), "user");
    }
}
