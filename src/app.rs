use std::sync::Arc;

use tokio::sync::mpsc;

use crate::ask::{AskError, QueryService};
use crate::transcript::{Body, EntryId, Transcript};
use crate::tui::AppEvent;
use crate::welcome::WelcomeCycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Input state
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Conversation state
    pub transcript: Transcript,
    pub welcome: WelcomeCycle,

    // View state
    pub sidebar_open: bool,
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub animation_frame: u8, // 0-2 for typing-dots animation

    // Endpoint shown in the sidebar
    pub endpoint: String,

    service: Arc<dyn QueryService>,
    events: mpsc::UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(
        endpoint: String,
        service: Arc<dyn QueryService>,
        events: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            input: String::new(),
            cursor: 0,

            transcript: Transcript::new(),
            welcome: WelcomeCycle::new(),

            sidebar_open: false,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,

            endpoint,
            service,
            events,
        }
    }

    /// Submit the current input. Appends a user entry and a typing
    /// placeholder, then fires one request for the placeholder. Whitespace
    /// input is ignored. Submitting again while a request is pending starts
    /// an independent placeholder/request pair; completions are not
    /// serialized and may land out of submission order.
    pub fn submit_query(&mut self) {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return;
        }

        self.input.clear();
        self.cursor = 0;

        self.transcript.push_user(text.clone());
        let id = self.transcript.push_pending();
        self.scroll_to_bottom();

        tracing::debug!(chars = text.chars().count(), "submitting query");

        let service = Arc::clone(&self.service);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = service.ask(&text).await;
            // Receiver is gone on shutdown; nothing left to update then
            let _ = events.send(AppEvent::Answer { id, result });
        });
    }

    /// Settle the placeholder owned by a finished request. Failures become
    /// transcript content; a completion for a cleared conversation is
    /// dropped.
    pub fn resolve_answer(&mut self, id: EntryId, result: Result<String, AskError>) {
        let content = match result {
            Ok(answer) => answer,
            Err(err) => {
                tracing::warn!(%err, "query failed");
                format!("Error: {err}")
            }
        };

        if self.transcript.resolve(id, content) {
            self.scroll_to_bottom();
        } else {
            tracing::debug!("answer arrived after the conversation was cleared");
        }
    }

    /// Start a new chat: drop the transcript (in-flight requests are not
    /// cancelled; their late answers will find no entry), rotate the
    /// welcome greeting, reset the input, close the sidebar.
    pub fn reset_conversation(&mut self) {
        self.transcript.clear();
        self.welcome.advance();
        self.input.clear();
        self.cursor = 0;
        self.chat_scroll = 0;
        self.sidebar_open = false;
    }

    pub fn toggle_sidebar(&mut self) {
        self.sidebar_open = !self.sidebar_open;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.transcript.has_pending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Chat scrolling
    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn scroll_half_page_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(self.chat_height / 2);
    }

    pub fn scroll_half_page_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(self.chat_height / 2);
    }

    /// Scroll the chat so the newest entry is visible.
    pub fn scroll_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for entry in self.transcript.entries() {
            total_lines += 1; // Role line ("You:" or "AI:")
            match &entry.body {
                Body::Pending => total_lines += 1,
                Body::Text(text) => {
                    for line in text.lines() {
                        // Character count, not byte length, for UTF-8 content
                        let char_count = line.chars().count();
                        if char_count == 0 {
                            total_lines += 1;
                        } else {
                            total_lines += ((char_count / wrap_width) + 1) as u16;
                        }
                    }
                }
            }
            total_lines += 1; // Blank line after entry
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Role;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Fake answering service with a scripted reply and latency per query.
    struct ScriptedService {
        replies: HashMap<String, (Duration, Result<String, StatusCode>)>,
    }

    impl ScriptedService {
        fn new() -> Self {
            Self {
                replies: HashMap::new(),
            }
        }

        fn reply(mut self, query: &str, delay_ms: u64, result: Result<&str, StatusCode>) -> Self {
            self.replies.insert(
                query.to_string(),
                (
                    Duration::from_millis(delay_ms),
                    result.map(str::to_string),
                ),
            );
            self
        }
    }

    #[async_trait]
    impl QueryService for ScriptedService {
        async fn ask(&self, query: &str) -> Result<String, AskError> {
            let (delay, reply) = self.replies.get(query).expect("unscripted query").clone();
            tokio::time::sleep(delay).await;
            reply.map_err(AskError::Status)
        }
    }

    fn test_app(
        service: ScriptedService,
    ) -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = App::new("http://127.0.0.1:8000".to_string(), Arc::new(service), tx);
        (app, rx)
    }

    async fn next_answer(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> (EntryId, Result<String, AskError>) {
        match rx.recv().await.expect("event channel closed") {
            AppEvent::Answer { id, result } => (id, result),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn whitespace_input_is_a_noop() {
        let (mut app, mut rx) = test_app(ScriptedService::new());

        app.input = "   \t ".to_string();
        app.submit_query();

        assert!(app.transcript.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn submit_appends_user_entry_then_placeholder() {
        let (mut app, _rx) = test_app(ScriptedService::new().reply("hello", 0, Ok("hi")));

        app.input = "  hello  ".to_string();
        app.submit_query();

        let entries = app.transcript.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[0].body, Body::Text("hello".to_string()));
        assert_eq!(entries[1].role, Role::Assistant);
        assert_eq!(entries[1].body, Body::Pending);
        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);
    }

    #[tokio::test]
    async fn successful_answer_replaces_the_placeholder() {
        let (mut app, mut rx) =
            test_app(ScriptedService::new().reply("what is the answer", 0, Ok("42")));

        app.input = "what is the answer".to_string();
        app.submit_query();

        let (id, result) = next_answer(&mut rx).await;
        app.resolve_answer(id, result);

        assert_eq!(
            app.transcript.entries()[1].body,
            Body::Text("42".to_string())
        );
    }

    #[tokio::test]
    async fn failed_answer_surfaces_the_status_code() {
        let (mut app, mut rx) = test_app(
            ScriptedService::new().reply("q", 0, Err(StatusCode::INTERNAL_SERVER_ERROR)),
        );

        app.input = "q".to_string();
        app.submit_query();

        let (id, result) = next_answer(&mut rx).await;
        app.resolve_answer(id, result);

        match &app.transcript.entries()[1].body {
            Body::Text(text) => {
                assert!(text.starts_with("Error:"), "got: {text}");
                assert!(text.contains("500"), "got: {text}");
            }
            other => panic!("placeholder not resolved: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn completions_may_arrive_out_of_submission_order() {
        let service = ScriptedService::new()
            .reply("slow", 100, Ok("slow answer"))
            .reply("fast", 10, Ok("fast answer"));
        let (mut app, mut rx) = test_app(service);

        app.input = "slow".to_string();
        app.submit_query();
        app.input = "fast".to_string();
        app.submit_query();

        let slow_id = app.transcript.entries()[1].id;
        let fast_id = app.transcript.entries()[3].id;

        // The later submission settles first
        let (first_id, first) = next_answer(&mut rx).await;
        assert_eq!(first_id, fast_id);
        app.resolve_answer(first_id, first);

        assert_eq!(
            app.transcript.entries()[3].body,
            Body::Text("fast answer".to_string())
        );
        assert_eq!(app.transcript.entries()[1].body, Body::Pending);

        let (second_id, second) = next_answer(&mut rx).await;
        assert_eq!(second_id, slow_id);
        app.resolve_answer(second_id, second);

        assert_eq!(
            app.transcript.entries()[1].body,
            Body::Text("slow answer".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn answer_after_reset_is_dropped() {
        let (mut app, mut rx) = test_app(ScriptedService::new().reply("q", 50, Ok("late")));

        app.input = "q".to_string();
        app.submit_query();
        app.reset_conversation();
        assert!(app.transcript.is_empty());

        // The request was not cancelled and still settles
        let (id, result) = next_answer(&mut rx).await;
        app.resolve_answer(id, result);

        assert!(app.transcript.is_empty());
    }

    #[tokio::test]
    async fn reset_rotates_the_welcome_greeting() {
        let (mut app, _rx) = test_app(ScriptedService::new());

        assert_eq!(app.welcome.current(), "How may I help you?");
        app.reset_conversation();
        assert_eq!(app.welcome.current(), "Let me know your queries.");
        app.reset_conversation();
        assert_eq!(app.welcome.current(), "Always there for your assistance.");
    }

    #[tokio::test]
    async fn reset_clears_input_and_closes_sidebar() {
        let (mut app, _rx) = test_app(ScriptedService::new());

        app.input = "half-typed".to_string();
        app.cursor = 5;
        app.sidebar_open = true;

        app.reset_conversation();

        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);
        assert!(!app.sidebar_open);
    }

    #[tokio::test]
    async fn sidebar_toggle_returns_to_prior_state() {
        let (mut app, _rx) = test_app(ScriptedService::new());

        let before = app.sidebar_open;
        app.toggle_sidebar();
        app.toggle_sidebar();
        assert_eq!(app.sidebar_open, before);
    }

    #[tokio::test]
    async fn animation_only_advances_while_a_request_is_pending() {
        let (mut app, _rx) = test_app(ScriptedService::new().reply("q", 0, Ok("a")));

        app.tick_animation();
        assert_eq!(app.animation_frame, 0);

        app.input = "q".to_string();
        app.submit_query();
        app.tick_animation();
        assert_eq!(app.animation_frame, 1);
    }
}
