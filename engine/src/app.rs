//! Application state for one input session.
//!
//! This is the glue around the timer: it owns the two input fields, the
//! validation status, and the AI result lists, and it binds the three
//! update callbacks (branch suggestions, inferred tasks, pattern check)
//! to one [`CallbackTimer`]. Every edit resets the timer; results and
//! failures arrive over an event channel drained once per frame by
//! [`App::process_events`], so all UI-visible state mutates on the frame
//! loop, never from a background task.

use crate::timer::{AsyncCallback, CallbackTimer, TimerConfigError};
use crate::validate::validate;
use anyhow::Context;
use brancheck_config::Settings;
use brancheck_providers::GeminiClient;
use brancheck_types::{PromptTemplate, ValidationStatus, split_suggestion_items};
use futures_util::FutureExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Placeholder shown in an AI panel while its request is in flight.
pub const THINKING_PLACEHOLDER: &str = "thinking…";

/// Which input field has keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Field {
    #[default]
    Branch,
    Description,
}

/// The two AI result panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Suggestions,
    InferredTasks,
}

/// Events flowing from timer ticks and callback completions back to the
/// frame loop.
#[derive(Debug)]
pub enum AppEvent {
    Tick(f32),
    Status(ValidationStatus),
    PanelPending(Panel),
    PanelItems(Panel, Vec<String>),
    CallbackFailed(String),
}

#[derive(Debug, Default)]
struct InputFields {
    branch: String,
    description: String,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct App {
    fields: Arc<Mutex<InputFields>>,
    focus: Field,
    status: ValidationStatus,
    suggestions: Vec<String>,
    inferred_tasks: Vec<String>,
    countdown: f32,
    target_seconds: f32,
    last_failure: Option<String>,
    timer: CallbackTimer,
    events: mpsc::UnboundedReceiver<AppEvent>,
    should_quit: bool,
}

impl App {
    /// Build the session and start its timer. Must run inside a tokio
    /// runtime: the timer spawns its ticking task immediately.
    pub fn new(settings: Settings) -> Result<Self, TimerConfigError> {
        let client = settings.api_key.clone().map(|key| {
            GeminiClient::new(key, settings.model.clone()).with_base_url(settings.base_url.clone())
        });
        Self::with_generation_client(settings, client)
    }

    fn with_generation_client(
        settings: Settings,
        client: Option<GeminiClient>,
    ) -> Result<Self, TimerConfigError> {
        let (tx, events) = mpsc::unbounded_channel();
        let fields = Arc::new(Mutex::new(InputFields::default()));

        // Bound once, fired together on every completed countdown.
        let callbacks: Vec<AsyncCallback> = vec![
            ai_panel_callback(
                Panel::Suggestions,
                client.clone(),
                settings.suggest_prompt.clone(),
                Arc::clone(&fields),
                tx.clone(),
            ),
            ai_panel_callback(
                Panel::InferredTasks,
                client,
                settings.infer_prompt.clone(),
                Arc::clone(&fields),
                tx.clone(),
            ),
            pattern_callback(settings.pattern.clone(), Arc::clone(&fields), tx.clone()),
        ];

        let mut timer = CallbackTimer::new(settings.debounce, settings.step, callbacks)?;

        let tick_tx = tx.clone();
        timer.set_on_tick(move |elapsed| {
            let _ = tick_tx.send(AppEvent::Tick(elapsed));
        });
        let error_tx = tx;
        timer.set_on_callback_error(move |error| {
            let _ = error_tx.send(AppEvent::CallbackFailed(format!("{error:#}")));
        });
        timer.start();

        Ok(Self {
            fields,
            focus: Field::default(),
            status: ValidationStatus::default(),
            suggestions: Vec::new(),
            inferred_tasks: Vec::new(),
            countdown: 0.0,
            target_seconds: settings.debounce.as_secs_f32(),
            last_failure: None,
            timer,
            events,
            should_quit: false,
        })
    }

    /// Drain pending events. Called once per frame from the render loop.
    pub fn process_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                AppEvent::Tick(elapsed) => self.countdown = elapsed,
                AppEvent::Status(status) => self.status = status,
                AppEvent::PanelPending(panel) => {
                    *self.panel_mut(panel) = vec![THINKING_PLACEHOLDER.to_owned()];
                }
                AppEvent::PanelItems(panel, items) => *self.panel_mut(panel) = items,
                AppEvent::CallbackFailed(message) => {
                    self.last_failure = Some(message);
                }
            }
        }
    }

    fn panel_mut(&mut self, panel: Panel) -> &mut Vec<String> {
        match panel {
            Panel::Suggestions => &mut self.suggestions,
            Panel::InferredTasks => &mut self.inferred_tasks,
        }
    }

    // ------------------------------------------------------------------
    // Input editing - every mutation re-debounces the timer.
    // ------------------------------------------------------------------

    pub fn insert_char(&mut self, c: char) {
        {
            let mut fields = lock(&self.fields);
            match self.focus {
                Field::Branch => fields.branch.push(c),
                Field::Description => fields.description.push(c),
            }
        }
        self.input_changed();
    }

    pub fn backspace(&mut self) {
        {
            let mut fields = lock(&self.fields);
            match self.focus {
                Field::Branch => {
                    fields.branch.pop();
                }
                Field::Description => {
                    fields.description.pop();
                }
            }
        }
        self.input_changed();
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Field::Branch => Field::Description,
            Field::Description => Field::Branch,
        };
    }

    fn input_changed(&mut self) {
        self.last_failure = None;
        self.timer.reset();
    }

    // ------------------------------------------------------------------
    // Read side for rendering.
    // ------------------------------------------------------------------

    #[must_use]
    pub fn branch(&self) -> String {
        lock(&self.fields).branch.clone()
    }

    #[must_use]
    pub fn description(&self) -> String {
        lock(&self.fields).description.clone()
    }

    #[must_use]
    pub fn focus(&self) -> Field {
        self.focus
    }

    #[must_use]
    pub fn status(&self) -> &ValidationStatus {
        &self.status
    }

    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    #[must_use]
    pub fn inferred_tasks(&self) -> &[String] {
        &self.inferred_tasks
    }

    /// Elapsed seconds of the current countdown, as last reported by the
    /// tick observer.
    #[must_use]
    pub fn countdown_seconds(&self) -> f32 {
        self.countdown
    }

    #[must_use]
    pub fn target_seconds(&self) -> f32 {
        self.target_seconds
    }

    #[must_use]
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    #[must_use]
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn request_quit(&mut self) {
        self.should_quit = true;
    }
}

/// Query Gemini and publish the response into one AI panel.
///
/// Short-circuits on empty input; a missing API key or a failed request
/// propagates out of the callback and reaches the user through the timer's
/// failure path.
fn ai_panel_callback(
    panel: Panel,
    client: Option<GeminiClient>,
    prompt: PromptTemplate,
    fields: Arc<Mutex<InputFields>>,
    tx: mpsc::UnboundedSender<AppEvent>,
) -> AsyncCallback {
    Arc::new(move || {
        let client = client.clone();
        let prompt = prompt.clone();
        let fields = Arc::clone(&fields);
        let tx = tx.clone();
        async move {
            let (branch, description) = {
                let fields = lock(&fields);
                (fields.branch.clone(), fields.description.clone())
            };
            if branch.trim().is_empty() {
                return Ok(());
            }

            let client = client.context("Gemini API key is not configured")?;
            let _ = tx.send(AppEvent::PanelPending(panel));

            let text = client.generate(&prompt.render(&branch, &description)).await?;
            let items = text.as_deref().map(split_suggestion_items).unwrap_or_default();
            let _ = tx.send(AppEvent::PanelItems(panel, items));
            Ok(())
        }
        .boxed()
    })
}

/// Check the branch name against the configured pattern.
///
/// All outcomes, including a malformed pattern, become a
/// [`ValidationStatus`] -- this callback never fails the execution step.
fn pattern_callback(
    pattern: String,
    fields: Arc<Mutex<InputFields>>,
    tx: mpsc::UnboundedSender<AppEvent>,
) -> AsyncCallback {
    Arc::new(move || {
        let pattern = pattern.clone();
        let fields = Arc::clone(&fields);
        let tx = tx.clone();
        async move {
            let branch = lock(&fields).branch.clone();
            let status = if branch.trim().is_empty() {
                ValidationStatus::EmptyInput
            } else {
                match validate(&branch, &pattern) {
                    Ok(true) => ValidationStatus::Valid,
                    Ok(false) => ValidationStatus::Invalid,
                    Err(error) => ValidationStatus::PatternBroken(error.to_string()),
                }
            };
            let _ = tx.send(AppEvent::Status(status));
            anyhow::Ok(())
        }
        .boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use brancheck_config::Settings;
    use brancheck_types::ApiKey;
    use std::time::Duration;
    use tokio::time::sleep;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_settings() -> Settings {
        let mut settings = Settings::resolve(None);
        settings.debounce = Duration::from_secs(3);
        settings.step = Duration::from_secs(1);
        settings.api_key = None;
        settings
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.insert_char(c);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn empty_input_short_circuits_everything_but_status() {
        let mut app = App::new(test_settings()).unwrap();

        sleep(Duration::from_secs_f32(3.1)).await;
        app.process_events();

        assert_eq!(app.status(), &ValidationStatus::EmptyInput);
        assert!(app.suggestions().is_empty());
        assert!(app.inferred_tasks().is_empty());
        // The AI callbacks returned Ok without a client: no failure either.
        assert!(app.last_failure().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn editing_resets_the_countdown() {
        let mut app = App::new(test_settings()).unwrap();

        type_text(&mut app, "feature/123-fix");
        sleep(Duration::from_secs_f32(2.5)).await;
        app.insert_char('!');
        sleep(Duration::from_secs_f32(2.4)).await;
        app.process_events();
        assert_eq!(app.status(), &ValidationStatus::Unchecked);

        app.backspace();
        sleep(Duration::from_secs_f32(3.6)).await;
        app.process_events();
        assert_eq!(app.status(), &ValidationStatus::Valid);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_api_key_reaches_the_failure_line() {
        let mut app = App::new(test_settings()).unwrap();

        type_text(&mut app, "feature/123-fix");
        sleep(Duration::from_secs_f32(3.6)).await;
        app.process_events();

        assert_eq!(app.status(), &ValidationStatus::Valid);
        let failure = app.last_failure().expect("missing key should be reported");
        assert!(failure.contains("API key"));
    }

    #[tokio::test(start_paused = true)]
    async fn broken_pattern_becomes_a_status_not_a_failure() {
        let mut settings = test_settings();
        settings.pattern = "(unterminated".to_owned();
        let mut app = App::new(settings).unwrap();

        type_text(&mut app, "x");
        sleep(Duration::from_secs_f32(3.6)).await;
        app.process_events();

        assert!(matches!(app.status(), ValidationStatus::PatternBroken(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_feed_the_countdown_display() {
        let mut app = App::new(test_settings()).unwrap();

        sleep(Duration::from_secs_f32(2.1)).await;
        app.process_events();
        assert_eq!(app.countdown_seconds(), 1.0);
        assert_eq!(app.target_seconds(), 3.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn completed_countdown_fills_both_panels() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "feature/1-a feature/2-b" }] }
                }]
            })))
            .mount(&server)
            .await;

        let mut settings = test_settings();
        settings.debounce = Duration::from_millis(200);
        settings.step = Duration::from_millis(50);
        settings.api_key = Some(ApiKey::new("test-key"));
        let client = GeminiClient::new(ApiKey::new("test-key"), "gemini-2.5-flash")
            .with_base_url(server.uri())
            .with_http_client(reqwest::Client::new());
        let mut app = App::with_generation_client(settings, Some(client)).unwrap();

        type_text(&mut app, "feature/123-fix");

        // Generous real-time bound: fire at ~200ms, then wait for responses.
        for _ in 0..100 {
            sleep(Duration::from_millis(50)).await;
            app.process_events();
            if !app.suggestions().is_empty()
                && app.suggestions() != [THINKING_PLACEHOLDER]
                && !app.inferred_tasks().is_empty()
                && app.inferred_tasks() != [THINKING_PLACEHOLDER]
            {
                break;
            }
        }

        assert_eq!(app.suggestions(), ["feature/1-a", "feature/2-b"]);
        assert_eq!(app.inferred_tasks(), ["feature/1-a", "feature/2-b"]);
        assert_eq!(app.status(), &ValidationStatus::Valid);
        assert!(app.last_failure().is_none());
    }
}
