//! crates/tutor_core/src/session.rs
//!
//! The adaptive session orchestrator: a finite-state view controller that
//! routes one learner through onboarding, diagnostic, topic selection,
//! quizzes and the dashboard, and coordinates content-generation requests
//! against the `ContentProvider` port.
//!
//! Every state mutation happens in response to one discrete event and runs
//! to completion before the next event is processed; the only suspension
//! points are provider and store calls. No provider or store failure is
//! ever returned to the caller of an event method. Each call site degrades
//! to its own fallback value and logging is the only surfacing mechanism.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::content::{fallback_quiz, ActionContent, CHAT_FALLBACK_REPLY};
use crate::domain::{
    quiz_score, ActionType, AiAction, ChatMessage, ChatRole, Question, QuizResult, StudentProfile,
};
use crate::mastery::MasteryRecord;
use crate::planner::{next_action, select_difficulty};
use crate::ports::{ContentProvider, PortResult, QuizResultSink, SessionStore};

//=========================================================================================
// Session Views
//=========================================================================================

/// The view the presentation collaborator should currently render.
///
/// `Onboarding` and `Diagnostic` are each visited at most once per session;
/// `TopicSelect -> Quiz -> Dashboard -> TopicSelect` is the steady-state
/// cycle and there is no terminal view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionView {
    Onboarding,
    Diagnostic,
    TopicSelect,
    Quiz,
    Dashboard,
}

//=========================================================================================
// Background Action Fill
//=========================================================================================

/// A handle for the background content fill of the current action.
///
/// The generation counter captured here is compared against the session's
/// current counter when the fill resolves; a superseded fill is discarded
/// rather than cancelled at the transport level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFillTicket {
    pub generation: u64,
    pub topic: String,
    pub action_type: ActionType,
}

/// Everything a chat request to the provider needs, captured synchronously
/// at send time so the call itself can run without holding the session.
///
/// The generation counter plays the same role as the action-fill ticket's:
/// a reply that resolves after the dashboard session it belongs to has
/// ended is discarded instead of leaking into the next one.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub generation: u64,
    pub profile: StudentProfile,
    pub history: Vec<ChatMessage>,
    pub message: String,
    pub topic: String,
}

//=========================================================================================
// The Orchestrator
//=========================================================================================

/// Owns the transient session state for one learner and sequences the
/// tutoring loop against the injected collaborators.
pub struct SessionOrchestrator {
    view: SessionView,
    profile: Option<StudentProfile>,
    current_subject: Option<String>,
    current_topic: Option<String>,
    quiz_questions: Vec<Question>,
    diagnostic_questions: Vec<Question>,
    mastery: MasteryRecord,
    current_action: Option<AiAction>,
    /// Bumped whenever the current action is replaced or discarded; the
    /// stale-response guard for background fills keys off it.
    action_generation: u64,
    action_fill_pending: bool,
    /// Bumped whenever the chat log is cleared; a reply from a previous
    /// dashboard session carries the old value and is discarded.
    chat_generation: u64,
    chat_log: Vec<ChatMessage>,
    provider: Arc<dyn ContentProvider>,
    store: Arc<dyn SessionStore>,
    results: Arc<dyn QuizResultSink>,
}

impl SessionOrchestrator {
    /// Opens a session by reading the persisted profile and mastery
    /// snapshots once. A persisted profile means onboarding and the
    /// diagnostic are skipped and the session resumes at topic selection.
    /// Store read failures degrade to a fresh, empty session.
    pub async fn resume(
        provider: Arc<dyn ContentProvider>,
        store: Arc<dyn SessionStore>,
        results: Arc<dyn QuizResultSink>,
    ) -> Self {
        let profile = match store.load_profile().await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("failed to load persisted profile, starting fresh: {e}");
                None
            }
        };
        let mastery = match store.load_mastery().await {
            Ok(mastery) => mastery,
            Err(e) => {
                warn!("failed to load mastery record, starting empty: {e}");
                MasteryRecord::new()
            }
        };
        let view = if profile.is_some() {
            SessionView::TopicSelect
        } else {
            SessionView::Onboarding
        };
        Self {
            view,
            profile,
            current_subject: None,
            current_topic: None,
            quiz_questions: Vec::new(),
            diagnostic_questions: Vec::new(),
            mastery,
            current_action: None,
            action_generation: 0,
            action_fill_pending: false,
            chat_generation: 0,
            chat_log: Vec::new(),
            provider,
            store,
            results,
        }
    }

    //-------------------------------------------------------------------------------------
    // Transitions
    //-------------------------------------------------------------------------------------

    /// ONBOARDING -> DIAGNOSTIC (or TOPIC_SELECT when the diagnostic
    /// request fails: the diagnostic stage is skippable, not a hard
    /// dependency, so the failure is logged and swallowed).
    pub async fn complete_onboarding(&mut self, profile: StudentProfile) {
        if self.view != SessionView::Onboarding {
            warn!(view = ?self.view, "ignoring onboarding submission outside the onboarding view");
            return;
        }
        if let Err(e) = self.store.save_profile(&profile).await {
            warn!("failed to persist student profile: {e}");
        }
        let diagnostic = self.provider.generate_diagnostic(&profile).await;
        self.profile = Some(profile);
        match diagnostic {
            Ok(questions) if !questions.is_empty() => {
                self.diagnostic_questions = questions;
                self.view = SessionView::Diagnostic;
            }
            Ok(_) => {
                warn!("diagnostic generation returned no questions, skipping the stage");
                self.view = SessionView::TopicSelect;
            }
            Err(e) => {
                warn!("diagnostic generation failed, skipping the stage: {e}");
                self.view = SessionView::TopicSelect;
            }
        }
    }

    /// DIAGNOSTIC -> TOPIC_SELECT. The answers are deliberately not scored
    /// and have no mastery effect: the diagnostic informs the tutor
    /// qualitatively only.
    pub fn complete_diagnostic(&mut self, answers: &[usize]) {
        if self.view != SessionView::Diagnostic {
            warn!(view = ?self.view, "ignoring diagnostic submission outside the diagnostic view");
            return;
        }
        debug!(count = answers.len(), "diagnostic submitted");
        self.diagnostic_questions.clear();
        self.view = SessionView::TopicSelect;
    }

    /// TOPIC_SELECT -> QUIZ. Looks up prior mastery for the topic, selects
    /// the difficulty tier and awaits quiz generation; the caller is
    /// expected to show a loading state until this returns. A provider
    /// failure degrades to the designated single-item fallback quiz, which
    /// the learner can still complete.
    pub async fn select_topic(&mut self, subject: &str, topic: &str) {
        if self.view != SessionView::TopicSelect {
            warn!(view = ?self.view, "ignoring topic selection outside the topic-select view");
            return;
        }
        let Some(profile) = self.profile.clone() else {
            warn!("topic selected before onboarding completed");
            return;
        };
        self.current_subject = Some(subject.to_string());
        self.current_topic = Some(topic.to_string());

        let difficulty = select_difficulty(self.mastery.get(topic));
        debug!(topic, ?difficulty, "generating quiz");
        self.quiz_questions = match self.provider.generate_quiz(&profile, topic, difficulty).await
        {
            Ok(questions) if !questions.is_empty() => questions,
            Ok(_) => {
                warn!(topic, "quiz generation returned no questions, using the fallback quiz");
                fallback_quiz()
            }
            Err(e) => {
                warn!(topic, "quiz generation failed, using the fallback quiz: {e}");
                fallback_quiz()
            }
        };
        self.view = SessionView::Quiz;
    }

    /// QUIZ -> DASHBOARD. In order: the mastery record is written and
    /// persisted, the planner picks the next action, a *pending* action is
    /// published, the view flips to the dashboard immediately, and the quiz
    /// result is emitted to the telemetry sink. The returned ticket drives
    /// the background content fill; the dashboard is never blocked on it.
    pub async fn complete_quiz(&mut self, correct: usize, total: usize) -> Option<ActionFillTicket> {
        if self.view != SessionView::Quiz {
            warn!(view = ?self.view, "ignoring quiz completion outside the quiz view");
            return None;
        }
        let (Some(profile), Some(topic)) = (self.profile.clone(), self.current_topic.clone())
        else {
            warn!("quiz completed without an active topic");
            return None;
        };

        let score = quiz_score(correct, total);
        self.mastery.set(&topic, score);
        if let Err(e) = self.store.save_mastery(&self.mastery).await {
            warn!("failed to persist mastery record: {e}");
        }

        let action_type = next_action(score);
        let now = Utc::now();
        self.action_generation += 1;
        self.current_action = Some(AiAction::pending(action_type, topic.clone(), now));
        self.action_fill_pending = true;
        self.quiz_questions.clear();
        self.view = SessionView::Dashboard;

        if self.chat_log.is_empty() {
            self.chat_log.push(ChatMessage {
                role: ChatRole::Model,
                text: format!(
                    "Namaste {}! I am your AI tutor. Ask me anything about {}.",
                    profile.name, profile.subject
                ),
            });
        }

        // Fire-and-forget: a delivery failure must not block the transition.
        let result = QuizResult {
            student_id: profile.id,
            topic: topic.clone(),
            score,
            timestamp: now,
        };
        if let Err(e) = self.results.submit(&result).await {
            warn!("quiz result submission failed: {e}");
        }

        Some(ActionFillTicket {
            generation: self.action_generation,
            topic,
            action_type,
        })
    }

    /// Applies the outcome of a background content fill. The merge happens
    /// if and only if the ticket's generation still matches the current
    /// one: a result that resolves after a newer action has been published
    /// is discarded. A failed fill leaves the action's content empty
    /// indefinitely; there is no automatic retry.
    pub fn apply_action_fill(&mut self, generation: u64, outcome: PortResult<ActionContent>) {
        if generation != self.action_generation {
            debug!(
                stale = generation,
                current = self.action_generation,
                "discarding stale action content"
            );
            return;
        }
        self.action_fill_pending = false;
        match outcome {
            Ok(content) => {
                if let Some(action) = self.current_action.as_mut() {
                    action.title = Some(content.title);
                    action.description = Some(content.description);
                    action.content = content.content;
                }
            }
            Err(e) => warn!("action content generation failed, leaving content empty: {e}"),
        }
    }

    /// DASHBOARD -> TOPIC_SELECT. The current action is discarded, not
    /// archived, and a still-in-flight fill for it becomes stale.
    pub fn start_new_topic(&mut self) {
        if self.view != SessionView::Dashboard {
            warn!(view = ?self.view, "ignoring new-topic request outside the dashboard view");
            return;
        }
        self.action_generation += 1;
        self.current_action = None;
        self.action_fill_pending = false;
        self.chat_generation += 1;
        self.chat_log.clear();
        self.view = SessionView::TopicSelect;
    }

    //-------------------------------------------------------------------------------------
    // Dashboard chat
    //-------------------------------------------------------------------------------------

    /// Appends a user message to the chat log synchronously and captures
    /// the request the provider call needs. Messages land in the log in
    /// send order even when an earlier reply is still in flight.
    pub fn push_chat_message(&mut self, text: &str) -> Option<ChatRequest> {
        if self.view != SessionView::Dashboard {
            warn!(view = ?self.view, "ignoring chat message outside the dashboard view");
            return None;
        }
        let profile = self.profile.clone()?;
        self.chat_log.push(ChatMessage {
            role: ChatRole::User,
            text: text.to_string(),
        });
        let topic = self
            .current_action
            .as_ref()
            .map(|action| action.topic.clone())
            .unwrap_or_else(|| profile.subject.clone());
        Some(ChatRequest {
            generation: self.chat_generation,
            history: self.chat_log.clone(),
            message: text.to_string(),
            topic,
            profile,
        })
    }

    /// Appends the model's reply, or the fixed apology when the provider
    /// call failed. No retry and no history truncation. A reply whose
    /// generation predates the current dashboard session is discarded: its
    /// log was already cleared and the reply must not resurface in the
    /// next one.
    pub fn apply_chat_reply(&mut self, generation: u64, outcome: PortResult<String>) {
        if generation != self.chat_generation {
            debug!(
                stale = generation,
                current = self.chat_generation,
                "discarding chat reply from an ended dashboard session"
            );
            return;
        }
        let text = match outcome {
            Ok(reply) => reply,
            Err(e) => {
                warn!("chat reply failed: {e}");
                CHAT_FALLBACK_REPLY.to_string()
            }
        };
        self.chat_log.push(ChatMessage {
            role: ChatRole::Model,
            text,
        });
    }

    //-------------------------------------------------------------------------------------
    // Accessors for the presentation collaborator
    //-------------------------------------------------------------------------------------

    pub fn view(&self) -> SessionView {
        self.view
    }

    pub fn profile(&self) -> Option<&StudentProfile> {
        self.profile.as_ref()
    }

    /// The in-flight question batch: quiz questions in the quiz view,
    /// diagnostic questions in the diagnostic view.
    pub fn questions(&self) -> &[Question] {
        match self.view {
            SessionView::Diagnostic => &self.diagnostic_questions,
            _ => &self.quiz_questions,
        }
    }

    pub fn current_action(&self) -> Option<&AiAction> {
        self.current_action.as_ref()
    }

    pub fn action_fill_pending(&self) -> bool {
        self.action_fill_pending
    }

    pub fn mastery(&self) -> &MasteryRecord {
        &self.mastery
    }

    pub fn chat_log(&self) -> &[ChatMessage] {
        &self.chat_log
    }

    pub fn current_topic(&self) -> Option<&str> {
        self.current_topic.as_deref()
    }

    pub fn current_subject(&self) -> Option<&str> {
        self.current_subject.as_deref()
    }

    /// A handle to the content provider for background tasks that must run
    /// outside the session lock.
    pub fn provider(&self) -> Arc<dyn ContentProvider> {
        Arc::clone(&self.provider)
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::domain::{Difficulty, Goal};
    use crate::ports::PortError;

    fn profile() -> StudentProfile {
        StudentProfile {
            id: uuid::Uuid::new_v4(),
            name: "Aarav".to_string(),
            class_level: "Grade 8".to_string(),
            subject: "Mathematics".to_string(),
            goal: Goal::Basics,
            language: "English".to_string(),
            daily_time_minutes: Some(30),
        }
    }

    fn question_batch(prefix: &str, n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| Question {
                id: format!("{prefix}-{i}"),
                text: format!("Question {i}?"),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct_option_index: 0,
                explanation: None,
            })
            .collect()
    }

    /// A scriptable provider: each request kind can be set to fail, and
    /// quiz requests are recorded so tests can assert on the difficulty
    /// the orchestrator asked for.
    #[derive(Default)]
    struct MockProvider {
        fail_diagnostic: bool,
        fail_quiz: bool,
        quiz_requests: Mutex<Vec<(String, Difficulty)>>,
    }

    #[async_trait::async_trait]
    impl ContentProvider for MockProvider {
        async fn generate_diagnostic(
            &self,
            _profile: &StudentProfile,
        ) -> PortResult<Vec<Question>> {
            if self.fail_diagnostic {
                return Err(PortError::Provider("diagnostic backend down".into()));
            }
            Ok(question_batch("d", 5))
        }

        async fn generate_quiz(
            &self,
            _profile: &StudentProfile,
            topic: &str,
            difficulty: Difficulty,
        ) -> PortResult<Vec<Question>> {
            self.quiz_requests
                .lock()
                .unwrap()
                .push((topic.to_string(), difficulty));
            if self.fail_quiz {
                return Err(PortError::Provider("quiz backend down".into()));
            }
            Ok(question_batch("q", 5))
        }

        async fn generate_action_content(
            &self,
            _profile: &StudentProfile,
            _topic: &str,
            _action_type: ActionType,
        ) -> PortResult<ActionContent> {
            Ok(ActionContent {
                title: "t".into(),
                description: "d".into(),
                content: "c".into(),
            })
        }

        async fn chat(
            &self,
            _profile: &StudentProfile,
            _history: &[ChatMessage],
            _message: &str,
            _topic: &str,
        ) -> PortResult<String> {
            Ok("reply".into())
        }
    }

    /// An in-memory store mirroring the two-keyed-entries persistence
    /// contract.
    #[derive(Default)]
    struct MemoryStore {
        profile: Mutex<Option<StudentProfile>>,
        mastery: Mutex<MasteryRecord>,
    }

    #[async_trait::async_trait]
    impl SessionStore for MemoryStore {
        async fn load_profile(&self) -> PortResult<Option<StudentProfile>> {
            Ok(self.profile.lock().unwrap().clone())
        }
        async fn save_profile(&self, profile: &StudentProfile) -> PortResult<()> {
            *self.profile.lock().unwrap() = Some(profile.clone());
            Ok(())
        }
        async fn load_mastery(&self) -> PortResult<MasteryRecord> {
            Ok(self.mastery.lock().unwrap().clone())
        }
        async fn save_mastery(&self, mastery: &MasteryRecord) -> PortResult<()> {
            *self.mastery.lock().unwrap() = mastery.clone();
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        submitted: Mutex<Vec<QuizResult>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl QuizResultSink for RecordingSink {
        async fn submit(&self, result: &QuizResult) -> PortResult<()> {
            self.submitted.lock().unwrap().push(result.clone());
            if self.fail {
                return Err(PortError::Unexpected("telemetry endpoint down".into()));
            }
            Ok(())
        }
    }

    struct Harness {
        provider: Arc<MockProvider>,
        store: Arc<MemoryStore>,
        sink: Arc<RecordingSink>,
    }

    impl Harness {
        fn new(provider: MockProvider) -> Self {
            Self {
                provider: Arc::new(provider),
                store: Arc::new(MemoryStore::default()),
                sink: Arc::new(RecordingSink::default()),
            }
        }

        async fn session(&self) -> SessionOrchestrator {
            SessionOrchestrator::resume(
                self.provider.clone(),
                self.store.clone(),
                self.sink.clone(),
            )
            .await
        }
    }

    #[tokio::test]
    async fn fresh_session_starts_at_onboarding() {
        let harness = Harness::new(MockProvider::default());
        let session = harness.session().await;
        assert_eq!(session.view(), SessionView::Onboarding);
        assert!(session.profile().is_none());
    }

    #[tokio::test]
    async fn persisted_profile_skips_onboarding_and_diagnostic() {
        let harness = Harness::new(MockProvider::default());
        harness.store.save_profile(&profile()).await.unwrap();

        let session = harness.session().await;
        assert_eq!(session.view(), SessionView::TopicSelect);
        assert!(session.profile().is_some());
    }

    #[tokio::test]
    async fn onboarding_persists_profile_and_enters_diagnostic() {
        let harness = Harness::new(MockProvider::default());
        let mut session = harness.session().await;

        session.complete_onboarding(profile()).await;
        assert_eq!(session.view(), SessionView::Diagnostic);
        assert_eq!(session.questions().len(), 5);
        assert!(harness.store.profile.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_diagnostic_is_skipped_silently() {
        let harness = Harness::new(MockProvider {
            fail_diagnostic: true,
            ..Default::default()
        });
        let mut session = harness.session().await;

        session.complete_onboarding(profile()).await;
        assert_eq!(session.view(), SessionView::TopicSelect);
        assert!(session.questions().is_empty());
    }

    #[tokio::test]
    async fn diagnostic_answers_leave_mastery_untouched() {
        let harness = Harness::new(MockProvider::default());
        let mut session = harness.session().await;

        session.complete_onboarding(profile()).await;
        session.complete_diagnostic(&[0, 1, 2, 3, 0]);
        assert_eq!(session.view(), SessionView::TopicSelect);
        assert!(session.mastery().is_empty());
    }

    #[tokio::test]
    async fn first_quiz_on_a_topic_is_average_difficulty() {
        let harness = Harness::new(MockProvider::default());
        harness.store.save_profile(&profile()).await.unwrap();
        let mut session = harness.session().await;

        session.select_topic("Mathematics", "Algebra").await;
        assert_eq!(session.view(), SessionView::Quiz);
        assert_eq!(session.questions().len(), 5);

        let requests = harness.provider.quiz_requests.lock().unwrap();
        assert_eq!(requests[0], ("Algebra".to_string(), Difficulty::Average));
    }

    #[tokio::test]
    async fn weak_mastery_selects_a_weak_quiz() {
        let harness = Harness::new(MockProvider::default());
        harness.store.save_profile(&profile()).await.unwrap();
        {
            let mut mastery = MasteryRecord::new();
            mastery.set("Algebra", 35);
            harness.store.save_mastery(&mastery).await.unwrap();
        }
        let mut session = harness.session().await;

        session.select_topic("Mathematics", "Algebra").await;
        let requests = harness.provider.quiz_requests.lock().unwrap();
        assert_eq!(requests[0], ("Algebra".to_string(), Difficulty::Weak));
    }

    #[tokio::test]
    async fn quiz_completion_updates_mastery_and_publishes_pending_action() {
        let harness = Harness::new(MockProvider::default());
        harness.store.save_profile(&profile()).await.unwrap();
        let mut session = harness.session().await;
        session.select_topic("Mathematics", "Algebra").await;

        // 3 of 5 correct: 60%, mid band.
        let ticket = session.complete_quiz(3, 5).await.unwrap();
        assert_eq!(session.view(), SessionView::Dashboard);
        assert_eq!(session.mastery().get("Algebra"), Some(60));
        assert_eq!(ticket.action_type, ActionType::Practice);

        let action = session.current_action().unwrap();
        assert_eq!(action.action_type, ActionType::Practice);
        assert_eq!(action.topic, "Algebra");
        assert_eq!(action.content, "");
        assert!(session.action_fill_pending());

        // The mastery write was persisted immediately.
        assert_eq!(
            harness.store.mastery.lock().unwrap().get("Algebra"),
            Some(60)
        );

        // The quiz result was emitted to the telemetry sink.
        let submitted = harness.sink.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].topic, "Algebra");
        assert_eq!(submitted[0].score, 60);
    }

    #[tokio::test]
    async fn telemetry_failure_does_not_block_the_transition() {
        let harness = Harness {
            provider: Arc::new(MockProvider::default()),
            store: Arc::new(MemoryStore::default()),
            sink: Arc::new(RecordingSink {
                fail: true,
                ..Default::default()
            }),
        };
        harness.store.save_profile(&profile()).await.unwrap();
        let mut session = harness.session().await;
        session.select_topic("Mathematics", "Algebra").await;

        let ticket = session.complete_quiz(5, 5).await;
        assert!(ticket.is_some());
        assert_eq!(session.view(), SessionView::Dashboard);
    }

    #[tokio::test]
    async fn failed_quiz_generation_degrades_to_the_fallback_quiz() {
        let harness = Harness::new(MockProvider {
            fail_quiz: true,
            ..Default::default()
        });
        harness.store.save_profile(&profile()).await.unwrap();
        let mut session = harness.session().await;

        session.select_topic("Mathematics", "Algebra").await;
        assert_eq!(session.view(), SessionView::Quiz);
        assert_eq!(session.questions().len(), 1);
        assert_eq!(session.questions()[0].options, vec!["Retry"]);

        // Completing the one-question quiz still yields a defined score.
        let ticket = session.complete_quiz(1, 1).await.unwrap();
        assert_eq!(session.mastery().get("Algebra"), Some(100));
        assert_eq!(ticket.action_type, ActionType::Advance);
    }

    #[tokio::test]
    async fn action_fill_merges_into_the_current_action() {
        let harness = Harness::new(MockProvider::default());
        harness.store.save_profile(&profile()).await.unwrap();
        let mut session = harness.session().await;
        session.select_topic("Mathematics", "Algebra").await;
        let ticket = session.complete_quiz(2, 5).await.unwrap();

        session.apply_action_fill(
            ticket.generation,
            Ok(ActionContent {
                title: "Back to Basics".into(),
                description: "Revise the fundamentals.".into(),
                content: "Count mangoes in groups of ten.".into(),
            }),
        );

        let action = session.current_action().unwrap();
        assert_eq!(action.title.as_deref(), Some("Back to Basics"));
        assert_eq!(action.content, "Count mangoes in groups of ten.");
        assert!(!session.action_fill_pending());
    }

    #[tokio::test]
    async fn failed_action_fill_leaves_content_empty() {
        let harness = Harness::new(MockProvider::default());
        harness.store.save_profile(&profile()).await.unwrap();
        let mut session = harness.session().await;
        session.select_topic("Mathematics", "Algebra").await;
        let ticket = session.complete_quiz(1, 5).await.unwrap();
        assert_eq!(ticket.action_type, ActionType::Remedial);

        session.apply_action_fill(
            ticket.generation,
            Err(PortError::Provider("generation backend down".into())),
        );

        let action = session.current_action().unwrap();
        assert_eq!(action.content, "");
        assert_eq!(action.title, None);
        assert!(!session.action_fill_pending());
    }

    #[tokio::test]
    async fn stale_action_fill_is_discarded() {
        let harness = Harness::new(MockProvider::default());
        harness.store.save_profile(&profile()).await.unwrap();
        let mut session = harness.session().await;

        session.select_topic("Mathematics", "Algebra").await;
        let old_ticket = session.complete_quiz(5, 5).await.unwrap();

        // A newer quiz cycle publishes action B while A's fill is in flight.
        session.start_new_topic();
        session.select_topic("Mathematics", "Geometry").await;
        let new_ticket = session.complete_quiz(0, 5).await.unwrap();

        session.apply_action_fill(
            old_ticket.generation,
            Ok(ActionContent {
                title: "Stale".into(),
                description: "Stale".into(),
                content: "Stale".into(),
            }),
        );

        // B's fields are untouched and its fill is still pending.
        let action = session.current_action().unwrap();
        assert_eq!(action.topic, "Geometry");
        assert_eq!(action.content, "");
        assert!(session.action_fill_pending());

        session.apply_action_fill(
            new_ticket.generation,
            Ok(ActionContent {
                title: "Fresh".into(),
                description: "Fresh".into(),
                content: "Fresh".into(),
            }),
        );
        assert_eq!(session.current_action().unwrap().content, "Fresh");
    }

    #[tokio::test]
    async fn new_topic_discards_the_current_action() {
        let harness = Harness::new(MockProvider::default());
        harness.store.save_profile(&profile()).await.unwrap();
        let mut session = harness.session().await;
        session.select_topic("Mathematics", "Algebra").await;
        let ticket = session.complete_quiz(4, 5).await.unwrap();

        session.start_new_topic();
        assert_eq!(session.view(), SessionView::TopicSelect);
        assert!(session.current_action().is_none());
        assert!(session.chat_log().is_empty());

        // A fill resolving after the discard must not resurrect the action.
        session.apply_action_fill(
            ticket.generation,
            Ok(ActionContent {
                title: "Late".into(),
                description: "Late".into(),
                content: "Late".into(),
            }),
        );
        assert!(session.current_action().is_none());
    }

    #[tokio::test]
    async fn chat_messages_append_in_send_order_with_fallback_replies() {
        let harness = Harness::new(MockProvider::default());
        harness.store.save_profile(&profile()).await.unwrap();
        let mut session = harness.session().await;
        session.select_topic("Mathematics", "Algebra").await;
        session.complete_quiz(3, 5).await;

        // Greeting is seeded on first entering the dashboard.
        assert_eq!(session.chat_log().len(), 1);
        assert_eq!(session.chat_log()[0].role, ChatRole::Model);

        // Two messages sent while the first reply is still in flight.
        let first = session.push_chat_message("What is a variable?").unwrap();
        let second = session.push_chat_message("And a constant?").unwrap();
        assert_eq!(first.topic, "Algebra");
        assert_eq!(session.chat_log()[1].text, "What is a variable?");
        assert_eq!(session.chat_log()[2].text, "And a constant?");
        // The second request carries the full history including both sends.
        assert_eq!(second.history.len(), 3);

        session.apply_chat_reply(first.generation, Err(PortError::Provider("timeout".into())));
        session.apply_chat_reply(second.generation, Ok("A constant never changes.".into()));

        let log = session.chat_log();
        assert_eq!(log.len(), 5);
        assert_eq!(log[3].text, CHAT_FALLBACK_REPLY);
        assert_eq!(log[4].text, "A constant never changes.");
    }

    #[tokio::test]
    async fn late_chat_reply_after_leaving_the_dashboard_is_discarded() {
        let harness = Harness::new(MockProvider::default());
        harness.store.save_profile(&profile()).await.unwrap();
        let mut session = harness.session().await;
        session.select_topic("Mathematics", "Algebra").await;
        session.complete_quiz(3, 5).await;

        let request = session.push_chat_message("What is a variable?").unwrap();
        session.start_new_topic();
        assert!(session.chat_log().is_empty());

        // The reply resolves after the dashboard session ended; the cleared
        // log must stay empty.
        session.apply_chat_reply(request.generation, Ok("Late reply".into()));
        assert!(session.chat_log().is_empty());

        // The next dashboard session starts from its own greeting only.
        session.select_topic("Mathematics", "Geometry").await;
        session.complete_quiz(5, 5).await;
        assert_eq!(session.chat_log().len(), 1);
        assert_eq!(session.chat_log()[0].role, ChatRole::Model);
        assert!(!session.chat_log()[0].text.contains("Late reply"));

        // A reply for the current session still lands.
        let fresh = session.push_chat_message("What is an angle?").unwrap();
        session.apply_chat_reply(fresh.generation, Ok("A turn between two rays.".into()));
        assert_eq!(session.chat_log().len(), 3);
    }

    #[tokio::test]
    async fn chat_outside_the_dashboard_is_ignored() {
        let harness = Harness::new(MockProvider::default());
        harness.store.save_profile(&profile()).await.unwrap();
        let mut session = harness.session().await;

        assert!(session.push_chat_message("hello?").is_none());
        assert!(session.chat_log().is_empty());
    }

    #[tokio::test]
    async fn out_of_order_events_do_not_move_the_machine() {
        let harness = Harness::new(MockProvider::default());
        harness.store.save_profile(&profile()).await.unwrap();
        let mut session = harness.session().await;

        // Onboarding and the diagnostic are never revisited.
        session.complete_onboarding(profile()).await;
        assert_eq!(session.view(), SessionView::TopicSelect);
        session.complete_diagnostic(&[0]);
        assert_eq!(session.view(), SessionView::TopicSelect);

        // Quiz completion without a quiz in flight is a no-op.
        assert!(session.complete_quiz(5, 5).await.is_none());
        assert_eq!(session.view(), SessionView::TopicSelect);
    }
}
