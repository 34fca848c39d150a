//! End-to-end conversation tests: the state machine driven through whole
//! workflows with stub generator, dispatcher and reply sink.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::ExposeSecret;

use smart_mail_bot::assistant::replies;
use smart_mail_bot::assistant::{Assistant, Replier};
use smart_mail_bot::channels::StatusUpdate;
use smart_mail_bot::draft::prompts::draft_prompt;
use smart_mail_bot::draft::{Draft, DraftGenerator};
use smart_mail_bot::error::{DeliveryError, GenerationError, LlmError};
use smart_mail_bot::mailer::{MailDispatcher, Recipients};
use smart_mail_bot::session::{PhaseKind, SenderCredentials};

const KEY: &str = "telegram:42";
const USER: &str = "Ana";

// ── Stubs ───────────────────────────────────────────────────────────

/// Returns scripted drafts in order and records what it was asked.
#[derive(Default)]
struct StubGenerator {
    drafts: Mutex<Vec<Result<Draft, GenerationError>>>,
    calls: Mutex<Vec<(String, Option<Draft>)>>,
}

impl StubGenerator {
    fn returning(drafts: Vec<Result<Draft, GenerationError>>) -> Arc<Self> {
        Arc::new(Self {
            drafts: Mutex::new(drafts),
            calls: Mutex::default(),
        })
    }

    fn calls(&self) -> Vec<(String, Option<Draft>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DraftGenerator for StubGenerator {
    async fn generate(
        &self,
        _username: &str,
        description: &str,
        previous: Option<&Draft>,
    ) -> Result<Draft, GenerationError> {
        self.calls
            .lock()
            .unwrap()
            .push((description.to_string(), previous.cloned()));
        let mut drafts = self.drafts.lock().unwrap();
        if drafts.is_empty() {
            panic!("generator called more often than scripted");
        }
        drafts.remove(0)
    }
}

/// Records every send; fails with the configured error when set.
#[derive(Default)]
struct StubDispatcher {
    failure: Option<fn() -> DeliveryError>,
    sent: Mutex<Vec<(Vec<String>, Draft, String, String)>>,
}

impl StubDispatcher {
    fn failing(failure: fn() -> DeliveryError) -> Arc<Self> {
        Arc::new(Self {
            failure: Some(failure),
            sent: Mutex::default(),
        })
    }

    fn sent(&self) -> Vec<(Vec<String>, Draft, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailDispatcher for StubDispatcher {
    async fn send(
        &self,
        recipients: &Recipients,
        draft: &Draft,
        credentials: &SenderCredentials,
    ) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push((
            recipients.as_slice().to_vec(),
            draft.clone(),
            credentials.address().to_string(),
            credentials.secret().expose_secret().to_string(),
        ));
        match self.failure {
            Some(make) => Err(make()),
            None => Ok(()),
        }
    }
}

/// Records replies, status updates and conceal requests.
#[derive(Default)]
struct Recorder {
    replies: Mutex<Vec<String>>,
    statuses: Mutex<usize>,
    concealed: Mutex<usize>,
}

impl Recorder {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.replies.lock().unwrap())
    }
}

#[async_trait]
impl Replier for Recorder {
    async fn reply(&self, text: &str) {
        self.replies.lock().unwrap().push(text.to_string());
    }

    async fn status(&self, _status: StatusUpdate) {
        *self.statuses.lock().unwrap() += 1;
    }

    async fn conceal_input(&self) {
        *self.concealed.lock().unwrap() += 1;
    }
}

// ── Harness ─────────────────────────────────────────────────────────

struct Harness {
    assistant: Assistant,
    out: Recorder,
}

impl Harness {
    fn new(generator: Arc<StubGenerator>, dispatcher: Arc<StubDispatcher>) -> Self {
        Self {
            assistant: Assistant::new(generator, dispatcher),
            out: Recorder::default(),
        }
    }

    async fn say(&self, text: &str) -> Vec<String> {
        self.assistant.handle(KEY, USER, text, &self.out).await;
        self.out.take()
    }

    async fn phase(&self) -> PhaseKind {
        self.session(|s| s.phase_kind()).await
    }

    async fn draft(&self) -> Option<Draft> {
        self.session(|s| s.draft().cloned()).await
    }

    async fn session<T>(&self, f: impl FnOnce(&smart_mail_bot::session::Session) -> T) -> T {
        let session = self.assistant.sessions().get_or_create(KEY).await;
        let session = session.lock().await;
        f(&session)
    }

    async fn set_up(&self) {
        self.say("/setup").await;
        self.say("a@x.com").await;
        self.say("pw1").await;
    }

    /// Set up, compose, and land in the revision phase with `draft`.
    async fn with_draft(&self) {
        self.set_up().await;
        self.say("/compose").await;
        self.say("Thank the team").await;
        assert_eq!(self.phase().await, PhaseKind::AwaitingRevisionOrSend);
    }
}

fn thanks() -> Draft {
    Draft::new("Thanks", "Dear team,\n\nThank you for your work.\n\nBest,\nAna")
}

fn revised() -> Draft {
    Draft::new("Thanks!", "Hi all,\n\nHuge thanks.\n\nCheers,\nAna")
}

fn llm_failure() -> GenerationError {
    GenerationError::Llm(LlmError::RequestFailed {
        provider: "stub".into(),
        reason: "boom".into(),
    })
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn compose_without_credentials_asks_for_setup() {
    let h = Harness::new(StubGenerator::returning(vec![]), Arc::default());

    let said = h.say("/compose").await;

    assert_eq!(said, vec![replies::SETUP_REQUIRED]);
    assert_eq!(h.phase().await, PhaseKind::Idle);
}

#[tokio::test]
async fn setup_stores_credentials_and_returns_to_idle() {
    let h = Harness::new(StubGenerator::returning(vec![]), Arc::default());

    assert_eq!(h.say("/setup").await, vec![replies::SETUP_ADDRESS_PROMPT]);
    assert_eq!(h.phase().await, PhaseKind::AwaitingSetupAddress);

    h.say("  a@x.com ").await;
    assert_eq!(h.phase().await, PhaseKind::AwaitingSetupSecret);

    let said = h.say("pw1").await;
    assert_eq!(said, vec![replies::setup_complete("a@x.com")]);
    assert_eq!(h.phase().await, PhaseKind::Idle);
    assert_eq!(*h.out.concealed.lock().unwrap(), 1);

    let (address, secret_ok) = h
        .session(|s| {
            let creds = s.credentials().unwrap();
            (creds.address().to_string(), creds.secret_matches("pw1"))
        })
        .await;
    assert_eq!(address, "a@x.com");
    assert!(secret_ok);
}

#[tokio::test]
async fn slash_prefixed_secret_is_stored_and_concealed() {
    let h = Harness::new(StubGenerator::returning(vec![]), Arc::default());
    h.say("/setup").await;
    h.say("a@x.com").await;

    let said = h.say("/Xk9pQ2secret").await;

    assert_eq!(said, vec![replies::setup_complete("a@x.com")]);
    assert_eq!(h.phase().await, PhaseKind::Idle);
    assert_eq!(*h.out.concealed.lock().unwrap(), 1);
    assert!(
        h.session(|s| s.credentials().unwrap().secret_matches("/Xk9pQ2secret"))
            .await
    );
    for reply in &said {
        assert!(!reply.to_lowercase().contains("xk9pq2secret"), "leaked: {reply}");
    }
}

#[tokio::test]
async fn known_commands_still_win_during_setup() {
    let h = Harness::new(StubGenerator::returning(vec![]), Arc::default());
    h.say("/setup").await;
    h.say("a@x.com").await;

    assert_eq!(h.say("/help").await, vec![replies::help(USER)]);
    assert_eq!(h.phase().await, PhaseKind::AwaitingSetupSecret);
    assert_eq!(*h.out.concealed.lock().unwrap(), 0);
}

#[tokio::test]
async fn secret_is_stored_as_typed() {
    let h = Harness::new(StubGenerator::returning(vec![]), Arc::default());
    h.say("/setup").await;
    h.say("a@x.com").await;

    h.say(" pw with spaces ").await;

    let (exact, trimmed) = h
        .session(|s| {
            let creds = s.credentials().unwrap();
            (
                creds.secret_matches(" pw with spaces "),
                creds.secret_matches("pw with spaces"),
            )
        })
        .await;
    assert!(exact);
    assert!(!trimmed);
}

#[tokio::test]
async fn unknown_command_reply_does_not_echo_input() {
    let h = Harness::new(StubGenerator::returning(vec![]), Arc::default());

    let said = h.say("/Hunter2").await;

    assert_eq!(said, vec![replies::UNKNOWN_COMMAND]);
}

#[tokio::test]
async fn repeated_setup_restarts_and_discards_partial_input() {
    let h = Harness::new(StubGenerator::returning(vec![]), Arc::default());
    h.set_up().await;

    h.say("/setup").await;
    h.say("other@x.com").await;
    h.say("/setup").await;

    assert_eq!(h.phase().await, PhaseKind::AwaitingSetupAddress);
    assert!(h.session(|s| s.credentials().is_none()).await);

    h.say("/setup").await;
    assert_eq!(h.phase().await, PhaseKind::AwaitingSetupAddress);
}

#[tokio::test]
async fn description_produces_draft_for_review() {
    let generator = StubGenerator::returning(vec![Ok(thanks())]);
    let h = Harness::new(generator.clone(), Arc::default());
    h.set_up().await;

    assert_eq!(h.say("/compose").await, vec![replies::compose_prompt(USER)]);
    let said = h.say("Thank the team").await;

    assert_eq!(h.phase().await, PhaseKind::AwaitingRevisionOrSend);
    assert_eq!(h.draft().await, Some(thanks()));
    assert_eq!(
        said,
        vec![replies::GENERATING.to_string(), replies::draft_ready(&thanks())]
    );
    assert_eq!(generator.calls(), vec![("Thank the team".to_string(), None)]);
    assert_eq!(*h.out.statuses.lock().unwrap(), 1);
}

#[tokio::test]
async fn revision_is_generated_from_previous_draft() {
    let generator = StubGenerator::returning(vec![Ok(thanks()), Ok(revised())]);
    let h = Harness::new(generator.clone(), Arc::default());
    h.with_draft().await;

    let said = h.say("Make it more casual").await;

    assert_eq!(h.phase().await, PhaseKind::AwaitingRevisionOrSend);
    assert_eq!(h.draft().await, Some(revised()));
    assert_eq!(said.last().unwrap(), &replies::draft_revised(&revised()));

    let calls = generator.calls();
    assert_eq!(calls[1], ("Make it more casual".to_string(), Some(thanks())));

    // The prompt built for the revision carries the previous draft.
    let prompt = draft_prompt(USER, &calls[1].0, calls[1].1.as_ref());
    assert!(prompt.contains(&thanks().body));
    assert!(prompt.contains("Make it more casual"));
}

#[tokio::test]
async fn confirm_then_recipients_dispatches_and_resets() {
    let dispatcher = Arc::new(StubDispatcher::default());
    let h = Harness::new(StubGenerator::returning(vec![Ok(thanks())]), dispatcher.clone());
    h.with_draft().await;

    assert_eq!(h.say("/confirm").await, vec![replies::RECIPIENTS_PROMPT]);
    assert_eq!(h.phase().await, PhaseKind::AwaitingRecipients);
    assert_eq!(h.draft().await, Some(thanks()));

    let said = h.say("a@x.com, b@x.com").await;

    assert_eq!(
        dispatcher.sent(),
        vec![(
            vec!["a@x.com".to_string(), "b@x.com".to_string()],
            thanks(),
            "a@x.com".to_string(),
            "pw1".to_string(),
        )]
    );
    assert_eq!(
        said,
        vec![
            replies::SENDING.to_string(),
            "✅ Email sent to: a@x.com, b@x.com".to_string()
        ]
    );
    assert_eq!(h.phase().await, PhaseKind::Idle);
    assert_eq!(h.draft().await, None);
    assert!(h.session(|s| s.credentials().is_some()).await);
}

#[tokio::test]
async fn failed_dispatch_reports_and_still_resets() {
    let dispatcher = StubDispatcher::failing(|| DeliveryError::Network {
        reason: "connection refused".into(),
    });
    let h = Harness::new(StubGenerator::returning(vec![Ok(thanks())]), dispatcher.clone());
    h.with_draft().await;
    h.say("/send").await;

    let said = h.say("a@x.com").await;

    assert_eq!(dispatcher.sent().len(), 1);
    assert_eq!(
        said.last().unwrap(),
        &replies::delivery_failed(&DeliveryError::Network {
            reason: String::new()
        })
    );
    assert_eq!(h.phase().await, PhaseKind::Idle);
    assert_eq!(h.draft().await, None);
}

#[tokio::test]
async fn blank_recipients_keep_waiting_with_draft() {
    let dispatcher = Arc::new(StubDispatcher::default());
    let h = Harness::new(StubGenerator::returning(vec![Ok(thanks())]), dispatcher.clone());
    h.with_draft().await;
    h.say("/confirm").await;

    let said = h.say("  , ,  ").await;

    assert_eq!(said, vec![replies::NO_RECIPIENTS]);
    assert_eq!(h.phase().await, PhaseKind::AwaitingRecipients);
    assert_eq!(h.draft().await, Some(thanks()));
    assert!(dispatcher.sent().is_empty());
}

#[tokio::test]
async fn confirm_twice_says_already_waiting() {
    let h = Harness::new(StubGenerator::returning(vec![Ok(thanks())]), Arc::default());
    h.with_draft().await;
    h.say("/confirm").await;

    assert_eq!(
        h.say("/confirm").await,
        vec![replies::ALREADY_AWAITING_RECIPIENTS]
    );
    assert_eq!(h.phase().await, PhaseKind::AwaitingRecipients);
    assert_eq!(h.draft().await, Some(thanks()));
}

#[tokio::test]
async fn generator_failure_keeps_awaiting_content() {
    let h = Harness::new(StubGenerator::returning(vec![Err(llm_failure())]), Arc::default());
    h.set_up().await;
    h.say("/compose").await;

    let said = h.say("Thank the team").await;

    assert_eq!(h.phase().await, PhaseKind::AwaitingContent);
    assert_eq!(h.draft().await, None);
    assert_eq!(said.last().unwrap(), replies::GENERATION_FAILED);
}

#[tokio::test]
async fn revision_failure_keeps_previous_draft() {
    let malformed = GenerationError::Malformed {
        reason: "no JSON object".into(),
    };
    let h = Harness::new(
        StubGenerator::returning(vec![Ok(thanks()), Err(malformed)]),
        Arc::default(),
    );
    h.with_draft().await;

    let said = h.say("Shorter please").await;

    assert_eq!(h.phase().await, PhaseKind::AwaitingRevisionOrSend);
    assert_eq!(h.draft().await, Some(thanks()));
    assert_eq!(said.last().unwrap(), replies::REVISION_FAILED);
}

#[tokio::test]
async fn compose_restarts_and_clears_draft() {
    let h = Harness::new(StubGenerator::returning(vec![Ok(thanks())]), Arc::default());
    h.with_draft().await;

    h.say("/compose").await;

    assert_eq!(h.phase().await, PhaseKind::AwaitingContent);
    assert_eq!(h.draft().await, None);
    assert!(h.session(|s| s.credentials().is_some()).await);
}

#[tokio::test]
async fn free_text_when_idle_gets_fallback() {
    let h = Harness::new(StubGenerator::returning(vec![]), Arc::default());
    assert_eq!(h.say("hello there").await, vec![replies::FALLBACK]);
    assert_eq!(h.phase().await, PhaseKind::Idle);
}

// ── Invalid input per phase ─────────────────────────────────────────

/// An input the current phase does not accept: exactly one reply, phase and
/// draft untouched.
async fn assert_rejected(h: &Harness, input: &str) {
    let phase = h.phase().await;
    let draft = h.draft().await;

    let said = h.say(input).await;

    assert_eq!(said.len(), 1, "input {input:?} in {phase}: {said:?}");
    assert_eq!(h.phase().await, phase, "input {input:?} moved phase");
    assert_eq!(h.draft().await, draft, "input {input:?} changed draft");
}

#[tokio::test]
async fn invalid_input_leaves_every_phase_unchanged() {
    let h = Harness::new(StubGenerator::returning(vec![Ok(thanks())]), Arc::default());

    // Idle
    assert_rejected(&h, "hello").await;
    assert_rejected(&h, "/confirm").await;
    assert_rejected(&h, "/compose").await;
    assert_rejected(&h, "/bogus").await;

    // AwaitingSetupAddress
    h.say("/setup").await;
    assert_rejected(&h, "   ").await;
    assert_rejected(&h, "/confirm").await;

    // AwaitingSetupSecret
    h.say("a@x.com").await;
    assert_rejected(&h, "  ").await;
    assert_rejected(&h, "/send").await;

    // AwaitingContent
    h.say("pw1").await;
    h.say("/compose").await;
    assert_rejected(&h, "/confirm").await;
    assert_rejected(&h, "/what").await;

    // AwaitingRevisionOrSend
    h.say("Thank the team").await;
    assert_rejected(&h, "/nope").await;
    assert_rejected(&h, "/help").await;

    // AwaitingRecipients
    h.say("/confirm").await;
    assert_rejected(&h, ",,").await;
    assert_rejected(&h, "/confirm").await;
}

#[tokio::test]
async fn users_do_not_share_sessions() {
    let h = Harness::new(StubGenerator::returning(vec![]), Arc::default());
    h.set_up().await;

    let other = Recorder::default();
    h.assistant.handle("telegram:7", "Bo", "/compose", &other).await;

    assert_eq!(other.take(), vec![replies::SETUP_REQUIRED]);
    assert!(h.session(|s| s.credentials().is_some()).await);
}
