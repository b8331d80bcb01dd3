//! End-to-end session tests.
//!
//! A full [`SessionLoop`] over typed input, a mock completion service and a
//! keyword log in a temporary directory.

use async_trait::async_trait;
use crax::actions::{ActionHandler, FnAction, NoAction};
use crax::classifier::ClassifierOptions;
use crax::llm::{OpenAiClientConfig, OpenAiCompletionClient};
use crax::responder::ResponderOptions;
use crax::stt::TextRecognizer;
use crax::tts::Speaker;
use crax::{
    ActionRegistry, ExitReason, IntentClassifier, Keyword, KeywordStore, ResponseGenerator,
    SessionLoop, SessionOptions,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Clone, Default)]
struct Transcript(Arc<Mutex<Vec<String>>>);

impl Transcript {
    fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl Speaker for Transcript {
    async fn speak(&mut self, text: &str, _wait: bool) -> crax::Result<()> {
        if !text.is_empty() {
            self.0.lock().unwrap().push(text.to_owned());
        }
        Ok(())
    }
}

fn reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    }))
}

/// Classification prompts contain the utterance; confirmation prompts
/// contain the keyword in quotes.
async fn mount(server: &MockServer, needle: &str, content: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains(needle))
        .respond_with(reply(content))
        .mount(server)
        .await;
}

fn session(
    server: &MockServer,
    input: &'static str,
    registry: ActionRegistry,
    store: KeywordStore,
    speaker: Transcript,
) -> SessionLoop {
    let config = OpenAiClientConfig::new(server.uri(), "gpt-4").with_api_key("test-key");
    let service = Arc::new(OpenAiCompletionClient::new(config).unwrap());
    SessionLoop::new(
        Box::new(TextRecognizer::new(input.as_bytes())),
        Box::new(speaker),
        IntentClassifier::new(service.clone(), ClassifierOptions::default()),
        ResponseGenerator::new(service, ResponderOptions::default()),
        registry,
        store,
        SessionOptions {
            cooldown: Duration::ZERO,
            ..SessionOptions::default()
        },
    )
}

fn counting(name: &str, hits: Arc<AtomicUsize>) -> Arc<dyn ActionHandler> {
    Arc::new(FnAction::new(name, move |_| {
        hits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }))
}

#[tokio::test]
async fn test_learned_keyword_survives_restart() {
    let server = MockServer::start().await;
    mount(&server, "hallway lamp", "NEW:lamp").await;
    mount(&server, "performs 'lamp'", "Lamp is on.").await;
    mount(&server, "bedroom lamp", "lamp").await;
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("keywords.json");

    let fallback_hits = Arc::new(AtomicUsize::new(0));
    let transcript = Transcript::default();
    let mut first = session(
        &server,
        "turn on the hallway lamp\nstop listening\n",
        ActionRegistry::new(counting("fallback", fallback_hits.clone())),
        KeywordStore::new(&log),
        transcript.clone(),
    );
    let summary = first.run(CancellationToken::new()).await.unwrap();

    assert_eq!(summary.exit, ExitReason::ExitPhrase);
    assert_eq!(summary.learned, vec![Keyword::new("lamp").unwrap()]);
    assert_eq!(fallback_hits.load(Ordering::SeqCst), 1);
    let on_disk: Vec<String> =
        serde_json::from_str(&std::fs::read_to_string(&log).unwrap()).unwrap();
    assert_eq!(on_disk, vec!["lamp"]);
    assert_eq!(transcript.lines()[1], "Lamp is on.");

    // A new session sees the learned keyword as known: a bare "lamp" reply
    // is accepted instead of rejected as an unmarked unknown.
    let lamp_hits = Arc::new(AtomicUsize::new(0));
    let mut registry = ActionRegistry::new(Arc::new(NoAction));
    registry.register(Keyword::new("lamp").unwrap(), counting("lamp", lamp_hits.clone()));
    let mut second = session(
        &server,
        "dim the bedroom lamp\n",
        registry,
        KeywordStore::new(&log),
        Transcript::default(),
    );
    assert!(second.known().contains(&Keyword::new("lamp").unwrap()));

    let summary = second.run(CancellationToken::new()).await.unwrap();
    assert_eq!(summary.exit, ExitReason::InputClosed);
    assert!(summary.learned.is_empty());
    assert_eq!(lamp_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_service_outage_apologizes_and_keeps_listening() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let store = KeywordStore::new(dir.path().join("keywords.json"));

    let transcript = Transcript::default();
    let mut s = session(
        &server,
        "play some music\nturn on the fan\nquit\n",
        ActionRegistry::builtin(),
        store.clone(),
        transcript.clone(),
    );
    let summary = s.run(CancellationToken::new()).await.unwrap();

    assert_eq!(summary.exit, ExitReason::ExitPhrase);
    assert_eq!(summary.utterances, 3);
    assert_eq!(summary.dispatched, 0);
    assert_eq!(summary.errors, 2);
    assert_eq!(
        transcript.lines(),
        vec![
            "CRA-X ready. Say a command or say 'stop listening' to quit.",
            "I had trouble understanding. Try again.",
            "I had trouble understanding. Try again.",
            "Goodbye!",
        ]
    );
    assert!(!store.path().exists());
}
