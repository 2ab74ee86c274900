use anyhow::Result;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::context::{self, ContextPolicy, FullHistory};
use crate::documents::{self, DocumentLimit, DocumentLoadError, DocumentStore};
use crate::model::Message;
use crate::model_gateway::{CompletionGateway, CompletionRequest};
use crate::transcript::{Entry, Transcript};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. \
You provide clear, accurate, and helpful responses. \
When working with documents, you analyze them carefully and provide insights based on their content. \
If you're unsure about something, you acknowledge the uncertainty.";

/// A single conversation with a completion endpoint.
///
/// Every request replays the transcript through the session's
/// [`ContextPolicy`]. Loaded documents are embedded as a user/assistant
/// pair so the model sees them as earlier turns.
pub struct ChatSession<G> {
    gateway: G,
    policy: Box<dyn ContextPolicy>,
    document_limit: DocumentLimit,
    documents: DocumentStore,
    system_prompt: String,
    transcript: Transcript,
}

impl<G> ChatSession<G>
where
    G: CompletionGateway,
{
    pub fn new(gateway: G, system_prompt: Option<&str>) -> Self {
        let system_prompt = resolve_system_prompt(system_prompt);
        Self {
            gateway,
            policy: Box::new(FullHistory),
            document_limit: DocumentLimit::default(),
            documents: DocumentStore::default(),
            transcript: Transcript::new(system_prompt.clone()),
            system_prompt,
        }
    }

    pub fn from_config(gateway: G, cfg: &Config) -> Self {
        let mut session = Self::new(gateway, cfg.system_prompt.as_deref());
        session.policy = context::policy_for(cfg.context_max_messages);
        session.document_limit = cfg.document_limit;
        session
    }

    pub fn with_context_policy(mut self, policy: impl ContextPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn with_document_limit(mut self, limit: DocumentLimit) -> Self {
        self.document_limit = limit;
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn transcript(&self) -> &[Entry] {
        self.transcript.entries()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.transcript.messages()
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn context_policy(&self) -> &dyn ContextPolicy {
        self.policy.as_ref()
    }

    /// Loads a document into the conversation, returning its filename.
    pub fn try_load_document(&mut self, path: impl AsRef<Path>) -> Result<String, DocumentLoadError> {
        let path = path.as_ref();
        let doc = documents::read_document(path, self.document_limit)?;
        if doc.truncated {
            warn!(
                path = %path.display(),
                max_bytes = ?self.document_limit.max_bytes,
                "document truncated to size limit"
            );
        }

        self.transcript.push_committed(Message::user(format!(
            "I'm sharing a document with you. Filename: {}\nContent: {}",
            doc.filename, doc.content
        )));
        self.transcript.push_committed(Message::assistant(format!(
            "I've received the document '{}' and will consider its contents in our conversation.",
            doc.filename
        )));
        info!(
            filename = %doc.filename,
            content_len = doc.content.len(),
            "loaded document into conversation"
        );
        self.documents.insert(doc.filename.clone(), doc.content);
        Ok(doc.filename)
    }

    pub fn load_document(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match self.try_load_document(path) {
            Ok(_) => true,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to load document");
                false
            }
        }
    }

    /// Sends one chat turn. A failed turn stays in the transcript marked failed.
    pub async fn try_send(&mut self, user_input: &str) -> Result<String> {
        let turn = self.transcript.push_pending(Message::user(user_input));
        let messages = self.policy.assemble(&self.transcript.replayable());
        debug!(
            policy = self.policy.name(),
            transcript_len = self.transcript.len(),
            message_count = messages.len(),
            "assembled request context"
        );

        match self.gateway.complete(CompletionRequest { messages }).await {
            Ok(reply) => {
                self.transcript.commit(turn);
                self.transcript.push_committed(Message::assistant(reply.clone()));
                Ok(reply)
            }
            Err(err) => {
                self.transcript.fail(turn, format!("{err:#}"));
                Err(err)
            }
        }
    }

    pub async fn send(&mut self, user_input: &str) -> String {
        match self.try_send(user_input).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "chat turn failed");
                format!("Error generating response: {err:#}")
            }
        }
    }

    pub fn update_system_prompt(&mut self, new_prompt: &str) {
        self.system_prompt = resolve_system_prompt(Some(new_prompt));
        self.transcript.reset(self.system_prompt.clone());
        info!("system prompt updated; conversation history cleared");
    }
}

fn resolve_system_prompt(prompt: Option<&str>) -> String {
    prompt
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::{ChatSession, DEFAULT_SYSTEM_PROMPT};
    use crate::config::Config;
    use crate::context::RecentWindow;
    use crate::documents::{DocumentLimit, OversizePolicy};
    use crate::model::{Message, MessageRole};
    use crate::model_gateway::{CompletionFuture, CompletionGateway, CompletionRequest};
    use crate::transcript::TurnStatus;

    #[derive(Debug)]
    enum StubOutcome {
        Ok(String),
        Err(String),
    }

    #[derive(Debug, Default)]
    struct StubGateway {
        calls: RefCell<Vec<Vec<Message>>>,
        outcomes: RefCell<VecDeque<StubOutcome>>,
    }

    impl StubGateway {
        fn replying(outcomes: impl IntoIterator<Item = StubOutcome>) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                outcomes: RefCell::new(outcomes.into_iter().collect()),
            }
        }

        fn ok(content: &str) -> Self {
            Self::replying([StubOutcome::Ok(content.to_string())])
        }

        fn err(message: &str) -> Self {
            Self::replying([StubOutcome::Err(message.to_string())])
        }
    }

    impl CompletionGateway for StubGateway {
        fn complete<'a>(&'a self, request: CompletionRequest) -> CompletionFuture<'a> {
            self.calls.borrow_mut().push(request.messages);
            let result = match self.outcomes.borrow_mut().pop_front() {
                Some(StubOutcome::Ok(content)) => Ok(content),
                Some(StubOutcome::Err(message)) => Err(anyhow!(message)),
                None => Err(anyhow!("stub gateway has no scripted reply")),
            };
            Box::pin(async move { result })
        }
    }

    fn temp_document(name: &str, content: &str) -> PathBuf {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock should be after unix epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "docchat-session-{stamp}-{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).expect("failed to create temp directory");
        let path = dir.join(name);
        fs::write(&path, content).expect("failed to write document");
        path
    }

    #[test]
    fn new_without_prompt_uses_default_system_message() {
        let session = ChatSession::new(StubGateway::default(), None);
        assert_eq!(session.messages(), vec![Message::system(DEFAULT_SYSTEM_PROMPT)]);
        assert!(session.documents().is_empty());
    }

    #[test]
    fn new_with_blank_prompt_uses_default() {
        let session = ChatSession::new(StubGateway::default(), Some("   "));
        assert_eq!(session.system_prompt(), DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn new_with_custom_prompt_uses_it_verbatim() {
        let session = ChatSession::new(StubGateway::default(), Some("You are John's editor."));
        assert_eq!(
            session.messages(),
            vec![Message::system("You are John's editor.")]
        );
    }

    #[test]
    fn from_config_applies_prompt_window_and_document_limit() {
        let cfg = Config {
            system_prompt: Some("cfg prompt".to_string()),
            context_max_messages: Some(6),
            document_limit: DocumentLimit {
                max_bytes: Some(3),
                on_oversize: OversizePolicy::Reject,
            },
            ..Config::default()
        };
        let mut session = ChatSession::from_config(StubGateway::default(), &cfg);
        assert_eq!(session.system_prompt(), "cfg prompt");
        assert_eq!(session.context_policy().name(), "recent-window");

        let path = temp_document("long.txt", "too long");
        assert!(!session.load_document(&path));
        assert_eq!(session.transcript().len(), 1);
    }

    #[test]
    fn load_document_appends_announcement_and_acknowledgement() {
        let path = temp_document("draft.md", "First line\nSecond line");
        let mut session = ChatSession::new(StubGateway::default(), None);

        assert!(session.load_document(&path));
        let messages = session.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, MessageRole::User);
        assert_eq!(
            messages[1].content,
            "I'm sharing a document with you. Filename: draft.md\nContent: First line\nSecond line"
        );
        assert_eq!(messages[2].role, MessageRole::Assistant);
        assert!(messages[2].content.contains("'draft.md'"));
        assert_eq!(
            session.documents().get("draft.md"),
            Some("First line\nSecond line")
        );
    }

    #[test]
    fn load_document_on_missing_path_leaves_state_unchanged() {
        let mut session = ChatSession::new(StubGateway::default(), None);
        assert!(!session.load_document("/no/such/dir/missing.txt"));
        assert_eq!(session.transcript().len(), 1);
        assert!(session.documents().is_empty());
    }

    #[test]
    fn truncating_limit_loads_shortened_content() {
        let path = temp_document("big.txt", "abcdefghij");
        let mut session = ChatSession::new(StubGateway::default(), None).with_document_limit(
            DocumentLimit {
                max_bytes: Some(4),
                on_oversize: OversizePolicy::Truncate,
            },
        );
        let filename = session.try_load_document(&path).expect("should load");
        assert_eq!(filename, "big.txt");
        assert_eq!(
            session.documents().get("big.txt"),
            Some("abcd\n[truncated to 4 bytes]")
        );
    }

    #[tokio::test]
    async fn send_appends_user_and_assistant_messages() {
        let mut session = ChatSession::new(StubGateway::ok("hello"), Some("sys"));

        let reply = session.send("hi").await;

        assert_eq!(reply, "hello");
        assert_eq!(
            session.messages(),
            vec![
                Message::system("sys"),
                Message::user("hi"),
                Message::assistant("hello"),
            ]
        );
        assert!(
            session
                .transcript()
                .iter()
                .all(|entry| entry.status == TurnStatus::Committed)
        );
        let calls = session.gateway.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec![Message::system("sys"), Message::user("hi")]);
    }

    #[tokio::test]
    async fn failed_send_returns_error_text_and_marks_turn_failed() {
        let mut session = ChatSession::new(StubGateway::err("status 500"), Some("sys"));

        let reply = session.send("hi").await;

        assert!(
            reply.starts_with("Error generating response:"),
            "unexpected reply: {reply}"
        );
        assert!(reply.contains("status 500"), "unexpected reply: {reply}");
        let transcript = session.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].message, Message::user("hi"));
        assert!(matches!(transcript[1].status, TurnStatus::Failed(_)));
    }

    #[tokio::test]
    async fn failed_turns_are_not_replayed() {
        let gateway = StubGateway::replying([
            StubOutcome::Err("network down".to_string()),
            StubOutcome::Ok("second answer".to_string()),
        ]);
        let mut session = ChatSession::new(gateway, Some("sys"));

        session.send("first").await;
        let reply = session.send("second").await;

        assert_eq!(reply, "second answer");
        let calls = session.gateway.calls.borrow();
        assert_eq!(
            calls[1],
            vec![Message::system("sys"), Message::user("second")]
        );
    }

    #[tokio::test]
    async fn loaded_document_is_replayed_in_full_on_send() {
        let path = temp_document("essay.txt", "The whole essay body.");
        let mut session = ChatSession::new(StubGateway::ok("noted"), None);
        assert!(session.load_document(&path));

        session.send("summarize it").await;

        let calls = session.gateway.calls.borrow();
        assert_eq!(calls[0].len(), 4);
        assert!(calls[0][1].content.contains("The whole essay body."));
        assert_eq!(calls[0][3], Message::user("summarize it"));
    }

    #[tokio::test]
    async fn recent_window_limits_outbound_messages() {
        let gateway = StubGateway::replying(
            ["a1", "a2", "a3"].map(|reply| StubOutcome::Ok(reply.to_string())),
        );
        let mut session =
            ChatSession::new(gateway, Some("sys")).with_context_policy(RecentWindow::new(3));

        session.send("u1").await;
        session.send("u2").await;
        session.send("u3").await;

        let calls = session.gateway.calls.borrow();
        assert_eq!(calls[2], vec![Message::system("sys"), Message::user("u3")]);
        assert_eq!(session.transcript().len(), 7);
    }

    #[tokio::test]
    async fn update_system_prompt_resets_transcript() {
        let path = temp_document("notes.txt", "notes");
        let mut session = ChatSession::new(StubGateway::ok("hello"), None);
        session.load_document(&path);
        session.send("hi").await;
        assert_eq!(session.transcript().len(), 5);

        session.update_system_prompt("P");

        assert_eq!(session.messages(), vec![Message::system("P")]);
        assert_eq!(session.system_prompt(), "P");
        assert_eq!(session.documents().get("notes.txt"), Some("notes"));
    }
}
