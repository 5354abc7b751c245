use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::auth::IdentityProvider;
use crate::chat::event::ChatEvent;
use crate::core::config::AppConfig;
use crate::core::error::{ChatError, ProviderError, StorageError};
use crate::core::message::Message;
use crate::core::provider::{ChatTurn, CompletionProvider, CompletionRequest};
use crate::core::session::Session;
use crate::storage::{KvStore, SessionRepo};

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub system_prompt: String,
    pub request_timeout: Duration,
}

impl From<&AppConfig> for ChatSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            system_prompt: config.system_prompt.clone(),
            request_timeout: config.request_timeout(),
        }
    }
}

/// A user message that has been appended and persisted but not yet answered.
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub session_id: String,
    pub request: CompletionRequest,
}

/// Sessions of one signed-in identity.
///
/// Every mutation is written through to the store before the call returns, so the
/// stored list never lags the in-memory one. Sending is split in two phases:
/// [`begin_send`](Self::begin_send) appends the user message and returns a
/// [`PendingSend`], and [`finish_send`](Self::finish_send) appends the reply (or an
/// error-flagged stand-in) once the completion call settles.
pub struct SessionManager {
    user_id: String,
    auth: Arc<IdentityProvider>,
    repo: SessionRepo,
    provider: Arc<dyn CompletionProvider>,
    settings: ChatSettings,
    sessions: Vec<Session>,
    current: Option<String>,
    awaiting_reply: bool,
    events: Option<mpsc::UnboundedSender<ChatEvent>>,
}

impl SessionManager {
    /// Load the signed-in identity's sessions, creating a first empty one when
    /// nothing usable is stored.
    pub async fn open(
        auth: Arc<IdentityProvider>,
        store: Arc<dyn KvStore>,
        provider: Arc<dyn CompletionProvider>,
        settings: ChatSettings,
    ) -> Result<Self, ChatError> {
        let identity = auth.current().ok_or(ChatError::NotSignedIn)?;
        let repo = SessionRepo::new(store, identity.id.clone());

        let mut manager = Self {
            user_id: identity.id,
            auth,
            repo,
            provider,
            settings,
            sessions: Vec::new(),
            current: None,
            awaiting_reply: false,
            events: None,
        };

        match manager.repo.load().await? {
            Some(sessions) => {
                manager.sessions = sessions;
                let stored = manager.repo.load_current().await?;
                manager.current = stored
                    .filter(|id| manager.contains(id))
                    .or_else(|| manager.sessions.first().map(|s| s.id.clone()));
                manager.repo.save_current(manager.current.as_deref()).await?;
            }
            None => {
                manager.create_session().await?;
            }
        }

        tracing::debug!(
            user_id = %manager.user_id,
            sessions = manager.sessions.len(),
            "session manager opened"
        );
        Ok(manager)
    }

    pub fn with_events(mut self, tx: mpsc::UnboundedSender<ChatEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn identity_id(&self) -> &str {
        &self.user_id
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn current_session_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current_session(&self) -> Option<&Session> {
        let id = self.current.as_deref()?;
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub async fn create_session(&mut self) -> Result<String, ChatError> {
        let session = Session::new();
        let id = session.id.clone();
        let mut sessions = self.sessions.clone();
        sessions.insert(0, session);
        self.commit(sessions, Some(id.clone())).await?;

        self.emit(ChatEvent::SessionCreated {
            session_id: id.clone(),
        });
        self.emit_current();
        Ok(id)
    }

    pub async fn select_session(&mut self, id: &str) -> Result<(), ChatError> {
        if !self.contains(id) {
            return Err(ChatError::SessionNotFound(id.to_string()));
        }
        if self.current.as_deref() == Some(id) {
            return Ok(());
        }
        self.repo.save_current(Some(id)).await?;
        self.current = Some(id.to_string());
        self.emit_current();
        Ok(())
    }

    /// Remove a session. Returns false when no session had that id.
    pub async fn delete_session(&mut self, id: &str) -> Result<bool, ChatError> {
        let Some(pos) = self.sessions.iter().position(|s| s.id == id) else {
            return Ok(false);
        };
        let mut sessions = self.sessions.clone();
        sessions.remove(pos);

        let was_current = self.current.as_deref() == Some(id);
        let current = if was_current {
            sessions.first().map(|s| s.id.clone())
        } else {
            self.current.clone()
        };
        self.commit(sessions, current).await?;

        self.emit(ChatEvent::SessionDeleted {
            session_id: id.to_string(),
        });
        if was_current {
            self.emit_current();
        }
        Ok(true)
    }

    /// Send one user message and wait for the reply. Returns false when the
    /// message was not sent (blank input, nobody signed in, or a reply is
    /// still pending).
    pub async fn send_message(&mut self, content: &str) -> Result<bool, ChatError> {
        let Some(pending) = self.begin_send(content).await? else {
            return Ok(false);
        };
        let outcome = self.request_reply(&pending).await;
        self.finish_send(pending, outcome).await?;
        Ok(true)
    }

    /// Append the user message, persist it and mark the manager as awaiting a reply.
    pub async fn begin_send(&mut self, content: &str) -> Result<Option<PendingSend>, ChatError> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }
        if !self.auth.is_signed_in_as(&self.user_id) {
            tracing::debug!(user_id = %self.user_id, "ignoring send: identity not active");
            return Ok(None);
        }
        if self.awaiting_reply {
            tracing::debug!("ignoring send: a reply is still pending");
            return Ok(None);
        }

        let session_id = match self.current.clone() {
            Some(id) => id,
            None => self.create_session().await?,
        };

        let message = Message::new_user(content.to_string());
        let mut sessions = self.sessions.clone();
        let session = sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| ChatError::SessionNotFound(session_id.clone()))?;
        session.push(message.clone());
        let turns: Vec<ChatTurn> = session.messages.iter().map(ChatTurn::from).collect();

        self.commit(sessions, self.current.clone()).await?;
        self.set_awaiting(true);
        self.emit(ChatEvent::MessageAppended {
            session_id: session_id.clone(),
            message,
        });

        let request = CompletionRequest {
            system_prompt: self.settings.system_prompt.clone(),
            messages: turns,
            api_key: self.auth.api_key(),
        };
        Ok(Some(PendingSend {
            session_id,
            request,
        }))
    }

    /// The completion call for a pending send, bounded by the request timeout.
    /// The returned future does not borrow the manager.
    pub fn request_reply(
        &self,
        pending: &PendingSend,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send + 'static {
        let provider = Arc::clone(&self.provider);
        let request = pending.request.clone();
        let timeout = self.settings.request_timeout;
        async move {
            match tokio::time::timeout(timeout, provider.complete(&request)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(timeout.as_secs())),
            }
        }
    }

    /// Record the outcome of a pending send. Clears the awaiting flag on every path.
    pub async fn finish_send(
        &mut self,
        pending: PendingSend,
        outcome: Result<String, ProviderError>,
    ) -> Result<(), ChatError> {
        let reply = match outcome {
            Ok(text) => Message::new_assistant(text),
            Err(e) => {
                tracing::warn!(session_id = %pending.session_id, "completion failed: {e}");
                Message::new_error(fallback_reply(&e))
            }
        };
        let result = self.append_reply(&pending.session_id, reply).await;
        self.set_awaiting(false);
        result
    }

    /// Tear down on sign-out.
    pub fn close(self) {
        tracing::debug!(user_id = %self.user_id, "session manager closed");
    }

    async fn append_reply(&mut self, session_id: &str, reply: Message) -> Result<(), ChatError> {
        let mut sessions = self.sessions.clone();
        let Some(session) = sessions.iter_mut().find(|s| s.id == session_id) else {
            tracing::warn!(session_id, "session deleted before its reply arrived");
            return Ok(());
        };
        session.push(reply.clone());
        let new_title = session.derive_title().then(|| session.title.clone());

        self.commit(sessions, self.current.clone()).await?;

        self.emit(ChatEvent::MessageAppended {
            session_id: session_id.to_string(),
            message: reply,
        });
        if let Some(title) = new_title {
            self.emit(ChatEvent::TitleChanged {
                session_id: session_id.to_string(),
                title,
            });
        }
        Ok(())
    }

    /// Write the next state to the store, then adopt it. On a failed write the
    /// in-memory state is left as it was.
    async fn commit(
        &mut self,
        sessions: Vec<Session>,
        current: Option<String>,
    ) -> Result<(), StorageError> {
        self.repo.save(&sessions).await?;
        if let Err(e) = self.repo.save_current(current.as_deref()).await {
            // Put the previous list back so the stored list keeps matching memory
            if let Err(restore) = self.repo.save(&self.sessions).await {
                tracing::warn!(user_id = %self.user_id, "could not restore session list: {restore}");
            }
            return Err(e);
        }
        self.sessions = sessions;
        self.current = current;
        Ok(())
    }

    fn contains(&self, id: &str) -> bool {
        self.sessions.iter().any(|s| s.id == id)
    }

    fn set_awaiting(&mut self, awaiting: bool) {
        if self.awaiting_reply != awaiting {
            self.awaiting_reply = awaiting;
            self.emit(ChatEvent::AwaitingReply { awaiting });
        }
    }

    fn emit_current(&self) {
        self.emit(ChatEvent::CurrentChanged {
            session_id: self.current.clone(),
        });
    }

    fn emit(&self, event: ChatEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

fn fallback_reply(error: &ProviderError) -> String {
    format!(
        "Sorry, I couldn't get a reply from the assistant ({error}). \
         Check your API key in settings and try again."
    )
}
