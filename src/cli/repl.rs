use anyhow::Result;
use std::io::{self, Write};

use crate::chat::SessionManager;
use crate::core::message::{Message, MessageRole};

pub async fn run(manager: &mut SessionManager) -> Result<()> {
    println!("\x1b[1mparley\x1b[0m v{}", env!("CARGO_PKG_VERSION"));
    println!("Model: \x1b[36m{}\x1b[0m", manager.model());
    println!("Type \x1b[33m/help\x1b[0m for commands, \x1b[33mCtrl-D\x1b[0m to exit.\n");

    if let Some(session) = manager.current_session() {
        println!("\x1b[1m{}\x1b[0m", session.title);
        for message in &session.messages {
            print_message(message);
        }
    }

    loop {
        eprint!("\x1b[32;1myou>\x1b[0m ");
        io::stderr().flush().ok();

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) => {
                // EOF (Ctrl-D)
                println!("\nGoodbye!");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') {
            match handle_command(input, manager).await {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) => {
                    eprintln!("\x1b[31mCommand error: {e}\x1b[0m");
                    continue;
                }
            }
        }

        if let Err(e) = send_and_render(manager, input).await {
            eprintln!("\x1b[31mSend error: {e}\x1b[0m");
        }
    }

    Ok(())
}

/// Non-interactive mode: one message, reply on stdout.
pub async fn send_once(manager: &mut SessionManager, prompt: &str) -> Result<()> {
    if !manager.send_message(prompt).await? {
        anyhow::bail!("Nothing to send.");
    }
    let reply = manager
        .current_session()
        .and_then(|s| s.messages.last())
        .filter(|m| m.role == MessageRole::Assistant);
    match reply {
        Some(m) if m.is_error => anyhow::bail!("{}", m.content),
        Some(m) => println!("{}", m.content),
        None => {}
    }
    Ok(())
}

async fn send_and_render(manager: &mut SessionManager, input: &str) -> Result<()> {
    let Some(pending) = manager.begin_send(input).await? else {
        return Ok(());
    };

    eprint!("\x1b[90mThinking...\x1b[0m");
    io::stderr().flush().ok();
    let outcome = manager.request_reply(&pending).await;
    eprint!("\r\x1b[K");

    let session_id = pending.session_id.clone();
    manager.finish_send(pending, outcome).await?;

    let reply = manager
        .sessions()
        .iter()
        .find(|s| s.id == session_id)
        .and_then(|s| s.messages.last());
    if let Some(message) = reply {
        print_message(message);
    }
    Ok(())
}

async fn handle_command(input: &str, manager: &mut SessionManager) -> Result<bool> {
    let (command, arg) = match input.split_once(char::is_whitespace) {
        Some((c, a)) => (c, a.trim()),
        None => (input, ""),
    };

    match command {
        "/help" | "/h" => {
            println!("\x1b[1mCommands:\x1b[0m");
            println!("  /new          Start a new conversation");
            println!("  /sessions     List conversations");
            println!("  /switch <id>  Switch to a conversation (id prefix is enough)");
            println!("  /delete <id>  Delete a conversation");
            println!("  /help         Show this help");
            println!("  /exit         Exit");
            Ok(true)
        }
        "/exit" | "/quit" | "/q" => {
            println!("Goodbye!");
            Ok(false)
        }
        "/new" | "/n" => {
            manager.create_session().await?;
            if let Some(session) = manager.current_session() {
                println!("\x1b[1m{}\x1b[0m", session.title);
            }
            Ok(true)
        }
        "/sessions" | "/s" => {
            print_sessions(manager);
            Ok(true)
        }
        "/switch" => {
            let id = resolve_session_id(manager, arg)?;
            manager.select_session(&id).await?;
            if let Some(session) = manager.current_session() {
                println!("\x1b[1m{}\x1b[0m", session.title);
                for message in &session.messages {
                    print_message(message);
                }
            }
            Ok(true)
        }
        "/delete" => {
            let id = resolve_session_id(manager, arg)?;
            manager.delete_session(&id).await?;
            println!("Deleted {id}.");
            Ok(true)
        }
        _ => {
            eprintln!("Unknown command: {input}. Type /help for available commands.");
            Ok(true)
        }
    }
}

/// Accept a full id or an unambiguous prefix of one.
fn resolve_session_id(manager: &SessionManager, arg: &str) -> Result<String> {
    if arg.is_empty() {
        anyhow::bail!("a session id is required");
    }
    let matches: Vec<&str> = manager
        .sessions()
        .iter()
        .map(|s| s.id.as_str())
        .filter(|id| *id == arg || id.starts_with(arg))
        .collect();
    match matches.as_slice() {
        [id] => Ok((*id).to_string()),
        [] => anyhow::bail!("no session matches '{arg}'"),
        _ if matches.contains(&arg) => Ok(arg.to_string()),
        _ => anyhow::bail!("'{arg}' matches {} sessions", matches.len()),
    }
}

pub fn print_sessions(manager: &SessionManager) {
    if manager.sessions().is_empty() {
        println!("No sessions.");
        return;
    }
    let current = manager.current_session_id();
    for s in manager.sessions() {
        let marker = if Some(s.id.as_str()) == current { " *" } else { "" };
        println!(
            "  \x1b[90m{}\x1b[0m  {}{}  ({} msgs, {})",
            s.id,
            s.title,
            marker,
            s.messages.len(),
            s.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
}

fn print_message(message: &Message) {
    match message.role {
        MessageRole::User => println!("\x1b[32;1myou>\x1b[0m {}", message.content),
        MessageRole::Assistant if message.is_error => {
            println!("\x1b[31;1m[error]\x1b[0m {}\n", message.content)
        }
        MessageRole::Assistant => println!("{}\n", message.content),
        MessageRole::System => println!("\x1b[90m{}\x1b[0m", message.content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::IdentityProvider;
    use crate::chat::ChatSettings;
    use crate::core::error::ProviderError;
    use crate::core::provider::{CompletionProvider, CompletionRequest};
    use crate::storage::{KvStore, MemoryStore};
    use crate::core::error::StorageError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct EchoProvider;

    #[async_trait::async_trait]
    impl CompletionProvider for EchoProvider {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
            let last = request.messages.last().map(|t| t.content.clone());
            Ok(format!("echo: {}", last.unwrap_or_default()))
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    /// Rejects writes while `read_only` is set.
    #[derive(Default)]
    struct ReadOnlyStore {
        inner: MemoryStore,
        read_only: AtomicBool,
    }

    #[async_trait::async_trait]
    impl KvStore for ReadOnlyStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if self.read_only.load(Ordering::SeqCst) {
                return Err(StorageError::Database("read-only".into()));
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), StorageError> {
            if self.read_only.load(Ordering::SeqCst) {
                return Err(StorageError::Database("read-only".into()));
            }
            self.inner.remove(key).await
        }
    }

    async fn manager() -> SessionManager {
        manager_on(Arc::new(MemoryStore::new())).await
    }

    async fn manager_on(store: Arc<dyn KvStore>) -> SessionManager {
        let auth = Arc::new(IdentityProvider::new(store.clone(), "default-key"));
        auth.sign_in("ana@example.com").await.unwrap();
        SessionManager::open(
            auth,
            store,
            Arc::new(EchoProvider),
            ChatSettings {
                system_prompt: "test".into(),
                request_timeout: Duration::from_secs(5),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_resolve_session_id_by_prefix() {
        let mut manager = manager().await;
        manager.create_session().await.unwrap();
        let id = manager.sessions()[1].id.clone();

        assert_eq!(resolve_session_id(&manager, &id).unwrap(), id);
        assert_eq!(resolve_session_id(&manager, &id[..14]).unwrap(), id);
        assert!(resolve_session_id(&manager, "session_").is_err());
        assert!(resolve_session_id(&manager, "nope").is_err());
        assert!(resolve_session_id(&manager, "").is_err());
    }

    #[tokio::test]
    async fn test_commands_manage_sessions() {
        let mut manager = manager().await;
        assert!(handle_command("/new", &mut manager).await.unwrap());
        assert_eq!(manager.sessions().len(), 2);

        let older = manager.sessions()[1].id.clone();
        assert!(handle_command(&format!("/switch {older}"), &mut manager)
            .await
            .unwrap());
        assert_eq!(manager.current_session_id(), Some(older.as_str()));

        assert!(handle_command(&format!("/delete {older}"), &mut manager)
            .await
            .unwrap());
        assert_eq!(manager.sessions().len(), 1);

        assert!(!handle_command("/exit", &mut manager).await.unwrap());
    }

    #[tokio::test]
    async fn test_send_once_prints_reply() {
        let mut manager = manager().await;
        send_once(&mut manager, "ping").await.unwrap();
        let session = manager.current_session().unwrap();
        assert_eq!(session.messages[1].content, "echo: ping");
        assert!(send_once(&mut manager, "  ").await.is_err());
    }

    #[tokio::test]
    async fn test_send_error_is_recoverable() {
        let store = Arc::new(ReadOnlyStore::default());
        let mut manager = manager_on(store.clone()).await;

        store.read_only.store(true, Ordering::SeqCst);
        assert!(send_and_render(&mut manager, "hello").await.is_err());
        assert!(!manager.is_awaiting_reply());
        assert!(handle_command("/sessions", &mut manager).await.unwrap());

        store.read_only.store(false, Ordering::SeqCst);
        send_and_render(&mut manager, "again").await.unwrap();
        let session = manager.current_session().unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].content, "echo: again");
    }
}
