use crate::core::message::Message;

/// State changes published by the session manager for front ends.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    SessionCreated {
        session_id: String,
    },
    SessionDeleted {
        session_id: String,
    },
    CurrentChanged {
        session_id: Option<String>,
    },
    MessageAppended {
        session_id: String,
        message: Message,
    },
    TitleChanged {
        session_id: String,
        title: String,
    },
    AwaitingReply {
        awaiting: bool,
    },
}
