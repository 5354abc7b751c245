mod event;
mod manager;


pub use event::ChatEvent;
pub use manager::{ChatSettings, PendingSend, SessionManager};
