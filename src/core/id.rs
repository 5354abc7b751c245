/// Generate a prefixed identifier such as `session_3f9c2a61b0d4`.
///
/// Uniqueness only needs to hold within one user's stored data, so a short
/// slice of a v4 uuid is enough.
pub fn generate(prefix: &str) -> String {
    let raw = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &raw[..12])
}

pub fn user_id() -> String {
    generate("user")
}

pub fn session_id() -> String {
    generate("session")
}

pub fn message_id() -> String {
    generate("msg")
}
