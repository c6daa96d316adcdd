use uuid::Uuid;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// 32 lowercase hex chars, used for link tokens and references.
pub fn hex_token() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn reference(prefix: &str) -> String {
    format!("{}{}", prefix, hex_token().to_uppercase())
}
