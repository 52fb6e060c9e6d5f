pub mod client;
pub mod normalize;
pub mod registry;

/// Remote session names encode the owning tenant with a fixed prefix.
pub const SESSION_PREFIX: &str = "tenant-";

pub fn session_name(tenant_id: &str) -> String {
    format!("{SESSION_PREFIX}{tenant_id}")
}

/// Inverse of [`session_name`]. `None` for names outside the convention,
/// which callers log and drop rather than treat as an error.
pub fn tenant_from_session_name(name: &str) -> Option<&str> {
    name.strip_prefix(SESSION_PREFIX).filter(|rest| !rest.is_empty())
}
