/// The runner must never log the value of env variables matching
/// `*SSH_COMMAND`, `*KEY`, `*TOKEN`, `*COOKIE`.
const REDACT_SUFFIXES: &[&str] = &["SSH_COMMAND", "KEY", "TOKEN", "COOKIE"];

pub fn should_redact_env_key(key: &str) -> bool {
    let upper = key.to_ascii_uppercase();
    REDACT_SUFFIXES.iter().any(|suffix| upper.ends_with(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_documented_suffixes_case_insensitively() {
        assert!(should_redact_env_key("GIT_SSH_COMMAND"));
        assert!(should_redact_env_key("api_key"));
        assert!(should_redact_env_key("AUTH_TOKEN"));
        assert!(should_redact_env_key("SESSION_COOKIE"));
    }

    #[test]
    fn leaves_ordinary_vars_alone() {
        assert!(!should_redact_env_key("PATH"));
        assert!(!should_redact_env_key("NODE_ENV"));
        assert!(!should_redact_env_key("DATABASE_URL"));
    }
}
