//! Structured names the agent hands to the runtime and the proxy.
//!
//! Container names are `otturnaut-{app_id}-{deployment_id}`; image tags are
//! `otturnaut-{app_id}:{commit_hash}`; Caddy route ids are `{app_id}-route`.

pub const CONTAINER_PREFIX: &str = "otturnaut";

pub fn container_name(app_id: &str, deployment_id: &str) -> String {
    format!("{CONTAINER_PREFIX}-{app_id}-{deployment_id}")
}

pub fn image_tag(app_id: &str, commit_hash: &str) -> String {
    format!("{CONTAINER_PREFIX}-{app_id}:{commit_hash}")
}

pub fn route_id(app_id: &str) -> String {
    format!("{app_id}-route")
}

/// Result of parsing a runtime-reported container name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedContainerName {
    pub app_id: String,
    pub deployment_id: String,
}

/// Parse `otturnaut-{app_id}-{deployment_id}` by splitting on the first two
/// `-` separators after the fixed prefix. Names that don't start with the
/// prefix, or that have no second `-`, are not ours — the caller treats
/// these as externally-owned and ignores them.
pub fn parse_container_name(name: &str) -> Option<ParsedContainerName> {
    let rest = name.strip_prefix(CONTAINER_PREFIX)?.strip_prefix('-')?;
    let (app_id, deployment_id) = rest.split_once('-')?;
    if app_id.is_empty() || deployment_id.is_empty() {
        return None;
    }
    Some(ParsedContainerName {
        app_id: app_id.to_string(),
        deployment_id: deployment_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_structured_names() {
        let name = container_name("myapp", "abc123");
        assert_eq!(name, "otturnaut-myapp-abc123");
        let parsed = parse_container_name(&name).unwrap();
        assert_eq!(parsed.app_id, "myapp");
        assert_eq!(parsed.deployment_id, "abc123");
    }

    #[test]
    fn app_id_never_contains_a_hyphen_in_practice_but_parse_uses_first_split() {
        // Parsing splits on the FIRST remaining '-', so a deployment id that
        // itself contains hyphens stays whole while an app_id with a hyphen
        // would be mis-parsed.
        let parsed = parse_container_name("otturnaut-myapp-dep-with-dashes").unwrap();
        assert_eq!(parsed.app_id, "myapp");
        assert_eq!(parsed.deployment_id, "dep-with-dashes");
    }

    #[test]
    fn unparseable_names_are_none() {
        assert!(parse_container_name("some-other-container").is_none());
        assert!(parse_container_name("otturnaut-onlyonepart").is_none());
        assert!(parse_container_name("otturnaut--emptyapp").is_none());
        assert!(parse_container_name("").is_none());
    }

    #[test]
    fn image_tag_and_route_id_shapes() {
        assert_eq!(image_tag("myapp", "deadbeef"), "otturnaut-myapp:deadbeef");
        assert_eq!(route_id("myapp"), "myapp-route");
    }
}
