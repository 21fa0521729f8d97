//! Branch name validation.
//!
//! Branch names become storage keys, so they follow git-style rules:
//! - non-empty, no whitespace and none of `~ ^ : ? * [ \`
//! - no `..` and no `@{`
//! - must not start or end with `.` or `/`, must not end with `.lock`
//! - `/`-separated components must be non-empty and not start with `.`

use crate::error::{VcsError, VcsResult};

const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

pub fn validate_branch_name(name: &str) -> VcsResult<()> {
    let invalid = |reason: String| VcsError::InvalidBranchName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("branch name must not be empty".into()));
    }
    if let Some(ch) = FORBIDDEN_CHARS.iter().find(|ch| name.contains(**ch)) {
        return Err(invalid(format!("contains forbidden character: {ch:?}")));
    }
    if name.contains("..") {
        return Err(invalid("must not contain '..'".into()));
    }
    if name.contains("@{") {
        return Err(invalid("must not contain '@{'".into()));
    }
    if name.starts_with(['.', '/']) || name.ends_with(['.', '/']) {
        return Err(invalid("must not start or end with '.' or '/'".into()));
    }
    if name.ends_with(".lock") {
        return Err(invalid("must not end with '.lock'".into()));
    }
    for component in name.split('/') {
        if component.is_empty() {
            return Err(invalid("path components must not be empty".into()));
        }
        if component.starts_with('.') {
            return Err(invalid(format!(
                "component must not start with '.': {component:?}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_names() {
        for name in ["master", "main", "feature/auth", "release-1.2", "user/jane/wip"] {
            assert!(validate_branch_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_bad_names() {
        for name in [
            "", "has space", "a..b", "x@{1}", ".hidden", "trailing.", "/lead", "trail/",
            "ref.lock", "a//b", "a/.b", "what?", "back\\slash",
        ] {
            assert!(
                matches!(validate_branch_name(name), Err(VcsError::InvalidBranchName { .. })),
                "{name:?} accepted"
            );
        }
    }
}
