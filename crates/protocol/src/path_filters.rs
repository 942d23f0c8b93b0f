use std::path::Path;

/// Repo-relative, `/`-separated form of `path`, or `None` when it lies outside `root`.
pub fn normalize_relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let rel = rel.to_string_lossy().into_owned();
    Some(rel.replace('\\', "/"))
}

/// True when `rel_path` equals `prefix` or lives underneath it.
pub fn path_within(rel_path: &str, prefix: &str) -> bool {
    let prefix = normalize_filter_path(prefix);
    if prefix.is_empty() {
        return true;
    }
    path_prefix_matches_normalized(&prefix, &rel_path.replace('\\', "/"))
}

/// Exclusion check used by the scanner. Entries without wildcards are directory/file
/// prefixes; entries with `*`/`?` are glob patterns over the whole relative path.
pub fn path_excluded(rel_path: &str, exclude_paths: &[String]) -> bool {
    let rel_path = rel_path.replace('\\', "/");
    exclude_paths.iter().any(|exclude| {
        let normalized = normalize_filter_path(exclude);
        if normalized.is_empty() {
            return false;
        }
        if normalized.contains('*') || normalized.contains('?') {
            return glob::Pattern::new(&normalized)
                .map(|p| p.matches(&rel_path))
                .unwrap_or(false);
        }
        path_prefix_matches_normalized(&normalized, &rel_path)
    })
}

fn normalize_filter_path(raw: &str) -> String {
    let mut value = raw.trim().replace('\\', "/");
    while value.starts_with("./") {
        value = value[2..].to_string();
    }
    let value = value.trim_matches('/');
    if value == "." {
        return String::new();
    }
    value.to_string()
}

fn path_prefix_matches_normalized(prefix: &str, path: &str) -> bool {
    if path == prefix {
        return true;
    }

    if !path.starts_with(prefix) {
        return false;
    }

    path.as_bytes().get(prefix.len()) == Some(&b'/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_exclusion_respects_segment_boundaries() {
        let exclude = vec![".project".to_string()];
        assert!(path_excluded(".project/corpus/graph.json", &exclude));
        assert!(!path_excluded(".projectile/notes.md", &exclude));
    }

    #[test]
    fn glob_exclusion_matches_whole_path() {
        let exclude = vec!["**/*.generated.rs".to_string()];
        assert!(path_excluded("src/api/schema.generated.rs", &exclude));
        assert!(!path_excluded("src/api/schema.rs", &exclude));
    }

    #[test]
    fn empty_prefixes_do_not_exclude() {
        let exclude = vec!["".to_string(), ".".to_string(), "./".to_string()];
        assert!(!path_excluded("src/lib.rs", &exclude));
    }

    #[test]
    fn within_handles_root_and_nested_paths() {
        assert!(path_within("crates/api/src/lib.rs", "crates/api"));
        assert!(!path_within("crates/api2/src/lib.rs", "crates/api"));
        assert!(path_within("main.go", "."));
    }

    #[test]
    fn normalizes_relative_paths() {
        let root = Path::new("/repo");
        assert_eq!(
            normalize_relative_path(root, Path::new("/repo/src/lib.rs")).as_deref(),
            Some("src/lib.rs")
        );
        assert_eq!(normalize_relative_path(root, Path::new("/other/x")), None);
    }
}
