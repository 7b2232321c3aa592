//! Glob-style pattern helpers.
//!
//! [`generalize`] builds one pattern that subsumes a set of names. It is a
//! heuristic: it keeps the longest run of characters shared by every input
//! and wildcards the rest, so the result is not the tightest pattern that
//! would cover the inputs. [`fnmatch`] is the single matching predicate used
//! across the crate whenever a pattern is compared to a name.

use globset::GlobBuilder;

/// Shortest common run that still counts as a meaningful pattern.
pub const MIN_COMMON_LEN: usize = 3;

/// Build a single `*` pattern covering every string in `strings`.
///
/// The wildcards are placed by looking at the first input only: a run it
/// starts with gets a trailing `*`, a run it ends with gets a leading `*`,
/// and anything else (including a run that is the whole first input) is
/// wrapped on both sides.
///
/// Returns `None` when the inputs share no contiguous run of at least
/// [`MIN_COMMON_LEN`] characters; callers treat that field as unmergeable.
pub fn generalize<S: AsRef<str>>(strings: &[S]) -> Option<String> {
    let first = strings.first()?.as_ref();
    if strings.iter().all(|s| s.as_ref() == first) {
        return Some(first.to_string());
    }

    let candidates: Vec<Vec<char>> = strings
        .iter()
        .map(|s| s.as_ref().trim_end_matches('*').chars().collect())
        .collect();

    let mut common = candidates[0].clone();
    for candidate in &candidates[1..] {
        common = longest_common_substring(&common, candidate);
        if common.len() < MIN_COMMON_LEN {
            tracing::debug!(
                inputs = ?strings.iter().map(AsRef::as_ref).collect::<Vec<_>>(),
                "no common run long enough to generalize"
            );
            return None;
        }
    }

    let common: String = common.into_iter().collect();
    let anchored_start = first.starts_with(&common);
    let anchored_end = first.ends_with(&common);
    Some(match (anchored_start, anchored_end) {
        (true, false) => format!("{common}*"),
        (false, true) => format!("*{common}"),
        _ => format!("*{common}*"),
    })
}

/// Return `true` when `name` matches the shell-style `pattern`.
///
/// `*` matches across `/`, mirroring how executable and image patterns are
/// written. A pattern that fails to compile is compared literally.
pub fn fnmatch(name: &str, pattern: &str) -> bool {
    if name == pattern {
        return true;
    }
    if !pattern.contains(['*', '?', '[']) {
        return false;
    }
    match GlobBuilder::new(pattern)
        .literal_separator(false)
        .backslash_escape(false)
        .build()
    {
        Ok(glob) => glob.compile_matcher().is_match(name),
        Err(e) => {
            tracing::debug!(pattern, error = %e, "invalid glob; comparing literally");
            false
        }
    }
}

/// Return `true` when `pattern` is strictly more general than `other`.
pub fn is_wider(pattern: &str, other: &str) -> bool {
    pattern != other && fnmatch(other, pattern)
}

/// Longest contiguous run shared by `a` and `b`; ties keep the earliest run in `a`.
fn longest_common_substring(a: &[char], b: &[char]) -> Vec<char> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut best_len = 0;
    let mut best_end = 0;
    for i in 1..=a.len() {
        let mut row = vec![0usize; b.len() + 1];
        for j in 1..=b.len() {
            if a[i - 1] == b[j - 1] {
                row[j] = prev[j - 1] + 1;
                if row[j] > best_len {
                    best_len = row[j];
                    best_end = i;
                }
            }
        }
        prev = row;
    }
    a[best_end - best_len..best_end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::{fnmatch, generalize, is_wider};

    #[test]
    fn single_and_identical_inputs_are_returned_unchanged() {
        assert_eq!(generalize(&["nginx"]).as_deref(), Some("nginx"));
        assert_eq!(generalize(&["nginx", "nginx"]).as_deref(), Some("nginx"));
        assert_eq!(generalize(&["ab"]).as_deref(), Some("ab"));
    }

    #[test]
    fn shared_prefix_gets_trailing_wildcard() {
        assert_eq!(generalize(&["foobar", "foobaz"]).as_deref(), Some("fooba*"));
        assert_eq!(
            generalize(&["python*", "python3"]).as_deref(),
            Some("python*")
        );
    }

    #[test]
    fn shared_suffix_and_infix_are_wrapped() {
        assert_eq!(
            generalize(&["worker-api", "cron-api"]).as_deref(),
            Some("*-api")
        );
        assert_eq!(
            generalize(&["a-service-1", "b-service-2"]).as_deref(),
            Some("*-service-*")
        );
    }

    #[test]
    fn wildcards_follow_the_first_input_only() {
        assert_eq!(generalize(&["python", "python3"]).as_deref(), Some("*python*"));
        assert_eq!(generalize(&["foobar", "xfoobar"]).as_deref(), Some("*foobar*"));
        assert_eq!(generalize(&["xfoobar", "foobar"]).as_deref(), Some("*foobar"));
        assert_eq!(generalize(&["foobar", "foobarx"]).as_deref(), Some("*foobar*"));
        assert_eq!(generalize(&["foobarx", "foobar"]).as_deref(), Some("foobar*"));
    }

    #[test]
    fn short_common_runs_fail() {
        assert_eq!(generalize(&["ab", "xy"]), None);
        assert_eq!(generalize(&["sh", "bash"]), None);
        assert_eq!(generalize::<&str>(&[]), None);
    }

    #[test]
    fn generalized_pattern_matches_every_input() {
        let inputs = ["docker.io/acme/api:1.2.3", "docker.io/acme/api:1.3.0"];
        let pattern = generalize(&inputs).expect("pattern");
        for input in inputs {
            assert!(fnmatch(input, &pattern), "{pattern} should match {input}");
        }
    }

    #[test]
    fn fnmatch_crosses_path_separators() {
        assert!(fnmatch("/usr/bin/python3", "/usr/*"));
        assert!(fnmatch("python3", "python?"));
        assert!(fnmatch("b", "[abc]"));
        assert!(!fnmatch("python", "ruby*"));
        assert!(fnmatch("[weird", "[weird"));
        assert!(!fnmatch("x", "[weird"));
    }

    #[test]
    fn wider_is_strict() {
        assert!(is_wider("*.example.com", "api.example.com"));
        assert!(!is_wider("api.example.com", "api.example.com"));
        assert!(!is_wider("api.example.com", "*.example.com"));
    }
}
