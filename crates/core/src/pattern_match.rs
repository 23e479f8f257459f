//! SQL LIKE pattern matching used by `Like` predicates.
//!
//! Two wildcards:
//! - `%` matches zero or more characters
//! - `_` matches exactly one character
//!
//! Matching operates on Unicode scalar values. The matcher is iterative with
//! single-point backtracking on the last `%`, so it is linear in practice and
//! never recurses.

use alloc::vec::Vec;

/// Case-sensitive LIKE.
///
/// ```
/// use lumen_core::pattern_match::like;
/// assert!(like("hello", "h%o"));
/// assert!(like("hello", "_ello"));
/// assert!(!like("hello", "world"));
/// ```
pub fn like(value: &str, pattern: &str) -> bool {
    let v: Vec<char> = value.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    like_chars(&v, &p)
}

/// Case-insensitive LIKE (both sides lowercased first).
///
/// ```
/// use lumen_core::pattern_match::like_ignore_case;
/// assert!(like_ignore_case("Fun House", "fun%"));
/// ```
pub fn like_ignore_case(value: &str, pattern: &str) -> bool {
    let v: Vec<char> = value.chars().flat_map(char::to_lowercase).collect();
    let p: Vec<char> = pattern.chars().flat_map(char::to_lowercase).collect();
    like_chars(&v, &p)
}

fn like_chars(v: &[char], p: &[char]) -> bool {
    let (mut vi, mut pi) = (0usize, 0usize);
    // (pattern index after the last %, value index it was tried at)
    let mut backtrack: Option<(usize, usize)> = None;

    while vi < v.len() {
        match p.get(pi) {
            Some('%') => {
                pi += 1;
                backtrack = Some((pi, vi));
            }
            Some('_') => {
                vi += 1;
                pi += 1;
            }
            Some(ch) if *ch == v[vi] => {
                vi += 1;
                pi += 1;
            }
            _ => match backtrack {
                Some((bp, bv)) => {
                    pi = bp;
                    vi = bv + 1;
                    backtrack = Some((bp, bv + 1));
                }
                None => return false,
            },
        }
    }

    p[pi..].iter().all(|c| *c == '%')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_exact() {
        assert!(like("abc", "abc"));
        assert!(!like("abc", "abd"));
        assert!(!like("abc", "ab"));
    }

    #[test]
    fn like_percent() {
        assert!(like("hello world", "hello%"));
        assert!(like("hello world", "%world"));
        assert!(like("hello world", "%lo w%"));
        assert!(like("", "%"));
        assert!(!like("hello", "%x%"));
    }

    #[test]
    fn like_underscore() {
        assert!(like("cat", "c_t"));
        assert!(!like("cart", "c_t"));
        assert!(!like("", "_"));
    }

    #[test]
    fn like_backtracks() {
        assert!(like("aaab", "%ab"));
        assert!(like("mississippi", "m%iss%pi"));
        assert!(!like("mississippi", "m%iss%px"));
    }

    #[test]
    fn like_case() {
        assert!(!like("Zap", "zap"));
        assert!(like_ignore_case("Zap", "zap"));
        assert!(like_ignore_case("ÉCOLE", "éc%"));
    }
}
