//! Unit-level coverage for path parsing, the glob matcher, and the
//! per-file token bloom filter.

use rfs::node::bloom::TokenFilter;
use rfs::path::glob::{literal_tokens, matches};
use rfs::path::{join, parse};
use rfs::FsError;

// ---------------------------------------------------------------------------
// Path parsing
// ---------------------------------------------------------------------------

#[test]
fn parse_normalizes_components() {
    assert_eq!(
        parse(b"/a//b/./c/../d").unwrap(),
        vec![b"a".to_vec(), b"b".to_vec(), b"d".to_vec()]
    );
    assert_eq!(parse(b"/").unwrap(), Vec::<Vec<u8>>::new());
    assert_eq!(parse(b"/a/").unwrap(), vec![b"a".to_vec()]);
}

#[test]
fn parse_clamps_dotdot_at_root() {
    assert_eq!(parse(b"/../..").unwrap(), Vec::<Vec<u8>>::new());
    assert_eq!(parse(b"/../x").unwrap(), vec![b"x".to_vec()]);
}

#[test]
fn parse_rejects_relative_and_empty() {
    assert_eq!(parse(b"relative").unwrap_err(), FsError::Invalid);
    assert_eq!(parse(b"").unwrap_err(), FsError::Invalid);
}

#[test]
fn join_renders_canonical_form() {
    assert_eq!(join(&[]), b"/");
    assert_eq!(join(&parse(b"/a//b/").unwrap()), b"/a/b");
}

// ---------------------------------------------------------------------------
// Glob matcher
// ---------------------------------------------------------------------------

#[test]
fn glob_star_and_question() {
    assert!(matches(b"*", b"", false));
    assert!(matches(b"*", b"abc", false));
    assert!(matches(b"a*c", b"abc", false));
    assert!(matches(b"a*c", b"ac", false));
    assert!(matches(b"*.md", b"notes.md", false));
    assert!(!matches(b"*.md", b"notes.txt", false));

    assert!(matches(b"a?c", b"abc", false));
    assert!(!matches(b"a?c", b"ac", false));
    assert!(!matches(b"?", b"", false));
}

#[test]
fn glob_star_does_not_cross_slash() {
    assert!(!matches(b"*", b"a/b", false));
    assert!(matches(b"a/*", b"a/b", false));
    assert!(!matches(b"a*b", b"a/b", false));
}

#[test]
fn glob_character_classes() {
    assert!(matches(b"[abc]x", b"bx", false));
    assert!(!matches(b"[abc]x", b"dx", false));
    assert!(matches(b"[a-c]x", b"bx", false));
    assert!(matches(b"[!a-c]x", b"dx", false));
    assert!(!matches(b"[!a-c]x", b"bx", false));
    assert!(matches(b"[\\]]", b"]", false));
}

#[test]
fn glob_escapes_and_malformed_patterns() {
    assert!(matches(b"\\*", b"*", false));
    assert!(!matches(b"\\*", b"a", false));
    assert!(matches(b"\\?", b"?", false));
    // Unterminated class and trailing backslash match literally.
    assert!(matches(b"[ab", b"[ab", false));
    assert!(matches(b"a\\", b"a\\", false));
}

#[test]
fn glob_nocase_folds_ascii_only() {
    assert!(matches(b"ABC", b"abc", true));
    assert!(!matches(b"ABC", b"abc", false));
    assert!(matches(b"[A-Z]", b"q", true));
    assert!(matches(b"*ERR*", b"an error here", true));
}

#[test]
fn literal_tokens_of_patterns() {
    assert_eq!(literal_tokens(b"*er*ror*"), vec![b"er".to_vec(), b"ror".to_vec()]);
    assert_eq!(literal_tokens(b"a[bc]d"), vec![b"a".to_vec(), b"d".to_vec()]);
    assert_eq!(literal_tokens(b"\\*x"), vec![b"*x".to_vec()]);
    assert_eq!(literal_tokens(b"??"), Vec::<Vec<u8>>::new());
}

// ---------------------------------------------------------------------------
// Token bloom filter
// ---------------------------------------------------------------------------

#[test]
fn bloom_indexes_whitespace_tokens() {
    let filter = TokenFilter::build(b"alpha beta\ngamma\tdelta");
    assert!(filter.may_contain(b"alpha"));
    assert!(filter.may_contain(b"beta"));
    assert!(filter.may_contain(b"gamma"));
    assert!(filter.may_contain(b"delta"));
    assert!(!filter.may_contain(b"epsilon"));
}

/// Tokens are folded on insert and probe, so either casing of a probe
/// answers may-have for any casing in the payload.
#[test]
fn bloom_folds_case() {
    let filter = TokenFilter::build(b"Error");
    assert!(filter.may_contain(b"error"));
    assert!(filter.may_contain(b"ERROR"));
}

/// Sub-minimum tokens are not indexed; probing one reports absence, which
/// is why callers skip them when pruning.
#[test]
fn bloom_ignores_short_tokens() {
    let filter = TokenFilter::build(b"ab cd efg");
    assert!(filter.may_contain(b"efg"));
    assert!(!filter.may_contain(b"ab"));
}

#[test]
fn bloom_empty_payload_contains_nothing() {
    let filter = TokenFilter::build(b"");
    assert!(!filter.may_contain(b"anything"));
    assert_eq!(filter, TokenFilter::empty());
}
