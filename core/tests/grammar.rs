use jtg_core::{PatternError, TodoGrammar, TodoMatch, DEFAULT_ISSUE_PATTERN, DEFAULT_TODO_PATTERN};

fn grammar() -> TodoGrammar {
    TodoGrammar::new(DEFAULT_TODO_PATTERN, DEFAULT_ISSUE_PATTERN).unwrap()
}

fn keys(found: &[TodoMatch]) -> Vec<&str> {
    found
        .iter()
        .filter_map(|m| match m {
            TodoMatch::Issue { key, .. } => Some(key.as_str()),
            TodoMatch::Bare { .. } => None,
        })
        .collect()
}

#[test]
fn todo_with_issue_key_is_one_reference() {
    let found = grammar().scan(" TODO: see PM-1234");
    assert_eq!(found.len(), 1);
    match &found[0] {
        TodoMatch::Issue {
            key,
            project,
            number,
            ..
        } => {
            assert_eq!(key, "PM-1234");
            assert_eq!(project, "PM");
            assert_eq!(*number, 1234);
        }
        other => panic!("expected an issue match, got {other:?}"),
    }
}

#[test]
fn fixme_is_recognised_case_insensitively() {
    let found = grammar().scan(" fixme ABC-1");
    assert_eq!(keys(&found), vec!["ABC-1"]);
}

#[test]
fn todo_without_key_is_exactly_one_bare_match() {
    let found = grammar().scan(" TODO: give this a name!");
    assert_eq!(found.len(), 1);
    assert!(matches!(&found[0], TodoMatch::Bare { .. }));
}

#[test]
fn every_key_in_the_trailing_text_is_matched() {
    let found = grammar().scan(" TODO: see PM-42 and ABC-13");
    assert_eq!(keys(&found), vec!["PM-42", "ABC-13"]);
}

#[test]
fn each_outer_match_is_processed_independently() {
    // One reference-or-bare record per marker: max(k, 1) each.
    let comment = "*\n * TODO: PM-1 and XY-2\n * TODO no key yet\n ";
    let found = grammar().scan(comment);
    assert_eq!(found.len(), 3);
    assert_eq!(keys(&found), vec!["PM-1", "XY-2"]);
    assert!(matches!(&found[2], TodoMatch::Bare { .. }));
}

#[test]
fn trailing_text_stops_at_the_end_of_the_line() {
    let found = grammar().scan(" TODO:\n see PM-1");
    assert_eq!(found.len(), 1);
    assert!(matches!(&found[0], TodoMatch::Bare { .. }));
}

#[test]
fn marker_requires_word_boundaries() {
    assert!(grammar().scan("mastodon migration notes").is_empty());
}

#[test]
fn lowercase_project_prefix_is_not_a_key() {
    let found = grammar().scan(" TODO: see pm-12");
    assert_eq!(found.len(), 1);
    assert!(matches!(&found[0], TodoMatch::Bare { .. }));
}

#[test]
fn comment_without_marker_yields_nothing() {
    assert!(grammar().scan(" see PM-42 for context").is_empty());
}

#[test]
fn shared_source_text_for_keys_from_one_marker() {
    let found = grammar().scan(" TODO: see PM-42 and PM-43");
    let texts: Vec<_> = found
        .iter()
        .map(|m| match m {
            TodoMatch::Issue { source_text, .. } | TodoMatch::Bare { source_text } => source_text,
        })
        .collect();
    assert_eq!(texts.len(), 2);
    assert_eq!(texts[0], texts[1]);
}

#[test]
fn oversized_issue_number_still_yields_a_reference() {
    let found = grammar().scan(" TODO: see PM-99999999999999999999999999");
    assert_eq!(found.len(), 1);
    match &found[0] {
        TodoMatch::Issue { key, number, .. } => {
            assert_eq!(key, "PM-99999999999999999999999999");
            assert_eq!(*number, u64::MAX);
        }
        other => panic!("expected an issue match, got {other:?}"),
    }
}

#[test]
fn override_missing_text_capture_is_rejected() {
    let result = TodoGrammar::new(r"(?i)todo", DEFAULT_ISSUE_PATTERN);
    assert!(matches!(
        result,
        Err(PatternError::MissingCapture { stage: "todo", name: "text" })
    ));
}

#[test]
fn override_missing_number_capture_is_rejected() {
    let result = TodoGrammar::new(DEFAULT_TODO_PATTERN, r"(?P<project>[A-Z]+)-\d+");
    assert!(matches!(
        result,
        Err(PatternError::MissingCapture { stage: "issue", name: "number" })
    ));
}

#[test]
fn invalid_pattern_is_rejected() {
    let result = TodoGrammar::new(r"(?P<text>[", DEFAULT_ISSUE_PATTERN);
    assert!(matches!(result, Err(PatternError::Invalid { stage: "todo", .. })));
}

#[test]
fn custom_patterns_are_honoured() {
    let grammar = TodoGrammar::new(
        r"(?i)\bhack\b:?\s*(?P<text>[^\r\n]*)",
        r"#(?P<project>[A-Z]+)/(?P<number>\d+)",
    )
    .unwrap();
    let found = grammar.scan("HACK: tracked as #OPS/77");
    assert_eq!(keys(&found), vec!["OPS-77"]);
}
