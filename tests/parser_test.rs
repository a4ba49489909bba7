//! Integration tests for the call parser.

use nano_chat::{parse_calls, strip_quotes, ArgValue};

#[test]
fn test_strip_quotes() {
    assert_eq!(strip_quotes("\"hello\""), "hello");
    assert_eq!(strip_quotes("'world'"), "world");
    assert_eq!(strip_quotes("\"'mixed'\""), "'mixed'");
    assert_eq!(strip_quotes("'\"mixed\"'"), "\"mixed\"");
    assert_eq!(strip_quotes("no quotes"), "no quotes");
    assert_eq!(strip_quotes(""), "");
    assert_eq!(strip_quotes("\""), "\"");
    assert_eq!(strip_quotes("'"), "'");
    assert_eq!(strip_quotes("\"a"), "\"a");
    assert_eq!(strip_quotes("a\""), "a\"");
    assert_eq!(strip_quotes("'a"), "'a");
    assert_eq!(strip_quotes("a'"), "a'");
    assert_eq!(strip_quotes("\"\""), "");
    assert_eq!(strip_quotes("''"), "");
}

#[test]
fn test_single_call() {
    let calls = parse_calls(r#"get_weather(location="Paris")"#).unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name, "get_weather");
    assert_eq!(
        calls[0].args,
        vec![(
            "location".to_string(),
            ArgValue::Str("Paris".to_string())
        )]
    );
}

#[test]
fn test_multiple_calls_on_separate_lines() {
    let calls = parse_calls("set_timer(seconds=30)\nget_weather(location='Kyoto')").unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].name, "set_timer");
    assert_eq!(calls[1].name, "get_weather");
}

#[test]
fn test_semicolon_separator() {
    let calls = parse_calls("a(x=1); b(y=2)").unwrap();
    assert_eq!(calls.len(), 2);
}

#[test]
fn test_literal_kinds() {
    let calls = parse_calls(
        r#"configure(name="dim", level=3, ratio=0.5, enabled=true, fallback=None)"#,
    )
    .unwrap();
    let call = &calls[0];
    assert_eq!(call.arg("name"), Some(&ArgValue::Str("dim".to_string())));
    assert_eq!(call.arg("level"), Some(&ArgValue::Int(3)));
    assert_eq!(call.arg("ratio"), Some(&ArgValue::Float(0.5)));
    assert_eq!(call.arg("enabled"), Some(&ArgValue::Bool(true)));
    assert_eq!(call.arg("fallback"), Some(&ArgValue::Null));
}

#[test]
fn test_negative_and_exponent_numbers() {
    let calls = parse_calls("move_to(x=-4, y=1.5e2)").unwrap();
    assert_eq!(calls[0].arg("x"), Some(&ArgValue::Int(-4)));
    assert_eq!(calls[0].arg("y"), Some(&ArgValue::Float(150.0)));
}

#[test]
fn test_dotted_call_name() {
    let calls = parse_calls(r#"default_api.get_weather(location="Paris")"#).unwrap();
    assert_eq!(calls[0].name, "default_api.get_weather");
}

#[test]
fn test_fenced_tool_code_block() {
    let text = "```tool_code\nget_weather(location=\"Paris\")\n```";
    let calls = parse_calls(text).unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name, "get_weather");
}

#[test]
fn test_nested_values() {
    let calls = parse_calls(r#"plan(cities=["Paris", "Lyon"], check=verify(level=2))"#).unwrap();
    assert_eq!(
        calls[0].arg("cities"),
        Some(&ArgValue::List(vec![
            ArgValue::Str("Paris".to_string()),
            ArgValue::Str("Lyon".to_string()),
        ]))
    );
    match calls[0].arg("check") {
        Some(ArgValue::Call(inner)) => {
            assert_eq!(inner.name, "verify");
            assert_eq!(inner.arg("level"), Some(&ArgValue::Int(2)));
        }
        other => panic!("expected nested call, got {other:?}"),
    }
}

#[test]
fn test_escaped_string() {
    let calls = parse_calls(r#"say(text="line one\nit\'s two")"#).unwrap();
    assert_eq!(
        calls[0].arg("text"),
        Some(&ArgValue::Str("line one\nit's two".to_string()))
    );
}

#[test]
fn test_empty_argument_list() {
    let calls = parse_calls("refresh()").unwrap();
    assert_eq!(calls[0].name, "refresh");
    assert!(calls[0].args.is_empty());
}

#[test]
fn test_plain_prose_is_unparseable() {
    let failure = parse_calls("It is sunny in Paris today.").unwrap_err();
    assert!(!failure.diagnostics.is_empty());
}

#[test]
fn test_trailing_prose_after_call_is_unparseable() {
    assert!(parse_calls("get_weather(location=\"Paris\") as requested").is_err());
}

#[test]
fn test_missing_value_is_unparseable() {
    let failure = parse_calls("get_weather(location=)").unwrap_err();
    assert!(!failure.diagnostics.is_empty());
}

#[test]
fn test_unterminated_string_is_unparseable() {
    assert!(parse_calls("get_weather(location=\"Paris)").is_err());
}

#[test]
fn test_positional_arguments_are_unparseable() {
    assert!(parse_calls("get_weather(\"Paris\")").is_err());
}

#[test]
fn test_empty_span_yields_no_calls() {
    assert!(parse_calls("").unwrap().is_empty());
    assert!(parse_calls("   \n").unwrap().is_empty());
}
