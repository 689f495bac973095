//! Key Derivation Module
//!
//! Turns call arguments into deterministic cache keys.
//!
//! Grammar, applied per argument and joined with `&`:
//! - record: properties sorted by name, `name=value` joined with `&`, empty → `{}`
//! - sequence: `[` + values joined with `_` + `]`, empty → `[]`
//! - primitive: rendered directly
//!
//! Non-string primitives carry the [`TYPE_MARKER`] prefix so the string `"1"`
//! and the number `1` never produce the same key.

use std::fmt;
use std::sync::Arc;

use crate::key::{Arg, Primitive};

// == Public Constants ==
/// Key used when a call carries no meaningful arguments.
pub const DEFAULT_KEY: &str = "__memo_task_default__";

/// Prefix applied to every non-string primitive.
pub const TYPE_MARKER: &str = "$-";

/// Custom key function signature.
pub type KeyFn = dyn Fn(&[Arg]) -> Option<String> + Send + Sync;

// == Key Strategy ==
/// How a handler derives its cache key.
#[derive(Clone, Default)]
pub enum KeyStrategy {
    /// Built-in derivation from the argument grammar
    #[default]
    Args,
    /// Every call shares the same key
    Fixed(String),
    /// Caller-provided function; `None` or an empty string means uncacheable
    Derive(Arc<KeyFn>),
    /// Named property of the first argument, which must be a record
    Property(String),
}

impl KeyStrategy {
    pub fn derive<F>(f: F) -> Self
    where
        F: Fn(&[Arg]) -> Option<String> + Send + Sync + 'static,
    {
        KeyStrategy::Derive(Arc::new(f))
    }

    // == Cache Key ==
    /// Derives the cache key for `args`, or `None` if the call is uncacheable.
    pub fn cache_key(&self, args: &[Arg]) -> Option<String> {
        match self {
            KeyStrategy::Args => derive_key(args),
            KeyStrategy::Fixed(key) => non_empty(key.clone()),
            KeyStrategy::Derive(f) => f(args).and_then(non_empty),
            KeyStrategy::Property(name) => match args.first() {
                Some(Arg::Record(props)) => props
                    .iter()
                    .find(|(prop, _)| prop == name)
                    .and_then(|(_, value)| match value {
                        Arg::Primitive(p) => Some(transform(p)),
                        _ => None,
                    }),
                _ => None,
            },
        }
    }
}

impl fmt::Debug for KeyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyStrategy::Args => f.write_str("Args"),
            KeyStrategy::Fixed(key) => f.debug_tuple("Fixed").field(key).finish(),
            KeyStrategy::Derive(_) => f.write_str("Derive(..)"),
            KeyStrategy::Property(name) => f.debug_tuple("Property").field(name).finish(),
        }
    }
}

fn non_empty(key: String) -> Option<String> {
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

// == Derive Key ==
/// Derives a key from the argument grammar.
///
/// Returns [`DEFAULT_KEY`] for zero arguments or a single undefined argument,
/// and `None` as soon as any argument cannot be represented.
pub fn derive_key(args: &[Arg]) -> Option<String> {
    match args {
        [] => return Some(DEFAULT_KEY.to_string()),
        [only] if only.is_undefined() => return Some(DEFAULT_KEY.to_string()),
        _ => {}
    }

    let parts = args
        .iter()
        .map(derive_arg)
        .collect::<Option<Vec<String>>>()?;
    Some(parts.join("&"))
}

fn derive_arg(arg: &Arg) -> Option<String> {
    match arg {
        Arg::Primitive(p) => Some(transform(p)),
        Arg::Record(props) => {
            if props.is_empty() {
                return Some("{}".to_string());
            }
            let mut rendered = props
                .iter()
                .map(|(name, value)| match value {
                    Arg::Primitive(p) => Some((name.as_str(), transform(p))),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()?;
            rendered.sort_by(|a, b| a.0.cmp(b.0));
            let joined = rendered
                .into_iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("&");
            Some(joined)
        }
        Arg::Sequence(items) => {
            let rendered = items
                .iter()
                .map(|item| match item {
                    Arg::Primitive(p) => Some(transform(p)),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()?;
            Some(format!("[{}]", rendered.join("_")))
        }
        Arg::Unsupported(_) => None,
    }
}

// == Transform ==
/// Renders a primitive for inclusion in a key.
pub fn transform(value: &Primitive) -> String {
    match value {
        Primitive::Str(s) => s.clone(),
        Primitive::Undefined => format!("{}undefined", TYPE_MARKER),
        Primitive::Null => format!("{}null", TYPE_MARKER),
        Primitive::Bool(b) => format!("{}{}", TYPE_MARKER, b),
        Primitive::Integer(i) => format!("{}{}", TYPE_MARKER, i),
        Primitive::Number(n) => format!("{}{}", TYPE_MARKER, format_number(*n)),
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let rendered = if n > 0.0 { "Infinity" } else { "-Infinity" };
        rendered.to_string()
    } else if n == 0.0 {
        // covers -0
        "0".to_string()
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{CallArgs, ToArg};
    use serde_json::json;

    fn key_of(args: impl CallArgs) -> Option<String> {
        derive_key(&args.to_args())
    }

    #[test]
    fn test_record_properties_sorted() {
        let a = key_of((json!({"id": 1, "name": "xx", "age": 1}),));
        let b = key_of((json!({"age": 1, "name": "xx", "id": 1}),));
        assert_eq!(a.as_deref(), Some("age=$-1&id=$-1&name=xx"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_nested_record_is_uncacheable() {
        assert_eq!(key_of((json!({"id": 1, "d": {"name": "el"}}),)), None);
        assert_eq!(key_of((json!({"id": [1, 2]}),)), None);
    }

    #[test]
    fn test_default_key() {
        assert_eq!(key_of(()).as_deref(), Some(DEFAULT_KEY));
        assert_eq!(key_of((Arg::undefined(),)).as_deref(), Some(DEFAULT_KEY));
        assert_eq!(key_of((json!({}),)).as_deref(), Some("{}"));
    }

    #[test]
    fn test_two_undefined_args_are_not_default() {
        let key = key_of((Arg::undefined(), Arg::undefined()));
        assert_eq!(key.as_deref(), Some("$-undefined&$-undefined"));
    }

    #[test]
    fn test_sequence_rendering() {
        assert_eq!(key_of((vec![1, 2, 3],)).as_deref(), Some("[$-1_$-2_$-3]"));
        assert_eq!(key_of((Vec::<u8>::new(),)).as_deref(), Some("[]"));
        assert_eq!(key_of((json!([1, [2]]),)), None);
        assert_eq!(key_of((json!([{"a": 1}]),)), None);
    }

    #[test]
    fn test_string_and_number_do_not_collide() {
        assert_eq!(key_of(("1",)).as_deref(), Some("1"));
        assert_eq!(key_of((1,)).as_deref(), Some("$-1"));
    }

    #[test]
    fn test_primitives_joined_in_order() {
        let key = key_of(("users", 3, true, Option::<u8>::None));
        assert_eq!(key.as_deref(), Some("users&$-3&$-true&$-null"));
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(transform(&Primitive::Number(1.0)), "$-1");
        assert_eq!(transform(&Primitive::Number(1.5)), "$-1.5");
        assert_eq!(transform(&Primitive::Number(-0.0)), "$-0");
        assert_eq!(transform(&Primitive::Number(f64::NAN)), "$-NaN");
        assert_eq!(transform(&Primitive::Number(f64::NEG_INFINITY)), "$--Infinity");
    }

    #[test]
    fn test_unsupported_arg_fails_whole_call() {
        let key = key_of(("ok", Arg::Unsupported("function")));
        assert_eq!(key, None);
    }

    #[test]
    fn test_fixed_strategy() {
        let strategy = KeyStrategy::Fixed("all".to_string());
        assert_eq!(strategy.cache_key(&(1, 2).to_args()).as_deref(), Some("all"));
        assert_eq!(KeyStrategy::Fixed(String::new()).cache_key(&[]), None);
    }

    #[test]
    fn test_derive_strategy_rejects_empty() {
        let strategy = KeyStrategy::derive(|args| match args.first() {
            Some(Arg::Primitive(Primitive::Str(s))) => Some(s.to_uppercase()),
            _ => Some(String::new()),
        });
        assert_eq!(strategy.cache_key(&("ab",).to_args()).as_deref(), Some("AB"));
        assert_eq!(strategy.cache_key(&(1,).to_args()), None);
    }

    #[test]
    fn test_property_strategy() {
        let strategy = KeyStrategy::Property("id".to_string());
        let args = vec![json!({"id": 7, "page": 2}).to_arg()];
        assert_eq!(strategy.cache_key(&args).as_deref(), Some("$-7"));
        assert_eq!(strategy.cache_key(&("7",).to_args()), None);
        assert_eq!(strategy.cache_key(&vec![json!({"page": 2}).to_arg()]), None);
    }
}
