//! Argument Model
//!
//! Closed representation of call arguments as seen by key derivation.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;

// == Primitive ==
/// A scalar argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Undefined,
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Str(String),
}

// == Arg ==
/// One call argument.
///
/// Only primitives, flat records and flat sequences can contribute to a key;
/// anything nested deeper or of an unsupported kind makes the call uncacheable.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Primitive(Primitive),
    /// Key/value record, property order as given
    Record(Vec<(String, Arg)>),
    Sequence(Vec<Arg>),
    /// A value that has no key representation, tagged with its kind
    Unsupported(&'static str),
}

impl Arg {
    pub fn undefined() -> Self {
        Arg::Primitive(Primitive::Undefined)
    }

    pub fn null() -> Self {
        Arg::Primitive(Primitive::Null)
    }

    /// Builds a record from `(name, value)` pairs.
    pub fn record<K, V, I>(props: I) -> Self
    where
        K: Into<String>,
        V: ToArg,
        I: IntoIterator<Item = (K, V)>,
    {
        Arg::Record(
            props
                .into_iter()
                .map(|(k, v)| (k.into(), v.to_arg()))
                .collect(),
        )
    }

    /// Converts any serializable value through its JSON shape.
    ///
    /// Structs become records, vectors become sequences. Values that fail to
    /// serialize map to [`Arg::Unsupported`].
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(json) => Arg::from(json),
            Err(_) => Arg::Unsupported("unserializable"),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Arg::Primitive(Primitive::Undefined))
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Arg::null(),
            Value::Bool(b) => Arg::Primitive(Primitive::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Arg::Primitive(Primitive::Integer(i)),
                None => Arg::Primitive(Primitive::Number(n.as_f64().unwrap_or(f64::NAN))),
            },
            Value::String(s) => Arg::Primitive(Primitive::Str(s)),
            Value::Array(items) => Arg::Sequence(items.into_iter().map(Arg::from).collect()),
            Value::Object(map) => {
                Arg::Record(map.into_iter().map(|(k, v)| (k, Arg::from(v))).collect())
            }
        }
    }
}

// == ToArg ==
/// Conversion of a Rust value into an [`Arg`].
pub trait ToArg {
    fn to_arg(&self) -> Arg;
}

impl ToArg for Arg {
    fn to_arg(&self) -> Arg {
        self.clone()
    }
}

impl ToArg for Value {
    fn to_arg(&self) -> Arg {
        Arg::from(self.clone())
    }
}

impl ToArg for str {
    fn to_arg(&self) -> Arg {
        Arg::Primitive(Primitive::Str(self.to_string()))
    }
}

impl ToArg for String {
    fn to_arg(&self) -> Arg {
        self.as_str().to_arg()
    }
}

impl ToArg for bool {
    fn to_arg(&self) -> Arg {
        Arg::Primitive(Primitive::Bool(*self))
    }
}

macro_rules! int_to_arg {
    ($($ty:ty),*) => {
        $(impl ToArg for $ty {
            fn to_arg(&self) -> Arg {
                Arg::Primitive(Primitive::Integer(i64::from(*self)))
            }
        })*
    };
}

int_to_arg!(i8, i16, i32, i64, u8, u16, u32);

impl ToArg for u64 {
    fn to_arg(&self) -> Arg {
        match i64::try_from(*self) {
            Ok(i) => Arg::Primitive(Primitive::Integer(i)),
            Err(_) => Arg::Primitive(Primitive::Number(*self as f64)),
        }
    }
}

impl ToArg for usize {
    fn to_arg(&self) -> Arg {
        (*self as u64).to_arg()
    }
}

impl ToArg for f32 {
    fn to_arg(&self) -> Arg {
        Arg::Primitive(Primitive::Number(f64::from(*self)))
    }
}

impl ToArg for f64 {
    fn to_arg(&self) -> Arg {
        Arg::Primitive(Primitive::Number(*self))
    }
}

impl<T: ToArg> ToArg for Option<T> {
    fn to_arg(&self) -> Arg {
        match self {
            Some(v) => v.to_arg(),
            None => Arg::null(),
        }
    }
}

impl<T: ToArg> ToArg for Vec<T> {
    fn to_arg(&self) -> Arg {
        self.as_slice().to_arg()
    }
}

impl<T: ToArg> ToArg for [T] {
    fn to_arg(&self) -> Arg {
        Arg::Sequence(self.iter().map(ToArg::to_arg).collect())
    }
}

impl<V: ToArg> ToArg for BTreeMap<String, V> {
    fn to_arg(&self) -> Arg {
        Arg::Record(self.iter().map(|(k, v)| (k.clone(), v.to_arg())).collect())
    }
}

impl<V: ToArg, S> ToArg for HashMap<String, V, S> {
    fn to_arg(&self) -> Arg {
        Arg::Record(self.iter().map(|(k, v)| (k.clone(), v.to_arg())).collect())
    }
}

impl<T: ToArg + ?Sized> ToArg for &T {
    fn to_arg(&self) -> Arg {
        (**self).to_arg()
    }
}

// == CallArgs ==
/// The full argument tuple of one invocation.
pub trait CallArgs {
    fn to_args(&self) -> Vec<Arg>;
}

impl CallArgs for () {
    fn to_args(&self) -> Vec<Arg> {
        Vec::new()
    }
}

impl CallArgs for Vec<Arg> {
    fn to_args(&self) -> Vec<Arg> {
        self.clone()
    }
}

macro_rules! tuple_call_args {
    ($($name:ident $idx:tt),+) => {
        impl<$($name: ToArg),+> CallArgs for ($($name,)+) {
            fn to_args(&self) -> Vec<Arg> {
                vec![$(self.$idx.to_arg()),+]
            }
        }
    };
}

tuple_call_args!(A 0);
tuple_call_args!(A 0, B 1);
tuple_call_args!(A 0, B 1, C 2);
tuple_call_args!(A 0, B 1, C 2, D 3);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_object_becomes_record() {
        let arg = Arg::from(json!({"id": 1, "name": "xx"}));
        match arg {
            Arg::Record(props) => {
                assert_eq!(props.len(), 2);
                assert!(props.contains(&(
                    "id".to_string(),
                    Arg::Primitive(Primitive::Integer(1))
                )));
            }
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn test_from_serialize_struct() {
        #[derive(Serialize)]
        struct Query {
            page: u32,
        }

        let arg = Arg::from_serialize(&Query { page: 2 });
        assert_eq!(
            arg,
            Arg::Record(vec![(
                "page".to_string(),
                Arg::Primitive(Primitive::Integer(2))
            )])
        );
    }

    #[test]
    fn test_option_none_is_null() {
        let value: Option<u32> = None;
        assert_eq!(value.to_arg(), Arg::null());
    }

    #[test]
    fn test_tuple_args_keep_order() {
        let args = ("a", 1u8, true).to_args();
        assert_eq!(args.len(), 3);
        assert_eq!(args[0], Arg::Primitive(Primitive::Str("a".to_string())));
        assert_eq!(args[2], Arg::Primitive(Primitive::Bool(true)));
    }

    #[test]
    fn test_unit_has_no_args() {
        assert!(().to_args().is_empty());
    }
}
