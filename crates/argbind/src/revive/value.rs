use std::any::{Any, TypeId};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ArgError;
use crate::revive::enums::{self, ArgEnum, ArgFlags};

/// A revived, type-erased argument value.
#[derive(Clone)]
pub struct ArgValue {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ArgValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Full Rust type name of the stored value.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArgValue<{}>", short_type_name(self.type_name))
    }
}

/// `(argumentName, raw) -> value`.
pub type ReviveFn = Arc<dyn Fn(&str, &str) -> Result<ArgValue, ArgError> + Send + Sync>;

type EnumReviveFn = fn(&str, &str, bool) -> Result<ArgValue, ArgError>;
type CollectFn = fn(Vec<ArgValue>) -> Option<ArgValue>;
type WrapFn = fn(ArgValue) -> Option<ArgValue>;

#[derive(Clone)]
pub struct EnumShape {
    pub(crate) revive: EnumReviveFn,
    pub(crate) options: fn() -> Vec<&'static str>,
    pub(crate) flags: bool,
}

/// How a declared type is revived.
#[derive(Clone)]
pub enum ValueKind {
    Bool,
    /// Needs a registered reviver unless the type brought its own parser.
    Scalar { parse: Option<ReviveFn> },
    Enum(EnumShape),
    Optional { inner: Box<ValueType>, wrap: WrapFn },
    List { element: Box<ValueType>, collect: CollectFn },
}

/// Runtime descriptor of an argument's declared type.
#[derive(Clone)]
pub struct ValueType {
    id: TypeId,
    name: String,
    kind: ValueKind,
}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueType").field("name", &self.name).finish()
    }
}

impl ValueType {
    pub fn bool() -> Self {
        Self {
            id: TypeId::of::<bool>(),
            name: "bool".to_string(),
            kind: ValueKind::Bool,
        }
    }

    /// A type revived through the [`crate::ReviverRegistry`].
    pub fn scalar<T: Any + Send + Sync>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
            kind: ValueKind::Scalar { parse: None },
        }
    }

    /// A type that falls back to its `FromStr` implementation when no reviver
    /// is registered for it.
    pub fn parsable<T>() -> Self
    where
        T: FromStr + Any + Send + Sync,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        let name = short_type_name(std::any::type_name::<T>());
        let type_label = name.clone();
        let parse: ReviveFn = Arc::new(move |arg: &str, raw: &str| {
            raw.parse::<T>()
                .map(ArgValue::new)
                .map_err(|e| conversion_error(&type_label, arg, raw, e))
        });
        Self {
            id: TypeId::of::<T>(),
            name,
            kind: ValueKind::Scalar { parse: Some(parse) },
        }
    }

    pub fn enumeration<E: ArgEnum>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: short_type_name(std::any::type_name::<E>()),
            kind: ValueKind::Enum(EnumShape {
                revive: enums::revive_variant::<E>,
                options: enums::option_names::<E>,
                flags: false,
            }),
        }
    }

    pub fn flags<E: ArgFlags>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: short_type_name(std::any::type_name::<E>()),
            kind: ValueKind::Enum(EnumShape {
                revive: enums::revive_flags::<E>,
                options: enums::option_names::<E>,
                flags: true,
            }),
        }
    }

    pub fn optional<T: ArgType>() -> Self {
        let inner = T::value_type();
        Self {
            id: TypeId::of::<Option<T>>(),
            name: format!("Option<{}>", inner.name),
            kind: ValueKind::Optional {
                inner: Box::new(inner),
                wrap: wrap_some::<T>,
            },
        }
    }

    pub fn list<T: ArgType>() -> Self {
        let element = T::value_type();
        Self {
            id: TypeId::of::<Vec<T>>(),
            name: format!("Vec<{}>", element.name),
            kind: ValueKind::List {
                element: Box::new(element),
                collect: collect_vec::<T>,
            },
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    /// `bool` or `Option<bool>`: may appear on the command line without a value.
    pub fn is_flag(&self) -> bool {
        match &self.kind {
            ValueKind::Bool => true,
            ValueKind::Optional { inner, .. } => inner.is_flag(),
            _ => false,
        }
    }

    /// Accepts several space-separated tokens.
    pub fn is_list(&self) -> bool {
        matches!(self.kind, ValueKind::List { .. })
    }

    /// Declared enum options (empty for non-enum types).
    pub fn options(&self) -> Vec<&'static str> {
        match &self.kind {
            ValueKind::Enum(shape) => (shape.options)(),
            ValueKind::Optional { inner, .. } => inner.options(),
            ValueKind::List { element, .. } => element.options(),
            _ => Vec::new(),
        }
    }
}

/// Maps a Rust type to its [`ValueType`].
///
/// Implemented for primitives, `String`, paths, addresses, dates, uuids,
/// urls, versions, `Option<T>` and `Vec<T>`. For your own types:
///
/// ```ignore
/// impl ArgType for Color {
///     fn value_type() -> ValueType {
///         ValueType::enumeration::<Self>()
///     }
/// }
/// ```
pub trait ArgType: Clone + Send + Sync + 'static {
    fn value_type() -> ValueType;
}

impl ArgType for bool {
    fn value_type() -> ValueType {
        ValueType::bool()
    }
}

macro_rules! scalar_arg_types {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ArgType for $ty {
                fn value_type() -> ValueType {
                    ValueType::scalar::<$ty>()
                }
            }
        )*
    };
}

scalar_arg_types!(
    char,
    String,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
    std::path::PathBuf,
    std::net::IpAddr,
    std::net::SocketAddr,
    uuid::Uuid,
    url::Url,
    semver::Version,
    chrono::NaiveDate,
    chrono::NaiveDateTime,
    chrono::DateTime<chrono::Utc>,
);

impl<T: ArgType> ArgType for Option<T> {
    fn value_type() -> ValueType {
        ValueType::optional::<T>()
    }
}

impl<T: ArgType> ArgType for Vec<T> {
    fn value_type() -> ValueType {
        ValueType::list::<T>()
    }
}

fn wrap_some<T: Clone + Send + Sync + 'static>(value: ArgValue) -> Option<ArgValue> {
    value
        .downcast_ref::<T>()
        .cloned()
        .map(|v| ArgValue::new(Some(v)))
}

fn collect_vec<T: Clone + Send + Sync + 'static>(items: Vec<ArgValue>) -> Option<ArgValue> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in &items {
        out.push(item.downcast_ref::<T>()?.clone());
    }
    Some(ArgValue::new(out))
}

pub(crate) fn conversion_error(
    type_name: &str,
    arg: &str,
    raw: &str,
    source: impl std::error::Error + Send + Sync + 'static,
) -> ArgError {
    ArgError::invalid_value(
        format!("'{raw}' is not a valid {type_name} for argument '{arg}'"),
        raw,
        source,
    )
}

/// `alloc::vec::Vec<my_app::Color>` -> `Vec<Color>`.
pub fn short_type_name(full: &str) -> String {
    fn last(segment: &str) -> &str {
        segment.rsplit("::").next().unwrap_or(segment)
    }

    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for c in full.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            segment.push(c);
        } else {
            out.push_str(last(&segment));
            segment.clear();
            out.push(c);
        }
    }
    out.push_str(last(&segment));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_strip_paths_inside_generics() {
        assert_eq!(short_type_name("alloc::vec::Vec<my_app::Color>"), "Vec<Color>");
        assert_eq!(short_type_name("i32"), "i32");
        assert_eq!(
            short_type_name("chrono::datetime::DateTime<chrono::offset::utc::Utc>"),
            "DateTime<Utc>"
        );
    }

    #[test]
    fn open_shapes_describe_themselves() {
        let ty = <Vec<i32>>::value_type();
        assert!(ty.is_list());
        assert_eq!(ty.name(), "Vec<i32>");

        let ty = <Option<bool>>::value_type();
        assert!(ty.is_flag());
        assert_eq!(ty.name(), "Option<bool>");
    }

    #[test]
    fn collect_rejects_mismatched_elements() {
        let items = vec![ArgValue::new(1i32), ArgValue::new("x".to_string())];
        assert!(collect_vec::<i32>(items).is_none());
    }
}
