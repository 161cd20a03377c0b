//! Reviver registry: raw strings to typed values.
//!
//! Lookup order for one argument:
//! 1. the argument's own reviver override
//! 2. a reviver registered for the exact type (user registrations replace built-ins)
//! 3. the type's own mechanism (enum variants, `FromStr` fallback, `Option`/`Vec` composition)
//!
//! A registry is immutable once built. A process-wide registry can be
//! installed once at start-up with [`ReviverRegistry::install_global`].

mod builtin;
pub mod enums;
pub mod value;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::error::{ArgError, DefinitionError};

pub use enums::{ArgEnum, ArgFlags, EnumVariant};
pub use value::{ArgType, ArgValue, ReviveFn, ValueKind, ValueType, short_type_name};

#[derive(Clone)]
struct Entry {
    type_name: String,
    revive: ReviveFn,
}

pub struct ReviverRegistry {
    revivers: HashMap<TypeId, Entry>,
}

impl std::fmt::Debug for ReviverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.revivers.values().map(|e| e.type_name.as_str()).collect();
        names.sort_unstable();
        f.debug_struct("ReviverRegistry").field("types", &names).finish()
    }
}

static GLOBAL: OnceLock<Arc<ReviverRegistry>> = OnceLock::new();

impl ReviverRegistry {
    /// A builder pre-populated with the built-in revivers.
    pub fn builder() -> ReviverRegistryBuilder {
        let mut b = ReviverRegistryBuilder::default();
        builtin::register_all(&mut b);
        b
    }

    /// A builder with no revivers at all.
    pub fn empty() -> ReviverRegistryBuilder {
        ReviverRegistryBuilder::default()
    }

    /// The process-wide registry: whatever was installed, otherwise built-ins only.
    pub fn global() -> Arc<ReviverRegistry> {
        GLOBAL.get_or_init(|| Self::builder().build()).clone()
    }

    /// Install the process-wide registry. Fails (returning the rejected
    /// registry) if one was already installed or [`Self::global`] already ran.
    pub fn install_global(registry: Arc<ReviverRegistry>) -> Result<(), Arc<ReviverRegistry>> {
        GLOBAL.set(registry)
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.revivers.contains_key(&id)
    }

    /// Definition-time check that `ty` can be revived at all.
    pub fn check(&self, ty: &ValueType) -> Result<(), DefinitionError> {
        if self.contains(ty.id()) {
            return Ok(());
        }
        match ty.kind() {
            ValueKind::Bool | ValueKind::Enum(_) => Ok(()),
            ValueKind::Scalar { parse: Some(_) } => Ok(()),
            ValueKind::Scalar { parse: None } => Err(DefinitionError::new(format!(
                "no reviver is registered for type {}",
                ty.name()
            ))),
            ValueKind::Optional { inner, .. } => self.check(inner),
            ValueKind::List { element, .. } => self.check(element),
        }
    }

    /// Revive one raw value. Lists split `raw` on commas.
    pub fn revive(
        &self,
        ty: &ValueType,
        name: &str,
        raw: &str,
        ignore_case: bool,
    ) -> Result<ArgValue, ArgError> {
        if let Some(entry) = self.revivers.get(&ty.id()) {
            return (entry.revive)(name, raw);
        }

        match ty.kind() {
            ValueKind::Bool => builtin::parse_bool(name, raw).map(ArgValue::new),
            ValueKind::Scalar { parse: Some(parse) } => parse(name, raw),
            ValueKind::Scalar { parse: None } => Err(ArgError::validation(format!(
                "no reviver is registered for type {} (argument '{name}')",
                ty.name()
            ))),
            ValueKind::Enum(shape) => (shape.revive)(name, raw, ignore_case),
            ValueKind::Optional { inner, wrap } => {
                let value = self.revive(inner, name, raw, ignore_case)?;
                wrap(value).ok_or_else(|| type_mismatch(ty, name))
            }
            ValueKind::List { element, collect } => {
                let items = split_list(raw);
                let mut revived = Vec::with_capacity(items.len());
                for item in items {
                    revived.push(self.revive(element, name, item, ignore_case)?);
                }
                collect(revived).ok_or_else(|| type_mismatch(ty, name))
            }
        }
    }

    /// Revive a list argument that was given as several tokens
    /// (`-li 1 2 3`). Each token is one element.
    pub fn revive_tokens(
        &self,
        ty: &ValueType,
        name: &str,
        tokens: &[String],
        ignore_case: bool,
    ) -> Result<ArgValue, ArgError> {
        match ty.kind() {
            ValueKind::List { element, collect } if !self.contains(ty.id()) => {
                let mut revived = Vec::with_capacity(tokens.len());
                for token in tokens {
                    revived.push(self.revive(element, name, token, ignore_case)?);
                }
                collect(revived).ok_or_else(|| type_mismatch(ty, name))
            }
            _ => self.revive(ty, name, &tokens.join(","), ignore_case),
        }
    }
}

fn split_list(raw: &str) -> Vec<&str> {
    if raw.is_empty() {
        Vec::new()
    } else {
        raw.split(',').collect()
    }
}

fn type_mismatch(ty: &ValueType, name: &str) -> ArgError {
    ArgError::validation(format!(
        "a reviver produced a value that is not a {} (argument '{name}')",
        ty.name()
    ))
}

#[derive(Default)]
pub struct ReviverRegistryBuilder {
    revivers: HashMap<TypeId, Entry>,
}

impl ReviverRegistryBuilder {
    /// Register a reviver for `T`, replacing any existing one.
    pub fn register<T, F>(mut self, revive: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&str, &str) -> Result<T, ArgError> + Send + Sync + 'static,
    {
        self.insert::<T, F>(revive);
        self
    }

    /// Register `T`'s `FromStr` implementation as its reviver.
    pub fn register_parse<T>(mut self) -> Self
    where
        T: std::str::FromStr + Any + Send + Sync,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.insert_parse::<T>();
        self
    }

    pub(crate) fn insert<T, F>(&mut self, revive: F)
    where
        T: Any + Send + Sync,
        F: Fn(&str, &str) -> Result<T, ArgError> + Send + Sync + 'static,
    {
        let type_name = short_type_name(std::any::type_name::<T>());
        tracing::trace!(type_name = %type_name, "registering reviver");
        self.revivers.insert(
            TypeId::of::<T>(),
            Entry {
                type_name,
                revive: Arc::new(move |name: &str, raw: &str| revive(name, raw).map(ArgValue::new)),
            },
        );
    }

    pub(crate) fn insert_parse<T>(&mut self)
    where
        T: std::str::FromStr + Any + Send + Sync,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        let type_name = short_type_name(std::any::type_name::<T>());
        let label = type_name.clone();
        self.revivers.insert(
            TypeId::of::<T>(),
            Entry {
                type_name,
                revive: Arc::new(move |name: &str, raw: &str| {
                    raw.parse::<T>()
                        .map(ArgValue::new)
                        .map_err(|e| value::conversion_error(&label, name, raw, e))
                }),
            },
        );
    }

    pub fn build(self) -> Arc<ReviverRegistry> {
        Arc::new(ReviverRegistry {
            revivers: self.revivers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    fn registry() -> Arc<ReviverRegistry> {
        ReviverRegistry::builder().build()
    }

    fn revive<T: ArgType>(raw: &str) -> Result<T, ArgError> {
        registry()
            .revive(&T::value_type(), "arg", raw, true)
            .map(|v| v.downcast_ref::<T>().unwrap().clone())
    }

    #[test]
    fn primitives_revive() {
        assert_eq!(revive::<i32>("34").unwrap(), 34);
        assert_eq!(revive::<f64>("33.33").unwrap(), 33.33);
        assert_eq!(revive::<String>("v").unwrap(), "v");
        assert!(revive::<bool>("TRUE").unwrap());
        assert!(!revive::<bool>("0").unwrap());
        assert_eq!(revive::<char>("x").unwrap(), 'x');
    }

    #[test]
    fn list_edge_cases() {
        assert_eq!(revive::<Vec<i32>>("10").unwrap(), vec![10]);
        assert_eq!(revive::<Vec<i32>>("").unwrap(), Vec::<i32>::new());
        assert_eq!(revive::<Vec<String>>(",").unwrap(), vec![String::new(), String::new()]);
        assert_eq!(revive::<Vec<i32>>("1,2,3").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn list_from_tokens() {
        let tokens = vec!["1".to_string(), "2".to_string()];
        let v = registry()
            .revive_tokens(&<Vec<u8>>::value_type(), "li", &tokens, true)
            .unwrap();
        assert_eq!(v.downcast_ref::<Vec<u8>>().unwrap(), &vec![1u8, 2]);
    }

    #[test]
    fn optional_wraps_inner_value() {
        assert_eq!(revive::<Option<u16>>("7").unwrap(), Some(7));
    }

    #[test]
    fn conversion_failure_keeps_raw_and_cause() {
        let err = revive::<i32>("abc").unwrap_err();
        assert_eq!(err.raw_value(), Some("abc"));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("'abc' is not a valid i32"));
    }

    #[test]
    fn user_reviver_takes_priority_over_builtin() {
        let registry = ReviverRegistry::builder()
            .register::<i32, _>(|_, raw| Ok(raw.len() as i32))
            .build();
        let v = registry.revive(&i32::value_type(), "n", "hello", true).unwrap();
        assert_eq!(v.downcast_ref::<i32>(), Some(&5));
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Point(i32, i32);

    impl ArgType for Point {
        fn value_type() -> ValueType {
            ValueType::scalar::<Self>()
        }
    }

    #[test]
    fn unregistered_scalar_fails_definition_check() {
        let err = registry().check(&ValueType::scalar::<Point>()).unwrap_err();
        assert!(err.message().contains("Point"));

        let registry = ReviverRegistry::empty()
            .register::<Point, _>(|name, raw| {
                let (x, y) = raw
                    .split_once('x')
                    .ok_or_else(|| ArgError::validation(format!("bad point for {name}")))?;
                let x = x.parse().map_err(|e| value::conversion_error("Point", name, raw, e))?;
                let y = y.parse().map_err(|e| value::conversion_error("Point", name, raw, e))?;
                Ok(Point(x, y))
            })
            .build();
        assert!(registry.check(&<Vec<Point>>::value_type()).is_ok());
        let v = registry.revive(&Point::value_type(), "p", "3x4", true).unwrap();
        assert_eq!(v.downcast_ref::<Point>(), Some(&Point(3, 4)));
        let v = registry
            .revive(&<Vec<Point>>::value_type(), "p", "1x2,3x4", true)
            .unwrap();
        assert_eq!(v.downcast_ref::<Vec<Point>>().unwrap().len(), 2);
    }

    #[test]
    fn dates_uuids_and_urls() {
        let d = revive::<chrono::NaiveDate>("2024-02-29").unwrap();
        assert_eq!(d.to_string(), "2024-02-29");
        assert!(revive::<uuid::Uuid>("67e55044-10b1-426f-9247-bb680e5fe0c8").is_ok());
        assert!(revive::<url::Url>("https://example.com/x").is_ok());
        assert!(revive::<semver::Version>("1.2.3").is_ok());
    }
}
