//! Scalar serializers and the adapter lifting them to [`TypeSerializer`].

use std::any::Any;
use std::path::PathBuf;

use regex::Regex;
use url::Url;
use uuid::Uuid;

use crate::error::{SerializationError, SerializationResult};
use crate::node::{ConfigNode, Scalar, ScalarKind};
use crate::serialize::{type_mismatch, TypeSerializer};
use crate::types::{DynValue, TypeToken, Typed};

/// Converts between one scalar value and a typed value.
pub trait ScalarSerializer: Send + Sync + 'static {
    type Value: Typed;

    /// Coerce a raw scalar into the value type.
    fn deserialize(&self, ty: &TypeToken, raw: &Scalar) -> SerializationResult<Self::Value>;

    /// Produce a representation, preferring kinds for which `accepts` is true.
    fn serialize(&self, value: &Self::Value, accepts: &dyn Fn(ScalarKind) -> bool) -> Scalar;
}

/// Lifts a [`ScalarSerializer`] to a [`TypeSerializer`].
pub struct ScalarAdapter<S>(pub S);

impl<S: ScalarSerializer> TypeSerializer for ScalarAdapter<S> {
    fn deserialize(&self, ty: &TypeToken, node: &mut ConfigNode) -> SerializationResult<DynValue> {
        let raw = scalar_value(node)?;
        let value = self.0.deserialize(ty, raw)?;
        Ok(Box::new(value))
    }

    fn serialize(
        &self,
        ty: &TypeToken,
        value: Option<&dyn Any>,
        node: &mut ConfigNode,
    ) -> SerializationResult<()> {
        let Some(value) = value else {
            node.clear();
            return Ok(());
        };
        let value = value
            .downcast_ref::<S::Value>()
            .ok_or_else(|| type_mismatch(ty))?;
        let options = node.options().clone();
        let scalar = self.0.serialize(value, &|kind| options.accepts(kind));
        node.set_value(scalar);
        Ok(())
    }
}

/// The scalar held by `node`.
///
/// A list holding exactly one scalar is unwrapped to that scalar.
pub fn scalar_value(node: &ConfigNode) -> SerializationResult<&Scalar> {
    if let Some(scalar) = node.scalar() {
        return Ok(scalar);
    }
    if node.is_list() {
        let mut live = node.children_list().iter().filter(|c| !c.is_virtual());
        if let (Some(only), None) = (live.next(), live.next()) {
            if let Some(scalar) = only.scalar() {
                return Ok(scalar);
            }
        }
        return Err(SerializationError::message("Value must be provided as a scalar!"));
    }
    if node.is_map() && !node.is_virtual() {
        return Err(SerializationError::message("Value must be provided as a scalar!"));
    }
    Err(SerializationError::message("No scalar value present"))
}

/// Strings, accepting any scalar through its textual form.
pub struct StringSerializer;

impl ScalarSerializer for StringSerializer {
    type Value = String;

    fn deserialize(&self, _ty: &TypeToken, raw: &Scalar) -> SerializationResult<String> {
        Ok(raw.to_string())
    }

    fn serialize(&self, value: &String, _accepts: &dyn Fn(ScalarKind) -> bool) -> Scalar {
        Scalar::String(value.clone())
    }
}

/// Booleans from booleans, numbers, or yes/no style words.
pub struct BoolSerializer;

pub(crate) fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

impl ScalarSerializer for BoolSerializer {
    type Value = bool;

    fn deserialize(&self, _ty: &TypeToken, raw: &Scalar) -> SerializationResult<bool> {
        match raw {
            Scalar::Bool(value) => Ok(*value),
            Scalar::Float(value) => Ok(*value != 0.0),
            Scalar::Double(value) => Ok(*value != 0.0),
            other => match other.as_integer() {
                Some(value) => Ok(value != 0),
                None => parse_bool(&other.to_string())
                    .ok_or_else(|| SerializationError::coercion(other, "bool")),
            },
        }
    }

    fn serialize(&self, value: &bool, accepts: &dyn Fn(ScalarKind) -> bool) -> Scalar {
        if accepts(ScalarKind::Bool) {
            Scalar::Bool(*value)
        } else if accepts(ScalarKind::Int) {
            Scalar::Int(i32::from(*value))
        } else {
            Scalar::String(value.to_string())
        }
    }
}

/// Single characters from one-character strings or code points.
pub struct CharSerializer;

impl ScalarSerializer for CharSerializer {
    type Value = char;

    fn deserialize(&self, _ty: &TypeToken, raw: &Scalar) -> SerializationResult<char> {
        match raw {
            Scalar::Char(c) => Ok(*c),
            Scalar::String(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(SerializationError::coercion(s, "char")),
                }
            }
            other => other
                .as_integer()
                .and_then(|code| u32::try_from(code).ok())
                .and_then(char::from_u32)
                .ok_or_else(|| SerializationError::coercion(other, "char")),
        }
    }

    fn serialize(&self, value: &char, accepts: &dyn Fn(ScalarKind) -> bool) -> Scalar {
        if accepts(ScalarKind::Char) {
            Scalar::Char(*value)
        } else {
            Scalar::String(value.to_string())
        }
    }
}

/// UUIDs in their hyphenated textual form.
pub struct UuidSerializer;

impl ScalarSerializer for UuidSerializer {
    type Value = Uuid;

    fn deserialize(&self, _ty: &TypeToken, raw: &Scalar) -> SerializationResult<Uuid> {
        let text = raw.to_string();
        Uuid::parse_str(text.trim()).map_err(|_| SerializationError::coercion(text, "uuid"))
    }

    fn serialize(&self, value: &Uuid, _accepts: &dyn Fn(ScalarKind) -> bool) -> Scalar {
        Scalar::String(value.hyphenated().to_string())
    }
}

/// Absolute URLs.
pub struct UrlSerializer;

impl ScalarSerializer for UrlSerializer {
    type Value = Url;

    fn deserialize(&self, _ty: &TypeToken, raw: &Scalar) -> SerializationResult<Url> {
        let text = raw.to_string();
        Url::parse(text.trim()).map_err(|e| SerializationError::coercion(format!("{text} ({e})"), "url"))
    }

    fn serialize(&self, value: &Url, _accepts: &dyn Fn(ScalarKind) -> bool) -> Scalar {
        Scalar::String(value.as_str().to_string())
    }
}

/// Regular expressions, stored as their source pattern.
pub struct PatternSerializer;

impl ScalarSerializer for PatternSerializer {
    type Value = Regex;

    fn deserialize(&self, _ty: &TypeToken, raw: &Scalar) -> SerializationResult<Regex> {
        let text = raw.to_string();
        Regex::new(&text).map_err(|e| SerializationError::coercion(format!("{text} ({e})"), "pattern"))
    }

    fn serialize(&self, value: &Regex, _accepts: &dyn Fn(ScalarKind) -> bool) -> Scalar {
        Scalar::String(value.as_str().to_string())
    }
}

/// Filesystem paths.
pub struct PathSerializer;

impl ScalarSerializer for PathSerializer {
    type Value = PathBuf;

    fn deserialize(&self, _ty: &TypeToken, raw: &Scalar) -> SerializationResult<PathBuf> {
        Ok(PathBuf::from(raw.to_string()))
    }

    fn serialize(&self, value: &PathBuf, _accepts: &dyn Fn(ScalarKind) -> bool) -> Scalar {
        Scalar::String(value.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ConfigurationOptions;

    fn node() -> ConfigNode {
        ConfigNode::new(ConfigurationOptions::defaults())
    }

    #[test]
    fn test_bool_words_and_numbers() {
        let mut n = node();
        for (raw, expected) in [("YES", true), ("t", true), ("No", false), ("0", false)] {
            n.set_value(raw);
            assert_eq!(n.get::<bool>().unwrap(), Some(expected), "{raw}");
        }
        n.set_value(5);
        assert_eq!(n.get::<bool>().unwrap(), Some(true));
        n.set_value(0.0f64);
        assert_eq!(n.get::<bool>().unwrap(), Some(false));
        n.set_value("maybe");
        assert!(n.get::<bool>().is_err());
    }

    #[test]
    fn test_bool_falls_back_when_not_native() {
        let options = ConfigurationOptions::defaults().with_native_types([ScalarKind::Int]);
        let mut n = ConfigNode::new(options);
        n.set(true).unwrap();
        assert_eq!(n.scalar(), Some(&Scalar::Int(1)));

        let options = ConfigurationOptions::defaults().with_native_types([ScalarKind::String]);
        let mut n = ConfigNode::new(options);
        n.set(false).unwrap();
        assert_eq!(n.scalar(), Some(&Scalar::from("false")));
        assert_eq!(n.get::<bool>().unwrap(), Some(false));
    }

    #[test]
    fn test_char() {
        let mut n = node();
        n.set_value("x");
        assert_eq!(n.get::<char>().unwrap(), Some('x'));
        n.set_value(65);
        assert_eq!(n.get::<char>().unwrap(), Some('A'));
        n.set_value("xy");
        assert!(n.get::<char>().is_err());
    }

    #[test]
    fn test_single_element_list_unwraps() {
        let mut n = node();
        n.append_list_node().set_value("only");
        assert_eq!(n.get::<String>().unwrap().as_deref(), Some("only"));

        n.append_list_node().set_value("second");
        let err = n.get::<String>().unwrap_err();
        assert!(err.to_string().contains("Value must be provided as a scalar!"));
    }

    #[test]
    fn test_map_is_not_a_scalar() {
        let mut n = node();
        n.node_mut("a").set_value(1);
        assert!(n.get::<String>().is_err());
    }

    #[test]
    fn test_uuid_url_pattern_path() {
        let mut n = node();
        let id = Uuid::new_v4();
        n.set(id).unwrap();
        assert_eq!(n.scalar(), Some(&Scalar::String(id.to_string())));
        assert_eq!(n.get::<Uuid>().unwrap(), Some(id));

        n.set_value("https://example.com/path?q=1");
        let url = n.get::<Url>().unwrap().unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
        n.set_value("not a url");
        assert!(n.get::<Url>().is_err());

        n.set(Regex::new("^a+b$").unwrap()).unwrap();
        let pattern = n.get::<Regex>().unwrap().unwrap();
        assert!(pattern.is_match("aaab"));

        n.set(PathBuf::from("/etc/app.toml")).unwrap();
        assert_eq!(n.get::<PathBuf>().unwrap(), Some(PathBuf::from("/etc/app.toml")));
    }

    #[test]
    fn test_string_accepts_any_scalar() {
        let mut n = node();
        n.set_value(12);
        assert_eq!(n.get::<String>().unwrap().as_deref(), Some("12"));
        n.set_value(true);
        assert_eq!(n.get::<String>().unwrap().as_deref(), Some("true"));
    }
}
