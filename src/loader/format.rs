//! Text formats for file-backed loaders.

use crate::error::{ConfigResult, ParsingError, SerializationError};
use crate::node::{ConfigNode, Scalar, ScalarKind};

/// Converts between document text and nodes.
pub trait Format: Send + Sync + 'static {
    /// Short name used in logs.
    const NAME: &'static str;

    /// Scalar kinds the format stores without conversion.
    fn native_types(&self) -> Vec<ScalarKind>;

    /// Replace the contents of `node` with the parsed document.
    fn parse(&self, content: &str, node: &mut ConfigNode) -> Result<(), ParsingError>;

    fn render(&self, node: &ConfigNode) -> ConfigResult<String>;

    /// Line comment prefix, used to write the options header.
    fn comment_prefix(&self) -> Option<&'static str> {
        None
    }
}

/// TOML documents via the `toml` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlFormat;

impl TomlFormat {
    fn read(value: &toml::Value, node: &mut ConfigNode) {
        match value {
            toml::Value::String(v) => node.set_value(v.as_str()),
            toml::Value::Integer(v) => node.set_value(*v),
            toml::Value::Float(v) => node.set_value(*v),
            toml::Value::Boolean(v) => node.set_value(*v),
            toml::Value::Datetime(v) => node.set_value(v.to_string()),
            toml::Value::Array(items) => {
                node.set_empty_list();
                for item in items {
                    Self::read(item, node.append_list_node());
                }
            }
            toml::Value::Table(table) => {
                node.set_empty_map();
                for (key, item) in table {
                    Self::read(item, node.node_mut(key.as_str()));
                }
            }
        }
    }

    fn write(node: &ConfigNode) -> Option<toml::Value> {
        if node.is_virtual() {
            return None;
        }
        if let Some(scalar) = node.scalar() {
            return Some(match scalar {
                Scalar::Bool(v) => toml::Value::Boolean(*v),
                Scalar::Byte(v) => toml::Value::Integer(i64::from(*v)),
                Scalar::Short(v) => toml::Value::Integer(i64::from(*v)),
                Scalar::Int(v) => toml::Value::Integer(i64::from(*v)),
                Scalar::Long(v) => toml::Value::Integer(*v),
                Scalar::Float(v) => toml::Value::Float(f64::from(*v)),
                Scalar::Double(v) => toml::Value::Float(*v),
                Scalar::Char(v) => toml::Value::String(v.to_string()),
                Scalar::String(v) => toml::Value::String(v.clone()),
            });
        }
        if node.is_list() {
            return Some(toml::Value::Array(
                node.children_list().iter().filter_map(Self::write).collect(),
            ));
        }
        let mut table = toml::Table::new();
        for (key, child) in node.children_map() {
            if let Some(value) = Self::write(child) {
                table.insert(key.to_string(), value);
            }
        }
        Some(toml::Value::Table(table))
    }
}

impl Format for TomlFormat {
    const NAME: &'static str = "toml";

    fn native_types(&self) -> Vec<ScalarKind> {
        vec![
            ScalarKind::Bool,
            ScalarKind::Long,
            ScalarKind::Double,
            ScalarKind::String,
        ]
    }

    fn parse(&self, content: &str, node: &mut ConfigNode) -> Result<(), ParsingError> {
        let table: toml::Table = content.parse().map_err(|e: toml::de::Error| match e.span() {
            Some(span) => ParsingError::from_offset(e.message(), content, span.start),
            None => ParsingError::new(e.message()),
        })?;
        Self::read(&toml::Value::Table(table), node);
        Ok(())
    }

    fn render(&self, node: &ConfigNode) -> ConfigResult<String> {
        let table = match Self::write(node) {
            None => toml::Table::new(),
            Some(toml::Value::Table(table)) => table,
            Some(_) => {
                return Err(SerializationError::message(
                    "TOML documents must have a table at the root",
                )
                .with_path(node.path())
                .into())
            }
        };
        toml::to_string_pretty(&table)
            .map_err(|e| SerializationError::message(e.to_string()).into())
    }

    fn comment_prefix(&self) -> Option<&'static str> {
        Some("#")
    }
}

/// JSON documents via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl JsonFormat {
    fn read(value: &serde_json::Value, node: &mut ConfigNode) {
        match value {
            serde_json::Value::Null => node.clear(),
            serde_json::Value::Bool(v) => node.set_value(*v),
            serde_json::Value::Number(number) => {
                if let Some(v) = number.as_i64() {
                    match i32::try_from(v) {
                        Ok(small) => node.set_value(small),
                        Err(_) => node.set_value(v),
                    }
                } else if let Some(v) = number.as_u64() {
                    node.set_value(v.to_string());
                } else if let Some(v) = number.as_f64() {
                    node.set_value(v);
                }
            }
            serde_json::Value::String(v) => node.set_value(v.as_str()),
            serde_json::Value::Array(items) => {
                node.set_empty_list();
                for item in items {
                    Self::read(item, node.append_list_node());
                }
            }
            serde_json::Value::Object(map) => {
                node.set_empty_map();
                for (key, item) in map {
                    Self::read(item, node.node_mut(key.as_str()));
                }
            }
        }
    }
}

impl Format for JsonFormat {
    const NAME: &'static str = "json";

    fn native_types(&self) -> Vec<ScalarKind> {
        vec![
            ScalarKind::Bool,
            ScalarKind::Int,
            ScalarKind::Long,
            ScalarKind::Double,
            ScalarKind::String,
        ]
    }

    fn parse(&self, content: &str, node: &mut ConfigNode) -> Result<(), ParsingError> {
        let value: serde_json::Value = serde_json::from_str(content).map_err(|e| {
            let context = content.lines().nth(e.line().saturating_sub(1)).unwrap_or("");
            ParsingError::new(e.to_string())
                .at(e.line(), e.column())
                .with_context(context)
        })?;
        Self::read(&value, node);
        Ok(())
    }

    fn render(&self, node: &ConfigNode) -> ConfigResult<String> {
        let text = if node.is_virtual() {
            "{}".to_string()
        } else {
            serde_json::to_string_pretty(node)
                .map_err(|e| SerializationError::message(e.to_string()))?
        };
        Ok(text + "\n")
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
    fn test_toml_parse_nested() {
        let mut root = node();
        TomlFormat
            .parse("name = \"x\"\nports = [1, 2]\n[db]\nurl = \"pg\"\n", &mut root)
            .unwrap();
        assert_eq!(root.child("name").and_then(|n| n.scalar()), Some(&Scalar::from("x")));
        assert_eq!(root.child("ports").unwrap().children_list().len(), 2);
        assert_eq!(
            root.child(["db", "url"]).and_then(|n| n.scalar()),
            Some(&Scalar::from("pg"))
        );
    }

    #[test]
    fn test_toml_parse_error_position() {
        let err = TomlFormat
            .parse("a = 1\nb = = 2\n", &mut node())
            .unwrap_err();
        assert_eq!(err.line, Some(2));
        assert_eq!(err.context.as_deref(), Some("b = = 2"));
    }

    #[test]
    fn test_toml_render_orders_tables_last() {
        let mut root = node();
        root.node_mut(["db", "url"]).set_value("pg");
        root.node_mut("name").set_value("x");
        let text = TomlFormat.render(&root).unwrap();
        let name = text.find("name").unwrap();
        let db = text.find("[db]").unwrap();
        assert!(name < db, "{text}");
    }

    #[test]
    fn test_toml_rejects_scalar_root() {
        let mut root = node();
        root.set_value(5i64);
        assert!(TomlFormat.render(&root).is_err());
    }

    #[test]
    fn test_json_numbers_and_errors() {
        let mut root = node();
        JsonFormat
            .parse("{\"small\": 3, \"big\": 5000000000, \"f\": 1.5}", &mut root)
            .unwrap();
        assert_eq!(root.child("small").and_then(|n| n.scalar()), Some(&Scalar::Int(3)));
        assert_eq!(
            root.child("big").and_then(|n| n.scalar()),
            Some(&Scalar::Long(5_000_000_000))
        );
        assert_eq!(root.child("f").and_then(|n| n.scalar()), Some(&Scalar::Double(1.5)));

        let err = JsonFormat.parse("{\n  \"a\": ,\n}", &mut node()).unwrap_err();
        assert_eq!(err.line, Some(2));
    }
}
