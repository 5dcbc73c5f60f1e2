//! Field attributes, constraints and processors.
//!
//! # Responsibilities
//! - Define the built-in attributes ([`Setting`], [`Comment`], [`Required`], [`Matches`])
//! - Turn attributes into [`Constraint`]s checked on load and [`Processor`]s run on save
//!
//! # Design Decisions
//! - Attributes are plain values; the factory maps an attribute's type to the
//!   constraint or processor it produces, so applications can add their own

use std::any::Any;
use std::sync::Arc;

use regex::Regex;

use crate::error::{SerializationError, SerializationResult};
use crate::node::ConfigNode;
use crate::types::TypeToken;

/// Overrides how a field's node is located.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Setting {
    pub key: Option<String>,
    pub node_from_parent: bool,
}

impl Setting {
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            node_from_parent: false,
        }
    }

    pub fn from_parent() -> Self {
        Self {
            key: None,
            node_from_parent: true,
        }
    }
}

/// Comment written onto the field's node on save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    pub override_existing: bool,
}

impl Comment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            override_existing: false,
        }
    }

    pub fn overriding(mut self) -> Self {
        self.override_existing = true;
        self
    }
}

/// The field must be present on load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Required;

/// String values must fully match `pattern`.
///
/// `message` may use `{value}` and `{pattern}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matches {
    pub pattern: String,
    pub message: Option<String>,
}

impl Matches {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Validates a loaded field value. `None` means the field was absent.
pub trait Constraint: Send + Sync {
    fn validate(&self, value: Option<&dyn Any>) -> SerializationResult<()>;
}

/// Decorates a field's node after its value has been written.
pub trait Processor: Send + Sync {
    fn process(&self, value: &dyn Any, node: &mut ConfigNode);
}

pub struct RequiredConstraint;

impl Constraint for RequiredConstraint {
    fn validate(&self, value: Option<&dyn Any>) -> SerializationResult<()> {
        match value {
            Some(_) => Ok(()),
            None => Err(SerializationError::constraint(
                "A value is required for this field",
            )),
        }
    }
}

pub struct PatternConstraint {
    regex: Regex,
    pattern: String,
    message: String,
}

impl PatternConstraint {
    fn text_of(value: &dyn Any) -> Option<&str> {
        if let Some(text) = value.downcast_ref::<String>() {
            return Some(text);
        }
        value
            .downcast_ref::<Option<String>>()
            .and_then(|text| text.as_deref())
    }
}

impl Constraint for PatternConstraint {
    fn validate(&self, value: Option<&dyn Any>) -> SerializationResult<()> {
        let Some(text) = value.and_then(Self::text_of) else {
            return Ok(());
        };
        if self.regex.is_match(text) {
            return Ok(());
        }
        Err(SerializationError::constraint(
            self.message
                .replace("{value}", text)
                .replace("{pattern}", &self.pattern),
        ))
    }
}

pub struct CommentProcessor {
    text: String,
    override_existing: bool,
}

impl Processor for CommentProcessor {
    fn process(&self, _value: &dyn Any, node: &mut ConfigNode) {
        if self.override_existing {
            node.set_comment(Some(self.text.clone()));
        } else {
            node.set_comment_if_absent(self.text.clone());
        }
    }
}

pub(crate) fn required_constraint(
    _attribute: &Required,
    _ty: &TypeToken,
) -> SerializationResult<Arc<dyn Constraint>> {
    Ok(Arc::new(RequiredConstraint))
}

pub(crate) fn pattern_constraint(
    attribute: &Matches,
    ty: &TypeToken,
) -> SerializationResult<Arc<dyn Constraint>> {
    if !ty.is::<String>() && !ty.is::<Option<String>>() {
        return Err(SerializationError::message(format!(
            "Pattern constraints only apply to strings, not {}",
            ty.name()
        )));
    }
    let regex = Regex::new(&format!("^(?:{})$", attribute.pattern)).map_err(|e| {
        SerializationError::message(format!("Invalid pattern `{}`: {e}", attribute.pattern))
    })?;
    Ok(Arc::new(PatternConstraint {
        regex,
        pattern: attribute.pattern.clone(),
        message: attribute
            .message
            .clone()
            .unwrap_or_else(|| "{value} is not a valid value (does not match {pattern})".into()),
    }))
}

pub(crate) fn comment_processor(
    attribute: &Comment,
    _ty: &TypeToken,
) -> SerializationResult<Arc<dyn Processor>> {
    Ok(Arc::new(CommentProcessor {
        text: attribute.text.clone(),
        override_existing: attribute.override_existing,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required() {
        let constraint = RequiredConstraint;
        assert!(constraint.validate(Some(&5u8)).is_ok());
        assert!(constraint.validate(None).is_err());
    }

    #[test]
    fn test_pattern_is_anchored() {
        let constraint = pattern_constraint(&Matches::new("[a-z]+"), &TypeToken::of::<String>())
            .unwrap();
        assert!(constraint.validate(Some(&"abc".to_string())).is_ok());
        let err = constraint
            .validate(Some(&"abc1".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("abc1 is not a valid value"));
        assert!(constraint.validate(None).is_ok());
    }

    #[test]
    fn test_pattern_custom_message() {
        let matches = Matches::new("\\d+").with_message("{value} must be digits");
        let constraint = pattern_constraint(&matches, &TypeToken::of::<Option<String>>()).unwrap();
        let err = constraint
            .validate(Some(&Some("x".to_string())))
            .unwrap_err();
        assert!(err.to_string().contains("x must be digits"));
    }

    #[test]
    fn test_pattern_rejects_non_strings() {
        assert!(pattern_constraint(&Matches::new(".*"), &TypeToken::of::<u32>()).is_err());
    }

    #[test]
    fn test_comment_processor_respects_existing() {
        let mut node = ConfigNode::new(crate::node::ConfigurationOptions::defaults());
        node.set_comment(Some("mine".into()));
        comment_processor(&Comment::new("default"), &TypeToken::of::<u8>())
            .unwrap()
            .process(&1u8, &mut node);
        assert_eq!(node.comment(), Some("mine"));

        comment_processor(&Comment::new("forced").overriding(), &TypeToken::of::<u8>())
            .unwrap()
            .process(&1u8, &mut node);
        assert_eq!(node.comment(), Some("forced"));
    }
}
