//! Mapping structs, records and polymorphic values through nodes.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use confnode::error::ErrorKind;
use confnode::mapping::RecordArgs;
use confnode::types::AbstractType;
use confnode::{
    ConfigNode, ConfigurationOptions, NodePath, ObjectMapperFactory, ObjectType,
    SerializationError, ShapeBuilder, TypeSerializerCollection, TypeToken, Typed,
};

mod common;
use common::{integer_at, string_at};

#[derive(Debug, Clone, PartialEq)]
struct Server {
    host: String,
    port: u16,
    tags: Vec<String>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 8080,
            tags: Vec::new(),
        }
    }
}

impl Typed for Server {
    fn type_token() -> TypeToken {
        TypeToken::object::<Self>()
    }
}

impl ObjectType for Server {
    fn describe(shape: &mut ShapeBuilder<Self>) {
        shape.default_constructor();
        shape
            .field("host", |s| &s.host, |s, v| s.host = v)
            .comment("Host name to bind")
            .matches("[a-z0-9.-]+");
        shape.field("port", |s| &s.port, |s, v| s.port = v);
        shape.field("tags", |s| &s.tags, |s, v| s.tags = v);
        shape.post_process(|s| {
            if s.port == 0 {
                return Err(SerializationError::constraint("port must not be zero"));
            }
            Ok(())
        });
    }
}

#[derive(Debug, Default)]
struct Account {
    name: String,
    email: String,
}

impl Typed for Account {
    fn type_token() -> TypeToken {
        TypeToken::object::<Self>()
    }
}

impl ObjectType for Account {
    fn describe(shape: &mut ShapeBuilder<Self>) {
        shape.default_constructor();
        shape.field("name", |a| &a.name, |a, v| a.name = v).required();
        shape
            .field("email", |a| &a.email, |a, v| a.email = v)
            .required()
            .matches("[^@]+@[^@]+");
    }
}

#[derive(Debug, PartialEq)]
struct Endpoint {
    url: String,
    retries: u32,
}

impl Typed for Endpoint {
    fn type_token() -> TypeToken {
        TypeToken::object::<Self>()
    }
}

impl ObjectType for Endpoint {
    fn describe(shape: &mut ShapeBuilder<Self>) {
        shape.component("url", |e| &e.url).required();
        shape.component("retries", |e| &e.retries);
        shape.record(|args: &mut RecordArgs| {
            Ok(Endpoint {
                url: args.require("url")?,
                retries: args.take_or("retries", 3)?,
            })
        });
    }
}

trait Shape: Any + Debug + Send + Sync {
    fn area(&self) -> f64;
    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Default)]
struct Circle {
    radius: f64,
}

#[derive(Debug, Default)]
struct Square {
    side: f64,
}

impl Shape for Circle {
    fn area(&self) -> f64 {
        std::f64::consts::PI * self.radius * self.radius
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Shape for Square {
    fn area(&self) -> f64 {
        self.side * self.side
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Typed for Circle {
    fn type_token() -> TypeToken {
        TypeToken::object::<Self>()
    }
}

impl ObjectType for Circle {
    fn describe(shape: &mut ShapeBuilder<Self>) {
        shape.default_constructor();
        shape.field("radius", |c| &c.radius, |c, v| c.radius = v);
    }
}

impl Typed for Square {
    fn type_token() -> TypeToken {
        TypeToken::object::<Self>()
    }
}

impl ObjectType for Square {
    fn describe(shape: &mut ShapeBuilder<Self>) {
        shape.default_constructor();
        shape.field("side", |s| &s.side, |s, v| s.side = v);
    }
}

impl Typed for Box<dyn Shape> {
    fn type_token() -> TypeToken {
        TypeToken::abstract_type::<Self>()
    }
}

impl AbstractType for Box<dyn Shape> {
    fn concrete(&self) -> &dyn Any {
        self.as_any()
    }
}

trait Sound: Any + Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Default)]
struct Beep {
    pitch: u32,
}

impl Sound for Beep {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Typed for Beep {
    fn type_token() -> TypeToken {
        TypeToken::object::<Self>()
    }
}

impl ObjectType for Beep {
    fn describe(shape: &mut ShapeBuilder<Self>) {
        shape.default_constructor();
        shape.field("pitch", |b| &b.pitch, |b, v| b.pitch = v);
    }
}

impl Typed for Box<dyn Sound> {
    fn type_token() -> TypeToken {
        TypeToken::abstract_type::<Self>()
    }
}

impl AbstractType for Box<dyn Sound> {
    fn concrete(&self) -> &dyn Any {
        self.as_any()
    }
}

fn shape_options() -> ConfigurationOptions {
    let factory = ObjectMapperFactory::builder()
        .subtype::<Box<dyn Shape>, Circle, _>("circle", |c: Circle| -> Box<dyn Shape> { Box::new(c) })
        .subtype::<Box<dyn Shape>, Square, _>("square", |s: Square| -> Box<dyn Shape> { Box::new(s) })
        .subtype::<Box<dyn Sound>, Beep, _>("beep", |b: Beep| -> Box<dyn Sound> { Box::new(b) })
        .build();
    ConfigurationOptions::defaults()
        .with_serializers(TypeSerializerCollection::defaults_with(Arc::new(factory)))
}

#[test]
fn test_save_then_load_struct() {
    let mut node = ConfigNode::new(ConfigurationOptions::defaults());
    let server = Server {
        host: "example.org".into(),
        port: 9000,
        tags: vec!["edge".into(), "eu".into()],
    };
    node.set(server.clone()).unwrap();

    assert_eq!(string_at(&node, "host").as_deref(), Some("example.org"));
    assert_eq!(integer_at(&node, "port"), Some(9000));
    assert_eq!(string_at(&node, "tags[1]").as_deref(), Some("eu"));
    assert_eq!(node.get::<Server>().unwrap(), Some(server));
}

#[test]
fn test_save_attaches_field_comments() {
    let mut node = ConfigNode::new(ConfigurationOptions::defaults());
    node.set(Server::default()).unwrap();
    assert_eq!(node.child("host").and_then(ConfigNode::comment), Some("Host name to bind"));
    assert_eq!(node.child("port").and_then(ConfigNode::comment), None);
}

#[test]
fn test_absent_fields_keep_defaults_and_are_written_back() {
    let mut node = ConfigNode::new(ConfigurationOptions::defaults().with_copy_defaults(true));
    node.node_mut("host").set_value("example.org");

    let server = node.require::<Server>().unwrap();
    assert_eq!(server.host, "example.org");
    assert_eq!(server.port, 8080);
    assert_eq!(integer_at(&node, "port"), Some(8080));
    assert!(node.child("tags").is_some_and(ConfigNode::is_list));
}

#[test]
fn test_absent_fields_are_not_written_without_copy_defaults() {
    let mut node = ConfigNode::new(ConfigurationOptions::defaults());
    node.node_mut("host").set_value("example.org");
    node.require::<Server>().unwrap();
    assert_eq!(node.keys(), vec!["host"]);
}

#[test]
fn test_constraint_failures_are_aggregated() {
    let mut node = ConfigNode::new(ConfigurationOptions::defaults());
    node.set_empty_map();

    let err = node.get::<Account>().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Constraint(_)));
    assert_eq!(err.path(), Some(&NodePath::from("name")));
    assert_eq!(err.suppressed().len(), 1);
    assert_eq!(err.suppressed()[0].path(), Some(&NodePath::from("email")));
}

#[test]
fn test_pattern_constraint_rejects_value() {
    let mut node = ConfigNode::new(ConfigurationOptions::defaults());
    node.node_mut("name").set_value("ada");
    node.node_mut("email").set_value("not an address");

    let err = node.get::<Account>().unwrap_err();
    assert!(err.to_string().contains("does not match"), "{err}");
    assert!(err.suppressed().is_empty());

    node.node_mut("email").set_value("ada@example.org");
    let account = node.require::<Account>().unwrap();
    assert_eq!(account.email, "ada@example.org");
}

#[test]
fn test_post_processor_runs_after_load() {
    let mut node = ConfigNode::new(ConfigurationOptions::defaults());
    node.node_mut("port").set_value(0i32);
    let err = node.get::<Server>().unwrap_err();
    assert!(err.to_string().contains("port must not be zero"), "{err}");
}

#[test]
fn test_object_from_scalar_is_an_error() {
    let mut node = ConfigNode::new(ConfigurationOptions::defaults());
    node.set_value("just text");
    let err = node.get::<Server>().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Coercion { .. }));
}

#[test]
fn test_record_uses_component_defaults() {
    let mut node = ConfigNode::new(ConfigurationOptions::defaults());
    node.node_mut("url").set_value("https://example.org");
    let endpoint = node.require::<Endpoint>().unwrap();
    assert_eq!(
        endpoint,
        Endpoint {
            url: "https://example.org".into(),
            retries: 3,
        }
    );

    let mut empty = ConfigNode::new(ConfigurationOptions::defaults());
    empty.set_empty_map();
    assert!(empty.get::<Endpoint>().is_err());
}

#[test]
fn test_load_into_keeps_unmapped_values() {
    let factory = ObjectMapperFactory::default();
    let mapper = factory.get_typed::<Server>().unwrap();
    let mut node = ConfigNode::new(ConfigurationOptions::defaults());
    node.node_mut("host").set_value("example.org");

    let mut server = Server {
        port: 9000,
        ..Server::default()
    };
    mapper.load_into(&mut server, &mut node).unwrap();
    assert_eq!(server.host, "example.org");
    assert_eq!(server.port, 9000);
}

#[test]
fn test_polymorphic_values_round_trip() {
    let mut node = ConfigNode::new(shape_options());
    let shapes: Vec<Box<dyn Shape>> = vec![
        Box::new(Circle { radius: 1.0 }),
        Box::new(Square { side: 2.0 }),
    ];
    node.node_mut("shapes").set(shapes).unwrap();

    assert_eq!(string_at(&node, "shapes[0].__class__").as_deref(), Some("circle"));
    assert_eq!(string_at(&node, "shapes[1].__class__").as_deref(), Some("square"));

    let loaded = node
        .node_mut("shapes")
        .require::<Vec<Box<dyn Shape>>>()
        .unwrap();
    let areas: Vec<f64> = loaded.iter().map(|s| s.area()).collect();
    assert!((areas[0] - std::f64::consts::PI).abs() < 1e-9);
    assert!((areas[1] - 4.0).abs() < 1e-9);
}

#[test]
fn test_polymorphic_discriminator_errors() {
    let mut missing = ConfigNode::new(shape_options());
    missing.node_mut("side").set_value(1.0f64);
    let err = missing.get::<Box<dyn Shape>>().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Polymorphism(_)));
    assert!(err.to_string().contains("No available configured type"), "{err}");

    let mut unknown = ConfigNode::new(shape_options());
    unknown.node_mut("__class__").set_value("hexagon");
    let err = unknown.get::<Box<dyn Shape>>().unwrap_err();
    assert!(err.to_string().contains("Unknown class of object hexagon"), "{err}");
}

#[test]
fn test_discriminator_of_unrelated_subtype_does_not_extend() {
    let mut node = ConfigNode::new(shape_options());
    node.node_mut("__class__").set_value("beep");
    node.node_mut("pitch").set_value(440i64);

    let err = node.get::<Box<dyn Shape>>().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Polymorphism(_)));
    assert!(err.to_string().contains("beep does not extend"), "{err}");

    let sound = node.require::<Box<dyn Sound>>().unwrap();
    let beep = sound.as_any().downcast_ref::<Beep>().unwrap();
    assert_eq!(beep.pitch, 440);
}

#[test]
fn test_clearing_optional_polymorphic_value_keeps_class() {
    let mut node = ConfigNode::new(shape_options());
    node.set(Some(Box::new(Circle { radius: 2.0 }) as Box<dyn Shape>))
        .unwrap();
    assert_eq!(string_at(&node, "__class__").as_deref(), Some("circle"));

    node.set(None::<Box<dyn Shape>>).unwrap();
    assert_eq!(string_at(&node, "__class__").as_deref(), Some("circle"));
    assert!(node.child("radius").is_none());
}
