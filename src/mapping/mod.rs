//! Object mapping.
//!
//! # Responsibilities
//! - Describe structs as an ordered list of fields ([`ObjectType`], [`ShapeBuilder`])
//! - Load and save described structs through the node's serializers ([`ObjectMapper`])
//! - Build mappers with configurable naming, constraints and processors ([`ObjectMapperFactory`])
//!
//! # Design Decisions
//! - Fields are declared with accessor closures instead of runtime reflection
//! - Absent fields keep the constructor's value; with `copy_defaults` the
//!   value is written back to the node after loading
//! - All field errors of one object are reported together, the first as
//!   primary and the rest attached to it

mod cache;
mod discoverer;
mod factory;
mod mapper;
mod meta;
mod naming;
pub mod resolver;
mod shape;

pub use cache::MapperCache;
pub use discoverer::{
    DiscoveredFields, FieldDiscoverer, InstanceFactory, ObjectFieldDiscoverer, RecordDiscoverer,
};
pub use factory::{ObjectMapperFactory, ObjectMapperFactoryBuilder, CLASS_KEY};
pub use mapper::{FieldData, ObjectMapper, TypedMapper};
pub use meta::{
    Comment, CommentProcessor, Constraint, Matches, PatternConstraint, Processor, Required,
    RequiredConstraint, Setting,
};
pub use naming::NamingScheme;
pub use resolver::{NodeResolver, ResolverChoice, ResolverFactory};
pub use shape::{
    describe, Attributes, Constructor, FieldBuilder, FieldShape, ObjectShape, ObjectType,
    PostProcessor, RecordArgs, RecordConstructor, ShapeBuilder,
};
