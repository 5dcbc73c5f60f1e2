//! Declarative description of a mapped struct.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{SerializationError, SerializationResult};
use crate::mapping::meta::{Comment, Matches, Required, Setting};
use crate::types::{downcast, DynValue, TypeToken, Typed};

pub(crate) type Getter = Arc<dyn Fn(&dyn Any) -> Option<&dyn Any> + Send + Sync>;
pub(crate) type Setter = Arc<dyn Fn(&mut dyn Any, DynValue) -> SerializationResult<()> + Send + Sync>;
/// Creates a default instance.
pub type Constructor = Arc<dyn Fn() -> DynValue + Send + Sync>;
/// Creates an instance from positional component values.
pub type RecordConstructor = Arc<dyn Fn(&mut RecordArgs) -> SerializationResult<DynValue> + Send + Sync>;
/// Runs after an instance has been populated.
pub type PostProcessor = Arc<dyn Fn(&mut dyn Any) -> SerializationResult<()> + Send + Sync>;

/// Types whose fields can be mapped to and from nodes.
///
/// ```
/// use confnode::mapping::{ObjectType, ShapeBuilder};
/// use confnode::types::{TypeToken, Typed};
///
/// #[derive(Default)]
/// struct Server {
///     host: String,
///     port: u16,
/// }
///
/// impl Typed for Server {
///     fn type_token() -> TypeToken { TypeToken::object::<Self>() }
/// }
///
/// impl ObjectType for Server {
///     fn describe(shape: &mut ShapeBuilder<Self>) {
///         shape.default_constructor();
///         shape.field("host", |s| &s.host, |s, v| s.host = v);
///         shape.field("port", |s| &s.port, |s, v| s.port = v).comment("Listen port");
///     }
/// }
/// ```
pub trait ObjectType: Typed {
    fn describe(shape: &mut ShapeBuilder<Self>);
}

/// Build the type-erased shape of `O`.
pub fn describe<O: ObjectType>() -> ObjectShape {
    let mut builder = ShapeBuilder::<O>::new();
    O::describe(&mut builder);
    builder.finish()
}

/// Attribute values attached to a field.
#[derive(Clone, Default)]
pub struct Attributes(Vec<Arc<dyn Any + Send + Sync>>);

impl Attributes {
    pub fn get<A: Any>(&self) -> Option<&A> {
        self.0.iter().find_map(|attr| attr.downcast_ref::<A>())
    }

    pub fn contains<A: Any>(&self) -> bool {
        self.get::<A>().is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(dyn Any + Send + Sync)> {
        self.0.iter().map(|attr| &**attr)
    }

    pub fn push<A: Any + Send + Sync>(&mut self, attribute: A) {
        self.0.push(Arc::new(attribute));
    }
}

/// One mapped field.
#[derive(Clone)]
pub struct FieldShape {
    pub name: &'static str,
    pub ty: TypeToken,
    pub attributes: Attributes,
    pub(crate) getter: Getter,
    pub(crate) setter: Option<Setter>,
}

impl FieldShape {
    /// Whether the field can be assigned after construction.
    pub fn is_settable(&self) -> bool {
        self.setter.is_some()
    }

    /// Borrow this field's value from an instance of the owning type.
    pub fn value_of<'a>(&self, object: &'a dyn Any) -> Option<&'a dyn Any> {
        (self.getter)(object)
    }
}

/// Type-erased layout of a mapped struct.
#[derive(Clone)]
pub struct ObjectShape {
    pub type_name: &'static str,
    pub fields: Vec<FieldShape>,
    pub constructor: Option<Constructor>,
    pub record: Option<RecordConstructor>,
    pub post_processors: Vec<PostProcessor>,
}

fn getter_fn<F>(f: F) -> F
where
    F: for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any>,
{
    f
}

/// Collects the fields and construction strategy of `V`.
pub struct ShapeBuilder<V> {
    fields: Vec<FieldShape>,
    constructor: Option<Constructor>,
    record: Option<RecordConstructor>,
    post_processors: Vec<PostProcessor>,
    _marker: PhantomData<fn() -> V>,
}

impl<V: Typed> ShapeBuilder<V> {
    fn new() -> Self {
        Self {
            fields: Vec::new(),
            constructor: None,
            record: None,
            post_processors: Vec::new(),
            _marker: PhantomData,
        }
    }

    fn finish(self) -> ObjectShape {
        ObjectShape {
            type_name: std::any::type_name::<V>(),
            fields: self.fields,
            constructor: self.constructor,
            record: self.record,
            post_processors: self.post_processors,
        }
    }

    fn push_field<F: Typed, G>(&mut self, name: &'static str, get: G, setter: Option<Setter>) -> FieldBuilder<'_>
    where
        G: Fn(&V) -> &F + Send + Sync + 'static,
    {
        let getter = getter_fn(move |object: &dyn Any| {
            object.downcast_ref::<V>().map(|v| get(v) as &dyn Any)
        });
        self.fields.push(FieldShape {
            name,
            ty: F::type_token(),
            attributes: Attributes::default(),
            getter: Arc::new(getter),
            setter,
        });
        let index = self.fields.len() - 1;
        FieldBuilder {
            field: &mut self.fields[index],
        }
    }

    /// A field read by `get` and assigned by `set`.
    pub fn field<F: Typed, G, S>(&mut self, name: &'static str, get: G, set: S) -> FieldBuilder<'_>
    where
        G: Fn(&V) -> &F + Send + Sync + 'static,
        S: Fn(&mut V, F) + Send + Sync + 'static,
    {
        let setter: Setter = Arc::new(move |object: &mut dyn Any, value: DynValue| {
            let object = object.downcast_mut::<V>().ok_or_else(|| {
                SerializationError::message(format!(
                    "Expected an instance of {}",
                    std::any::type_name::<V>()
                ))
            })?;
            set(object, downcast::<F>(value)?);
            Ok(())
        });
        self.push_field(name, get, Some(setter))
    }

    /// A read-only component, passed to the [`record`](Self::record) constructor.
    pub fn component<F: Typed, G>(&mut self, name: &'static str, get: G) -> FieldBuilder<'_>
    where
        G: Fn(&V) -> &F + Send + Sync + 'static,
    {
        self.push_field(name, get, None)
    }

    /// How to create a default instance before fields are assigned.
    pub fn constructor<C>(&mut self, create: C) -> &mut Self
    where
        C: Fn() -> V + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(move || Box::new(create()) as DynValue));
        self
    }

    /// Use `V::default()` as the constructor.
    pub fn default_constructor(&mut self) -> &mut Self
    where
        V: Default,
    {
        self.constructor(V::default)
    }

    /// Build instances from component values in one step.
    pub fn record<R>(&mut self, build: R) -> &mut Self
    where
        R: Fn(&mut RecordArgs) -> SerializationResult<V> + Send + Sync + 'static,
    {
        self.record = Some(Arc::new(move |args: &mut RecordArgs| {
            build(args).map(|value| Box::new(value) as DynValue)
        }));
        self
    }

    /// Run `check` on every loaded instance. Failures from all
    /// post-processors are reported together.
    pub fn post_process<P>(&mut self, check: P) -> &mut Self
    where
        P: Fn(&mut V) -> SerializationResult<()> + Send + Sync + 'static,
    {
        self.post_processors.push(Arc::new(move |object: &mut dyn Any| {
            match object.downcast_mut::<V>() {
                Some(value) => check(value),
                None => Err(SerializationError::message(format!(
                    "Expected an instance of {}",
                    std::any::type_name::<V>()
                ))),
            }
        }));
        self
    }
}

/// Attaches attributes to the field just declared.
pub struct FieldBuilder<'a> {
    field: &'a mut FieldShape,
}

impl FieldBuilder<'_> {
    /// Attach an arbitrary attribute value.
    pub fn with<A: Any + Send + Sync>(self, attribute: A) -> Self {
        self.field.attributes.push(attribute);
        self
    }

    /// Read and write this field at `key` instead of the derived name.
    pub fn setting(self, key: &str) -> Self {
        self.with(Setting::key(key))
    }

    /// Map this field onto the parent node itself.
    pub fn from_parent(self) -> Self {
        self.with(Setting::from_parent())
    }

    /// Attach a comment to the field's node on save, unless one exists.
    pub fn comment(self, text: &str) -> Self {
        self.with(Comment::new(text))
    }

    /// Reject loads where the field is absent.
    pub fn required(self) -> Self {
        self.with(Required)
    }

    /// Require string values to fully match `pattern`.
    pub fn matches(self, pattern: &str) -> Self {
        self.with(Matches::new(pattern))
    }
}

/// Component values handed to a record constructor.
pub struct RecordArgs {
    slots: Vec<(&'static str, Option<DynValue>)>,
}

impl RecordArgs {
    pub(crate) fn new(slots: Vec<(&'static str, Option<DynValue>)>) -> Self {
        Self { slots }
    }

    /// Take the value loaded for `name`, if any.
    pub fn take<T: Typed>(&mut self, name: &str) -> SerializationResult<Option<T>> {
        let slot = self
            .slots
            .iter_mut()
            .find(|(slot, _)| *slot == name)
            .ok_or_else(|| SerializationError::message(format!("Unknown component {name}")))?;
        slot.1.take().map(downcast::<T>).transpose()
    }

    pub fn take_or<T: Typed>(&mut self, name: &str, default: T) -> SerializationResult<T> {
        Ok(self.take(name)?.unwrap_or(default))
    }

    pub fn take_or_default<T: Typed + Default>(&mut self, name: &str) -> SerializationResult<T> {
        Ok(self.take(name)?.unwrap_or_default())
    }

    /// Take the value loaded for `name`, failing when absent.
    pub fn require<T: Typed>(&mut self, name: &str) -> SerializationResult<T> {
        self.take(name)?.ok_or_else(|| {
            SerializationError::constraint(format!("A value is required for component {name}"))
        })
    }
}
