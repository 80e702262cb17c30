//! Static type descriptors and the accessor tables templates read models
//! through.
//!
//! A model type describes its members once in [`Model::shape`]. Getters are
//! type-erased and hand their value to a continuation, so a property may
//! return an owned value without it escaping the call.

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{RenderError, RenderResult};

/// Identity of a model type: compared by `TypeId`, named for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct ModelTy {
    id: TypeId,
    name: &'static str,
}

impl ModelTy {
    pub fn of<M: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<M>(),
            name: std::any::type_name::<M>(),
        }
    }

    pub const fn id(&self) -> TypeId {
        self.id
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ModelTy {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ModelTy {}

impl std::hash::Hash for ModelTy {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for ModelTy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// The static type of a value an expression can produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Str,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Model(ModelTy),
    Collection(Box<Ty>),
}

impl Ty {
    pub fn of<R: Reflect>() -> Self {
        R::ty()
    }

    /// Element type of a collection type.
    pub fn element(&self) -> Option<&Self> {
        match self {
            Self::Collection(element) => Some(element),
            Self::Str
            | Self::Bool
            | Self::I8
            | Self::I16
            | Self::I32
            | Self::I64
            | Self::U8
            | Self::U16
            | Self::U32
            | Self::U64
            | Self::F32
            | Self::F64
            | Self::Model(_) => None,
        }
    }
}

impl std::fmt::Display for Ty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str => f.write_str("str"),
            Self::Bool => f.write_str("bool"),
            Self::I8 => f.write_str("i8"),
            Self::I16 => f.write_str("i16"),
            Self::I32 => f.write_str("i32"),
            Self::I64 => f.write_str("i64"),
            Self::U8 => f.write_str("u8"),
            Self::U16 => f.write_str("u16"),
            Self::U32 => f.write_str("u32"),
            Self::U64 => f.write_str("u64"),
            Self::F32 => f.write_str("f32"),
            Self::F64 => f.write_str("f64"),
            Self::Model(model) => write!(f, "{}", model),
            Self::Collection(element) => write!(f, "[{}]", element),
        }
    }
}

/// A value read off a model, borrowed for as long as the model is.
#[derive(Clone, Copy)]
pub enum Value<'a> {
    Null,
    Str(&'a str),
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Model(&'a dyn Any),
    Collection(&'a dyn Sequence),
}

impl Value<'_> {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl std::fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Str(value) => f.debug_tuple("Str").field(value).finish(),
            Self::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Self::I8(value) => f.debug_tuple("I8").field(value).finish(),
            Self::I16(value) => f.debug_tuple("I16").field(value).finish(),
            Self::I32(value) => f.debug_tuple("I32").field(value).finish(),
            Self::I64(value) => f.debug_tuple("I64").field(value).finish(),
            Self::U8(value) => f.debug_tuple("U8").field(value).finish(),
            Self::U16(value) => f.debug_tuple("U16").field(value).finish(),
            Self::U32(value) => f.debug_tuple("U32").field(value).finish(),
            Self::U64(value) => f.debug_tuple("U64").field(value).finish(),
            Self::F32(value) => f.debug_tuple("F32").field(value).finish(),
            Self::F64(value) => f.debug_tuple("F64").field(value).finish(),
            Self::Model(_) => f.write_str("Model(..)"),
            Self::Collection(items) => f.debug_tuple("Collection").field(&items.len()).finish(),
        }
    }
}

/// A type that can appear as a member of a model, or be a model itself.
pub trait Reflect: 'static {
    fn ty() -> Ty
    where
        Self: Sized;

    fn reflect(&self) -> Value<'_>;
}

/// A homogeneous collection the compiled code can count and walk.
pub trait Sequence {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visits every item in order, stopping at the first error.
    fn for_each_item(
        &self,
        visit: &mut dyn FnMut(Value<'_>) -> RenderResult<()>,
    ) -> RenderResult<()>;
}

impl<T: Reflect> Sequence for Vec<T> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn for_each_item(
        &self,
        visit: &mut dyn FnMut(Value<'_>) -> RenderResult<()>,
    ) -> RenderResult<()> {
        for item in self {
            visit(item.reflect())?;
        }
        Ok(())
    }
}

/// A type templates can be compiled against.
///
/// Implementations describe their members once through a [`Shape`]:
///
/// ```
/// use stencil::{Model, Shape};
///
/// struct User {
///     name: String,
///     age: u32,
/// }
///
/// impl User {
///     fn greeting(&self) -> String {
///         format!("Hi {}", self.name)
///     }
/// }
///
/// impl Model for User {
///     fn shape() -> Shape {
///         Shape::of::<Self>()
///             .field("name", |user| &user.name)
///             .property("age", |user| user.age)
///             .function("greeting", Self::greeting)
///             .build()
///     }
/// }
/// ```
pub trait Model: Sized + 'static {
    fn shape() -> Shape;
}

impl<M: Model> Reflect for M {
    fn ty() -> Ty {
        Ty::Model(ModelTy::of::<M>())
    }

    fn reflect(&self) -> Value<'_> {
        Value::Model(self)
    }
}

impl Model for () {
    fn shape() -> Shape {
        Shape::of::<Self>().build()
    }
}

impl Reflect for String {
    fn ty() -> Ty {
        Ty::Str
    }

    fn reflect(&self) -> Value<'_> {
        Value::Str(self)
    }
}

impl Reflect for &'static str {
    fn ty() -> Ty {
        Ty::Str
    }

    fn reflect(&self) -> Value<'_> {
        Value::Str(self)
    }
}

impl Reflect for Cow<'static, str> {
    fn ty() -> Ty {
        Ty::Str
    }

    fn reflect(&self) -> Value<'_> {
        Value::Str(self)
    }
}

macro_rules! reflect_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Reflect for $ty {
                fn ty() -> Ty {
                    Ty::$variant
                }

                fn reflect(&self) -> Value<'_> {
                    Value::$variant(*self)
                }
            }
        )*
    };
}

reflect_primitive! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
}

impl<T: Reflect> Reflect for Option<T> {
    fn ty() -> Ty {
        T::ty()
    }

    fn reflect(&self) -> Value<'_> {
        self.as_ref().map_or(Value::Null, Reflect::reflect)
    }
}

impl<T: Reflect> Reflect for Vec<T> {
    fn ty() -> Ty {
        Ty::Collection(Box::new(T::ty()))
    }

    fn reflect(&self) -> Value<'_> {
        Value::Collection(self)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemberKind {
    /// A computed read-only accessor.
    Property,
    /// A stored data member, read by reference.
    Field,
    /// A method taking no arguments.
    Function,
}

impl std::fmt::Display for MemberKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Property => f.write_str("property"),
            Self::Field => f.write_str("field"),
            Self::Function => f.write_str("function"),
        }
    }
}

/// Type-erased member read. The value is handed to the continuation so a
/// getter may return an owned temporary without it escaping the call.
pub(crate) type Getter = Arc<
    dyn Fn(&dyn Any, &mut dyn FnMut(Value<'_>) -> RenderResult<()>) -> RenderResult<()>
        + Send
        + Sync,
>;

fn getter<F>(read: F) -> Getter
where
    F: Fn(&dyn Any, &mut dyn FnMut(Value<'_>) -> RenderResult<()>) -> RenderResult<()>
        + Send
        + Sync
        + 'static,
{
    Arc::new(read)
}

fn downcast<M: Model>(model: &dyn Any) -> RenderResult<&M> {
    model
        .downcast_ref::<M>()
        .ok_or_else(|| RenderError::UnexpectedValue {
            expression: "this".to_string(),
            expected: std::any::type_name::<M>().to_string(),
        })
}

#[derive(Clone)]
pub struct Member {
    name: &'static str,
    kind: MemberKind,
    ty: Ty,
    pub(crate) getter: Getter,
}

impl Member {
    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn kind(&self) -> MemberKind {
        self.kind
    }

    pub const fn ty(&self) -> &Ty {
        &self.ty
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.kind == other.kind && self.ty == other.ty
    }
}

impl std::fmt::Debug for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Member")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}

/// The accessor table of one model type.
#[derive(Debug, Clone)]
pub struct Shape {
    model: ModelTy,
    members: Vec<Member>,
}

impl Shape {
    pub fn of<M: Model>() -> ShapeBuilder<M> {
        ShapeBuilder {
            shape: Self {
                model: ModelTy::of::<M>(),
                members: Vec::new(),
            },
            _model: PhantomData,
        }
    }

    pub const fn model(&self) -> ModelTy {
        self.model
    }

    /// Looks a member up by its exact, case-sensitive name.
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|member| member.name == name)
    }

    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.iter()
    }
}

pub struct ShapeBuilder<M> {
    shape: Shape,
    _model: PhantomData<fn(&M)>,
}

impl<M: Model> ShapeBuilder<M> {
    pub fn property<R, F>(self, name: &'static str, read: F) -> Self
    where
        R: Reflect,
        F: Fn(&M) -> R + Send + Sync + 'static,
    {
        self.owned(name, MemberKind::Property, read)
    }

    pub fn function<R, F>(self, name: &'static str, call: F) -> Self
    where
        R: Reflect,
        F: Fn(&M) -> R + Send + Sync + 'static,
    {
        self.owned(name, MemberKind::Function, call)
    }

    pub fn field<R, F>(mut self, name: &'static str, read: F) -> Self
    where
        R: Reflect,
        F: Fn(&M) -> &R + Send + Sync + 'static,
    {
        let getter = getter(move |model, visit| visit(read(downcast::<M>(model)?).reflect()));
        self.shape.members.push(Member {
            name,
            kind: MemberKind::Field,
            ty: R::ty(),
            getter,
        });
        self
    }

    fn owned<R, F>(mut self, name: &'static str, kind: MemberKind, read: F) -> Self
    where
        R: Reflect,
        F: Fn(&M) -> R + Send + Sync + 'static,
    {
        let getter = getter(move |model, visit| {
            let value = read(downcast::<M>(model)?);
            visit(value.reflect())
        });
        self.shape.members.push(Member {
            name,
            kind,
            ty: R::ty(),
            getter,
        });
        self
    }

    pub fn build(self) -> Shape {
        self.shape
    }
}
