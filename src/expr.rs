//! Typed member-access expressions, resolved against a model's [`Shape`]
//! when they are built.
//!
//! [`Shape`]: crate::reflect::Shape

use crate::error::{StencilError, StencilResult};
use crate::reflect::{Member, MemberKind, Model, ModelTy, Reflect, Ty};

/// Where evaluation of a top-level expression starts.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// The innermost model context, e.g. the current item of an iteration.
    #[default]
    CurrentModel,
    /// The model the render routine was invoked with.
    RootModel,
}

/// A member resolved against the model type that declares it.
#[derive(Debug, Clone, PartialEq)]
pub struct Access {
    model: ModelTy,
    member: Member,
}

impl Access {
    pub const fn model(&self) -> ModelTy {
        self.model
    }

    pub const fn member(&self) -> &Member {
        &self.member
    }
}

/// A fully type-resolved path expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Property(Access),
    Field(Access),
    Function(Access),
    /// Evaluates `outer` against the current model, then `inner` against its result.
    SubModel { outer: Box<Expr>, inner: Box<Expr> },
    /// The model itself.
    This(Ty),
    /// True iff the collection produced by the inner expression has items.
    HasItems(Box<Expr>),
}

impl Expr {
    pub fn property<M: Model>(name: &str) -> StencilResult<Self> {
        access::<M>(name, Some(MemberKind::Property)).map(Self::Property)
    }

    pub fn field<M: Model>(name: &str) -> StencilResult<Self> {
        access::<M>(name, Some(MemberKind::Field)).map(Self::Field)
    }

    pub fn function<M: Model>(name: &str) -> StencilResult<Self> {
        access::<M>(name, Some(MemberKind::Function)).map(Self::Function)
    }

    /// Resolves `name` to whichever kind of member `M` declares under it.
    pub fn member<M: Model>(name: &str) -> StencilResult<Self> {
        let access = access::<M>(name, None)?;
        Ok(match access.member.kind() {
            MemberKind::Property => Self::Property(access),
            MemberKind::Field => Self::Field(access),
            MemberKind::Function => Self::Function(access),
        })
    }

    pub fn this<R: Reflect>() -> Self {
        Self::This(R::ty())
    }

    pub fn sub_model(outer: Self, inner: Self) -> StencilResult<Self> {
        let produced = outer.result_ty();
        let expected = inner.model_ty();
        if produced != expected {
            return Err(StencilError::SubModelMismatch {
                expected: expected.to_string(),
                found: produced.to_string(),
            });
        }
        Ok(Self::SubModel {
            outer: Box::new(outer),
            inner: Box::new(inner),
        })
    }

    pub fn has_items(collection: Self) -> StencilResult<Self> {
        let ty = collection.result_ty();
        if ty.element().is_none() {
            return Err(StencilError::NotACollection {
                expression: collection.to_string(),
                ty: ty.to_string(),
            });
        }
        Ok(Self::HasItems(Box::new(collection)))
    }

    /// Folds `a, b, c` into `a.(b.c)`, checking every link.
    pub fn chain<I: IntoIterator<Item = Self>>(parts: I) -> StencilResult<Option<Self>> {
        let mut parts: Vec<Self> = parts.into_iter().collect();
        let Some(mut chain) = parts.pop() else {
            return Ok(None);
        };
        while let Some(outer) = parts.pop() {
            chain = Self::sub_model(outer, chain)?;
        }
        Ok(Some(chain))
    }

    /// The type this expression must be evaluated against.
    pub fn model_ty(&self) -> Ty {
        match self {
            Self::Property(access) | Self::Field(access) | Self::Function(access) => {
                Ty::Model(access.model)
            }
            Self::SubModel { outer, .. } => outer.model_ty(),
            Self::This(ty) => ty.clone(),
            Self::HasItems(collection) => collection.model_ty(),
        }
    }

    pub fn result_ty(&self) -> Ty {
        match self {
            Self::Property(access) | Self::Field(access) | Self::Function(access) => {
                access.member.ty().clone()
            }
            Self::SubModel { inner, .. } => inner.result_ty(),
            Self::This(ty) => ty.clone(),
            Self::HasItems(_) => Ty::Bool,
        }
    }
}

fn access<M: Model>(name: &str, kind: Option<MemberKind>) -> StencilResult<Access> {
    let shape = M::shape();
    let member = shape
        .member(name)
        .ok_or_else(|| StencilError::UnknownMember {
            model: shape.model().to_string(),
            member: name.to_string(),
        })?;

    if let Some(expected) = kind {
        if member.kind() != expected {
            return Err(StencilError::MemberKind {
                model: shape.model().to_string(),
                member: name.to_string(),
                expected,
                found: member.kind(),
            });
        }
    }

    Ok(Access {
        model: shape.model(),
        member: member.clone(),
    })
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Property(access) | Self::Field(access) => f.write_str(access.member.name()),
            Self::Function(access) => write!(f, "{}()", access.member.name()),
            Self::SubModel { outer, inner } => write!(f, "{}.{}", outer, inner),
            Self::This(_) => f.write_str("this"),
            Self::HasItems(collection) => write!(f, "has_items({})", collection),
        }
    }
}

/// A top-level expression tagged with the scope it starts from.
///
/// Only the outermost node carries a scope; the nodes of a sub-model chain
/// are always evaluated against the value their predecessor produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    scope: Scope,
    expr: Expr,
}

impl Expression {
    pub const fn new(scope: Scope, expr: Expr) -> Self {
        Self { scope, expr }
    }

    pub const fn current(expr: Expr) -> Self {
        Self::new(Scope::CurrentModel, expr)
    }

    pub const fn root(expr: Expr) -> Self {
        Self::new(Scope::RootModel, expr)
    }

    pub const fn scope(&self) -> Scope {
        self.scope
    }

    pub const fn expr(&self) -> &Expr {
        &self.expr
    }
}

impl From<Expr> for Expression {
    fn from(expr: Expr) -> Self {
        Self::current(expr)
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.scope {
            Scope::CurrentModel => write!(f, "{}", self.expr),
            Scope::RootModel => write!(f, "@root.{}", self.expr),
        }
    }
}
