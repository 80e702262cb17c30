//! Stencil compiles statically typed templates into reusable render routines.
//!
//! A template is a tree of [`Statement`]s bound to a model type. Expressions
//! inside it read members the model describes through its [`Model::shape`].
//! Templates may extend one another and fill each other's named overrides;
//! [`compose`] merges such chains into one tree, and the [`Compiler`] lowers
//! that tree into a [`RenderRoutine`] that renders any number of models,
//! from any number of threads.
//!
//! Most applications go through the [`Engine`], which keeps named templates
//! and caches their compiled routines.

mod ast;
mod compiler;
mod compose;
mod engine;
mod error;
mod expr;
mod interface;
mod reflect;
mod routine;
mod scope;

// Public exports.
pub use ast::{Overrides, Statement, TemplateRoot};
pub use compiler::{Compiler, compile};
pub use compose::{Slot, compose, compose_with, open_slots};
pub use engine::Engine;
pub use error::{RenderError, RenderResult, StencilError, StencilResult};
pub use expr::{Access, Expr, Expression, Scope};
pub use interface::{Options, TemplateSource, UnusedOverrides};
pub use reflect::{Member, MemberKind, Model, ModelTy, Reflect, Sequence, Shape, ShapeBuilder, Ty, Value};
pub use routine::RenderRoutine;
