//! The compiled form of a template and the interpreter that runs it.

use std::fmt::Write as _;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{RenderError, RenderResult};
use crate::reflect::{Getter, Reflect, Ty, Value};
use crate::scope::Load;

/// One model context of a running routine.
pub(crate) struct Frame<'f> {
    model: Value<'f>,
    parent: Option<&'f Frame<'f>>,
}

impl<'f> Frame<'f> {
    pub(crate) const fn root(model: Value<'f>) -> Self {
        Self {
            model,
            parent: None,
        }
    }

    pub(crate) const fn nested(model: Value<'f>, parent: &'f Frame<'f>) -> Self {
        Self {
            model,
            parent: Some(parent),
        }
    }

    fn load(&self, load: Load) -> Option<Value<'f>> {
        let mut frame = self;
        match load {
            Load::Argument => {
                while let Some(parent) = frame.parent {
                    frame = parent;
                }
            }
            Load::Frame { up } => {
                for _ in 0..up {
                    frame = frame.parent?;
                }
            }
        }
        Some(frame.model)
    }
}

#[derive(Clone)]
pub(crate) enum Step {
    Member { name: &'static str, getter: Getter },
    HasItems,
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Member { name, .. } => f.debug_tuple("Member").field(name).finish(),
            Self::HasItems => f.write_str("HasItems"),
        }
    }
}

/// A lowered expression: where to start and which members to walk.
#[derive(Debug, Clone)]
pub(crate) struct Path {
    pub(crate) load: Load,
    pub(crate) steps: Vec<Step>,
    pub(crate) ty: Ty,
    pub(crate) text: Arc<str>,
}

impl Path {
    pub(crate) fn eval(
        &self,
        frame: &Frame<'_>,
        visit: &mut dyn FnMut(Value<'_>) -> RenderResult<()>,
    ) -> RenderResult<()> {
        let start = frame.load(self.load).ok_or(RenderError::ScopeUnderflow)?;
        self.walk(&self.steps, start, visit)
    }

    fn walk(
        &self,
        steps: &[Step],
        value: Value<'_>,
        visit: &mut dyn FnMut(Value<'_>) -> RenderResult<()>,
    ) -> RenderResult<()> {
        let Some((step, rest)) = steps.split_first() else {
            return visit(value);
        };

        match (step, value) {
            (Step::Member { getter, .. }, Value::Model(model)) => {
                getter(model, &mut |next: Value<'_>| self.walk(rest, next, visit))
            }
            (Step::Member { name, .. }, Value::Null) => Err(RenderError::NullModel {
                expression: self.text.to_string(),
                member: (*name).to_string(),
            }),
            (Step::HasItems, Value::Collection(items)) => {
                self.walk(rest, Value::Bool(!items.is_empty()), visit)
            }
            (Step::HasItems, Value::Null) => self.walk(rest, Value::Bool(false), visit),
            (Step::Member { .. }, _) => Err(self.unexpected("a model")),
            (Step::HasItems, _) => Err(self.unexpected("a collection")),
        }
    }

    fn unexpected(&self, expected: &str) -> RenderError {
        RenderError::UnexpectedValue {
            expression: self.text.to_string(),
            expected: expected.to_string(),
        }
    }
}

/// How a value of a writable type reaches the sink.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Writer {
    Str,
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
}

impl Writer {
    pub(crate) const fn for_ty(ty: &Ty) -> Option<Self> {
        match ty {
            Ty::Str => Some(Self::Str),
            Ty::I8 => Some(Self::I8),
            Ty::I16 => Some(Self::I16),
            Ty::I32 => Some(Self::I32),
            Ty::I64 => Some(Self::I64),
            Ty::U8 => Some(Self::U8),
            Ty::U16 => Some(Self::U16),
            Ty::U32 => Some(Self::U32),
            Ty::U64 => Some(Self::U64),
            Ty::F32 => Some(Self::F32),
            Ty::F64 => Some(Self::F64),
            Ty::Bool | Ty::Model(_) | Ty::Collection(_) => None,
        }
    }

    fn write(self, out: &mut dyn std::fmt::Write, value: Value<'_>, path: &Path) -> RenderResult<()> {
        match (self, value) {
            (Self::Str, Value::Str(text)) => out.write_str(text)?,
            (Self::I8, Value::I8(number)) => write!(out, "{}", number)?,
            (Self::I16, Value::I16(number)) => write!(out, "{}", number)?,
            (Self::I32, Value::I32(number)) => write!(out, "{}", number)?,
            (Self::I64, Value::I64(number)) => write!(out, "{}", number)?,
            (Self::U8, Value::U8(number)) => write!(out, "{}", number)?,
            (Self::U16, Value::U16(number)) => write!(out, "{}", number)?,
            (Self::U32, Value::U32(number)) => write!(out, "{}", number)?,
            (Self::U64, Value::U64(number)) => write!(out, "{}", number)?,
            (Self::F32, Value::F32(number)) => write!(out, "{}", number)?,
            (Self::F64, Value::F64(number)) => write!(out, "{}", number)?,
            // A `None` writes nothing.
            (_, Value::Null) => {}
            (writer, _) => return Err(path.unexpected(&format!("{:?}", writer).to_lowercase())),
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Instruction {
    WriteLiteral(Arc<str>),
    Write {
        path: Path,
        writer: Writer,
    },
    Branch {
        test: Path,
        then: Vec<Instruction>,
        otherwise: Vec<Instruction>,
    },
    Iterate {
        collection: Path,
        body: Vec<Instruction>,
        empty: Vec<Instruction>,
    },
    Include {
        model: Path,
        body: Vec<Instruction>,
    },
}

fn run(program: &[Instruction], out: &mut dyn std::fmt::Write, frame: &Frame<'_>) -> RenderResult<()> {
    for instruction in program {
        match instruction {
            Instruction::WriteLiteral(text) => out.write_str(text)?,
            Instruction::Write { path, writer } => {
                path.eval(frame, &mut |value: Value<'_>| writer.write(&mut *out, value, path))?;
            }
            Instruction::Branch {
                test,
                then,
                otherwise,
            } => {
                let mut truth = false;
                test.eval(frame, &mut |value: Value<'_>| {
                    if let Value::Bool(value) = value {
                        truth = value;
                        Ok(())
                    } else if value.is_null() {
                        Ok(())
                    } else {
                        Err(test.unexpected("a bool"))
                    }
                })?;
                run(if truth { then } else { otherwise }, out, frame)?;
            }
            Instruction::Iterate {
                collection,
                body,
                empty,
            } => {
                collection.eval(frame, &mut |value: Value<'_>| {
                    let Value::Collection(items) = value else {
                        return if value.is_null() {
                            run(empty, &mut *out, frame)
                        } else {
                            Err(collection.unexpected("a collection"))
                        };
                    };
                    if items.is_empty() {
                        return run(empty, &mut *out, frame);
                    }
                    items.for_each_item(&mut |item: Value<'_>| {
                        let inner = Frame::nested(item, frame);
                        run(body, &mut *out, &inner)
                    })
                })?;
            }
            Instruction::Include { model, body } => {
                model.eval(frame, &mut |value: Value<'_>| {
                    let root = Frame::root(value);
                    run(body, &mut *out, &root)
                })?;
            }
        }
    }
    Ok(())
}

/// A compiled template, specialised for model type `M`.
///
/// Routines hold no mutable state, so one routine may render on many threads
/// at once as long as each call has its own sink.
pub struct RenderRoutine<M> {
    program: Arc<[Instruction]>,
    _model: PhantomData<fn(&M)>,
}

impl<M> Clone for RenderRoutine<M> {
    fn clone(&self) -> Self {
        Self {
            program: Arc::clone(&self.program),
            _model: PhantomData,
        }
    }
}

impl<M> std::fmt::Debug for RenderRoutine<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderRoutine")
            .field("model", &std::any::type_name::<M>())
            .field("instructions", &self.program.len())
            .finish()
    }
}

impl<M: Reflect> RenderRoutine<M> {
    pub(crate) fn new(program: Vec<Instruction>) -> Self {
        Self {
            program: program.into(),
            _model: PhantomData,
        }
    }

    #[cfg(test)]
    pub(crate) fn program(&self) -> &[Instruction] {
        &self.program
    }

    /// Writes the template, rendered against `model`, to `out`.
    ///
    /// # Errors
    /// - If `out` rejects a write.
    /// - If a member chain runs into a `None` model.
    pub fn render<W: std::fmt::Write + ?Sized>(&self, out: &mut W, model: &M) -> RenderResult<()> {
        let mut out = Adapter(out);
        let frame = Frame::root(model.reflect());
        run(&self.program, &mut out, &frame)
    }

    /// Renders into a freshly allocated `String`.
    ///
    /// # Errors
    /// - If a member chain runs into a `None` model.
    pub fn render_to_string(&self, model: &M) -> RenderResult<String> {
        let mut output = String::new();
        self.render(&mut output, model)?;
        Ok(output)
    }
}

/// Lets unsized sinks stand in for `dyn Write`.
struct Adapter<'w, W: ?Sized>(&'w mut W);

impl<W: std::fmt::Write + ?Sized> std::fmt::Write for Adapter<'_, W> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        self.0.write_str(s)
    }
}
