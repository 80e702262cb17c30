//! Lowering of a composed statement tree into a flat instruction list.
//!
//! Every expression is checked against the scope it is evaluated in, and
//! includes are compiled inline against their own model type.

use std::sync::Arc;

use log::{debug, trace};

use crate::ast::{Statement, TemplateRoot};
use crate::compose::compose_with;
use crate::error::{StencilError, StencilResult};
use crate::expr::{Expr, Expression, Scope};
use crate::interface::{Options, TemplateSource};
use crate::reflect::{Reflect, Ty};
use crate::routine::{Instruction, Path, RenderRoutine, Step, Writer};
use crate::scope::ScopeStack;

/// Turns template syntax trees into [`RenderRoutine`]s.
///
/// Each compile composes the tree, then walks it once, consulting a scope
/// stack owned by that compile alone. All structural and type errors
/// surface here; a routine that compiles renders without them.
pub struct Compiler<'s> {
    source: &'s dyn TemplateSource,
    options: Options,
    /// Templates currently being included, outermost first.
    includes: Vec<String>,
}

impl<'s> Compiler<'s> {
    pub fn new(source: &'s dyn TemplateSource) -> Self {
        Self::with_options(source, Options::default())
    }

    pub fn with_options(source: &'s dyn TemplateSource, options: Options) -> Self {
        Self {
            source,
            options,
            includes: Vec::new(),
        }
    }

    /// Compiles `root` into a routine rendering models of type `M`.
    ///
    /// # Errors
    /// - If `root` is bound to a type other than `M`.
    /// - Any composition error of the extend chain.
    /// - If an expression is declared against a type other than the model
    ///   in scope, or yields a type the statement cannot use.
    /// - If an include is unknown, recursive, or gets the wrong model type.
    pub fn compile<M: Reflect>(&mut self, root: &TemplateRoot) -> StencilResult<RenderRoutine<M>> {
        let expected = M::ty();
        if *root.model() != expected {
            return Err(StencilError::ModelMismatch {
                expected: root.model().to_string(),
                found: expected.to_string(),
            });
        }

        debug!(
            "compiling template {} for {}",
            root.name().unwrap_or("<root>"),
            expected
        );

        let mut scopes = ScopeStack::new();
        let program = self.compile_root(root, &mut scopes)?;
        debug!("compiled {} top-level instruction(s)", program.len());
        Ok(RenderRoutine::new(program))
    }

    fn compile_root(&mut self, root: &TemplateRoot, scopes: &mut ScopeStack) -> StencilResult<Vec<Instruction>> {
        let merged = compose_with(root, self.source, self.options)?;
        let mut scopes = scopes.isolate(merged.model().clone());
        let mut program = Vec::new();
        self.emit(merged.body(), &mut program, &mut scopes)?;
        Ok(program)
    }

    fn emit(
        &mut self,
        statement: &Statement,
        program: &mut Vec<Instruction>,
        scopes: &mut ScopeStack,
    ) -> StencilResult<()> {
        match statement {
            Statement::WriteLiteral(text) => self.emit_literal(text, program),
            Statement::WriteExpression(expression) => {
                let path = self.emit_expression(expression, scopes)?;
                let writer = Writer::for_ty(&path.ty).ok_or_else(|| StencilError::UnwritableType {
                    expression: path.text.to_string(),
                    ty: path.ty.to_string(),
                })?;
                program.push(Instruction::Write { path, writer });
            }
            Statement::Block(children) => {
                for child in children {
                    self.emit(child, program, scopes)?;
                }
            }
            Statement::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let test = self.emit_expression(condition, scopes)?;
                if test.ty != Ty::Bool {
                    return Err(StencilError::NotABoolean {
                        expression: test.text.to_string(),
                        ty: test.ty.to_string(),
                    });
                }
                let then = self.emit_nested(then, scopes)?;
                let otherwise = match otherwise {
                    Some(otherwise) => self.emit_nested(otherwise, scopes)?,
                    None => Vec::new(),
                };
                program.push(Instruction::Branch {
                    test,
                    then,
                    otherwise,
                });
            }
            Statement::Iterate {
                collection,
                body,
                empty,
            } => {
                let collection = self.emit_expression(collection, scopes)?;
                let element = collection
                    .ty
                    .element()
                    .cloned()
                    .ok_or_else(|| StencilError::NotACollection {
                        expression: collection.text.to_string(),
                        ty: collection.ty.to_string(),
                    })?;

                let body = {
                    let mut scopes = scopes.enter(element);
                    self.emit_nested(body, &mut scopes)?
                };
                let empty = match empty {
                    Some(empty) => self.emit_nested(empty, scopes)?,
                    None => Vec::new(),
                };
                program.push(Instruction::Iterate {
                    collection,
                    body,
                    empty,
                });
            }
            Statement::Include { template, model } => {
                let model = self.emit_expression(model, scopes)?;
                let body = self.emit_include(template, &model.ty, scopes)?;
                program.push(Instruction::Include { model, body });
            }
            Statement::Override { .. } | Statement::Extend { .. } => {
                return Err(StencilError::UnresolvedComposition {
                    node: statement.describe(),
                });
            }
        }
        Ok(())
    }

    fn emit_nested(&mut self, statement: &Statement, scopes: &mut ScopeStack) -> StencilResult<Vec<Instruction>> {
        let mut program = Vec::new();
        self.emit(statement, &mut program, scopes)?;
        Ok(program)
    }

    fn emit_literal(&self, text: &Arc<str>, program: &mut Vec<Instruction>) {
        if text.is_empty() {
            return;
        }
        if self.options.coalesce_literals {
            if let Some(Instruction::WriteLiteral(previous)) = program.last_mut() {
                *previous = format!("{}{}", previous, text).into();
                return;
            }
        }
        program.push(Instruction::WriteLiteral(Arc::clone(text)));
    }

    fn emit_include(&mut self, template: &str, model: &Ty, scopes: &mut ScopeStack) -> StencilResult<Vec<Instruction>> {
        if self.includes.iter().any(|name| name == template) {
            let mut chain = self.includes.clone();
            chain.push(template.to_string());
            return Err(StencilError::RecursiveInclude { chain });
        }

        let root = self
            .source
            .resolve(template)
            .ok_or_else(|| StencilError::MissingTemplate {
                template_name: template.to_string(),
            })?;
        if root.model() != model {
            return Err(StencilError::ModelMismatch {
                expected: root.model().to_string(),
                found: model.to_string(),
            });
        }

        trace!("inlining include of '{}'", template);
        self.includes.push(template.to_string());
        let body = self.compile_root(&root.named(template), scopes);
        self.includes.pop();
        body
    }

    /// Lowers an expression to a path starting from the scope it names.
    fn emit_expression(&self, expression: &Expression, scopes: &ScopeStack) -> StencilResult<Path> {
        let loaded = match expression.scope() {
            Scope::CurrentModel => scopes.current_model(),
            Scope::RootModel => scopes.root_model(),
        };
        let (load, in_scope) = loaded.ok_or(StencilError::EmptyScope)?;

        let expr = expression.expr();
        let declared = expr.model_ty();
        if declared != *in_scope {
            return Err(StencilError::ScopeMismatch {
                expression: expression.to_string(),
                expected: in_scope.to_string(),
                found: declared.to_string(),
            });
        }

        let mut steps = Vec::new();
        lower(expr, &mut steps);
        Ok(Path {
            load,
            steps,
            ty: expr.result_ty(),
            text: expression.to_string().into(),
        })
    }
}

/// Flattens an expression into member steps, outer before inner.
fn lower(expr: &Expr, steps: &mut Vec<Step>) {
    match expr {
        Expr::Property(access) | Expr::Field(access) | Expr::Function(access) => {
            steps.push(Step::Member {
                name: access.member().name(),
                getter: Arc::clone(&access.member().getter),
            });
        }
        Expr::SubModel { outer, inner } => {
            lower(outer, steps);
            lower(inner, steps);
        }
        Expr::This(_) => {}
        Expr::HasItems(collection) => {
            lower(collection, steps);
            steps.push(Step::HasItems);
        }
    }
}

/// Compiles `root` for model type `M`, resolving named templates through `source`.
///
/// # Errors
/// See [`Compiler::compile`].
pub fn compile<M: Reflect>(root: &TemplateRoot, source: &dyn TemplateSource) -> StencilResult<RenderRoutine<M>> {
    Compiler::new(source).compile(root)
}
