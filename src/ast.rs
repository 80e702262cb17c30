use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{StencilError, StencilResult};
use crate::expr::Expression;
use crate::reflect::{Reflect, Ty};

/// Override fills of one `Extend`, keyed by placeholder name.
pub type Overrides = BTreeMap<String, Statement>;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// A constant block of text.
    WriteLiteral(Arc<str>),
    /// Writes the value of an expression.
    WriteExpression(Expression),
    /// Children in document order. Does not open a model context.
    Block(Vec<Statement>),
    Conditional {
        condition: Expression,
        then: Box<Statement>,
        otherwise: Option<Box<Statement>>,
    },
    /// Runs `body` once per item with the item as the current model, or
    /// `empty` when there are none.
    Iterate {
        collection: Expression,
        body: Box<Statement>,
        empty: Option<Box<Statement>>,
    },
    /// Renders another template against the value of `model`.
    Include {
        template: String,
        model: Expression,
    },
    /// A named placeholder a descendant template may fill.
    Override {
        name: String,
        default: Option<Box<Statement>>,
        required: bool,
    },
    /// Inherits from `parent`, filling its placeholders.
    Extend {
        parent: String,
        overrides: Arc<Overrides>,
    },
}

impl Statement {
    pub fn literal<T: Into<Arc<str>>>(text: T) -> Self {
        Self::WriteLiteral(text.into())
    }

    pub fn write<E: Into<Expression>>(expression: E) -> Self {
        Self::WriteExpression(expression.into())
    }

    pub fn block<I: IntoIterator<Item = Self>>(children: I) -> Self {
        Self::Block(children.into_iter().collect())
    }

    pub fn conditional<E: Into<Expression>>(
        condition: E,
        then: Self,
        otherwise: Option<Self>,
    ) -> Self {
        Self::Conditional {
            condition: condition.into(),
            then: Box::new(then),
            otherwise: otherwise.map(Box::new),
        }
    }

    pub fn iterate<E: Into<Expression>>(collection: E, body: Self) -> Self {
        Self::Iterate {
            collection: collection.into(),
            body: Box::new(body),
            empty: None,
        }
    }

    pub fn iterate_or_else<E: Into<Expression>>(collection: E, body: Self, empty: Self) -> Self {
        Self::Iterate {
            collection: collection.into(),
            body: Box::new(body),
            empty: Some(Box::new(empty)),
        }
    }

    pub fn include<N: Into<String>, E: Into<Expression>>(template: N, model: E) -> Self {
        Self::Include {
            template: template.into(),
            model: model.into(),
        }
    }

    pub fn required_override<N: Into<String>>(name: N) -> Self {
        Self::Override {
            name: name.into(),
            default: None,
            required: true,
        }
    }

    pub fn optional_override<N: Into<String>>(name: N) -> Self {
        Self::Override {
            name: name.into(),
            default: None,
            required: false,
        }
    }

    pub fn default_override<N: Into<String>>(name: N, default: Self) -> Self {
        Self::Override {
            name: name.into(),
            default: Some(Box::new(default)),
            required: false,
        }
    }

    /// Builds an `Extend` node.
    ///
    /// # Errors
    /// - If the same override name is supplied twice.
    pub fn extend<P, N, I>(parent: P, overrides: I) -> StencilResult<Self>
    where
        P: Into<String>,
        N: Into<String>,
        I: IntoIterator<Item = (N, Self)>,
    {
        let mut map = Overrides::new();
        for (name, content) in overrides {
            let name = name.into();
            if map.contains_key(&name) {
                return Err(StencilError::DuplicateOverride {
                    override_name: name,
                });
            }
            map.insert(name, content);
        }

        Ok(Self::Extend {
            parent: parent.into(),
            overrides: Arc::new(map),
        })
    }

    /// An `Extend` that fills nothing, leaving the parent's defaults in place.
    pub fn inherit<P: Into<String>>(parent: P) -> Self {
        Self::Extend {
            parent: parent.into(),
            overrides: Arc::new(Overrides::new()),
        }
    }

    /// Whether an `Extend` or `Override` node is reachable without crossing
    /// an include.
    pub fn has_composition_nodes(&self) -> bool {
        match self {
            Self::Override { .. } | Self::Extend { .. } => true,
            Self::WriteLiteral(_) | Self::WriteExpression(_) | Self::Include { .. } => false,
            Self::Block(children) => children.iter().any(Self::has_composition_nodes),
            Self::Conditional {
                then, otherwise, ..
            } => {
                then.has_composition_nodes()
                    || otherwise.as_deref().is_some_and(Self::has_composition_nodes)
            }
            Self::Iterate { body, empty, .. } => {
                body.has_composition_nodes()
                    || empty.as_deref().is_some_and(Self::has_composition_nodes)
            }
        }
    }

    /// Short description used in diagnostics.
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::WriteLiteral(_) => "literal".to_string(),
            Self::WriteExpression(expression) => format!("write of '{}'", expression),
            Self::Block(_) => "block".to_string(),
            Self::Conditional { condition, .. } => format!("conditional on '{}'", condition),
            Self::Iterate { collection, .. } => format!("iteration over '{}'", collection),
            Self::Include { template, .. } => format!("include of '{}'", template),
            Self::Override { name, .. } => format!("override '{}'", name),
            Self::Extend { parent, .. } => format!("extend of '{}'", parent),
        }
    }
}

/// The top-level statement tree of one template, bound to a model type.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRoot {
    name: Option<String>,
    model: Ty,
    body: Statement,
}

impl TemplateRoot {
    pub fn new<M: Reflect>(nodes: impl IntoIterator<Item = Statement>) -> Self {
        Self::from_statement::<M>(Statement::block(nodes))
    }

    pub fn from_statement<M: Reflect>(body: Statement) -> Self {
        Self {
            name: None,
            model: M::ty(),
            body,
        }
    }

    #[must_use]
    pub fn named<N: Into<String>>(mut self, name: N) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub const fn model(&self) -> &Ty {
        &self.model
    }

    pub const fn body(&self) -> &Statement {
        &self.body
    }

    pub(crate) fn with_body(&self, body: Statement) -> Self {
        Self {
            name: self.name.clone(),
            model: self.model.clone(),
            body,
        }
    }
}
