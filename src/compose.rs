//! Template inheritance: rewrites `Extend` and `Override` nodes into one
//! merged statement tree.
//!
//! Every `Extend` on the way from a template to its oldest ancestor
//! contributes a layer of override fills. Layers are ordered most derived
//! first, and a placeholder takes its content from the first layer that
//! fills it, so a child always wins over the templates it inherits from.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, trace};

use crate::ast::{Overrides, Statement, TemplateRoot};
use crate::error::{StencilError, StencilResult};
use crate::interface::{Options, TemplateSource, UnusedOverrides};

/// A placeholder nothing in the extend chain fills.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slot {
    pub name: String,
    pub required: bool,
    pub has_default: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Mode {
    Merge,
    Survey,
}

struct Layer {
    /// The template that supplied the fills.
    template: String,
    overrides: Arc<Overrides>,
    used: BTreeSet<String>,
}

struct Composer<'s> {
    source: &'s dyn TemplateSource,
    options: Options,
    mode: Mode,
    root_name: String,
    /// Templates whose bodies are being walked, outermost first.
    chain: Vec<String>,
    layers: Vec<Layer>,
    /// Placeholders currently being filled, with the layer that filled them.
    active: Vec<(String, usize)>,
    /// Extends reached from inside a fill, each composed on its own layers.
    isolated: usize,
    slots: Vec<Slot>,
}

impl<'s> Composer<'s> {
    fn new(root: &TemplateRoot, source: &'s dyn TemplateSource, options: Options, mode: Mode) -> Self {
        Self {
            source,
            options,
            mode,
            root_name: root.name().unwrap_or("<root>").to_string(),
            chain: root.name().map(str::to_string).into_iter().collect(),
            layers: Vec::new(),
            active: Vec::new(),
            isolated: 0,
            slots: Vec::new(),
        }
    }

    fn walk(&mut self, statement: &Statement) -> StencilResult<Statement> {
        match statement {
            Statement::WriteLiteral(_) | Statement::WriteExpression(_) | Statement::Include { .. } => {
                Ok(statement.clone())
            }
            Statement::Block(children) => children
                .iter()
                .map(|child| self.walk(child))
                .collect::<StencilResult<Vec<_>>>()
                .map(Statement::Block),
            Statement::Conditional {
                condition,
                then,
                otherwise,
            } => Ok(Statement::Conditional {
                condition: condition.clone(),
                then: Box::new(self.walk(then)?),
                otherwise: self.walk_optional(otherwise.as_deref())?,
            }),
            Statement::Iterate {
                collection,
                body,
                empty,
            } => Ok(Statement::Iterate {
                collection: collection.clone(),
                body: Box::new(self.walk(body)?),
                empty: self.walk_optional(empty.as_deref())?,
            }),
            Statement::Override {
                name,
                default,
                required,
            } => self.fill(name, default.as_deref(), *required),
            Statement::Extend { parent, overrides } => self.extend(parent, overrides),
        }
    }

    fn walk_optional(&mut self, statement: Option<&Statement>) -> StencilResult<Option<Box<Statement>>> {
        statement
            .map(|statement| self.walk(statement).map(Box::new))
            .transpose()
    }

    fn extend(&mut self, parent: &str, overrides: &Arc<Overrides>) -> StencilResult<Statement> {
        if self.chain.iter().any(|name| name == parent) {
            let mut chain = self.chain.clone();
            chain.push(parent.to_string());
            return Err(StencilError::CyclicExtend { chain });
        }

        let root = self
            .source
            .resolve(parent)
            .ok_or_else(|| StencilError::MissingTemplate {
                template_name: parent.to_string(),
            })?;

        debug!(
            "extending '{}' with {} override(s) at depth {}",
            parent,
            overrides.len(),
            self.layers.len()
        );

        let layer = Layer {
            template: self.supplier(),
            overrides: Arc::clone(overrides),
            used: BTreeSet::new(),
        };

        // An extend inside fill content resolves its parent against its own
        // fills, not against the chain the fill came from.
        let outer = (!self.active.is_empty()).then(|| {
            self.isolated = self.isolated.saturating_add(1);
            (std::mem::take(&mut self.layers), std::mem::take(&mut self.active))
        });

        self.chain.push(parent.to_string());
        self.layers.push(layer);
        let merged = self.walk(root.body());
        let layer = self.layers.pop();
        self.chain.pop();
        if let Some((layers, active)) = outer {
            self.layers = layers;
            self.active = active;
            self.isolated = self.isolated.saturating_sub(1);
        }
        let merged = merged?;

        if let (Some(layer), UnusedOverrides::Reject, Mode::Merge) =
            (layer, self.options.unused_overrides, self.mode)
        {
            if let Some(unused) = layer.overrides.keys().find(|name| !layer.used.contains(*name)) {
                return Err(StencilError::UnusedOverride {
                    template_name: layer.template,
                    override_name: unused.clone(),
                });
            }
        }

        Ok(merged)
    }

    /// The template whose statements are being walked: the supplier of the
    /// active fill, else the innermost template of the chain.
    fn supplier(&self) -> String {
        self.active
            .last()
            .and_then(|(_, index)| self.layers.get(*index))
            .map(|layer| layer.template.clone())
            .or_else(|| self.chain.last().cloned())
            .unwrap_or_else(|| self.root_name.clone())
    }

    fn fill(&mut self, name: &str, default: Option<&Statement>, required: bool) -> StencilResult<Statement> {
        // A placeholder inside the content that already fills it refers to
        // the next less-derived fill.
        let start = self
            .active
            .iter()
            .rev()
            .find(|(active, _)| active == name)
            .map_or(0, |(_, layer)| layer.saturating_add(1));

        // Shadowed fills still match a placeholder.
        for layer in &mut self.layers {
            if layer.overrides.contains_key(name) {
                layer.used.insert(name.to_string());
            }
        }

        let found = self
            .layers
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, layer)| layer.overrides.contains_key(name))
            .map(|(index, layer)| (index, Arc::clone(&layer.overrides)));

        if let Some((index, overrides)) = found {
            trace!("filling override '{}' from layer {}", name, index);
            let Some(content) = overrides.get(name) else {
                return Ok(Statement::Block(Vec::new()));
            };
            self.active.push((name.to_string(), index));
            let filled = self.walk(content);
            self.active.pop();
            return filled;
        }

        if self.mode == Mode::Survey && self.isolated == 0 && !self.slots.iter().any(|slot| slot.name == name) {
            self.slots.push(Slot {
                name: name.to_string(),
                required: required && default.is_none(),
                has_default: default.is_some(),
            });
        }

        match default {
            Some(default) => {
                trace!("using default content for override '{}'", name);
                self.walk(default)
            }
            None if !required || self.mode == Mode::Survey => Ok(Statement::Block(Vec::new())),
            None => Err(StencilError::MissingOverride {
                template_name: self.chain.last().unwrap_or(&self.root_name).clone(),
                override_name: name.to_string(),
            }),
        }
    }
}

/// Merges every `Extend` and `Override` reachable from `root` into a new
/// tree. Neither `root` nor any registered template is modified.
///
/// # Errors
/// - If a parent template is not known to `source`.
/// - If the extend chain loops back on itself.
/// - If a required override is filled nowhere in the chain.
pub fn compose(root: &TemplateRoot, source: &dyn TemplateSource) -> StencilResult<TemplateRoot> {
    compose_with(root, source, Options::default())
}

/// [`compose`] with explicit options.
///
/// # Errors
/// As [`compose`], plus unused override fills when
/// `options.unused_overrides` is `Reject`.
pub fn compose_with(
    root: &TemplateRoot,
    source: &dyn TemplateSource,
    options: Options,
) -> StencilResult<TemplateRoot> {
    if !root.body().has_composition_nodes() {
        return Ok(root.clone());
    }

    debug!("composing template {}", root.name().unwrap_or("<root>"));
    let mut composer = Composer::new(root, source, options, Mode::Merge);
    let body = composer.walk(root.body())?;
    Ok(root.with_body(body))
}

/// Lists the placeholders of `root`'s extend chain that nothing fills, in
/// document order. These are what a template extending `root` could supply.
///
/// # Errors
/// - If a parent template is not known to `source`.
/// - If the extend chain loops back on itself.
pub fn open_slots(root: &TemplateRoot, source: &dyn TemplateSource) -> StencilResult<Vec<Slot>> {
    let mut composer = Composer::new(root, source, Options::default(), Mode::Survey);
    composer.walk(root.body())?;
    Ok(composer.slots)
}
