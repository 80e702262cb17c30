use crate::ast::TemplateRoot;

/// Resolves template names to their syntax trees.
///
/// Composition and compilation only ever read through this trait; caching
/// of parsed or merged trees belongs to the implementor.
pub trait TemplateSource {
    /// Returns the template registered under `name`, if any.
    fn resolve(&self, name: &str) -> Option<TemplateRoot>;
}

impl<F> TemplateSource for F
where
    F: Fn(&str) -> Option<TemplateRoot>,
{
    fn resolve(&self, name: &str) -> Option<TemplateRoot> {
        self(name)
    }
}

/// What composition does with override fills no placeholder consumes.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum UnusedOverrides {
    /// Silently drop them.
    #[default]
    Ignore,
    /// Fail with `StencilError::UnusedOverride`.
    Reject,
}

/// Knobs shared by composition and compilation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Options {
    pub unused_overrides: UnusedOverrides,
    /// Merge adjacent literal writes into one.
    pub coalesce_literals: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            unused_overrides: UnusedOverrides::Ignore,
            coalesce_literals: true,
        }
    }
}

impl Options {
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            unused_overrides: UnusedOverrides::Reject,
            coalesce_literals: true,
        }
    }
}
