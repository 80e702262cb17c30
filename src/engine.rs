use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use log::debug;

use crate::ast::TemplateRoot;
use crate::compiler::Compiler;
use crate::compose::{Slot, open_slots};
use crate::error::{StencilError, StencilResult};
use crate::interface::{Options, TemplateSource};
use crate::reflect::Reflect;
use crate::routine::RenderRoutine;

type RoutineCache = HashMap<(String, TypeId), Box<dyn Any + Send + Sync>>;

/// `Engine` keeps a set of named templates and the routines compiled from them.
///
/// Templates are registered once under a unique name and may then extend or
/// include each other by that name. Each template is compiled at most once
/// per model type; later requests reuse the cached routine.
///
/// # Examples
///
/// ```
/// use stencil::{Engine, Expr, Model, Shape, Statement, TemplateRoot};
///
/// struct Greeting {
///     name: String,
/// }
///
/// impl Model for Greeting {
///     fn shape() -> Shape {
///         Shape::of::<Self>().field("name", |greeting| &greeting.name).build()
///     }
/// }
///
/// let mut engine = Engine::new();
/// engine
///     .add_template(
///         "greeting",
///         TemplateRoot::new::<Greeting>([
///             Statement::literal("Hello, "),
///             Statement::write(Expr::field::<Greeting>("name").unwrap()),
///             Statement::literal("!"),
///         ]),
///     )
///     .unwrap();
///
/// let output = engine
///     .render("greeting", &Greeting { name: "World".to_string() })
///     .unwrap();
/// assert_eq!(output, "Hello, World!");
/// ```
pub struct Engine {
    templates: HashMap<String, TemplateRoot>,
    options: Options,
    routines: Mutex<RoutineCache>,
}

impl Engine {
    /// Creates an empty engine with default [`Options`].
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            templates: HashMap::new(),
            options,
            routines: Mutex::new(HashMap::new()),
        }
    }

    pub const fn options(&self) -> Options {
        self.options
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Registers `root` under `name`.
    ///
    /// # Errors
    /// - `StencilError::TemplateExists` if the name is already taken.
    pub fn add_template<N: AsRef<str>>(&mut self, name: N, root: TemplateRoot) -> StencilResult<()> {
        let name = name.as_ref();

        if self.templates.contains_key(name) {
            return Err(StencilError::TemplateExists {
                template_name: name.to_string(),
            });
        }

        debug!("registered template '{}' for {}", name, root.model());
        self.templates.insert(name.to_string(), root.named(name));
        Ok(())
    }

    /// Compiles the template `name` for model type `M`, or returns the
    /// routine compiled by an earlier call.
    ///
    /// # Errors
    /// - `StencilError::MissingTemplate` if no template has that name.
    /// - Any error of [`Compiler::compile`].
    pub fn compile<M: Reflect>(&self, name: &str) -> StencilResult<RenderRoutine<M>> {
        let key = (name.to_string(), TypeId::of::<M>());
        let cached = self
            .cache()
            .get(&key)
            .and_then(|cached| cached.downcast_ref::<RenderRoutine<M>>())
            .cloned();
        if let Some(routine) = cached {
            return Ok(routine);
        }

        let root = self
            .templates
            .get(name)
            .ok_or_else(|| StencilError::MissingTemplate {
                template_name: name.to_string(),
            })?;
        let routine = Compiler::with_options(self, self.options).compile::<M>(root)?;

        // Two threads may race to compile the same template; either result is fine.
        self.cache().insert(key, Box::new(routine.clone()));
        Ok(routine)
    }

    /// Renders the template `name` against `model`.
    ///
    /// # Errors
    /// - Any error of [`Engine::compile`].
    /// - `StencilError::Render` if rendering fails.
    pub fn render<M: Reflect>(&self, name: &str, model: &M) -> StencilResult<String> {
        let routine = self.compile::<M>(name)?;
        Ok(routine.render_to_string(model)?)
    }

    /// Lists the placeholders of `name` that its extend chain leaves unfilled.
    ///
    /// # Errors
    /// - `StencilError::MissingTemplate` if `name` or a parent is unknown.
    /// - `StencilError::CyclicExtend` if the extend chain loops.
    pub fn open_slots(&self, name: &str) -> StencilResult<Vec<Slot>> {
        let root = self
            .templates
            .get(name)
            .ok_or_else(|| StencilError::MissingTemplate {
                template_name: name.to_string(),
            })?;
        open_slots(root, self)
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, RoutineCache> {
        self.routines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Engine")
            .field("templates", &names)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl TemplateSource for Engine {
    fn resolve(&self, name: &str) -> Option<TemplateRoot> {
        self.templates.get(name).cloned()
    }
}
