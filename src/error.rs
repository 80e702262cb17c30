use crate::reflect::MemberKind;

pub type StencilResult<T> = std::result::Result<T, StencilError>;
pub type RenderResult<T> = std::result::Result<T, RenderError>;

/// Failures of a render routine that already compiled.
///
/// Compilation rules out every structural and type mismatch, so the only
/// things left are the output sink refusing a write and a `None` sub-model
/// somewhere along a member chain.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RenderError {
    /// The output sink returned an error.
    Write,
    /// A member chain reached a `None` model before its last step.
    NullModel {
        expression: String,
        member: String,
    },
    /// A value did not have the shape its static type promised. Only a
    /// hand-written `Reflect` impl that lies about its type can cause this.
    UnexpectedValue {
        expression: String,
        expected: String,
    },
    /// An instruction addressed a model context deeper than the one it runs in.
    ScopeUnderflow,
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Write => write!(f, "Output sink rejected a write"),
            Self::NullModel { expression, member } => {
                write!(
                    f,
                    "Cannot read '{}' of a missing model while evaluating '{}'",
                    member, expression
                )
            }
            Self::UnexpectedValue {
                expression,
                expected,
            } => {
                write!(
                    f,
                    "Expression '{}' produced a value that is not {}",
                    expression, expected
                )
            }
            Self::ScopeUnderflow => write!(f, "Model context stack underflow"),
        }
    }
}

impl std::error::Error for RenderError {}

impl From<std::fmt::Error> for RenderError {
    fn from(_: std::fmt::Error) -> Self {
        Self::Write
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StencilError {
    UnknownMember {
        model: String,
        member: String,
    },
    MemberKind {
        model: String,
        member: String,
        expected: MemberKind,
        found: MemberKind,
    },
    SubModelMismatch {
        expected: String,
        found: String,
    },
    NotACollection {
        expression: String,
        ty: String,
    },
    NotABoolean {
        expression: String,
        ty: String,
    },
    UnwritableType {
        expression: String,
        ty: String,
    },
    ModelMismatch {
        expected: String,
        found: String,
    },
    ScopeMismatch {
        expression: String,
        expected: String,
        found: String,
    },
    EmptyScope,
    TemplateExists {
        template_name: String,
    },
    MissingTemplate {
        template_name: String,
    },
    DuplicateOverride {
        override_name: String,
    },
    CyclicExtend {
        chain: Vec<String>,
    },
    RecursiveInclude {
        chain: Vec<String>,
    },
    MissingOverride {
        template_name: String,
        override_name: String,
    },
    UnusedOverride {
        template_name: String,
        override_name: String,
    },
    UnresolvedComposition {
        node: String,
    },
    Render(RenderError),
}

impl std::fmt::Display for StencilError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownMember { model, member } => {
                write!(f, "Type {} has no member named '{}'", model, member)
            }
            Self::MemberKind {
                model,
                member,
                expected,
                found,
            } => {
                write!(
                    f,
                    "Member '{}' of {} is a {}, not a {}",
                    member, model, found, expected
                )
            }
            Self::SubModelMismatch { expected, found } => {
                write!(
                    f,
                    "Sub-model expression expects a {} but the outer expression yields {}",
                    expected, found
                )
            }
            Self::NotACollection { expression, ty } => {
                write!(f, "Expression '{}' of type {} is not a collection", expression, ty)
            }
            Self::NotABoolean { expression, ty } => {
                write!(f, "Condition '{}' has type {}, expected bool", expression, ty)
            }
            Self::UnwritableType { expression, ty } => {
                write!(
                    f,
                    "Unable to write expression '{}' of type {}",
                    expression, ty
                )
            }
            Self::ModelMismatch { expected, found } => {
                write!(f, "Template is bound to {} but was given {}", expected, found)
            }
            Self::ScopeMismatch {
                expression,
                expected,
                found,
            } => {
                write!(
                    f,
                    "Expression '{}' is declared against {} but the model in scope is {}",
                    expression, found, expected
                )
            }
            Self::EmptyScope => write!(f, "No model is in scope"),
            Self::TemplateExists { template_name } => {
                write!(f, "Template already exists: {}", template_name)
            }
            Self::MissingTemplate { template_name } => {
                write!(f, "Template not found: {}", template_name)
            }
            Self::DuplicateOverride { override_name } => {
                write!(f, "Override '{}' is supplied more than once", override_name)
            }
            Self::CyclicExtend { chain } => {
                write!(f, "Cyclic extend chain: {}", chain.join(" -> "))
            }
            Self::RecursiveInclude { chain } => {
                write!(f, "Recursive include chain: {}", chain.join(" -> "))
            }
            Self::MissingOverride {
                template_name,
                override_name,
            } => {
                write!(
                    f,
                    "Required override '{}' of template {} has no content",
                    override_name, template_name
                )
            }
            Self::UnusedOverride {
                template_name,
                override_name,
            } => {
                write!(
                    f,
                    "Override '{}' does not match any placeholder in {}",
                    override_name, template_name
                )
            }
            Self::UnresolvedComposition { node } => {
                write!(f, "Unresolved {} reached code generation", node)
            }
            Self::Render(render_error) => {
                write!(f, "{}", render_error)
            }
        }
    }
}

impl std::error::Error for StencilError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render(render_error) => Some(render_error),
            Self::UnknownMember { .. }
            | Self::MemberKind { .. }
            | Self::SubModelMismatch { .. }
            | Self::NotACollection { .. }
            | Self::NotABoolean { .. }
            | Self::UnwritableType { .. }
            | Self::ModelMismatch { .. }
            | Self::ScopeMismatch { .. }
            | Self::EmptyScope
            | Self::TemplateExists { .. }
            | Self::MissingTemplate { .. }
            | Self::DuplicateOverride { .. }
            | Self::CyclicExtend { .. }
            | Self::RecursiveInclude { .. }
            | Self::MissingOverride { .. }
            | Self::UnusedOverride { .. }
            | Self::UnresolvedComposition { .. } => None,
        }
    }
}

impl From<RenderError> for StencilError {
    fn from(error: RenderError) -> Self {
        Self::Render(error)
    }
}
