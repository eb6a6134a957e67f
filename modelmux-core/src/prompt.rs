use modelmux_provider::{Context, Error, Model};

/// Model input to a public operation: a `"provider:model"` spec string
/// or an already-built [`Model`].
#[derive(Debug, Clone)]
pub enum ModelSpec {
    Spec(String),
    Model(Model),
}

impl ModelSpec {
    /// Resolve into a [`Model`], parsing spec strings.
    pub fn into_model(self) -> Result<Model, Error> {
        match self {
            Self::Spec(spec) => Model::parse(&spec),
            Self::Model(model) => Ok(model),
        }
    }
}

impl From<&str> for ModelSpec {
    fn from(spec: &str) -> Self {
        Self::Spec(spec.to_string())
    }
}

impl From<String> for ModelSpec {
    fn from(spec: String) -> Self {
        Self::Spec(spec)
    }
}

impl From<Model> for ModelSpec {
    fn from(model: Model) -> Self {
        Self::Model(model)
    }
}

/// Prompt input: a bare user string or a full [`Context`].
#[derive(Debug, Clone)]
pub enum Prompt {
    Text(String),
    Context(Context),
}

impl Prompt {
    /// Normalize into a [`Context`]; a bare string becomes a single user
    /// message.
    pub fn into_context(self) -> Context {
        match self {
            Self::Text(text) => Context::new().with_user(text),
            Self::Context(context) => context,
        }
    }
}

impl From<&str> for Prompt {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Prompt {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Context> for Prompt {
    fn from(context: Context) -> Self {
        Self::Context(context)
    }
}
