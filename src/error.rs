use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GraphError {
    #[error("Unsupported output stride {0}, expected 16 or 32")]
    UnsupportedOutputStride(usize),

    #[error("ASPP context aggregation is not supported")]
    AsppNotSupported,

    #[error("Layer `{0}` is already defined")]
    DuplicateLayer(String),

    #[error("Layer `{layer}` references undefined input `{input}`")]
    UndefinedInput { layer: String, input: String },

    #[error("Backbone produced no {0} tap point")]
    MissingTap(&'static str),

    #[error("Unsupported configuration: {0}")]
    UnsupportedConfig(String),
}

pub type Result<T, E = GraphError> = std::result::Result<T, E>;
