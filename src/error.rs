use thiserror::Error;

pub type Result<T> = std::result::Result<T, VizError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VizError {
    #[error("unknown {kind} id `{id}`")]
    Reference { kind: &'static str, id: String },

    #[error("neighbour fetch for node `{node}` failed: {message}")]
    Fetch { node: String, message: String },

    #[error("style sheet parse error at offset {offset}: {message}")]
    StyleParse { offset: usize, message: String },

    #[error("formula `{formula}` exceeds the solution limit of {limit}")]
    SolverLimit { formula: String, limit: usize },
}

impl VizError {
    pub(crate) fn unknown_node(id: impl Into<String>) -> Self {
        Self::Reference {
            kind: "node",
            id: id.into(),
        }
    }

    pub(crate) fn unknown_relationship(id: impl Into<String>) -> Self {
        Self::Reference {
            kind: "relationship",
            id: id.into(),
        }
    }

    pub(crate) fn style_parse(offset: usize, message: impl Into<String>) -> Self {
        Self::StyleParse {
            offset,
            message: message.into(),
        }
    }
}
