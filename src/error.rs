use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("syntax error on line {line}: {kind}")]
pub struct SyntaxError {
    pub line: usize,
    pub kind: SyntaxErrorKind,
}

impl SyntaxError {
    pub fn new(line: usize, kind: SyntaxErrorKind) -> Self {
        Self { line, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxErrorKind {
    #[error("expected a `flowchart <direction>` header")]
    MissingHeader,
    #[error("unknown direction `{0}`")]
    UnknownDirection(String),
    #[error("`end` without a matching `subgraph`")]
    UnmatchedEnd,
    #[error("`subgraph {0}` is never closed")]
    UnclosedSubgraph(String),
    #[error("unbalanced brackets in `{0}`")]
    UnbalancedBrackets(String),
    #[error("arrow is missing an endpoint in `{0}`")]
    MissingEndpoint(String),
    #[error("invalid node reference `{0}`")]
    InvalidNode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Classify,
    Commit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Classify => write!(f, "classify"),
            Stage::Commit => write!(f, "commit"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("pipeline cancelled before {0}")]
    Cancelled(Stage),
}
