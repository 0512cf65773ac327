use thiserror::Error;

/// Error type for model evaluation and hull construction problems.
#[derive(Error, Debug)]
pub enum GibbsError {
    #[error("{0}")]
    Error(String),
    #[error("Variable `{0}` has no entry in the index map.")]
    MissingVariable(String),
    #[error("State variable `{0}` is not part of the conditions.")]
    MissingStateVariable(char),
    #[error("No mole-fraction condition given for element `{0}`.")]
    MissingCondition(String),
    #[error("Domain error in `{operation}`: {argument}.")]
    Domain { operation: &'static str, argument: f64 },
    #[error("Symbol table references form a cycle through `{0}`.")]
    CyclicSymbol(String),
    #[error("Convex hull of {npoints} points is degenerate in dimension {dimension}.")]
    DegenerateHull { npoints: usize, dimension: usize },
    #[error("Numeric factorization failed for `{0}`.")]
    Factorization(String),
}

/// Convenience type for `Result<T, GibbsError>`.
pub type GibbsResult<T> = Result<T, GibbsError>;
