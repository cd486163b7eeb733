use thiserror::Error;

/// Error type for failed confrontations.
///
/// Each variant is fatal to the current (confrontation, model) pair but
/// non-fatal to the overall run: callers isolate failures per pair so the
/// remaining pairs still complete.
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("{0}")]
    MisplacedData(String),
    #[error("variable '{0}' has no time axis")]
    NotTemporalVariable(String),
    #[error("time axes still differ in length after clipping: observation has {obs} samples, model has {model}")]
    VarNotOnTimeScale { obs: usize, model: usize },
    #[error("{0}")]
    VarsNotComparable(String),
    #[error("model '{model}' cannot perform the '{confrontation}' confrontation because it does not have either cell areas or land fractions")]
    AreasNotInModel {
        model: String,
        confrontation: String,
    },
    #[error("no known conversion from [{from}] to [{to}]")]
    UnknownUnit { from: String, to: String },
    #[error("'{0}' is not a variable in this dataset")]
    VarNotInFile(String),
    #[error("'{variable}' is not available from model '{model}'")]
    VarNotInModel { variable: String, model: String },
    #[error("{0}")]
    Analysis(String),
}

/// Convenience type for `Result<T, BenchError>`.
pub type BenchResult<T> = Result<T, BenchError>;
