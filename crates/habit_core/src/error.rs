use thiserror::Error;

#[derive(Error, Debug)]
pub enum HabitError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("habit {0} not found")]
    NotFound(i64),

    #[error("unable to parse date `{0}`, expected YYYY-MM-DD")]
    Parse(String),

    #[error("store failure: {0}")]
    Store(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, HabitError>;
