use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlassboxError {
    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),
}
