use thiserror::Error;

/// Reasons a key specification string is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeySpecError {
    #[error("key specification is empty")]
    Empty,

    #[error("unknown modifier `{0}`")]
    UnknownModifier(String),

    #[error("unknown key `{0}`")]
    UnknownKey(String),

    #[error("missing base key in `{0}`")]
    MissingKey(String),

    #[error("control character {0:?} can not be used as a key name")]
    ControlCharacter(char),
}
