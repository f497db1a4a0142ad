#![forbid(unsafe_code)]

const MAX_ID_LEN: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ApplicationId(String);

impl ApplicationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        validate_id(&value)?;
        Ok(Self(value))
    }
}

impl std::fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OfficerId(String);

impl OfficerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        validate_id(&value)?;
        Ok(Self(value))
    }
}

impl std::fmt::Display for OfficerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdError {
    Empty,
    TooLong,
    InvalidFirstChar,
    InvalidChar { ch: char, index: usize },
}

impl IdError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "id must not be empty",
            Self::TooLong => "id is too long",
            Self::InvalidFirstChar => "id must start with an ascii letter or digit",
            Self::InvalidChar { .. } => {
                "id may only contain ascii letters, digits, '.', '_' or '-'"
            }
        }
    }
}

fn validate_id(value: &str) -> Result<(), IdError> {
    if value.is_empty() {
        return Err(IdError::Empty);
    }
    if value.len() > MAX_ID_LEN {
        return Err(IdError::TooLong);
    }
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return Err(IdError::Empty);
    };
    if !first.is_ascii_alphanumeric() {
        return Err(IdError::InvalidFirstChar);
    }
    for (index, ch) in value.chars().enumerate().skip(1) {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            continue;
        }
        return Err(IdError::InvalidChar { ch, index });
    }
    Ok(())
}
