//! Input checks for the ask and token endpoints.

use thiserror::Error;

pub const MAX_QUESTION_CHARS: usize = 100;
pub const MIN_USERNAME_CHARS: usize = 3;
pub const MAX_USERNAME_CHARS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Question must not be blank")]
    BlankQuestion,
    #[error("Question must not exceed 100 characters")]
    QuestionTooLong,
    #[error("Username cannot be blank")]
    BlankUsername,
    #[error("Username must be between 3 and 15 characters")]
    UsernameLength,
}

pub fn validate_question(question: &str) -> Result<(), ValidationError> {
    if question.trim().is_empty() {
        return Err(ValidationError::BlankQuestion);
    }
    if question.chars().count() > MAX_QUESTION_CHARS {
        return Err(ValidationError::QuestionTooLong);
    }
    Ok(())
}

pub fn validate_token_username(username: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        return Err(ValidationError::BlankUsername);
    }
    Ok(())
}

pub fn validate_ask_username(username: Option<&str>) -> Result<&str, ValidationError> {
    let Some(username) = username else {
        return Err(ValidationError::UsernameLength);
    };
    let length = username.chars().count();
    if username.trim().is_empty() || !(MIN_USERNAME_CHARS..=MAX_USERNAME_CHARS).contains(&length)
    {
        return Err(ValidationError::UsernameLength);
    }
    Ok(username)
}
