use thiserror::Error;

pub type AutomationResult<T> = Result<T, AutomationError>;

/// Faults raised by state handlers. The main loop logs them and keeps polling.
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("No {what} positions configured")]
    NoPositions { what: &'static str },

    #[error("Obstacle choice {index} is out of range, only {available} positions")]
    ChoiceOutOfRange { index: usize, available: usize },
}
