use thiserror::Error;

/// Errors surfaced by room and registry operations.
///
/// Capacity failures (`RoomNotFound`, `RoomFull`, `AlreadyStarted`,
/// `DuplicateCode`) travel back on the create/join result payload; turn
/// violations are sent to the offending connection only, as an
/// `error-message`. Neither mutates room state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoomError {
    #[error("room {0} does not exist")]
    RoomNotFound(String),

    #[error("room {0} is full")]
    RoomFull(String),

    #[error("the match in room {0} has already started")]
    AlreadyStarted(String),

    #[error("room code {0} is already taken")]
    DuplicateCode(String),

    #[error("you are not in a room")]
    NotInRoom,

    #[error("it is not your turn")]
    NotYourTurn,

    #[error("the match is not in progress")]
    MatchNotActive,

    #[error("the wheel is already spinning")]
    SpinInProgress,

    #[error("answer the current question before spinning again")]
    QuestionPending,
}

impl RoomError {
    /// Whether this error is a turn violation (wrong player, wrong state)
    /// as opposed to a capacity failure on create/join.
    pub fn is_turn_violation(&self) -> bool {
        matches!(
            self,
            RoomError::NotYourTurn
                | RoomError::MatchNotActive
                | RoomError::SpinInProgress
                | RoomError::QuestionPending
        )
    }
}
