use landlord_core::GameError;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("room does not exist")]
    NotFound,
    #[error("player does not exist")]
    PlayerNotFound,
    #[error("room is already playing")]
    Running,
    #[error("room is full")]
    Full,
    #[error("wrong password")]
    WrongPassword,
    #[error("already in this room")]
    AlreadyJoined,
    #[error("only the room owner can do that")]
    NotCreator,
    #[error("not enough players to start")]
    NotReady,
    #[error("password is longer than 10 characters")]
    PasswordTooLong,
    #[error("capacity out of range")]
    InvalidCapacity,
    #[error(transparent)]
    Game(#[from] GameError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum AskError {
    #[error("timed out")]
    Timeout,
    #[error("connection closed")]
    Disconnected,
    #[error("exit requested")]
    Exit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("room no longer exists")]
    RoomGone,
    #[error("turn token closed")]
    Closed,
    #[error("player disconnected during the round")]
    Disconnected,
    #[error(transparent)]
    Game(#[from] GameError),
}
