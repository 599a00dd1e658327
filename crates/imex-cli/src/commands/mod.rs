pub mod assign;
pub mod classify;
pub mod init;
pub mod status;
