//! `qwkpack`: QWK offline mail packets for a bulletin board.
//!
//! Export gathers a user's unread posts and private mail into a `.QWK`
//! packet (`MESSAGES.DAT`, `.NDX` indices, `CONTROL.DAT`, bulletins).
//! Import reads the `.MSG` file of a `.REP` reply packet and routes every
//! reply to an area or the mailbox. Storage, archiving, file transfer and
//! user prompts are collaborators behind the traits in [`session`].

pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod import;
pub mod model;
pub mod session;
pub mod store;
pub mod text;
