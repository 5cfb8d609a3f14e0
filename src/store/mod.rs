//! Local collaborators: a file-backed board, a command-line archiver and
//! a directory transport.

pub mod archiver;
pub mod format;
pub mod local;
pub mod seed;
pub mod transport;

pub use archiver::CommandArchiver;
pub use local::{load_board, save_board, BoardArea, BoardData, LocalBoard};
pub use seed::{parse_seed, seed_board};
pub use transport::LocalDirectory;
