//! Data types exchanged with the board: areas and their posts, private
//! mail, the user's packet preferences and decoded replies.

pub mod area;
pub mod mail;
pub mod reply;
pub mod user;

pub use area::{AreaInfo, OutgoingPost, StoredPost};
pub use mail::{MailItem, OutgoingMail};
pub use reply::{AddressChoice, Destination, ReplyMessage};
pub use user::UserProfile;
