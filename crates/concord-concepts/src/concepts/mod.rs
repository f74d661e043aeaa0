pub mod authentication;
pub mod design_post;
pub mod engagement;
pub mod room_template;
pub mod session;
pub mod user_account;

pub use authentication::Authentication;
pub use design_post::{DesignPost, Post};
pub use engagement::{Comment, Engagement};
pub use room_template::{RoomTemplate, Template};
pub use session::Session;
pub use user_account::{Directory, User, UserAccount};
