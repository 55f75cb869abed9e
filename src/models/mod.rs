mod application;
mod favorite;
mod photo;
mod producer;
mod reset_token;
mod statistics;
mod subscription;
mod user;

pub use application::*;
pub use favorite::*;
pub use photo::*;
pub use producer::*;
pub use reset_token::*;
pub use statistics::*;
pub use subscription::*;
pub use user::*;
