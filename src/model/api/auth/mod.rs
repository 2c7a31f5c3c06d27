mod token;
mod user;

pub use token::{AuthToken, BEARER_PREFIX};
pub use user::Rights;
