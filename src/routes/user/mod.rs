mod handler;
mod model;

pub use handler::{get_user, update_me};
pub use model::UpdateProfileRequest;
