//! [`CustomRoutes`], download headers and cookie helpers.

mod attachment;
mod cookies;
mod custom_routes;

pub use crate::handler::utils::attachment::attachment;
pub use crate::handler::utils::cookies::{
    SELECTED_ACCOUNT_COOKIE, cleared, selected_account, with_selected_account, with_session,
};
pub use crate::handler::utils::custom_routes::{CustomRoutes, RouterMapFn};
