//! The bot's routers, registered in this order.

pub mod admin;
pub mod groups;
pub mod personal;

use herald::core::UserId;
use herald::framework::Router;

/// Admin commands first, then group housekeeping, then everything personal.
pub fn routers(owners: &[UserId]) -> Vec<Router> {
    vec![
        admin::router(owners),
        groups::router(),
        personal::router(owners),
    ]
}
