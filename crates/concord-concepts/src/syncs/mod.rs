//! The application's synchronizations, grouped by the routes they serve.

pub mod auth;
pub mod engagement;
pub mod helpers;
pub mod posts;
pub mod room_template;
pub mod user;

use concord_core::{Config, SyncRule};

pub use helpers::{is_template_admin, sanitize_post, sanitize_user, TemplateAdmins};

/// Every synchronization, in registration order.
pub fn all_syncs(config: &Config) -> Vec<SyncRule> {
    let admins = TemplateAdmins::from_config(config);
    let mut rules = auth::rules();
    rules.extend(posts::rules());
    rules.extend(user::rules());
    rules.extend(room_template::rules(&admins));
    rules.extend(engagement::rules());
    rules
}
