pub mod assist;
pub mod auth;
pub mod discovery;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod posts;
pub mod profiles;
pub mod relationships;
