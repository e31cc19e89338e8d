pub mod api;
pub mod channel;
pub mod events;
pub mod models;

pub use channel::ChannelId;
