pub mod connection;
pub mod dispatcher;
pub mod snapshot;

pub use dispatcher::{Dispatcher, Subscription};
