//! Event fan-out

mod dispatcher;

pub use dispatcher::Dispatcher;
