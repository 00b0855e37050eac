pub mod pool;

pub use pool::{Dispatcher, DispatcherHealth};
