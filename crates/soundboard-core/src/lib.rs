pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod interrupt;
pub mod queue;
pub mod quick_sounds;
pub mod session;
pub mod sink;
pub mod state;
pub mod status;
pub mod volume;

#[cfg(test)]
mod test_support;
