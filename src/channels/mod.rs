pub mod errors;
pub mod in_app;
pub mod nats;
