pub mod contracts;
pub mod dispatcher;
pub mod error;
pub mod jwt;
pub mod notifications;
