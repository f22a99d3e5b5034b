pub mod middleware;
pub mod notifications;
pub mod ws;
