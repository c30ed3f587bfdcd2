pub mod fcm;
pub mod health;
pub mod message;
pub mod retry;
