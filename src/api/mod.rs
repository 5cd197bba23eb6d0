pub mod account;
pub mod admin;
pub mod auth;
pub mod nowpayments;
pub mod payments;
pub mod products;
pub mod refill;
pub mod tokens;
pub mod webhooks_nowpayments;
