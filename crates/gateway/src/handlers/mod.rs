//! HTTP request handlers

pub mod bookings;
pub mod discounts;
pub mod health;
pub mod loyalty;
pub mod quotes;
pub mod seats;
