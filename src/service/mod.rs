pub mod booking;
pub mod event;
pub mod log;
pub mod qr;
pub mod statistics;
pub mod ticket;
