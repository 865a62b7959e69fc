pub mod annotate;
pub mod dto;
pub mod handlers;
pub mod ports;
pub mod services;
