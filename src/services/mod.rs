pub mod order_service;
pub mod preview_service;
