pub mod cart_service;
pub mod checkout_service;
pub mod order_service;
pub mod profile_service;
pub mod shipping;
pub mod user_service;
