pub mod audit;
pub mod merchant;
pub mod payment_request;
pub mod qr_code;
pub mod settlement;
pub mod transaction;
pub mod user;
pub mod wallet;
