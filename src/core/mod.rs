pub mod clock;
pub mod constants;
pub mod errors;
pub mod ids;
pub mod models;
pub mod money;
pub mod permissions;
pub mod services;
