pub mod gateway;
pub mod locks;
pub mod logging;
pub mod notifier;
pub mod qr;
pub mod storage;
