pub mod error;
pub mod logging;
pub mod naming;
pub mod retry;
pub mod rpc;
