pub mod attribution;
pub mod cache;
pub mod error;
pub mod history;
pub mod model;
pub mod resolve;
pub mod rpc;
pub mod script;
pub mod types;
pub mod wallet;

#[cfg(test)]
pub(crate) mod test_util;

pub use error::CoreError;
pub use history::{build_history, BuildOptions};
pub use model::{assemble, WalletHistoryModel};
pub use types::ChainParams;
