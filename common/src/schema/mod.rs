mod requests;
mod transaction;
mod wallet;

pub use requests::*;
pub use transaction::*;
pub use wallet::*;
