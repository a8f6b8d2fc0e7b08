mod delegator;
mod reward;
mod transaction;

pub use delegator::Delegator;
pub use reward::{Reward, UserAction};
pub use transaction::StakeTransaction;
