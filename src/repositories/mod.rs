pub mod delegator_repository;
pub mod reward_repository;
pub mod transaction_repository;
