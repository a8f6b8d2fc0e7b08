use crate::models::StakeTransaction;
use mongodb::bson::doc;
use mongodb::{Collection, Database};

fn collection(db: &Database) -> Collection<StakeTransaction> {
    db.collection("transactions")
}

pub async fn exists_for_delegator(
    db: &Database,
    delegator_id: &str,
) -> Result<bool, mongodb::error::Error> {
    let existing = collection(db)
        .find_one(doc! { "delegatorId": delegator_id })
        .await?;
    Ok(existing.is_some())
}

pub async fn insert(
    db: &Database,
    transaction: &StakeTransaction,
) -> Result<(), mongodb::error::Error> {
    collection(db).insert_one(transaction).await?;
    Ok(())
}
