use crate::models::Reward;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Collection, Database};

fn collection(db: &Database) -> Collection<Reward> {
    db.collection("rewards")
}

/// Most recent reward across an identity scope, by (epochNum desc,
/// timestamp desc). The scope's resume cursor is this record's epoch + 1.
pub async fn find_latest(
    db: &Database,
    delegator_ids: &[String],
) -> Result<Option<Reward>, mongodb::error::Error> {
    collection(db)
        .find_one(doc! { "delegatorId": { "$in": delegator_ids.to_vec() } })
        .sort(doc! { "epochNum": -1, "timestamp": -1 })
        .await
}

pub async fn find_latest_for_delegator(
    db: &Database,
    delegator_id: &str,
) -> Result<Option<Reward>, mongodb::error::Error> {
    collection(db)
        .find_one(doc! { "delegatorId": delegator_id })
        .sort(doc! { "epochNum": -1, "timestamp": -1 })
        .await
}

pub async fn find_by_epoch(
    db: &Database,
    delegator_id: &str,
    epoch_num: i64,
) -> Result<Option<Reward>, mongodb::error::Error> {
    collection(db)
        .find_one(doc! { "delegatorId": delegator_id, "epochNum": epoch_num })
        .await
}

/// Rewards for one delegator from `since_ms` onward, timestamp ascending.
pub async fn find_since(
    db: &Database,
    delegator_id: &str,
    since_ms: i64,
) -> Result<Vec<Reward>, mongodb::error::Error> {
    let cursor = collection(db)
        .find(doc! {
            "delegatorId": delegator_id,
            "timestamp": { "$gte": since_ms },
        })
        .sort(doc! { "timestamp": 1 })
        .await?;
    cursor.try_collect().await
}

pub async fn delete_by_timestamp(
    db: &Database,
    delegator_id: &str,
    timestamp: i64,
) -> Result<u64, mongodb::error::Error> {
    let result = collection(db)
        .delete_many(doc! { "delegatorId": delegator_id, "timestamp": timestamp })
        .await?;
    Ok(result.deleted_count)
}

/// Removes every reward the scope wrote for one epoch. Used to roll back a
/// partially committed epoch.
pub async fn delete_epoch(
    db: &Database,
    delegator_ids: &[String],
    epoch_num: i64,
) -> Result<u64, mongodb::error::Error> {
    let result = collection(db)
        .delete_many(doc! {
            "delegatorId": { "$in": delegator_ids.to_vec() },
            "epochNum": epoch_num,
        })
        .await?;
    Ok(result.deleted_count)
}

pub async fn insert(db: &Database, reward: &Reward) -> Result<(), mongodb::error::Error> {
    collection(db).insert_one(reward).await?;
    Ok(())
}
