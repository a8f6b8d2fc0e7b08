use crate::models::Delegator;
use futures::TryStreamExt;
use mongodb::bson::{doc, to_bson};
use mongodb::{Collection, Database};

fn collection(db: &Database) -> Collection<Delegator> {
    db.collection("delegators")
}

pub async fn find_by_id(
    db: &Database,
    delegator_id: &str,
) -> Result<Option<Delegator>, mongodb::error::Error> {
    collection(db)
        .find_one(doc! { "delegatorId": delegator_id })
        .await
}

pub async fn find_active(db: &Database) -> Result<Vec<Delegator>, mongodb::error::Error> {
    let cursor = collection(db).find(doc! { "unstaked": false }).await?;
    cursor.try_collect().await
}

pub async fn create(db: &Database, delegator: &Delegator) -> Result<(), mongodb::error::Error> {
    collection(db).insert_one(delegator).await?;
    Ok(())
}

pub async fn update(db: &Database, delegator: &Delegator) -> Result<(), mongodb::error::Error> {
    collection(db)
        .update_one(
            doc! { "delegatorId": &delegator.delegator_id },
            doc! { "$set": to_bson(delegator)? },
        )
        .await?;
    Ok(())
}

/// Bulk-retires every record absent from the live on-chain set. Filtering on
/// `unstaked: false` keeps the update idempotent: a record retired on an
/// earlier tick is never rewritten with a newer epoch.
pub async fn mark_unstaked_absent(
    db: &Database,
    live_delegator_ids: &[String],
    unstaked_epoch: i64,
    unstaked_timestamp: i64,
) -> Result<u64, mongodb::error::Error> {
    let result = collection(db)
        .update_many(
            doc! {
                "delegatorId": { "$nin": live_delegator_ids.to_vec() },
                "unstaked": false,
            },
            doc! {
                "$set": {
                    "unstaked": true,
                    "unstakedEpoch": unstaked_epoch,
                    "unstakedTimestamp": unstaked_timestamp,
                }
            },
        )
        .await?;
    Ok(result.modified_count)
}
