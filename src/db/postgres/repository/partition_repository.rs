use crate::db::error::StoreError;
use crate::db::partition::MonthPartition;
use crate::db::postgres::connection::PostgresConnection;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use std::sync::Arc;
use tracing::{debug, error, info};

const BOUND_FORMAT: &str = "%Y-%m-%d %H:%M:%S+00";

#[async_trait]
pub trait TraitPartitionRepository {
    /// Creates the partition if it does not exist yet
    async fn create_partition(&self, partition: &MonthPartition) -> Result<(), StoreError>;

    /// Creates all twelve monthly partitions of a year
    async fn create_partitions_for_year(&self, year: i32) -> Result<(), StoreError>;
}

pub struct StructPartitionRepository {
    connection: Arc<PostgresConnection>,
}

impl StructPartitionRepository {
    pub fn new(connection: Arc<PostgresConnection>) -> Self {
        Self { connection }
    }
}

/// `CREATE TABLE IF NOT EXISTS ... PARTITION OF candles` for one month.
pub fn create_partition_sql(partition: &MonthPartition) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} PARTITION OF candles FOR VALUES FROM ('{}') TO ('{}')",
        partition.name(),
        partition.lower_bound().format(BOUND_FORMAT),
        partition.upper_bound().format(BOUND_FORMAT)
    )
}

pub(crate) async fn create_partition_on(
    pool: &Pool<Postgres>,
    partition: &MonthPartition,
) -> Result<(), StoreError> {
    debug!("Creating partition {}", partition.name());

    let result = sqlx::query(&create_partition_sql(partition))
        .execute(pool)
        .await;

    match result {
        Ok(_) => {
            debug!("Partition {} is in place", partition.name());
            Ok(())
        }
        Err(e) => {
            error!("Error creating partition {}: {}", partition.name(), e);
            Err(StoreError::Database(e))
        }
    }
}

#[async_trait]
impl TraitPartitionRepository for StructPartitionRepository {
    async fn create_partition(&self, partition: &MonthPartition) -> Result<(), StoreError> {
        create_partition_on(self.connection.get_pool(), partition).await
    }

    async fn create_partitions_for_year(&self, year: i32) -> Result<(), StoreError> {
        let pool = self.connection.get_pool();
        for partition in MonthPartition::months_of_year(year) {
            create_partition_on(pool, &partition).await?;
        }
        info!("Partitions for {} are in place", year);
        Ok(())
    }
}
