use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use log::{debug, warn};
use std::fs;
use std::sync::Arc;

use super::connection::CsvConnection;
use crate::domain::models::redemption::{Redemption, RedemptionStatus};
use crate::storage::traits::RedemptionStorage;

const REDEMPTIONS_HEADER: [&str; 6] = [
    "id",
    "kid_id",
    "reward_id",
    "points_spent",
    "redeemed_at",
    "status",
];

/// File-based redemption history: a single append-mostly `redemptions.csv`
/// at the data directory root. Rows are immutable apart from the status
/// column.
#[derive(Clone)]
pub struct RedemptionRepository {
    connection: Arc<CsvConnection>,
}

impl RedemptionRepository {
    pub fn new(connection: Arc<CsvConnection>) -> Self {
        Self { connection }
    }

    fn read_redemptions(&self) -> Result<Vec<Redemption>> {
        let file_path = self.connection.redemptions_file_path();
        if !file_path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&file_path)?;
        let mut csv_reader = ReaderBuilder::new().from_reader(contents.as_bytes());

        let mut redemptions = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            match Self::parse_record(&record) {
                Ok(redemption) => redemptions.push(redemption),
                Err(e) => warn!("Skipping malformed redemption row: {}", e),
            }
        }
        Ok(redemptions)
    }

    fn write_redemptions(&self, redemptions: &[Redemption]) -> Result<()> {
        let mut csv_writer = WriterBuilder::new().from_writer(Vec::new());
        csv_writer.write_record(REDEMPTIONS_HEADER)?;

        for redemption in redemptions {
            let record = [
                redemption.id.clone(),
                redemption.kid_id.clone(),
                redemption.reward_id.clone(),
                redemption.points_spent.to_string(),
                redemption.redeemed_at.to_rfc3339(),
                redemption.status.to_string(),
            ];
            csv_writer.write_record(&record)?;
        }

        let bytes = csv_writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush redemptions csv: {}", e))?;
        self.connection
            .write_atomic(&self.connection.redemptions_file_path(), &bytes)?;
        debug!("Wrote {} redemptions to redemptions.csv", redemptions.len());
        Ok(())
    }

    fn parse_record(record: &csv::StringRecord) -> Result<Redemption> {
        let field = |i: usize| record.get(i).unwrap_or("").to_string();

        Ok(Redemption {
            id: field(0),
            kid_id: field(1),
            reward_id: field(2),
            points_spent: field(3).parse().context("invalid points_spent")?,
            redeemed_at: chrono::DateTime::parse_from_rfc3339(&field(4))
                .context("invalid redeemed_at")?
                .with_timezone(&chrono::Utc),
            status: field(5)
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?,
        })
    }
}

impl RedemptionStorage for RedemptionRepository {
    fn store_redemption(&self, redemption: &Redemption) -> Result<()> {
        let mut redemptions = self.read_redemptions()?;
        redemptions.push(redemption.clone());
        self.write_redemptions(&redemptions)
    }

    fn get_redemption(&self, redemption_id: &str) -> Result<Option<Redemption>> {
        Ok(self
            .read_redemptions()?
            .into_iter()
            .find(|r| r.id == redemption_id))
    }

    fn list_redemptions(&self) -> Result<Vec<Redemption>> {
        let mut redemptions = self.read_redemptions()?;
        redemptions.sort_by(|a, b| b.redeemed_at.cmp(&a.redeemed_at));
        Ok(redemptions)
    }

    fn list_redemptions_for_kid(&self, kid_id: &str) -> Result<Vec<Redemption>> {
        let mut redemptions = self.read_redemptions()?;
        redemptions.retain(|r| r.kid_id == kid_id);
        redemptions.sort_by(|a, b| b.redeemed_at.cmp(&a.redeemed_at));
        Ok(redemptions)
    }

    fn update_redemption_status(
        &self,
        redemption_id: &str,
        status: RedemptionStatus,
    ) -> Result<Option<Redemption>> {
        let mut redemptions = self.read_redemptions()?;
        // Only the status column is mutable; the spend snapshot never changes.
        let updated = match redemptions.iter_mut().find(|r| r.id == redemption_id) {
            Some(redemption) => {
                redemption.status = status;
                Some(redemption.clone())
            }
            None => None,
        };
        if updated.is_some() {
            self.write_redemptions(&redemptions)?;
        }
        Ok(updated)
    }

    fn delete_redemption(&self, redemption_id: &str) -> Result<bool> {
        let mut redemptions = self.read_redemptions()?;
        let before = redemptions.len();
        redemptions.retain(|r| r.id != redemption_id);
        if redemptions.len() < before {
            self.write_redemptions(&redemptions)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn delete_redemptions_for_kid(&self, kid_id: &str) -> Result<u32> {
        let mut redemptions = self.read_redemptions()?;
        let before = redemptions.len();
        redemptions.retain(|r| r.kid_id != kid_id);
        let removed = (before - redemptions.len()) as u32;
        if removed > 0 {
            self.write_redemptions(&redemptions)?;
        }
        Ok(removed)
    }
}
