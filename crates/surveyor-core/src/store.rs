//! Damage record store
//!
//! The remote `damages` table is the source of truth. Local state is only a
//! reflection of it: every mutation is followed by a re-fetch, so rows
//! inserted elsewhere (the inference service bulk-inserts detector output)
//! show up without any merge logic here.

use std::sync::Arc;

use surveyor_types::{
    AnglePhotos, Damage, DamageDraft, NewDamage, RefineRequest, Scan, ScanAggregates,
    VerificationResult,
};
use tracing::{info, instrument, warn};

use crate::backend::{InferenceBackend, RecordBackend};
use crate::command::{LocalState, Transaction};
use crate::error::StoreError;
use crate::report::Report;

/// Result of adding a manual damage
#[derive(Debug, Clone, PartialEq)]
pub struct AddOutcome {
    /// The stored row, carrying the id assigned by the store
    pub damage: Damage,
    /// Manual dents and scratches need the three-photo refinement next
    pub requires_verification: bool,
    /// False when the scan totals could not be written back
    pub aggregates_synced: bool,
}

/// Result of deleting a damage
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveOutcome {
    pub removed: Damage,
    pub aggregates: ScanAggregates,
    pub aggregates_synced: bool,
}

pub struct DamageStore {
    records: Arc<dyn RecordBackend>,
    inference: Arc<dyn InferenceBackend>,
    state: LocalState,
}

impl DamageStore {
    pub fn new(records: Arc<dyn RecordBackend>, inference: Arc<dyn InferenceBackend>) -> Self {
        Self {
            records,
            inference,
            state: LocalState::default(),
        }
    }

    pub fn scan(&self) -> Option<&Scan> {
        self.state.scan.as_ref()
    }

    pub fn damages(&self) -> &[Damage] {
        &self.state.damages
    }

    pub fn find(&self, damage_id: &str) -> Option<&Damage> {
        self.state.damages.iter().find(|d| d.id == damage_id)
    }

    /// Breakdown of what is currently loaded
    pub fn report(&self) -> Option<Report> {
        self.scan()
            .map(|scan| Report::build(scan, &self.state.damages))
    }

    /// Fetch a scan row and then its damages
    #[instrument(skip(self))]
    pub async fn open(&mut self, scan_id: &str) -> Result<&Scan, StoreError> {
        let scan = self.records.fetch_scan(scan_id).await?;
        if self.state.scan.as_ref().map(|s| s.id.as_str()) != Some(scan_id) {
            self.state.damages.clear();
        }
        self.state.scan = Some(scan);
        self.load(scan_id).await?;

        self.state
            .scan
            .as_ref()
            .ok_or_else(|| StoreError::UnknownDamage(scan_id.to_string()))
    }

    /// Re-fetch the damages of a scan. Nothing cached locally is trusted.
    /// On failure the previous list is kept.
    #[instrument(skip(self))]
    pub async fn load(&mut self, scan_id: &str) -> Result<&[Damage], StoreError> {
        let damages = self.records.fetch_damages(scan_id).await?;
        info!(scan_id, count = damages.len(), "Loaded damages");
        self.state.damages = damages;
        Ok(&self.state.damages)
    }

    /// Insert a hand-marked damage and add its cost to the scan totals
    #[instrument(skip(self, draft), fields(damage_type = %draft.damage_type, part = %draft.part_name))]
    pub async fn add(&mut self, scan_id: &str, draft: DamageDraft) -> Result<AddOutcome, StoreError> {
        draft.validate()?;
        let scan = self.ensure_scan(scan_id).await?.clone();

        let row = NewDamage::manual(scan_id, &draft);
        let created = self.records.insert_damage(&row).await?;
        info!(damage_id = %created.id, "Inserted manual damage");

        let tx = Transaction::begin("add_damage", &self.state);
        self.state.damages.push(created.clone());
        let aggregates = scan.aggregates().after_add(created.effective_cost());
        self.set_aggregates(aggregates);

        let aggregates_synced = match self
            .records
            .update_scan_aggregates(scan_id, aggregates)
            .await
        {
            Ok(()) => {
                tx.commit();
                true
            }
            Err(err) => {
                warn!(error = %err, "Failed to update scan totals after insert");
                tx.compensate_scan(&mut self.state);
                false
            }
        };

        Ok(AddOutcome {
            requires_verification: created.requires_verification()
                || draft.damage_type.requires_verification(),
            damage: created,
            aggregates_synced,
        })
    }

    /// Delete a damage: removed locally first, restored if the remote delete
    /// fails, then the scan totals are reduced (floored at zero)
    #[instrument(skip(self))]
    pub async fn remove(&mut self, scan_id: &str, damage_id: &str) -> Result<RemoveOutcome, StoreError> {
        let scan = self.ensure_scan(scan_id).await?.clone();
        let index = self
            .state
            .damages
            .iter()
            .position(|d| d.id == damage_id)
            .ok_or_else(|| StoreError::UnknownDamage(damage_id.to_string()))?;

        let tx = Transaction::begin("remove_damage", &self.state);
        let removed = self.state.damages.remove(index);

        if let Err(err) = self.records.delete_damage(damage_id).await {
            tx.compensate(&mut self.state);
            return Err(err.into());
        }
        tx.commit();
        info!(damage_id, "Deleted damage");

        let aggregates = scan.aggregates().after_remove(removed.effective_cost());
        self.set_aggregates(aggregates);
        let aggregates_synced = match self
            .records
            .update_scan_aggregates(scan_id, aggregates)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "Failed to update scan totals after delete");
                false
            }
        };

        if let Err(err) = self.load(scan_id).await {
            warn!(error = %err, "Re-sync after delete failed, keeping local list");
        }

        Ok(RemoveOutcome {
            removed,
            aggregates,
            aggregates_synced,
        })
    }

    /// Send three close-ups for a damage to the refinement service. On
    /// success the damages are re-fetched rather than patched in place, and
    /// the scan totals are recomputed from the fresh rows.
    #[instrument(skip(self, photos))]
    pub async fn verify(
        &mut self,
        damage_id: &str,
        photos: AnglePhotos,
    ) -> Result<VerificationResult, StoreError> {
        photos.validate()?;
        let damage = self
            .find(damage_id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownDamage(damage_id.to_string()))?;

        let request = RefineRequest {
            damage_id: damage.id.clone(),
            part_name: damage.part_name.clone(),
            damage_type: damage.damage_type.clone(),
            photos,
        };
        let result = self.inference.refine(&request).await?.into_result()?;
        info!(
            damage_id,
            final_severity = result.final_severity,
            confidence = %result.confidence,
            "Refinement accepted"
        );

        self.load(&damage.scan_id).await?;
        self.reconcile_aggregates(&damage.scan_id).await;
        Ok(result)
    }

    async fn ensure_scan(&mut self, scan_id: &str) -> Result<&Scan, StoreError> {
        let loaded = self.state.scan.as_ref().is_some_and(|s| s.id == scan_id);
        if !loaded {
            self.open(scan_id).await?;
        }
        self.state
            .scan
            .as_ref()
            .ok_or_else(|| StoreError::UnknownDamage(scan_id.to_string()))
    }

    fn set_aggregates(&mut self, aggregates: ScanAggregates) {
        if let Some(scan) = self.state.scan.as_mut() {
            scan.set_aggregates(aggregates);
        }
    }

    /// Rewrite the scan totals from the loaded rows if they disagree
    async fn reconcile_aggregates(&mut self, scan_id: &str) {
        let Some(scan) = self.state.scan.as_ref().filter(|s| s.id == scan_id) else {
            return;
        };
        let computed = ScanAggregates::from_damages(&self.state.damages);
        if scan.aggregates().matches(&computed) {
            return;
        }

        match self.records.update_scan_aggregates(scan_id, computed).await {
            Ok(()) => {
                info!(
                    scan_id,
                    total_cost = computed.total_cost,
                    damage_count = computed.damage_count,
                    "Recomputed scan totals"
                );
                self.set_aggregates(computed);
            }
            Err(err) => warn!(error = %err, "Failed to write recomputed scan totals"),
        }
    }
}
