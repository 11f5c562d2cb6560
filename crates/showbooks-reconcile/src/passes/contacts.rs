//! Pass 1: vendor contacts. Local persistence only.

use tracing::info;

use showbooks_db::models::UpsertContact;

use crate::batch_input::ParsedBatch;
use crate::engine::{ReconciliationEngine, RunContext};
use crate::error::EngineError;
use crate::summary::EntityKind;

impl ReconciliationEngine {
    /// Upsert the batch's contacts by name.
    ///
    /// Contacts are provisioned to the board and the ledger out of band, so
    /// this pass makes no external calls. It keeps the local rows current,
    /// honours externally assigned ids on first sight, and primes the run
    /// cache so later passes resolve vendor references without re-reading.
    pub(crate) async fn reconcile_contacts(
        &self,
        batch: &ParsedBatch,
        ctx: &mut RunContext,
    ) -> Result<(), EngineError> {
        let records = batch.effective_contacts();
        if records.is_empty() {
            return Ok(());
        }
        info!(count = records.len(), "contact pass");

        for record in records {
            let input = UpsertContact {
                name: record.name.clone(),
                status: record.status,
                vendor_type: record.vendor_type.clone(),
                payment_details: record.payment_details.clone(),
                email: record.email.clone(),
                phone: record.phone.clone(),
                address_line_1: record.address_line_1.clone(),
                address_line_2: record.address_line_2.clone(),
                city: record.city.clone(),
                zip: record.zip.clone(),
                region: record.region.clone(),
                country: record.country.clone(),
                tax_type: record.tax_type.clone(),
                tax_number: record.tax_number.clone(),
                board_item_id: record.board_item_id.clone(),
                ledger_contact_id: record.ledger_contact_id.clone(),
            };
            let upserted = match self.store.upsert_contact(input).await {
                Ok(upserted) => upserted,
                Err(err) => {
                    ctx.absorb(EntityKind::Contact, &record.name, err)?;
                    continue;
                }
            };
            ctx.summary.contacts.record(upserted.outcome);
            ctx.contacts.insert(record.name.clone(), upserted.record);
        }
        Ok(())
    }
}
