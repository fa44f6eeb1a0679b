// ============================================================================
// Shipment Dispatch and Tracking
// ============================================================================
//
// Registers approved sales with the carrier aggregator, fetches labels and
// pulls tracking state. Dispatch is an explicit operator action with strict
// preconditions; label and tracking reads degrade softly because the carrier
// owns that data and we only mirror it.
//
// ============================================================================

use std::sync::Arc;

use uuid::Uuid;

use crate::clients::{CarrierApi, ShipmentRequest};
use crate::domain::sale::aggregate::Sale;
use crate::domain::sale::errors::SaleError;
use crate::domain::sale::value_objects::{DeliveryType, SaleStatus, ShipmentStatus};
use crate::store::{SaleStore, ShipmentAttachment};

pub struct ShipmentService {
    store: Arc<dyn SaleStore>,
    carrier: Arc<dyn CarrierApi>,
}

impl ShipmentService {
    pub fn new(store: Arc<dyn SaleStore>, carrier: Arc<dyn CarrierApi>) -> Self {
        Self { store, carrier }
    }

    /// Register the sale's parcel with the carrier and pin the returned
    /// shipment onto the sale.
    pub async fn dispatch(&self, sale_id: Uuid) -> Result<Sale, SaleError> {
        let sale = self.store.sale(sale_id).await?;

        if sale.delivery_type != DeliveryType::Ship {
            return Err(SaleError::WrongDeliveryType(sale.delivery_type));
        }
        if sale.shipment_status != ShipmentStatus::NotRequested {
            return Err(SaleError::ShipmentAlreadyRequested);
        }
        if sale.status != SaleStatus::Approved {
            return Err(SaleError::NotReadyToShip(sale.status));
        }
        if let Some(field) = sale.address.first_missing_field() {
            return Err(SaleError::IncompleteAddress(field));
        }

        let dispatched = self
            .carrier
            .create_shipment(&ShipmentRequest {
                reference: sale.id,
                recipient_name: sale
                    .customer_name
                    .clone()
                    .unwrap_or_else(|| sale.customer_email.clone()),
                recipient_email: sale.customer_email.clone(),
                address: sale.address.clone(),
                total_weight_grams: self.parcel_weight(&sale).await?,
                declared_value: sale.lines_total(),
            })
            .await?;

        let attachment = ShipmentAttachment {
            external_id: dispatched.external_id,
            carrier: dispatched.carrier,
            tracking_code: dispatched.tracking_code,
        };
        match self.store.attach_shipment(sale_id, &attachment).await {
            Ok(sale) => {
                tracing::info!(
                    sale_id = %sale_id,
                    external_shipment_id = %attachment.external_id,
                    carrier = %attachment.carrier,
                    "shipment dispatched"
                );
                Ok(sale)
            }
            Err(err) => {
                // The carrier now holds a shipment nothing references. Undo
                // it so it is not billed, but the original error is what the
                // caller sees.
                let carrier = self.carrier.clone();
                let external_id = attachment.external_id.clone();
                tokio::spawn(async move {
                    if let Err(cancel_err) = carrier.cancel_shipment(&external_id).await {
                        tracing::warn!(
                            external_shipment_id = %external_id,
                            error = %cancel_err,
                            "failed to void orphaned carrier shipment"
                        );
                    }
                });
                Err(err)
            }
        }
    }

    /// Shipping label for a dispatched sale. The first successful fetch is
    /// cached on the sale; `None` means the carrier has not produced the
    /// label yet, which is not an error.
    pub async fn label(&self, sale_id: Uuid) -> Result<Option<String>, SaleError> {
        let sale = self.store.sale(sale_id).await?;
        let Some(external_id) = sale.external_shipment_id.as_deref() else {
            return Err(SaleError::ShipmentNotRequested);
        };
        if let Some(url) = sale.label_url {
            return Ok(Some(url));
        }

        let fetched = match self.carrier.label_url(external_id).await {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(
                    sale_id = %sale_id,
                    external_shipment_id = %external_id,
                    error = %err,
                    "label fetch failed, reporting not ready"
                );
                return Ok(None);
            }
        };
        let Some(url) = fetched else {
            return Ok(None);
        };

        self.store.cache_label_url(sale_id, &url).await?;
        if sale.shipment_status == ShipmentStatus::Requested {
            if let Err(err) = self
                .store
                .update_shipment_status(sale_id, ShipmentStatus::LabelAvailable, None)
                .await
            {
                tracing::debug!(sale_id = %sale_id, error = %err, "label state advance skipped");
            }
        }
        Ok(Some(url))
    }

    /// Pull the carrier's latest word on the shipment and fold it into the
    /// sale. Unknown carrier statuses and stale updates leave the sale alone.
    pub async fn sync(&self, sale_id: Uuid) -> Result<Sale, SaleError> {
        let sale = self.store.sale(sale_id).await?;
        let Some(external_id) = sale.external_shipment_id.as_deref() else {
            return Err(SaleError::ShipmentNotRequested);
        };

        let update = self.carrier.track(external_id).await?;
        let Some(status) = update.status else {
            tracing::info!(
                sale_id = %sale_id,
                raw_status = %update.raw_status,
                "carrier status outside our vocabulary, leaving shipment as is"
            );
            return Ok(sale);
        };

        match self
            .store
            .update_shipment_status(sale_id, status, update.tracking_code.as_deref())
            .await
        {
            Ok(updated) => {
                if updated.shipment_status != sale.shipment_status {
                    tracing::info!(
                        sale_id = %sale_id,
                        from = %sale.shipment_status,
                        to = %updated.shipment_status,
                        sale_status = %updated.status,
                        "shipment state advanced"
                    );
                }
                Ok(updated)
            }
            // The carrier can replay old states out of order; never walk the
            // shipment backwards over it.
            Err(SaleError::InvalidShipmentTransition { from, to }) => {
                tracing::warn!(
                    sale_id = %sale_id,
                    current = %from,
                    reported = %to,
                    "stale carrier update ignored"
                );
                Ok(sale)
            }
            Err(err) => Err(err),
        }
    }

    /// Current catalog weights for the sale's physical lines. Lines whose
    /// product has since vanished ship with zero declared weight. Summed in
    /// i64 so bulk quantities cannot wrap the per-product i32 weights.
    async fn parcel_weight(&self, sale: &Sale) -> Result<i64, SaleError> {
        let ids: Vec<Uuid> = sale
            .lines
            .iter()
            .filter(|l| l.requires_stock())
            .map(|l| l.product_id)
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }
        let snapshots = self.store.products(&ids).await?;
        let weights: std::collections::HashMap<Uuid, i32> =
            snapshots.into_iter().map(|p| (p.id, p.weight_grams)).collect();
        Ok(sale
            .lines
            .iter()
            .map(|l| {
                i64::from(weights.get(&l.product_id).copied().unwrap_or(0))
                    * i64::from(l.quantity)
            })
            .sum())
    }
}

// ============================================================================
// Tests
// ============================================================================
