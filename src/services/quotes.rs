// ============================================================================
// Shipping Quote Selection
// ============================================================================
//
// Aggregates carrier offers and picks one. The house carrier gets the order
// whenever its offer lands within the accepted band above the cheapest
// quote. Quoting never hard-fails: if the aggregator is down or answers
// with nothing, a configured flat fee keeps checkout moving.
//
// ============================================================================

use std::sync::Arc;

use crate::clients::{CarrierApi, CarrierQuote, QuoteRequest};

#[derive(Debug, Clone)]
pub struct QuotePolicy {
    /// Carrier preferred for tie-breaks, matched case-insensitively.
    pub preferred_carrier: Option<String>,
    /// Accepted band above the cheapest offer, in percent.
    pub tolerance_percent: i64,
    /// Flat fee in cents charged when no usable offer exists.
    pub fallback_fee: i64,
}

impl Default for QuotePolicy {
    fn default() -> Self {
        Self {
            preferred_carrier: None,
            tolerance_percent: 10,
            fallback_fee: 1_500,
        }
    }
}

/// The selected offer, before shipping tax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedQuote {
    pub carrier: Option<String>,
    pub base_cost: i64,
    /// True when the flat fallback fee was used instead of a live offer.
    pub fallback: bool,
}

/// Pick an offer among the selectable ones: cheapest wins, unless the
/// preferred carrier sits within the tolerance band of the cheapest. Ties
/// break on carrier name so the choice is deterministic.
fn choose(quotes: &[CarrierQuote], policy: &QuotePolicy) -> Option<SelectedQuote> {
    // Offers the aggregator withdraws must not win, nor set the band floor.
    let valid: Vec<&CarrierQuote> = quotes
        .iter()
        .filter(|q| q.cost >= 0 && q.selectable.unwrap_or(true))
        .collect();
    let cheapest = valid.iter().map(|q| q.cost).min()?;
    let band_max = cheapest * (100 + policy.tolerance_percent) / 100;

    let mut in_band: Vec<&&CarrierQuote> =
        valid.iter().filter(|q| q.cost <= band_max).collect();
    in_band.sort_by(|a, b| a.cost.cmp(&b.cost).then_with(|| a.carrier.cmp(&b.carrier)));

    if let Some(preferred) = &policy.preferred_carrier {
        if let Some(hit) = in_band
            .iter()
            .find(|q| q.carrier.eq_ignore_ascii_case(preferred))
        {
            return Some(SelectedQuote {
                carrier: Some(hit.carrier.clone()),
                base_cost: hit.cost,
                fallback: false,
            });
        }
    }

    in_band.first().map(|q| SelectedQuote {
        carrier: Some(q.carrier.clone()),
        base_cost: q.cost,
        fallback: false,
    })
}

pub struct QuoteService {
    carrier: Arc<dyn CarrierApi>,
    policy: QuotePolicy,
}

impl QuoteService {
    pub fn new(carrier: Arc<dyn CarrierApi>, policy: QuotePolicy) -> Self {
        Self { carrier, policy }
    }

    /// Best available offer for a parcel. Infallible by design; upstream
    /// trouble degrades to the flat fallback fee.
    pub async fn select(&self, request: &QuoteRequest) -> SelectedQuote {
        match self.carrier.quotes(request).await {
            Ok(quotes) => match choose(&quotes, &self.policy) {
                Some(choice) => {
                    tracing::debug!(
                        carrier = choice.carrier.as_deref().unwrap_or("-"),
                        base_cost = choice.base_cost,
                        offers = quotes.len(),
                        "quote selected"
                    );
                    choice
                }
                None => {
                    tracing::warn!(
                        zip_code = %request.zip_code,
                        "aggregator returned no usable offers, using fallback fee"
                    );
                    self.fallback()
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, "quote aggregation failed, using fallback fee");
                self.fallback()
            }
        }
    }

    /// The flat-fee quote used whenever no live offer can be obtained.
    pub fn fallback(&self) -> SelectedQuote {
        SelectedQuote {
            carrier: None,
            base_cost: self.policy.fallback_fee,
            fallback: true,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
