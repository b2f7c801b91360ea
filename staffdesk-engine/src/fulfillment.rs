//! Derived view of a single seller order: what staff can do next, and what
//! the order is worth.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use staffdesk_util::Amount;
use tracing::warn;

use crate::{
    progress::{compute_progression, ProgressionResult, Stage},
    render::Stepper,
    types::{Address, SellerOrderDetail, EASEBUZZ},
};

/// A fulfillment step staff can trigger on the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    ConfirmCod,
    MarkPacked,
    CreateShipment,
}

impl Action {
    /// Path segment under `/api/admin/fulfillment/`.
    pub fn path_segment(self) -> &'static str {
        match self {
            Action::ConfirmCod => "confirm-cod",
            Action::MarkPacked => "mark-packed",
            Action::CreateShipment => "create-shipment",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Action::ConfirmCod => "Confirm & accept order",
            Action::MarkPacked => "Generate packing label",
            Action::CreateShipment => "Dispatch to carrier",
        }
    }

    pub fn success_message(self) -> &'static str {
        match self {
            Action::ConfirmCod => "COD confirmed",
            Action::MarkPacked => "Order marked PACKED",
            Action::CreateShipment => "Shipment created",
        }
    }

    /// Used when the backend rejects the action without a message.
    pub fn failure_message(self) -> &'static str {
        match self {
            Action::ConfirmCod => "Failed to confirm COD",
            Action::MarkPacked => "Failed to mark packed",
            Action::CreateShipment => "Failed to create shipment",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// Actions the order's current state allows, in workflow order.
pub fn available_actions(order: &SellerOrderDetail) -> Vec<Action> {
    let stage = Stage::from_status(&order.status);
    let mut actions = vec![];
    if stage == Some(Stage::Pending)
        && (order.cod_verification.is_some() || order.payment_method() == Some(EASEBUZZ))
    {
        actions.push(Action::ConfirmCod);
    }
    if stage == Some(Stage::Accepted) {
        actions.push(Action::MarkPacked);
    }
    if stage == Some(Stage::Packed) && order.shipment.is_none() {
        actions.push(Action::CreateShipment);
    }
    actions
}

/// A pending order paid through the online gateway means the payment failed
/// and the order was recovered as a manual COD confirmation.
pub fn is_recovered_payment(order: &SellerOrderDetail) -> bool {
    order.payment_method() == Some(EASEBUZZ)
        && Stage::from_status(&order.status) == Some(Stage::Pending)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingSummary {
    pub items_subtotal: Amount,
    pub shipping_charge: Amount,
    pub total: Amount,
}

impl PricingSummary {
    pub fn of(order: &SellerOrderDetail) -> Self {
        PricingSummary {
            items_subtotal: order.items.iter().map(|item| item.subtotal()).sum(),
            shipping_charge: order.shipping_charge,
            total: order.total_amount,
        }
    }
}

pub fn delivery_address(order: &SellerOrderDetail) -> Address {
    order
        .order
        .as_ref()
        .and_then(|o| o.address.clone())
        .unwrap_or_else(Address::placeholder)
}

pub fn pickup_address(order: &SellerOrderDetail) -> Option<&Address> {
    order.seller.as_ref()?.addresses.first()
}

/// Everything a staff member needs to work an order.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub order: SellerOrderDetail,
    pub progression: ProgressionResult,
    pub stepper: Stepper,
    pub actions: Vec<Action>,
    pub pricing: PricingSummary,
    pub recovered_payment: bool,
    pub delivery: Address,
    pub pickup: Option<Address>,
}

impl OrderView {
    pub fn new(order: SellerOrderDetail) -> Self {
        let progression = compute_progression(&order.status);
        if progression.is_unrecognized() {
            warn!(
                "seller order {} has unrecognized status `{}`",
                order.id, order.status
            );
        }
        let stepper = Stepper::from(&progression);
        OrderView {
            actions: available_actions(&order),
            pricing: PricingSummary::of(&order),
            recovered_payment: is_recovered_payment(&order),
            delivery: delivery_address(&order),
            pickup: pickup_address(&order).cloned(),
            progression,
            stepper,
            order,
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{decode, CodVerification, ParentOrder, Shipment};
    use rust_decimal_macros::dec;

    fn order(status: &str) -> SellerOrderDetail {
        decode(
            format!(
                r#"{{
                    "id": 5,
                    "status": "{status}",
                    "createdAt": "2026-02-01T08:30:00Z",
                    "totalAmount": "590.00",
                    "shippingCharge": "40.00",
                    "items": [
                        {{"id": 1, "quantity": 2, "unitPrice": "125.00"}},
                        {{"id": 2, "quantity": 1, "unitPrice": "300"}}
                    ]
                }}"#
            )
            .as_bytes(),
        )
        .unwrap()
    }

    fn paid_with(mut order: SellerOrderDetail, method: &str) -> SellerOrderDetail {
        order.order = Some(ParentOrder {
            payment_method: Some(method.into()),
            ..Default::default()
        });
        order
    }

    #[test]
    fn pending_needs_verification_or_failed_gateway_to_confirm() {
        assert!(available_actions(&order("PENDING")).is_empty());
        assert!(available_actions(&paid_with(order("PENDING"), "COD")).is_empty());

        let mut verified = order("PENDING");
        verified.cod_verification = Some(CodVerification::default());
        assert_eq!(available_actions(&verified), vec![Action::ConfirmCod]);

        let recovered = paid_with(order("PENDING"), EASEBUZZ);
        assert_eq!(available_actions(&recovered), vec![Action::ConfirmCod]);
        assert!(is_recovered_payment(&recovered));
    }

    #[test]
    fn accepted_can_be_packed() {
        assert_eq!(available_actions(&order("ACCEPTED")), vec![Action::MarkPacked]);
    }

    #[test]
    fn packed_ships_once() {
        assert_eq!(
            available_actions(&order("PACKED")),
            vec![Action::CreateShipment]
        );
        let mut shipped = order("PACKED");
        shipped.shipment = Some(Shipment {
            tracking_id: Some("AWB1".into()),
            ..Default::default()
        });
        assert!(available_actions(&shipped).is_empty());
    }

    #[test]
    fn later_and_terminal_states_have_no_actions() {
        for status in ["SHIPPED", "DELIVERED", "CANCELLED", "RETURNED", "ON_HOLD"] {
            assert!(available_actions(&order(status)).is_empty(), "{status}");
        }
        assert!(!is_recovered_payment(&paid_with(order("ACCEPTED"), EASEBUZZ)));
    }

    #[test]
    fn pricing_sums_item_lines() {
        let pricing = PricingSummary::of(&order("PENDING"));
        assert_eq!(pricing.items_subtotal, Amount::new(dec!(550)));
        assert_eq!(pricing.shipping_charge, Amount::new(dec!(40)));
        assert_eq!(pricing.total, Amount::new(dec!(590)));
    }

    #[test]
    fn view_falls_back_to_placeholder_address() {
        let view = OrderView::new(order("ACCEPTED"));
        assert_eq!(view.delivery, Address::placeholder());
        assert_eq!(view.pickup, None);
        assert!(view.allows(Action::MarkPacked));
        assert!(!view.allows(Action::CreateShipment));
        assert_eq!(view.progression.progress_fraction(), 0.25);
    }

    #[test]
    fn view_serializes_actions_in_kebab_case() {
        let json = serde_json::to_value(OrderView::new(order("PACKED"))).unwrap();
        assert_eq!(json["actions"], serde_json::json!(["create-shipment"]));
        assert_eq!(json["pricing"]["itemsSubtotal"], "550.00");
        assert_eq!(json["progression"]["stageIndex"], 2);
        assert_eq!(json["recoveredPayment"], false);
    }
}
