//! Typed records for the backend's JSON contract.
//!
//! Every payload is decoded through [`decode`], which rejects bodies that do
//! not deserialize and then runs the record's [`Validate`] checks. Fields the
//! backend is known to omit are optional or defaulted; everything else is
//! required.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use staffdesk_util::Amount;

use crate::error::ContractError;

/// Payment method of orders whose online payment failed and fell back to
/// manual COD confirmation.
pub const EASEBUZZ: &str = "EASEBUZZ";

pub trait Validate {
    const RECORD: &'static str;

    fn validate(&self) -> Result<(), ContractError>;
}

impl<T: Validate> Validate for Vec<T> {
    const RECORD: &'static str = T::RECORD;

    fn validate(&self) -> Result<(), ContractError> {
        self.iter().try_for_each(|record| record.validate())
    }
}

/// Deserialize and validate a backend response body.
pub fn decode<T>(body: &[u8]) -> Result<T, ContractError>
where
    T: DeserializeOwned + Validate,
{
    let record: T =
        serde_json::from_slice(body).map_err(|e| ContractError::malformed(T::RECORD, e))?;
    record.validate()?;
    Ok(record)
}

fn non_negative(
    record: &'static str,
    id: u64,
    field: &'static str,
    amount: &Amount,
) -> Result<(), ContractError> {
    if amount.is_negative() {
        return Err(ContractError::Negative { record, id, field });
    }
    Ok(())
}

// ---------- auth ----------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

impl Validate for LoginResponse {
    const RECORD: &'static str = "login response";

    fn validate(&self) -> Result<(), ContractError> {
        if self.token.trim().is_empty() {
            return Err(ContractError::malformed(Self::RECORD, "empty token"));
        }
        Ok(())
    }
}

// ---------- orders ----------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub phone: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderBuyer {
    pub user: Customer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerOrderSummary {
    pub id: u64,
    pub status: String,
    pub total_amount: Amount,
    pub shipping_charge: Amount,
    #[serde(default)]
    pub shipping_tat_min: Option<u32>,
    #[serde(default)]
    pub shipping_tat_max: Option<u32>,
    pub order: OrderBuyer,
}

impl Validate for SellerOrderSummary {
    const RECORD: &'static str = "seller order";

    fn validate(&self) -> Result<(), ContractError> {
        non_negative(Self::RECORD, self.id, "totalAmount", &self.total_amount)?;
        non_negative(Self::RECORD, self.id, "shippingCharge", &self.shipping_charge)?;
        if let (Some(min), Some(max)) = (self.shipping_tat_min, self.shipping_tat_max) {
            if min > max {
                return Err(ContractError::InvertedTat {
                    id: self.id,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SellerOrderPage {
    /// The backend drops the key entirely when the queue is empty.
    #[serde(default)]
    pub orders: Vec<SellerOrderSummary>,
}

impl Validate for SellerOrderPage {
    const RECORD: &'static str = "seller order page";

    fn validate(&self) -> Result<(), ContractError> {
        self.orders.validate()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub landmark: Option<String>,
}

impl Address {
    /// Shown when an order carries no usable delivery address.
    pub fn placeholder() -> Self {
        Address {
            full_name: Some("N/A".into()),
            phone: Some("N/A".into()),
            ..Default::default()
        }
    }
}

/// Addresses are sometimes stored as free text; only objects are usable.
fn object_or_none<'de, D>(deserializer: D) -> Result<Option<Address>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(serde::de::Error::custom)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentOrder {
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default, deserialize_with = "object_or_none")]
    pub address: Option<Address>,
    #[serde(default)]
    pub user: Option<Customer>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductRef {
    pub id: Option<u64>,
    pub title: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: u64,
    pub quantity: u32,
    pub unit_price: Amount,
    #[serde(default)]
    pub product: Option<ProductRef>,
}

impl OrderItem {
    pub fn subtotal(&self) -> Amount {
        self.unit_price * self.quantity
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Shipment {
    pub tracking_id: Option<String>,
    pub courier: Option<String>,
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodVerification {
    pub id: Option<u64>,
    pub status: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Seller {
    pub name: Option<String>,
    pub business_name: Option<String>,
    pub gst_number: Option<String>,
    pub phone: Option<String>,
    pub addresses: Vec<Address>,
}

impl Seller {
    pub fn display_name(&self) -> Option<&str> {
        self.business_name.as_deref().or(self.name.as_deref())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerOrderDetail {
    pub id: u64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub total_amount: Amount,
    #[serde(default)]
    pub shipping_charge: Amount,
    #[serde(default)]
    pub cod_verification: Option<CodVerification>,
    #[serde(default)]
    pub order: Option<ParentOrder>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub shipment: Option<Shipment>,
    #[serde(default)]
    pub seller: Option<Seller>,
}

impl SellerOrderDetail {
    pub fn payment_method(&self) -> Option<&str> {
        self.order.as_ref()?.payment_method.as_deref()
    }
}

impl Validate for SellerOrderDetail {
    const RECORD: &'static str = "seller order";

    fn validate(&self) -> Result<(), ContractError> {
        non_negative(Self::RECORD, self.id, "totalAmount", &self.total_amount)?;
        non_negative(Self::RECORD, self.id, "shippingCharge", &self.shipping_charge)?;
        let mut subtotal = Amount::ZERO;
        for item in &self.items {
            if item.quantity == 0 {
                return Err(ContractError::EmptyItem {
                    id: self.id,
                    item: item.id,
                });
            }
            non_negative(Self::RECORD, self.id, "unitPrice", &item.unit_price)?;
            // PricingSummary sums these lines unchecked.
            subtotal = item
                .unit_price
                .checked_mul(item.quantity)
                .and_then(|line| subtotal.checked_add(line))
                .ok_or(ContractError::SubtotalOverflow { id: self.id })?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfirmCodRequest {
    pub remarks: String,
}

// ---------- campaigns ----------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CampaignStatus {
    Pending,
    Active,
    Paused,
    Completed,
    Rejected,
    Other(String),
}

impl CampaignStatus {
    pub fn as_str(&self) -> &str {
        match self {
            CampaignStatus::Pending => "PENDING",
            CampaignStatus::Active => "ACTIVE",
            CampaignStatus::Paused => "PAUSED",
            CampaignStatus::Completed => "COMPLETED",
            CampaignStatus::Rejected => "REJECTED",
            CampaignStatus::Other(other) => other.as_str(),
        }
    }
}

impl From<String> for CampaignStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "PENDING" => CampaignStatus::Pending,
            "ACTIVE" => CampaignStatus::Active,
            "PAUSED" => CampaignStatus::Paused,
            "COMPLETED" => CampaignStatus::Completed,
            "REJECTED" => CampaignStatus::Rejected,
            _ => CampaignStatus::Other(status),
        }
    }
}

impl From<CampaignStatus> for String {
    fn from(status: CampaignStatus) -> Self {
        status.as_str().to_owned()
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSeller {
    #[serde(default)]
    pub id: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignProduct {
    pub allocated_credits: i64,
    pub remaining_credits: i64,
    #[serde(default)]
    pub product: Option<ProductRef>,
}

impl CampaignProduct {
    pub fn spent(&self) -> i64 {
        self.allocated_credits - self.remaining_credits
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewAction {
    Approved,
    Rejected,
}

/// Staff member who handled a review.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewEmployee {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignReview {
    pub action: ReviewAction,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub employee: Option<ReviewEmployee>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: u64,
    pub name: String,
    pub status: CampaignStatus,
    pub total_credits: i64,
    #[serde(default)]
    pub seller: Option<CampaignSeller>,
    #[serde(default)]
    pub products: Vec<CampaignProduct>,
    /// Newest first.
    #[serde(default)]
    pub reviews: Vec<CampaignReview>,
}

impl Validate for Campaign {
    const RECORD: &'static str = "campaign";

    fn validate(&self) -> Result<(), ContractError> {
        if self.total_credits < 0 {
            return Err(ContractError::Negative {
                record: Self::RECORD,
                id: self.id,
                field: "totalCredits",
            });
        }
        for product in &self.products {
            if product.remaining_credits < 0 {
                return Err(ContractError::Negative {
                    record: Self::RECORD,
                    id: self.id,
                    field: "remainingCredits",
                });
            }
            if product.remaining_credits > product.allocated_credits {
                return Err(ContractError::CreditsExceedAllocation {
                    id: self.id,
                    allocated: product.allocated_credits,
                    remaining: product.remaining_credits,
                });
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}
