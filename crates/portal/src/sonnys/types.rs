//! Request and response shapes for the vendor APIs.
//!
//! Response types are lenient: every field has a default so that a vendor
//! adding, dropping or nulling a field never turns a 200 into a decode error.
//! They are re-serialized as-is into the BFF envelope, minus anything secret.

use serde::{Deserialize, Deserializer, Serialize};
use topedge_core::{AccountStatus, Amount};

/// Reads an explicit `null` as the field's default.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// BackOffice
// =============================================================================

/// A customer record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Customer {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    pub number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company_name: Option<String>,
    pub loyalty_number: Option<String>,
    pub address: Option<CustomerAddress>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub birth_date: Option<String>,
    #[serde(deserialize_with = "null_default")]
    pub is_active: bool,
    #[serde(deserialize_with = "null_default")]
    pub allow_sms: bool,
    pub recurring_sms_signup_date: Option<String>,
    pub loyalty_sms_signup_date: Option<String>,
    pub modify_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomerAddress {
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
}

/// One row of `/recurring/account/list`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountSummary {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub customer_id: String,
    #[serde(deserialize_with = "null_default")]
    pub status_name: AccountStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AccountList {
    #[serde(deserialize_with = "null_default")]
    pub accounts: Vec<AccountSummary>,
}

/// Full detail of a recurring (membership) account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecurringAccount {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub plan_name: String,
    #[serde(deserialize_with = "null_default")]
    pub status: String,
    pub billing_site_code: Option<String>,
    pub creation_site_code: Option<String>,
    pub next_bill_date: Option<String>,
    pub last_bill_date: Option<String>,
    pub billing_amount: Option<Amount>,
    #[serde(deserialize_with = "null_default")]
    pub is_on_trial: bool,
    pub trial_amount: Option<Amount>,
    #[serde(deserialize_with = "null_default")]
    pub is_suspended: bool,
    pub suspended_until: Option<String>,
    pub current_recurring_status_name: Option<String>,
    #[serde(deserialize_with = "null_default")]
    pub tags: Vec<AccountTag>,
    #[serde(deserialize_with = "null_default")]
    pub vehicles: Vec<Vehicle>,
    pub customer: Option<AccountCustomer>,
    #[serde(deserialize_with = "null_default")]
    pub recurring_statuses: Vec<StatusChange>,
    #[serde(deserialize_with = "null_default")]
    pub recurring_billings: Vec<RecurringBilling>,
    pub additional_tag_price: Option<Amount>,
}

impl RecurringAccount {
    /// Status to show the customer, preferring the current recurring status.
    #[must_use]
    pub fn display_status(&self) -> &str {
        self.current_recurring_status_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.status)
    }
}

/// An RFID tag attached to an account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountTag {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub number: String,
    #[serde(deserialize_with = "null_default")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Vehicle {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    pub plate: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountCustomer {
    pub id: Option<String>,
    pub number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusChange {
    #[serde(deserialize_with = "null_default")]
    pub status: String,
    #[serde(deserialize_with = "null_default")]
    pub date: String,
}

/// One charge against a recurring account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecurringBilling {
    #[serde(deserialize_with = "null_default")]
    pub amount_charged: Amount,
    #[serde(deserialize_with = "null_default")]
    pub date: String,
    #[serde(rename = "lastFourCC")]
    #[serde(deserialize_with = "null_default")]
    pub last_four_cc: String,
    pub credit_card_expiration_date: Option<String>,
}

/// A wash site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Site {
    #[serde(deserialize_with = "null_default")]
    pub code: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    pub timezone: Option<String>,
}

/// `/site/list` answers either `{ sites: [...] }` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SiteList {
    Wrapped { sites: Vec<Site> },
    Bare(Vec<Site>),
}

impl From<SiteList> for Vec<Site> {
    fn from(list: SiteList) -> Self {
        match list {
            SiteList::Wrapped { sites } | SiteList::Bare(sites) => sites,
        }
    }
}

/// `/customer/search` answers either `{ customers: [...] }` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CustomerList {
    Wrapped { customers: Vec<Customer> },
    Bare(Vec<Customer>),
}

impl From<CustomerList> for Vec<Customer> {
    fn from(list: CustomerList) -> Self {
        match list {
            CustomerList::Wrapped { customers } | CustomerList::Bare(customers) => customers,
        }
    }
}

/// Query for `/customer/search`.
#[derive(Debug, Clone, Default)]
pub struct CustomerSearch {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

// =============================================================================
// eCommerce
// =============================================================================

/// A membership plan offered for purchase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecurringPlan {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub price: Amount,
    pub sku: Option<String>,
    /// Plan is tied to a vehicle via license plate recognition.
    #[serde(deserialize_with = "null_default")]
    pub lpr_enabled: bool,
    #[serde(deserialize_with = "null_default")]
    pub can_be_upgraded: bool,
    #[serde(deserialize_with = "null_default")]
    pub can_be_cancelled: bool,
    #[serde(deserialize_with = "null_default")]
    pub is_annual: bool,
    pub applicable_wash: Option<String>,
    #[serde(deserialize_with = "null_default")]
    pub redemption_is_unlimited: bool,
    pub redemption_limit: Option<u32>,
    #[serde(deserialize_with = "null_default")]
    pub has_trial: bool,
    pub trial_price: Option<Amount>,
    pub trial_length: Option<u32>,
    pub frequency_limit: Option<u32>,
    pub frequency_limit_type: Option<String>,
    #[serde(deserialize_with = "null_default")]
    pub locations: Vec<PlanLocation>,
    pub additional_tag_price: Option<Amount>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanLocation {
    #[serde(deserialize_with = "null_default")]
    pub site_code: String,
    pub tax_rate: Option<f64>,
    pub additional_fee_rate: Option<f64>,
    pub retail_price: Option<Amount>,
}

/// Body of `POST /shop/detailed-pending-order`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOrderRequest {
    pub site_code: String,
    pub order_items: Vec<OrderItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_plate: Option<String>,
}

/// A priced, not-yet-paid order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetailedPendingOrder {
    /// Single-use token consumed by a payment call.
    #[serde(deserialize_with = "null_default")]
    pub token: String,
    #[serde(deserialize_with = "null_default")]
    pub expires_at: String,
    #[serde(deserialize_with = "null_default")]
    pub skip_trial_price_for_recurring: bool,
    #[serde(deserialize_with = "null_default")]
    pub total_amount: Amount,
    #[serde(deserialize_with = "null_default")]
    pub sub_total: Amount,
    #[serde(deserialize_with = "null_default")]
    pub total_tax: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prorated_discount_amount: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prorated_days: Option<u32>,
}

/// Body of `POST /shop/payment` (guest checkout).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub pending_order_token: String,
    pub customer: PaymentCustomer,
    pub payment_info: PaymentInfo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

/// Card details. `Debug` is implemented by hand to keep the PAN and CVV out
/// of logs.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    pub card_number: String,
    pub exp_month: u8,
    /// Two-digit year, e.g. `25` for 2025.
    pub exp_year: u8,
    pub security_code: String,
    pub card_full_name: String,
    pub address: BillingAddress,
}

impl std::fmt::Debug for PaymentInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let last_four = self
            .card_number
            .len()
            .checked_sub(4)
            .and_then(|start| self.card_number.get(start..))
            .unwrap_or("");
        f.debug_struct("PaymentInfo")
            .field("card_number", &format_args!("****{last_four}"))
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .field("security_code", &"[REDACTED]")
            .field("card_full_name", &self.card_full_name)
            .field("address", &self.address)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingAddress {
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Result of a successful payment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentResponse {
    #[serde(deserialize_with = "null_default")]
    pub customer_id: String,
    #[serde(deserialize_with = "null_default")]
    pub secret_token: String,
    #[serde(deserialize_with = "null_default")]
    pub receipt_id: String,
    pub uri: Option<String>,
}

/// Body of `POST /customer/register`.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub product_code: String,
    pub last_four_credit_card: String,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("product_code", &self.product_code)
            .field("last_four_credit_card", &"[REDACTED]")
            .finish()
    }
}

/// Result of `POST /customer/register`.
///
/// Never serialized back to the browser: the token goes into the session.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisteredCustomer {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub customer_token: String,
}

impl std::fmt::Debug for RegisteredCustomer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredCustomer")
            .field("id", &self.id)
            .field("customer_token", &"[REDACTED]")
            .finish()
    }
}

/// Proof of a completed payment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderReceipt {
    pub receipt_number: Option<u64>,
    pub trans_id: Option<String>,
    pub trans_type: Option<String>,
    #[serde(deserialize_with = "null_default")]
    pub item_count: u32,
    #[serde(deserialize_with = "null_default")]
    pub total: Amount,
    pub date: Option<String>,
    #[serde(deserialize_with = "null_default")]
    pub trans_items: Vec<ReceiptItem>,
    #[serde(deserialize_with = "null_default")]
    pub tenders: Vec<ReceiptTender>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReceiptItem {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub quantity: u32,
    #[serde(deserialize_with = "null_default")]
    pub total: Amount,
    pub tax_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReceiptTender {
    #[serde(deserialize_with = "null_default")]
    pub tender: String,
    #[serde(deserialize_with = "null_default")]
    pub amount: Amount,
}
