//! Request validation for the BFF endpoints.
//!
//! Each inbound body or query is deserialized into a permissive `*Input`
//! struct (every field optional) and then checked field by field. All
//! failing fields are reported together, in declaration order, as
//! `[{ "path": "...", "message": "..." }]`. Nothing reaches a vendor client
//! until validation passes.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use topedge_core::Email;

use crate::sonnys::{
    BillingAddress, CustomerSearch, OrderItem, PaymentCustomer, PaymentInfo, PaymentRequest,
    PendingOrderRequest, RegisterRequest,
};

static ENTITY_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+:\d+$").expect("Invalid regex"));
static ITEM_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?::\d+)?$").expect("Invalid regex"));
pub(crate) static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10}$").expect("Invalid regex"));
static POSTAL_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{5}(?:-[0-9]{4})?$").expect("Invalid regex"));
static STATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}$").expect("Invalid regex"));
static CARD_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{13,19}$").expect("Invalid regex"));
pub(crate) static SECURITY_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{3,4}$").expect("Invalid regex"));
static LAST_FOUR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}$").expect("Invalid regex"));
static PRODUCT_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9-]{3,50}$").expect("Invalid regex"));
static LICENSE_PLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{3,10}$").expect("Invalid regex"));

/// Default number of billings returned.
pub const DEFAULT_BILLINGS_LIMIT: u32 = 24;

/// One failing field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub path: String,
    pub message: String,
}

/// All failing fields of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(transparent)]
#[error("{} invalid field(s)", .0.len())]
pub struct ValidationErrors(Vec<Issue>);

impl ValidationErrors {
    /// A single issue, e.g. for a body that is not JSON at all.
    #[must_use]
    pub fn single(path: &str, message: impl Into<String>) -> Self {
        Self(vec![Issue {
            path: path.to_owned(),
            message: message.into(),
        }])
    }

    #[must_use]
    pub fn issues(&self) -> &[Issue] {
        &self.0
    }

    /// Message of the first issue at `path`, for inline form errors.
    #[must_use]
    pub fn message_for(&self, path: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|issue| issue.path == path)
            .map(|issue| issue.message.as_str())
    }
}

/// Accumulates issues while a request is checked.
#[derive(Debug, Default)]
pub(crate) struct Issues(Vec<Issue>);

impl Issues {
    pub(crate) fn add(&mut self, path: &str, message: impl Into<String>) {
        self.0.push(Issue {
            path: path.to_owned(),
            message: message.into(),
        });
    }

    /// A required string with a character-count range.
    pub(crate) fn text(
        &mut self,
        path: &str,
        value: Option<&str>,
        min: usize,
        max: usize,
    ) -> String {
        let Some(value) = value else {
            self.add(path, "Required");
            return String::new();
        };

        let len = value.chars().count();
        if len < min {
            self.add(path, format!("String must contain at least {min} character(s)"));
        } else if len > max {
            self.add(path, format!("String must contain at most {max} character(s)"));
        }
        value.to_owned()
    }

    /// A required string matching `re`.
    pub(crate) fn matching(
        &mut self,
        path: &str,
        value: Option<&str>,
        re: &Regex,
        message: &str,
    ) -> String {
        match value {
            None => {
                self.add(path, "Required");
                String::new()
            }
            Some(value) => {
                if !re.is_match(value) {
                    self.add(path, message);
                }
                value.to_owned()
            }
        }
    }

    /// An optional string that must match `re` when present.
    pub(crate) fn optional_matching(
        &mut self,
        path: &str,
        value: Option<&str>,
        re: &Regex,
        message: &str,
    ) -> Option<String> {
        value.map(|v| self.matching(path, Some(v), re, message))
    }

    /// A required email address.
    pub(crate) fn email(&mut self, path: &str, value: Option<&str>) -> String {
        let Some(value) = value else {
            self.add(path, "Required");
            return String::new();
        };

        match Email::parse(value) {
            Ok(email) => email.into_inner(),
            Err(_) => {
                self.add(path, "Invalid email");
                value.to_owned()
            }
        }
    }

    /// A required integer within `min..=max`.
    pub(crate) fn int_range(
        &mut self,
        path: &str,
        value: Option<i64>,
        min: i64,
        max: i64,
    ) -> i64 {
        let Some(value) = value else {
            self.add(path, "Required");
            return min;
        };

        if value < min {
            self.add(path, format!("Number must be greater than or equal to {min}"));
        } else if value > max {
            self.add(path, format!("Number must be less than or equal to {max}"));
        }
        value
    }

    pub(crate) fn finish(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.0))
        }
    }
}

fn narrow<T: TryFrom<i64> + Default>(value: i64) -> T {
    T::try_from(value).unwrap_or_default()
}

/// Validate a path parameter holding an entity id (`<digits>:<digits>`).
///
/// # Errors
///
/// Returns a single issue at `name` if the id is malformed.
pub fn entity_id(name: &str, value: &str) -> Result<String, ValidationErrors> {
    let mut issues = Issues::default();
    let id = issues.matching(name, Some(value), &ENTITY_ID_RE, "Invalid entity ID format");
    issues.finish()?;
    Ok(id)
}

// =============================================================================
// Auth
// =============================================================================

/// Body of `POST /api/ecom/customer/register` and the login form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    pub email: Option<String>,
    pub product_code: Option<String>,
    pub last_four_credit_card: Option<String>,
}

impl RegisterInput {
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn validate(&self) -> Result<RegisterRequest, ValidationErrors> {
        let mut issues = Issues::default();
        let email = issues.email("email", self.email.as_deref());
        let product_code = issues.matching(
            "productCode",
            self.product_code.as_deref(),
            &PRODUCT_CODE_RE,
            "Product code must be 3-50 letters, numbers or hyphens",
        );
        let last_four_credit_card = issues.matching(
            "lastFourCreditCard",
            self.last_four_credit_card.as_deref(),
            &LAST_FOUR_RE,
            "Last 4 digits must be exactly 4 numbers",
        );
        issues.finish()?;

        Ok(RegisterRequest {
            email,
            product_code,
            last_four_credit_card,
        })
    }
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemInput {
    pub id: Option<String>,
    pub quantity: Option<i64>,
    pub license_plate: Option<String>,
}

/// Body of `POST /api/ecom/shop/detailed-pending-order`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOrderInput {
    pub site_code: Option<String>,
    pub order_items: Option<Vec<OrderItemInput>>,
    pub discount_code: Option<String>,
}

impl PendingOrderInput {
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn validate(&self) -> Result<PendingOrderRequest, ValidationErrors> {
        let mut issues = Issues::default();
        let site_code = issues.text("siteCode", self.site_code.as_deref(), 3, 4);

        let mut order_items = Vec::new();
        match &self.order_items {
            None => issues.add("orderItems", "Required"),
            Some(items) if items.is_empty() => {
                issues.add("orderItems", "Array must contain at least 1 element(s)");
            }
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    order_items.push(validate_order_item(&mut issues, i, item));
                }
            }
        }
        issues.finish()?;

        Ok(PendingOrderRequest {
            site_code,
            order_items,
            discount_code: self.discount_code.clone(),
        })
    }
}

fn validate_order_item(issues: &mut Issues, index: usize, item: &OrderItemInput) -> OrderItem {
    let id = issues.matching(
        &format!("orderItems.{index}.id"),
        item.id.as_deref(),
        &ITEM_ID_RE,
        "Invalid item ID format",
    );

    let quantity_path = format!("orderItems.{index}.quantity");
    let quantity = match item.quantity {
        None => {
            issues.add(&quantity_path, "Required");
            0
        }
        Some(q) if q <= 0 => {
            issues.add(&quantity_path, "Number must be greater than 0");
            0
        }
        Some(q) => u32::try_from(q).unwrap_or_else(|_| {
            issues.add(&quantity_path, "Number is too large");
            0
        }),
    };

    let license_plate = issues.optional_matching(
        &format!("orderItems.{index}.licensePlate"),
        item.license_plate.as_deref(),
        &LICENSE_PLATE_RE,
        "License plate must be 3-10 letters or numbers",
    );

    OrderItem {
        id,
        quantity,
        license_plate,
    }
}

// =============================================================================
// Payments
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfoInput {
    pub card_number: Option<String>,
    pub exp_month: Option<i64>,
    pub exp_year: Option<i64>,
    pub security_code: Option<String>,
    pub card_full_name: Option<String>,
    pub address: Option<AddressInput>,
}

impl std::fmt::Debug for PaymentInfoInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentInfoInput")
            .field("card_number", &self.card_number.as_ref().map(|_| "[REDACTED]"))
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .field("security_code", &self.security_code.as_ref().map(|_| "[REDACTED]"))
            .field("card_full_name", &self.card_full_name)
            .field("address", &self.address)
            .finish()
    }
}

/// Body of `POST /api/ecom/shop/payment`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInput {
    pub pending_order_token: Option<String>,
    pub customer: Option<CustomerInput>,
    pub payment_info: Option<PaymentInfoInput>,
}

impl PaymentInput {
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn validate(&self) -> Result<PaymentRequest, ValidationErrors> {
        let mut issues = Issues::default();
        let pending_order_token = issues.text(
            "pendingOrderToken",
            self.pending_order_token.as_deref(),
            1,
            usize::MAX,
        );

        let customer = match &self.customer {
            Some(c) => Some(validate_customer(&mut issues, c)),
            None => {
                issues.add("customer", "Required");
                None
            }
        };
        let payment_info = match &self.payment_info {
            Some(p) => Some(validate_payment_info(&mut issues, p)),
            None => {
                issues.add("paymentInfo", "Required");
                None
            }
        };
        issues.finish()?;

        match (customer, payment_info) {
            (Some(customer), Some(payment_info)) => Ok(PaymentRequest {
                pending_order_token,
                customer,
                payment_info,
            }),
            // Both are Some once `finish` has passed
            _ => Err(ValidationErrors::single("", "Required")),
        }
    }
}

fn validate_customer(issues: &mut Issues, input: &CustomerInput) -> PaymentCustomer {
    PaymentCustomer {
        first_name: issues.text("customer.firstName", input.first_name.as_deref(), 1, 50),
        last_name: issues.text("customer.lastName", input.last_name.as_deref(), 1, 100),
        email: issues.email("customer.email", input.email.as_deref()),
        phone: issues.matching(
            "customer.phone",
            input.phone.as_deref(),
            &PHONE_RE,
            "Phone must be 10 digits",
        ),
    }
}

fn validate_payment_info(issues: &mut Issues, input: &PaymentInfoInput) -> PaymentInfo {
    let card_number = issues.matching(
        "paymentInfo.cardNumber",
        input.card_number.as_deref(),
        &CARD_NUMBER_RE,
        "Card number must be 13-19 digits",
    );
    let exp_month = issues.int_range("paymentInfo.expMonth", input.exp_month, 1, 12);
    let exp_year = issues.int_range("paymentInfo.expYear", input.exp_year, 0, 99);
    let security_code = issues.matching(
        "paymentInfo.securityCode",
        input.security_code.as_deref(),
        &SECURITY_CODE_RE,
        "Security code must be 3-4 digits",
    );
    let card_full_name =
        issues.text("paymentInfo.cardFullName", input.card_full_name.as_deref(), 2, 50);

    let address = match &input.address {
        Some(a) => validate_address(issues, "paymentInfo.address", a),
        None => {
            issues.add("paymentInfo.address", "Required");
            empty_address()
        }
    };

    PaymentInfo {
        card_number,
        exp_month: narrow(exp_month),
        exp_year: narrow(exp_year),
        security_code,
        card_full_name,
        address,
    }
}

fn empty_address() -> BillingAddress {
    BillingAddress {
        address1: String::new(),
        address2: String::new(),
        city: String::new(),
        state: String::new(),
        postal_code: String::new(),
        phone: None,
    }
}

pub(crate) fn validate_address(
    issues: &mut Issues,
    prefix: &str,
    input: &AddressInput,
) -> BillingAddress {
    BillingAddress {
        address1: issues.text(&format!("{prefix}.address1"), input.address1.as_deref(), 1, 50),
        address2: issues.text(
            &format!("{prefix}.address2"),
            Some(input.address2.as_deref().unwrap_or("")),
            0,
            50,
        ),
        city: issues.text(&format!("{prefix}.city"), input.city.as_deref(), 1, 50),
        state: issues.matching(
            &format!("{prefix}.state"),
            input.state.as_deref(),
            &STATE_RE,
            "State must be 2 uppercase letters",
        ),
        postal_code: issues.matching(
            &format!("{prefix}.postalCode"),
            input.postal_code.as_deref(),
            &POSTAL_CODE_RE,
            "Invalid postal code",
        ),
        phone: issues.optional_matching(
            &format!("{prefix}.phone"),
            input.phone.as_deref(),
            &PHONE_RE,
            "Phone must be 10 digits",
        ),
    }
}

/// Body of `POST /api/ecom/shop/customer/{customerId}/payment`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPaymentInput {
    pub pending_order_token: Option<String>,
}

impl CustomerPaymentInput {
    /// # Errors
    ///
    /// Returns an issue if the token is missing or empty.
    pub fn validate(&self) -> Result<String, ValidationErrors> {
        let mut issues = Issues::default();
        let token = issues.text(
            "pendingOrderToken",
            self.pending_order_token.as_deref(),
            1,
            usize::MAX,
        );
        issues.finish()?;
        Ok(token)
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Query of `GET /api/backoffice/recurring/account/{customerId}/billings`.
///
/// `limit` is taken as text so a non-numeric value is a field issue rather
/// than an extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillingsQuery {
    pub limit: Option<String>,
}

impl BillingsQuery {
    /// # Errors
    ///
    /// Returns an issue if `limit` is not an integer in `1..=100`.
    pub fn validate(&self) -> Result<u32, ValidationErrors> {
        let Some(raw) = self.limit.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(DEFAULT_BILLINGS_LIMIT);
        };

        let mut issues = Issues::default();
        let limit = match raw.parse::<i64>() {
            Ok(n) => issues.int_range("limit", Some(n), 1, 100),
            Err(_) => {
                issues.add("limit", "Expected number");
                0
            }
        };
        issues.finish()?;
        Ok(narrow(limit))
    }
}

/// Query of `GET /api/backoffice/customer/search`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSearchQuery {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl CustomerSearchQuery {
    /// # Errors
    ///
    /// Returns an issue for a malformed email, or when neither an email nor
    /// both names are given.
    pub fn validate(&self) -> Result<CustomerSearch, ValidationErrors> {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        let first_name = non_empty(&self.first_name);
        let last_name = non_empty(&self.last_name);

        let mut issues = Issues::default();
        let email = self
            .email
            .as_deref()
            .map(|email| issues.email("email", Some(email)))
            .filter(|s| !s.is_empty());

        if email.is_none() && (first_name.is_none() || last_name.is_none()) {
            issues.add("", "Either email or both firstName and lastName are required");
        }
        issues.finish()?;

        Ok(CustomerSearch {
            email,
            first_name,
            last_name,
        })
    }
}
