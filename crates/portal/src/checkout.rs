//! The join (guest checkout) flow.
//!
//! Four pages, strictly ordered:
//!
//! ```text
//! /portal/join            choose a plan          -> planId, siteCode
//! /portal/join/cart       price the order        -> pendingOrderToken, licensePlate
//! /portal/join/checkout   pay                    -> customerId, receiptId, email, licensePlate
//! /portal/join/done       optionally sign in     -> dashboard or /portal
//! ```
//!
//! The server keeps no workflow state. Each step's output travels to the next
//! in the query string (and in hidden fields on POST), and the vendor's
//! single-use pending-order token is the only thing that ties payment to the
//! priced order. A step reached without its inputs sends the visitor back to
//! the plan list.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use topedge_core::{LicensePlate, LicensePlateError};

use crate::sonnys::{PaymentCustomer, PaymentInfo, PaymentRequest};
use crate::validation::{
    AddressInput, Issues, PHONE_RE, SECURITY_CODE_RE, ValidationErrors, validate_address,
};

static CHECKOUT_CARD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{15,16}$").expect("Invalid regex"));

/// Longest email the vendor accepts at checkout.
const MAX_CHECKOUT_EMAIL_LEN: usize = 64;

/// A page of the join flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Plans,
    Cart,
    Checkout,
    Done,
}

impl Step {
    /// Path of the page.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Plans => "/portal/join",
            Self::Cart => "/portal/join/cart",
            Self::Checkout => "/portal/join/checkout",
            Self::Done => "/portal/join/done",
        }
    }

    /// 1-based position, for the progress indicator.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Plans => 1,
            Self::Cart => 2,
            Self::Checkout => 3,
            Self::Done => 4,
        }
    }

    /// Where to go when this step's inputs are missing.
    #[must_use]
    pub const fn restart() -> &'static str {
        Self::Plans.path()
    }

    /// URL of this step carrying `params` as its query string.
    #[must_use]
    pub fn url<P: Serialize>(self, params: &P) -> String {
        match serde_urlencoded_string(params) {
            Some(query) if !query.is_empty() => format!("{}?{query}", self.path()),
            _ => self.path().to_owned(),
        }
    }
}

fn serde_urlencoded_string<P: Serialize>(params: &P) -> Option<String> {
    let value = serde_json::to_value(params).ok()?;
    let map = value.as_object()?;

    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in map {
        match value {
            serde_json::Value::String(s) if !s.is_empty() => {
                query.append_pair(key, s);
            }
            serde_json::Value::Number(n) => {
                query.append_pair(key, &n.to_string());
            }
            _ => {}
        }
    }
    Some(query.finish())
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

// =============================================================================
// Continuations
// =============================================================================

/// Input of the cart step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_code: Option<String>,
}

impl CartParams {
    /// The selected plan, if any.
    #[must_use]
    pub fn plan_id(&self) -> Option<&str> {
        present(self.plan_id.as_ref())
    }

    /// The selected site, falling back to `default`.
    #[must_use]
    pub fn site_code_or<'a>(&'a self, default: &'a str) -> &'a str {
        present(self.site_code.as_ref()).unwrap_or(default)
    }
}

/// Input of the checkout step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_order_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_plate: Option<String>,
}

impl CheckoutParams {
    #[must_use]
    pub fn pending_order_token(&self) -> Option<&str> {
        present(self.pending_order_token.as_ref())
    }

    #[must_use]
    pub fn license_plate(&self) -> Option<&str> {
        present(self.license_plate.as_ref())
    }
}

/// Input of the done step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoneParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_plate: Option<String>,
}

impl DoneParams {
    /// Both identifiers produced by a successful payment.
    #[must_use]
    pub fn receipt(&self) -> Option<(&str, &str)> {
        Some((
            present(self.customer_id.as_ref())?,
            present(self.receipt_id.as_ref())?,
        ))
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        present(self.email.as_ref())
    }

    #[must_use]
    pub fn license_plate(&self) -> Option<&str> {
        present(self.license_plate.as_ref())
    }
}

// =============================================================================
// Step rules
// =============================================================================

/// Why a cart submission was refused before calling the vendor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlateError {
    #[error("License plate is required for this plan")]
    Required,
    #[error("License plate must be 3-10 letters or numbers")]
    Invalid(#[from] LicensePlateError),
}

/// Normalize the cart's plate field.
///
/// LPR plans need a plate; other plans take one if given. The plate is
/// uppercased before it is sent anywhere.
///
/// # Errors
///
/// Returns an error if an LPR plan has no plate, or a given plate is malformed.
pub fn cart_plate(raw: Option<&str>, lpr_enabled: bool) -> Result<Option<LicensePlate>, PlateError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(plate) => Ok(Some(LicensePlate::parse(plate)?)),
        None if lpr_enabled => Err(PlateError::Required),
        None => Ok(None),
    }
}

/// Convert a four-digit card expiry year to the vendor's two-digit form.
#[must_use]
pub fn vendor_exp_year(year: i32) -> u8 {
    u8::try_from(year.rem_euclid(100)).unwrap_or_default()
}

/// Remove the spaces people type between card digit groups.
#[must_use]
pub fn strip_card_number(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Checkout form as posted by the browser. Every value is text.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutForm {
    pub pending_order_token: Option<String>,
    pub license_plate: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub card_full_name: Option<String>,
    pub card_number: Option<String>,
    pub exp_month: Option<String>,
    pub exp_year: Option<String>,
    pub security_code: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub billing_phone: Option<String>,
}

impl std::fmt::Debug for CheckoutForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutForm")
            .field("pending_order_token", &self.pending_order_token)
            .field("email", &self.email)
            .field("card_number", &"[REDACTED]")
            .field("security_code", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl CheckoutForm {
    /// The continuation this form carries.
    #[must_use]
    pub fn params(&self) -> CheckoutParams {
        CheckoutParams {
            pending_order_token: self.pending_order_token.clone(),
            license_plate: self.license_plate.clone(),
        }
    }

    /// Check the form and build the vendor payment request.
    ///
    /// `current_year` is the four-digit year; cards expiring before it are
    /// refused.
    ///
    /// # Errors
    ///
    /// Returns every failing field, keyed by form field name.
    pub fn validate(&self, current_year: i32) -> Result<PaymentRequest, ValidationErrors> {
        let mut issues = Issues::default();
        let field = |v: &Option<String>| v.as_deref().map(str::trim).map(str::to_owned);

        let pending_order_token = issues.text(
            "pendingOrderToken",
            field(&self.pending_order_token).as_deref(),
            1,
            usize::MAX,
        );

        let first_name = issues.text("firstName", field(&self.first_name).as_deref(), 2, 50);
        let last_name = issues.text("lastName", field(&self.last_name).as_deref(), 2, 100);
        let email = issues.email("email", field(&self.email).as_deref());
        if email.len() > MAX_CHECKOUT_EMAIL_LEN {
            issues.add("email", "Email must not exceed 64 characters");
        }
        let phone = issues.matching(
            "phone",
            field(&self.phone).as_deref(),
            &PHONE_RE,
            "Phone must be exactly 10 digits",
        );

        let card_full_name =
            issues.text("cardFullName", field(&self.card_full_name).as_deref(), 2, 50);
        let card_number = issues.matching(
            "cardNumber",
            self.card_number.as_deref().map(strip_card_number).as_deref(),
            &CHECKOUT_CARD_RE,
            "Card number must be 15-16 digits",
        );
        let exp_month = parse_int(&mut issues, "expMonth", self.exp_month.as_deref());
        let exp_month = exp_month.map(|m| issues.int_range("expMonth", Some(m), 1, 12));
        let exp_year = parse_int(&mut issues, "expYear", self.exp_year.as_deref());
        if exp_year.is_some_and(|y| y < i64::from(current_year)) {
            issues.add("expYear", "Card has expired");
        }
        let security_code = issues.matching(
            "securityCode",
            field(&self.security_code).as_deref(),
            &SECURITY_CODE_RE,
            "CVV must be 3-4 digits",
        );

        let address_input = AddressInput {
            address1: field(&self.street),
            address2: None,
            city: field(&self.city),
            state: field(&self.state),
            postal_code: field(&self.postal_code),
            phone: field(&self.billing_phone),
        };
        let mut address_issues = Issues::default();
        let address = validate_address(&mut address_issues, "", &address_input);
        if address_input.phone.is_none() {
            address_issues.add(".phone", "Required");
        }
        // Rename `.address1` etc. to the form's own field names
        if let Err(errors) = address_issues.finish() {
            for issue in errors.issues() {
                let name = match issue.path.as_str() {
                    ".address1" => "street",
                    ".phone" => "billingPhone",
                    other => other.trim_start_matches('.'),
                };
                issues.add(name, issue.message.clone());
            }
        }

        issues.finish()?;

        Ok(PaymentRequest {
            pending_order_token,
            customer: PaymentCustomer {
                first_name,
                last_name,
                email,
                phone,
            },
            payment_info: PaymentInfo {
                card_number,
                exp_month: exp_month.and_then(|m| u8::try_from(m).ok()).unwrap_or_default(),
                exp_year: exp_year
                    .and_then(|y| i32::try_from(y).ok())
                    .map(vendor_exp_year)
                    .unwrap_or_default(),
                security_code,
                card_full_name,
                address,
            },
        })
    }
}

fn parse_int(issues: &mut Issues, path: &str, raw: Option<&str>) -> Option<i64> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => {
            issues.add(path, "Required");
            None
        }
        Some(s) => s.parse().map_or_else(
            |_| {
                issues.add(path, "Expected number");
                None
            },
            Some,
        ),
    }
}

/// Link-account form on the done step.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoneForm {
    #[serde(flatten)]
    pub params: DoneParams,
    pub last_four: Option<String>,
    /// Present when the visitor chose not to sign in.
    pub skip: Option<String>,
}

impl DoneForm {
    #[must_use]
    pub const fn skipped(&self) -> bool {
        self.skip.is_some()
    }

    /// The last four digits, if well formed.
    #[must_use]
    pub fn last_four(&self) -> Option<&str> {
        self.last_four
            .as_deref()
            .map(str::trim)
            .filter(|s| s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form() -> CheckoutForm {
        CheckoutForm {
            pending_order_token: Some("po_123".into()),
            license_plate: Some("ABC123".into()),
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            email: Some("ada@example.com".into()),
            phone: Some("8135551234".into()),
            card_full_name: Some("Ada Lovelace".into()),
            card_number: Some("4111 1111 1111 1111".into()),
            exp_month: Some("4".into()),
            exp_year: Some("2027".into()),
            security_code: Some("123".into()),
            street: Some("1 Main St".into()),
            city: Some("Tampa".into()),
            state: Some("FL".into()),
            postal_code: Some("33601".into()),
            billing_phone: Some("8135551234".into()),
        }
    }

    #[test]
    fn test_vendor_exp_year() {
        assert_eq!(vendor_exp_year(2025), 25);
        assert_eq!(vendor_exp_year(2099), 99);
        assert_eq!(vendor_exp_year(2100), 0);
        assert_eq!(vendor_exp_year(2007), 7);
    }

    #[test]
    fn test_step_urls() {
        assert_eq!(Step::restart(), "/portal/join");
        let url = Step::Cart.url(&CartParams {
            plan_id: Some("123".into()),
            site_code: Some("DEF".into()),
        });
        assert_eq!(url, "/portal/join/cart?planId=123&siteCode=DEF");

        let url = Step::Checkout.url(&CheckoutParams {
            pending_order_token: Some("a b&c".into()),
            license_plate: None,
        });
        assert_eq!(url, "/portal/join/checkout?pendingOrderToken=a+b%26c");
        assert_eq!(Step::Done.url(&DoneParams::default()), "/portal/join/done");
    }

    #[test]
    fn test_missing_inputs_detected() {
        assert!(CartParams::default().plan_id().is_none());
        let blank = CartParams {
            plan_id: Some("  ".into()),
            site_code: None,
        };
        assert!(blank.plan_id().is_none());
        assert_eq!(blank.site_code_or("DEF"), "DEF");

        let half = DoneParams {
            customer_id: Some("864:1005".into()),
            ..Default::default()
        };
        assert!(half.receipt().is_none());
    }

    #[test]
    fn test_cart_plate() {
        assert_eq!(cart_plate(None, true), Err(PlateError::Required));
        assert_eq!(cart_plate(Some("  "), true), Err(PlateError::Required));
        assert_eq!(cart_plate(None, false), Ok(None));
        assert_eq!(
            cart_plate(Some("abc123"), true).unwrap().unwrap().as_str(),
            "ABC123"
        );
        assert!(matches!(
            cart_plate(Some("AB-12"), false),
            Err(PlateError::Invalid(_))
        ));
    }

    #[test]
    fn test_checkout_form_builds_vendor_request() {
        let request = form().validate(2025).unwrap();
        assert_eq!(request.pending_order_token, "po_123");
        assert_eq!(request.payment_info.card_number, "4111111111111111");
        assert_eq!(request.payment_info.exp_month, 4);
        assert_eq!(request.payment_info.exp_year, 27);
        assert_eq!(request.payment_info.address.address1, "1 Main St");
        assert_eq!(request.payment_info.address.address2, "");
        assert_eq!(
            request.payment_info.address.phone.as_deref(),
            Some("8135551234")
        );
    }

    #[test]
    fn test_checkout_year_boundaries() {
        let mut f = form();
        f.exp_year = Some("2025".into());
        assert_eq!(f.validate(2025).unwrap().payment_info.exp_year, 25);

        f.exp_year = Some("2099".into());
        assert_eq!(f.validate(2025).unwrap().payment_info.exp_year, 99);

        f.exp_year = Some("2024".into());
        let err = f.validate(2025).unwrap_err();
        assert_eq!(err.message_for("expYear"), Some("Card has expired"));
    }

    #[test]
    fn test_checkout_form_rules() {
        let mut f = form();
        f.first_name = Some("A".into());
        f.card_number = Some("4111 1111 1111".into());
        f.exp_month = Some("13".into());
        f.security_code = Some("12".into());
        f.street = Some(String::new());
        f.state = Some("fl".into());
        f.billing_phone = None;

        let err = f.validate(2025).unwrap_err();
        let paths: Vec<&str> = err.issues().iter().map(|i| i.path.as_str()).collect();
        assert_eq!(
            paths,
            [
                "firstName",
                "cardNumber",
                "expMonth",
                "securityCode",
                "street",
                "state",
                "billingPhone"
            ]
        );
    }

    #[test]
    fn test_checkout_phone_and_cvv_match_api_rules() {
        let mut f = form();
        f.phone = Some("813-555-1234".into());
        f.security_code = Some("12345".into());
        let err = f.validate(2025).unwrap_err();
        assert_eq!(err.message_for("phone"), Some("Phone must be exactly 10 digits"));
        assert_eq!(err.message_for("securityCode"), Some("CVV must be 3-4 digits"));

        let mut f = form();
        f.security_code = Some("1234".into());
        assert!(f.validate(2025).is_ok());
    }

    #[test]
    fn test_checkout_email_length() {
        let mut f = form();
        f.email = Some(format!("{}@example.com", "a".repeat(60)));
        let err = f.validate(2025).unwrap_err();
        assert_eq!(
            err.message_for("email"),
            Some("Email must not exceed 64 characters")
        );
    }

    #[test]
    fn test_done_form() {
        let form: DoneForm = serde_json::from_value(serde_json::json!({
            "customerId": "864:1005",
            "receiptId": "1:77",
            "email": "ada@example.com",
            "licensePlate": "ABC123",
            "lastFour": " 4242 "
        }))
        .unwrap();
        assert_eq!(form.last_four(), Some("4242"));
        assert!(!form.skipped());
        assert_eq!(form.params.receipt(), Some(("864:1005", "1:77")));

        let bad = DoneForm {
            last_four: Some("42a2".into()),
            ..Default::default()
        };
        assert!(bad.last_four().is_none());
    }
}
