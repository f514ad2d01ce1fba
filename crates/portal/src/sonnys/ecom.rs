//! eCommerce API client (plans, orders, payments, customer tokens).
//!
//! Nothing here is cached: every call is a single vendor round-trip.

use std::sync::Arc;

use secrecy::SecretString;
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use super::SonnysError;
use super::transport::{Transport, decode, unwrap_data};
use super::types::{
    DetailedPendingOrder, OrderReceipt, PaymentRequest, PaymentResponse, PendingOrderRequest,
    RecurringPlan, RegisterRequest, RegisteredCustomer,
};
use crate::config::VendorApiConfig;

/// Client for the eCommerce API.
#[derive(Clone)]
pub struct EcomClient {
    inner: Arc<Transport>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomerPaymentBody<'a> {
    pending_order_token: &'a str,
}

impl EcomClient {
    /// Create a new eCommerce client.
    ///
    /// # Errors
    ///
    /// Returns `SonnysError::Config` if the credentials are not valid header
    /// values or the HTTP client cannot be built.
    pub fn new(config: &VendorApiConfig) -> Result<Self, SonnysError> {
        Ok(Self {
            inner: Arc::new(Transport::new(config, "ecom")?),
        })
    }

    /// List membership plans available for purchase.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is malformed.
    #[instrument(skip(self))]
    pub async fn list_recurring_plans(&self) -> Result<Vec<RecurringPlan>, SonnysError> {
        let path = "/inventory/recurring";
        decode(path, self.inner.get(path, None).await?)
    }

    /// Price an order and obtain a single-use pending-order token.
    ///
    /// # Errors
    ///
    /// Returns the vendor error for unknown items, bad discount codes and the like.
    #[instrument(skip(self, request), fields(site_code = %request.site_code))]
    pub async fn create_detailed_pending_order(
        &self,
        request: &PendingOrderRequest,
    ) -> Result<DetailedPendingOrder, SonnysError> {
        let path = "/shop/detailed-pending-order";
        decode(path, self.inner.post(path, request, None).await?)
    }

    /// Pay for a pending order as a new (guest) customer.
    ///
    /// # Errors
    ///
    /// Returns the vendor error on declines or a reused token, and
    /// `SonnysError::Decode` if the vendor returns no payment record.
    #[instrument(skip(self, request))]
    pub async fn process_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentResponse, SonnysError> {
        let path = "/shop/payment";
        let body = unwrap_data(self.inner.post(path, request, None).await?);
        first_payment(path, body)
    }

    /// Pay for a pending order as an authenticated customer.
    ///
    /// # Errors
    ///
    /// Returns the vendor error on declines, a reused token or a rejected
    /// customer token.
    #[instrument(skip(self, customer_token, pending_order_token))]
    pub async fn process_customer_payment(
        &self,
        customer_id: &str,
        customer_token: &SecretString,
        pending_order_token: &str,
    ) -> Result<PaymentResponse, SonnysError> {
        let path = format!("/shop/customer/{customer_id}/payment");
        let body = CustomerPaymentBody {
            pending_order_token,
        };
        let response = self.inner.post(&path, &body, Some(customer_token)).await?;
        first_payment(&path, unwrap_data(response))
    }

    /// Exchange the three identity factors for a customer token.
    ///
    /// This is both the login and the post-purchase "link my account" call.
    ///
    /// # Errors
    ///
    /// Returns `BadCustomerCredentialsError` (or similar) when the factors do
    /// not match a vendor record.
    #[instrument(skip(self, request))]
    pub async fn register_customer(
        &self,
        request: &RegisterRequest,
    ) -> Result<RegisteredCustomer, SonnysError> {
        let path = "/customer/register";
        decode(path, self.inner.post(path, request, None).await?)
    }

    /// Fetch a receipt owned by the customer.
    ///
    /// # Errors
    ///
    /// Returns the vendor error if the receipt does not exist or the token is
    /// rejected.
    #[instrument(skip(self, customer_token))]
    pub async fn get_receipt(
        &self,
        customer_id: &str,
        receipt_id: &str,
        customer_token: &SecretString,
    ) -> Result<OrderReceipt, SonnysError> {
        let path = format!("/customer/{customer_id}/order/receipt/{receipt_id}");
        decode(&path, self.inner.get(&path, Some(customer_token)).await?)
    }
}

/// Payment endpoints answer with a one-element array; accept a bare object too.
fn first_payment(path: &str, body: Value) -> Result<PaymentResponse, SonnysError> {
    match body {
        Value::Array(items) => {
            let first = items.into_iter().next().ok_or_else(|| SonnysError::Decode {
                path: path.to_owned(),
                reason: "empty payment result".to_string(),
            })?;
            decode(path, first)
        }
        other => decode(path, other),
    }
}
