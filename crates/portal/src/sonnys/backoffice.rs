//! BackOffice API client (read-only lookups).
//!
//! Responses are cached by request path for the configured revalidation
//! window. Only successful bodies are cached. A customer missing from a cached
//! account list triggers one fresh fetch, so an account opened by a join
//! shows up at once.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde_json::Value;
use tracing::{debug, instrument};

use super::SonnysError;
use super::transport::{Transport, decode, with_query};
use super::types::{
    AccountList, AccountSummary, Customer, CustomerList, CustomerSearch, RecurringAccount,
    RecurringBilling, Site, SiteList,
};
use crate::config::VendorApiConfig;

/// Maximum number of accounts fetched when resolving a customer's account.
const ACCOUNT_LIST_LIMIT: u32 = 100;

/// Client for the BackOffice API.
#[derive(Clone)]
pub struct BackOfficeClient {
    inner: Arc<BackOfficeClientInner>,
}

struct BackOfficeClientInner {
    transport: Transport,
    cache: Option<Cache<String, Value>>,
}

impl BackOfficeClient {
    /// Create a new BackOffice client.
    ///
    /// A `revalidate` of zero disables the read cache.
    ///
    /// # Errors
    ///
    /// Returns `SonnysError::Config` if the credentials are not valid header
    /// values or the HTTP client cannot be built.
    pub fn new(config: &VendorApiConfig, revalidate: Duration) -> Result<Self, SonnysError> {
        let cache = (!revalidate.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(1000)
                .time_to_live(revalidate)
                .build()
        });

        Ok(Self {
            inner: Arc::new(BackOfficeClientInner {
                transport: Transport::new(config, "backoffice")?,
                cache,
            }),
        })
    }

    /// `GET` through the read cache.
    async fn fetch(&self, path: &str) -> Result<Value, SonnysError> {
        if let Some(cached) = self.cached(path).await {
            return Ok(cached);
        }
        self.fetch_fresh(path).await
    }

    async fn cached(&self, path: &str) -> Option<Value> {
        let cached = self.inner.cache.as_ref()?.get(path).await;
        if cached.is_some() {
            debug!(path, "BackOffice cache hit");
        }
        cached
    }

    /// `GET` from the vendor, refreshing the cache entry.
    async fn fetch_fresh(&self, path: &str) -> Result<Value, SonnysError> {
        let body = self.inner.transport.get(path, None).await?;

        if let Some(cache) = &self.inner.cache {
            cache.insert(path.to_owned(), body.clone()).await;
        }

        Ok(body)
    }

    /// Search customers by email and/or name.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is malformed.
    #[instrument(skip(self))]
    pub async fn search_customer(
        &self,
        search: &CustomerSearch,
    ) -> Result<Vec<Customer>, SonnysError> {
        let path = with_query(
            "/customer/search",
            &[
                ("email", search.email.as_deref()),
                ("firstName", search.first_name.as_deref()),
                ("lastName", search.last_name.as_deref()),
            ],
        );
        let list: CustomerList = decode(&path, self.fetch(&path).await?)?;
        Ok(list.into())
    }

    /// Get a customer by entity id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is malformed.
    #[instrument(skip(self))]
    pub async fn get_customer(&self, customer_id: &str) -> Result<Customer, SonnysError> {
        let path = format!("/customer/{customer_id}");
        decode(&path, self.fetch(&path).await?)
    }

    /// Find the recurring account id belonging to a customer.
    ///
    /// The BackOffice API has no customer → account lookup, so this lists
    /// accounts and filters locally. If the customer has several accounts the
    /// first `Active` one wins, otherwise the first in list order.
    ///
    /// A cached list that lacks the customer is not trusted: the list is
    /// fetched again before answering `Ok(None)`.
    ///
    /// Returns `Ok(None)` when the customer has no account.
    ///
    /// # Errors
    ///
    /// Returns an error if the list request fails or the body is malformed.
    #[instrument(skip(self))]
    pub async fn resolve_account_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<String>, SonnysError> {
        let path = format!("/recurring/account/list?limit={ACCOUNT_LIST_LIMIT}");

        if let Some(cached) = self.cached(&path).await {
            let list: AccountList = decode(&path, cached)?;
            if let Some(account) = pick_account(&list.accounts, customer_id) {
                debug!(account_id = %account.id, "Resolved recurring account");
                return Ok(Some(account.id.clone()));
            }
            debug!("Customer not in cached account list, refetching");
        }

        let list: AccountList = decode(&path, self.fetch_fresh(&path).await?)?;

        let account_id = pick_account(&list.accounts, customer_id).map(|acc| acc.id.clone());
        debug!(?account_id, "Resolved recurring account");
        Ok(account_id)
    }

    /// Get the full recurring account for a customer.
    ///
    /// # Errors
    ///
    /// Returns `SonnysError::NotFound` if the customer has no account, or any
    /// vendor error from the list or detail calls.
    #[instrument(skip(self))]
    pub async fn get_recurring_account(
        &self,
        customer_id: &str,
    ) -> Result<RecurringAccount, SonnysError> {
        let account_id = self.resolve_account_id(customer_id).await?.ok_or_else(|| {
            SonnysError::NotFound("No recurring account found for this customer".to_string())
        })?;

        let path = format!("/recurring/account/{account_id}/detail");
        decode(&path, self.fetch(&path).await?)
    }

    /// Get recent billings for a customer's recurring account.
    ///
    /// A customer without an account, or an account whose billing ledger
    /// cannot be read (new accounts have none), yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error only if the account list itself cannot be read.
    #[instrument(skip(self))]
    pub async fn get_recurring_billings(
        &self,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<RecurringBilling>, SonnysError> {
        let Some(account_id) = self.resolve_account_id(customer_id).await? else {
            return Ok(Vec::new());
        };

        let path = format!("/recurring/account/{account_id}/billings?limit={limit}");
        let billings = self
            .fetch(&path)
            .await
            .and_then(|body| decode::<Option<Vec<RecurringBilling>>>(&path, body));

        match billings {
            Ok(billings) => Ok(billings.unwrap_or_default()),
            Err(e) => {
                debug!(error = %e, account_id = %account_id, "No billings for account");
                Ok(Vec::new())
            }
        }
    }

    /// List all wash sites.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is malformed.
    #[instrument(skip(self))]
    pub async fn list_sites(&self) -> Result<Vec<Site>, SonnysError> {
        let path = "/site/list";
        let list: SiteList = decode(path, self.fetch(path).await?)?;
        Ok(list.into())
    }
}

/// Tie-break among a customer's accounts: first active, else first listed.
fn pick_account<'a>(
    accounts: &'a [AccountSummary],
    customer_id: &str,
) -> Option<&'a AccountSummary> {
    let mut mine = accounts.iter().filter(|acc| acc.customer_id == customer_id);
    let first = mine.clone().next()?;
    Some(mine.find(|acc| acc.status_name.is_active()).unwrap_or(first))
}
