//! HTTP client for the external discount service.

use std::time::Duration;

use async_trait::async_trait;
use common::CorrelationId;
use domain::{Discount, DiscountError, DiscountLookup};
use reqwest::{StatusCode, Url};
use thiserror::Error;

use crate::identity::CORRELATION_ID_HEADER;

/// Errors building a [`HttpDiscountLookup`].
#[derive(Debug, Error)]
pub enum DiscountClientError {
    #[error("invalid discount service url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Looks up discounts with `GET {base}/discount/{category}`.
///
/// A 404 means the category has no discount. Any other failure, including a
/// timeout, is reported as [`DiscountError::Unavailable`].
#[derive(Debug, Clone)]
pub struct HttpDiscountLookup {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpDiscountLookup {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DiscountClientError> {
        let invalid = |reason: String| DiscountClientError::InvalidUrl {
            url: base_url.to_string(),
            reason,
        };

        let parsed = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("not a base url".to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    fn discount_url(&self, category: &str) -> Result<Url, DiscountError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| DiscountError::Unavailable("discount service url has no path".to_string()))?
            .pop_if_empty()
            .extend(["discount", category]);
        Ok(url)
    }
}

#[async_trait]
impl DiscountLookup for HttpDiscountLookup {
    #[tracing::instrument(skip(self, correlation_id), fields(correlation_id = %correlation_id))]
    async fn lookup(
        &self,
        category: &str,
        correlation_id: &CorrelationId,
    ) -> Result<Option<Discount>, DiscountError> {
        let result = self.fetch(category, correlation_id).await;
        if result.is_err() {
            metrics::counter!("discount_lookup_failures_total").increment(1);
        }
        result
    }
}

impl HttpDiscountLookup {
    async fn fetch(
        &self,
        category: &str,
        correlation_id: &CorrelationId,
    ) -> Result<Option<Discount>, DiscountError> {
        let url = self.discount_url(category)?;

        let response = self
            .client
            .get(url)
            .header(CORRELATION_ID_HEADER, correlation_id.as_str())
            .send()
            .await
            .map_err(|e| DiscountError::Unavailable(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("no discount for category");
            return Ok(None);
        }

        let response = response
            .error_for_status()
            .map_err(|e| DiscountError::Unavailable(e.to_string()))?;

        let discount: Discount = response
            .json()
            .await
            .map_err(|e| DiscountError::InvalidResponse(e.to_string()))?;

        metrics::counter!("discount_lookups_total").increment(1);
        tracing::debug!(percentage = %discount.percentage, version_id = %discount.version_id, "discount received");
        Ok(Some(discount))
    }
}
