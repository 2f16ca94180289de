//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::{ErrorKind, Money};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Status of a payment authorization as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    /// Waiting for the customer to provide payment.
    RequiresPayment,

    /// Payment submitted, outcome not known yet.
    Processing,

    /// Funds captured.
    Succeeded,

    /// The payment attempt failed.
    Failed,

    /// The authorization was cancelled.
    Canceled,
}

impl AuthorizationStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationStatus::RequiresPayment => "requires_payment",
            AuthorizationStatus::Processing => "processing",
            AuthorizationStatus::Succeeded => "succeeded",
            AuthorizationStatus::Failed => "failed",
            AuthorizationStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request to authorize a payment.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Amount to collect.
    pub amount: Money,
    /// ISO currency code, lowercase.
    pub currency: String,
    /// Free-form metadata echoed back by the gateway.
    pub metadata: HashMap<String, String>,
}

/// A created payment authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    /// Gateway identifier of the authorization.
    pub authorization_id: String,
    /// Secret handed to the client to complete payment.
    pub client_secret: String,
}

/// Request to refund a captured payment.
#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub authorization_id: String,
    /// Amount to refund; the full captured amount when None.
    pub amount: Option<Money>,
    pub reason: Option<String>,
    /// Repeating a key returns the refund created the first time.
    pub idempotency_key: String,
}

/// A created refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub refund_id: String,
    pub amount: Money,
}

/// Errors reported by the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway refused the request.
    #[error("Payment declined: {0}")]
    Declined(String),

    /// The gateway does not know the authorization.
    #[error("Authorization not found: {0}")]
    NotFound(String),

    /// The request was malformed for the gateway.
    #[error("Invalid gateway request: {0}")]
    InvalidRequest(String),

    /// The gateway could not be reached.
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    /// Returns the error category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Declined(_) => ErrorKind::FailedPrecondition,
            GatewayError::NotFound(_) => ErrorKind::NotFound,
            GatewayError::InvalidRequest(_) => ErrorKind::InvalidArgument,
            GatewayError::Unavailable(_) => ErrorKind::Unavailable,
        }
    }
}

/// Trait for payment gateway operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment authorization for an amount.
    async fn create_authorization(
        &self,
        request: AuthorizationRequest,
    ) -> Result<Authorization, GatewayError>;

    /// Returns the current status of an authorization.
    async fn get_authorization(
        &self,
        authorization_id: &str,
    ) -> Result<AuthorizationStatus, GatewayError>;

    /// Refunds a captured payment.
    async fn create_refund(&self, request: RefundRequest) -> Result<Refund, GatewayError>;
}

#[derive(Debug, Clone)]
struct StoredAuthorization {
    amount: Money,
    currency: String,
    status: AuthorizationStatus,
    metadata: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    authorizations: HashMap<String, StoredAuthorization>,
    refunds: HashMap<String, Refund>,
    next_id: u32,
    fail_on_authorize: bool,
    authorize_delay: Option<Duration>,
}

/// In-memory payment gateway for tests and local runs.
///
/// Authorizations start in `RequiresPayment`; tests and the development
/// routes move them along with [`InMemoryPaymentGateway::set_status`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to decline authorization requests.
    pub async fn set_fail_on_authorize(&self, fail: bool) {
        self.state.lock().await.fail_on_authorize = fail;
    }

    /// Delays every authorization request, to exercise caller timeouts.
    pub async fn set_authorize_delay(&self, delay: Option<Duration>) {
        self.state.lock().await.authorize_delay = delay;
    }

    /// Moves an authorization to a new status.
    pub async fn set_status(
        &self,
        authorization_id: &str,
        status: AuthorizationStatus,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().await;
        let authorization = state
            .authorizations
            .get_mut(authorization_id)
            .ok_or_else(|| GatewayError::NotFound(authorization_id.to_string()))?;
        authorization.status = status;
        Ok(())
    }

    /// Returns the amount and currency of an authorization.
    pub async fn amount_of(&self, authorization_id: &str) -> Option<(Money, String)> {
        self.state
            .lock()
            .await
            .authorizations
            .get(authorization_id)
            .map(|a| (a.amount, a.currency.clone()))
    }

    /// Returns a metadata value recorded on an authorization.
    pub async fn metadata_of(&self, authorization_id: &str, key: &str) -> Option<String> {
        self.state
            .lock()
            .await
            .authorizations
            .get(authorization_id)
            .and_then(|a| a.metadata.get(key).cloned())
    }

    /// Returns the number of authorizations created.
    pub async fn authorization_count(&self) -> usize {
        self.state.lock().await.authorizations.len()
    }

    /// Returns the number of distinct refunds issued.
    pub async fn refund_count(&self) -> usize {
        self.state.lock().await.refunds.len()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_authorization(
        &self,
        request: AuthorizationRequest,
    ) -> Result<Authorization, GatewayError> {
        let delay = self.state.lock().await.authorize_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;

        if state.fail_on_authorize {
            return Err(GatewayError::Declined("Authorization declined".to_string()));
        }

        if !request.amount.is_positive() {
            return Err(GatewayError::InvalidRequest(format!(
                "amount must be positive, got {}",
                request.amount
            )));
        }

        state.next_id += 1;
        let authorization_id = format!("pi_{:06}", state.next_id);
        let client_secret = format!("{authorization_id}_secret_{}", Uuid::new_v4().simple());

        state.authorizations.insert(
            authorization_id.clone(),
            StoredAuthorization {
                amount: request.amount,
                currency: request.currency,
                status: AuthorizationStatus::RequiresPayment,
                metadata: request.metadata,
            },
        );

        Ok(Authorization {
            authorization_id,
            client_secret,
        })
    }

    async fn get_authorization(
        &self,
        authorization_id: &str,
    ) -> Result<AuthorizationStatus, GatewayError> {
        self.state
            .lock()
            .await
            .authorizations
            .get(authorization_id)
            .map(|a| a.status)
            .ok_or_else(|| GatewayError::NotFound(authorization_id.to_string()))
    }

    async fn create_refund(&self, request: RefundRequest) -> Result<Refund, GatewayError> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state.refunds.get(&request.idempotency_key) {
            return Ok(existing.clone());
        }

        let authorization = state
            .authorizations
            .get(&request.authorization_id)
            .ok_or_else(|| GatewayError::NotFound(request.authorization_id.clone()))?;

        if authorization.status != AuthorizationStatus::Succeeded {
            return Err(GatewayError::InvalidRequest(format!(
                "cannot refund a payment in status {}",
                authorization.status
            )));
        }

        let amount = request.amount.unwrap_or(authorization.amount);
        if amount > authorization.amount {
            return Err(GatewayError::InvalidRequest(format!(
                "refund {amount} exceeds captured {}",
                authorization.amount
            )));
        }

        state.next_id += 1;
        let refund = Refund {
            refund_id: format!("re_{:06}", state.next_id),
            amount,
        };
        state
            .refunds
            .insert(request.idempotency_key, refund.clone());

        Ok(refund)
    }
}
