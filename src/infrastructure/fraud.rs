use crate::domain::job::ChargeRequest;
use crate::domain::order::UserId;
use crate::domain::payment::{GatewayError, Receipt};
use crate::domain::ports::{FraudCheck, FraudCheckRef, FraudVerdict, PaymentGateway, PaymentGatewayRef};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::warn;

/// Rejects every charge requested on behalf of a blocked user.
#[derive(Debug, Default, Clone)]
pub struct BlocklistFraudCheck {
    blocked_users: HashSet<UserId>,
}

impl BlocklistFraudCheck {
    pub fn new<I>(blocked_users: I) -> Self
    where
        I: IntoIterator<Item = UserId>,
    {
        Self {
            blocked_users: blocked_users.into_iter().collect(),
        }
    }
}

impl FraudCheck for BlocklistFraudCheck {
    fn screen(&self, request: &ChargeRequest) -> FraudVerdict {
        if self.blocked_users.contains(&request.user_id) {
            FraudVerdict::Reject(format!("user {} is blocked", request.user_id))
        } else {
            FraudVerdict::Clear
        }
    }
}

/// Gateway decorator that screens each request before delegating.
///
/// A rejected request is reported as a permanent failure and never reaches the
/// inner gateway.
pub struct FraudScreenedGateway {
    inner: PaymentGatewayRef,
    check: FraudCheckRef,
}

impl FraudScreenedGateway {
    pub fn new(inner: PaymentGatewayRef, check: FraudCheckRef) -> Self {
        Self { inner, check }
    }
}

#[async_trait]
impl PaymentGateway for FraudScreenedGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<Receipt, GatewayError> {
        match self.check.screen(request) {
            FraudVerdict::Clear => self.inner.charge(request).await,
            FraudVerdict::Reject(reason) => {
                warn!(order_id = %request.order_id, %reason, "Charge rejected by fraud check");
                Err(GatewayError::Permanent(format!(
                    "fraud check rejected: {reason}"
                )))
            }
        }
    }
}
