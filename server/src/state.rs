use std::sync::Arc;

use crate::booking::{
    CheckoutOrchestrator, EventCatalog, InventoryLedger, SettlementReconciler, VerificationQuery,
};
use crate::config::Config;
use crate::payments::{PaymentProvider, WebhookVerifier};
use crate::store::BookingStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BookingStore>,
    pub payments: Arc<dyn PaymentProvider>,
    pub webhooks: WebhookVerifier,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn BookingStore>,
        payments: Arc<dyn PaymentProvider>,
        config: Config,
    ) -> Self {
        Self {
            webhooks: WebhookVerifier::new(config.stripe_webhook_secret.clone()),
            store,
            payments,
            config: Arc::new(config),
        }
    }

    pub fn checkout(&self) -> CheckoutOrchestrator<'_> {
        CheckoutOrchestrator::new(self.store.as_ref(), self.payments.as_ref(), &self.config)
    }

    pub fn settlement(&self) -> SettlementReconciler<'_> {
        SettlementReconciler::new(self.store.as_ref())
    }

    pub fn verification(&self) -> VerificationQuery<'_> {
        VerificationQuery::new(self.store.as_ref(), self.payments.as_ref())
    }

    pub fn catalog(&self) -> EventCatalog<'_> {
        EventCatalog::new(self.store.as_ref())
    }

    pub fn ledger(&self) -> InventoryLedger<'_> {
        InventoryLedger::new(self.store.as_ref())
    }
}
