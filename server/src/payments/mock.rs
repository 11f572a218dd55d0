use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    CheckoutSession, PaymentError, PaymentProvider, PaymentStatus, SessionRequest, SessionStatus,
};

/// In-process payment provider for tests and local development.
///
/// Sessions start `unpaid`; [`MockPaymentProvider::mark_paid`] simulates the
/// customer completing the hosted page.
#[derive(Default)]
pub struct MockPaymentProvider {
    sessions: Mutex<HashMap<String, PaymentStatus>>,
    requests: Mutex<Vec<SessionRequest>>,
    pub fail_create: AtomicBool,
    pub fail_retrieve: AtomicBool,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mark_paid(&self, session_id: &str) {
        self.sessions
            .lock()
            .await
            .insert(session_id.to_string(), PaymentStatus::Paid);
    }

    pub async fn requests(&self) -> Vec<SessionRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn last_session_id(&self) -> Option<String> {
        let requests = self.requests.lock().await;
        requests
            .last()
            .map(|req| session_id_for(req.metadata.booking_id))
    }
}

fn session_id_for(booking_id: Uuid) -> String {
    format!("cs_test_{}", booking_id.simple())
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_session(
        &self,
        request: SessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(PaymentError::Api {
                status: 503,
                message: "mock provider unavailable".to_string(),
            });
        }

        let id = session_id_for(request.metadata.booking_id);
        self.sessions
            .lock()
            .await
            .insert(id.clone(), PaymentStatus::Unpaid);
        self.requests.lock().await.push(request);

        Ok(CheckoutSession {
            url: format!("https://checkout.test/pay/{}", id),
            id,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus, PaymentError> {
        if self.fail_retrieve.load(Ordering::SeqCst) {
            return Err(PaymentError::Api {
                status: 503,
                message: "mock provider unavailable".to_string(),
            });
        }

        let sessions = self.sessions.lock().await;
        let payment_status = sessions.get(session_id).copied().ok_or_else(|| PaymentError::Api {
            status: 404,
            message: format!("No such checkout.session: '{}'", session_id),
        })?;

        Ok(SessionStatus {
            id: session_id.to_string(),
            payment_status,
        })
    }
}
