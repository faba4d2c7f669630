use std::sync::Arc;

use crate::services::PaymentService;

#[derive(Clone)]
pub struct AppState {
    pub payments: Arc<PaymentService>,
}

impl AppState {
    pub fn new(payments: PaymentService) -> Self {
        Self {
            payments: Arc::new(payments),
        }
    }
}
