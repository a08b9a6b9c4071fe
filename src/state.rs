use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{
    config::Config,
    error::AppError,
    services::{
        evaluator::{Evaluator, GeminiEvaluator, NoopEvaluator},
        payment::{PaymentGateway, RazorpayGateway},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub evaluator: Arc<dyn Evaluator>,
    /// `None` when Razorpay credentials are not configured.
    pub payments: Option<Arc<dyn PaymentGateway>>,
}

impl AppState {
    /// Builds the external clients the configuration enables.
    pub fn new(pool: PgPool, config: Config) -> Result<Self, AppError> {
        let evaluator: Arc<dyn Evaluator> = match &config.gemini_api_key {
            Some(key) => Arc::new(GeminiEvaluator::new(
                key.clone(),
                config.gemini_model.clone(),
            )?),
            None => {
                tracing::warn!("GEMINI_API_KEY not set; AI explanations and evaluation disabled");
                Arc::new(NoopEvaluator)
            }
        };

        let payments: Option<Arc<dyn PaymentGateway>> =
            match (&config.razorpay_key_id, &config.razorpay_key_secret) {
                (Some(id), Some(secret)) => {
                    Some(Arc::new(RazorpayGateway::new(id.clone(), secret.clone())?))
                }
                _ => {
                    tracing::warn!("Razorpay credentials not set; payments disabled");
                    None
                }
            };

        Ok(Self {
            pool,
            config,
            evaluator,
            payments,
        })
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
