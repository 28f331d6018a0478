use std::sync::Arc;

use crate::dto::ApiResponse;
use crate::models::{OptimizedRoute, RouteOptimizationRequest};
use crate::services::RouteOptimizer;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub struct RouteOptimizationController {
    optimizer: Arc<RouteOptimizer>,
}

impl RouteOptimizationController {
    pub fn new(state: &AppState) -> Self {
        Self {
            optimizer: state.optimizer.clone(),
        }
    }

    pub async fn optimize(
        &self,
        tenant_id: &str,
        request: RouteOptimizationRequest,
    ) -> Result<ApiResponse<OptimizedRoute>, AppError> {
        let route = self.optimizer.optimize(tenant_id, &request).await?;
        Ok(ApiResponse::success(route))
    }

    pub async fn invalidate(&self, tenant_id: &str, route_id: &str) -> Result<ApiResponse<String>, AppError> {
        self.optimizer.invalidate(tenant_id, route_id).await?;

        Ok(ApiResponse::success_with_message(
            route_id.to_string(),
            "Cache de ruta invalidada".to_string(),
        ))
    }
}
