//! Job overview routes
//!
//! Read-only; polling clients get the latest persisted state, including
//! partial success after a fatal failure.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use super::queries::overview::handle as handle_overview;
use super::queries::GetOverviewQuery;
use crate::api::response::ApiResponse;
use crate::features::FeatureState;
use crate::middleware::auth::CurrentUser;

/// Create job routes
pub fn jobs_routes() -> Router<FeatureState> {
    Router::new().route("/overview", get(overview))
}

/// Recent jobs of both kinds plus cumulative analytics
///
/// GET /jobs/overview
async fn overview(
    State(state): State<FeatureState>,
    user: CurrentUser,
) -> Result<Response, StatusCode> {
    let query = GetOverviewQuery { owner_id: user.id };

    match handle_overview(state.db.clone(), query).await {
        Ok(response) => Ok(ApiResponse::success(response).into_response()),
        Err(e) => {
            tracing::error!("Failed to build job overview: {:?}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_build() {
        let _router: Router<FeatureState> = jobs_routes();
    }
}
