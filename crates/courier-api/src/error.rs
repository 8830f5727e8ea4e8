use axum::http::StatusCode;
use courier_db::CoreError;
use tracing::error;

/// Map core errors onto HTTP status codes. Store failures are logged here
/// so handlers never swallow them silently.
pub fn status_for(err: CoreError) -> StatusCode {
    match err {
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
        CoreError::Conflict(msg) => {
            error!("unexpected conflict: {}", msg);
            StatusCode::CONFLICT
        }
        CoreError::Store(e) => {
            error!("store error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
        CoreError::Unavailable(msg) => {
            error!("store unavailable: {}", msg);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_expected_codes() {
        assert_eq!(status_for(CoreError::Validation("x")), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(CoreError::NotFound("x")), StatusCode::NOT_FOUND);
        assert_eq!(status_for(CoreError::Forbidden("x")), StatusCode::FORBIDDEN);
        assert_eq!(status_for(CoreError::Conflict("x")), StatusCode::CONFLICT);
        assert_eq!(
            status_for(CoreError::Unavailable("pool down".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
