//! Image build status waiter

use std::time::Duration;

use kiln_core::wait::{WaitConfig, WaitError, WaitStatus, wait_until};

use crate::api::{ApiError, ImageBuilderApi, ImageDetails};

/// Default time allowed for an image to build
pub const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Default delay between GetImage calls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

pub const STATUS_AVAILABLE: &str = "AVAILABLE";

/// Statuses an image passes through while it is being built
pub const PENDING_STATUSES: &[&str] = &[
    "PENDING",
    "CREATING",
    "BUILDING",
    "TESTING",
    "DISTRIBUTING",
    "INTEGRATING",
];

/// Decide where an image is in its build from one GetImage result
///
/// An image that is not visible yet, or reports no status, is still pending.
/// Any status outside the build sequence (FAILED, CANCELLED, DEPRECATED,
/// DELETED) ends the wait with the reason reported by the service.
pub fn image_status(image: Option<ImageDetails>) -> WaitStatus<ImageDetails> {
    let Some(image) = image else {
        return WaitStatus::Pending("not found".to_string());
    };
    let Some(state) = image.state.clone() else {
        return WaitStatus::Pending("unknown".to_string());
    };

    if state.status == STATUS_AVAILABLE {
        WaitStatus::Ready(image)
    } else if PENDING_STATUSES.contains(&state.status.as_str()) {
        WaitStatus::Pending(state.status)
    } else {
        match state.reason {
            Some(reason) => WaitStatus::Failed(format!("{}: {}", state.status, reason)),
            None => WaitStatus::Failed(state.status),
        }
    }
}

/// Wait until the image build version `arn` is AVAILABLE
pub async fn image_status_available(
    api: &dyn ImageBuilderApi,
    arn: &str,
    config: WaitConfig,
) -> Result<ImageDetails, WaitError<ApiError>> {
    wait_until(config, || async move {
        match api.get_image(arn).await {
            Ok(image) => Ok(image_status(image)),
            Err(e) if e.is_not_found() => Ok(image_status(None)),
            Err(e) => Err(e),
        }
    })
    .await
}
