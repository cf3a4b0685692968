use axum::extract::State;
use axum::Json;
use hostel_booking_core::service::Dashboard;
use hostel_booking_core::HostelService;

use crate::error::AppError;
use crate::session::{CurrentUser, Session};

pub async fn dashboard(
    State(service): State<HostelService>,
    CurrentUser { session, account }: CurrentUser,
) -> Result<(Session, Json<Dashboard>), AppError> {
    let dashboard = service.dashboard(account).await?;
    Ok((session, Json(dashboard)))
}
