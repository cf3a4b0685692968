use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::Json;
use hostel_booking_core::model::{RoomDetail, RoomId};
use hostel_booking_core::service::{ConfirmView, RoomView};
use hostel_booking_core::store::BookingReceipt;
use hostel_booking_core::HostelService;
use serde::Deserialize;

use crate::csrf_protection::{CsrfOnly, CsrfSafeForm, CsrfToken};
use crate::error::AppError;
use crate::session::{CurrentUser, Session};

pub async fn detail(
    State(service): State<HostelService>,
    CurrentUser { session, account }: CurrentUser,
    path: Result<Path<RoomId>, PathRejection>,
) -> Result<(Session, Json<RoomView>), AppError> {
    let Path(room) = path?;
    let view = service.room_view(&account.profile, room).await?;
    Ok((session, Json(view)))
}

/// Read-only check that is shown before the user commits to a booking.
pub async fn confirm(
    State(service): State<HostelService>,
    CurrentUser { session, account }: CurrentUser,
    path: Result<Path<RoomId>, PathRejection>,
) -> Result<(Session, Json<ConfirmView>), AppError> {
    let Path(room) = path?;
    let view = service.confirm(&account.profile, room).await?;
    Ok((session, Json(view)))
}

#[derive(Deserialize)]
pub struct BookPayload {
    csrf_token: String,
    #[serde(default)]
    confirm_switch: Option<String>,
}

impl BookPayload {
    /// Checkbox style flag, anything but an affirmative value means no.
    fn confirm_switch(&self) -> bool {
        self.confirm_switch.as_deref().is_some_and(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "yes" | "true" | "on" | "1"
            )
        })
    }
}

impl CsrfToken for BookPayload {
    fn csrf_token(&self) -> &str {
        &self.csrf_token
    }
}

pub async fn book(
    State(service): State<HostelService>,
    CurrentUser { session, account }: CurrentUser,
    path: Result<Path<RoomId>, PathRejection>,
    form: CsrfSafeForm<BookPayload>,
) -> Result<(Session, Json<BookingReceipt>), AppError> {
    let Path(room) = path?;
    let receipt = service
        .book(&account.profile, room, form.value.confirm_switch())
        .await?;
    Ok((session, Json(receipt)))
}

pub async fn cancel(
    State(service): State<HostelService>,
    CurrentUser { session, account }: CurrentUser,
    path: Result<Path<RoomId>, PathRejection>,
    _form: CsrfSafeForm<CsrfOnly>,
) -> Result<(Session, Json<RoomDetail>), AppError> {
    let Path(room) = path?;
    let detail = service.cancel(&account.profile, room).await?;
    Ok((session, Json(detail)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(confirm_switch: Option<&str>) -> BookPayload {
        BookPayload {
            csrf_token: String::new(),
            confirm_switch: confirm_switch.map(ToOwned::to_owned),
        }
    }

    #[test]
    fn confirm_switch_accepts_affirmative_values() {
        for value in ["yes", "true", "on", "1", " Yes "] {
            assert!(payload(Some(value)).confirm_switch(), "{value}");
        }
        for value in ["no", "false", "", "2"] {
            assert!(!payload(Some(value)).confirm_switch(), "{value}");
        }
        assert!(!payload(None).confirm_switch());
    }
}
