use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::Json;
use hostel_booking_core::model::{Block, BlockId, BlockLayout};
use hostel_booking_core::HostelService;

use crate::error::AppError;
use crate::session::{CurrentUser, Session};

/// Blocks matching the gender of the user.
pub async fn list(
    State(service): State<HostelService>,
    CurrentUser { session, account }: CurrentUser,
) -> Result<(Session, Json<Vec<Block>>), AppError> {
    let blocks = service.blocks(&account.profile).await?;
    Ok((session, Json(blocks)))
}

pub async fn layout(
    State(service): State<HostelService>,
    CurrentUser { session, account }: CurrentUser,
    path: Result<Path<BlockId>, PathRejection>,
) -> Result<(Session, Json<BlockLayout>), AppError> {
    let Path(block) = path?;
    let layout = service.block_layout(&account.profile, block).await?;
    Ok((session, Json(layout)))
}
