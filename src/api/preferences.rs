use axum::{
    extract::{Path, State},
    Json,
};

use crate::notification::UserId;
use crate::preference::PreferenceGroup;

use super::ApiState;

/// GET /preferences/{user_id} - notification preferences as `user_id` sees them
pub async fn preference_definitions(
    State(state): State<ApiState>,
    Path(user_id): Path<UserId>,
) -> Json<Vec<PreferenceGroup>> {
    Json(state.dispatcher.preference_definitions(user_id).await)
}
