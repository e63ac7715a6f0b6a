use crate::{display::DisplayState, server::SharedState};
use axum::{extract::State, response::Json};

pub async fn current_prediction(State(state): State<SharedState>) -> Json<DisplayState> {
    Json(state.session.display())
}
