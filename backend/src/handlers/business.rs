//! Business-function catalogue for the chat UI.

use axum::Json;

use crate::business::{BusinessFunction, BusinessFunctionInfo};

#[utoipa::path(
    get,
    path = "/api/business-functions",
    tag = "chat",
    responses((status = 200, description = "Routing tags with slugs and starter prompts", body = Vec<BusinessFunctionInfo>))
)]
pub async fn list_business_functions() -> Json<Vec<BusinessFunctionInfo>> {
    Json(BusinessFunction::ALL.iter().copied().map(BusinessFunctionInfo::from).collect())
}
