//! Stored item listing
//!
//! GET /data?item_id=&min_score=&keyword=&order_by=&order_direction=&page=&size=

use axum::{
    extract::{Query, State},
    middleware,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    api::rate_limit::{enforce_rate_limit, EndpointLimiter},
    db::{items, ItemOrder, ItemQuery, SortDirection},
    error::{ApiError, ApiResult},
    models::{ItemId, StoredItem},
    AppState,
};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// GET /data query parameters
#[derive(Debug, Default, Deserialize)]
pub struct DataParams {
    pub item_id: Option<ItemId>,
    pub min_score: Option<i64>,
    pub keyword: Option<String>,
    /// score | time | id (default score)
    pub order_by: Option<String>,
    /// asc | desc (default desc)
    pub order_direction: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl DataParams {
    fn into_query(self) -> ApiResult<ItemQuery> {
        let order_by = match self.order_by.as_deref() {
            Some(value) => value.parse::<ItemOrder>()?,
            None => ItemOrder::default(),
        };
        let direction = match self.order_direction.as_deref() {
            Some(value) => value.parse::<SortDirection>()?,
            None => SortDirection::default(),
        };

        if self.min_score.is_some_and(|score| score < 0) {
            return Err(ApiError::BadRequest("min_score must not be negative".to_string()));
        }

        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err(ApiError::BadRequest("page must be at least 1".to_string()));
        }

        let size = self.size.unwrap_or(DEFAULT_PAGE_SIZE);
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(ApiError::BadRequest(format!(
                "size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        Ok(ItemQuery {
            item_id: self.item_id,
            min_score: self.min_score,
            keyword: self.keyword,
            order_by,
            direction,
            page,
            size,
        })
    }
}

/// GET /data response
#[derive(Debug, Serialize)]
pub struct DataResponse {
    pub items: Vec<StoredItem>,
    pub total: i64,
    pub page: u32,
    pub size: u32,
    pub pages: i64,
}

/// GET /data
pub async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<DataParams>,
) -> ApiResult<Json<DataResponse>> {
    let query = params.into_query()?;
    let (items, total) = items::query_items(&state.db, &query).await?;

    let size = i64::from(query.size);
    let pages = (total + size - 1) / size;

    Ok(Json(DataResponse {
        items,
        total,
        page: query.page,
        size: query.size,
        pages,
    }))
}

/// Build item listing routes
pub fn data_routes(limiter: EndpointLimiter) -> Router<AppState> {
    Router::new()
        .route("/data", get(list_items))
        .route_layer(middleware::from_fn_with_state(limiter, enforce_rate_limit))
}
