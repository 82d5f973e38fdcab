//! Pharmacy listing, search, and by-id endpoints.
//!
//! - `GET /api/pharmacies`: paginated, sorted listing
//! - `GET /api/pharmacies/search`: substring search on name or address
//! - `GET|PUT|DELETE /api/pharmacies/:id`

use axum::Json;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, Query, State};
use pharmadir_core::{Pharmacy, PharmacyPatch};
use pharmadir_store::{ListQuery, Pagination, SortField, SortOrder};
use serde::{Deserialize, Serialize};

use super::parse_or;
use crate::envelope::{Envelope, ok};
use crate::error::ApiError;
use crate::state::AppState;

const LIST_PER_PAGE: u32 = 50;
const LIST_PER_PAGE_MAX: u32 = 100;
const SEARCH_PER_PAGE: u32 = 20;
const SEARCH_PER_PAGE_MAX: u32 = 50;

// Strings rather than numbers so a malformed value falls back to its
// default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

impl ListParams {
    fn to_query(&self) -> ListQuery {
        ListQuery {
            page: parse_or(self.page.as_deref(), 1).max(1),
            per_page: parse_or(self.per_page.as_deref(), LIST_PER_PAGE).clamp(1, LIST_PER_PAGE_MAX),
            sort: self.sort_by.as_deref().map(SortField::parse).unwrap_or_default(),
            order: self.order.as_deref().map(SortOrder::parse).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

#[derive(Serialize)]
pub struct PharmacyList {
    pub pharmacies: Vec<Pharmacy>,
    pub pagination: Pagination,
}

#[derive(Serialize)]
pub struct SearchResults {
    pub pharmacies: Vec<Pharmacy>,
    pub pagination: Pagination,
    pub search_term: String,
}

/// `GET /api/pharmacies`
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Envelope<PharmacyList>>, ApiError> {
    let page = state.store()?.list(&params.to_query())?;
    let message = format!("Retrieved {} pharmacies", page.items.len());
    Ok(ok(
        PharmacyList {
            pharmacies: page.items,
            pagination: page.pagination,
        },
        message,
    ))
}

/// `GET /api/pharmacies/search`
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Envelope<SearchResults>>, ApiError> {
    let term = params.q.as_deref().map(str::trim).unwrap_or_default();
    if term.is_empty() {
        return Err(ApiError::BadRequest("Please provide a search term".into()));
    }
    let page_no = parse_or(params.page.as_deref(), 1).max(1);
    let per_page =
        parse_or(params.per_page.as_deref(), SEARCH_PER_PAGE).clamp(1, SEARCH_PER_PAGE_MAX);

    let page = state.store()?.search(term, page_no, per_page)?;
    let message = format!("Search finished. {} results found.", page.pagination.total);
    Ok(ok(
        SearchResults {
            pharmacies: page.items,
            pagination: page.pagination,
            search_term: term.to_string(),
        },
        message,
    ))
}

/// A non-integer id can never name a pharmacy, so it is a 404 like an unknown one.
fn pharmacy_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::NotFound("Pharmacy not found".into()))
}

/// `GET /api/pharmacies/:id`
pub async fn detail(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Envelope<Pharmacy>>, ApiError> {
    let id = pharmacy_id(path)?;
    let pharmacy = state.store()?.get(id)?;
    Ok(ok(pharmacy, "Pharmacy retrieved"))
}

/// `PUT /api/pharmacies/:id` with a partial JSON body.
pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Option<Json<PharmacyPatch>>,
) -> Result<Json<Envelope<Pharmacy>>, ApiError> {
    let id = pharmacy_id(path)?;
    let patch = match body {
        Some(Json(patch)) if !patch.is_empty() => patch,
        _ => return Err(ApiError::BadRequest("Please provide the fields to update".into())),
    };
    let pharmacy = state.store()?.update_by_id(id, &patch)?;
    Ok(ok(pharmacy, "Pharmacy updated"))
}

/// `DELETE /api/pharmacies/:id`
pub async fn remove(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Envelope<Pharmacy>>, ApiError> {
    let id = pharmacy_id(path)?;
    let deleted = state.store()?.delete_by_id(id)?;
    let message = format!("Pharmacy {} deleted", deleted.name);
    Ok(ok(deleted, message))
}
