//! Admin API 艺人管理

use actix_web::{HttpResponse, Result as ActixResult, web};
use std::sync::Arc;
use tracing::{info, trace};

use crate::services::{ArtistInput, ArtistService};

use super::error_code::Resource;
use super::helpers::{api_result, created_response, resource_error, success_response};
use super::types::{ArtistListQuery, PaginatedData};

const DEFAULT_PAGE_SIZE: u64 = 20;

pub async fn list_artists(
    query: web::Query<ArtistListQuery>,
    service: web::Data<Arc<ArtistService>>,
) -> ActixResult<HttpResponse> {
    let query = query.into_inner();
    trace!("Admin API: list artists {:?}", query);

    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);

    Ok(
        match service.list_artists(page, page_size, query.search).await {
            Ok((artists, total)) => {
                success_response(PaginatedData::new(artists, page, page_size, total))
            }
            Err(e) => resource_error(Resource::Artist, &e),
        },
    )
}

pub async fn create_artist(
    body: web::Json<ArtistInput>,
    service: web::Data<Arc<ArtistService>>,
) -> ActixResult<HttpResponse> {
    Ok(match service.create_artist(body.into_inner()).await {
        Ok(artist) => {
            info!("Admin API: artist created {} ({})", artist.id, artist.slug);
            created_response("Artist created", artist)
        }
        Err(e) => resource_error(Resource::Artist, &e),
    })
}

pub async fn get_artist(
    path: web::Path<i64>,
    service: web::Data<Arc<ArtistService>>,
) -> ActixResult<HttpResponse> {
    Ok(api_result(
        Resource::Artist,
        service.get_artist(path.into_inner()).await,
    ))
}

pub async fn get_artist_by_slug(
    path: web::Path<String>,
    service: web::Data<Arc<ArtistService>>,
) -> ActixResult<HttpResponse> {
    Ok(api_result(
        Resource::Artist,
        service.get_artist_by_slug(&path.into_inner()).await,
    ))
}

pub async fn update_artist(
    path: web::Path<i64>,
    body: web::Json<ArtistInput>,
    service: web::Data<Arc<ArtistService>>,
) -> ActixResult<HttpResponse> {
    Ok(api_result(
        Resource::Artist,
        service
            .update_artist(path.into_inner(), body.into_inner())
            .await,
    ))
}

pub async fn delete_artist(
    path: web::Path<i64>,
    service: web::Data<Arc<ArtistService>>,
) -> ActixResult<HttpResponse> {
    let id = path.into_inner();
    Ok(match service.delete_artist(id).await {
        Ok(()) => {
            info!("Admin API: artist {} deleted", id);
            success_response(serde_json::json!({ "id": id }))
        }
        Err(e) => resource_error(Resource::Artist, &e),
    })
}
