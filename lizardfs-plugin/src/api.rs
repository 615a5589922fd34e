use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use libvolume::VolumeDriver;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tower_http::trace::TraceLayer;

use crate::error::PluginError;
use crate::types::{
    ActivateResponse, CapabilitiesResponse, CreateRequest, EmptyRequest, EmptyResponse,
    GetResponse, ListResponse, MountRequest, MountResponse, NameRequest, PLUGIN_CONTENT_TYPE,
    PathResponse, display,
};

pub type DriverState = Arc<VolumeDriver>;

pub fn create_router(driver: DriverState) -> Router {
    Router::new()
        .route("/Plugin.Activate", post(activate))
        .route("/VolumeDriver.Create", post(create))
        .route("/VolumeDriver.List", post(list))
        .route("/VolumeDriver.Get", post(get))
        .route("/VolumeDriver.Remove", post(remove))
        .route("/VolumeDriver.Path", post(path))
        .route("/VolumeDriver.Mount", post(mount))
        .route("/VolumeDriver.Unmount", post(unmount))
        .route("/VolumeDriver.Capabilities", post(capabilities))
        .fallback(unknown_method)
        .layer(TraceLayer::new_for_http())
        .with_state(driver)
}

/// JSON request body that tolerates the engine's content type and empty bodies.
#[derive(Debug)]
pub struct PluginRequest<T>(pub T);

impl<S, T> FromRequest<S> for PluginRequest<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = PluginError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| PluginError::BadRequest(rejection.body_text()))?;
        decode(&body).map(PluginRequest)
    }
}

pub fn decode<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, PluginError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|err| PluginError::BadRequest(err.to_string()))
}

/// Successful reply, serialized with the plugin content type.
#[derive(Debug)]
pub struct PluginResponse<T>(pub T);

impl<T: Serialize> IntoResponse for PluginResponse<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(body) => (
                StatusCode::OK,
                [(CONTENT_TYPE, PLUGIN_CONTENT_TYPE)],
                body,
            )
                .into_response(),
            Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
        }
    }
}

type PluginResult<T> = Result<PluginResponse<T>, PluginError>;

pub async fn activate() -> PluginResponse<ActivateResponse> {
    tracing::info!("plugin activated");
    PluginResponse(ActivateResponse {
        implements: vec!["VolumeDriver".to_string()],
    })
}

pub async fn create(
    State(driver): State<DriverState>,
    PluginRequest(request): PluginRequest<CreateRequest>,
) -> PluginResult<EmptyResponse> {
    let options = request.options.unwrap_or_default();
    driver.create(&request.name, &options).await?;
    Ok(PluginResponse(EmptyResponse {}))
}

pub async fn list(
    State(driver): State<DriverState>,
    PluginRequest(_): PluginRequest<EmptyRequest>,
) -> PluginResult<ListResponse> {
    let volumes = driver.list().await?;
    Ok(PluginResponse(ListResponse {
        volumes: volumes.into_iter().map(Into::into).collect(),
    }))
}

pub async fn get(
    State(driver): State<DriverState>,
    PluginRequest(request): PluginRequest<NameRequest>,
) -> PluginResult<GetResponse> {
    let volume = driver.get(&request.name).await?;
    Ok(PluginResponse(GetResponse {
        volume: volume.into(),
    }))
}

pub async fn remove(
    State(driver): State<DriverState>,
    PluginRequest(request): PluginRequest<NameRequest>,
) -> PluginResult<EmptyResponse> {
    driver.remove(&request.name).await?;
    Ok(PluginResponse(EmptyResponse {}))
}

pub async fn path(
    State(driver): State<DriverState>,
    PluginRequest(request): PluginRequest<NameRequest>,
) -> PluginResult<PathResponse> {
    let mountpoint = driver.path(&request.name).await;
    Ok(PluginResponse(PathResponse {
        mountpoint: mountpoint.as_deref().map(display),
    }))
}

pub async fn mount(
    State(driver): State<DriverState>,
    PluginRequest(request): PluginRequest<MountRequest>,
) -> PluginResult<MountResponse> {
    let mountpoint = driver.mount(&request.name, &request.id).await?;
    Ok(PluginResponse(MountResponse {
        mountpoint: display(&mountpoint),
    }))
}

pub async fn unmount(
    State(driver): State<DriverState>,
    PluginRequest(request): PluginRequest<MountRequest>,
) -> PluginResult<EmptyResponse> {
    driver.unmount(&request.name, &request.id).await?;
    Ok(PluginResponse(EmptyResponse {}))
}

pub async fn capabilities(State(driver): State<DriverState>) -> PluginResponse<CapabilitiesResponse> {
    PluginResponse(driver.capabilities().into())
}

async fn unknown_method(uri: Uri) -> PluginError {
    PluginError::UnknownMethod(uri.path().trim_start_matches('/').to_string())
}
