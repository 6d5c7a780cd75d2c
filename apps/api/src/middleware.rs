use std::collections::HashMap;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::rejection::RawPathParamsRejection;
use axum::extract::{Query, RawPathParams, Request, State};
use axum::http::{HeaderMap, Uri, header};
use axum::middleware::{Next, from_fn_with_state};
use axum::response::Response;
use axum::Extension;
use helpdesk_application::AccessRequirement;
use helpdesk_core::{AppError, AppResult, UserIdentity};
use helpdesk_domain::{
    ContextSources, ORG_ID_FIELD, ORG_ID_HEADER, PROJECT_ID_FIELD, PROJECT_ID_HEADER, Permission,
    ScopeContext, resolve_org_context, resolve_project_context,
};
use serde_json::Value;
use tracing::debug;

use crate::error::ApiResult;
use crate::state::AppState;

/// Largest JSON body buffered to look for scope fields. Guarded routes reject
/// larger JSON bodies with 400 unless route parameters or headers already
/// name both the project and the organization.
pub const MAX_CONTEXT_BODY_BYTES: usize = 1024 * 1024;

/// Attaches the [`UserIdentity`] of a valid bearer token. Requests without a
/// valid token pass through anonymously and are rejected by the guards.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToOwned::to_owned);

    if let Some(token) = token {
        match state.identity_verifier.verify_bearer_token(token.as_str()) {
            Ok(identity) => {
                request.extensions_mut().insert(identity);
            }
            Err(error) => debug!(%error, "ignoring invalid bearer token"),
        }
    }

    next.run(request).await
}

/// Route guard checking the [`AccessRequirement`] attached to the route and
/// attaching the resulting [`helpdesk_application::AccessGrant`].
pub async fn require_access(
    State(state): State<AppState>,
    Extension(requirement): Extension<AccessRequirement>,
    route_params: Result<RawPathParams, RawPathParamsRejection>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let actor = request_actor(&request)?;

    let route_params = route_params
        .map(|params| {
            params
                .iter()
                .map(|(name, value)| (name.to_owned(), value.to_owned()))
                .collect::<HashMap<_, _>>()
        })
        .unwrap_or_default();
    let (mut request, body) = if context_settled_without_body(request.headers(), &route_params) {
        (request, None)
    } else {
        buffer_json_body(request).await?
    };
    let context =
        scope_context_from_parts(request.headers(), request.uri(), &route_params, body.as_ref())?;

    let grant = state
        .access_service
        .authorize(Some(&actor), &context, &requirement)
        .await?;

    request.extensions_mut().insert(grant);
    Ok(next.run(request).await)
}

/// Guards every route of `routes` with "any of these permissions".
///
/// JSON bodies are read for scope fields, see [`MAX_CONTEXT_BODY_BYTES`].
pub fn require_permission(
    routes: Router<AppState>,
    state: &AppState,
    permissions: impl IntoIterator<Item = Permission>,
) -> Router<AppState> {
    guard(
        routes,
        state,
        AccessRequirement::any_permission(permissions.into_iter().map(Permission::slug)),
    )
}

/// Guards every route of `routes` with "any of these role names".
///
/// JSON bodies are read for scope fields, see [`MAX_CONTEXT_BODY_BYTES`].
pub fn require_role<I, S>(routes: Router<AppState>, state: &AppState, names: I) -> Router<AppState>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    guard(routes, state, AccessRequirement::any_role(names))
}

fn guard(
    routes: Router<AppState>,
    state: &AppState,
    requirement: AccessRequirement,
) -> Router<AppState> {
    routes
        .route_layer(from_fn_with_state(state.clone(), require_access))
        .layer(Extension(requirement))
}

/// Returns the authenticated actor of the request.
pub fn request_actor(request: &Request) -> AppResult<UserIdentity> {
    request
        .extensions()
        .get::<UserIdentity>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))
}

/// Builds the declared scope from route parameters, headers, JSON body
/// fields and query string, in that priority.
pub fn scope_context_from_parts(
    headers: &HeaderMap,
    uri: &Uri,
    route_params: &HashMap<String, String>,
    body: Option<&Value>,
) -> AppResult<ScopeContext> {
    let query = Query::<HashMap<String, String>>::try_from_uri(uri)
        .map(|Query(query)| query)
        .unwrap_or_default();

    let project = CandidateValues::collect(
        PROJECT_ID_FIELD,
        PROJECT_ID_HEADER,
        route_params,
        headers,
        body,
        &query,
    )?;
    let org = CandidateValues::collect(
        ORG_ID_FIELD,
        ORG_ID_HEADER,
        route_params,
        headers,
        body,
        &query,
    )?;

    Ok(ScopeContext::new(
        resolve_org_context(&org.sources())?,
        resolve_project_context(&project.sources())?,
    ))
}

#[derive(Debug, Default)]
struct CandidateValues {
    route_param: Option<String>,
    header: Option<String>,
    body: Option<String>,
    query: Option<String>,
}

impl CandidateValues {
    fn collect(
        field: &str,
        header_name: &str,
        route_params: &HashMap<String, String>,
        headers: &HeaderMap,
        body: Option<&Value>,
        query: &HashMap<String, String>,
    ) -> AppResult<Self> {
        let header = headers
            .get(header_name)
            .map(|value| {
                value.to_str().map(ToOwned::to_owned).map_err(|_| {
                    AppError::Validation(format!("header '{header_name}' is not valid UTF-8"))
                })
            })
            .transpose()?;

        Ok(Self {
            route_param: route_params.get(field).cloned(),
            header,
            body: body
                .and_then(|body| body.get(field))
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
            query: query.get(field).cloned(),
        })
    }

    fn sources(&self) -> ContextSources<'_> {
        ContextSources {
            route_param: self.route_param.as_deref(),
            header: self.header.as_deref(),
            body: self.body.as_deref(),
            query: self.query.as_deref(),
        }
    }
}

/// Returns whether route parameters or headers already supply both scope
/// values, leaving nothing for the body to decide.
fn context_settled_without_body(
    headers: &HeaderMap,
    route_params: &HashMap<String, String>,
) -> bool {
    [
        (PROJECT_ID_FIELD, PROJECT_ID_HEADER),
        (ORG_ID_FIELD, ORG_ID_HEADER),
    ]
    .into_iter()
    .all(|(field, header_name)| {
        let is_present = |value: &str| !value.trim().is_empty();
        route_params
            .get(field)
            .map(String::as_str)
            .is_some_and(is_present)
            || headers
                .get(header_name)
                .and_then(|value| value.to_str().ok())
                .is_some_and(is_present)
    })
}

/// Buffers a JSON body so its scope fields can be read, then restores it for
/// the handler.
async fn buffer_json_body(request: Request) -> AppResult<(Request, Option<Value>)> {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    if !is_json {
        return Ok((request, None));
    }

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_CONTEXT_BODY_BYTES)
        .await
        .map_err(|error| AppError::Validation(format!("failed to read request body: {error}")))?;
    let value = serde_json::from_slice::<Value>(&bytes).ok();

    Ok((Request::from_parts(parts, Body::from(bytes)), value))
}
