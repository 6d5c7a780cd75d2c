//! Request scope context and its extraction rules.
//!
//! A request may name its project (or organization) in several places. The
//! sources are consulted in a fixed order and the first non-empty value wins:
//!
//! 1. route parameter
//! 2. dedicated header
//! 3. JSON body field
//! 4. query string
//!
//! Extraction is a pure function over already-collected values so the HTTP
//! layer decides *where* values come from and this module decides *which* one
//! counts.

use std::str::FromStr;

use helpdesk_core::{AppResult, OrgId, ProjectId};
use serde::{Deserialize, Serialize};

/// Route parameter, body field and query key naming the project.
pub const PROJECT_ID_FIELD: &str = "projectId";
/// Header naming the project.
pub const PROJECT_ID_HEADER: &str = "x-project-id";
/// Route parameter, body field and query key naming the organization.
pub const ORG_ID_FIELD: &str = "orgId";
/// Header naming the organization.
pub const ORG_ID_HEADER: &str = "x-org-id";

/// Places a context value can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextSource {
    /// Matched route parameter.
    RouteParam,
    /// Dedicated request header.
    Header,
    /// Field of a JSON request body.
    Body,
    /// Query string parameter.
    Query,
}

impl ContextSource {
    /// Sources in descending priority.
    pub const PRIORITY: [Self; 4] = [Self::RouteParam, Self::Header, Self::Body, Self::Query];
}

/// Raw candidate values for one context key, one per source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextSources<'a> {
    /// Value of the route parameter.
    pub route_param: Option<&'a str>,
    /// Value of the header.
    pub header: Option<&'a str>,
    /// Value of the body field.
    pub body: Option<&'a str>,
    /// Value of the query parameter.
    pub query: Option<&'a str>,
}

impl<'a> ContextSources<'a> {
    /// Returns the candidate value of one source.
    #[must_use]
    pub fn value_of(&self, source: ContextSource) -> Option<&'a str> {
        match source {
            ContextSource::RouteParam => self.route_param,
            ContextSource::Header => self.header,
            ContextSource::Body => self.body,
            ContextSource::Query => self.query,
        }
    }

    /// Returns the winning source and its trimmed value.
    #[must_use]
    pub fn first_non_empty(&self) -> Option<(ContextSource, &'a str)> {
        ContextSource::PRIORITY.into_iter().find_map(|source| {
            self.value_of(source)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(|value| (source, value))
        })
    }
}

/// Resolves the project a request targets.
///
/// Only the winning value is parsed; a malformed winner is a validation error
/// even when a lower-priority source holds a well-formed id.
pub fn resolve_project_context(sources: &ContextSources<'_>) -> AppResult<Option<ProjectId>> {
    sources
        .first_non_empty()
        .map(|(_, value)| ProjectId::from_str(value))
        .transpose()
}

/// Resolves the organization a request targets, with the same priority rules
/// as [`resolve_project_context`].
pub fn resolve_org_context(sources: &ContextSources<'_>) -> AppResult<Option<OrgId>> {
    sources
        .first_non_empty()
        .map(|(_, value)| OrgId::from_str(value))
        .transpose()
}

/// Scope a request declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeContext {
    /// Declared organization.
    pub org_id: Option<OrgId>,
    /// Declared project.
    pub project_id: Option<ProjectId>,
}

impl ScopeContext {
    /// Creates a context from optional org and project ids.
    #[must_use]
    pub fn new(org_id: Option<OrgId>, project_id: Option<ProjectId>) -> Self {
        Self { org_id, project_id }
    }

    /// Context naming only an organization.
    #[must_use]
    pub fn org(org_id: OrgId) -> Self {
        Self::new(Some(org_id), None)
    }

    /// Context naming only a project.
    #[must_use]
    pub fn project(project_id: ProjectId) -> Self {
        Self::new(None, Some(project_id))
    }

    /// Returns whether neither an org nor a project was declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.org_id.is_none() && self.project_id.is_none()
    }
}
