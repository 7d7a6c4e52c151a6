//! Route catalog contract.
//!
//! Given a crag id, the catalog returns the routes a record may be assigned to.

use serde::{Deserialize, Serialize};

use crate::remote::{GatewayError, GatewayResult, OfflineGateway};

/// A route that a record can be associated with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteCandidate {
    /// Route id, stored into the record's `routeId` on assignment.
    pub id: String,
    /// Route name.
    pub name: String,
    /// Grade, when the catalog has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
}

impl RouteCandidate {
    /// Create a candidate without a grade.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            grade: None,
        }
    }

    /// Attach a grade.
    #[must_use]
    pub fn with_grade(mut self, grade: impl Into<String>) -> Self {
        self.grade = Some(grade.into());
        self
    }
}

/// Source of route candidates for a crag.
#[async_trait::async_trait]
pub trait AssociationCatalog: Send + Sync + std::fmt::Debug {
    /// List the routes belonging to a crag.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog rejects the request or cannot be reached.
    async fn list_route_candidates(&self, crag_id: &str) -> GatewayResult<Vec<RouteCandidate>>;
}

#[async_trait::async_trait]
impl AssociationCatalog for OfflineGateway {
    async fn list_route_candidates(&self, _: &str) -> GatewayResult<Vec<RouteCandidate>> {
        Err(GatewayError::Offline)
    }
}
