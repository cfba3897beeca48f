//! Authorization derived from a validated token.
//!
//! A permission is a sum type: power-user tokens carry no pipeline and
//! may administer pipelines; regular tokens are bound to exactly one
//! pipeline and may only touch that pipeline's tasks. The invariant
//! "a power user has no attached pipeline" holds by construction.

use thiserror::Error;

use super::Pipeline;

/// Role associated with a set of presented credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Administrator: may register pipelines, never touches tasks.
    PowerUser,
    /// Worker: bound to one pipeline's tasks.
    RegularUser,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PowerUser => f.write_str("power_user"),
            Self::RegularUser => f.write_str("regular_user"),
        }
    }
}

/// Why an operation was not permitted for the presented credentials.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// The operation requires a different role.
    #[error("Operation is not valid for role {role}")]
    RoleNotAllowed {
        /// The role the credentials carry.
        role: Role,
    },
    /// The credentials are bound to a different pipeline.
    #[error("Token-request pipeline mismatch: '{bound}' and '{requested}'")]
    PipelineMismatch {
        /// Pipeline the token was issued for.
        bound: String,
        /// Pipeline the request targets.
        requested: String,
    },
}

/// The outcome of validating a bearer token: who is asking, and what
/// scope they hold. Not persisted; derived per request.
#[derive(Debug, Clone)]
pub enum Permission {
    /// An administrator token with no pipeline scope.
    PowerUser {
        /// Internal id of the token row the credentials resolved to.
        requestor_id: i64,
    },
    /// A worker token bound to one pipeline.
    Regular {
        /// Internal id of the token row the credentials resolved to.
        requestor_id: i64,
        /// The pipeline this token is scoped to.
        pipeline: Pipeline,
    },
}

impl Permission {
    /// Internal id of the token behind these credentials, recorded on
    /// every event this requestor causes.
    pub fn requestor_id(&self) -> i64 {
        match self {
            Self::PowerUser { requestor_id } | Self::Regular { requestor_id, .. } => *requestor_id,
        }
    }

    /// The role these credentials carry.
    pub fn role(&self) -> Role {
        match self {
            Self::PowerUser { .. } => Role::PowerUser,
            Self::Regular { .. } => Role::RegularUser,
        }
    }

    /// Check that these credentials may mutate tasks of `pipeline`.
    ///
    /// Succeeds only for a regular-user permission whose bound pipeline
    /// name matches the target.
    pub fn authorize_for(&self, pipeline: &Pipeline) -> Result<(), PermissionError> {
        match self {
            Self::PowerUser { .. } => Err(PermissionError::RoleNotAllowed {
                role: Role::PowerUser,
            }),
            Self::Regular {
                pipeline: bound, ..
            } => {
                if bound.name != pipeline.name {
                    return Err(PermissionError::PipelineMismatch {
                        bound: bound.name.clone(),
                        requested: pipeline.name.clone(),
                    });
                }
                Ok(())
            }
        }
    }

    /// Check that these credentials belong to a power user.
    pub fn require_power_user(&self) -> Result<(), PermissionError> {
        match self {
            Self::PowerUser { .. } => Ok(()),
            Self::Regular { .. } => Err(PermissionError::RoleNotAllowed {
                role: Role::RegularUser,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(name: &str) -> Pipeline {
        Pipeline {
            name: name.to_owned(),
            uri: Some("http://example.com/repo".to_owned()),
            version: Some("1".to_owned()),
        }
    }

    fn regular(name: &str) -> Permission {
        Permission::Regular {
            requestor_id: 7,
            pipeline: pipeline(name),
        }
    }

    #[test]
    fn regular_user_is_authorized_for_its_own_pipeline() {
        assert!(regular("p1").authorize_for(&pipeline("p1")).is_ok());
    }

    #[test]
    fn regular_user_is_rejected_for_other_pipelines() {
        let err = regular("p1")
            .authorize_for(&pipeline("p2"))
            .expect_err("mismatch");
        assert!(matches!(err, PermissionError::PipelineMismatch { .. }));
        assert_eq!(
            err.to_string(),
            "Token-request pipeline mismatch: 'p1' and 'p2'"
        );
    }

    #[test]
    fn power_user_cannot_touch_tasks() {
        let err = Permission::PowerUser { requestor_id: 1 }
            .authorize_for(&pipeline("p1"))
            .expect_err("role");
        assert!(matches!(
            err,
            PermissionError::RoleNotAllowed {
                role: Role::PowerUser
            }
        ));
    }

    #[test]
    fn only_power_user_passes_power_check() {
        assert!(Permission::PowerUser { requestor_id: 1 }
            .require_power_user()
            .is_ok());
        let err = regular("p1").require_power_user().expect_err("role");
        assert_eq!(err.to_string(), "Operation is not valid for role regular_user");
    }

    #[test]
    fn requestor_id_is_exposed_for_both_roles() {
        assert_eq!(Permission::PowerUser { requestor_id: 3 }.requestor_id(), 3);
        assert_eq!(regular("p1").requestor_id(), 7);
        assert_eq!(regular("p1").role(), Role::RegularUser);
    }
}
