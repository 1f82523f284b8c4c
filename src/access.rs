use crate::{error::AppError, models::Role, token::Identity};

/// require_role
///
/// Passes only when the caller holds exactly `role`.
pub fn require_role(identity: &Identity, role: Role) -> Result<(), AppError> {
    if identity.role == role {
        Ok(())
    } else {
        tracing::warn!(
            subject_id = %identity.subject_id,
            required = %role,
            actual = %identity.role,
            "role check failed"
        );
        Err(AppError::Forbidden)
    }
}

/// require_self_or_admin
///
/// Admins may act on any user; everyone else only on themselves.
pub fn require_self_or_admin(identity: &Identity, target_subject_id: &str) -> Result<(), AppError> {
    if identity.is_admin() || identity.subject_id == target_subject_id {
        Ok(())
    } else {
        tracing::warn!(
            subject_id = %identity.subject_id,
            target = %target_subject_id,
            "self-or-admin check failed"
        );
        Err(AppError::Forbidden)
    }
}
