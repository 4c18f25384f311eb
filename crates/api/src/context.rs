use clearway_core::UserId;

/// Roles allowed to move a shipment back to an earlier phase.
const REVERT_ROLES: [&str; 2] = ["admin", "supervisor"];

/// Acting user for a request, as asserted by the upstream gateway.
///
/// Inserted by the identity middleware; present on every route except `/health`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    user_id: UserId,
    role: Option<String>,
}

impl UserContext {
    pub fn new(user_id: UserId, role: Option<String>) -> Self {
        let role = role
            .map(|r| r.trim().to_ascii_lowercase())
            .filter(|r| !r.is_empty());
        Self { user_id, role }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn can_revert(&self) -> bool {
        self.role().is_some_and(|r| REVERT_ROLES.contains(&r))
    }
}
