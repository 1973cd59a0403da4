//! Authorization gates. Each is a pure predicate over the acting identity.

use super::models::Identity;

/// The acting user owns the target record.
pub fn is_owner(actor: &Identity, target_id: u64) -> bool {
    actor.id == target_id
}

/// Only the owner may edit or update a profile.
pub fn can_edit(actor: &Identity, target_id: u64) -> bool {
    is_owner(actor, target_id)
}

/// Only administrators may delete users.
pub fn can_delete(actor: &Identity) -> bool {
    actor.admin
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: u64, admin: bool) -> Identity {
        Identity {
            id,
            name: "Example User".into(),
            email: format!("user{id}@example.com"),
            admin,
        }
    }

    #[test]
    fn owner_can_edit_self_only() {
        assert!(can_edit(&identity(1, false), 1));
        assert!(!can_edit(&identity(1, false), 2));
        // admin does not imply ownership
        assert!(!can_edit(&identity(1, true), 2));
    }

    #[test]
    fn delete_requires_admin() {
        assert!(can_delete(&identity(1, true)));
        assert!(!can_delete(&identity(1, false)));
    }
}
