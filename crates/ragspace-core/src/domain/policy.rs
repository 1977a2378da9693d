//! Pure access decisions for workspaces. No I/O: the caller loads the ACL
//! user ids only when visibility is SHARED and passes them in.

use uuid::Uuid;

use super::entities::{Actor, UserRole, Workspace, WorkspaceVisibility};

fn is_owner(workspace: &Workspace, actor: &Actor) -> bool {
    match (workspace.owner_user_id, actor.user_id) {
        (Some(owner), Some(user)) => owner == user,
        _ => false,
    }
}

fn is_shared_member(actor: &Actor, shared_user_ids: Option<&[Uuid]>) -> bool {
    let (Some(user_id), Some(ids)) = (actor.user_id, shared_user_ids) else {
        return false;
    };
    ids.contains(&user_id)
}

pub fn can_read_workspace(
    workspace: &Workspace,
    actor: Option<&Actor>,
    shared_user_ids: Option<&[Uuid]>,
) -> bool {
    let Some(actor) = actor else { return false };
    let Some(role) = actor.role else { return false };

    if role == UserRole::Admin {
        return true;
    }

    if is_owner(workspace, actor) {
        return true;
    }

    if role != UserRole::Employee {
        return false;
    }

    match workspace.visibility {
        WorkspaceVisibility::OrgRead => true,
        WorkspaceVisibility::Shared => is_shared_member(actor, shared_user_ids),
        WorkspaceVisibility::Private => false,
    }
}

pub fn can_write_workspace(workspace: &Workspace, actor: Option<&Actor>) -> bool {
    let Some(actor) = actor else { return false };
    let Some(role) = actor.role else { return false };

    if role == UserRole::Admin {
        return true;
    }

    is_owner(workspace, actor)
}

pub fn can_manage_acl(workspace: &Workspace, actor: Option<&Actor>) -> bool {
    can_write_workspace(workspace, actor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace(owner: Uuid, visibility: WorkspaceVisibility) -> Workspace {
        Workspace {
            id: Uuid::new_v4(),
            name: "ws".into(),
            description: None,
            visibility,
            owner_user_id: Some(owner),
            archived_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn admin_reads_and_writes_everything() {
        let ws = workspace(Uuid::new_v4(), WorkspaceVisibility::Private);
        let admin = Actor::admin(Uuid::new_v4());
        assert!(can_read_workspace(&ws, Some(&admin), None));
        assert!(can_write_workspace(&ws, Some(&admin)));
        assert!(can_manage_acl(&ws, Some(&admin)));
    }

    #[test]
    fn owner_reads_and_writes_own_workspace() {
        let owner = Uuid::new_v4();
        let ws = workspace(owner, WorkspaceVisibility::Private);
        let actor = Actor::employee(owner);
        assert!(can_read_workspace(&ws, Some(&actor), None));
        assert!(can_write_workspace(&ws, Some(&actor)));
    }

    #[test]
    fn employee_reads_org_read_but_not_private() {
        let ws_private = workspace(Uuid::new_v4(), WorkspaceVisibility::Private);
        let ws_org = workspace(Uuid::new_v4(), WorkspaceVisibility::OrgRead);
        let actor = Actor::employee(Uuid::new_v4());
        assert!(!can_read_workspace(&ws_private, Some(&actor), None));
        assert!(can_read_workspace(&ws_org, Some(&actor), None));
        assert!(!can_write_workspace(&ws_org, Some(&actor)));
    }

    #[test]
    fn shared_requires_acl_membership() {
        let ws = workspace(Uuid::new_v4(), WorkspaceVisibility::Shared);
        let member = Uuid::new_v4();
        let outsider = Actor::employee(Uuid::new_v4());
        let insider = Actor::employee(member);
        let acl = vec![member];

        assert!(!can_read_workspace(&ws, Some(&outsider), Some(&acl)));
        assert!(can_read_workspace(&ws, Some(&insider), Some(&acl)));
        // Without the ACL supplied, SHARED denies non-owners.
        assert!(!can_read_workspace(&ws, Some(&insider), None));
    }

    #[test]
    fn missing_actor_or_role_fails_every_check() {
        let ws = workspace(Uuid::new_v4(), WorkspaceVisibility::OrgRead);
        let role_less = Actor {
            user_id: Some(Uuid::new_v4()),
            role: None,
        };
        assert!(!can_read_workspace(&ws, None, None));
        assert!(!can_read_workspace(&ws, Some(&role_less), None));
        assert!(!can_write_workspace(&ws, None));
        assert!(!can_manage_acl(&ws, Some(&role_less)));
    }
}
