//! Message routing - live fan-out, pending buffers, join/leave transitions
//!
//! Everything here runs with the shared-state lock held by the caller, so a
//! whole join or broadcast is one atomic step as far as other connections
//! are concerned.
//!
//! Delivery policy: a chat message is delivered to every *active* member of
//! the group except its sender; members tuned to another group get it
//! appended to their pending buffer instead. System announcements (join,
//! leave, rename) pass no exclusion and so reach the actor too.

use crate::group::{Admission, MAX_MEMBERS};
use crate::registry::SessionId;
use crate::server::ClientConnection;
use crate::state::ChatState;
use crate::style;
use uuid::Uuid;

/// Result of the locked half of a join.
pub enum JoinOutcome {
    Joined {
        id: SessionId,
        /// First-ever membership in this group; triggers transcript replay
        first_time: bool,
    },
    /// The last seat was taken between the admission check and now
    Full,
}

/// Outcome of a rename attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed,
    SameName,
    Taken,
    NotRegistered,
}

/// Fan a line of text out to a group. Active members receive it on their
/// connection; a failed write is logged and skipped without aborting the
/// remaining deliveries. Inactive members accumulate it per group until
/// they tune back in.
pub async fn broadcast(
    state: &mut ChatState,
    group: &str,
    exclude: Option<SessionId>,
    text: &str,
) {
    let members: Vec<SessionId> = state.groups.members_of(group).to_vec();
    for id in members {
        let Some(session) = state.registry.get_mut(id) else {
            tracing::warn!("Group '{}' holds a seat for inert session {}", group, id);
            continue;
        };
        if session.active_group.as_deref() == Some(group) {
            if exclude == Some(id) {
                continue;
            }
            let conn = session.conn.clone();
            let name = session.name.clone();
            if let Err(e) = conn.send(text).await {
                tracing::warn!("Failed to deliver to {}: {}", name, e);
            }
        } else {
            session.buffer_pending(group, text);
        }
    }
}

/// The locked tail of a join: register the session, seat it, make the group
/// its active one and announce it. The admission gate ran before the name
/// prompt, so capacity is re-checked here in case the last seat went to
/// someone else in between.
pub async fn complete_join(
    state: &mut ChatState,
    conn: &ClientConnection,
    name: &str,
    group: &str,
) -> JoinOutcome {
    let full = match state.registry.find_by_conn(conn.id()) {
        Some(id) => state.groups.check_admission(group, id, None) == Admission::Full,
        None => state.groups.members_of(group).len() >= MAX_MEMBERS,
    };
    if full {
        return JoinOutcome::Full;
    }

    state.groups.ensure_exists(group);
    let id = state.registry.register(name, group, conn.clone());
    let first_time = state.groups.add_member(group, id);
    let display_name = match state.registry.get_mut(id) {
        Some(session) => {
            session.active_group = Some(group.to_string());
            session.name.clone()
        }
        None => name.to_string(),
    };

    let join_msg = format!(
        "{}{} has joined {}...\n{}",
        style::MAGENTA,
        display_name,
        group,
        style::RESET
    );
    broadcast(state, group, None, &join_msg).await;

    JoinOutcome::Joined { id, first_time }
}

/// Deliver and clear a session's pending buffer for a group.
pub async fn flush_pending(state: &mut ChatState, id: SessionId, group: &str) {
    let Some(session) = state.registry.get_mut(id) else {
        return;
    };
    if let Some(buffered) = session.take_pending(group) {
        let conn = session.conn.clone();
        if let Err(e) = conn.send(buffered).await {
            tracing::warn!("Failed to flush pending buffer: {}", e);
        }
    }
}

/// Leave the active group. The departure is announced to the remaining
/// members; the session then lands in another group it still holds a seat
/// in (smallest name first), or is tombstoned when none is left. Returns
/// the new active group.
pub async fn leave_active(state: &mut ChatState, id: SessionId) -> Option<String> {
    let (group, name) = {
        let session = state.registry.get_mut(id)?;
        (session.active_group.take()?, session.name.clone())
    };
    state.groups.remove_member(&group, id);

    let leave_msg = format!(
        "{}{} has left our chat...\n{}",
        style::YELLOW,
        name,
        style::RESET
    );
    broadcast(state, &group, None, &leave_msg).await;

    match state.groups.membership_group_of(id).map(str::to_string) {
        Some(next) => {
            if let Some(session) = state.registry.get_mut(id) {
                session.active_group = Some(next.clone());
            }
            Some(next)
        }
        None => {
            state.registry.clear(id);
            tracing::info!("Client {} disconnected", name);
            None
        }
    }
}

/// Rename a session in place, announcing and persisting the change in its
/// active group.
pub async fn rename(state: &mut ChatState, id: SessionId, new_name: &str) -> RenameOutcome {
    match state.registry.get(id) {
        Some(session) if session.name == new_name => return RenameOutcome::SameName,
        Some(_) => {}
        None => return RenameOutcome::NotRegistered,
    }
    if state.registry.is_name_taken(new_name) {
        return RenameOutcome::Taken;
    }

    let Some(session) = state.registry.get_mut(id) else {
        return RenameOutcome::NotRegistered;
    };
    let old_name = std::mem::replace(&mut session.name, new_name.to_string());
    let group = session.active_group.clone();

    if let Some(group) = group {
        let notice = format!("Heads up! [{}] is now going by [{}].\n", old_name, new_name);
        state.store.append(&group, &notice);
        let colored = format!("{}{}{}", style::BLUE, notice, style::RESET);
        broadcast(state, &group, None, &colored).await;
    }
    RenameOutcome::Renamed
}

/// Teardown for a connection that dropped without `:exit:`. Every seat the
/// session held is released, the former active group hears the departure,
/// and the session is tombstoned.
pub async fn disconnect_cleanup(state: &mut ChatState, conn_id: Uuid) {
    let Some(id) = state.registry.find_by_conn(conn_id) else {
        return;
    };
    let (name, active) = match state.registry.get_mut(id) {
        Some(session) => (session.name.clone(), session.active_group.take()),
        None => return,
    };

    for group in state.groups.memberships_of(id) {
        state.groups.remove_member(&group, id);
    }

    if let Some(group) = active {
        let leave_msg = format!(
            "{}{} has left our chat...\n{}",
            style::YELLOW,
            name,
            style::RESET
        );
        broadcast(state, &group, None, &leave_msg).await;
    }

    state.registry.clear(id);
    tracing::info!("Client {} dropped; memberships released", name);
}
