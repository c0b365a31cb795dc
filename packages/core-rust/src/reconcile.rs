//! Merging canonical snapshots with pending optimistic mutations.
//!
//! The room `seqno` totally orders every mutation the server has committed.
//! A snapshot taken at `seqno = S` therefore already contains every mutation
//! acknowledged with a seqno `<= S`. For each message the reconciler:
//!
//! 1. collects the cached mutations targeting that message,
//! 2. prunes those acknowledged at or below the snapshot seqno (they are
//!    already in the snapshot, overlaying them again would double-count),
//! 3. overlays everything else, oldest first, onto a copy of the snapshot.
//!
//! Unacknowledged mutations cannot be proven included and are always
//! overlaid, as are mutations acknowledged above `S` (the snapshot predates
//! them). None of this depends on whether the ack or the poll arrived first.
//!
//! Pending mutations are never collapsed: an add followed by a remove of the
//! same emoji are two server operations, each pruned on its own seqno.
//!
//! # Extending to new change types
//!
//! The prune/fold skeleton is [`reconcile_with`]. A new change type supplies
//! an [`Overlay`] impl for its view type and a thin wrapper like
//! [`reconcile`] that picks its own variant out of [`MutationMetadata`].

use tracing::debug;

use crate::cache::{MutationCache, PendingMutation};
use crate::mutation::{MutationMetadata, ReactionMetadata};
use crate::snapshot::{MessageSnapshot, ReactionMap, ReactionSummary};
use crate::types::Action;

/// Applies one pending mutation to a derived view of server state.
pub trait Overlay<V> {
    /// Folds `self` into `view` on behalf of the local user `we_are`.
    fn overlay(&self, view: &mut V, we_are: &str);
}

impl Overlay<ReactionMap> for ReactionMetadata {
    fn overlay(&self, view: &mut ReactionMap, we_are: &str) {
        match self.action {
            Action::Add => {
                let next_index = view
                    .values()
                    .map(|s| s.index.saturating_add(1))
                    .max().unwrap_or(0);
                let summary = view
                    .entry(self.emoji.clone())
                    .or_insert_with(|| ReactionSummary {
                        index: next_index,
                        ..ReactionSummary::default()
                    });
                if !reacted(summary, we_are) {
                    summary.reactors.insert(we_are.to_string());
                    summary.count = summary.count.saturating_add(1);
                    summary.you = true;
                }
            }
            Action::Remove => {
                let Some(summary) = view.get_mut(&self.emoji) else {
                    return;
                };
                if !reacted(summary, we_are) {
                    return;
                }
                summary.reactors.remove(we_are);
                summary.count = summary.count.saturating_sub(1);
                summary.you = false;
                if summary.count == 0 {
                    view.remove(&self.emoji);
                }
            }
        }
    }
}

/// Whether the local user already counts among the reactors.
///
/// The server truncates `reactors`, so the `you` flag is trusted as well.
fn reacted(summary: &ReactionSummary, we_are: &str) -> bool {
    summary.you || summary.reactors.contains(we_are)
}

/// Result of one reconcile pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome<V> {
    /// Server state with still-pending mutations overlaid.
    pub effective: V,
    /// Entries removed from the cache because the snapshot already reflects them.
    pub pruned: usize,
    /// Entries overlaid onto the snapshot.
    pub overlaid: usize,
}

/// Returns true if a mutation is already reflected in a snapshot taken at `snapshot_seqno`.
#[must_use]
pub fn is_resolved(pending: &PendingMutation, snapshot_seqno: u64) -> bool {
    pending.entry.seqno.is_some_and(|n| n <= snapshot_seqno)
}

/// Generic reconcile skeleton shared by every change type.
///
/// `apply` folds one still-pending entry into the view and returns whether it
/// applied (entries of other change types for the same message return false).
pub fn reconcile_with<V, F>(
    cache: &mut MutationCache,
    server: &str,
    room: &str,
    message_id: u64,
    snapshot_seqno: u64,
    canonical: V,
    mut apply: F,
) -> ReconcileOutcome<V>
where
    F: FnMut(&MutationMetadata, &mut V) -> bool,
{
    let relevant = cache.pending_for(server, room, message_id);
    let (resolved, still_pending): (Vec<_>, Vec<_>) = relevant
        .into_iter()
        .partition(|p| is_resolved(p, snapshot_seqno));

    for pending in &resolved {
        cache.remove(pending.handle);
    }

    let mut effective = canonical;
    let mut overlaid = 0;
    for pending in &still_pending {
        if apply(&pending.entry.metadata, &mut effective) {
            overlaid += 1;
        }
    }

    if !resolved.is_empty() || overlaid > 0 {
        debug!(
            server,
            room,
            message_id,
            snapshot_seqno,
            pruned = resolved.len(),
            overlaid,
            "reconciled message"
        );
    }

    ReconcileOutcome {
        effective,
        pruned: resolved.len(),
        overlaid,
    }
}

/// Reconciles one message's reactions, reporting prune/overlay counts.
pub fn reconcile_reactions(
    cache: &mut MutationCache,
    server: &str,
    room: &str,
    snapshot: &MessageSnapshot,
    we_are: &str,
) -> ReconcileOutcome<ReactionMap> {
    reconcile_with(
        cache,
        server,
        room,
        snapshot.id,
        snapshot.seqno,
        snapshot.reactions_or_empty(),
        |metadata, view| match metadata {
            MutationMetadata::Reactions(meta) => {
                meta.overlay(view, we_are);
                true
            }
        },
    )
}

/// Returns the effective reaction map for one message, pruning resolved
/// mutations from `cache` as a side effect.
///
/// Total: a snapshot without reaction data reconciles as "no reactions".
pub fn reconcile(
    cache: &mut MutationCache,
    server: &str,
    room: &str,
    snapshot: &MessageSnapshot,
    we_are: &str,
) -> ReactionMap {
    reconcile_reactions(cache, server, room, snapshot, we_are).effective
}
