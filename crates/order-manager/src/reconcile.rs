//! Order reconciliation
//!
//! Merges an authoritative remote order list into the local order table.
//!
//! ```text
//!  remote order ──► match local by exchange id, then by client order id
//!                     │ found     → apply status/fill unless local is newer
//!                     │ not found → adopt (open orders only)
//!  local open order not in report ──► Unknown
//!  Unknown order not in report ──► per-order lookup ──► Filled / Cancelled / ...
//! ```
//!
//! Applying the same report twice changes nothing the second time.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tiller_core::{
    DomainResult, Order, OrderId, OrderStatus, OrderType, Quantity, Symbol, Timestamp,
};
use tiller_gateway::{RemoteOrder, RemoteOrderStatus};
use uuid::Uuid;

/// What one reconciliation pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshReport {
    /// Remote orders added to the local table
    pub adopted: usize,
    /// Local orders whose status or fill changed
    pub updated: usize,
    /// Local orders missing from the report and now `Unknown`
    pub marked_unknown: usize,
    /// Remote updates ignored because local state was newer
    pub skipped_stale: usize,
    /// `Unknown` orders settled by a direct status lookup
    pub resolved: usize,
}

/// Apply a remote status and cumulative fill to `order`.
///
/// Terminal local orders are final and never change. Transitions the
/// lifecycle does not allow (e.g. `Open -> Rejected`) are logged and
/// ignored. Returns true if the order changed.
pub(crate) fn apply_remote_progress(
    order: &mut Order,
    status: RemoteOrderStatus,
    filled: Quantity,
    at: Timestamp,
) -> DomainResult<bool> {
    if order.status().is_terminal() {
        return Ok(false);
    }
    let mut changed = false;

    // A fill report without quantities still means the whole order
    let cumulative = if status == RemoteOrderStatus::Filled {
        filled.max(order.quantity)
    } else {
        filled
    };
    if cumulative > order.filled_quantity() && order.status() != OrderStatus::Pending {
        changed |= order.record_fill(cumulative, at)?;
    }

    let target = status.to_order_status();
    match target {
        OrderStatus::Open | OrderStatus::Cancelled if order.status().can_transition_to(target) => {
            changed |= order.transition(target, at)?;
        }
        OrderStatus::Rejected if order.status().can_transition_to(target) => {
            order.reject("rejected by exchange", at)?;
            changed = true;
        }
        OrderStatus::Open | OrderStatus::PartiallyFilled | OrderStatus::Filled => {}
        _ if order.status() != target => {
            warn!(
                "[REFRESH] ignoring remote {:?} for order {} in {:?}",
                status,
                order.id(),
                order.status()
            );
        }
        _ => {}
    }
    Ok(changed)
}

/// Outcome of merging one remote order into its local counterpart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Merge {
    Updated,
    Unchanged,
    /// Local state was newer than the remote view
    Stale,
}

/// Merge one remote order into the matching local order.
///
/// Last write wins: a local change after `issued_at`, or a remote update
/// older than the one already applied, leaves the order untouched.
pub(crate) fn merge_remote(
    order: &mut Order,
    remote: &RemoteOrder,
    issued_at: Timestamp,
    now: Timestamp,
) -> DomainResult<Merge> {
    let local_newer = order.updated_at() > issued_at;
    let remote_older = matches!(
        (remote.updated_at, order.exchange_updated_at()),
        (Some(remote_ts), Some(local_ts)) if remote_ts < local_ts
    );
    if local_newer || remote_older {
        return Ok(Merge::Stale);
    }

    let mut changed = false;
    if order.exchange_order_id().is_none()
        && !order.status().is_terminal()
        && remote.status != RemoteOrderStatus::Rejected
    {
        order.acknowledge(&remote.exchange_order_id, now)?;
        changed = true;
    }
    changed |= apply_remote_progress(order, remote.status, remote.filled_quantity, now)?;
    if let Some(ts) = remote.updated_at {
        if order.exchange_updated_at() != Some(ts) {
            order.set_exchange_updated_at(ts);
        }
    }
    Ok(if changed { Merge::Updated } else { Merge::Unchanged })
}

/// Build a local order for a remote order the table has never seen
fn adopt(remote: &RemoteOrder, now: Timestamp) -> Option<Order> {
    let created = remote.updated_at.unwrap_or(now);
    let built = match (remote.order_type, remote.price) {
        (OrderType::Limit, Some(price)) => Order::limit(
            remote.symbol.clone(),
            remote.side,
            remote.quantity,
            price,
            created,
        ),
        (OrderType::Market, _) => {
            Order::market(remote.symbol.clone(), remote.side, remote.quantity, created)
        }
        (OrderType::Limit, None) => {
            warn!(
                "[REFRESH] remote limit order {} has no price, not adopted",
                remote.exchange_order_id
            );
            return None;
        }
    };
    match built {
        Ok(order) => Some(order),
        Err(e) => {
            warn!(
                "[REFRESH] remote order {} not adopted: {}",
                remote.exchange_order_id, e
            );
            None
        }
    }
}

/// Reconcile `orders` against `remote`.
///
/// `scope` limits which local orders the report is authoritative for (the
/// symbol the report was requested for, or all). `issued_at` is when the
/// report was requested; local orders touched after it are left alone.
pub(crate) fn reconcile(
    orders: &mut HashMap<OrderId, Order>,
    remote: &[RemoteOrder],
    scope: Option<&Symbol>,
    issued_at: Timestamp,
    now: Timestamp,
) -> DomainResult<RefreshReport> {
    let mut report = RefreshReport::default();
    let in_scope = |symbol: &Symbol| scope.is_none_or(|s| s == symbol);

    let by_exchange_id: HashMap<String, OrderId> = orders
        .values()
        .filter_map(|o| o.exchange_order_id().map(|ex| (ex.to_string(), o.id())))
        .collect();

    let mut seen: HashSet<OrderId> = HashSet::new();

    for r in remote.iter().filter(|r| in_scope(&r.symbol)) {
        let local_id = by_exchange_id.get(&r.exchange_order_id).copied().or_else(|| {
            r.client_order_id
                .as_deref()
                .and_then(|c| Uuid::parse_str(c).ok())
                .filter(|id| orders.contains_key(id))
        });

        let Some(id) = local_id else {
            if r.status.is_terminal() {
                continue;
            }
            if let Some(mut order) = adopt(r, now) {
                order.acknowledge(&r.exchange_order_id, now)?;
                apply_remote_progress(&mut order, r.status, r.filled_quantity, now)?;
                if let Some(ts) = r.updated_at {
                    order.set_exchange_updated_at(ts);
                }
                debug!(
                    "[REFRESH] adopted remote order {} as {}",
                    r.exchange_order_id,
                    order.id()
                );
                seen.insert(order.id());
                orders.insert(order.id(), order);
                report.adopted += 1;
            }
            continue;
        };

        seen.insert(id);
        let Some(order) = orders.get_mut(&id) else {
            continue;
        };

        match merge_remote(order, r, issued_at, now)? {
            Merge::Updated => report.updated += 1,
            Merge::Stale => report.skipped_stale += 1,
            Merge::Unchanged => {}
        }
    }

    // Open locally but absent from the exchange's list
    for order in orders.values_mut() {
        if seen.contains(&order.id()) || !in_scope(&order.symbol) {
            continue;
        }
        if !matches!(
            order.status(),
            OrderStatus::Pending | OrderStatus::Open | OrderStatus::PartiallyFilled
        ) {
            continue;
        }
        if order.updated_at() > issued_at {
            report.skipped_stale += 1;
            continue;
        }
        order.transition(OrderStatus::Unknown, now)?;
        report.marked_unknown += 1;
    }

    Ok(report)
}
