//! Sparse all-to-all exchange of trees.
//!
//! The input is a send queue keyed by destination rank; the output collects
//! what other ranks addressed to us, keyed by source rank. Items are routed
//! with Bruck's index algorithm: in round `k` every item whose ring distance
//! to its destination has bit `k` set moves `2^k` positions, so any item
//! arrives after at most `ceil(log2(size))` rounds.
//!
//! While in flight each item is wrapped as `D/<dest>/S/<src>/<payload>`.

use kvtree_core::Tree;
use tracing::{trace, warn};

use crate::comm::{Communicator, ReduceOp};
use crate::error::{ExchangeError, Result};
use crate::topology::{distance, hop_plan, partners, Direction};
use crate::transfer::sendrecv;

const DEST: &str = "D";
const SRC: &str = "S";

/// Queue `msg` for `rank`, merging it with anything already queued there.
pub fn send_queue_insert(queue: &mut Tree, rank: usize, msg: &Tree) {
    queue.get_or_insert(&rank.to_string()).merge(msg);
}

/// Run the exchange with every item travelling in `direction`.
///
/// Received items are merged into `recv`, which is not cleared first.
pub fn exchange_direction<C: Communicator + ?Sized>(
    comm: &C,
    send: &Tree,
    recv: &mut Tree,
    direction: Direction,
) -> Result<()> {
    exchange_direction_hops(comm, send, recv, direction, None)
}

/// Same as [`exchange_direction`], stopping after `hops` rounds when a limit
/// is given. Every member must pass the same limit.
///
/// Destinations are checked on every rank before the first round. If any
/// rank queued an item for a rank outside the group, the exchange fails on
/// every rank and nothing is sent.
pub fn exchange_direction_hops<C: Communicator + ?Sized>(
    comm: &C,
    send: &Tree,
    recv: &mut Tree,
    direction: Direction,
    hops: Option<usize>,
) -> Result<()> {
    let local = wrap_items(comm, send);
    let healthy = comm.all_true(local.is_ok())?;
    let current = local?;
    if !healthy {
        return Err(ExchangeError::Aborted);
    }
    run_rounds(comm, current, recv, direction, hops)
}

/// Deliver each queued item to its destination rank, merging what arrives
/// into `recv` keyed by source rank.
///
/// Each item travels in whichever direction needs fewer forwards (ties go
/// right), and each direction runs only as many rounds as the group needs.
pub fn exchange<C: Communicator + ?Sized>(comm: &C, send: &Tree, recv: &mut Tree) -> Result<()> {
    let local = split_by_direction(comm, send);

    // [left steps, right steps, failed]
    let mut summary = [0u64; 3];
    match &local {
        Ok(split) => summary[..2].copy_from_slice(&split.steps),
        Err(_) => summary[2] = 1,
    }
    let all = comm.allreduce(&summary, ReduceOp::Max)?;
    let split = local?;
    if all[2] != 0 {
        return Err(ExchangeError::Aborted);
    }

    run_rounds(comm, split.left, recv, Direction::Left, Some(all[0] as usize))?;
    run_rounds(comm, split.right, recv, Direction::Right, Some(all[1] as usize))
}

/// Items wrapped for travel, one tree per direction
struct Split {
    left: Tree,
    right: Tree,
    steps: [u64; 2],
}

fn split_by_direction<C: Communicator + ?Sized>(comm: &C, send: &Tree) -> Result<Split> {
    let rank = comm.rank();
    let size = comm.size();
    let rank_key = rank.to_string();

    let mut split = Split {
        left: Tree::new(),
        right: Tree::new(),
        steps: [0; 2],
    };
    for elem in send.elements() {
        let dest = check_destination(comm, elem.key_int())?;
        let plan = hop_plan(rank, dest, size);
        let (side, slot) = match plan.direction() {
            Direction::Left => (&mut split.left, 0),
            Direction::Right => (&mut split.right, 1),
        };
        side.set_kv(DEST, &dest.to_string())
            .set_kv(SRC, &rank_key)
            .merge(elem.tree());
        split.steps[slot] = split.steps[slot].max(plan.steps() as u64);
    }
    Ok(split)
}

fn wrap_items<C: Communicator + ?Sized>(comm: &C, send: &Tree) -> Result<Tree> {
    let rank_key = comm.rank().to_string();
    let mut wrapped = Tree::new();
    for elem in send.elements() {
        let dest = check_destination(comm, elem.key_int())?;
        wrapped
            .set_kv(DEST, &dest.to_string())
            .set_kv(SRC, &rank_key)
            .merge(elem.tree());
    }
    Ok(wrapped)
}

fn check_destination<C: Communicator + ?Sized>(comm: &C, dest: i32) -> Result<usize> {
    comm.check_rank(i64::from(dest)).map_err(|e| {
        warn!(
            target: "kvtree::exchange",
            rank = comm.rank(),
            dest,
            "Item addressed outside the group"
        );
        e
    })
}

/// Forward wrapped items for up to `hops` rounds. Every destination in
/// `current` must already be a member of the group.
fn run_rounds<C: Communicator + ?Sized>(
    comm: &C,
    mut current: Tree,
    recv: &mut Tree,
    direction: Direction,
    hops: Option<usize>,
) -> Result<()> {
    let rank = comm.rank();
    let size = comm.size();
    let rank_key = rank.to_string();

    let mut bit = 1usize;
    let mut step = 1usize;
    let mut round = 0usize;
    while step < size && hops.map_or(true, |limit| round < limit) {
        let (dst, src) = partners(rank, size, step, direction);

        let mut keep = Tree::new();
        let mut outgoing = Tree::new();
        if let Some(dests) = current.get(DEST) {
            for elem in dests.elements() {
                let dest = elem.key_int() as usize;
                if dest == rank {
                    if let Some(sources) = elem.tree().get(SRC) {
                        recv.merge(sources);
                    }
                } else if distance(rank, dest, size, direction) & bit != 0 {
                    outgoing.set_kv(DEST, elem.key()).merge(elem.tree());
                } else {
                    keep.set_kv(DEST, elem.key()).merge(elem.tree());
                }
            }
        }

        trace!(
            target: "kvtree::exchange",
            rank,
            round,
            dst,
            src,
            forwarded = outgoing.get(DEST).map_or(0, Tree::size),
            "exchange round"
        );

        let mut incoming = Tree::new();
        sendrecv(comm, &outgoing, Some(dst), &mut incoming, Some(src))?;
        keep.merge(&incoming);
        current = keep;

        bit <<= 1;
        step *= 2;
        round += 1;
    }

    if let Some(sources) = current.get_kv(DEST, &rank_key).and_then(|t| t.get(SRC)) {
        recv.merge(sources);
    }
    Ok(())
}
