//! Ring arithmetic for the sparse exchange.

/// Which way items travel around the ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward lower ranks, wrapping from 0 to `size - 1`
    Left,
    /// Toward higher ranks, wrapping from `size - 1` to 0
    Right,
}

/// Destination and source partners of `rank` for a round with the given
/// `step` distance.
pub fn partners(rank: usize, size: usize, step: usize, direction: Direction) -> (usize, usize) {
    let left = (rank + size - step % size) % size;
    let right = (rank + step) % size;
    match direction {
        Direction::Right => (right, left),
        Direction::Left => (left, right),
    }
}

/// Number of positions from `rank` to `dest` walking in `direction`.
pub fn distance(rank: usize, dest: usize, size: usize, direction: Direction) -> usize {
    match direction {
        Direction::Right => (dest + size - rank) % size,
        Direction::Left => (rank + size - dest) % size,
    }
}

/// Cost of delivering one item in each direction.
///
/// Hops count the rounds that forward the item; steps give the 1-based
/// round of the last forward, which bounds how many rounds are needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HopPlan {
    /// Forwards needed going left
    pub hops_left: usize,
    /// Forwards needed going right
    pub hops_right: usize,
    /// Last round that moves the item going left
    pub steps_left: usize,
    /// Last round that moves the item going right
    pub steps_right: usize,
}

impl HopPlan {
    /// Direction with fewer hops; ties go right.
    pub fn direction(&self) -> Direction {
        if self.hops_left < self.hops_right {
            Direction::Left
        } else {
            Direction::Right
        }
    }

    /// Rounds needed in the chosen direction.
    pub fn steps(&self) -> usize {
        match self.direction() {
            Direction::Left => self.steps_left,
            Direction::Right => self.steps_right,
        }
    }
}

/// Plan the delivery of an item from `rank` to `dest`.
pub fn hop_plan(rank: usize, dest: usize, size: usize) -> HopPlan {
    let dist_left = distance(rank, dest, size, Direction::Left);
    let dist_right = distance(rank, dest, size, Direction::Right);

    let mut plan = HopPlan::default();
    let mut bit = 1usize;
    let mut step = 1usize;
    while bit < size {
        if dist_left & bit != 0 {
            plan.hops_left += 1;
            plan.steps_left = step;
        }
        if dist_right & bit != 0 {
            plan.hops_right += 1;
            plan.steps_right = step;
        }
        bit <<= 1;
        step += 1;
    }
    plan
}
