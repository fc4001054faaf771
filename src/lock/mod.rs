//! Hierarchical read/write locks over namespace paths.
//!
//! Locking a path locks every ancestor along with it: a shared request
//! takes intent-shared on each ancestor and shared on the target, an
//! exclusive request takes intent-exclusive on each ancestor and exclusive
//! on the target. Two requests conflict exactly when their paths are
//! related (one a subpath of the other) and at least one is exclusive.
//!
//! Lock state lives on an explicit tree mirroring the path hierarchy. Each
//! node carries mode counts and a FIFO wait queue; requests acquire nodes
//! top-down, which rules out deadlock, and never pass a non-empty queue,
//! which keeps arrival order fair and prevents writer starvation. A caller
//! holding several path locks at once must have acquired them in ascending
//! path order.


use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::path::DfsPath;

/// Per-node acquisition modes, in increasing strength.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Mode {
    /// A shared request passing through on its way to a descendant.
    IntentShared,
    /// An exclusive request passing through on its way to a descendant.
    IntentExclusive,
    /// A shared request's target.
    Shared,
    /// An exclusive request's target.
    Exclusive,
}

/// Counts of granted modes at one node.
#[derive(Debug, Default)]
struct Holds {
    intent_shared: usize,
    intent_exclusive: usize,
    shared: usize,
    exclusive: usize,
}

impl Holds {
    /// True iff `mode` may be granted alongside the current holders.
    fn admits(&self, mode: Mode) -> bool {
        match mode {
            Mode::IntentShared => self.exclusive == 0,
            Mode::IntentExclusive => self.shared == 0 && self.exclusive == 0,
            Mode::Shared => self.intent_exclusive == 0 && self.exclusive == 0,
            Mode::Exclusive => {
                self.intent_shared == 0
                    && self.intent_exclusive == 0
                    && self.shared == 0
                    && self.exclusive == 0
            }
        }
    }

    fn add(&mut self, mode: Mode) {
        *self.slot(mode) += 1;
    }

    fn remove(&mut self, mode: Mode) {
        let slot = self.slot(mode);
        debug_assert!(*slot > 0, "releasing a mode that is not held");
        *slot = slot.saturating_sub(1);
    }

    fn held(&self, mode: Mode) -> bool {
        match mode {
            Mode::IntentShared => self.intent_shared > 0,
            Mode::IntentExclusive => self.intent_exclusive > 0,
            Mode::Shared => self.shared > 0,
            Mode::Exclusive => self.exclusive > 0,
        }
    }

    fn slot(&mut self, mode: Mode) -> &mut usize {
        match mode {
            Mode::IntentShared => &mut self.intent_shared,
            Mode::IntentExclusive => &mut self.intent_exclusive,
            Mode::Shared => &mut self.shared,
            Mode::Exclusive => &mut self.exclusive,
        }
    }

    fn is_clear(&self) -> bool {
        self.intent_shared == 0
            && self.intent_exclusive == 0
            && self.shared == 0
            && self.exclusive == 0
    }
}

/// A queued request waiting for one node.
struct Waiter {
    id: u64,
    mode: Mode,
    grant: oneshot::Sender<()>,
}

/// One node of the lock tree.
#[derive(Default)]
struct LockNode {
    children: HashMap<String, LockNode>,
    holds: Holds,
    queue: VecDeque<Waiter>,
}

impl LockNode {
    fn is_empty(&self) -> bool {
        self.holds.is_clear() && self.queue.is_empty() && self.children.is_empty()
    }
}

struct State {
    root: LockNode,
    next_id: u64,
    closed: bool,
}

/// The hierarchical lock manager.
///
/// All methods take `&self`; the internal monitor is held only for short
/// critical sections and never across an await point.
pub struct LockManager {
    state: Mutex<State>,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager {
    pub fn new() -> LockManager {
        LockManager {
            state: Mutex::new(State { root: LockNode::default(), next_id: 0, closed: false }),
        }
    }

    /// Acquires `path` in the requested mode, suspending while any earlier
    /// conflicting request is queued or held.
    ///
    /// Fails with [`Error::Cancelled`] if the manager shuts down while the
    /// request waits. Dropping the returned future mid-wait dequeues the
    /// request and releases every ancestor mode it had already taken.
    pub async fn lock(&self, path: &DfsPath, exclusive: bool) -> Result<()> {
        let depth = path.depth();
        let mut acquired = 0usize;
        loop {
            let pending = {
                let mut guard = self.state.lock().expect("lock manager poisoned");
                let state = &mut *guard;
                if state.closed {
                    Self::release_prefix(state, path, acquired, exclusive);
                    return Err(Error::Cancelled);
                }
                let mut pending = None;
                while acquired <= depth {
                    let mode = Self::mode_at(acquired, depth, exclusive);
                    let node = Self::node_entry(&mut state.root, path, acquired);
                    if node.queue.is_empty() && node.holds.admits(mode) {
                        node.holds.add(mode);
                        acquired += 1;
                    } else {
                        let id = state.next_id;
                        state.next_id += 1;
                        let (grant, rx) = oneshot::channel();
                        node.queue.push_back(Waiter { id, mode, grant });
                        pending = Some((id, rx));
                        break;
                    }
                }
                pending
            };

            let Some((id, rx)) = pending else {
                return Ok(());
            };

            let mut wait = WaitGuard { manager: self, path, exclusive, acquired, id, rx, done: false };
            match (&mut wait.rx).await {
                Ok(()) => {
                    wait.done = true;
                    acquired += 1;
                }
                // The grant sender was dropped: shutdown drained the
                // queue. The guard releases the prefix we already hold.
                Err(_) => return Err(Error::Cancelled),
            }
        }
    }

    /// Acquires `path` and returns a guard that releases it on drop.
    pub async fn lock_guard(&self, path: &DfsPath, exclusive: bool) -> Result<LockGuard<'_>> {
        self.lock(path, exclusive).await?;
        Ok(LockGuard { manager: self, path: path.clone(), exclusive })
    }

    /// Releases `path` from the requested mode.
    ///
    /// Fails with [`Error::InvalidArgument`] if the path is not currently
    /// held in that mode.
    pub fn unlock(&self, path: &DfsPath, exclusive: bool) -> Result<()> {
        let depth = path.depth();
        let mut guard = self.state.lock().expect("lock manager poisoned");
        let state = &mut *guard;

        let mut node = &state.root;
        for index in 0..=depth {
            if !node.holds.held(Self::mode_at(index, depth, exclusive)) {
                return Err(Error::InvalidArgument(format!(
                    "{path} is not locked {}",
                    if exclusive { "exclusively" } else { "for shared access" }
                )));
            }
            if index < depth {
                let name = path.components().nth(index).expect("component within depth");
                match node.children.get(name) {
                    Some(child) => node = child,
                    None => {
                        return Err(Error::InvalidArgument(format!("{path} is not locked")));
                    }
                }
            }
        }

        Self::release_prefix(state, path, depth + 1, exclusive);
        Ok(())
    }

    /// Cancels every waiting request and refuses all future ones.
    ///
    /// Current holders may still unlock.
    pub fn shutdown(&self) {
        let mut guard = self.state.lock().expect("lock manager poisoned");
        guard.closed = true;
        Self::drain(&mut guard.root);
    }

    /// Mode a request needs at the node `index` components below the root.
    fn mode_at(index: usize, depth: usize, exclusive: bool) -> Mode {
        match (index == depth, exclusive) {
            (true, true) => Mode::Exclusive,
            (true, false) => Mode::Shared,
            (false, true) => Mode::IntentExclusive,
            (false, false) => Mode::IntentShared,
        }
    }

    /// The lock node `index` components along `path`, created on demand.
    fn node_entry<'a>(root: &'a mut LockNode, path: &DfsPath, index: usize) -> &'a mut LockNode {
        let mut node = root;
        for component in path.components().take(index) {
            node = node.children.entry(component.to_owned()).or_default();
        }
        node
    }

    /// Releases the first `count` node modes of a request on `path` and
    /// wakes whatever the releases admit. Emptied nodes are pruned.
    fn release_prefix(state: &mut State, path: &DfsPath, count: usize, exclusive: bool) {
        if count == 0 {
            return;
        }
        let components: Vec<&str> = path.components().collect();
        Self::release_rec(&mut state.root, &components, 0, count, components.len(), exclusive);
    }

    fn release_rec(
        node: &mut LockNode,
        components: &[&str],
        index: usize,
        count: usize,
        depth: usize,
        exclusive: bool,
    ) {
        if index + 1 < count {
            let name = components[index];
            if let Some(child) = node.children.get_mut(name) {
                Self::release_rec(child, components, index + 1, count, depth, exclusive);
                if child.is_empty() {
                    node.children.remove(name);
                }
            }
        }
        node.holds.remove(Self::mode_at(index, depth, exclusive));
        Self::pump(node);
    }

    /// Grants queued requests from the head of `node`'s queue for as long
    /// as they are admissible.
    fn pump(node: &mut LockNode) {
        while let Some(head) = node.queue.front() {
            if !node.holds.admits(head.mode) {
                break;
            }
            let waiter = node.queue.pop_front().expect("head exists");
            node.holds.add(waiter.mode);
            if waiter.grant.send(()).is_err() {
                // The waiting future was dropped between our pop and its
                // guard taking the monitor. Roll the grant back.
                node.holds.remove(waiter.mode);
            }
        }
    }

    fn drain(node: &mut LockNode) {
        node.queue.clear();
        for child in node.children.values_mut() {
            Self::drain(child);
        }
    }
}

/// Cleanup handle for a request parked in some node's queue.
///
/// If the owning future is dropped mid-wait this removes the queue entry
/// (or releases a grant that raced in) and gives back every prefix mode the
/// request had acquired.
struct WaitGuard<'a> {
    manager: &'a LockManager,
    path: &'a DfsPath,
    exclusive: bool,
    acquired: usize,
    id: u64,
    rx: oneshot::Receiver<()>,
    done: bool,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let mut guard = self.manager.state.lock().expect("lock manager poisoned");
        let state = &mut *guard;
        // try_recv under the monitor is atomic with respect to pump(): the
        // grant either landed (release it as held) or did not (drop the
        // queue entry).
        let granted = matches!(self.rx.try_recv(), Ok(()));
        if granted {
            LockManager::release_prefix(state, self.path, self.acquired + 1, self.exclusive);
        } else {
            let node = LockManager::node_entry(&mut state.root, self.path, self.acquired);
            node.queue.retain(|waiter| waiter.id != self.id);
            // Our entry may have been the head; whatever is next could be
            // admissible already.
            LockManager::pump(node);
            LockManager::release_prefix(state, self.path, self.acquired, self.exclusive);
        }
    }
}

/// A held path lock that releases itself on drop.
pub struct LockGuard<'a> {
    manager: &'a LockManager,
    path: DfsPath,
    exclusive: bool,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let _ = self.manager.unlock(&self.path, self.exclusive);
    }
}
