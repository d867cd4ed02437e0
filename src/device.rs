// MITTCFQ PER-DEVICE CONTEXT
// THE PENDING-REQUEST VIEWS OWNED BY THE FAIR-QUEUEING SCHEDULER:
//   DRIVER LIST:   REQUESTS IN FLIGHT ON THE DEVICE, DISPATCH ORDER
//   DEVICE QUEUE:  DISPATCHABLE BUT NOT YET DISPATCHED, POSITION ORDER
//   GROUPS:        PER-CGROUP SERVICE TREES OF PER-PROCESS QUEUES
//
// ONE CONTEXT PER DEVICE, PASSED BY REFERENCE. NO GLOBAL STATE.
// THE ESTIMATOR ONLY BORROWS ITERATORS FROM HERE.

use std::collections::{BTreeMap, VecDeque};

// (POSITION OR SERVICE KEY, INSERTION SEQUENCE). SEQUENCE BREAKS TIES.
pub type SortKey = (u64, u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingRequest {
    pub pos: u64,
    pub sectors: u64,
}

impl PendingRequest {
    pub fn new(pos: u64, sectors: u64) -> Self {
        Self { pos, sectors }
    }

    // FIRST SECTOR AFTER THIS REQUEST: WHERE THE HEAD ENDS UP
    #[inline]
    pub fn end(&self) -> u64 {
        self.pos.saturating_add(self.sectors)
    }
}

// --- DRIVER / IN-FLIGHT TIER ---

#[derive(Default)]
pub struct DriverList {
    inflight: VecDeque<PendingRequest>,
}

impl DriverList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(&mut self, rq: PendingRequest) {
        self.inflight.push_back(rq);
    }

    // COMPLETIONS MAY ARRIVE OUT OF DISPATCH ORDER (NCQ). REMOVE THE OLDEST MATCH.
    pub fn complete(&mut self, pos: u64) -> Option<PendingRequest> {
        let idx = self.inflight.iter().position(|rq| rq.pos == pos)?;
        self.inflight.remove(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingRequest> {
        self.inflight.iter()
    }

    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }
}

// --- DEVICE-PENDING TIER ---

#[derive(Default)]
pub struct DeviceQueue {
    sorted: BTreeMap<SortKey, PendingRequest>,
    seq: u64,
}

impl DeviceQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rq: PendingRequest) -> SortKey {
        let key = (rq.pos, self.seq);
        self.seq += 1;
        self.sorted.insert(key, rq);
        key
    }

    pub fn remove(&mut self, key: &SortKey) -> Option<PendingRequest> {
        self.sorted.remove(key)
    }

    // NEXT REQUEST BY POSITION
    pub fn pop_first(&mut self) -> Option<PendingRequest> {
        self.sorted.pop_first().map(|(_, rq)| rq)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingRequest> {
        self.sorted.values()
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }
}

// --- PER-QUEUE STATE ---
// NAMED FLAGS, ONE BOOL EACH. SET/CLEAR/TEST THROUGH THE ENUM.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueFlag {
    OnRr,
    WaitRequest,
    MustDispatch,
    MustAllocSlice,
    FifoExpire,
    IdleWindow,
    PrioChanged,
    SliceNew,
    Sync,
    Coop,
    SplitCoop,
    Deep,
    WaitBusy,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFlags {
    on_rr: bool,
    wait_request: bool,
    must_dispatch: bool,
    must_alloc_slice: bool,
    fifo_expire: bool,
    idle_window: bool,
    prio_changed: bool,
    slice_new: bool,
    sync: bool,
    coop: bool,
    split_coop: bool,
    deep: bool,
    wait_busy: bool,
}

impl QueueFlags {
    fn slot(&mut self, flag: QueueFlag) -> &mut bool {
        match flag {
            QueueFlag::OnRr => &mut self.on_rr,
            QueueFlag::WaitRequest => &mut self.wait_request,
            QueueFlag::MustDispatch => &mut self.must_dispatch,
            QueueFlag::MustAllocSlice => &mut self.must_alloc_slice,
            QueueFlag::FifoExpire => &mut self.fifo_expire,
            QueueFlag::IdleWindow => &mut self.idle_window,
            QueueFlag::PrioChanged => &mut self.prio_changed,
            QueueFlag::SliceNew => &mut self.slice_new,
            QueueFlag::Sync => &mut self.sync,
            QueueFlag::Coop => &mut self.coop,
            QueueFlag::SplitCoop => &mut self.split_coop,
            QueueFlag::Deep => &mut self.deep,
            QueueFlag::WaitBusy => &mut self.wait_busy,
        }
    }

    pub fn set(&mut self, flag: QueueFlag) {
        *self.slot(flag) = true;
    }

    pub fn clear(&mut self, flag: QueueFlag) {
        *self.slot(flag) = false;
    }

    pub fn is(&self, flag: QueueFlag) -> bool {
        match flag {
            QueueFlag::OnRr => self.on_rr,
            QueueFlag::WaitRequest => self.wait_request,
            QueueFlag::MustDispatch => self.must_dispatch,
            QueueFlag::MustAllocSlice => self.must_alloc_slice,
            QueueFlag::FifoExpire => self.fifo_expire,
            QueueFlag::IdleWindow => self.idle_window,
            QueueFlag::PrioChanged => self.prio_changed,
            QueueFlag::SliceNew => self.slice_new,
            QueueFlag::Sync => self.sync,
            QueueFlag::Coop => self.coop,
            QueueFlag::SplitCoop => self.split_coop,
            QueueFlag::Deep => self.deep,
            QueueFlag::WaitBusy => self.wait_busy,
        }
    }
}

// --- PER-PROCESS QUEUE ---

pub struct CfqQueue {
    pub pid: u32,
    pub rb_key: u64,
    pub flags: QueueFlags,
    sort_list: BTreeMap<SortKey, PendingRequest>,
    seq: u64,
}

impl CfqQueue {
    pub fn new(pid: u32, rb_key: u64) -> Self {
        Self {
            pid,
            rb_key,
            flags: QueueFlags::default(),
            sort_list: BTreeMap::new(),
            seq: 0,
        }
    }

    pub fn add_request(&mut self, rq: PendingRequest) -> SortKey {
        let key = (rq.pos, self.seq);
        self.seq += 1;
        self.sort_list.insert(key, rq);
        key
    }

    pub fn remove_request(&mut self, key: &SortKey) -> Option<PendingRequest> {
        self.sort_list.remove(key)
    }

    pub fn next_request(&self) -> Option<&PendingRequest> {
        self.sort_list.values().next()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingRequest> {
        self.sort_list.values()
    }

    pub fn len(&self) -> usize {
        self.sort_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sort_list.is_empty()
    }
}

// --- SERVICE TREE ---
// ORDERED BY SERVICE KEY. LEFTMOST KEY CACHED SO first_key() IS O(1).

#[derive(Default)]
pub struct ServiceTree {
    queues: BTreeMap<SortKey, CfqQueue>,
    left: Option<SortKey>,
    seq: u64,
}

impl ServiceTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, queue: CfqQueue) -> SortKey {
        let key = (queue.rb_key, self.seq);
        self.seq += 1;
        if self.left.map_or(true, |left| key < left) {
            self.left = Some(key);
        }
        self.queues.insert(key, queue);
        key
    }

    pub fn remove(&mut self, key: &SortKey) -> Option<CfqQueue> {
        let queue = self.queues.remove(key)?;
        if self.left == Some(*key) {
            self.left = self.queues.keys().next().copied();
        }
        Some(queue)
    }

    pub fn first_key(&self) -> Option<SortKey> {
        self.left
    }

    pub fn first(&self) -> Option<&CfqQueue> {
        self.left.and_then(|key| self.queues.get(&key))
    }

    pub fn get_mut(&mut self, key: &SortKey) -> Option<&mut CfqQueue> {
        self.queues.get_mut(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CfqQueue> {
        self.queues.values()
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

// --- PER-CGROUP SERVICE TREE GRID ---

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkloadClass {
    BestEffort = 0,
    RealTime = 1,
    Idle = 2,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkloadType {
    Async = 0,
    SyncNoIdle = 1,
    Sync = 2,
}

// PRIORITY ORDER FOR TRAVERSAL: RT BEFORE BE BEFORE IDLE, SYNC FIRST
pub const CLASS_ORDER: [WorkloadClass; 3] = [
    WorkloadClass::RealTime,
    WorkloadClass::BestEffort,
    WorkloadClass::Idle,
];
pub const TYPE_ORDER: [WorkloadType; 3] = [
    WorkloadType::Sync,
    WorkloadType::SyncNoIdle,
    WorkloadType::Async,
];

pub struct CfqGroup {
    pub id: u32,
    pub weight: u32,
    service_trees: [[ServiceTree; 3]; 3],
}

impl CfqGroup {
    pub fn new(id: u32, weight: u32) -> Self {
        Self {
            id,
            weight,
            service_trees: std::array::from_fn(|_| std::array::from_fn(|_| ServiceTree::new())),
        }
    }

    pub fn service_tree(&self, class: WorkloadClass, wl: WorkloadType) -> &ServiceTree {
        &self.service_trees[class as usize][wl as usize]
    }

    pub fn service_tree_mut(&mut self, class: WorkloadClass, wl: WorkloadType) -> &mut ServiceTree {
        &mut self.service_trees[class as usize][wl as usize]
    }

    // EVERY QUEUE IN THE GROUP, PRIORITY ORDER, ASCENDING KEY WITHIN EACH TREE
    pub fn queues_by_priority(&self) -> impl Iterator<Item = &CfqQueue> {
        CLASS_ORDER.into_iter().flat_map(move |class| {
            TYPE_ORDER
                .into_iter()
                .flat_map(move |wl| self.service_tree(class, wl).iter())
        })
    }

    pub fn nr_queues(&self) -> usize {
        self.service_trees.iter().flatten().map(ServiceTree::len).sum()
    }
}

// --- DEVICE CONTEXT ---

#[derive(Default)]
pub struct DeviceContext {
    pub driver: DriverList,
    pub queue: DeviceQueue,
    groups: Vec<CfqGroup>,
    rq_completed_sector: u64,
}

impl DeviceContext {
    pub fn new() -> Self {
        Self::default()
    }

    // WHERE THE HEAD WAS LEFT BY THE LAST COMPLETION
    pub fn head_position(&self) -> u64 {
        self.rq_completed_sector
    }

    pub fn enqueue(&mut self, rq: PendingRequest) -> SortKey {
        self.queue.insert(rq)
    }

    // MOVE THE LOWEST-POSITION PENDING REQUEST ONTO THE DRIVER LIST
    pub fn dispatch_next(&mut self) -> Option<PendingRequest> {
        let rq = self.queue.pop_first()?;
        self.driver.dispatch(rq);
        Some(rq)
    }

    pub fn complete(&mut self, pos: u64) -> Option<PendingRequest> {
        let rq = self.driver.complete(pos)?;
        self.rq_completed_sector = rq.end();
        Some(rq)
    }

    pub fn add_group(&mut self, id: u32, weight: u32) -> &mut CfqGroup {
        if let Some(idx) = self.groups.iter().position(|g| g.id == id) {
            return &mut self.groups[idx];
        }
        self.groups.push(CfqGroup::new(id, weight));
        let last = self.groups.len() - 1;
        &mut self.groups[last]
    }

    pub fn group(&self, id: u32) -> Option<&CfqGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn group_mut(&mut self, id: u32) -> Option<&mut CfqGroup> {
        self.groups.iter_mut().find(|g| g.id == id)
    }

    pub fn groups(&self) -> impl Iterator<Item = &CfqGroup> {
        self.groups.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_queue_orders_by_position() {
        let mut q = DeviceQueue::new();
        q.insert(PendingRequest::new(300, 8));
        q.insert(PendingRequest::new(100, 8));
        q.insert(PendingRequest::new(200, 8));
        let order: Vec<u64> = q.iter().map(|rq| rq.pos).collect();
        assert_eq!(order, vec![100, 200, 300]);
    }

    #[test]
    fn device_queue_keeps_duplicate_positions() {
        let mut q = DeviceQueue::new();
        q.insert(PendingRequest::new(100, 8));
        q.insert(PendingRequest::new(100, 16));
        assert_eq!(q.len(), 2);
        // INSERTION ORDER PRESERVED AMONG EQUAL POSITIONS
        assert_eq!(q.pop_first().unwrap().sectors, 8);
        assert_eq!(q.pop_first().unwrap().sectors, 16);
    }

    #[test]
    fn service_tree_caches_leftmost() {
        let mut t = ServiceTree::new();
        let k50 = t.insert(CfqQueue::new(1, 50));
        assert_eq!(t.first_key(), Some(k50));
        let k10 = t.insert(CfqQueue::new(2, 10));
        assert_eq!(t.first_key(), Some(k10));
        t.insert(CfqQueue::new(3, 90));
        assert_eq!(t.first().unwrap().pid, 2);

        t.remove(&k10);
        assert_eq!(t.first_key(), Some(k50));
        t.remove(&k50);
        assert_eq!(t.first().unwrap().pid, 3);
    }

    #[test]
    fn service_tree_empty_has_no_leftmost() {
        let mut t = ServiceTree::new();
        let k = t.insert(CfqQueue::new(1, 5));
        t.remove(&k);
        assert!(t.first_key().is_none());
        assert!(t.is_empty());
    }

    #[test]
    fn queue_flags_set_clear() {
        let mut f = QueueFlags::default();
        assert!(!f.is(QueueFlag::IdleWindow));
        f.set(QueueFlag::IdleWindow);
        f.set(QueueFlag::Sync);
        assert!(f.is(QueueFlag::IdleWindow));
        assert!(f.is(QueueFlag::Sync));
        assert!(!f.is(QueueFlag::Coop));
        f.clear(QueueFlag::IdleWindow);
        assert!(!f.is(QueueFlag::IdleWindow));
        assert!(f.is(QueueFlag::Sync));
    }

    #[test]
    fn group_traversal_is_priority_ordered() {
        let mut g = CfqGroup::new(0, 500);
        g.service_tree_mut(WorkloadClass::Idle, WorkloadType::Sync)
            .insert(CfqQueue::new(3, 0));
        g.service_tree_mut(WorkloadClass::BestEffort, WorkloadType::Async)
            .insert(CfqQueue::new(2, 0));
        g.service_tree_mut(WorkloadClass::BestEffort, WorkloadType::Sync)
            .insert(CfqQueue::new(1, 0));
        g.service_tree_mut(WorkloadClass::RealTime, WorkloadType::Sync)
            .insert(CfqQueue::new(0, 0));
        let pids: Vec<u32> = g.queues_by_priority().map(|q| q.pid).collect();
        assert_eq!(pids, vec![0, 1, 2, 3]);
        assert_eq!(g.nr_queues(), 4);
    }

    #[test]
    fn completion_moves_head() {
        let mut dev = DeviceContext::new();
        dev.enqueue(PendingRequest::new(1000, 8));
        dev.enqueue(PendingRequest::new(10, 8));
        assert_eq!(dev.dispatch_next().unwrap().pos, 10);
        assert_eq!(dev.driver.len(), 1);
        assert_eq!(dev.queue.len(), 1);

        assert!(dev.complete(10).is_some());
        assert_eq!(dev.head_position(), 18);
        assert!(dev.driver.is_empty());
        // UNKNOWN COMPLETION LEAVES THE HEAD ALONE
        assert!(dev.complete(77).is_none());
        assert_eq!(dev.head_position(), 18);
    }

    #[test]
    fn add_group_is_idempotent() {
        let mut dev = DeviceContext::new();
        dev.add_group(7, 100);
        dev.add_group(7, 900);
        assert_eq!(dev.groups().count(), 1);
        assert_eq!(dev.group(7).unwrap().weight, 100);
    }
}
