//! The scheduling engine.
//!
//! `QueueCore` owns all scheduler state and implements the dmClock dispatch
//! discipline. Callers (the pull and push façades) serialize access through
//! one mutex and hand the engine an explicit `now`, so the engine itself is
//! single-threaded and clock-free.
//!
//! Dispatch is a two-phase decision evaluated fresh at every dequeue point:
//!
//! 1. **Reservation phase** — if the client with the smallest reservation
//!    tag is owed a request (tag in the past), it dispatches, labeled
//!    [`Phase::Reservation`].
//! 2. **Proportional phase** — otherwise, requests whose limit tag has
//!    matured are promoted to ready, and the ready client with the smallest
//!    effective proportion tag dispatches, labeled [`Phase::Priority`]. A
//!    proportional dispatch hands back one unconsumed reservation credit
//!    (the client's remaining reservation tags are reduced), so a client
//!    served entirely by weight never accrues phantom reservation debt.
//!
//! When neither phase fires the engine reports the earliest future time at
//! which one could, so callers can sleep rather than poll.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;

use tracing::{debug, trace};

use crate::client::{ClientRec, ClientReq, ClientStore, SlotId, Tick};
use crate::config::QueueConfig;
use crate::index::{ClientIndex, View};
use crate::profile::ProfileFn;
use crate::tag::{ReqParams, RequestTag, TAG_MAX};
use crate::time::{min_not_zero, Time, TIME_MAX};

/// The label attached to a dispatched request: which phase released it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Dispatched to satisfy the client's reservation.
    Reservation,
    /// Dispatched from the surplus, by weight (or by limit break).
    Priority,
}

/// Counters and gauges describing a queue's activity.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStats {
    /// Live client records (idle ones included).
    pub active_clients: usize,
    /// Requests currently queued across all clients.
    pub pending_requests: usize,
    /// Requests dispatched through the reservation phase.
    pub reservation_dispatches: u64,
    /// Requests dispatched through the proportional phase.
    pub priority_dispatches: u64,
}

/// Outcome of a dispatch decision.
pub(crate) enum NextReq {
    /// No client has a pending request.
    None,
    /// Nothing is eligible yet; something becomes eligible at this time.
    Future(Time),
    /// The top of the named phase's view should be dispatched now.
    Returning(Phase),
}

/// Wall-time / tick pair recorded by the cleaner each pass.
type MarkPoint = (Time, Tick);

/// The scheduler state machine. All methods expect the caller to hold the
/// façade's data lock.
pub(crate) struct QueueCore<C, R> {
    profile_of: ProfileFn<C>,
    clients: HashMap<C, SlotId>,
    store: ClientStore<C, R>,
    index: ClientIndex,
    allow_limit_break: bool,

    /// Bumped once per enqueue; the cleaner compares client ages against it.
    tick: Tick,
    mark_points: VecDeque<MarkPoint>,
    idle_age: f64,
    erase_age: f64,

    /// Dispatch counts, indexed by [`Phase`].
    dispatch_counts: [u64; 2],
}

impl<C, R> QueueCore<C, R>
where
    C: Eq + Hash + Clone + fmt::Debug,
{
    pub(crate) fn new(profile_of: ProfileFn<C>, config: &QueueConfig) -> Self {
        Self {
            profile_of,
            clients: HashMap::new(),
            store: ClientStore::new(),
            index: ClientIndex::new(config.use_heap),
            allow_limit_break: config.allow_limit_break,
            tick: 0,
            mark_points: VecDeque::new(),
            idle_age: config.idle_age.as_secs_f64(),
            erase_age: config.erase_age.as_secs_f64(),
            dispatch_counts: [0; 2],
        }
    }

    /// Tags `request` and appends it to its client's queue, creating the
    /// client record on first contact.
    pub(crate) fn add_request(
        &mut self,
        request: R,
        client_id: C,
        params: ReqParams,
        time: Time,
        cost: f64,
    ) {
        self.tick += 1;

        let slot = match self.clients.get(&client_id) {
            Some(&slot) => slot,
            None => {
                let profile = (self.profile_of)(&client_id);
                trace!(client = ?client_id, ?profile, "registering client");
                let slot = self
                    .store
                    .insert(ClientRec::new(client_id.clone(), profile, self.tick));
                self.index.push(slot, &mut self.store);
                self.clients.insert(client_id, slot);
                slot
            }
        };

        if self.store.get(slot).idle {
            self.reactivate(slot, time);
        }

        let rec = self.store.get_mut(slot);
        let tag = RequestTag::new(&rec.prev_tag, &rec.profile, params, time, cost);
        rec.prev_tag = tag;
        rec.last_tick = self.tick;
        let client = rec.client.clone();
        rec.push_request(ClientReq {
            tag,
            client,
            request,
        });

        self.index.adjust(slot, &mut self.store);
    }

    /// Re-baselines an idle client's proportion tag against the clients
    /// currently contending, then clears the idle flag.
    ///
    /// Without this, a reactivating client would compete with a proportion
    /// tag clamped to `now` while the established clients' tags sit wherever
    /// sustained service pushed them, and whichever side is behind would
    /// monopolize the proportional phase.
    fn reactivate(&mut self, slot: SlotId, now: Time) {
        let mut lowest: Option<f64> = None;
        for (_, rec) in self.store.iter() {
            // The reactivating client is itself still flagged idle here, so
            // this also skips it.
            if rec.idle {
                continue;
            }
            if let Some(front) = rec.next_request() {
                let p = front.tag.proportion + rec.prop_delta;
                lowest = Some(lowest.map_or(p, |v: f64| v.min(p)));
            }
        }

        let rec = self.store.get_mut(slot);
        if let Some(min_p) = lowest {
            rec.prop_delta = min_p - now;
            debug!(client = ?rec.client, prop_delta = rec.prop_delta, "client reactivated");
        }
        rec.idle = false;
    }

    /// The dispatch decision, evaluated at `now`. May promote limit-matured
    /// requests to ready as a side effect.
    pub(crate) fn next_request(&mut self, now: Time) -> NextReq {
        if self.index.is_empty() {
            return NextReq::None;
        }

        // Reservation phase: the smallest reservation tag, if owed.
        if let Some(front) = self.front_of(View::Reservation) {
            if front.tag.reservation <= now {
                return NextReq::Returning(Phase::Reservation);
            }
        }

        // Promote everything whose limit tag has matured. Each promotion
        // moves the client out of the limit view's preferred region, so the
        // loop terminates once the limit top is ready or still capped.
        while let Some(slot) = self.index.top(View::Limit) {
            let matured = match self.store.get(slot).next_request() {
                Some(front) => !front.tag.ready && front.tag.limit <= now,
                None => false,
            };
            if !matured {
                break;
            }
            self.store.get_mut(slot).mark_front_ready();
            self.index.promote_ready(slot, &mut self.store);
        }

        // Proportional phase: the smallest effective proportion tag among
        // ready requests.
        if let Some(front) = self.front_of(View::Ready) {
            if front.tag.ready && front.tag.proportion < TAG_MAX {
                return NextReq::Returning(Phase::Priority);
            }
        }

        // Limit break: everything is capped, but the server is idle. Prefer
        // the proportional ordering; fall back to reservation.
        if self.allow_limit_break {
            if let Some(front) = self.front_of(View::Ready) {
                if front.tag.proportion < TAG_MAX {
                    return NextReq::Returning(Phase::Priority);
                }
            }
            if let Some(front) = self.front_of(View::Reservation) {
                if front.tag.reservation < TAG_MAX {
                    return NextReq::Returning(Phase::Reservation);
                }
            }
        }

        // Nothing eligible: report when the picture next changes. A ready
        // front at the limit top contributes nothing (its limit deadline has
        // already matured; only a reservation can release it).
        let mut next_call = TIME_MAX;
        if let Some(front) = self.front_of(View::Reservation) {
            next_call = min_not_zero(next_call, front.tag.reservation);
        }
        if let Some(front) = self.front_of(View::Limit) {
            if !front.tag.ready {
                next_call = min_not_zero(next_call, front.tag.limit);
            }
        }
        if next_call < TIME_MAX {
            NextReq::Future(next_call)
        } else {
            NextReq::None
        }
    }

    /// Pops the front request of the client topping `phase`'s view.
    ///
    /// Only valid immediately after [`next_request`](Self::next_request)
    /// returned `Returning(phase)`.
    pub(crate) fn pop_top(&mut self, phase: Phase) -> (SlotId, C, R) {
        let view = match phase {
            Phase::Reservation => View::Reservation,
            Phase::Priority => View::Ready,
        };
        let slot = self.index.top(view).expect("dispatch from an empty queue");
        let req = self
            .store
            .get_mut(slot)
            .pop_request()
            .expect("dispatch from a client with no requests");
        self.index.demote(slot, &mut self.store);
        self.dispatch_counts[phase as usize] += 1;
        (slot, req.client, req.request)
    }

    /// Returns one reservation credit after a proportional dispatch: the
    /// client did not consume its reservation, so every remaining request's
    /// reservation tag (and the chain seed) steps back by one increment.
    pub(crate) fn reduce_reservation_tags(&mut self, slot: SlotId) {
        let rec = self.store.get_mut(slot);
        let reservation_inv = rec.profile.reservation_inv();
        if reservation_inv == 0.0 {
            return;
        }
        for req in &mut rec.requests {
            req.tag.reservation -= reservation_inv;
        }
        rec.prev_tag.reservation -= reservation_inv;
        self.index.promote_reservation(slot, &mut self.store);
    }

    /// Drains one client's pending requests, returning the payloads in
    /// submission order. Unknown clients yield an empty vec.
    pub(crate) fn remove_by_client(&mut self, client_id: &C) -> Vec<R> {
        let Some(&slot) = self.clients.get(client_id) else {
            return Vec::new();
        };
        let drained: Vec<R> = self
            .store
            .get_mut(slot)
            .requests
            .drain(..)
            .map(|req| req.request)
            .collect();
        if !drained.is_empty() {
            self.index.adjust(slot, &mut self.store);
        }
        drained
    }

    /// Removes every queued request matching `filter`, across all clients,
    /// returning the removed payloads. `backwards` visits each client's
    /// queue most-recent-first.
    pub(crate) fn remove_by_req_filter<F>(&mut self, mut filter: F, backwards: bool) -> Vec<R>
    where
        F: FnMut(&R) -> bool,
    {
        let mut out = Vec::new();
        let slots: Vec<SlotId> = self.clients.values().copied().collect();
        for slot in slots {
            let rec = self.store.get_mut(slot);
            let modified = if backwards {
                rec.remove_matching_backwards(&mut filter, &mut out)
            } else {
                rec.remove_matching(&mut filter, &mut out)
            };
            if modified {
                self.index.adjust(slot, &mut self.store);
            }
        }
        out
    }

    /// One cleaner pass at `now`: record a mark point, derive the erase and
    /// idle tick thresholds from aged-out mark points, then erase or
    /// idle-mark clients whose last enqueue predates them.
    pub(crate) fn clean(&mut self, now: Time) {
        self.mark_points.push_back((now, self.tick));

        let mut erase_point = 0;
        while let Some(&(time, tick)) = self.mark_points.front() {
            if time <= now - self.erase_age {
                erase_point = tick;
                self.mark_points.pop_front();
            } else {
                break;
            }
        }

        let mut idle_point = 0;
        for &(time, tick) in &self.mark_points {
            if time <= now - self.idle_age {
                idle_point = tick;
            } else {
                break;
            }
        }

        if erase_point == 0 && idle_point == 0 {
            return;
        }
        let entries: Vec<(C, SlotId)> = self
            .clients
            .iter()
            .map(|(client, &slot)| (client.clone(), slot))
            .collect();
        for (client_id, slot) in entries {
            let last_tick = self.store.get(slot).last_tick;
            if erase_point > 0 && last_tick <= erase_point {
                debug!(client = ?client_id, "erasing stale client");
                self.clients.remove(&client_id);
                self.index.remove(slot, &mut self.store);
                self.store.remove(slot);
            } else if idle_point > 0 && last_tick <= idle_point {
                let rec = self.store.get_mut(slot);
                if !rec.idle {
                    trace!(client = ?client_id, "marking client idle");
                    rec.idle = true;
                }
            }
        }
    }

    /// True when no client has a pending request.
    pub(crate) fn is_empty(&self) -> bool {
        // Clients with requests precede those without in every view, so an
        // empty-handed reservation top means nobody has work.
        match self.index.top(View::Reservation) {
            Some(slot) => !self.store.get(slot).has_request(),
            None => true,
        }
    }

    pub(crate) fn client_count(&self) -> usize {
        self.store.len()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.store.iter().map(|(_, rec)| rec.request_count()).sum()
    }

    pub(crate) fn stats(&self) -> QueueStats {
        QueueStats {
            active_clients: self.store.len(),
            pending_requests: self.request_count(),
            reservation_dispatches: self.dispatch_counts[Phase::Reservation as usize],
            priority_dispatches: self.dispatch_counts[Phase::Priority as usize],
        }
    }

    /// The front request's tag of the client topping `view`, if any.
    fn front_of(&self, view: View) -> Option<&ClientReq<C, R>> {
        let slot = self.index.top(view)?;
        self.store.get(slot).next_request()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ClientProfile;

    fn core_with(
        profiles: impl Fn(&u64) -> ClientProfile + Send + 'static,
        config: &QueueConfig,
    ) -> QueueCore<u64, u32> {
        QueueCore::new(Box::new(move |id| profiles(id)), config)
    }

    fn pull(core: &mut QueueCore<u64, u32>, now: Time) -> Option<(u64, u32, Phase)> {
        match core.next_request(now) {
            NextReq::Returning(phase) => {
                let (slot, client, request) = core.pop_top(phase);
                if phase == Phase::Priority {
                    core.reduce_reservation_tags(slot);
                }
                Some((client, request, phase))
            }
            _ => None,
        }
    }

    fn front_reservation(core: &QueueCore<u64, u32>, client: u64) -> Vec<f64> {
        let slot = core.clients[&client];
        core.store
            .get(slot)
            .requests
            .iter()
            .map(|req| req.tag.reservation)
            .collect()
    }

    #[test]
    fn test_reservation_phase_dispatch() {
        let mut core = core_with(|_| ClientProfile::new(2.0, 0.0, 0.0), &QueueConfig::for_testing());
        for i in 0..4 {
            core.add_request(i, 1, ReqParams::default(), 0.0, 0.0);
        }

        // First reservation tag is 1/r = 0.5 out.
        assert!(matches!(core.next_request(0.0), NextReq::Future(at) if at == 0.5));

        for (i, now) in [0.5, 1.0, 1.5, 2.0].into_iter().enumerate() {
            let (client, request, phase) = pull(&mut core, now).expect("reservation due");
            assert_eq!(client, 1);
            assert_eq!(request, i as u32);
            assert_eq!(phase, Phase::Reservation);
        }
        assert!(core.is_empty());
    }

    #[test]
    fn test_weight_only_dispatch_is_priority_phase() {
        let mut core = core_with(|_| ClientProfile::new(0.0, 1.0, 0.0), &QueueConfig::for_testing());
        core.add_request(7, 1, ReqParams::default(), 0.0, 0.0);

        let (client, request, phase) = pull(&mut core, 0.0).expect("uncapped request is ready");
        assert_eq!((client, request), (1, 7));
        assert_eq!(phase, Phase::Priority);
    }

    #[test]
    fn test_limit_defers_dispatch() {
        let mut core = core_with(|_| ClientProfile::new(0.0, 1.0, 2.0), &QueueConfig::for_testing());
        for i in 0..3 {
            core.add_request(i, 1, ReqParams::default(), 0.0, 0.0);
        }

        // Limit tags run 0.5, 1.0, 1.5.
        assert!(matches!(core.next_request(0.2), NextReq::Future(at) if at == 0.5));
        assert!(pull(&mut core, 0.2).is_none());

        assert!(pull(&mut core, 0.5).is_some());
        assert!(pull(&mut core, 0.6).is_none());
        assert!(pull(&mut core, 1.0).is_some());
        assert!(pull(&mut core, 1.5).is_some());
    }

    #[test]
    fn test_limit_break_releases_capped_requests() {
        let config = QueueConfig::for_testing().with_limit_break(true);
        let mut core = core_with(|_| ClientProfile::new(0.0, 1.0, 1.0), &config);
        for i in 0..3 {
            core.add_request(i, 1, ReqParams::default(), 0.0, 0.0);
        }

        // All three limit tags are in the future, but limit break lets them
        // through in proportion order.
        for (i, now) in [0.0, 0.1, 0.2].into_iter().enumerate() {
            let (_, request, phase) = pull(&mut core, now).expect("limit break dispatch");
            assert_eq!(request, i as u32);
            assert_eq!(phase, Phase::Priority);
        }
    }

    #[test]
    fn test_reservation_reduction_on_priority_dispatch() {
        let mut core = core_with(|_| ClientProfile::new(2.0, 1.0, 0.0), &QueueConfig::for_testing());
        for i in 0..3 {
            core.add_request(i, 1, ReqParams::default(), 0.0, 0.0);
        }
        // Reservation tags chain 0.5, 1.0, 1.5.
        assert_eq!(front_reservation(&core, 1), vec![0.5, 1.0, 1.5]);

        // At t=0 the reservation is not yet due, but the uncapped request is
        // ready: a priority dispatch.
        let (_, _, phase) = pull(&mut core, 0.0).expect("ready request");
        assert_eq!(phase, Phase::Priority);

        // The unconsumed credit steps the survivors back by exactly 1/r.
        assert_eq!(front_reservation(&core, 1), vec![0.5, 1.0]);
        let slot = core.clients[&1];
        assert_eq!(core.store.get(slot).prev_tag.reservation, 1.0);
    }

    #[test]
    fn test_no_reduction_on_reservation_dispatch() {
        let mut core = core_with(|_| ClientProfile::new(2.0, 1.0, 0.0), &QueueConfig::for_testing());
        for i in 0..2 {
            core.add_request(i, 1, ReqParams::default(), 0.0, 0.0);
        }

        let (_, _, phase) = pull(&mut core, 0.5).expect("reservation due");
        assert_eq!(phase, Phase::Reservation);
        assert_eq!(front_reservation(&core, 1), vec![1.0]);
    }

    #[test]
    fn test_idle_reactivation_rebaselines_proportion() {
        let mut core = core_with(|_| ClientProfile::new(0.0, 1.0, 0.0), &QueueConfig::for_testing());

        // Client 1 runs alone for a while; its proportion chain marches on.
        for i in 0..100 {
            core.add_request(i, 1, ReqParams::default(), 0.0, 0.0);
        }
        for i in 0..40 {
            let now = f64::from(i) * 0.1;
            assert!(pull(&mut core, now).is_some());
        }

        // Client 2 arrives cold at t=5. Its effective proportion key must
        // land exactly on the front-runner's.
        let slot1 = core.clients[&1];
        let front1 = core.store.get(slot1).next_request().unwrap().tag.proportion;
        core.add_request(0, 2, ReqParams::default(), 5.0, 0.0);

        let slot2 = core.clients[&2];
        let rec2 = core.store.get(slot2);
        assert!(!rec2.idle);
        let effective2 = rec2.next_request().unwrap().tag.proportion + rec2.prop_delta;
        assert!((effective2 - front1).abs() < 1e-9);

        // And it must dispatch within the next two pulls, not after client 1
        // drains.
        let first = pull(&mut core, 5.0).unwrap();
        let second = pull(&mut core, 5.01).unwrap();
        assert!(first.0 == 2 || second.0 == 2);
    }

    #[test]
    fn test_reactivation_with_no_contenders_keeps_delta() {
        let mut core = core_with(|_| ClientProfile::new(0.0, 1.0, 0.0), &QueueConfig::for_testing());
        core.add_request(0, 1, ReqParams::default(), 10.0, 0.0);
        let slot = core.clients[&1];
        assert_eq!(core.store.get(slot).prop_delta, 0.0);
        assert!(!core.store.get(slot).idle);
    }

    #[test]
    fn test_dispatch_counts_by_phase() {
        let mut core = core_with(|_| ClientProfile::new(1.0, 1.0, 0.0), &QueueConfig::for_testing());
        for i in 0..4 {
            core.add_request(i, 1, ReqParams::default(), 0.0, 0.0);
        }

        // t=1.0: reservation tag 1.0 is due.
        assert_eq!(pull(&mut core, 1.0).unwrap().2, Phase::Reservation);
        // t=1.1: next reservation tag is 2.0; the ready request dispatches.
        assert_eq!(pull(&mut core, 1.1).unwrap().2, Phase::Priority);

        let stats = core.stats();
        assert_eq!(stats.reservation_dispatches, 1);
        assert_eq!(stats.priority_dispatches, 1);
        assert_eq!(stats.pending_requests, 2);
        assert_eq!(stats.active_clients, 1);
    }

    #[test]
    fn test_remove_by_client() {
        let mut core = core_with(|_| ClientProfile::new(0.0, 1.0, 0.0), &QueueConfig::for_testing());
        for i in 0..3 {
            core.add_request(i, 1, ReqParams::default(), 0.0, 0.0);
        }
        core.add_request(99, 2, ReqParams::default(), 0.0, 0.0);

        assert_eq!(core.remove_by_client(&1), vec![0, 1, 2]);
        assert_eq!(core.remove_by_client(&1), Vec::<u32>::new());
        assert_eq!(core.remove_by_client(&42), Vec::<u32>::new());
        assert_eq!(core.request_count(), 1);

        // Client 2's request is unaffected and still dispatches.
        let (client, request, _) = pull(&mut core, 0.0).unwrap();
        assert_eq!((client, request), (2, 99));
    }

    #[test]
    fn test_remove_by_req_filter() {
        let mut core = core_with(|_| ClientProfile::new(0.0, 1.0, 0.0), &QueueConfig::for_testing());
        for client in [1, 2] {
            for i in 0..4 {
                core.add_request(client as u32 * 10 + i, client, ReqParams::default(), 0.0, 0.0);
            }
        }

        let removed = core.remove_by_req_filter(|r| r % 2 == 0, false);
        assert_eq!(removed.len(), 4);
        assert!(removed.iter().all(|r| r % 2 == 0));
        assert_eq!(core.request_count(), 4);
    }

    #[test]
    fn test_clean_idles_then_erases() {
        let config = QueueConfig {
            idle_age: std::time::Duration::from_secs(10),
            erase_age: std::time::Duration::from_secs(20),
            check_time: std::time::Duration::from_secs(1),
            ..QueueConfig::default()
        };
        let mut core = core_with(|_| ClientProfile::new(0.0, 1.0, 0.0), &config);

        core.add_request(0, 1, ReqParams::default(), 0.0, 0.0); // tick 1
        core.clean(1.0); // mark (1.0, 1)
        core.add_request(0, 2, ReqParams::default(), 2.0, 0.0); // tick 2

        // t=12: the (1.0, 1) mark is older than idle_age, so client 1
        // (last_tick 1) goes idle; client 2 (last_tick 2) must not.
        core.clean(12.0);
        assert!(core.store.get(core.clients[&1]).idle);
        assert!(!core.store.get(core.clients[&2]).idle);

        // t=22: the (1.0, 1) mark is older than erase_age; client 1 is
        // erased, pending request and all.
        core.clean(22.0);
        assert_eq!(core.client_count(), 1);
        assert!(!core.clients.contains_key(&1));
        assert!(core.clients.contains_key(&2));
    }

    #[test]
    fn test_clean_spares_recent_clients() {
        let config = QueueConfig {
            idle_age: std::time::Duration::from_secs(10),
            erase_age: std::time::Duration::from_secs(20),
            check_time: std::time::Duration::from_secs(1),
            ..QueueConfig::default()
        };
        let mut core = core_with(|_| ClientProfile::new(0.0, 1.0, 0.0), &config);

        core.add_request(0, 1, ReqParams::default(), 0.0, 0.0);
        for t in 1..=30 {
            // The client keeps submitting, so every mark point precedes its
            // latest tick and neither threshold may catch it.
            core.add_request(0, 1, ReqParams::default(), f64::from(t), 0.0);
            core.clean(f64::from(t));
        }
        assert_eq!(core.client_count(), 1);
        assert!(!core.store.get(core.clients[&1]).idle);
    }

    #[test]
    fn test_erased_client_recreated_on_next_request() {
        let config = QueueConfig {
            idle_age: std::time::Duration::from_secs(10),
            erase_age: std::time::Duration::from_secs(20),
            check_time: std::time::Duration::from_secs(1),
            ..QueueConfig::default()
        };
        let mut core = core_with(|_| ClientProfile::new(0.0, 1.0, 0.0), &config);

        core.add_request(7, 1, ReqParams::default(), 0.0, 0.0);
        core.clean(1.0);
        core.clean(25.0);
        assert_eq!(core.client_count(), 0);

        // The resolver is consulted afresh and the record starts clean.
        core.add_request(8, 1, ReqParams::default(), 26.0, 0.0);
        assert_eq!(core.client_count(), 1);
        let (_, request, _) = pull(&mut core, 26.0).unwrap();
        assert_eq!(request, 8);
    }

    #[test]
    fn test_all_zero_profile_never_dispatches() {
        let mut core = core_with(|_| ClientProfile::new(0.0, 0.0, 0.0), &QueueConfig::for_testing());
        // Tagging for an unschedulable client is a programming error; the
        // engine refuses at enqueue.
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            core.add_request(0, 1, ReqParams::default(), 0.0, 0.0);
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_future_wakeup_ignores_ready_front() {
        // A reservation-only client whose front was promoted: the limit view
        // must not contribute a stale wakeup.
        let mut core = core_with(|_| ClientProfile::new(2.0, 0.0, 4.0), &QueueConfig::for_testing());
        core.add_request(0, 1, ReqParams::default(), 0.0, 0.0);

        // Limit tag 0.25 matures before reservation tag 0.5; the front goes
        // ready but cannot dispatch until the reservation is due.
        match core.next_request(0.3) {
            NextReq::Future(at) => assert!((at - 0.5).abs() < 1e-9),
            _ => panic!("expected a future wakeup"),
        }
        assert!(pull(&mut core, 0.5).is_some());
    }

    #[test]
    fn test_limit_view_reorders_after_ready_front_popped() {
        // Client 2 is reservation-only; its front gets promoted to ready
        // early and then parks until its reservation is due. Client 1's
        // fronts pass through ready one at a time. After client 1's first
        // dispatch its new (not-ready) front must surface above client 2 in
        // the limit view, or the promotion loop would stall behind the
        // parked ready front.
        for use_heap in [true, false] {
            let config = QueueConfig {
                use_heap,
                ..QueueConfig::for_testing()
            };
            let mut core = core_with(
                |id| match id {
                    1 => ClientProfile::new(0.0, 1.0, 2.0),
                    _ => ClientProfile::new(0.5, 0.0, 4.0),
                },
                &config,
            );
            core.add_request(10, 1, ReqParams::default(), 0.0, 0.0);
            core.add_request(11, 1, ReqParams::default(), 0.0, 0.0);
            core.add_request(20, 2, ReqParams::default(), 0.0, 0.0);

            let (client, request, phase) = pull(&mut core, 0.6).expect("first limit matured");
            assert_eq!((client, request, phase), (1, 10, Phase::Priority));

            let (client, request, phase) = pull(&mut core, 1.0).expect("second limit matured");
            assert_eq!((client, request, phase), (1, 11, Phase::Priority));

            let (client, request, phase) = pull(&mut core, 2.0).expect("reservation due");
            assert_eq!((client, request, phase), (2, 20, Phase::Reservation));
        }
    }

    #[test]
    fn test_heap_and_flat_agree() {
        let trace: Vec<(u64, f64)> = vec![
            (1, 0.00),
            (2, 0.013),
            (1, 0.021),
            (3, 0.034),
            (2, 0.047),
            (1, 0.055),
            (3, 0.068),
            (2, 0.079),
        ];
        let profiles = |id: &u64| match id {
            1 => ClientProfile::new(0.0, 1.0, 0.0),
            2 => ClientProfile::new(0.0, 1.7, 0.0),
            _ => ClientProfile::new(0.0, 2.3, 0.0),
        };

        let mut outputs = Vec::new();
        for use_heap in [true, false] {
            let config = QueueConfig {
                use_heap,
                ..QueueConfig::for_testing()
            };
            let mut core = core_with(profiles, &config);
            for (i, &(client, at)) in trace.iter().enumerate() {
                core.add_request(i as u32, client, ReqParams::default(), at, 0.0);
            }
            let mut dispatched = Vec::new();
            let mut now = 0.1;
            while let Some((client, request, _)) = pull(&mut core, now) {
                dispatched.push((client, request));
                now += 0.001;
            }
            assert_eq!(dispatched.len(), trace.len());
            outputs.push(dispatched);
        }
        assert_eq!(outputs[0], outputs[1]);
    }
}
