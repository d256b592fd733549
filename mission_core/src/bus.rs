use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use mission_runtime::{Trigger, TriggerKind};

use crate::{context::ScenarioContext, error::ScenarioError};

pub type HandlerResult = Result<(), ScenarioError>;

/// Handlers are shared `Fn`s so a nested dispatch of the same kind can call
/// a handler that is still running. Stateful handlers keep their state in
/// `Cell`/`RefCell` captures.
type HandlerFn = dyn Fn(&Trigger, &mut ScenarioContext) -> HandlerResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
pub(crate) struct Subscriber {
    id: SubscriptionId,
    kind: TriggerKind,
    owner: Rc<str>,
    handler: Rc<HandlerFn>,
}

impl Subscriber {
    pub(crate) fn owner(&self) -> &str {
        &self.owner
    }

    pub(crate) fn invoke(&self, trigger: &Trigger, ctx: &mut ScenarioContext) -> HandlerResult {
        (self.handler)(trigger, ctx)
    }
}

/// Subscription table for lifecycle triggers.
///
/// Dispatch itself lives on [`ScenarioContext::dispatch`], because handlers
/// receive the context mutably. The bus hands out a snapshot of the matching
/// subscribers so subscriptions made mid-dispatch only see later triggers.
#[derive(Default)]
pub struct TriggerBus {
    subscribers: Vec<Subscriber>,
    next_id: u64,
    dispatched: BTreeMap<TriggerKind, u64>,
}

impl TriggerBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, kind: TriggerKind, owner: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&Trigger, &mut ScenarioContext) -> HandlerResult + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        let handler: Rc<HandlerFn> = Rc::new(handler);
        self.subscribers.push(Subscriber {
            id,
            kind,
            owner: Rc::from(owner),
            handler,
        });
        tracing::trace!(
            target: "mission::bus",
            kind = %kind,
            owner,
            subscription = id.0,
            "bus.subscribed"
        );
        id
    }

    /// Removes a subscription for future dispatches. Returns false if the id
    /// was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|subscriber| subscriber.id != id);
        before != self.subscribers.len()
    }

    pub(crate) fn snapshot(&self, kind: TriggerKind) -> Vec<Subscriber> {
        self.subscribers
            .iter()
            .filter(|subscriber| subscriber.kind == kind)
            .cloned()
            .collect()
    }

    pub(crate) fn record_dispatch(&mut self, kind: TriggerKind) {
        *self.dispatched.entry(kind).or_insert(0) += 1;
    }

    pub fn subscriber_count(&self, kind: TriggerKind) -> usize {
        self.subscribers
            .iter()
            .filter(|subscriber| subscriber.kind == kind)
            .count()
    }

    pub fn dispatch_count(&self, kind: TriggerKind) -> u64 {
        self.dispatched.get(&kind).copied().unwrap_or(0)
    }
}

impl fmt::Debug for TriggerBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerBus")
            .field("subscribers", &self.subscribers.len())
            .field("next_id", &self.next_id)
            .field("dispatched", &self.dispatched)
            .finish()
    }
}
