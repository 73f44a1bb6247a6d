//! Subscription registry.
//!
//! Maps subscription ids to their handlers. Iteration order is never
//! observed, so a hash map keyed by id replaces any intrusive list.

use std::collections::HashMap;

/// One active subscription.
#[derive(Debug, Clone)]
pub struct Subscription<H> {
    id: String,
    destination: String,
    handler: H,
}

impl<H> Subscription<H> {
    /// Create a subscription record.
    pub fn new(id: impl Into<String>, destination: impl Into<String>, handler: H) -> Self {
        Self { id: id.into(), destination: destination.into(), handler }
    }

    /// Subscription id as sent in the SUBSCRIBE frame.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Destination the subscription was made on.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Handler invoked for MESSAGE frames on this subscription.
    pub fn handler(&self) -> &H {
        &self.handler
    }
}

/// Active subscriptions keyed by id.
#[derive(Debug, Clone)]
pub struct SubscriptionRegistry<H> {
    entries: HashMap<String, Subscription<H>>,
}

impl<H> SubscriptionRegistry<H> {
    /// Empty registry.
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Register a subscription, returning any previous one with the same id.
    pub fn insert(&mut self, subscription: Subscription<H>) -> Option<Subscription<H>> {
        self.entries.insert(subscription.id.clone(), subscription)
    }

    /// Remove and return the subscription with `id`.
    pub fn remove(&mut self, id: &str) -> Option<Subscription<H>> {
        self.entries.remove(id)
    }

    /// Look up a subscription by id.
    pub fn get(&self, id: &str) -> Option<&Subscription<H>> {
        self.entries.get(id)
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Drop every subscription, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Number of subscriptions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered ids, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<H> Default for SubscriptionRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}
