//! Per-target request table and capability bounds

use std::collections::BTreeMap;

use dptf_protocol::TargetIndex;
use serde::Serialize;

/// Requested limit per target. A missing target imposes no limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RequestTable<V> {
    requests: BTreeMap<TargetIndex, V>,
}

impl<V> Default for RequestTable<V> {
    fn default() -> Self {
        Self {
            requests: BTreeMap::new(),
        }
    }
}

impl<V: Copy> RequestTable<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, target: TargetIndex, value: V) {
        self.requests.insert(target, value);
    }

    pub fn get(&self, target: TargetIndex) -> Option<V> {
        self.requests.get(&target).copied()
    }

    pub fn clear(&mut self, target: TargetIndex) -> Option<V> {
        self.requests.remove(&target)
    }

    pub fn clear_all(&mut self) {
        self.requests.clear();
    }

    /// Fold all requests with `pick`; `None` when the table is empty
    pub fn reduce<F>(&self, pick: F) -> Option<V>
    where
        F: Fn(V, V) -> V,
    {
        self.requests.values().copied().reduce(pick)
    }

    /// Rewrite every stored request in place
    pub fn snap_all<F>(&mut self, snap: F)
    where
        F: Fn(V) -> V,
    {
        for value in self.requests.values_mut() {
            *value = snap(*value);
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TargetIndex, V)> + '_ {
        self.requests.iter().map(|(target, value)| (*target, *value))
    }

    pub fn to_map(&self) -> BTreeMap<TargetIndex, V> {
        self.requests.clone()
    }
}

impl<V> FromIterator<(TargetIndex, V)> for RequestTable<V> {
    fn from_iter<I: IntoIterator<Item = (TargetIndex, V)>>(iter: I) -> Self {
        Self {
            requests: iter.into_iter().collect(),
        }
    }
}

/// Which end of a control's range limits the hardware more
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Restriction {
    /// Power limits, active core counts
    LowerIsStricter,
    /// Performance and brightness indexes
    HigherIsStricter,
}

/// Current legal range of a control, oriented by restriction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bounds<V> {
    pub unrestricted: V,
    pub most_restrictive: V,
    pub restriction: Restriction,
}

impl<V: Ord + Copy> Bounds<V> {
    pub fn new(unrestricted: V, most_restrictive: V, restriction: Restriction) -> Self {
        Self {
            unrestricted,
            most_restrictive,
            restriction,
        }
    }

    /// The more limiting of two values
    pub fn stricter(&self, a: V, b: V) -> V {
        match self.restriction {
            Restriction::LowerIsStricter => a.min(b),
            Restriction::HigherIsStricter => a.max(b),
        }
    }

    /// Clamp into the range. Inverted bounds resolve to the unrestricted end.
    pub fn snap(&self, value: V) -> V {
        let (low, high) = match self.restriction {
            Restriction::LowerIsStricter => (self.most_restrictive, self.unrestricted),
            Restriction::HigherIsStricter => (self.unrestricted, self.most_restrictive),
        };
        if low > high {
            return self.unrestricted;
        }
        value.max(low).min(high)
    }

    /// Most restrictive request, or the unrestricted end when there are none,
    /// snapped into the range
    pub fn resolve(&self, requests: &RequestTable<V>) -> V {
        let strictest = requests
            .reduce(|a, b| self.stricter(a, b))
            .unwrap_or(self.unrestricted);
        self.snap(strictest)
    }

    /// Whether `value` has room to move toward the most restrictive end
    pub fn can_tighten(&self, value: V) -> bool {
        match self.restriction {
            Restriction::LowerIsStricter => value > self.most_restrictive,
            Restriction::HigherIsStricter => value < self.most_restrictive,
        }
    }

    /// Whether `value` has room to move toward the unrestricted end
    pub fn can_relax(&self, value: V) -> bool {
        match self.restriction {
            Restriction::LowerIsStricter => value < self.unrestricted,
            Restriction::HigherIsStricter => value > self.unrestricted,
        }
    }
}
