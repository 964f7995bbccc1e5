use crate::core::Value;
use crate::delta::DeltaTracker;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use uuid::Uuid;

/// A value that can live inside a proxied collection.
///
/// Mutating proxy calls pass every incoming value through `into_raw` before
/// storing or tracking it, so wrapped entities are stored unwrapped.
pub trait ProxyElement: Clone + PartialEq {
    /// Strips one level of entity-proxy wrapping; plain values return themselves.
    fn into_raw(self) -> Self {
        self
    }

    fn to_value(&self) -> Value;
}

impl ProxyElement for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

macro_rules! plain_element {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ProxyElement for $ty {
                fn to_value(&self) -> Value {
                    Value::from(self.clone())
                }
            }
        )+
    };
}

plain_element!(String, i64, i32, bool, f64, Uuid, DateTime<Utc>);

/// An entity value held behind its own mutation interceptor.
///
/// Used when a collection holds entities (user-defined types) that are
/// themselves being tracked. Equality and ordering look at the target only,
/// so a wrapped and an unwrapped copy of the same entity are the same element.
#[derive(Debug, Clone)]
pub struct EntityProxy<T> {
    target: T,
    interceptor: Option<DeltaTracker>,
}

impl<T> EntityProxy<T> {
    /// Wraps `target` with a fresh interceptor.
    pub fn wrap(target: T) -> Self {
        Self {
            target,
            interceptor: Some(DeltaTracker::new()),
        }
    }

    pub fn raw(target: T) -> Self {
        Self {
            target,
            interceptor: None,
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn into_target(self) -> T {
        self.target
    }

    pub fn is_wrapped(&self) -> bool {
        self.interceptor.is_some()
    }

    pub fn interceptor_mut(&mut self) -> Option<&mut DeltaTracker> {
        self.interceptor.as_mut()
    }
}

impl<T: PartialEq> PartialEq for EntityProxy<T> {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl<T: Eq> Eq for EntityProxy<T> {}

impl<T: PartialOrd> PartialOrd for EntityProxy<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.target.partial_cmp(&other.target)
    }
}

impl<T: Ord> Ord for EntityProxy<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.target.cmp(&other.target)
    }
}

impl<T: ProxyElement> ProxyElement for EntityProxy<T> {
    fn into_raw(self) -> Self {
        Self::raw(self.target)
    }

    fn to_value(&self) -> Value {
        self.target.to_value()
    }
}

/// What a mutating call knows about the value it replaced or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Previous<T> {
    /// Read from the backing collection; `None` when nothing was there.
    Known(Option<T>),
    /// No read was performed, so the old value is unknown.
    Unread,
}

impl<T> Previous<T> {
    pub fn is_unread(&self) -> bool {
        matches!(self, Self::Unread)
    }

    /// The old value when known. `Unread` and "nothing there" both give `None`.
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Known(value) => value,
            Self::Unread => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_raw_strips_the_interceptor() {
        let wrapped = EntityProxy::wrap("profile".to_string());
        assert!(wrapped.is_wrapped());
        let raw = wrapped.clone().into_raw();
        assert!(!raw.is_wrapped());
        assert_eq!(raw, wrapped);
        assert_eq!(raw.to_value(), Value::from("profile"));
    }

    #[test]
    fn previous_unread_has_no_value() {
        let previous: Previous<i64> = Previous::Unread;
        assert!(previous.is_unread());
        assert_eq!(previous.into_option(), None);
        assert_eq!(Previous::Known(Some(3)).into_option(), Some(3));
    }
}
