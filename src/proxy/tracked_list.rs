use super::capability::ListProxy;
use super::element::{Previous, ProxyElement};
use super::expect_kind;
use crate::core::{MappingError, Result, Value};
use crate::delta::{CollectionOp, DeltaTracker};
use crate::model::{ColumnSpec, MultiValueKind};
use std::slice;

/// List proxy over a live backing list.
///
/// Reads see the backing list. Writes update the backing list and, when it
/// actually changed, record one op in the tracker. Insertions are only legal
/// at the ends of the stored list, where they map to prepend/append.
///
/// A proxy may be a window (`with_sub_list`) over part of the backing list;
/// indices passed to a window are relative to it, recorded indices are
/// absolute.
pub struct TrackedList<'a, T> {
    backing: &'a mut Vec<T>,
    tracker: &'a mut DeltaTracker,
    column: ColumnSpec,
    offset: usize,
    window: Option<usize>,
}

impl<'a, T: ProxyElement> TrackedList<'a, T> {
    pub fn new(
        backing: &'a mut Vec<T>,
        tracker: &'a mut DeltaTracker,
        column: &ColumnSpec,
    ) -> Result<Self> {
        expect_kind(column, MultiValueKind::List)?;
        Ok(Self {
            backing,
            tracker,
            column: column.clone(),
            offset: 0,
            window: None,
        })
    }

    pub fn column(&self) -> &ColumnSpec {
        &self.column
    }

    fn bounds(&self) -> (usize, usize) {
        let end = match self.window {
            Some(len) => self.offset + len,
            None => self.backing.len(),
        };
        (self.offset, end)
    }

    fn view(&self) -> &[T] {
        let (start, end) = self.bounds();
        &self.backing[start..end]
    }

    fn view_len(&self) -> usize {
        let (start, end) = self.bounds();
        end - start
    }

    fn resize_window(&mut self, grow: usize, shrink: usize) {
        if let Some(len) = self.window.as_mut() {
            *len = *len + grow - shrink;
        }
    }

    fn check_index(&self, index: usize, inclusive: bool) -> Result<()> {
        let len = self.view_len();
        let in_bounds = if inclusive { index <= len } else { index < len };
        if in_bounds {
            Ok(())
        } else {
            Err(MappingError::IndexOutOfBounds { index, len })
        }
    }

    fn insertion_op(&self, absolute: usize, values: Vec<Value>) -> Result<CollectionOp> {
        if absolute == self.backing.len() {
            Ok(CollectionOp::AppendListElements(values))
        } else if absolute == 0 {
            Ok(CollectionOp::PrependListElements(values))
        } else {
            Err(MappingError::UnsupportedOperation(format!(
                "insert at index {} of list '{}': only prepend and append are store primitives",
                absolute,
                self.column.name()
            )))
        }
    }

    fn insert_values(&mut self, index: usize, values: Vec<T>) -> Result<bool> {
        self.check_index(index, true)?;
        if values.is_empty() {
            return Ok(false);
        }
        let raw: Vec<T> = values.into_iter().map(ProxyElement::into_raw).collect();
        let absolute = self.offset + index;
        let op = self.insertion_op(absolute, raw.iter().map(ProxyElement::to_value).collect())?;

        let count = raw.len();
        let tail = self.backing.split_off(absolute);
        self.backing.extend(raw);
        self.backing.extend(tail);
        self.resize_window(count, 0);
        self.tracker.record(&self.column, op);
        Ok(true)
    }

    // Store-side list subtraction removes every occurrence, so the backing
    // list does the same. Through a window that is only representable when
    // the values do not also occur outside it.
    fn remove_values(&mut self, targets: Vec<T>) -> Result<bool> {
        let (start, end) = self.bounds();
        let mut removed: Vec<T> = Vec::new();
        for target in targets.into_iter().map(ProxyElement::into_raw) {
            if self.backing[start..end].contains(&target) && !removed.contains(&target) {
                removed.push(target);
            }
        }
        if removed.is_empty() {
            return Ok(false);
        }

        let outside = self.backing[..start]
            .iter()
            .chain(self.backing[end..].iter())
            .any(|value| removed.contains(value));
        if outside {
            return Err(MappingError::UnsupportedOperation(format!(
                "remove by value through a sub-list of '{}' when the value also occurs outside it",
                self.column.name()
            )));
        }

        let tail = self.backing.split_off(end);
        let window: Vec<T> = self.backing.drain(start..).collect();
        let before = window.len();
        self.backing
            .extend(window.into_iter().filter(|value| !removed.contains(value)));
        let dropped = before - (self.backing.len() - start);
        self.backing.extend(tail);
        self.resize_window(0, dropped);

        self.tracker.record(
            &self.column,
            CollectionOp::RemoveElements(removed.iter().map(ProxyElement::to_value).collect()),
        );
        Ok(true)
    }

    /// Runs `f` against a window over `[from, to)` of this list.
    ///
    /// The window shares this proxy's backing list, tracker and column, so its
    /// mutations are recorded against the same column with absolute indices.
    pub fn with_sub_list<R, F>(&mut self, from: usize, to: usize, f: F) -> Result<R>
    where
        F: FnOnce(&mut TrackedList<'_, T>) -> Result<R>,
    {
        let len = self.view_len();
        if from > to || to > len {
            return Err(MappingError::IndexOutOfBounds {
                index: to.max(from),
                len,
            });
        }
        let original = to - from;
        let mut sub = TrackedList {
            backing: &mut *self.backing,
            tracker: &mut *self.tracker,
            column: self.column.clone(),
            offset: self.offset + from,
            window: Some(original),
        };
        let result = f(&mut sub);
        let final_len = sub.window.unwrap_or(original);
        if final_len >= original {
            self.resize_window(final_len - original, 0);
        } else {
            self.resize_window(0, original - final_len);
        }
        result
    }

    /// A cursor positioned before the first element of this list.
    pub fn cursor(&mut self) -> TrackedListCursor<'_, 'a, T> {
        TrackedListCursor {
            list: self,
            next_index: 0,
            last: None,
        }
    }
}

impl<T: ProxyElement> ListProxy<T> for TrackedList<'_, T> {
    fn len(&self) -> Result<usize> {
        Ok(self.view_len())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.view_len() == 0)
    }

    fn get(&self, index: usize) -> Result<&T> {
        self.check_index(index, false)?;
        Ok(&self.view()[index])
    }

    fn contains(&self, value: &T) -> Result<bool> {
        Ok(self.view().contains(value))
    }

    fn iter(&self) -> Result<slice::Iter<'_, T>> {
        Ok(self.view().iter())
    }

    fn add(&mut self, value: T) -> Result<bool> {
        let len = self.view_len();
        self.insert_values(len, vec![value])
    }

    fn add_all(&mut self, values: Vec<T>) -> Result<bool> {
        let len = self.view_len();
        self.insert_values(len, values)
    }

    fn add_at(&mut self, index: usize, value: T) -> Result<()> {
        self.insert_values(index, vec![value]).map(|_| ())
    }

    fn add_all_at(&mut self, index: usize, values: Vec<T>) -> Result<bool> {
        self.insert_values(index, values)
    }

    fn remove(&mut self, value: T) -> Result<bool> {
        self.remove_values(vec![value])
    }

    fn remove_all(&mut self, values: Vec<T>) -> Result<bool> {
        self.remove_values(values)
    }

    /// Records the removed elements (`original - values`), never the kept ones.
    fn retain_all(&mut self, values: Vec<T>) -> Result<bool> {
        let keep: Vec<T> = values.into_iter().map(ProxyElement::into_raw).collect();
        let removed: Vec<T> = self
            .view()
            .iter()
            .filter(|value| !keep.contains(value))
            .cloned()
            .collect();
        self.remove_values(removed)
    }

    fn remove_at(&mut self, index: usize) -> Result<Previous<T>> {
        self.check_index(index, false)?;
        let absolute = self.offset + index;
        let old = self.backing.remove(absolute);
        self.resize_window(0, 1);
        self.tracker
            .record(&self.column, CollectionOp::RemoveListElementAtIndex(absolute));
        Ok(Previous::Known(Some(old)))
    }

    fn set(&mut self, index: usize, value: T) -> Result<Previous<T>> {
        self.check_index(index, false)?;
        let absolute = self.offset + index;
        let raw = value.into_raw();
        let old = std::mem::replace(&mut self.backing[absolute], raw.clone());
        if old != raw {
            self.tracker.record(
                &self.column,
                CollectionOp::SetListElementAtIndex(absolute, raw.to_value()),
            );
        }
        Ok(Previous::Known(Some(old)))
    }

    fn clear(&mut self) -> Result<()> {
        let (start, end) = self.bounds();
        if start == end {
            return Ok(());
        }
        if start != 0 || end != self.backing.len() {
            return Err(MappingError::UnsupportedOperation(format!(
                "clear() on a sub-list of '{}'",
                self.column.name()
            )));
        }
        let len = self.backing.len();
        self.backing.clear();
        self.resize_window(0, len);
        self.tracker.record(&self.column, CollectionOp::ClearAll);
        Ok(())
    }
}

/// Forward iterator over a `TrackedList` that can mutate
/// the element it last returned.
pub struct TrackedListCursor<'c, 'a, T> {
    list: &'c mut TrackedList<'a, T>,
    next_index: usize,
    last: Option<usize>,
}

impl<T: ProxyElement> TrackedListCursor<'_, '_, T> {
    pub fn has_next(&self) -> bool {
        self.next_index < self.list.view_len()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<T> {
        let value = self.list.view().get(self.next_index).cloned()?;
        self.last = Some(self.next_index);
        self.next_index += 1;
        Some(value)
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }

    fn last_returned(&self, call: &str) -> Result<usize> {
        self.last.ok_or_else(|| {
            MappingError::UnsupportedOperation(format!("{}() called before next()", call))
        })
    }

    /// Replaces the element last returned by `next`.
    pub fn set(&mut self, value: T) -> Result<()> {
        let index = self.last_returned("set")?;
        self.list.set(index, value).map(|_| ())
    }

    /// Removes the element last returned by `next`.
    pub fn remove(&mut self) -> Result<()> {
        let index = self.last_returned("remove")?;
        self.list.remove_at(index)?;
        self.next_index = index;
        self.last = None;
        Ok(())
    }

    /// Inserts before the cursor position; only legal at either end of the list.
    pub fn add(&mut self, value: T) -> Result<()> {
        self.list.add_at(self.next_index, value)?;
        self.next_index += 1;
        self.last = None;
        Ok(())
    }
}
