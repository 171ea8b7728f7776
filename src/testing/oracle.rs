//! Sequential reference structures the monitor replays events against.
//!
//! They are only ever touched by the monitor thread, so they are plain
//! persistent collections without any synchronization.

use super::operation::{MultisetOp, Operation, SetOp, StackOp, StackOutcome};
use im::{OrdMap, OrdSet, Vector};
use std::fmt::Debug;

pub trait Oracle<O: Operation> {
    fn apply(&mut self, operation: &O) -> O::Output;

    /// Human readable contents, used in failure reports.
    fn dump(&self) -> String;
}

pub(crate) fn braced<I, T>(items: I) -> String
where
    I: IntoIterator<Item = T>,
    T: Debug,
{
    let entries: Vec<String> = items.into_iter().map(|item| format!("{:?}", item)).collect();
    format!("{{{}}}", entries.join(", "))
}

#[derive(Debug, Clone, Default)]
pub struct SequentialSet<T: Ord + Clone> {
    state: OrdSet<T>,
}

impl<T: Ord + Clone> SequentialSet<T> {
    pub fn new() -> Self {
        SequentialSet { state: OrdSet::new() }
    }

    pub fn add(&mut self, value: T) -> bool {
        self.state.insert(value).is_none()
    }

    pub fn remove(&mut self, value: &T) -> bool {
        self.state.remove(value).is_some()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.state.contains(value)
    }
}

impl<T> Oracle<SetOp<T>> for SequentialSet<T>
where
    T: Ord + Clone + Debug + Send + Sync + 'static,
{
    fn apply(&mut self, operation: &SetOp<T>) -> bool {
        match operation {
            SetOp::Add(value) => self.add(value.clone()),
            SetOp::Remove(value) => self.remove(value),
            SetOp::Contains(value) => self.contains(value),
        }
    }

    fn dump(&self) -> String {
        braced(self.state.iter())
    }
}

/// Multiset oracle keeping a count per distinct value.
#[derive(Debug, Clone, Default)]
pub struct SequentialMultiset<T: Ord + Clone> {
    state: OrdMap<T, usize>,
}

impl<T: Ord + Clone> SequentialMultiset<T> {
    pub fn new() -> Self {
        SequentialMultiset { state: OrdMap::new() }
    }

    pub fn add(&mut self, value: T) -> bool {
        let count = self.count(&value);
        self.state.insert(value, count + 1);
        true
    }

    pub fn remove(&mut self, value: &T) -> bool {
        match self.count(value) {
            0 => false,
            1 => {
                self.state.remove(value);
                true
            }
            count => {
                self.state.insert(value.clone(), count - 1);
                true
            }
        }
    }

    pub fn count(&self, value: &T) -> usize {
        self.state.get(value).copied().unwrap_or(0)
    }
}

impl<T> Oracle<MultisetOp<T>> for SequentialMultiset<T>
where
    T: Ord + Clone + Debug + Send + Sync + 'static,
{
    fn apply(&mut self, operation: &MultisetOp<T>) -> usize {
        match operation {
            MultisetOp::Add(value) => self.add(value.clone()) as usize,
            MultisetOp::Remove(value) => self.remove(value) as usize,
            MultisetOp::Count(value) => self.count(value),
        }
    }

    fn dump(&self) -> String {
        braced(
            self.state
                .iter()
                .flat_map(|(value, count)| std::iter::repeat(value).take(*count)),
        )
    }
}

/// Stack oracle; the back of the vector is the top.
#[derive(Debug, Clone, Default)]
pub struct SequentialStack<T: Clone> {
    state: Vector<T>,
}

impl<T: Clone> SequentialStack<T> {
    pub fn new() -> Self {
        SequentialStack { state: Vector::new() }
    }

    pub fn push(&mut self, value: T) -> bool {
        self.state.push_back(value);
        true
    }

    pub fn pop(&mut self) -> Option<T> {
        self.state.pop_back()
    }

    pub fn size(&self) -> usize {
        self.state.len()
    }
}

impl<T> Oracle<StackOp<T>> for SequentialStack<T>
where
    T: Clone + Debug + PartialEq + Send + Sync + 'static,
{
    fn apply(&mut self, operation: &StackOp<T>) -> StackOutcome<T> {
        match operation {
            StackOp::Push(value) => StackOutcome::Pushed(self.push(value.clone())),
            StackOp::Pop => StackOutcome::Popped(self.pop()),
            StackOp::Size => StackOutcome::Size(self.size()),
        }
    }

    /// Top first, matching the concurrent stack snapshots.
    fn dump(&self) -> String {
        braced(self.state.iter().rev())
    }
}
