use crate::adt::{Multiset, Set, Stack};
use std::fmt;
use std::fmt::Debug;

/// A request against one of the abstract data types, carrying its argument.
pub trait Operation: Clone + Debug + fmt::Display + Send + Sync + 'static {
    /// What the structure answered.
    type Output: Clone + Debug + PartialEq + Send + Sync + 'static;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOp<T> {
    Add(T),
    Remove(T),
    Contains(T),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MultisetOp<T> {
    Add(T),
    Remove(T),
    Count(T),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackOp<T> {
    Push(T),
    Pop,
    Size,
}

/// The answer to a [`StackOp`]; `Popped(None)` is the empty-stack result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackOutcome<T> {
    Pushed(bool),
    Popped(Option<T>),
    Size(usize),
}

impl<T: Clone + Debug + Send + Sync + 'static> Operation for SetOp<T> {
    type Output = bool;
}

impl<T: Clone + Debug + Send + Sync + 'static> Operation for MultisetOp<T> {
    type Output = usize;
}

impl<T: Clone + Debug + PartialEq + Send + Sync + 'static> Operation for StackOp<T> {
    type Output = StackOutcome<T>;
}

impl<T: Debug> fmt::Display for SetOp<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SetOp::Add(value) => write!(f, "add({:?})", value),
            SetOp::Remove(value) => write!(f, "rmv({:?})", value),
            SetOp::Contains(value) => write!(f, "ctn({:?})", value),
        }
    }
}

impl<T: Debug> fmt::Display for MultisetOp<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MultisetOp::Add(value) => write!(f, "add({:?})", value),
            MultisetOp::Remove(value) => write!(f, "rmv({:?})", value),
            MultisetOp::Count(value) => write!(f, "cnt({:?})", value),
        }
    }
}

impl<T: Debug> fmt::Display for StackOp<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StackOp::Push(value) => write!(f, "push({:?})", value),
            StackOp::Pop => write!(f, "pop()"),
            StackOp::Size => write!(f, "size()"),
        }
    }
}

/// Dispatch an operation onto a concurrent structure.
///
/// Implemented for every [`Set`], [`Multiset`] and [`Stack`], so the harness
/// can drive any variant without knowing which one it holds.
pub trait Apply<O: Operation> {
    fn apply(&self, operation: &O) -> O::Output;
}

impl<T, S> Apply<SetOp<T>> for S
where
    S: Set<T> + ?Sized,
    T: Clone + Debug + Send + Sync + 'static,
{
    fn apply(&self, operation: &SetOp<T>) -> bool {
        match operation {
            SetOp::Add(value) => self.add(value.clone()),
            SetOp::Remove(value) => self.remove(value),
            SetOp::Contains(value) => self.contains(value),
        }
    }
}

impl<T, S> Apply<MultisetOp<T>> for S
where
    S: Multiset<T> + ?Sized,
    T: Clone + Debug + Send + Sync + 'static,
{
    fn apply(&self, operation: &MultisetOp<T>) -> usize {
        match operation {
            MultisetOp::Add(value) => self.add(value.clone()) as usize,
            MultisetOp::Remove(value) => self.remove(value) as usize,
            MultisetOp::Count(value) => self.count(value),
        }
    }
}

impl<T, S> Apply<StackOp<T>> for S
where
    S: Stack<T> + ?Sized,
    T: Clone + Debug + PartialEq + Send + Sync + 'static,
{
    fn apply(&self, operation: &StackOp<T>) -> StackOutcome<T> {
        match operation {
            StackOp::Push(value) => StackOutcome::Pushed(self.push(value.clone())),
            StackOp::Pop => StackOutcome::Popped(self.pop()),
            StackOp::Size => StackOutcome::Size(self.size()),
        }
    }
}

/// The operator half of an operation, as drawn by the generator before an
/// argument is attached.
pub trait OperatorKind: Copy + Debug + Send + Sync + 'static {
    type Operation: Operation;

    fn with_argument(self, argument: i64) -> Self::Operation;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOperator {
    Add,
    Remove,
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MultisetOperator {
    Add,
    Remove,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackOperator {
    Push,
    Pop,
    Size,
}

impl OperatorKind for SetOperator {
    type Operation = SetOp<i64>;

    fn with_argument(self, argument: i64) -> SetOp<i64> {
        match self {
            SetOperator::Add => SetOp::Add(argument),
            SetOperator::Remove => SetOp::Remove(argument),
            SetOperator::Contains => SetOp::Contains(argument),
        }
    }
}

impl OperatorKind for MultisetOperator {
    type Operation = MultisetOp<i64>;

    fn with_argument(self, argument: i64) -> MultisetOp<i64> {
        match self {
            MultisetOperator::Add => MultisetOp::Add(argument),
            MultisetOperator::Remove => MultisetOp::Remove(argument),
            MultisetOperator::Count => MultisetOp::Count(argument),
        }
    }
}

impl OperatorKind for StackOperator {
    type Operation = StackOp<i64>;

    /// `Pop` and `Size` ignore the argument.
    fn with_argument(self, argument: i64) -> StackOp<i64> {
        match self {
            StackOperator::Push => StackOp::Push(argument),
            StackOperator::Pop => StackOp::Pop,
            StackOperator::Size => StackOp::Size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_log_format() {
        assert_eq!(SetOp::Add(4).to_string(), "add(4)");
        assert_eq!(MultisetOp::Count(2).to_string(), "cnt(2)");
        assert_eq!(StackOp::<i64>::Pop.to_string(), "pop()");
    }

    #[test]
    fn test_operator_kinds_attach_argument() {
        assert_eq!(SetOperator::Remove.with_argument(9), SetOp::Remove(9));
        assert_eq!(MultisetOperator::Add.with_argument(1), MultisetOp::Add(1));
        assert_eq!(StackOperator::Size.with_argument(7), StackOp::Size);
    }
}
