use std::cmp::Ordering;

/// A list key bracketed by synthetic sentinels.
///
/// `Min` sorts before and `Max` after every `Value`, whatever `T` is, so the
/// head and tail of a sorted list never compare equal to stored data.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Key<T> {
    Min,
    Value(T),
    Max,
}

impl<T: Ord> Key<T> {
    pub fn cmp_value(&self, value: &T) -> Ordering {
        match self {
            Key::Min => Ordering::Less,
            Key::Value(own) => own.cmp(value),
            Key::Max => Ordering::Greater,
        }
    }

    pub fn is_below(&self, value: &T) -> bool {
        self.cmp_value(value) == Ordering::Less
    }

    pub fn matches(&self, value: &T) -> bool {
        self.cmp_value(value) == Ordering::Equal
    }
}

impl<T> Key<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Key::Value(value) => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Key;
    use std::cmp::Ordering;

    #[test]
    fn test_sentinels_bracket_extremes() {
        assert!(Key::Min < Key::Value(i64::MIN));
        assert!(Key::Value(i64::MAX) < Key::Max);
        assert_eq!(Key::<i64>::Max.cmp_value(&i64::MAX), Ordering::Greater);
        assert!(Key::<i64>::Min.is_below(&i64::MIN));
        assert!(Key::Value(3).matches(&3));
        assert_eq!(Key::<i64>::Max.value(), None);
    }
}
