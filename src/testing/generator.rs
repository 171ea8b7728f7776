use super::error::GeneratorError;
use super::operation::{MultisetOperator, OperatorKind, SetOperator, StackOperator};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const OPERATION_COUNT: usize = 500;
pub const DEFAULT_GENERATOR_SEED: u64 = 0;
pub const DEFAULT_OP_MOD: i64 = 128;

pub const DEFAULT_SET_WEIGHTS: [(SetOperator, u32); 3] = [
    (SetOperator::Add, 3),
    (SetOperator::Remove, 4),
    (SetOperator::Contains, 3),
];

pub const DEFAULT_MULTISET_WEIGHTS: [(MultisetOperator, u32); 3] = [
    (MultisetOperator::Add, 3),
    (MultisetOperator::Remove, 4),
    (MultisetOperator::Count, 3),
];

pub const DEFAULT_STACK_WEIGHTS: [(StackOperator, u32); 3] = [
    (StackOperator::Push, 3),
    (StackOperator::Pop, 4),
    (StackOperator::Size, 3),
];

// Spreads consecutive indices across the seed space
const INDEX_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// A finite stream of weighted random operations shared by worker threads.
///
/// Every call to [`next`](OpGenerator::next) claims the next index from one
/// atomic counter. The operator and argument for index `i` are drawn
/// together from a stream seeded by `(seed, i)`, so the operation at each
/// index is fixed by the generator's parameters alone, whichever thread
/// claims it. Once `target_op_count` indices are claimed the generator is
/// exhausted for good.
pub struct OpGenerator<K: OperatorKind> {
    operators: Vec<K>,
    distribution: WeightedIndex<u32>,
    target_op_count: usize,
    counter: AtomicUsize,
    argument_modulo: i64,
    seed: u64,
}

impl<K: OperatorKind> OpGenerator<K> {
    pub fn new(
        weights: &[(K, u32)],
        target_op_count: usize,
        argument_modulo: i64,
        seed: u64,
    ) -> Result<Self, GeneratorError> {
        if argument_modulo <= 0 {
            return Err(GeneratorError::InvalidModulo(argument_modulo));
        }
        let distribution = WeightedIndex::new(weights.iter().map(|&(_, weight)| weight))?;

        Ok(OpGenerator {
            operators: weights.iter().map(|&(operator, _)| operator).collect(),
            distribution,
            target_op_count,
            counter: AtomicUsize::new(0),
            argument_modulo,
            seed,
        })
    }

    /// A generator of [`OPERATION_COUNT`] operations over
    /// `0..DEFAULT_OP_MOD`, seeded with [`DEFAULT_GENERATOR_SEED`].
    pub fn with_weights(weights: &[(K, u32)]) -> Result<Self, GeneratorError> {
        OpGenerator::new(weights, OPERATION_COUNT, DEFAULT_OP_MOD, DEFAULT_GENERATOR_SEED)
    }

    /// Claim the next operation, or `None` once the target count is reached.
    pub fn next(&self) -> Option<K::Operation> {
        let index = self.counter.fetch_add(1, Ordering::Relaxed);
        if index >= self.target_op_count {
            return None;
        }
        Some(self.operation_at(index))
    }

    /// The operation this generator yields for `index`.
    pub fn operation_at(&self, index: usize) -> K::Operation {
        let mut rng =
            Xoshiro256StarStar::seed_from_u64(self.seed ^ (index as u64).wrapping_mul(INDEX_MIX));
        let operator = self.operators[self.distribution.sample(&mut rng)];
        let argument = rng.gen_range(0..self.argument_modulo);
        operator.with_argument(argument)
    }

    pub fn target_op_count(&self) -> usize {
        self.target_op_count
    }

    /// Operations handed out so far.
    pub fn generated(&self) -> usize {
        self.counter.load(Ordering::Relaxed).min(self.target_op_count)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn argument_modulo(&self) -> i64 {
        self.argument_modulo
    }
}

impl<'a, K: OperatorKind> Iterator for &'a OpGenerator<K> {
    type Item = K::Operation;

    fn next(&mut self) -> Option<K::Operation> {
        OpGenerator::next(*self)
    }
}

impl<K: OperatorKind> fmt::Debug for OpGenerator<K> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("OpGenerator")
            .field("operators", &self.operators)
            .field("target_op_count", &self.target_op_count)
            .field("generated", &self.generated())
            .field("argument_modulo", &self.argument_modulo)
            .field("seed", &self.seed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::operation::{SetOp, StackOp};
    use std::sync::Mutex;

    #[test]
    fn test_identical_parameters_give_identical_streams() {
        let first = OpGenerator::new(&DEFAULT_SET_WEIGHTS, 400, 64, 7).unwrap();
        let second = OpGenerator::new(&DEFAULT_SET_WEIGHTS, 400, 64, 7).unwrap();

        let a: Vec<SetOp<i64>> = first.into_iter().collect();
        let b: Vec<SetOp<i64>> = second.into_iter().collect();
        assert_eq!(a.len(), 400);
        assert_eq!(a, b);
    }

    #[test]
    fn test_default_parameters() {
        let generator = OpGenerator::with_weights(&DEFAULT_MULTISET_WEIGHTS).unwrap();
        assert_eq!(generator.target_op_count(), OPERATION_COUNT);
        assert_eq!(generator.argument_modulo(), DEFAULT_OP_MOD);
        assert_eq!(generator.seed(), DEFAULT_GENERATOR_SEED);
        assert_eq!((&generator).count(), OPERATION_COUNT);
    }

    #[test]
    fn test_seed_changes_stream() {
        let first = OpGenerator::new(&DEFAULT_SET_WEIGHTS, 100, 1024, 0).unwrap();
        let second = OpGenerator::new(&DEFAULT_SET_WEIGHTS, 100, 1024, 1).unwrap();

        let a: Vec<SetOp<i64>> = first.into_iter().collect();
        let b: Vec<SetOp<i64>> = second.into_iter().collect();
        assert_ne!(a, b);
    }

    #[test]
    fn test_exhausted_generator_stays_empty() {
        let generator = OpGenerator::new(&DEFAULT_STACK_WEIGHTS, 3, 10, 0).unwrap();
        assert!(generator.next().is_some());
        assert!(generator.next().is_some());
        assert!(generator.next().is_some());
        assert!(generator.next().is_none());
        assert!(generator.next().is_none());
        assert_eq!(generator.generated(), 3);
    }

    #[test]
    fn test_arguments_respect_modulo_and_weights() {
        let weights = [(SetOperator::Add, 1), (SetOperator::Remove, 0)];
        let generator = OpGenerator::new(&weights, 1000, 8, 3).unwrap();

        for operation in &generator {
            match operation {
                SetOp::Add(argument) => assert!((0..8).contains(&argument)),
                other => panic!("zero-weight operator drawn: {:?}", other),
            }
        }
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        let empty: [(StackOperator, u32); 0] = [];
        assert!(matches!(
            OpGenerator::new(&empty, 10, 10, 0),
            Err(GeneratorError::InvalidWeights(_))
        ));
        assert!(matches!(
            OpGenerator::new(&DEFAULT_STACK_WEIGHTS, 10, 0, 0),
            Err(GeneratorError::InvalidModulo(0))
        ));
    }

    #[test]
    fn test_shared_generator_hands_out_each_index_once() {
        let generator = OpGenerator::new(&DEFAULT_STACK_WEIGHTS, 2000, 1 << 40, 11).unwrap();
        let seen = Mutex::new(Vec::new());

        crossbeam::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|_| {
                    let mut local = Vec::new();
                    while let Some(operation) = generator.next() {
                        local.push(operation);
                    }
                    seen.lock().unwrap().extend(local);
                });
            }
        })
        .unwrap();

        let seen: Vec<StackOp<i64>> = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 2000);
        assert!(seen.iter().any(|op| matches!(op, StackOp::Push(_))));

        let mut claimed: Vec<String> = seen.iter().map(|op| format!("{:?}", op)).collect();
        let mut expected: Vec<String> = (0..2000)
            .map(|index| format!("{:?}", generator.operation_at(index)))
            .collect();
        claimed.sort();
        expected.sort();
        assert_eq!(claimed, expected);
    }
}
