use crate::games::types::WinningNumber;
use rand::rngs::OsRng;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of winning numbers
pub trait SpinResolver: Send + Sync {
    /// Draw one number uniformly from 0..=36
    fn draw(&self) -> WinningNumber;
}

/// Draws from the operating system CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRngSpinResolver;

impl SpinResolver for OsRngSpinResolver {
    fn draw(&self) -> WinningNumber {
        OsRng.gen()
    }
}

/// Replays a fixed sequence of numbers, cycling when exhausted.
///
/// Used to script outcomes in tests and when reproducing a reported spin.
#[derive(Debug)]
pub struct SequenceSpinResolver {
    numbers: Vec<WinningNumber>,
    draws: AtomicUsize,
}

impl SequenceSpinResolver {
    /// `None` when the sequence is empty or holds a number above 36
    pub fn new(numbers: &[u8]) -> Option<Self> {
        if numbers.is_empty() {
            return None;
        }
        let numbers = numbers
            .iter()
            .map(|n| WinningNumber::new(*n))
            .collect::<Option<Vec<_>>>()?;

        Some(Self {
            numbers,
            draws: AtomicUsize::new(0),
        })
    }

    /// Number of draws taken so far
    pub fn draw_count(&self) -> usize {
        self.draws.load(Ordering::SeqCst)
    }
}

impl SpinResolver for SequenceSpinResolver {
    fn draw(&self) -> WinningNumber {
        let index = self.draws.fetch_add(1, Ordering::SeqCst);
        self.numbers[index % self.numbers.len()]
    }
}
