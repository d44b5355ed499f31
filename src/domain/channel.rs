use serde::{Deserialize, Serialize};
use std::{fmt, num::NonZeroU64};

/// Prefix shared by all numbered channels
pub const CHANNEL_PREFIX: &str = "channel_";

/// Number of channels messages are distributed over unless configured otherwise
pub const DEFAULT_CHANNEL_COUNT: u64 = 10;

/// Position of a message within a dispatch run, starting at one
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sequence(u64);

impl Sequence {
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns `None` for zero
    pub fn new(value: u64) -> Option<Self> {
        if value == 0 {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Successor, saturating at `u64::MAX`
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Round-robin channel index in `[1, channels]` for the given sequence number
pub fn assign(sequence: Sequence, channels: NonZeroU64) -> u64 {
    ((sequence.get() - 1) % channels.get()) + 1
}

/// Named pub/sub endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(String);

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Channel `channel_<index>`
    pub fn numbered(index: u64) -> Self {
        Self(format!("{}{}", CHANNEL_PREFIX, index))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Channel {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Channel {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for Channel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Fixed set of numbered channels messages are distributed over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPool {
    size: NonZeroU64,
}

impl Default for ChannelPool {
    fn default() -> Self {
        Self {
            size: NonZeroU64::new(DEFAULT_CHANNEL_COUNT).unwrap_or(NonZeroU64::MIN),
        }
    }
}

impl ChannelPool {
    pub fn new(size: NonZeroU64) -> Self {
        Self { size }
    }

    pub fn size(&self) -> NonZeroU64 {
        self.size
    }

    /// Channel the message with the given sequence number is published to
    pub fn channel_for(&self, sequence: Sequence) -> Channel {
        Channel::numbered(assign(sequence, self.size))
    }

    /// All channels of the pool in ascending order
    pub fn channels(&self) -> impl Iterator<Item = Channel> {
        (1..=self.size.get()).map(Channel::numbered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn ten() -> NonZeroU64 {
        NonZeroU64::new(10).unwrap()
    }

    fn seq(value: u64) -> Sequence {
        Sequence::new(value).unwrap()
    }

    #[test]
    fn assignment_wraps_around() {
        assert_eq!(assign(seq(1), ten()), 1);
        assert_eq!(assign(seq(10), ten()), 10);
        assert_eq!(assign(seq(11), ten()), 1);
        assert_eq!(assign(seq(25), ten()), 5);
    }

    #[test]
    fn assignment_stays_in_range() {
        for n in 1..=7 {
            let n = NonZeroU64::new(n).unwrap();

            for k in 1..=50 {
                let index = assign(seq(k), n);
                assert!(index >= 1 && index <= n.get());
            }
        }

        assert_eq!(assign(seq(u64::MAX), NonZeroU64::new(1).unwrap()), 1);
    }

    #[test]
    fn assignment_is_idempotent() {
        for k in 1..=30 {
            assert_eq!(assign(seq(k), ten()), assign(seq(k), ten()));
        }
    }

    #[test]
    fn two_rounds_hit_every_channel_twice() {
        let pool = ChannelPool::new(ten());
        let mut hits: HashMap<Channel, usize> = HashMap::new();

        let mut sequence = Sequence::first();
        for _ in 0..20 {
            *hits.entry(pool.channel_for(sequence)).or_default() += 1;
            sequence = sequence.next();
        }

        assert_eq!(hits.len(), 10);
        assert!(pool.channels().all(|channel| hits.get(&channel) == Some(&2)));
    }

    #[test]
    fn sequences_start_at_one() {
        assert_eq!(Sequence::new(0), None);
        assert_eq!(Sequence::first().get(), 1);
        assert_eq!(Sequence::first().next().get(), 2);
        assert_eq!(seq(u64::MAX).next().get(), u64::MAX);
    }

    #[test]
    fn channels_are_numbered() {
        let pool = ChannelPool::new(NonZeroU64::new(3).unwrap());

        assert_eq!(
            pool.channels().map(|c| c.to_string()).collect::<Vec<_>>(),
            vec!["channel_1", "channel_2", "channel_3"]
        );
        assert_eq!(pool.channel_for(seq(4)), Channel::from("channel_1"));
        assert_eq!(ChannelPool::default().size().get(), DEFAULT_CHANNEL_COUNT);
    }
}
