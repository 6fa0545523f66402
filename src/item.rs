//! Work items carried by the queue.
//!
//! Producers build [`WorkItem`] values and hand them to a
//! [`QueueProducer`](crate::queue::QueueProducer); the worker consumes each
//! one exactly once. Callback items become a [`Batch`] before they reach the
//! transport.

use serde::Serialize;
use serde_json::{Map, Value};

/// Free-form per-item options, kept as a JSON object map.
pub type Options = Map<String, Value>;

/// A single unit of work taken from the queue.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkItem {
    /// Ship `lines` through the transport.
    Callback { lines: Vec<String>, options: Options },
    /// Start watching a new file pattern.
    AddGlob { pattern: String, options: Options },
    /// Stop the worker.
    Exit,
}

impl WorkItem {
    /// Build a callback item with no options.
    pub fn callback<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Callback {
            lines: lines.into_iter().map(Into::into).collect(),
            options: Options::new(),
        }
    }

    /// Build a glob item with no options.
    pub fn add_glob(pattern: impl Into<String>) -> Self {
        Self::AddGlob {
            pattern: pattern.into(),
            options: Options::new(),
        }
    }

    /// Short tag used in log messages.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkItem::Callback { .. } => "callback",
            WorkItem::AddGlob { .. } => "addglob",
            WorkItem::Exit => "exit",
        }
    }
}

/// Lines ready for delivery, together with the options they were queued with.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Batch {
    pub lines: Vec<String>,
    pub options: Options,
}

impl Batch {
    /// Build a batch, dropping zero-length lines when `ignore_empty` is set.
    pub fn new(lines: Vec<String>, options: Options, ignore_empty: bool) -> Self {
        let lines = if ignore_empty {
            lines.into_iter().filter(|line| !line.is_empty()).collect()
        } else {
            lines
        };
        Self { lines, options }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(true, vec!["a", "b"])]
    #[case(false, vec!["a", "", "b", ""])]
    fn batch_filters_only_when_requested(#[case] ignore_empty: bool, #[case] expected: Vec<&str>) {
        let lines = vec!["a".into(), "".into(), "b".into(), "".into()];
        let batch = Batch::new(lines, Options::new(), ignore_empty);
        assert_eq!(batch.lines, expected);
    }

    #[rstest]
    fn all_empty_batch_is_empty_when_filtered() {
        let batch = Batch::new(vec![String::new(); 3], Options::new(), true);
        assert!(batch.is_empty());
    }

    #[rstest]
    fn whitespace_lines_are_not_zero_length() {
        let batch = Batch::new(vec![" ".into(), "\t".into()], Options::new(), true);
        assert_eq!(batch.len(), 2);
    }

    #[rstest]
    fn kinds_are_stable() {
        assert_eq!(WorkItem::callback(["x"]).kind(), "callback");
        assert_eq!(WorkItem::add_glob("*.log").kind(), "addglob");
        assert_eq!(WorkItem::Exit.kind(), "exit");
    }

    proptest! {
        #[test]
        fn filtered_batches_never_hold_empty_lines(
            lines in proptest::collection::vec("[a-z]{0,3}", 0..16)
        ) {
            let batch = Batch::new(lines.clone(), Options::new(), true);
            prop_assert!(batch.lines.iter().all(|line| !line.is_empty()));
            let kept: Vec<_> = lines.iter().filter(|l| !l.is_empty()).cloned().collect();
            prop_assert_eq!(batch.lines, kept);
        }

        #[test]
        fn unfiltered_batches_are_unchanged(
            lines in proptest::collection::vec("[a-z]{0,3}", 0..16)
        ) {
            let batch = Batch::new(lines.clone(), Options::new(), false);
            prop_assert_eq!(batch.lines, lines);
        }
    }
}
