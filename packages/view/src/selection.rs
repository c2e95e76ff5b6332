//! View selection, including the "fake" selection used when the real DOM
//! selection cannot express what is selected (a whole widget, for example).

use crate::position::{ViewPosition, ViewRange};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSelection {
    ranges: Vec<ViewRange>,
    backward: bool,
    fake: bool,
    fake_label: String,
}

impl ViewSelection {
    pub fn ranges(&self) -> &[ViewRange] {
        &self.ranges
    }

    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn first_range(&self) -> Option<&ViewRange> {
        self.ranges.iter().min_by(|a, b| {
            a.start()
                .compare(b.start())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    pub fn is_backward(&self) -> bool {
        self.backward
    }

    pub fn is_collapsed(&self) -> bool {
        self.ranges.len() == 1 && self.ranges[0].is_collapsed()
    }

    pub fn anchor(&self) -> Option<&ViewPosition> {
        let range = self.ranges.last()?;
        Some(if self.backward { range.end() } else { range.start() })
    }

    pub fn focus(&self) -> Option<&ViewPosition> {
        let range = self.ranges.last()?;
        Some(if self.backward { range.start() } else { range.end() })
    }

    pub fn is_fake(&self) -> bool {
        self.fake
    }

    pub fn fake_label(&self) -> &str {
        &self.fake_label
    }

    pub(crate) fn set_to(&mut self, ranges: Vec<ViewRange>, backward: bool) {
        self.backward = backward && !ranges.is_empty();
        self.ranges = ranges;
    }

    pub(crate) fn set_fake(&mut self, fake: bool, label: impl Into<String>) {
        self.fake = fake;
        self.fake_label = if fake { label.into() } else { String::new() };
    }
}
