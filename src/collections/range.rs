//! Lazy integer ranges.

/// A half-open integer range with a non-zero step.
///
/// `0..5` yields 0 through 4; `5..0 step -2` yields 5, 3, 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: i64,
    pub end: i64,
    pub step: i64,
}

impl Range {
    pub fn new(start: i64, end: i64, step: i64) -> Result<Self, &'static str> {
        if step == 0 {
            return Err("range step cannot be zero");
        }
        Ok(Self { start, end, step })
    }

    /// Number of elements the range yields.
    pub fn len(&self) -> usize {
        let span = if self.step > 0 {
            (self.end as i128) - (self.start as i128)
        } else {
            (self.start as i128) - (self.end as i128)
        };
        if span <= 0 {
            return 0;
        }
        let step = (self.step as i128).abs();
        ((span + step - 1) / step) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`, if within the range.
    pub fn get(&self, index: usize) -> Option<i64> {
        if index >= self.len() {
            return None;
        }
        Some(self.start + self.step * index as i64)
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> {
        let range = *self;
        (0..range.len()).map(move |i| range.start + range.step * i as i64)
    }

    /// Materialize every element.
    pub fn to_vec(&self) -> Vec<i64> {
        self.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ascending() {
        let range = Range::new(0, 5, 1).unwrap();
        assert_eq!(range.len(), 5);
        assert_eq!(range.to_vec(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_stepped_and_descending() {
        assert_eq!(Range::new(0, 10, 3).unwrap().to_vec(), vec![0, 3, 6, 9]);
        assert_eq!(Range::new(5, 0, -2).unwrap().to_vec(), vec![5, 3, 1]);
    }

    #[test]
    fn test_empty_when_direction_mismatches() {
        let range = Range::new(5, 0, 1).unwrap();
        assert!(range.is_empty());
        assert_eq!(range.get(0), None);
    }

    #[test]
    fn test_zero_step_rejected() {
        assert!(Range::new(0, 1, 0).is_err());
    }

    #[test]
    fn test_get() {
        let range = Range::new(10, 20, 5).unwrap();
        assert_eq!(range.get(1), Some(15));
        assert_eq!(range.get(2), None);
    }
}
