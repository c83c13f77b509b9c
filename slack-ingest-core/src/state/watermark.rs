use super::SlackTs;

/// Highest timestamp ever accepted.
///
/// An unset watermark admits every timestamp; once set it only moves
/// forward.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watermark(Option<SlackTs>);

impl Watermark {
    pub fn new(ts: Option<SlackTs>) -> Self {
        Self(ts)
    }

    pub fn get(&self) -> Option<&SlackTs> {
        self.0.as_ref()
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// Whether an event at `ts` is newer than everything accepted so far.
    pub fn admits(&self, ts: &SlackTs) -> bool {
        match &self.0 {
            Some(current) => ts > current,
            None => true,
        }
    }

    /// The watermark after accepting an event at `ts`.
    pub fn advanced_to(&self, ts: &SlackTs) -> SlackTs {
        match &self.0 {
            Some(current) if current >= ts => current.clone(),
            _ => ts.clone(),
        }
    }

    pub(crate) fn set(&mut self, ts: SlackTs) {
        if self.admits(&ts) {
            self.0 = Some(ts);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ts(s: &str) -> SlackTs {
        s.parse().unwrap()
    }

    #[test]
    fn test_unset_admits_everything() {
        let watermark = Watermark::default();
        assert!(watermark.admits(&ts("0")));
        assert!(watermark.admits(&ts("1.0")));
        assert_eq!(watermark.advanced_to(&ts("3.0")), ts("3.0"));
    }

    #[test]
    fn test_never_moves_backwards() {
        let mut watermark = Watermark::new(Some(ts("100.1")));
        assert!(!watermark.admits(&ts("100.1")));
        assert!(!watermark.admits(&ts("50.0")));
        assert!(watermark.admits(&ts("100.2")));

        watermark.set(ts("50.0"));
        assert_eq!(watermark.get(), Some(&ts("100.1")));
        watermark.set(ts("200.0"));
        assert_eq!(watermark.get(), Some(&ts("200.0")));
    }
}
