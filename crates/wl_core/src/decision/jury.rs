use super::Vote;

/// Jury member votes on the last decided attempt. The president's ruling is a
/// separate command; member votes only inform it.
#[derive(Debug, Clone)]
pub struct JuryPanel {
    votes: Vec<Option<Vote>>,
    announced: bool,
}

impl JuryPanel {
    pub fn new(size: u8) -> Self {
        Self { votes: vec![None; usize::from(size)], announced: false }
    }

    /// `member` is 1-based. Returns all votes the first time the panel is complete.
    pub fn record(&mut self, member: u8, vote: Vote) -> Option<Vec<Vote>> {
        let idx = usize::from(member).checked_sub(1)?;
        let slot = self.votes.get_mut(idx)?;
        *slot = Some(vote);
        if self.announced {
            return None;
        }
        let complete: Option<Vec<Vote>> = self.votes.iter().copied().collect();
        if complete.is_some() {
            self.announced = true;
        }
        complete
    }

    pub fn accepts(&self, member: u8) -> bool {
        (1..=self.votes.len()).contains(&usize::from(member))
    }

    pub fn reset(&mut self) {
        self.votes.iter_mut().for_each(|v| *v = None);
        self.announced = false;
    }
}
