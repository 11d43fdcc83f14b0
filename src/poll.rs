use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::store::{SqliteStore, Submission};

/// Monthly token-of-the-month poll over the submissions table.
pub struct PollService {
    store: SqliteStore,
    sample_size: usize,
}

#[derive(Debug, PartialEq)]
pub enum SubmitOutcome {
    Accepted(Submission),
    AlreadySubmitted,
}

impl PollService {
    pub fn new(store: SqliteStore, sample_size: usize) -> Self {
        Self { store, sample_size }
    }

    /// Persist a submission for the current period, unless the same
    /// token_name/symbol pair (case-insensitive) was already submitted on
    /// or after the first day of the period. Rejections persist nothing.
    pub fn submit(
        &self,
        token_name: &str,
        symbol: &str,
        description: &str,
        today: NaiveDate,
    ) -> Result<SubmitOutcome> {
        let start = period_start(today);
        if self
            .store
            .submission_exists_since(token_name, symbol, start)?
        {
            log::info!("poll.submit.duplicate token={token_name} symbol={symbol}");
            return Ok(SubmitOutcome::AlreadySubmitted);
        }

        let submission = self
            .store
            .insert_submission(token_name, symbol, description, today)?;
        log::info!(
            "poll.submit.accepted token={token_name} symbol={symbol} id={}",
            submission.id
        );
        Ok(SubmitOutcome::Accepted(submission))
    }

    /// Up to `sample_size` submissions with dates in the inclusive range,
    /// uniformly shuffled before the cap so the cut is a random sample
    /// without replacement.
    pub fn draw(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Submission>> {
        let mut rows = self.store.find_submissions_in_range(from, to)?;
        let eligible = rows.len();

        let mut rng = SmallRng::seed_from_u64(rand::random());
        rows.shuffle(&mut rng);
        rows.truncate(self.sample_size);

        log::info!("poll.draw eligible={eligible} sampled={}", rows.len());
        Ok(rows)
    }
}

/// First day of the submission period containing `today`.
pub fn period_start(today: NaiveDate) -> NaiveDate {
    today
        .with_day(1)
        .expect("day 1 is valid in every month")
}

/// First day of the following period. Adding 32 days to the period start
/// lands in the next month for every 28-31 day month before the
/// renormalization to day 1.
pub fn next_period_start(today: NaiveDate) -> NaiveDate {
    (period_start(today) + Duration::days(32))
        .with_day(1)
        .expect("day 1 is valid in every month")
}

/// Human label for the period containing `date`, e.g. "August 2026".
pub fn period_label(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}
