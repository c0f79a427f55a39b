//! Contest lifecycle use cases.

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::domain::voting::select_winner;
use crate::domain::{
    AppError, Contest, ContestEndResult, ContestStatus, CreateContestRequest, EntityId,
    ValidationError,
};

use super::service::{AppService, validate};

/// Outcome of one scheduler pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerTick {
    pub started: Vec<EntityId>,
    pub ended: Vec<EntityId>,
    pub failed: usize,
}

impl AppService {
    /// Creates a draft contest.
    #[instrument(skip(self, request), fields(title = %request.title))]
    pub async fn create_contest(&self, request: &CreateContestRequest) -> Result<Contest, AppError> {
        validate(request, "create contest")?;
        if request.end_time <= request.start_time {
            return Err(AppError::Validation(ValidationError::field(
                "end_time",
                "must be after start_time",
            )));
        }

        let contest = self.db_client.create_contest(request).await?;
        info!(contest_id = contest.id, "Contest created");
        Ok(contest)
    }

    /// Opens a draft contest for submissions and votes.
    ///
    /// # Errors
    ///
    /// `Conflict` when the contest is not a draft or another one is active.
    #[instrument(skip(self))]
    pub async fn start_contest(&self, id: EntityId) -> Result<Contest, AppError> {
        let contest = self.db_client.start_contest(id).await?;
        info!(contest_id = id, "Contest started");
        Ok(contest)
    }

    /// Closes an active contest and archives its memes.
    ///
    /// The meme with the most SAMU wins; ties go to the earliest submission.
    /// A contest without memes ends without a winner.
    #[instrument(skip(self))]
    pub async fn end_contest(&self, id: EntityId) -> Result<ContestEndResult, AppError> {
        self.end_contest_at(id, Utc::now()).await
    }

    async fn end_contest_at(
        &self,
        id: EntityId,
        now: DateTime<Utc>,
    ) -> Result<ContestEndResult, AppError> {
        let contest = self.get_contest(id).await?;
        if contest.status != ContestStatus::Active {
            return Err(AppError::Conflict(format!(
                "contest {id} is {} and cannot be ended",
                contest.status
            )));
        }

        let memes = self.db_client.memes_by_contest(id).await?;
        let winner = select_winner(&memes).map(|m| m.id);
        let contest = self.db_client.end_contest(id, winner, now).await?;

        metrics::counter!("contests_ended_total").increment(1);
        info!(
            contest_id = id,
            winner_meme_id = ?winner,
            archived = memes.len(),
            "Contest ended"
        );

        Ok(ContestEndResult {
            contest,
            archived_count: memes.len(),
        })
    }

    pub async fn get_current_contest(&self) -> Result<Option<Contest>, AppError> {
        self.db_client.get_active_contest().await
    }

    pub async fn list_contests(&self) -> Result<Vec<Contest>, AppError> {
        self.db_client.list_contests().await
    }

    #[instrument(skip(self))]
    pub async fn get_contest(&self, id: EntityId) -> Result<Contest, AppError> {
        self.db_client
            .get_contest(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("contest {id}")))
    }

    /// Ends overdue active contests, then starts the earliest due draft when
    /// no contest is active.
    ///
    /// A contest that fails to transition is logged and retried on the next pass.
    #[instrument(skip(self))]
    pub async fn run_scheduler_tick(&self, now: DateTime<Utc>) -> Result<SchedulerTick, AppError> {
        let mut tick = SchedulerTick::default();

        let active = self
            .db_client
            .list_contests_by_status(ContestStatus::Active)
            .await?;
        let mut still_active = false;
        for contest in active {
            if !contest.is_due_to_end(now) {
                still_active = true;
                continue;
            }
            match self.end_contest_at(contest.id, now).await {
                Ok(_) => tick.ended.push(contest.id),
                Err(e) => {
                    warn!(contest_id = contest.id, error = ?e, "Scheduled contest end failed");
                    tick.failed += 1;
                    still_active = true;
                }
            }
        }

        if still_active {
            return Ok(tick);
        }

        let mut due: Vec<Contest> = self
            .db_client
            .list_contests_by_status(ContestStatus::Draft)
            .await?
            .into_iter()
            .filter(|c| c.is_due_to_start(now))
            .collect();
        due.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));

        if let Some(next) = due.first() {
            match self.start_contest(next.id).await {
                Ok(_) => tick.started.push(next.id),
                Err(e) => {
                    warn!(contest_id = next.id, error = ?e, "Scheduled contest start failed");
                    tick.failed += 1;
                }
            }
        }

        Ok(tick)
    }
}
