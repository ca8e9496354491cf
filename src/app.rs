use std::collections::BTreeMap;

use anyhow::{Result, bail};
use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::config::Config;
use crate::engine::difficulty::{DifficultyTier, PerformanceState};
use crate::engine::finesse::{FinesseMove, FinesseTarget, all_pattern_ids, generate_target, resolve_target};
use crate::engine::mastery::MasteryCard;
use crate::engine::pattern::PatternId;
use crate::engine::piece::PieceType;
use crate::engine::random::RandomSource;
use crate::engine::scheduler::{SchedulingBias, SelectionTier, select_next_pattern_biased};
use crate::engine::stats::{
    MasteryStats, PatternStats, PieceGrid, calculate_mastery_stats, mastery_grid, pattern_stats,
};
use crate::session::clock::{Clock, SystemClock};
use crate::session::drill::DrillState;
use crate::session::input::{self, DropEvent, MoveOutcome};
use crate::session::progress::{CurrentSession, LearningProgress, RecordOutcome, SessionRecord};
use crate::session::result::AttemptResult;
use crate::store::json_store::JsonStore;
use crate::store::schema::{EXPORT_VERSION, ExportData, ProgressData};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PracticeMode {
    /// Spaced-repetition selection over the enabled pattern universe.
    #[default]
    Adaptive,
    /// Uniformly random targets; results are still recorded.
    FreePlay,
}

impl PracticeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PracticeMode::Adaptive => "adaptive",
            PracticeMode::FreePlay => "free-play",
        }
    }
}

pub struct App {
    pub config: Config,
    pub practice_mode: PracticeMode,
    pub drill: Option<DrillState>,
    pub last_result: Option<AttemptResult>,
    pub last_tier: Option<SelectionTier>,
    progress: LearningProgress,
    performance: PerformanceState,
    store: Option<JsonStore>,
    rng: SmallRng,
    clock: Box<dyn Clock>,
    pattern_universe: Vec<PatternId>,
}

impl App {
    /// Load config and progress from the default locations.
    pub fn new() -> Self {
        let config = Config::load().unwrap_or_else(|e| {
            warn!("could not load config: {e}; using defaults");
            Config::default()
        });
        let store = match JsonStore::new() {
            Ok(store) => Some(store),
            Err(e) => {
                warn!("progress will not be saved: {e}");
                None
            }
        };
        Self::with_parts(config, store, SmallRng::from_entropy(), Box::new(SystemClock))
    }

    pub fn with_parts(
        mut config: Config,
        store: Option<JsonStore>,
        rng: SmallRng,
        clock: Box<dyn Clock>,
    ) -> Self {
        config.validate();
        let now = clock.now();

        let progress = match store {
            Some(ref s) => {
                if s.check_interrupted_import() {
                    info!("recovered from an interrupted import");
                }
                s.load_progress().into_progress(now)
            }
            None => LearningProgress::new(now),
        };

        let performance = PerformanceState::with_manual_tier(config.manual_tier());
        let pattern_universe = all_pattern_ids(&config.enabled_pieces());
        debug!(
            "loaded {} cards, {} patterns enabled",
            progress.cards.len(),
            pattern_universe.len()
        );

        Self {
            config,
            practice_mode: PracticeMode::Adaptive,
            drill: None,
            last_result: None,
            last_tier: None,
            progress,
            performance,
            store,
            rng,
            clock,
            pattern_universe,
        }
    }

    pub fn progress(&self) -> &LearningProgress {
        &self.progress
    }

    pub fn performance(&self) -> &PerformanceState {
        &self.performance
    }

    pub fn pattern_universe(&self) -> &[PatternId] {
        &self.pattern_universe
    }

    pub fn session_history(&self) -> &[SessionRecord] {
        &self.progress.session_history
    }

    fn scheduling_bias(&self) -> SchedulingBias {
        if self.config.adaptive_bias {
            self.performance.scheduling_bias()
        } else {
            SchedulingBias::default()
        }
    }

    /// What to spawn next under spaced repetition. `None` when no pieces are
    /// enabled.
    pub fn select_next_learning_pattern(&mut self) -> Option<FinesseTarget> {
        let bias = self.scheduling_bias();
        let (id, tier) = select_next_pattern_biased(
            &self.progress.cards,
            &self.pattern_universe,
            self.progress.global_repetition_count,
            self.progress.last_mastered_review_at,
            &bias,
            &mut self.rng,
        )?;
        debug!("selected {id} via {tier:?}");
        self.last_tier = Some(tier);
        resolve_target(&id)
    }

    pub fn free_play_target(&mut self) -> Option<FinesseTarget> {
        let pieces = self.config.enabled_pieces();
        if pieces.is_empty() {
            return None;
        }
        let piece = pieces[self.rng.next_index(pieces.len())];
        self.last_tier = None;
        Some(generate_target(piece, &mut self.rng))
    }

    pub fn next_target(&mut self) -> Option<FinesseTarget> {
        match self.practice_mode {
            PracticeMode::Adaptive => self.select_next_learning_pattern().or_else(|| {
                info!("no practice pattern available, falling back to free play");
                self.free_play_target()
            }),
            PracticeMode::FreePlay => self.free_play_target(),
        }
    }

    /// Spawn the next piece. Any drill in flight is abandoned unrecorded.
    pub fn start_drill(&mut self) -> Option<&DrillState> {
        let target = self.next_target()?;
        self.drill = Some(DrillState::new(
            target,
            self.clock.now(),
            self.config.retry_on_fault,
        ));
        self.drill.as_ref()
    }

    /// Practice a specific pattern regardless of scheduling.
    pub fn start_drill_for(&mut self, id: &PatternId) -> Option<&DrillState> {
        let target = resolve_target(id)?;
        self.drill = Some(DrillState::new(
            target,
            self.clock.now(),
            self.config.retry_on_fault,
        ));
        self.drill.as_ref()
    }

    pub fn process_move(&mut self, mv: FinesseMove) -> Option<MoveOutcome> {
        let now = self.clock.now();
        let drill = self.drill.as_mut()?;
        let outcome = input::process_move(drill, mv, now);
        if outcome == MoveOutcome::Fault {
            debug!("fault on {} after {mv}", drill.target.pattern_id());
        }
        Some(outcome)
    }

    /// Judge a drop against the active drill and feed the verdict to the
    /// mastery cards and the difficulty adapter.
    pub fn handle_drop(&mut self, event: DropEvent) -> Option<AttemptResult> {
        let drill = self.drill.take()?;
        let now = self.clock.now();
        let result = AttemptResult::from_drop(&drill, &event, now);

        self.apply_result(result.pattern_id, result.correct);
        self.performance
            .record_attempt(result.correct, result.response_time_ms);
        info!(
            "{} {} in {:.0}ms",
            result.pattern_id,
            if result.correct { "correct" } else { "missed" },
            result.response_time_ms
        );

        self.save_progress();
        self.last_result = Some(result.clone());
        Some(result)
    }

    /// Report the outcome of a placement judged elsewhere. Equivalent
    /// rotations share one card, keyed by the orientation layer.
    pub fn record_result(
        &mut self,
        piece: PieceType,
        column: u8,
        rotation: u8,
        correct: bool,
    ) -> RecordOutcome {
        let id = PatternId::new(piece, column, piece.layer_for_rotation(rotation) as u8);
        if resolve_target(&id).is_none() {
            warn!("{id} has no finesse data; recording anyway");
        }
        let outcome = self.apply_result(id, correct);
        self.save_progress();
        outcome
    }

    pub fn record_attempt(&mut self, correct: bool, response_time_ms: f64) {
        self.performance.record_attempt(correct, response_time_ms);
    }

    fn apply_result(&mut self, id: PatternId, correct: bool) -> RecordOutcome {
        let now = self.clock.now();
        let outcome = self
            .progress
            .record_result(id, correct, now, self.config.review_policy());
        if outcome.newly_mastered() {
            info!("mastered {id}");
        }
        outcome
    }

    pub fn get_pattern_stats(&self, id: &PatternId) -> Option<PatternStats> {
        self.progress.card(id).map(pattern_stats)
    }

    pub fn get_mastery_grid(&self) -> Vec<PieceGrid> {
        mastery_grid(&self.progress.cards, &self.config.enabled_pieces())
    }

    pub fn get_overall_stats(&self) -> MasteryStats {
        let enabled = &self.pattern_universe;
        let cards: BTreeMap<PatternId, MasteryCard> = self
            .progress
            .cards
            .iter()
            .filter(|(id, _)| enabled.contains(*id))
            .map(|(id, card)| (*id, card.clone()))
            .collect();
        calculate_mastery_stats(&cards, enabled.len())
    }

    /// Close the running session (if it has attempts) and open a fresh one.
    pub fn start_new_session(&mut self) {
        self.end_session();
        self.progress.current_session = CurrentSession::new(self.clock.now());
    }

    pub fn end_session(&mut self) -> Option<SessionRecord> {
        let record = self
            .progress
            .end_session(self.clock.now(), self.config.session_history_cap)?;
        info!(
            "session ended: {}/{} correct, {} patterns",
            record.correct_attempts, record.total_attempts, record.distinct_patterns_reviewed
        );
        self.save_progress();
        Some(record)
    }

    /// Hard reset of all durable state. A manual tier survives.
    pub fn reset_progress(&mut self) {
        warn!("resetting all progress");
        self.progress.reset(self.clock.now());
        self.performance.reset(true);
        self.drill = None;
        self.last_result = None;
        self.save_progress();
    }

    /// `None` returns the adapter to automatic tier selection.
    pub fn set_manual_tier(&mut self, tier: Option<DifficultyTier>) {
        self.performance.set_manual_tier(tier);
        self.config.difficulty_tier = match tier {
            Some(tier) => tier.to_key().to_string(),
            None => "auto".to_string(),
        };
    }

    pub fn export(&self) -> ExportData {
        ExportData {
            finessr_export_version: EXPORT_VERSION,
            exported_at: self.clock.now(),
            config: self.config.clone(),
            progress: ProgressData::from_progress(&self.progress),
        }
    }

    /// Replace progress and config with an export's. The running session
    /// restarts.
    pub fn import(&mut self, data: ExportData) -> Result<()> {
        if data.finessr_export_version != EXPORT_VERSION {
            bail!(
                "Unsupported export version: {} (expected {})",
                data.finessr_export_version,
                EXPORT_VERSION
            );
        }
        if let Some(ref store) = self.store {
            store.import_all(&data)?;
        } else if data.progress.needs_reset() {
            bail!(
                "Unsupported progress schema version: {}",
                data.progress.schema_version
            );
        }

        let mut config = data.config;
        config.validate();
        self.pattern_universe = all_pattern_ids(&config.enabled_pieces());
        self.performance = PerformanceState::with_manual_tier(config.manual_tier());
        self.config = config;
        self.progress = data.progress.into_progress(self.clock.now());
        self.drill = None;
        info!("imported {} cards", self.progress.cards.len());
        Ok(())
    }

    fn save_progress(&self) {
        if let Some(ref store) = self.store
            && let Err(e) = store.save_progress(&ProgressData::from_progress(&self.progress))
        {
            warn!("failed to save progress: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::finesse::FinesseMove::*;
    use crate::session::clock::FixedClock;
    use chrono::{Duration, TimeZone, Utc};
    use std::rc::Rc;
    use tempfile::TempDir;

    fn clock() -> Rc<FixedClock> {
        Rc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 4, 1, 18, 0, 0).unwrap(),
        ))
    }

    fn test_app(config: Config) -> (App, Rc<FixedClock>) {
        let clock = clock();
        let app = App::with_parts(
            config,
            None,
            SmallRng::seed_from_u64(7),
            Box::new(Rc::clone(&clock)),
        );
        (app, clock)
    }

    fn t_only() -> Config {
        Config {
            pieces: vec!["T".to_string()],
            ..Config::default()
        }
    }

    fn perfect_drop(drill: &DrillState) -> DropEvent {
        let target = &drill.target;
        DropEvent {
            piece: target.piece,
            landing_column: target.column,
            landing_rotation: target.rotation,
            moves: target.sequences[0].clone(),
            response_time_ms: Some(600.0),
        }
    }

    #[test]
    fn test_universe_follows_enabled_pieces() {
        let (app, _) = test_app(t_only());
        assert_eq!(app.pattern_universe().len(), 34);
        assert!(app.pattern_universe().iter().all(|id| id.piece == PieceType::T));
    }

    #[test]
    fn test_first_selection_is_unreviewed() {
        let (mut app, _) = test_app(t_only());
        let target = app.select_next_learning_pattern().unwrap();
        assert_eq!(target.piece, PieceType::T);
        assert_eq!(app.last_tier, Some(SelectionTier::Unreviewed));
    }

    #[test]
    fn test_drop_flow_records_everything() {
        let (mut app, clock) = test_app(t_only());
        app.start_drill().unwrap();
        clock.advance(Duration::milliseconds(600));
        let event = perfect_drop(app.drill.as_ref().unwrap());
        let result = app.handle_drop(event).unwrap();

        assert!(result.correct);
        assert!(app.drill.is_none());
        assert_eq!(app.progress().global_repetition_count, 1);
        assert_eq!(app.performance().sample_count(), 1);
        assert_eq!(app.progress().current_session.attempts, 1);
        let stats = app.get_pattern_stats(&result.pattern_id).unwrap();
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats.accuracy, 1.0);
    }

    #[test]
    fn test_drop_without_drill_is_ignored() {
        let (mut app, _) = test_app(t_only());
        let event = DropEvent {
            piece: PieceType::T,
            landing_column: 0,
            landing_rotation: 0,
            moves: vec![DasLeft, HardDrop],
            response_time_ms: None,
        };
        assert!(app.handle_drop(event).is_none());
        assert_eq!(app.progress().global_repetition_count, 0);
    }

    #[test]
    fn test_record_result_merges_equivalent_rotations() {
        let config = Config {
            pieces: vec!["Z".to_string()],
            ..Config::default()
        };
        let (mut app, _) = test_app(config);
        for _ in 0..6 {
            app.record_result(PieceType::Z, 3, 2, true);
        }

        let id = PatternId::new(PieceType::Z, 3, 0);
        assert_eq!(app.progress().cards.keys().collect::<Vec<_>>(), vec![&id]);
        assert_eq!(app.get_pattern_stats(&id).unwrap().attempts, 6);
        let stats = app.get_overall_stats();
        assert_eq!(stats.mastered_count, 1);
        assert_eq!(stats.not_started_count, 16);

        let outcome = app.record_result(PieceType::Z, 5, 3, false);
        assert_eq!(outcome.card.pattern_id, PatternId::new(PieceType::Z, 5, 1));
    }

    #[test]
    fn test_retry_on_fault_spoils_attempt() {
        let config = Config {
            retry_on_fault: true,
            ..t_only()
        };
        let (mut app, _) = test_app(config);
        app.start_drill_for(&PatternId::new(PieceType::T, 0, 0)).unwrap();
        assert_eq!(app.process_move(DasRight), Some(MoveOutcome::Fault));
        assert_eq!(app.process_move(DasLeft), Some(MoveOutcome::Accepted));
        assert_eq!(app.process_move(HardDrop), Some(MoveOutcome::Accepted));

        let event = perfect_drop(app.drill.as_ref().unwrap());
        let result = app.handle_drop(event).unwrap();
        assert!(!result.correct);
        assert_eq!(result.faults, 1);
    }

    #[test]
    fn test_sessions_and_history() {
        let (mut app, clock) = test_app(t_only());
        assert!(app.end_session().is_none());

        app.record_result(PieceType::T, 2, 0, true);
        app.record_result(PieceType::T, 3, 0, false);
        clock.advance(Duration::minutes(5));
        let record = app.end_session().unwrap();
        assert_eq!(record.total_attempts, 2);
        assert_eq!(record.correct_attempts, 1);
        assert_eq!(app.session_history().len(), 1);

        app.record_result(PieceType::T, 2, 0, true);
        app.start_new_session();
        assert_eq!(app.session_history().len(), 2);
        assert_eq!(app.progress().current_session.attempts, 0);
    }

    #[test]
    fn test_overall_stats_and_grid() {
        let (mut app, _) = test_app(t_only());
        for _ in 0..5 {
            app.record_result(PieceType::T, 0, 0, true);
        }
        app.record_result(PieceType::T, 1, 1, false);

        let stats = app.get_overall_stats();
        assert_eq!(stats.total_patterns, 34);
        assert_eq!(stats.mastered_count, 1);
        assert_eq!(stats.in_progress_count, 1);
        assert_eq!(stats.not_started_count, 32);

        let grid = app.get_mastery_grid();
        assert_eq!(grid.len(), 1);
        assert!(grid[0].orientations[0][0].mastered);
        assert_eq!(grid[0].orientations[1][1].accuracy, 0.0);
    }

    #[test]
    fn test_reset_keeps_manual_tier() {
        let (mut app, _) = test_app(t_only());
        app.set_manual_tier(Some(DifficultyTier::Insane));
        app.record_result(PieceType::T, 0, 0, true);
        app.reset_progress();
        assert!(app.progress().cards.is_empty());
        assert_eq!(app.performance().difficulty_tier, DifficultyTier::Insane);
        assert_eq!(app.config.difficulty_tier, "insane");

        app.set_manual_tier(None);
        assert_eq!(app.config.manual_tier(), None);
    }

    #[test]
    fn test_free_play_uses_enabled_pieces() {
        let config = Config {
            pieces: vec!["O".to_string()],
            ..Config::default()
        };
        let (mut app, _) = test_app(config);
        app.practice_mode = PracticeMode::FreePlay;
        for _ in 0..10 {
            let target = app.next_target().unwrap();
            assert_eq!(target.piece, PieceType::O);
            assert!(!target.sequences.is_empty());
        }
        assert_eq!(app.last_tier, None);
    }

    #[test]
    fn test_export_import_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap();
        let mut app = App::with_parts(
            t_only(),
            Some(store),
            SmallRng::seed_from_u64(1),
            Box::new(clock()),
        );
        app.record_result(PieceType::T, 4, 2, true);
        let export = app.export();

        app.reset_progress();
        assert!(app.progress().cards.is_empty());

        app.import(export.clone()).unwrap();
        assert_eq!(app.progress().cards, export.progress.cards);

        let reopened = App::with_parts(
            Config::default(),
            Some(JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap()),
            SmallRng::seed_from_u64(2),
            Box::new(clock()),
        );
        assert_eq!(reopened.progress().cards.len(), 1);
    }

    #[test]
    fn test_import_rejects_unknown_version() {
        let (mut app, _) = test_app(t_only());
        let mut export = app.export();
        export.finessr_export_version = 42;
        let err = app.import(export).unwrap_err().to_string();
        assert!(err.contains("42"));
    }
}
