//! Move orchestration across timelines.

use timeweave_engine::{
    apply_move, exposes_king, find_legal_move, is_in_check,
    transfer::{arrival_record, departure_record},
    MoveSelector, SelectionContext,
};
use timeweave_types::{
    board::{Color, PieceKind},
    config::SessionConfig,
    events::RenderEvent,
    fen,
    game::{GameState, Move, Verdict},
    persist::SavedSession,
    Result, TimelineId, TimeweaveError,
};
use tracing::{debug, info, warn};

use crate::{
    probe::{MutationProbe, MutationStep},
    registry::TimelineRegistry,
    render::{dispatch, NullObserver, RenderObserver},
    request::{AppliedMove, MoveClass, MoveOutcome, MoveRequest},
    timeline::Timeline,
    transaction::Transaction,
};

type Records = (Vec<(TimelineId, Move)>, Option<TimelineId>);

/// Owns the registry and turns move requests into committed changes.
///
/// Multi-timeline moves run inside a [`Transaction`]; the observer only hears
/// about a move once it has been committed.
pub struct Session<O: RenderObserver = NullObserver> {
    registry: TimelineRegistry,
    observer: O,
    probe: Option<Box<dyn MutationProbe>>,
    config: SessionConfig,
}

impl<O: RenderObserver> Session<O> {
    /// Starts a session with a single root timeline at `config.initial_fen`.
    pub fn new(config: SessionConfig, observer: O) -> Result<Self> {
        config.validate()?;
        let initial = GameState::from_fen(&config.initial_fen)?;
        let mut registry = TimelineRegistry::new();
        let root = registry.create(None, None, initial)?.id();
        info!("Session started on root timeline {root}");
        Self::from_registry(registry, config, observer)
    }

    pub fn from_registry(
        registry: TimelineRegistry,
        config: SessionConfig,
        observer: O,
    ) -> Result<Self> {
        config.validate()?;
        note_advisories(&registry);
        let mut session = Self {
            registry,
            observer,
            probe: None,
            config,
        };
        session.announce_all();
        Ok(session)
    }

    pub fn restore(saved: &SavedSession, config: SessionConfig, observer: O) -> Result<Self> {
        let registry = checked_registry(saved)?;
        Self::from_registry(registry, config, observer)
    }

    /// Replaces every timeline with those in `saved`. On error the session is
    /// left as it was.
    pub fn load(&mut self, saved: &SavedSession) -> Result<()> {
        let registry = checked_registry(saved)?;
        note_advisories(&registry);
        let previous: Vec<TimelineId> = self.registry.ids().collect();
        self.registry = registry;
        for id in previous {
            self.observer.on_timeline_deleted(id);
        }
        self.announce_all();
        info!("Loaded {} timelines", self.registry.len());
        Ok(())
    }

    pub fn save(&self) -> SavedSession {
        self.registry.to_saved()
    }

    pub fn registry(&self) -> &TimelineRegistry {
        &self.registry
    }

    pub fn timeline(&self, id: TimelineId) -> Result<&Timeline> {
        self.registry.require(id)
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn set_probe<P: MutationProbe + 'static>(&mut self, probe: P) {
        self.probe = Some(Box::new(probe));
    }

    pub fn verdict(&self) -> Verdict {
        self.registry.verdict()
    }

    /// Candidate moves for the current board of `timeline`.
    pub fn legal_moves(&self, timeline: TimelineId) -> Result<Vec<Move>> {
        Ok(self.registry.require(timeline)?.legal_moves())
    }

    /// Timelines where `color` still has a move to make.
    pub fn playable_timelines(&self, color: Color) -> Vec<TimelineId> {
        self.registry
            .active_timelines(color)
            .into_iter()
            .map(Timeline::id)
            .collect()
    }

    /// Works out what kind of move `request` is without changing anything.
    pub fn classify(&self, request: &MoveRequest) -> Result<MoveClass> {
        let source = self.registry.require(request.from.timeline)?;
        if !is_current(source, request.from.ply)? {
            return Err(TimeweaveError::validation(format!(
                "pieces only leave the current board of timeline {}",
                source.id()
            )));
        }
        let target = self.registry.require(request.to.timeline)?;
        if !is_current(target, request.to.ply)? {
            return Ok(MoveClass::TimeTravel);
        }
        Ok(if source.id() == target.id() {
            MoveClass::SameBoard
        } else {
            MoveClass::CrossTimeline
        })
    }

    /// Validates and applies `request`.
    ///
    /// Bad input yields [`MoveOutcome::Rejected`] with nothing changed. Any
    /// other failure rolls back and is returned as an error.
    pub fn request_move(&mut self, request: MoveRequest) -> Result<MoveOutcome> {
        let class = match self.classify(&request) {
            Ok(class) => class,
            Err(err) => return refuse(&request, err),
        };
        let applied = match class {
            MoveClass::SameBoard => self.move_on_board(&request),
            MoveClass::CrossTimeline => self.move_across(&request),
            MoveClass::TimeTravel => self.travel(&request),
        };
        let (records, created) = match applied {
            Ok(records) => records,
            Err(err) => return refuse(&request, err),
        };

        let events = self.render_events(&records, created);
        for event in &events {
            dispatch(&mut self.observer, event);
        }
        let verdict = self.registry.verdict();
        info!("Applied {class:?} move {request}; verdict {verdict:?}");
        Ok(MoveOutcome::Applied(AppliedMove {
            class,
            records,
            created,
            verdict,
        }))
    }

    /// Asks `selector` for a move on `timeline` and plays it. Returns `None`
    /// when there is nothing to play.
    pub async fn play_cpu_turn<S>(
        &mut self,
        selector: &S,
        timeline: TimelineId,
    ) -> Result<Option<MoveOutcome>>
    where
        S: MoveSelector + ?Sized,
    {
        let state = self.registry.require(timeline)?.state().clone();
        let candidates = self.legal_moves(timeline)?;
        if candidates.is_empty() {
            debug!("No candidates on timeline {timeline}");
            return Ok(None);
        }
        let ctx = SelectionContext {
            timeline,
            state,
            candidates,
        };
        let Some(mv) = selector.select(&ctx).await? else {
            warn!("Selector passed on timeline {timeline}");
            return Ok(None);
        };
        self.request_move(MoveRequest::from_move(timeline, &mv))
            .map(Some)
    }

    fn move_on_board(&mut self, request: &MoveRequest) -> Result<Records> {
        let id = request.from.timeline;
        let default_promotion = self.config.default_promotion;
        let timeline = self.registry.require_mut(id)?;
        let mv = find_legal_move(
            timeline.state(),
            request.from.square,
            request.to.square,
            request.promotion,
            default_promotion,
        )
        .ok_or_else(|| {
            TimeweaveError::validation(format!(
                "{}-{} is not legal on timeline {id}",
                request.from.square, request.to.square
            ))
        })?;
        timeline.apply_move(mv.clone())?;
        Ok((vec![(id, mv)], None))
    }

    fn move_across(&mut self, request: &MoveRequest) -> Result<Records> {
        let (source, target) = (request.from.timeline, request.to.timeline);
        let target_state = self.registry.require(target)?.state().clone();
        let (departure, arrival) = self.plan_transfer(request, &target_state, target)?;

        self.transact("cross-timeline move", |session, txn| {
            txn.capture_timeline(session.registry.require(source)?, "cross-timeline source")?;
            txn.capture_timeline(session.registry.require(target)?, "cross-timeline target")?;
            session.probe(MutationStep::DetachSource)?;
            session.registry.require_mut(source)?.apply_move(departure.clone())?;
            session.probe(MutationStep::PlaceTarget)?;
            session.registry.require_mut(target)?.apply_move(arrival.clone())?;
            Ok(())
        })?;
        Ok((vec![(source, departure), (target, arrival)], None))
    }

    fn travel(&mut self, request: &MoveRequest) -> Result<Records> {
        let (source, parent) = (request.from.timeline, request.to.timeline);
        let ply = request.to.ply.ok_or_else(|| {
            TimeweaveError::Invariant(format!("time travel to {} without a ply", request.to))
        })?;
        let base = self.registry.require(parent)?.clone_for_branch(ply)?;
        let (_, arrival) = self.plan_transfer(request, &base, self.registry.next_id())?;

        let (branch, departure) = self.transact("time travel", |session, txn| {
            // Children are found through parent ids, so the parent itself is
            // only captured when it is also the source.
            txn.capture_timeline(session.registry.require(source)?, "time-travel source")?;
            session.probe(MutationStep::CreateBranch)?;
            let branch = session.registry.create(Some(parent), Some(ply), base)?.id();
            txn.capture_new_timeline(branch)?;
            session.probe(MutationStep::RecordArrival)?;
            session.registry.require_mut(branch)?.apply_move(arrival.clone())?;
            session.probe(MutationStep::RecordDeparture)?;
            let source_timeline = session.registry.require_mut(source)?;
            let departure = departure_record(source_timeline.state(), request.from.square, branch)?;
            source_timeline.apply_move(departure.clone())?;
            Ok((branch, departure))
        })?;
        info!("Timeline {branch} branched from {parent} at ply {ply}");
        Ok((vec![(branch, arrival), (source, departure)], Some(branch)))
    }

    /// Builds both halves of a transfer and checks them against copies of the
    /// boards involved. Nothing is mutated.
    fn plan_transfer(
        &self,
        request: &MoveRequest,
        target_state: &GameState,
        destination: TimelineId,
    ) -> Result<(Move, Move)> {
        let source = self.registry.require(request.from.timeline)?;
        let departure = departure_record(source.state(), request.from.square, destination)?;
        let color = departure.color();
        // A board without a legal move is finished for its side; nothing leaves it.
        if source.legal_moves().is_empty() {
            return Err(TimeweaveError::validation(format!(
                "{color} has no legal move on timeline {}, so no piece can leave it",
                source.id()
            )));
        }
        if departure.piece.kind == PieceKind::King && is_in_check(source.state(), color) {
            return Err(TimeweaveError::validation(format!(
                "the {color} king on {} cannot leave check by changing timeline",
                request.from.square
            )));
        }
        let vacated = apply_move(source.state(), &departure)?;
        if exposes_king(&vacated, color) {
            return Err(TimeweaveError::validation(format!(
                "moving off {} leaves the {color} king in check on timeline {}",
                request.from.square,
                source.id()
            )));
        }

        let arrival = arrival_record(
            target_state,
            departure.piece,
            request.to.square,
            source.id(),
            request.promotion,
            self.config.default_promotion,
        )?;
        let landed = apply_move(target_state, &arrival)?;
        if exposes_king(&landed, color) {
            return Err(TimeweaveError::validation(format!(
                "arriving on {} leaves the {color} king in check",
                request.to.square
            )));
        }
        Ok((departure, arrival))
    }

    /// Runs `body` in a fresh transaction, committing on success and rolling
    /// back before returning the error otherwise.
    fn transact<T, F>(&mut self, label: &str, body: F) -> Result<T>
    where
        F: FnOnce(&mut Self, &mut Transaction) -> Result<T>,
    {
        let mut txn = Transaction::begin();
        match body(self, &mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                warn!("{label} failed: {err}");
                let observer = &mut self.observer;
                txn.rollback(&mut self.registry, |id| observer.on_timeline_discarded(id))?;
                Err(err)
            }
        }
    }

    fn probe(&mut self, step: MutationStep) -> Result<()> {
        let Some(probe) = self.probe.as_mut() else {
            return Ok(());
        };
        probe
            .before(step)
            .map_err(|err| TimeweaveError::StepFailed {
                step: step.to_string(),
                reason: err.to_string(),
            })
    }

    fn render_events(
        &self,
        records: &[(TimelineId, Move)],
        created: Option<TimelineId>,
    ) -> Vec<RenderEvent> {
        let mut events = Vec::new();
        if let Some(timeline) = created.and_then(|id| self.registry.get(id)) {
            events.push(RenderEvent::TimelineCreated {
                id: timeline.id(),
                parent_id: timeline.parent_id(),
                branch_turn: timeline.branch_turn(),
            });
        }
        for (id, mv) in records {
            events.push(RenderEvent::MoveApplied {
                timeline: *id,
                mv: mv.clone(),
            });
            if let Some(timeline) = self.registry.get(*id) {
                events.push(RenderEvent::BoardUpdated {
                    timeline: *id,
                    board: timeline.board().clone(),
                });
            }
        }
        events
    }

    fn announce_all(&mut self) {
        let events: Vec<RenderEvent> = self
            .registry
            .iter()
            .flat_map(|timeline| {
                [
                    RenderEvent::TimelineCreated {
                        id: timeline.id(),
                        parent_id: timeline.parent_id(),
                        branch_turn: timeline.branch_turn(),
                    },
                    RenderEvent::BoardUpdated {
                        timeline: timeline.id(),
                        board: timeline.board().clone(),
                    },
                ]
            })
            .collect();
        for event in &events {
            dispatch(&mut self.observer, event);
        }
    }
}

fn note_advisories(registry: &TimelineRegistry) {
    for timeline in registry.iter() {
        for advisory in fen::advisories(timeline.state()) {
            debug!("Timeline {}: {advisory:?}", timeline.id());
        }
    }
}

fn checked_registry(saved: &SavedSession) -> Result<TimelineRegistry> {
    let registry = TimelineRegistry::from_saved(saved)?;
    if registry.is_empty() {
        return Err(TimeweaveError::Persistence("save holds no timelines".into()));
    }
    Ok(registry)
}

/// Whether `ply` names the current board of `timeline`. Plies past the current
/// board do not exist.
fn is_current(timeline: &Timeline, ply: Option<usize>) -> Result<bool> {
    match ply {
        None => Ok(true),
        Some(ply) if ply > timeline.ply() => Err(TimeweaveError::OutOfRange {
            index: ply,
            len: timeline.ply() + 1,
        }),
        Some(ply) => Ok(timeline.is_current(ply)),
    }
}

fn refuse(request: &MoveRequest, err: TimeweaveError) -> Result<MoveOutcome> {
    if err.is_validation() {
        debug!("Rejected {request}: {err}");
        Ok(MoveOutcome::Rejected {
            reason: err.to_string(),
        })
    } else {
        Err(err)
    }
}
