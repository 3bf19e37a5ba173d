//! Participant session state machine
//!
//! All participant-facing state (identity, scenario queue, current stage,
//! the reconciled sample, the hypothesis being edited) lives in one explicit
//! [`Session`] value. [`Session::step`] is a pure transition: it takes an
//! [`Input`] (participant action or backend reply) and returns the next
//! session together with the [`BackendCall`]s the driver must perform. The
//! state machine never talks to the network itself.
//!
//! At most one backend call is outstanding at a time. While one is pending,
//! inputs that would issue another call are rejected with
//! [`Error::RequestInFlight`]; local edits (toggles, sorting, hypothesis
//! changes) stay allowed. A failed round-trip is reported back as
//! [`Input::RequestFailed`], which clears the pending marker and changes
//! nothing else, so the participant can retry.

use crate::feedback::MissingFeedbackPolicy;
use crate::header::Header;
use crate::hypothesis::{FdHypothesis, Side};
use crate::reconcile::{CellKey, ReconciledSample};
use crate::sample::SampleLayout;
use crate::sort::SortDirection;
use crate::wire::{
    DoneRequest, FeedbackOutcome, FeedbackSubmission, ImportRequest, PostInteractionRequest,
    SampleBatch, SampleRequest, ScenarioId, Scores, StartRequest,
};
use crate::{Error, Result};
use std::collections::VecDeque;
use tracing::{error, info, warn};

/// `prev_scenario_id`/`next_scenario_id` placeholder when there is none
pub const NO_SCENARIO: &str = "0";

const INCOMPLETE_HYPOTHESIS: &str =
    "pick at least one attribute per side, or choose \"I don't know\"";

/// HTTP status the backend uses for "created" (new participant, comments stored)
pub const STATUS_CREATED: u16 = 201;

/// Rules the state machine applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub layout: SampleLayout,
    pub missing_feedback: MissingFeedbackPolicy,
    /// Finishing a scenario early is allowed once iterations exceed this
    pub done_unlocks_after: u32,
    /// Scenario count of a participant who has not started yet
    pub total_scenarios: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            layout: SampleLayout::interact(),
            missing_feedback: MissingFeedbackPolicy::Strict,
            done_unlocks_after: 8,
            total_scenarios: 5,
        }
    }
}

/// Whether the participant is starting fresh or resuming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantStatus {
    New,
    Returning,
}

impl ParticipantStatus {
    /// Classify a `start` reply
    ///
    /// A 201, or a full scenario queue, means the participant is new.
    pub fn from_start(status: u16, remaining: usize, total_scenarios: usize) -> Self {
        if status == STATUS_CREATED || remaining == total_scenarios {
            ParticipantStatus::New
        } else {
            ParticipantStatus::Returning
        }
    }
}

/// Request the driver must send to the backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Start(StartRequest),
    PostInteraction(PostInteractionRequest),
    Import(ImportRequest),
    Sample(SampleRequest),
    Feedback(FeedbackSubmission),
    Done(DoneRequest),
}

impl BackendCall {
    /// Endpoint path segment
    pub fn endpoint(&self) -> &'static str {
        match self {
            BackendCall::Start(_) => "start",
            BackendCall::PostInteraction(_) => "post-interaction",
            BackendCall::Import(_) => "import",
            BackendCall::Sample(_) => "sample",
            BackendCall::Feedback(_) => "feedback",
            BackendCall::Done(_) => "done",
        }
    }
}

/// Participant action or backend reply
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    SubmitEmail(String),
    Assign { side: Side, columns: Vec<String> },
    SetUnknown(bool),
    SetComment(String),
    ConfirmBriefing,
    ToggleCell(CellKey),
    Sort(String),
    SubmitFeedback,
    Refresh,
    FinishScenario,
    SubmitComments(Option<String>),

    Started { status: u16, scenarios: Vec<ScenarioId> },
    HeaderReceived(Vec<String>),
    Imported { project_id: String, description: Option<String> },
    /// Import reply that hands over the sample a returning participant left off at
    Resumed { project_id: String, description: Option<String>, batch: SampleBatch },
    SampleReceived(SampleBatch),
    FeedbackReceived(FeedbackOutcome),
    DoneAcknowledged { status: u16 },
    RequestFailed { endpoint: String, reason: String },
}

impl Input {
    pub fn name(&self) -> &'static str {
        match self {
            Input::SubmitEmail(_) => "submit-email",
            Input::Assign { .. } => "assign",
            Input::SetUnknown(_) => "set-unknown",
            Input::SetComment(_) => "set-comment",
            Input::ConfirmBriefing => "confirm-briefing",
            Input::ToggleCell(_) => "toggle-cell",
            Input::Sort(_) => "sort",
            Input::SubmitFeedback => "submit-feedback",
            Input::Refresh => "refresh",
            Input::FinishScenario => "finish-scenario",
            Input::SubmitComments(_) => "submit-comments",
            Input::Started { .. } => "started",
            Input::HeaderReceived(_) => "header-received",
            Input::Imported { .. } => "imported",
            Input::Resumed { .. } => "resumed",
            Input::SampleReceived(_) => "sample-received",
            Input::FeedbackReceived(_) => "feedback-received",
            Input::DoneAcknowledged { .. } => "done-acknowledged",
            Input::RequestFailed { .. } => "request-failed",
        }
    }
}

/// Scenario preview and prior hypothesis
#[derive(Debug, Clone)]
pub struct Briefing {
    pub scenario: ScenarioId,
    /// Filled in once `post-interaction` answers
    pub header: Option<Header>,
    pub hypothesis: FdHypothesis,
}

/// One scenario's interaction loop
#[derive(Debug, Clone)]
pub struct Interaction {
    pub scenario: ScenarioId,
    pub project_id: String,
    pub description: Option<String>,
    pub header: Header,
    pub grid: Option<ReconciledSample>,
    pub hypothesis: FdHypothesis,
    /// Samples shown so far in this scenario
    pub iterations: u32,
    pub scores: Scores,
    pub last_message: Option<String>,
    /// Scenario is over; waiting on the next scenario's header
    pub finishing: bool,
}

impl Interaction {
    fn load(&mut self, batch: SampleBatch, settings: &SessionSettings) -> Result<()> {
        let grid = ReconciledSample::reconcile(
            &batch.sample,
            batch.feedback,
            self.header.clone(),
            settings.layout,
            settings.missing_feedback,
        )?;
        self.grid = Some(grid);
        self.iterations += 1;
        self.scores = batch.scores;
        self.last_message = batch.msg;
        Ok(())
    }

    fn grid_mut(&mut self) -> Result<&mut ReconciledSample> {
        self.grid
            .as_mut()
            .ok_or_else(|| Error::InvalidInput("no sample loaded yet".to_string()))
    }
}

/// Screen the participant is on
#[derive(Debug, Clone)]
pub enum Stage {
    Welcome,
    Briefing(Briefing),
    Interact(Interaction),
    Completion,
    Finished,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Welcome => "welcome",
            Stage::Briefing(_) => "briefing",
            Stage::Interact(_) => "interact",
            Stage::Completion => "completion",
            Stage::Finished => "finished",
        }
    }
}

/// Result of one transition
#[derive(Debug, Clone)]
pub struct Step {
    pub session: Session,
    pub calls: Vec<BackendCall>,
}

/// Explicit participant session context
#[derive(Debug, Clone)]
pub struct Session {
    email: Option<String>,
    participant: Option<ParticipantStatus>,
    scenarios: VecDeque<ScenarioId>,
    stage: Stage,
    pending: Option<&'static str>,
    settings: SessionSettings,
}

fn validate_email(email: &str) -> Result<String> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::InvalidInput(format!(
            "{:?} is not an email address",
            email
        )));
    }
    Ok(email.to_string())
}

fn edit_hypothesis(hypothesis: &mut FdHypothesis, input: Input) {
    match input {
        Input::Assign { side, columns } => {
            let skipped = hypothesis.assign(side, &columns);
            if !skipped.is_empty() {
                warn!(?skipped, %side, "Some columns were not assigned");
            }
        }
        Input::SetUnknown(unknown) => hypothesis.set_unknown(unknown),
        Input::SetComment(comment) => hypothesis.set_comment(comment),
        _ => {}
    }
}

impl Session {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            email: None,
            participant: None,
            scenarios: VecDeque::new(),
            stage: Stage::Welcome,
            pending: None,
            settings,
        }
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn participant(&self) -> Option<ParticipantStatus> {
        self.participant
    }

    /// Scenarios not yet imported, in order
    pub fn remaining_scenarios(&self) -> &VecDeque<ScenarioId> {
        &self.scenarios
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Endpoint of the outstanding call, if any
    pub fn pending(&self) -> Option<&'static str> {
        self.pending
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.stage, Stage::Finished)
    }

    /// Whether "I'm all done" is currently allowed
    pub fn can_finish_scenario(&self) -> bool {
        match &self.stage {
            Stage::Interact(i) => {
                self.pending.is_none()
                    && (i.finishing
                        || (i.iterations > self.settings.done_unlocks_after
                            && i.hypothesis.is_submittable()))
            }
            _ => false,
        }
    }

    /// Pure transition: next session plus the calls to perform
    pub fn step(&self, input: Input) -> Result<Step> {
        let mut next = self.clone();
        let calls = next.apply(input)?;
        for call in &calls {
            next.pending = Some(call.endpoint());
        }
        Ok(Step {
            session: next,
            calls,
        })
    }

    fn invalid(&self, input: &'static str) -> Error {
        Error::InvalidTransition {
            stage: self.stage.name().to_string(),
            input: input.to_string(),
        }
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.pending {
            Some(endpoint) => Err(Error::RequestInFlight(endpoint.to_string())),
            None => Ok(()),
        }
    }

    fn expect_reply(&mut self, input: &'static str, endpoint: &'static str) -> Result<()> {
        if self.pending != Some(endpoint) {
            return Err(self.invalid(input));
        }
        self.pending = None;
        Ok(())
    }

    fn require_email(&self) -> Result<String> {
        self.email
            .clone()
            .ok_or_else(|| Error::InvalidInput("no participant email".to_string()))
    }

    fn post_interaction(&self, prev: String) -> Result<BackendCall> {
        let next = self
            .scenarios
            .front()
            .map(|s| s.to_string())
            .unwrap_or_else(|| NO_SCENARIO.to_string());
        Ok(BackendCall::PostInteraction(PostInteractionRequest {
            next_scenario_id: next,
            prev_scenario_id: prev,
            email: self.require_email()?,
        }))
    }

    fn apply(&mut self, input: Input) -> Result<Vec<BackendCall>> {
        let name = input.name();
        match input {
            Input::RequestFailed { endpoint, reason } => {
                error!(endpoint = %endpoint, reason = %reason, stage = self.stage.name(), "Backend request failed");
                self.pending = None;
                Ok(Vec::new())
            }
            Input::SubmitEmail(email) => self.on_submit_email(name, &email),
            Input::Started { status, scenarios } => self.on_started(name, status, scenarios),
            Input::HeaderReceived(labels) => self.on_header(name, labels),
            edit @ (Input::Assign { .. } | Input::SetUnknown(_) | Input::SetComment(_)) => {
                self.on_hypothesis_edit(name, edit)
            }
            Input::ConfirmBriefing => self.on_confirm_briefing(name),
            Input::Imported {
                project_id,
                description,
            } => self.on_imported(name, project_id, description, None),
            Input::Resumed {
                project_id,
                description,
                batch,
            } => self.on_imported(name, project_id, description, Some(batch)),
            Input::SampleReceived(batch) => {
                self.expect_interact(name)?;
                self.expect_reply(name, "sample")?;
                let settings = self.settings;
                let interaction = self.interaction_mut(name)?;
                interaction.load(batch, &settings)?;
                info!(iteration = interaction.iterations, "Sample loaded");
                Ok(Vec::new())
            }
            Input::FeedbackReceived(outcome) => self.on_feedback_reply(name, outcome),
            Input::ToggleCell(key) => {
                let interaction = self.interaction_mut(name)?;
                interaction
                    .grid_mut()?
                    .toggle_cell(key.position, &key.column)?;
                Ok(Vec::new())
            }
            Input::Sort(column) => {
                let interaction = self.interaction_mut(name)?;
                let direction: SortDirection = interaction.grid_mut()?.click_sort(&column)?;
                info!(column = %column, ?direction, "Sort changed");
                Ok(Vec::new())
            }
            Input::SubmitFeedback => self.on_submit_feedback(name, true),
            Input::Refresh => self.on_submit_feedback(name, false),
            Input::FinishScenario => self.on_finish_scenario(name),
            Input::SubmitComments(comments) => {
                if !matches!(self.stage, Stage::Completion) {
                    return Err(self.invalid(name));
                }
                self.ensure_idle()?;
                Ok(vec![BackendCall::Done(DoneRequest {
                    email: self.require_email()?,
                    comments: comments.unwrap_or_default(),
                })])
            }
            Input::DoneAcknowledged { status } => {
                if !matches!(self.stage, Stage::Completion) {
                    return Err(self.invalid(name));
                }
                self.expect_reply(name, "done")?;
                if status == STATUS_CREATED {
                    info!("Study complete");
                    self.stage = Stage::Finished;
                } else {
                    warn!(status, "Completion not acknowledged, comments may need resubmitting");
                }
                Ok(Vec::new())
            }
        }
    }

    fn expect_interact(&self, input: &'static str) -> Result<()> {
        match self.stage {
            Stage::Interact(_) => Ok(()),
            _ => Err(self.invalid(input)),
        }
    }

    fn interaction_mut(&mut self, input: &'static str) -> Result<&mut Interaction> {
        let stage = self.stage.name();
        match &mut self.stage {
            Stage::Interact(interaction) => Ok(interaction),
            _ => Err(Error::InvalidTransition {
                stage: stage.to_string(),
                input: input.to_string(),
            }),
        }
    }

    fn on_submit_email(&mut self, name: &'static str, email: &str) -> Result<Vec<BackendCall>> {
        if !matches!(self.stage, Stage::Welcome) {
            return Err(self.invalid(name));
        }
        self.ensure_idle()?;
        let email = validate_email(email)?;
        info!(email = %email, "Starting session");
        self.email = Some(email.clone());
        Ok(vec![BackendCall::Start(StartRequest { email })])
    }

    fn on_started(
        &mut self,
        name: &'static str,
        status: u16,
        scenarios: Vec<ScenarioId>,
    ) -> Result<Vec<BackendCall>> {
        if !matches!(self.stage, Stage::Welcome) {
            return Err(self.invalid(name));
        }
        self.expect_reply(name, "start")?;
        let participant =
            ParticipantStatus::from_start(status, scenarios.len(), self.settings.total_scenarios);
        info!(?participant, remaining = scenarios.len(), "Session started");
        self.participant = Some(participant);
        self.scenarios = scenarios.into();

        match self.scenarios.front().copied() {
            Some(first) => {
                self.stage = Stage::Briefing(Briefing {
                    scenario: first,
                    header: None,
                    hypothesis: FdHypothesis::default(),
                });
                Ok(vec![self.post_interaction(NO_SCENARIO.to_string())?])
            }
            None => {
                self.stage = Stage::Completion;
                Ok(Vec::new())
            }
        }
    }

    fn on_header(&mut self, name: &'static str, labels: Vec<String>) -> Result<Vec<BackendCall>> {
        let header = Header::new(labels);
        match &self.stage {
            Stage::Briefing(_) => {
                self.expect_reply(name, "post-interaction")?;
                if let Stage::Briefing(briefing) = &mut self.stage {
                    briefing.hypothesis = FdHypothesis::new(&header);
                    briefing.header = Some(header);
                }
            }
            Stage::Interact(interaction) if interaction.finishing => {
                let finished = interaction.scenario;
                self.expect_reply(name, "post-interaction")?;
                info!(scenario = finished, "Scenario complete");
                self.stage = match self.scenarios.front().copied() {
                    Some(next) => Stage::Briefing(Briefing {
                        scenario: next,
                        hypothesis: FdHypothesis::new(&header),
                        header: Some(header),
                    }),
                    None => Stage::Completion,
                };
            }
            _ => return Err(self.invalid(name)),
        }
        Ok(Vec::new())
    }

    fn on_hypothesis_edit(&mut self, name: &'static str, edit: Input) -> Result<Vec<BackendCall>> {
        let stage = self.stage.name();
        let hypothesis = match &mut self.stage {
            Stage::Briefing(Briefing {
                header: Some(_),
                hypothesis,
                ..
            }) => hypothesis,
            Stage::Briefing(_) => {
                return Err(Error::InvalidInput(
                    "scenario header not loaded yet".to_string(),
                ))
            }
            Stage::Interact(interaction) => &mut interaction.hypothesis,
            _ => {
                return Err(Error::InvalidTransition {
                    stage: stage.to_string(),
                    input: name.to_string(),
                })
            }
        };
        edit_hypothesis(hypothesis, edit);
        Ok(Vec::new())
    }

    fn on_confirm_briefing(&mut self, name: &'static str) -> Result<Vec<BackendCall>> {
        let Stage::Briefing(briefing) = &self.stage else {
            return Err(self.invalid(name));
        };
        self.ensure_idle()?;
        if briefing.header.is_none() {
            return Err(Error::InvalidInput(
                "scenario header not loaded yet".to_string(),
            ));
        }
        if !briefing.hypothesis.is_submittable() {
            return Err(Error::InvalidInput(INCOMPLETE_HYPOTHESIS.to_string()));
        }
        Ok(vec![BackendCall::Import(ImportRequest {
            email: self.require_email()?,
            scenario_id: briefing.scenario.to_string(),
            initial_fd: briefing.hypothesis.to_wire(),
            fd_comment: briefing.hypothesis.comment().to_string(),
        })])
    }

    /// Enter the interaction loop; a resumed scenario skips the `sample` call
    fn on_imported(
        &mut self,
        name: &'static str,
        project_id: String,
        description: Option<String>,
        resume: Option<SampleBatch>,
    ) -> Result<Vec<BackendCall>> {
        let Stage::Briefing(briefing) = &self.stage else {
            return Err(self.invalid(name));
        };
        let scenario = briefing.scenario;
        let header = briefing.header.clone().unwrap_or_default();
        self.expect_reply(name, "import")?;
        if self.scenarios.front() == Some(&scenario) {
            self.scenarios.pop_front();
        }
        let mut interaction = Interaction {
            scenario,
            project_id: project_id.clone(),
            description,
            hypothesis: FdHypothesis::new(&header),
            header,
            grid: None,
            iterations: 0,
            scores: Scores::default(),
            last_message: None,
            finishing: false,
        };
        let calls = match resume {
            Some(batch) => {
                interaction.load(batch, &self.settings)?;
                info!(scenario, project_id = %project_id, "Scenario resumed");
                Vec::new()
            }
            None => {
                info!(scenario, project_id = %project_id, "Scenario imported");
                vec![BackendCall::Sample(SampleRequest { project_id })]
            }
        };
        self.stage = Stage::Interact(interaction);
        Ok(calls)
    }

    fn on_feedback_reply(
        &mut self,
        name: &'static str,
        outcome: FeedbackOutcome,
    ) -> Result<Vec<BackendCall>> {
        self.expect_interact(name)?;
        self.expect_reply(name, "feedback")?;
        let settings = self.settings;
        let interaction = self.interaction_mut(name)?;
        match outcome {
            FeedbackOutcome::Next(batch) => {
                interaction.load(batch, &settings)?;
                interaction.hypothesis = FdHypothesis::new(&interaction.header);
                info!(iteration = interaction.iterations, "Feedback accepted, new sample loaded");
                Ok(Vec::new())
            }
            FeedbackOutcome::Done => {
                interaction.finishing = true;
                let scenario = interaction.scenario;
                info!(scenario, "Backend ended the interaction");
                Ok(vec![self.post_interaction(scenario.to_string())?])
            }
        }
    }

    fn on_submit_feedback(&mut self, name: &'static str, is_new: bool) -> Result<Vec<BackendCall>> {
        let Stage::Interact(interaction) = &self.stage else {
            return Err(self.invalid(name));
        };
        self.ensure_idle()?;
        if interaction.finishing {
            return Err(Error::InvalidInput("scenario already finished".to_string()));
        }
        let Some(grid) = interaction.grid.as_ref() else {
            if is_new {
                return Err(Error::InvalidInput("no sample loaded yet".to_string()));
            }
            // Refresh before any sample arrived retries the first sample
            return Ok(vec![BackendCall::Sample(SampleRequest {
                project_id: interaction.project_id.clone(),
            })]);
        };
        if is_new && !interaction.hypothesis.is_submittable() {
            return Err(Error::InvalidInput(INCOMPLETE_HYPOTHESIS.to_string()));
        }
        Ok(vec![BackendCall::Feedback(FeedbackSubmission {
            feedback: grid.feedback_payload(),
            project_id: interaction.project_id.clone(),
            current_user_h: interaction.hypothesis.to_wire(),
            user_h_comment: interaction.hypothesis.comment().to_string(),
            is_new_feedback: u8::from(is_new),
        })])
    }

    fn on_finish_scenario(&mut self, name: &'static str) -> Result<Vec<BackendCall>> {
        let Stage::Interact(interaction) = &self.stage else {
            return Err(self.invalid(name));
        };
        self.ensure_idle()?;
        let scenario = interaction.scenario;
        // Backend already ended this scenario; only the header fetch is left
        if interaction.finishing {
            return Ok(vec![self.post_interaction(scenario.to_string())?]);
        }
        if interaction.iterations <= self.settings.done_unlocks_after {
            return Err(Error::InvalidInput(format!(
                "finishing unlocks after {} samples ({} so far)",
                self.settings.done_unlocks_after, interaction.iterations
            )));
        }
        if !interaction.hypothesis.is_submittable() {
            return Err(Error::InvalidInput(INCOMPLETE_HYPOTHESIS.to_string()));
        }
        self.interaction_mut(name)?.finishing = true;
        Ok(vec![self.post_interaction(scenario.to_string())?])
    }
}
