//! # Node
//!
//! Owns every piece of application state and runs the task bodies on behalf
//! of the [`DeadlineScheduler`].
//!
//! ## Startup Sequence
//!
//! ```text
//! main()
//!   ├─► DeadlineScheduler::new(clock)
//!   ├─► Node::new(dac, console, can)
//!   ├─► Node::start()          ← greeting, key-0 period table,
//!   │                            release tone / melody / load chains,
//!   │                            CAN "Hello"
//!   └─► loop
//!         ├─► Node::receive()  ← serial collaborator hands over bytes
//!         ├─► Node::receive_frame() ← CAN collaborator hands over frames
//!         └─► DeadlineScheduler::dispatch(&mut node)
//! ```
//!
//! All state lives in one owned struct and is only reached through
//! `&mut self` from inside a body, so the borrow checker enforces the
//! single-context discipline the scheduler relies on.

use core::fmt::{self, Write};

use heapless::Deque;
use log::{debug, info, warn};

use crate::can::{Can, CanFrame};
use crate::clock::{CycleCounter, Duration, Monotonic};
use crate::command::{AppState, Command};
use crate::config::{
    CAN_QUEUE_CAPACITY, CPU_FREQ_HZ, INPUT_QUEUE_CAPACITY, LOAD_DEADLINE_US, LOAD_PERIOD_US, MAX_KEY, MAX_TEMPO,
    MELODY_DEADLINE_US, MIN_KEY, MIN_LOAD, MIN_TEMPO, TONE_DEADLINE_US, WCET_RUNS,
};
use crate::error::ProfileError;
use crate::load::{spin, BackgroundLoad};
use crate::melody::{period_for, MelodySequencer, PeriodSnapshot};
use crate::profiler::{WcetProfiler, WcetReport};
use crate::scheduler::{DeadlineScheduler, Runner};
use crate::task::{Resubmit, TaskId};
use crate::tone::{Adjust, Dac, NullDac, ToneGenerator};

/// What a profiling request characterises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    /// The load body at the given loop range.
    BackgroundLoad(u32),
    /// One tone generator tick.
    ToneGenerator,
}

/// Profile `subject` over `iterations` runs.
///
/// The tone tick is measured on a copy of `tone` driving a [`NullDac`], so
/// neither the live generator nor the output line is disturbed. A silent
/// generator is started on A4 first, so the sounding path is the one timed.
pub fn measure<C: CycleCounter>(
    subject: Subject,
    counter: &mut C,
    clock_hz: u32,
    iterations: u32,
    tone: &ToneGenerator,
) -> Result<WcetReport, ProfileError> {
    let mut profiler = WcetProfiler::new(counter, clock_hz);
    match subject {
        Subject::BackgroundLoad(range) => profiler.measure(iterations, || spin(range)),
        Subject::ToneGenerator => {
            let mut scratch = tone.clone();
            if !scratch.is_playing() {
                scratch.start(Duration::from_ticks(period_for(0).unwrap_or(0) as u64));
            }
            let mut dac = NullDac;
            profiler.measure(iterations, || {
                scratch.tick(&mut dac);
            })
        }
    }
}

/// The application: shared state, collaborators and the task bodies.
pub struct Node<D, O, C> {
    app: AppState,
    tone: ToneGenerator,
    melody: MelodySequencer,
    load: BackgroundLoad,
    dac: D,
    out: O,
    can: C,
    input: Deque<u8, INPUT_QUEUE_CAPACITY>,
    frames: Deque<CanFrame, CAN_QUEUE_CAPACITY>,
    profile: Option<Subject>,
}

impl<D: Dac, O: Write, C: Can> Node<D, O, C> {
    /// Fresh node: key 0, default tempo, volume and load, nothing playing.
    pub fn new(dac: D, out: O, can: C) -> Self {
        Self {
            app: AppState::new(),
            tone: ToneGenerator::new(),
            melody: MelodySequencer::new(),
            load: BackgroundLoad::new(),
            dac,
            out,
            can,
            input: Deque::new(),
            frames: Deque::new(),
            profile: None,
        }
    }

    /// Greet, print the period table for the current key and release the
    /// three periodic chains.
    pub fn start<M: Monotonic>(&mut self, scheduler: &mut DeadlineScheduler<M>) {
        self.line(format_args!("Hello, hello..."));
        self.print_key_table();

        scheduler.post(TaskId::Tone);
        scheduler.post(TaskId::Melody);
        scheduler.post(TaskId::Load);
        self.can.send(&CanFrame::hello());
        info!(
            "node started: key {}, tempo {} bpm, load {}, deadline mode {}",
            self.app.key(),
            self.app.tempo(),
            self.load.loop_range(),
            self.load.deadline_mode()
        );
    }

    /// Hand over one received byte and release the reader.
    ///
    /// # Returns
    /// `false` if the input queue was full and the byte was dropped.
    pub fn receive<M: Monotonic>(&mut self, scheduler: &mut DeadlineScheduler<M>, byte: u8) -> bool {
        if self.input.push_back(byte).is_err() {
            warn!("input queue full, dropped {:?}", byte as char);
            return false;
        }
        scheduler.post(TaskId::Reader);
        true
    }

    /// Hand over one received CAN frame and release the reader, which echoes
    /// it to the console.
    ///
    /// # Returns
    /// `false` if the frame queue was full and the frame was dropped.
    pub fn receive_frame<M: Monotonic>(
        &mut self,
        scheduler: &mut DeadlineScheduler<M>,
        frame: CanFrame,
    ) -> bool {
        if self.frames.push_back(frame).is_err() {
            warn!("CAN queue full, frame dropped");
            return false;
        }
        scheduler.post(TaskId::Reader);
        true
    }

    /// Key, tempo and pending numeric input.
    pub fn app(&self) -> &AppState {
        &self.app
    }

    pub fn tone(&self) -> &ToneGenerator {
        &self.tone
    }

    pub fn load(&self) -> &BackgroundLoad {
        &self.load
    }

    pub fn dac(&self) -> &D {
        &self.dac
    }

    pub fn can(&self) -> &C {
        &self.can
    }

    /// The console collaborator.
    pub fn output(&self) -> &O {
        &self.out
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.out
    }

    // -----------------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------------

    // Console failures are the output collaborator's concern; the node keeps
    // running either way.
    fn line(&mut self, args: fmt::Arguments<'_>) {
        let _ = self.out.write_fmt(args);
        let _ = self.out.write_char('\n');
    }

    fn print_key_table(&mut self) {
        let key = self.app.key();
        self.line(format_args!("Key: {}", key));
        self.line(format_args!("{}", PeriodSnapshot::new(key)));
    }

    fn report_adjust<T: fmt::Display>(&mut self, outcome: Adjust<T>, what: &str, up: bool) {
        match (outcome, up) {
            (Adjust::Changed(v), true) => self.line(format_args!("Increased {}: {}", what, v)),
            (Adjust::Changed(v), false) => self.line(format_args!("Decreased {}: {}", what, v)),
            (Adjust::AtLimit, true) => self.line(format_args!("Max {} already!", what)),
            (Adjust::AtLimit, false) => self.line(format_args!("Min {} already!", what)),
        }
    }

    // -----------------------------------------------------------------------
    // Task bodies
    // -----------------------------------------------------------------------

    fn run_tone<M: Monotonic>(&mut self, scheduler: &mut DeadlineScheduler<M>) {
        let hard = self.load.deadline_mode();
        let next = self.tone.tick(&mut self.dac);
        scheduler.resubmit(
            TaskId::Tone,
            Resubmit::select(hard, next, Duration::from_ticks(TONE_DEADLINE_US)),
        );
    }

    fn run_melody<M: Monotonic>(&mut self, scheduler: &mut DeadlineScheduler<M>) {
        let hard = self.load.deadline_mode();
        let next = self
            .melody
            .step(self.app.key(), self.app.tempo(), &mut self.tone);
        scheduler.resubmit(
            TaskId::Melody,
            Resubmit::select(hard, next, Duration::from_ticks(MELODY_DEADLINE_US)),
        );
    }

    fn run_load<M: Monotonic>(&mut self, scheduler: &mut DeadlineScheduler<M>) {
        let hard = self.load.deadline_mode();
        self.load.run();
        scheduler.resubmit(
            TaskId::Load,
            Resubmit::select(
                hard,
                Duration::from_ticks(LOAD_PERIOD_US),
                Duration::from_ticks(LOAD_DEADLINE_US),
            ),
        );
    }

    fn run_reader<M: Monotonic>(&mut self, scheduler: &mut DeadlineScheduler<M>) {
        while let Some(frame) = self.frames.pop_front() {
            debug!("CAN frame {}/{}, {} bytes", frame.msg_id, frame.node_id, frame.data.len());
            self.line(format_args!("Can msg received: {}", frame.text()));
        }
        while let Some(byte) = self.input.pop_front() {
            self.handle(byte, scheduler);
        }
    }

    fn run_profiler<M: Monotonic + CycleCounter>(&mut self, scheduler: &mut DeadlineScheduler<M>) {
        let Some(subject) = self.profile.take() else {
            return;
        };

        let result = measure(subject, scheduler.clock_mut(), CPU_FREQ_HZ, WCET_RUNS, &self.tone);
        match result {
            Ok(report) => {
                info!("wcet {:?}: max {} ns, avg {} ns", subject, report.max_ns, report.avg_ns);
                match subject {
                    Subject::BackgroundLoad(range) => self.line(format_args!(
                        "Current_loop={} : Max = {} ns, Avg = {} ns",
                        range, report.max_ns, report.avg_ns
                    )),
                    Subject::ToneGenerator => self.line(format_args!(
                        "Tone tick : Max = {} ns, Avg = {} ns",
                        report.max_ns, report.avg_ns
                    )),
                }
            }
            Err(e) => log::error!("wcet {:?} failed: {}", subject, e),
        }
    }

    // -----------------------------------------------------------------------
    // Command interpreter
    // -----------------------------------------------------------------------

    fn handle<M: Monotonic>(&mut self, byte: u8, scheduler: &mut DeadlineScheduler<M>) {
        match Command::from_byte(byte) {
            Command::Input(c) => {
                if !self.app.push_input(c) {
                    debug!("input buffer full, dropped {:?}", c);
                }
                self.line(format_args!("Rcv: '{}'", byte as char));
            }
            Command::CommitKey => match self.app.commit_key() {
                Ok(_) => self.print_key_table(),
                Err(e) => {
                    debug!("key rejected: {}", e);
                    self.line(format_args!(
                        "Invalid input. Please enter a number between {} and {}.",
                        MIN_KEY, MAX_KEY
                    ));
                }
            },
            Command::CommitTempo => match self.app.commit_tempo() {
                Ok(tempo) => {
                    self.line(format_args!("Tempo: {} bpm", tempo));
                    let key = self.app.key();
                    self.line(format_args!("{}", PeriodSnapshot::new(key)));
                }
                Err(e) => {
                    debug!("tempo rejected: {}", e);
                    self.line(format_args!(
                        "Invalid tempo. Please enter a number between {} and {}.",
                        MIN_TEMPO, MAX_TEMPO
                    ));
                }
            },
            Command::VolumeUp => {
                let outcome = self.tone.increase_volume();
                self.report_adjust(outcome, "volume", true);
            }
            Command::VolumeDown => {
                let outcome = self.tone.decrease_volume();
                self.report_adjust(outcome, "volume", false);
            }
            Command::ToggleMute => {
                if self.tone.toggle_mute() {
                    self.line(format_args!("Muted!"));
                } else {
                    self.line(format_args!("Unmuted!"));
                }
            }
            Command::LoadUp => {
                let outcome = self.load.increase_load();
                self.report_adjust(outcome, "load", true);
            }
            Command::LoadDown => {
                let outcome = self.load.decrease_load();
                self.report_adjust(outcome, "load", false);
            }
            Command::ToggleDeadline => {
                if self.load.toggle_deadline() {
                    self.line(format_args!("Deadline enabled"));
                } else {
                    self.line(format_args!("Deadline disabled"));
                }
            }
            Command::ProfileLoad => {
                self.request_profile(scheduler, Subject::BackgroundLoad(self.load.loop_range()))
            }
            Command::ProfileMinLoad => {
                self.request_profile(scheduler, Subject::BackgroundLoad(MIN_LOAD))
            }
            Command::ProfileTone => self.request_profile(scheduler, Subject::ToneGenerator),
            Command::Status => {
                let _ = write!(
                    self.out,
                    "deadline={}",
                    if self.load.deadline_mode() { "on" } else { "off" }
                );
                for task in [TaskId::Tone, TaskId::Melody, TaskId::Load] {
                    let stats = scheduler.stats(task);
                    let _ = write!(
                        self.out,
                        "; {}: runs={} missed={} worst={}us",
                        task.name(),
                        stats.runs,
                        stats.deadlines_missed,
                        stats.worst_lateness_us
                    );
                }
                let _ = self.out.write_char('\n');
            }
            Command::Unknown(c) => self.line(format_args!("Unknown command '{}'", c)),
        }
    }

    fn request_profile<M: Monotonic>(&mut self, scheduler: &mut DeadlineScheduler<M>, subject: Subject) {
        match subject {
            Subject::BackgroundLoad(_) => self.line(format_args!("Measuring background WCET...")),
            Subject::ToneGenerator => self.line(format_args!("Measuring tone generator WCET...")),
        }
        self.profile = Some(subject);
        scheduler.post(TaskId::Profiler);
    }
}

impl<M, D, O, C> Runner<M> for Node<D, O, C>
where
    M: Monotonic + CycleCounter,
    D: Dac,
    O: Write,
    C: Can,
{
    fn run(&mut self, task: TaskId, scheduler: &mut DeadlineScheduler<M>) {
        match task {
            TaskId::Reader => self.run_reader(scheduler),
            TaskId::Tone => self.run_tone(scheduler),
            TaskId::Melody => self.run_melody(scheduler),
            TaskId::Load => self.run_load(scheduler),
            TaskId::Profiler => self.run_profiler(scheduler),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
