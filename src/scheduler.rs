//! # Deadline Scheduler
//!
//! Single-context, run-to-completion dispatcher for the node's task chains.
//!
//! ## Dispatch Algorithm
//!
//! On every [`DeadlineScheduler::dispatch`] call:
//! 1. **Select**: the pending release with the earliest instant; ties go to
//!    the lower [`TaskId`]
//! 2. **Gate**: nothing runs until that instant has been reached
//! 3. **Run**: the body executes to completion with exclusive access to the
//!    scheduler, so it can resubmit itself or release other tasks
//! 4. **Check**: hard releases compare their completion instant with the
//!    deadline; a late completion is counted and logged, never aborted
//!
//! Only one body is ever in flight. Every piece of node state is touched from
//! inside a body, so no locking is needed as long as bodies never yield.

use log::{error, trace, warn};

use crate::clock::{Duration, Instant, Monotonic};
use crate::error::ScheduleError;
use crate::task::{Release, Resubmit, TaskId, TaskState, TaskStats};

/// Executes task bodies on behalf of the scheduler.
pub trait Runner<M: Monotonic> {
    /// Run `task`'s body to completion. The body may submit releases for any
    /// task, including itself.
    fn run(&mut self, task: TaskId, scheduler: &mut DeadlineScheduler<M>);
}

/// Outcome of one dispatched body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatched {
    pub task: TaskId,
    /// Nominal release instant.
    pub release: Instant,
    /// Instant the body actually started.
    pub started: Instant,
    /// Instant the body returned.
    pub completed: Instant,
    /// Hard deadline of the release, if any.
    pub deadline: Option<Instant>,
    /// How far past the deadline the body completed.
    pub lateness: Option<Duration>,
}

#[derive(Debug, Clone, Copy)]
struct Running {
    task: TaskId,
    release: Instant,
    /// Soft delay requested by the body for itself. Its release is stamped
    /// once the body has returned.
    soft_delay: Option<Duration>,
}

/// The central scheduler state: one pending-release slot and one set of
/// statistics per task, plus the timebase.
pub struct DeadlineScheduler<M> {
    clock: M,
    pending: [Option<Release>; TaskId::COUNT],
    stats: [TaskStats; TaskId::COUNT],
    running: Option<Running>,
}

impl<M: Monotonic> DeadlineScheduler<M> {
    /// Empty scheduler over `clock`. Nothing is pending until a task is
    /// posted or submitted.
    pub fn new(clock: M) -> Self {
        Self {
            clock,
            pending: [None; TaskId::COUNT],
            stats: [TaskStats::new(); TaskId::COUNT],
            running: None,
        }
    }

    /// Current scheduler time.
    #[inline]
    pub fn now(&mut self) -> Instant {
        self.clock.now()
    }

    /// The timebase. Task bodies borrow it as a cycle counter for profiling.
    pub fn clock_mut(&mut self) -> &mut M {
        &mut self.clock
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Release `task` as soon as possible, without a deadline.
    pub fn post(&mut self, task: TaskId) {
        let at = self.now();
        self.pending[task.index()] = Some(Release { at, deadline: None });
        self.set_soft_delay(task, None);
        trace!("{} posted at {} us", task.name(), at.ticks());
    }

    /// Release `task` once, `delay` after now. When `task` is the running
    /// body, the delay counts from the moment the body returns.
    pub fn schedule_after(&mut self, task: TaskId, delay: Duration) -> Result<Instant, ScheduleError> {
        self.submit(task, Resubmit::After(delay))
    }

    /// Release `task` `baseline` after its current release (or after now if
    /// it is not the running task), and expect completion within `deadline`
    /// of that release.
    pub fn schedule_periodic(
        &mut self,
        task: TaskId,
        baseline: Duration,
        deadline: Duration,
    ) -> Result<Instant, ScheduleError> {
        self.submit(task, Resubmit::Periodic { period: baseline, deadline })
    }

    /// Single scheduling primitive behind both release modes. A pending
    /// release of the same task is replaced.
    ///
    /// A soft request made by the running task for itself is re-stamped to
    /// `completion + delay` when its body returns.
    ///
    /// # Returns
    /// - `Ok(instant)`: the new release instant (provisional for a soft
    ///   self-resubmission)
    /// - `Err(_)`: a zero delay, period or deadline was requested
    pub fn submit(&mut self, task: TaskId, how: Resubmit) -> Result<Instant, ScheduleError> {
        let release = match how {
            Resubmit::After(delay) => {
                if delay.ticks() == 0 {
                    return Err(ScheduleError::ZeroDelay);
                }
                self.set_soft_delay(task, Some(delay));
                Release {
                    at: self.now() + delay,
                    deadline: None,
                }
            }
            Resubmit::Periodic { period, deadline } => {
                if period.ticks() == 0 {
                    return Err(ScheduleError::ZeroPeriod);
                }
                if deadline.ticks() == 0 {
                    return Err(ScheduleError::ZeroDeadline);
                }
                // Anchor on the previous release so execution time never
                // shifts the cadence.
                let base = match self.running {
                    Some(running) if running.task == task => running.release,
                    _ => self.now(),
                };
                self.set_soft_delay(task, None);
                let at = base + period;
                Release {
                    at,
                    deadline: Some(at + deadline),
                }
            }
        };

        self.pending[task.index()] = Some(release);
        trace!(
            "{} released at {} us ({})",
            task.name(),
            release.at.ticks(),
            if how.is_hard() { "hard" } else { "soft" }
        );
        Ok(release.at)
    }

    fn set_soft_delay(&mut self, task: TaskId, delay: Option<Duration>) {
        if let Some(running) = self.running.as_mut() {
            if running.task == task {
                running.soft_delay = delay;
            }
        }
    }

    /// Submit and report a refusal instead of returning it. Task bodies use
    /// this at the end of their run: a refused resubmission ends the chain,
    /// which is a programming error but not a reason to stop the node.
    pub fn resubmit(&mut self, task: TaskId, how: Resubmit) -> Option<Instant> {
        match self.submit(task, how) {
            Ok(at) => Some(at),
            Err(e) => {
                error!("{} resubmission rejected: {}", task.name(), e);
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Whether `task` is idle, waiting for a release or running.
    pub fn state(&self, task: TaskId) -> TaskState {
        match self.running {
            Some(running) if running.task == task => TaskState::Running,
            _ if self.pending[task.index()].is_some() => TaskState::Pending,
            _ => TaskState::Idle,
        }
    }

    /// The release waiting in `task`'s slot.
    pub fn pending(&self, task: TaskId) -> Option<Release> {
        self.pending[task.index()]
    }

    /// Run and deadline counters for `task`.
    pub fn stats(&self, task: TaskId) -> &TaskStats {
        &self.stats[task.index()]
    }

    /// The release that will run next, regardless of whether it is due.
    pub fn next_release(&self) -> Option<(TaskId, Instant)> {
        let mut best: Option<(TaskId, Instant)> = None;
        for task in TaskId::ALL {
            if let Some(release) = self.pending[task.index()] {
                match best {
                    Some((_, at)) if release.at >= at => {}
                    _ => best = Some((task, release.at)),
                }
            }
        }
        best
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Run the next due body, if any.
    ///
    /// # Returns
    /// `None` when nothing is pending or the earliest release lies in the
    /// future.
    pub fn dispatch<R: Runner<M>>(&mut self, runner: &mut R) -> Option<Dispatched> {
        let (task, at) = self.next_release()?;
        let started = self.now();
        if at > started {
            return None;
        }

        let release = self.pending[task.index()].take()?;
        self.running = Some(Running {
            task,
            release: release.at,
            soft_delay: None,
        });

        runner.run(task, self);

        let running = self.running.take();
        let completed = self.now();
        if let Some(delay) = running.and_then(|r| r.soft_delay) {
            if let Some(next) = self.pending[task.index()].as_mut() {
                next.at = completed + delay;
                trace!("{} soft release settled at {} us", task.name(), next.at.ticks());
            }
        }
        let stats = &mut self.stats[task.index()];
        stats.record_run();

        let lateness = match release.deadline {
            Some(deadline) => match completed.checked_duration_since(deadline) {
                Some(late) if late.ticks() > 0 => {
                    stats.record_deadline_missed(late);
                    warn!(
                        "{} missed its deadline by {} us (released {} us, completed {} us)",
                        task.name(),
                        late.ticks(),
                        release.at.ticks(),
                        completed.ticks()
                    );
                    Some(late)
                }
                _ => {
                    stats.record_deadline_met();
                    None
                }
            },
            None => None,
        };

        Some(Dispatched {
            task,
            release: release.at,
            started,
            completed,
            deadline: release.deadline,
            lateness,
        })
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::CPU_FREQ_HZ;

    const PERIOD: Duration = Duration::from_ticks(1_300);

    /// A self-resubmitting chain whose body takes a fixed time.
    struct Chain {
        task: TaskId,
        deadline_mode: bool,
        deadline: Duration,
        body_us: u64,
    }

    impl Runner<ManualClock> for Chain {
        fn run(&mut self, task: TaskId, scheduler: &mut DeadlineScheduler<ManualClock>) {
            assert_eq!(task, self.task);
            assert_eq!(scheduler.state(task), TaskState::Running);
            scheduler.clock_mut().advance_us(self.body_us);
            scheduler.resubmit(
                task,
                Resubmit::select(self.deadline_mode, PERIOD, self.deadline),
            );
        }
    }

    /// Records which bodies ran, without resubmitting.
    struct Recorder {
        order: heapless::Vec<TaskId, 8>,
    }

    impl Runner<ManualClock> for Recorder {
        fn run(&mut self, task: TaskId, _scheduler: &mut DeadlineScheduler<ManualClock>) {
            self.order.push(task).unwrap();
        }
    }

    fn scheduler() -> DeadlineScheduler<ManualClock> {
        DeadlineScheduler::new(ManualClock::new(CPU_FREQ_HZ))
    }

    /// Jump to each release and dispatch it, `n` times.
    fn drive<R: Runner<ManualClock>>(
        sched: &mut DeadlineScheduler<ManualClock>,
        runner: &mut R,
        n: usize,
    ) -> heapless::Vec<Dispatched, 16> {
        let mut log = heapless::Vec::new();
        for _ in 0..n {
            let (_, at) = sched.next_release().unwrap();
            sched.clock_mut().set(at);
            log.push(sched.dispatch(runner).unwrap()).unwrap();
        }
        log
    }

    #[test]
    fn test_hard_releases_keep_fixed_cadence() {
        let mut sched = scheduler();
        let mut chain = Chain {
            task: TaskId::Load,
            deadline_mode: true,
            deadline: PERIOD,
            body_us: 500,
        };
        sched.post(TaskId::Load);

        let log = drive(&mut sched, &mut chain, 5);
        for pair in log.windows(2) {
            assert_eq!(pair[1].release.ticks() - pair[0].release.ticks(), 1_300);
        }
        assert!(log.iter().all(|d| d.lateness.is_none()));
        // The posted release carries no deadline; the four periodic ones do.
        assert_eq!(sched.stats(TaskId::Load).deadlines_met, 4);
        assert_eq!(sched.stats(TaskId::Load).runs, 5);
    }

    #[test]
    fn test_hard_cadence_independent_of_body_time() {
        for body_us in [10, 700, 1_200] {
            let mut sched = scheduler();
            let mut chain = Chain {
                task: TaskId::Load,
                deadline_mode: true,
                deadline: PERIOD,
                body_us,
            };
            sched.post(TaskId::Load);
            let log = drive(&mut sched, &mut chain, 4);
            assert_eq!(log[3].release.ticks(), 3 * 1_300);
        }
    }

    #[test]
    fn test_soft_releases_follow_completion() {
        let mut sched = scheduler();
        let mut chain = Chain {
            task: TaskId::Load,
            deadline_mode: false,
            deadline: PERIOD,
            body_us: 500,
        };
        sched.post(TaskId::Load);

        let log = drive(&mut sched, &mut chain, 4);
        for pair in log.windows(2) {
            assert_eq!(pair[1].release, pair[0].completed + PERIOD);
            assert!(pair[1].started >= pair[0].completed + PERIOD);
        }
        assert_eq!(log[3].release.ticks(), 3 * (500 + 1_300));
        assert!(log.iter().all(|d| d.deadline.is_none()));
    }

    /// Clock that moves forward 1 us on every read.
    struct Ticking(u64);

    impl Monotonic for Ticking {
        fn now(&mut self) -> Instant {
            self.0 += 1;
            Instant::from_ticks(self.0)
        }
    }

    /// Resubmits itself softly, whatever clock it runs on.
    struct SoftChain;

    impl Runner<Ticking> for SoftChain {
        fn run(&mut self, task: TaskId, scheduler: &mut DeadlineScheduler<Ticking>) {
            scheduler.resubmit(task, Resubmit::After(PERIOD));
        }
    }

    #[test]
    fn test_soft_release_counts_from_completion_on_moving_clock() {
        let mut sched = DeadlineScheduler::new(Ticking(0));
        let mut chain = SoftChain;
        sched.post(TaskId::Load);

        for _ in 0..3 {
            let d = loop {
                if let Some(d) = sched.dispatch(&mut chain) {
                    break d;
                }
            };
            let next = sched.pending(TaskId::Load).unwrap();
            assert_eq!(next.at, d.completed + PERIOD);
            assert!(next.deadline.is_none());
        }
        assert_eq!(sched.stats(TaskId::Load).runs, 3);
    }

    #[test]
    fn test_soft_release_of_other_task_counts_from_request() {
        struct Kick;

        impl Runner<Ticking> for Kick {
            fn run(&mut self, _task: TaskId, scheduler: &mut DeadlineScheduler<Ticking>) {
                scheduler.resubmit(TaskId::Melody, Resubmit::After(PERIOD));
            }
        }

        let mut sched = DeadlineScheduler::new(Ticking(0));
        sched.post(TaskId::Reader);
        let d = sched.dispatch(&mut Kick).unwrap();
        let at = sched.pending(TaskId::Melody).unwrap().at;
        assert!(at < d.completed + PERIOD);
        assert!(at > d.started);
    }

    #[test]
    fn test_missed_deadline_is_reported_not_fatal() {
        let mut sched = scheduler();
        let mut chain = Chain {
            task: TaskId::Tone,
            deadline_mode: true,
            deadline: Duration::from_ticks(100),
            body_us: 250,
        };
        sched.post(TaskId::Tone);

        let log = drive(&mut sched, &mut chain, 4);
        assert_eq!(log[0].lateness, None);
        for d in &log[1..] {
            assert_eq!(d.lateness, Some(Duration::from_ticks(150)));
        }

        let stats = sched.stats(TaskId::Tone);
        assert_eq!(stats.deadlines_missed, 3);
        assert_eq!(stats.worst_lateness_us, 150);
        // The chain keeps going after every miss.
        assert_eq!(sched.state(TaskId::Tone), TaskState::Pending);
    }

    #[test]
    fn test_mode_switch_takes_effect_on_next_resubmission() {
        let mut sched = scheduler();
        let mut chain = Chain {
            task: TaskId::Load,
            deadline_mode: true,
            deadline: PERIOD,
            body_us: 400,
        };
        sched.post(TaskId::Load);
        drive(&mut sched, &mut chain, 2);
        assert!(sched.pending(TaskId::Load).unwrap().deadline.is_some());

        chain.deadline_mode = false;
        let log = drive(&mut sched, &mut chain, 1);
        assert!(log[0].deadline.is_some());
        assert!(sched.pending(TaskId::Load).unwrap().deadline.is_none());
    }

    #[test]
    fn test_non_positive_requests_rejected() {
        let mut sched = scheduler();
        let zero = Duration::from_ticks(0);

        assert_eq!(
            sched.schedule_after(TaskId::Load, zero),
            Err(ScheduleError::ZeroDelay)
        );
        assert_eq!(
            sched.schedule_periodic(TaskId::Load, zero, PERIOD),
            Err(ScheduleError::ZeroPeriod)
        );
        assert_eq!(
            sched.schedule_periodic(TaskId::Load, PERIOD, zero),
            Err(ScheduleError::ZeroDeadline)
        );
        assert_eq!(sched.resubmit(TaskId::Load, Resubmit::After(zero)), None);
        assert_eq!(sched.state(TaskId::Load), TaskState::Idle);
    }

    #[test]
    fn test_nothing_runs_before_release() {
        let mut sched = scheduler();
        let mut recorder = Recorder { order: heapless::Vec::new() };

        assert!(sched.dispatch(&mut recorder).is_none());

        sched.schedule_after(TaskId::Melody, Duration::from_ticks(50)).unwrap();
        sched.clock_mut().advance_us(49);
        assert!(sched.dispatch(&mut recorder).is_none());

        sched.clock_mut().advance_us(1);
        let d = sched.dispatch(&mut recorder).unwrap();
        assert_eq!(d.task, TaskId::Melody);
        assert_eq!(sched.state(TaskId::Melody), TaskState::Idle);
    }

    #[test]
    fn test_simultaneous_releases_dispatch_in_task_order() {
        let mut sched = scheduler();
        let mut recorder = Recorder { order: heapless::Vec::new() };

        sched.post(TaskId::Load);
        sched.post(TaskId::Tone);
        sched.post(TaskId::Reader);
        while sched.dispatch(&mut recorder).is_some() {}

        assert_eq!(
            recorder.order.as_slice(),
            &[TaskId::Reader, TaskId::Tone, TaskId::Load]
        );
    }

    #[test]
    fn test_earliest_release_wins() {
        let mut sched = scheduler();
        sched.schedule_after(TaskId::Reader, Duration::from_ticks(900)).unwrap();
        sched.schedule_after(TaskId::Load, Duration::from_ticks(300)).unwrap();
        assert_eq!(
            sched.next_release(),
            Some((TaskId::Load, Instant::from_ticks(300)))
        );
    }

    #[test]
    fn test_resubmission_replaces_pending_release() {
        let mut sched = scheduler();
        sched.schedule_after(TaskId::Tone, Duration::from_ticks(900)).unwrap();
        sched.schedule_after(TaskId::Tone, Duration::from_ticks(200)).unwrap();
        assert_eq!(sched.pending(TaskId::Tone).unwrap().at.ticks(), 200);
    }

    #[test]
    fn test_periodic_from_outside_anchors_on_now() {
        let mut sched = scheduler();
        sched.clock_mut().advance_us(1_000);
        let at = sched
            .schedule_periodic(TaskId::Load, PERIOD, Duration::from_ticks(100))
            .unwrap();
        assert_eq!(at.ticks(), 2_300);
        assert_eq!(
            sched.pending(TaskId::Load).unwrap().deadline,
            Some(Instant::from_ticks(2_400))
        );
    }
}
