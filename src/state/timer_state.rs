//! Study-session timer state machine
//!
//! ```text
//! Idle --start--> Started --stop--> Stopped --start--> Started
//! Started | Stopped --cancel | finish--> Idle
//! ```
//!
//! The machine only counts ticks; it has no clock and no thread. The
//! session runner drives [`TimerMachine::tick`] once per second.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, StudyError},
    utils::split_hms,
};

/// Lifecycle state of the study timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    #[default]
    Idle,
    Started,
    Stopped,
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimerState::Idle => "idle",
            TimerState::Started => "started",
            TimerState::Stopped => "stopped",
        })
    }
}

/// Commands accepted by the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerCommand {
    Start,
    Stop,
    Cancel,
    Finish,
}

impl fmt::Display for TimerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimerCommand::Start => "start",
            TimerCommand::Stop => "stop",
            TimerCommand::Cancel => "cancel",
            TimerCommand::Finish => "finish",
        })
    }
}

/// Subject attached to the in-progress session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRef {
    pub id: i64,
    pub name: String,
}

/// What the machine held when a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndedSession {
    pub elapsed_seconds: u64,
    pub subject: Option<SubjectRef>,
}

/// Read-only view of the timer published to observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub elapsed_seconds: u64,
    pub hours: String,
    pub minutes: String,
    pub seconds: String,
    pub subject: Option<SubjectRef>,
}

/// Timer state plus the accumulated elapsed seconds of the current session
#[derive(Debug, Clone, Default)]
pub struct TimerMachine {
    state: TimerState,
    elapsed_seconds: u64,
    subject: Option<SubjectRef>,
}

impl TimerMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn subject(&self) -> Option<&SubjectRef> {
        self.subject.as_ref()
    }

    /// Begin or resume ticking. A provided subject replaces the association.
    pub fn start(&mut self, subject: Option<SubjectRef>) -> Result<()> {
        match self.state {
            TimerState::Idle | TimerState::Stopped => {
                if subject.is_some() {
                    self.subject = subject;
                }
                self.state = TimerState::Started;
                Ok(())
            }
            TimerState::Started => Err(self.reject(TimerCommand::Start)),
        }
    }

    /// Freeze the elapsed time. Stopping an already stopped timer is a no-op.
    pub fn stop(&mut self) -> Result<()> {
        match self.state {
            TimerState::Started => {
                self.state = TimerState::Stopped;
                Ok(())
            }
            TimerState::Stopped => Ok(()),
            TimerState::Idle => Err(self.reject(TimerCommand::Stop)),
        }
    }

    /// Discard the session
    pub fn cancel(&mut self) -> Result<EndedSession> {
        self.end(TimerCommand::Cancel)
    }

    /// End the session and hand back what was accumulated
    pub fn finish(&mut self) -> Result<EndedSession> {
        self.end(TimerCommand::Finish)
    }

    /// Advance by one second. Returns false when not started.
    pub fn tick(&mut self) -> bool {
        if self.state != TimerState::Started {
            return false;
        }
        self.elapsed_seconds = self.elapsed_seconds.saturating_add(1);
        true
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let (hours, minutes, seconds) = split_hms(self.elapsed_seconds);
        TimerSnapshot {
            state: self.state,
            elapsed_seconds: self.elapsed_seconds,
            hours,
            minutes,
            seconds,
            subject: self.subject.clone(),
        }
    }

    fn end(&mut self, command: TimerCommand) -> Result<EndedSession> {
        if self.state == TimerState::Idle {
            return Err(self.reject(command));
        }
        let ended = EndedSession {
            elapsed_seconds: self.elapsed_seconds,
            subject: self.subject.take(),
        };
        self.state = TimerState::Idle;
        self.elapsed_seconds = 0;
        Ok(ended)
    }

    fn reject(&self, command: TimerCommand) -> StudyError {
        StudyError::InvalidTransition {
            command,
            state: self.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maths() -> SubjectRef {
        SubjectRef {
            id: 1,
            name: "Maths".to_string(),
        }
    }

    fn ticks(machine: &mut TimerMachine, n: u64) {
        for _ in 0..n {
            machine.tick();
        }
    }

    #[test]
    fn starts_idle_and_empty() {
        let machine = TimerMachine::new();
        assert_eq!(machine.state(), TimerState::Idle);
        assert_eq!(machine.elapsed_seconds(), 0);
        assert!(machine.subject().is_none());
    }

    #[test]
    fn ticks_only_count_while_started() {
        let mut machine = TimerMachine::new();
        assert!(!machine.tick());

        machine.start(Some(maths())).unwrap();
        ticks(&mut machine, 12);
        assert_eq!(machine.elapsed_seconds(), 12);

        machine.stop().unwrap();
        assert!(!machine.tick());
        assert_eq!(machine.elapsed_seconds(), 12);

        machine.start(None).unwrap();
        ticks(&mut machine, 3);
        assert_eq!(machine.elapsed_seconds(), 15);
        assert_eq!(machine.subject(), Some(&maths()));
    }

    #[test]
    fn invalid_commands_leave_state_unchanged() {
        let mut machine = TimerMachine::new();
        assert!(matches!(
            machine.stop(),
            Err(StudyError::InvalidTransition {
                command: TimerCommand::Stop,
                state: TimerState::Idle
            })
        ));
        assert!(machine.finish().is_err());
        assert!(machine.cancel().is_err());
        assert_eq!(machine.state(), TimerState::Idle);

        machine.start(None).unwrap();
        machine.tick();
        assert!(machine.start(Some(maths())).is_err());
        assert_eq!(machine.state(), TimerState::Started);
        assert_eq!(machine.elapsed_seconds(), 1);
        assert!(machine.subject().is_none());
    }

    #[test]
    fn second_stop_is_a_no_op() {
        let mut machine = TimerMachine::new();
        machine.start(Some(maths())).unwrap();
        ticks(&mut machine, 4);
        machine.stop().unwrap();
        machine.stop().unwrap();
        assert_eq!(machine.state(), TimerState::Stopped);
        assert_eq!(machine.elapsed_seconds(), 4);
    }

    #[test]
    fn cancel_and_finish_reset_everything() {
        let enders: [fn(&mut TimerMachine) -> Result<EndedSession>; 2] =
            [TimerMachine::cancel, TimerMachine::finish];
        for end in enders {
            let mut machine = TimerMachine::new();
            machine.start(Some(maths())).unwrap();
            ticks(&mut machine, 40);
            machine.stop().unwrap();

            let ended = end(&mut machine).unwrap();
            assert_eq!(ended.elapsed_seconds, 40);
            assert_eq!(ended.subject, Some(maths()));
            assert_eq!(machine.state(), TimerState::Idle);
            assert_eq!(machine.elapsed_seconds(), 0);
            assert!(machine.subject().is_none());
        }
    }

    #[test]
    fn replayed_sequences_follow_the_table() {
        use TimerCommand::*;
        let cases: &[(&[TimerCommand], TimerState)] = &[
            (&[Start], TimerState::Started),
            (&[Start, Stop], TimerState::Stopped),
            (&[Start, Stop, Start], TimerState::Started),
            (&[Start, Cancel], TimerState::Idle),
            (&[Start, Stop, Finish], TimerState::Idle),
            (&[Stop, Finish, Cancel], TimerState::Idle),
            (&[Start, Start, Stop, Stop], TimerState::Stopped),
            (&[Start, Finish, Stop], TimerState::Idle),
        ];

        for (commands, expected) in cases {
            let mut machine = TimerMachine::new();
            for command in commands.iter() {
                let _ = match command {
                    Start => machine.start(None),
                    Stop => machine.stop(),
                    Cancel => machine.cancel().map(|_| ()),
                    Finish => machine.finish().map(|_| ()),
                };
            }
            assert_eq!(machine.state(), *expected, "sequence {:?}", commands);
        }
    }

    #[test]
    fn snapshot_decomposes_elapsed_time() {
        let mut machine = TimerMachine::new();
        machine.start(Some(maths())).unwrap();
        ticks(&mut machine, 3_661);
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.state, TimerState::Started);
        assert_eq!(snapshot.hours, "01");
        assert_eq!(snapshot.minutes, "01");
        assert_eq!(snapshot.seconds, "01");
        assert_eq!(snapshot.subject, Some(maths()));
    }
}
