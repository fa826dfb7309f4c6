use std::fmt;

/// Non-fatal, user-facing messages produced while driving the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A second session was picked for an occupied (date, start) slot.
    OneSessionPerSlot { date: String, start: String },
    /// Schedule submission with nothing selected.
    SelectAtLeastOneSession,
    /// The backend answered 409 on schedule creation; the workflow moved on anyway.
    // TODO: name the sessions that failed once generate-schedule reports them.
    ScheduleConflict { message: String },
    /// Success message returned by the backend.
    Backend(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::OneSessionPerSlot { date, start } => write!(
                f,
                "You already picked a session at {start} on {date}. Only one session per time slot is allowed."
            ),
            Notice::SelectAtLeastOneSession => {
                f.write_str("Please select at least one training session.")
            }
            Notice::ScheduleConflict { message } => write!(
                f,
                "Some sessions could not be booked ({message}). Your schedule was saved with the remaining sessions."
            ),
            Notice::Backend(message) => f.write_str(message),
        }
    }
}
