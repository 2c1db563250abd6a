pub mod matching;
pub mod record;
pub mod schedule;
pub mod scheduler;

pub use matching::{MatchError, MatchPolicy, MatchResult, evaluate};
pub use record::{MatchStatus, VerificationRecord, VerificationTask};
pub use schedule::{MedicationSchedule, Recurrence, ScheduleError, parse_time_of_day};
pub use scheduler::{compute_due, reminder_id_for, tick_window};
