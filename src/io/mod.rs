pub mod input;
pub mod output;

pub use input::{load_context, parse_transcription_file, parse_turns_file, MeetingContext};
pub use output::{format_hms, write_decisions, write_report, HumanMinutes, MachineMinutes};
