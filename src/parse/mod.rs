pub mod bottom_up;
pub mod grammar;

pub use bottom_up::{parse_run_log, parse_run_log_file, RunLogInfo};
pub use grammar::{parse_param_tuple, parse_summary_line, ParamTuple, SummaryRecord};
