//! Usage: Export the embedded report to PDF.

pub mod job;
pub mod state;
pub mod workflow;

pub use job::{extract_export_id, pdf_file_name, sanitize_file_name, ExportJob, ExportStatus};
pub use state::{ExportEvent, ExportPhase, ExportState, StatusTone};
pub use workflow::{
    download_export_file, export_report, poll_export_status, start_export, wait_for_export,
    ExportedFile, PollPolicy,
};
