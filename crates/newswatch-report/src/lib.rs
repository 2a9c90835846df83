pub mod email;
pub mod render;

pub use email::{EmailGateway, SmtpMailer};
pub use render::{
    ReportKind, aggregate_subject, render_aggregate_html, render_html, render_text, subject_for,
};
